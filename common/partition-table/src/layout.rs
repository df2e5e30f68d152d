// Licensed under the Apache-2.0 license

use crate::generation::Generation;
use crate::{Error, Result};

/// Value read back from erased flash.
pub const ERASED_VALUE: u8 = 0xff;

/// Largest preloaded app that fits its flash slot.
pub const MAX_APP_SIZE: usize = 128 * 1024;

pub const FLASH_SIZE: usize = 0x10_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashRegion {
    pub name: &'static str, // name of the region
    pub offset: usize,      // offset from the start of flash in bytes
    pub size: usize,        // size in bytes
}

impl FlashRegion {
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }

    fn overlaps(&self, other: &FlashRegion) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Placement of every region on the flash device.
///
/// All regions are aligned to the 64 KiB erase blocks of the flash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashLayout {
    pub size: usize,
    pub bitstream: FlashRegion,
    /// Primary copy first, mirror second.
    pub partition_table: [FlashRegion; 2],
    pub preloaded_app: [FlashRegion; 2],
    pub app_storage: [FlashRegion; 4],
}

/// Flash map of the TK1:
///
/// | Name        | Size   | Start   |
/// |-------------|--------|---------|
/// | Bitstream   | 128KiB | 0x00000 |
/// | Partition   | 64KiB  | 0x20000 |
/// | Pre load 0  | 128KiB | 0x30000 |
/// | Pre load 1  | 128KiB | 0x50000 |
/// | Storage 0   | 128KiB | 0x70000 |
/// | Storage 1   | 128KiB | 0x90000 |
/// | Storage 2   | 128KiB | 0xb0000 |
/// | Storage 3   | 128KiB | 0xd0000 |
/// | Partition 2 | 64KiB  | 0xf0000 |
pub const TK1_FLASH_LAYOUT: FlashLayout = FlashLayout {
    size: FLASH_SIZE,
    bitstream: FlashRegion {
        name: "bitstream",
        offset: 0x0,
        size: 0x20000,
    },
    partition_table: [
        FlashRegion {
            name: "partition table",
            offset: 0x20000,
            size: 0x10000,
        },
        FlashRegion {
            name: "partition table mirror",
            offset: 0xf0000,
            size: 0x10000,
        },
    ],
    preloaded_app: [
        FlashRegion {
            name: "preloaded app 0",
            offset: 0x30000,
            size: MAX_APP_SIZE,
        },
        FlashRegion {
            name: "preloaded app 1",
            offset: 0x50000,
            size: MAX_APP_SIZE,
        },
    ],
    app_storage: [
        FlashRegion {
            name: "app storage 0",
            offset: 0x70000,
            size: 0x20000,
        },
        FlashRegion {
            name: "app storage 1",
            offset: 0x90000,
            size: 0x20000,
        },
        FlashRegion {
            name: "app storage 2",
            offset: 0xb0000,
            size: 0x20000,
        },
        FlashRegion {
            name: "app storage 3",
            offset: 0xd0000,
            size: 0x20000,
        },
    ],
};

impl FlashLayout {
    pub fn regions(&self) -> impl Iterator<Item = &FlashRegion> {
        core::iter::once(&self.bitstream)
            .chain(self.partition_table.iter())
            .chain(self.preloaded_app.iter())
            .chain(self.app_storage.iter())
    }

    /// Checks that every region is inside the flash, no two regions
    /// overlap, and both partition table regions hold a `generation` table.
    pub fn validate(&self, generation: Generation) -> Result<()> {
        let regions: Vec<&FlashRegion> = self.regions().collect();
        for (i, region) in regions.iter().enumerate() {
            if region.end() > self.size {
                return Err(Error::InvalidLayout(format!(
                    "{} ends at 0x{:x}, past the end of flash at 0x{:x}",
                    region.name,
                    region.end(),
                    self.size
                )));
            }
            if let Some(other) = regions[i + 1..].iter().find(|o| region.overlaps(o)) {
                return Err(Error::InvalidLayout(format!(
                    "{} overlaps {}",
                    region.name, other.name
                )));
            }
        }
        for region in &self.partition_table {
            if region.size < generation.storage_size() {
                return Err(Error::InvalidLayout(format!(
                    "{} is {} bytes, the {} table needs {}",
                    region.name,
                    region.size,
                    generation,
                    generation.storage_size()
                )));
            }
        }
        Ok(())
    }
}
