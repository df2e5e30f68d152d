// Licensed under the Apache-2.0 license

use log::{debug, warn};

use crate::codec::CodecError;
use crate::digest::app_digest;
use crate::generation::Generation;
use crate::layout::FlashLayout;
use crate::table::PartitionTableStorage;
use crate::Result;

/// Decodes a bare partition table record from the start of `bytes`.
pub fn read_partition_table(bytes: &[u8], generation: Generation) -> Result<PartitionTableStorage> {
    let storage = PartitionTableStorage::from_bytes(bytes, generation)?;
    debug!(
        "{} partition table storage is {} bytes long",
        generation,
        generation.storage_size()
    );
    Ok(storage)
}

/// Decodes the primary partition table of a full flash dump.
pub fn read_flash_partition_table(
    bytes: &[u8],
    generation: Generation,
    layout: &FlashLayout,
) -> Result<PartitionTableStorage> {
    Ok(FlashDump::parse(bytes, generation, layout)?.primary().clone())
}

/// A full flash dump with both partition table copies decoded.
pub struct FlashDump<'a> {
    bytes: &'a [u8],
    layout: &'a FlashLayout,
    primary: PartitionTableStorage,
    mirror: PartitionTableStorage,
}

/// Result of checking a flash dump the way the bootloader would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub primary_valid: bool,
    pub mirror_valid: bool,
    /// Both copies are byte-identical.
    pub mirrored: bool,
    /// Digest of the slot 1 payload matches the table, `None` if slot 1 is empty.
    pub app1_digest_valid: Option<bool>,
}

/// Which partition table copy the bootloader boots from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveCopy {
    Primary,
    Mirror,
}

impl Verification {
    /// The primary copy if its checksum holds, otherwise the mirror if its does.
    pub fn active(&self) -> Option<ActiveCopy> {
        if self.primary_valid {
            Some(ActiveCopy::Primary)
        } else if self.mirror_valid {
            Some(ActiveCopy::Mirror)
        } else {
            None
        }
    }

    pub fn is_ok(&self) -> bool {
        self.primary_valid
            && self.mirror_valid
            && self.mirrored
            && self.app1_digest_valid != Some(false)
    }
}

impl<'a> FlashDump<'a> {
    /// `bytes` must cover the whole flash described by `layout`.
    pub fn parse(bytes: &'a [u8], generation: Generation, layout: &'a FlashLayout) -> Result<Self> {
        if bytes.len() < layout.size {
            return Err(CodecError::TruncatedInput {
                expected: layout.size,
                actual: bytes.len(),
            }
            .into());
        }
        layout.validate(generation)?;
        let [primary, mirror] = &layout.partition_table;
        debug!("flash dump is {} bytes long", layout.size);
        Ok(Self {
            bytes,
            layout,
            primary: PartitionTableStorage::from_bytes(&bytes[primary.offset..], generation)?,
            mirror: PartitionTableStorage::from_bytes(&bytes[mirror.offset..], generation)?,
        })
    }

    pub fn primary(&self) -> &PartitionTableStorage {
        &self.primary
    }

    pub fn mirror(&self) -> &PartitionTableStorage {
        &self.mirror
    }

    /// Payload of preloaded app `slot`, cut to the size recorded in the
    /// primary table and clamped to the slot.
    pub fn preloaded_app(&self, slot: usize) -> Option<&'a [u8]> {
        let bytes: &'a [u8] = self.bytes;
        let region = self.layout.preloaded_app.get(slot)?;
        let size = self.primary.table().preloaded_app[slot].size as usize;
        let start = region.offset;
        Some(&bytes[start..start + size.min(region.size)])
    }

    pub fn verify(&self) -> Verification {
        let primary_valid = self.primary.checksum_valid();
        let mirror_valid = self.mirror.checksum_valid();
        if !primary_valid {
            warn!("primary partition table checksum mismatch");
        }
        if !mirror_valid {
            warn!("mirror partition table checksum mismatch");
        }
        let mirrored = self.primary.to_bytes() == self.mirror.to_bytes();

        let app1 = &self.primary.table().preloaded_app[1];
        let app1_digest_valid = match self.preloaded_app(1) {
            Some(payload) if app1.size != 0 => {
                let valid = app1.size as usize == payload.len() && app_digest(payload) == app1.digest;
                if !valid {
                    warn!("preloaded app 1 digest mismatch");
                }
                Some(valid)
            }
            _ => None,
        };

        Verification {
            primary_valid,
            mirror_valid,
            mirrored,
            app1_digest_valid,
        }
    }
}
