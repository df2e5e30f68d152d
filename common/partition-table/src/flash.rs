// Licensed under the Apache-2.0 license

use log::{debug, info};

use crate::generation::Generation;
use crate::layout::{FlashLayout, FlashRegion, ERASED_VALUE, TK1_FLASH_LAYOUT};
use crate::table::{AppInputs, PartitionTableBuilder};
use crate::{Error, Result};

/// Assembles a complete flash image in one pass.
pub struct FlashImageBuilder<'a> {
    layout: &'a FlashLayout,
    erased_value: u8,
}

impl<'a> FlashImageBuilder<'a> {
    /// `erased_value` fills every byte that no region writes.
    pub fn new(layout: &'a FlashLayout, erased_value: u8) -> Self {
        Self {
            layout,
            erased_value,
        }
    }

    /// Builds the image: the partition table at both table offsets, the
    /// preloaded apps at the start of their slots, everything else erased.
    pub fn build(&self, generation: Generation, inputs: &AppInputs) -> Result<Vec<u8>> {
        self.layout.validate(generation)?;
        let storage = PartitionTableBuilder::from_inputs(generation, inputs)?;
        let table = storage.to_bytes();

        let mut image = vec![self.erased_value; self.layout.size];
        for region in &self.layout.partition_table {
            write_region(&mut image, region, 0, &table)?;
        }
        write_region(&mut image, &self.layout.preloaded_app[0], 0, inputs.app0)?;
        if let Some(app1) = inputs.app1 {
            write_region(&mut image, &self.layout.preloaded_app[1], 1, app1)?;
        }

        info!(
            "built {} byte flash image, {} partition table checksum {}",
            image.len(),
            generation,
            hex::encode(storage.checksum().as_bytes())
        );
        Ok(image)
    }
}

/// Builds a TK1 flash image with erased bytes set to 0xff.
pub fn create_flash_image(generation: Generation, inputs: &AppInputs) -> Result<Vec<u8>> {
    FlashImageBuilder::new(&TK1_FLASH_LAYOUT, ERASED_VALUE).build(generation, inputs)
}

// `slot` is only used to report oversized preloaded apps.
fn write_region(image: &mut [u8], region: &FlashRegion, slot: usize, data: &[u8]) -> Result<()> {
    if data.len() > region.size {
        return Err(Error::PayloadTooLarge {
            slot,
            size: data.len(),
            max: region.size,
        });
    }
    debug!(
        "{}: {} bytes at 0x{:05x}",
        region.name,
        data.len(),
        region.offset
    );
    image[region.offset..region.offset + data.len()].copy_from_slice(data);
    Ok(())
}
