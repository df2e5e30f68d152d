// Licensed under the Apache-2.0 license

//! Binary layout of the TK1 flash: the partition table record, its
//! checksum, and the full flash image the bootloader reads at fixed
//! offsets.
//!
//! The partition table is stored twice, at 0x20000 and 0xf0000, each copy
//! followed by a BLAKE2s checksum over the encoded table bytes. All
//! integers in the table are little-endian and no field is padded.

pub mod codec;
pub mod digest;
mod error;
pub mod flash;
pub mod generation;
pub mod layout;
pub mod reader;
pub mod report;
pub mod table;

pub use codec::{CodecError, FixedCodec};
pub use digest::{app_digest, Checksum, ChecksumMode};
pub use error::Error;
pub use flash::{create_flash_image, FlashImageBuilder};
pub use generation::Generation;
pub use layout::{FlashLayout, FlashRegion, ERASED_VALUE, MAX_APP_SIZE, TK1_FLASH_LAYOUT};
pub use reader::{
    read_flash_partition_table, read_partition_table, ActiveCopy, FlashDump, Verification,
};
pub use report::Report;
pub use table::{
    AppAuth, AppInputs, AppStorage, PartitionTable, PartitionTableBuilder, PartitionTableStorage,
    PreloadedApp,
};

pub type Result<T> = core::result::Result<T, Error>;
