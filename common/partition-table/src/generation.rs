// Licensed under the Apache-2.0 license

use core::fmt;
use core::str::FromStr;

use crate::codec::FixedCodec;
use crate::digest::ChecksumMode;
use crate::table::{RawPartTable, RawPartTableWithPubkey};

/// Partition table format generation.
///
/// Generations differ in the field set and the checksum and are not
/// interoperable. The caller always names the generation; it is never
/// guessed from the length of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Generation {
    /// No public keys, 16-byte keyed BLAKE2s checksum.
    Legacy,
    /// No public keys, 32-byte BLAKE2s checksum.
    Unsigned,
    /// Per-app public keys, 32-byte BLAKE2s checksum.
    #[default]
    Signed,
}

impl Generation {
    pub const ALL: [Generation; 3] = [Generation::Legacy, Generation::Unsigned, Generation::Signed];

    pub const fn has_pubkey(self) -> bool {
        matches!(self, Generation::Signed)
    }

    pub const fn checksum_mode(self) -> ChecksumMode {
        match self {
            Generation::Legacy => ChecksumMode::KeyedBlake2s128,
            Generation::Unsigned | Generation::Signed => ChecksumMode::Blake2s256,
        }
    }

    /// Size of the encoded table, without the checksum.
    pub const fn table_size(self) -> usize {
        if self.has_pubkey() {
            RawPartTableWithPubkey::SIZE
        } else {
            RawPartTable::SIZE
        }
    }

    /// Size of the table plus its trailing checksum, as written to flash.
    pub const fn storage_size(self) -> usize {
        self.table_size() + self.checksum_mode().size()
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Generation::Legacy => "legacy",
            Generation::Unsigned => "unsigned",
            Generation::Signed => "signed",
        };
        f.write_str(name)
    }
}

impl FromStr for Generation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Generation::ALL
            .into_iter()
            .find(|generation| generation.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown partition table generation '{s}'"))
    }
}

// The bootloader reads these records at fixed offsets.
const _: () = assert!(Generation::Legacy.storage_size() == 349);
const _: () = assert!(Generation::Unsigned.storage_size() == 365);
const _: () = assert!(Generation::Signed.storage_size() == 429);
