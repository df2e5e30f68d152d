// Licensed under the Apache-2.0 license

use log::debug;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::codec::{CodecError, FixedCodec};
use crate::digest::{app_digest, Checksum};
use crate::generation::Generation;
use crate::layout::MAX_APP_SIZE;
use crate::{Error, Result};

pub const PART_TABLE_VERSION: u8 = 1;
pub const N_PRELOADED_APPS: usize = 2;
pub const N_APP_STORAGE: usize = 4;

/// Fill pattern for the slot 1 public key when none is given.
///
/// Some signature implementations accept an all-zero signature under an
/// all-zero public key, so an empty slot must never carry a zero key.
pub const UNSET_PUBKEY_FILL: u8 = 0x55;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadedApp {
    pub size: u32,
    pub digest: [u8; 32],
    pub signature: [u8; 64],
    /// Always zero for generations without a public-key field.
    pub pubkey: [u8; 32],
}

impl Default for PreloadedApp {
    fn default() -> Self {
        Self {
            size: 0,
            digest: [0u8; 32],
            signature: [0u8; 64],
            pubkey: [0u8; 32],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppAuth {
    pub nonce: [u8; 16],
    pub auth_digest: [u8; 16],
}

/// Metadata of one storage area. Written by the device at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppStorage {
    pub status: u8,
    pub auth: AppAuth,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionTable {
    pub version: u8,
    pub preloaded_app: [PreloadedApp; N_PRELOADED_APPS],
    pub app_storage: [AppStorage; N_APP_STORAGE],
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub(crate) struct RawAppStorage {
    status: u8,
    nonce: [u8; 16],
    auth_digest: [u8; 16],
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub(crate) struct RawPreloadedApp {
    size: U32<LittleEndian>,
    digest: [u8; 32],
    signature: [u8; 64],
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub(crate) struct RawPreloadedAppWithPubkey {
    size: U32<LittleEndian>,
    digest: [u8; 32],
    signature: [u8; 64],
    pubkey: [u8; 32],
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub(crate) struct RawPartTable {
    version: u8,
    preloaded_app: [RawPreloadedApp; N_PRELOADED_APPS],
    app_storage: [RawAppStorage; N_APP_STORAGE],
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub(crate) struct RawPartTableWithPubkey {
    version: u8,
    preloaded_app: [RawPreloadedAppWithPubkey; N_PRELOADED_APPS],
    app_storage: [RawAppStorage; N_APP_STORAGE],
}

impl From<&AppStorage> for RawAppStorage {
    fn from(s: &AppStorage) -> Self {
        Self {
            status: s.status,
            nonce: s.auth.nonce,
            auth_digest: s.auth.auth_digest,
        }
    }
}

impl From<&RawAppStorage> for AppStorage {
    fn from(raw: &RawAppStorage) -> Self {
        Self {
            status: raw.status,
            auth: AppAuth {
                nonce: raw.nonce,
                auth_digest: raw.auth_digest,
            },
        }
    }
}

impl PartitionTable {
    /// Encodes the table in the little-endian layout of `generation`.
    ///
    /// Public keys are dropped for generations that have no field for them.
    pub fn to_bytes(&self, generation: Generation) -> Vec<u8> {
        let app_storage = self.app_storage.each_ref().map(RawAppStorage::from);
        if generation.has_pubkey() {
            RawPartTableWithPubkey {
                version: self.version,
                preloaded_app: self.preloaded_app.map(|app| RawPreloadedAppWithPubkey {
                    size: app.size.into(),
                    digest: app.digest,
                    signature: app.signature,
                    pubkey: app.pubkey,
                }),
                app_storage,
            }
            .to_vec()
        } else {
            RawPartTable {
                version: self.version,
                preloaded_app: self.preloaded_app.map(|app| RawPreloadedApp {
                    size: app.size.into(),
                    digest: app.digest,
                    signature: app.signature,
                }),
                app_storage,
            }
            .to_vec()
        }
    }

    /// Decodes a table of `generation` from the start of `bytes`.
    pub fn from_bytes(bytes: &[u8], generation: Generation) -> core::result::Result<Self, CodecError> {
        let table = if generation.has_pubkey() {
            let raw = RawPartTableWithPubkey::decode(bytes)?;
            let preloaded_app = raw.preloaded_app;
            let app_storage = raw.app_storage;
            Self {
                version: raw.version,
                preloaded_app: preloaded_app.map(|app| PreloadedApp {
                    size: app.size.get(),
                    digest: app.digest,
                    signature: app.signature,
                    pubkey: app.pubkey,
                }),
                app_storage: app_storage.each_ref().map(AppStorage::from),
            }
        } else {
            let raw = RawPartTable::decode(bytes)?;
            let preloaded_app = raw.preloaded_app;
            let app_storage = raw.app_storage;
            Self {
                version: raw.version,
                preloaded_app: preloaded_app.map(|app| PreloadedApp {
                    size: app.size.get(),
                    digest: app.digest,
                    signature: app.signature,
                    pubkey: [0u8; 32],
                }),
                app_storage: app_storage.each_ref().map(AppStorage::from),
            }
        };
        Ok(table)
    }
}

/// The partition table as stored in flash: the table followed by its checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTableStorage {
    generation: Generation,
    table: PartitionTable,
    checksum: Checksum,
}

impl PartitionTableStorage {
    /// Wraps `table` and computes its checksum.
    pub fn new(generation: Generation, table: PartitionTable) -> Self {
        let mut storage = Self {
            generation,
            table,
            checksum: Checksum::zeroed(generation.checksum_mode()),
        };
        storage.gen_checksum();
        storage
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn table(&self) -> &PartitionTable {
        &self.table
    }

    /// Mutable access to the table. The stored checksum is not updated;
    /// call [`Self::gen_checksum`] once the table is final.
    pub fn table_mut(&mut self) -> &mut PartitionTable {
        &mut self.table
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Checksum over the encoded table bytes as they are now.
    pub fn compute_checksum(&self) -> Checksum {
        self.generation
            .checksum_mode()
            .compute(&self.table.to_bytes(self.generation))
    }

    pub fn gen_checksum(&mut self) {
        self.checksum = self.compute_checksum();
    }

    pub fn checksum_valid(&self) -> bool {
        self.compute_checksum() == self.checksum
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.table.to_bytes(self.generation);
        bytes.extend_from_slice(self.checksum.as_bytes());
        bytes
    }

    /// Decodes a stored table of `generation` from the start of `bytes`.
    ///
    /// The stored checksum is kept as read; it is not checked here.
    pub fn from_bytes(bytes: &[u8], generation: Generation) -> Result<Self> {
        let expected = generation.storage_size();
        if bytes.len() < expected {
            return Err(CodecError::TruncatedInput {
                expected,
                actual: bytes.len(),
            }
            .into());
        }
        let table = PartitionTable::from_bytes(bytes, generation)?;
        let checksum = Checksum::from_bytes(
            generation.checksum_mode(),
            &bytes[generation.table_size()..],
        )
        .ok_or(CodecError::TruncatedInput {
            expected,
            actual: bytes.len(),
        })?;
        Ok(Self {
            generation,
            table,
            checksum,
        })
    }
}

/// Inputs for a new partition table.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppInputs<'a> {
    pub app0: &'a [u8],
    pub app1: Option<&'a [u8]>,
    pub app1_signature: Option<[u8; 64]>,
    pub app1_pubkey: Option<[u8; 32]>,
}

/// Builds a fresh partition table.
///
/// The checksum is generated once, by [`Self::build`], after every field
/// has been set.
pub struct PartitionTableBuilder {
    generation: Generation,
    table: PartitionTable,
}

impl PartitionTableBuilder {
    pub fn new(generation: Generation) -> Self {
        let mut table = PartitionTable {
            version: PART_TABLE_VERSION,
            ..Default::default()
        };
        if generation.has_pubkey() {
            table.preloaded_app[1].pubkey = [UNSET_PUBKEY_FILL; 32];
        }
        Self { generation, table }
    }

    pub fn from_inputs(generation: Generation, inputs: &AppInputs) -> Result<PartitionTableStorage> {
        let mut builder = Self::new(generation).app0(inputs.app0)?;
        if let Some(app1) = inputs.app1 {
            builder = builder.app1(app1)?;
        }
        if let Some(signature) = inputs.app1_signature {
            builder = builder.app1_signature(signature);
        }
        if let Some(pubkey) = inputs.app1_pubkey {
            builder = builder.app1_pubkey(pubkey)?;
        }
        Ok(builder.build())
    }

    /// Sets the size of the first-stage app. Slot 0 carries no digest or signature.
    pub fn app0(mut self, payload: &[u8]) -> Result<Self> {
        self.table.preloaded_app[0].size = checked_app_size(0, payload)?;
        Ok(self)
    }

    pub fn app1(mut self, payload: &[u8]) -> Result<Self> {
        let app = &mut self.table.preloaded_app[1];
        app.size = checked_app_size(1, payload)?;
        app.digest = app_digest(payload);
        debug!("app 1 digest {}", hex::encode(app.digest));
        Ok(self)
    }

    pub fn app1_signature(mut self, signature: [u8; 64]) -> Self {
        self.table.preloaded_app[1].signature = signature;
        self
    }

    pub fn app1_pubkey(mut self, pubkey: [u8; 32]) -> Result<Self> {
        if !self.generation.has_pubkey() {
            return Err(Error::UnsupportedField {
                generation: self.generation,
                field: "app 1 public key",
            });
        }
        self.table.preloaded_app[1].pubkey = pubkey;
        Ok(self)
    }

    pub fn build(self) -> PartitionTableStorage {
        PartitionTableStorage::new(self.generation, self.table)
    }
}

fn checked_app_size(slot: usize, payload: &[u8]) -> Result<u32> {
    if payload.len() > MAX_APP_SIZE {
        return Err(Error::PayloadTooLarge {
            slot,
            size: payload.len(),
            max: MAX_APP_SIZE,
        });
    }
    Ok(payload.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> PartitionTable {
        let mut table = PartitionTable {
            version: PART_TABLE_VERSION,
            ..Default::default()
        };
        table.preloaded_app[0].size = 0x0001_0203;
        table.preloaded_app[1] = PreloadedApp {
            size: 77,
            digest: [0x11; 32],
            signature: [0x22; 64],
            pubkey: [0x33; 32],
        };
        table.app_storage[2] = AppStorage {
            status: 1,
            auth: AppAuth {
                nonce: [0x44; 16],
                auth_digest: [0x66; 16],
            },
        };
        table
    }

    #[test]
    fn test_encoded_layout() {
        let bytes = sample_table().to_bytes(Generation::Signed);
        assert_eq!(bytes.len(), 397);
        assert_eq!(bytes[0], PART_TABLE_VERSION);
        // Little-endian size of slot 0.
        assert_eq!(&bytes[1..5], &[0x03, 0x02, 0x01, 0x00]);
        // Slot 1 starts after one 132-byte slot.
        let slot1 = 1 + 132;
        assert_eq!(&bytes[slot1..slot1 + 4], &77u32.to_le_bytes());
        assert_eq!(bytes[slot1 + 4], 0x11);
        assert_eq!(bytes[slot1 + 36], 0x22);
        assert_eq!(bytes[slot1 + 100], 0x33);
        // Storage area 2.
        let storage2 = 1 + 2 * 132 + 2 * 33;
        assert_eq!(bytes[storage2], 1);
        assert_eq!(bytes[storage2 + 1], 0x44);
        assert_eq!(bytes[storage2 + 17], 0x66);
    }

    #[test]
    fn test_encoded_layout_without_pubkey() {
        let bytes = sample_table().to_bytes(Generation::Unsigned);
        assert_eq!(bytes.len(), 333);
        let slot1 = 1 + 100;
        assert_eq!(&bytes[slot1..slot1 + 4], &77u32.to_le_bytes());
        assert_eq!(bytes[slot1 + 99], 0x22);
        assert_eq!(bytes[1 + 200], 0);
        assert!(!bytes.contains(&0x33));
    }

    #[test]
    fn test_table_round_trip() {
        let table = sample_table();
        let decoded =
            PartitionTable::from_bytes(&table.to_bytes(Generation::Signed), Generation::Signed)
                .unwrap();
        assert_eq!(decoded, table);

        let mut unsigned = table;
        unsigned.preloaded_app[1].pubkey = [0u8; 32];
        for generation in [Generation::Legacy, Generation::Unsigned] {
            let decoded =
                PartitionTable::from_bytes(&unsigned.to_bytes(generation), generation).unwrap();
            assert_eq!(decoded, unsigned);
        }
    }

    #[test]
    fn test_storage_sizes() {
        for generation in Generation::ALL {
            let storage = PartitionTableBuilder::new(generation).build();
            assert_eq!(storage.to_bytes().len(), generation.storage_size());
        }
    }

    #[test]
    fn test_storage_round_trip() {
        for generation in Generation::ALL {
            let storage = PartitionTableBuilder::new(generation)
                .app0(&[0xaa; 100])
                .unwrap()
                .app1(b"second stage")
                .unwrap()
                .build();
            let decoded =
                PartitionTableStorage::from_bytes(&storage.to_bytes(), generation).unwrap();
            assert_eq!(decoded, storage);
            assert!(decoded.checksum_valid());
        }
    }

    #[test]
    fn test_storage_truncated() {
        let bytes = PartitionTableBuilder::new(Generation::Signed)
            .build()
            .to_bytes();
        assert_eq!(
            PartitionTableStorage::from_bytes(&bytes[..428], Generation::Signed),
            Err(Error::Codec(CodecError::TruncatedInput {
                expected: 429,
                actual: 428
            }))
        );
    }

    #[test]
    fn test_checksum_is_over_table_bytes() {
        let storage = PartitionTableBuilder::new(Generation::Unsigned)
            .app0(&[1, 2, 3])
            .unwrap()
            .build();
        let bytes = storage.to_bytes();
        assert_eq!(
            &bytes[333..],
            crate::digest::ChecksumMode::Blake2s256
                .compute(&bytes[..333])
                .as_bytes()
        );
    }

    #[test]
    fn test_gen_checksum_deterministic() {
        let mut storage = PartitionTableBuilder::new(Generation::Signed)
            .app0(&[0u8; 10])
            .unwrap()
            .build();
        let first = *storage.checksum();
        storage.gen_checksum();
        assert_eq!(*storage.checksum(), first);
    }

    #[test]
    fn test_single_bit_change_changes_checksum() {
        let storage = PartitionTableBuilder::new(Generation::Signed)
            .app0(&[0u8; 10])
            .unwrap()
            .build();
        let original = *storage.checksum();
        let mut modified = storage.clone();
        modified.table_mut().app_storage[3].auth.nonce[15] ^= 0x01;
        // Mutation leaves the stored checksum untouched.
        assert_eq!(*modified.checksum(), original);
        assert!(!modified.checksum_valid());
        modified.gen_checksum();
        assert_ne!(*modified.checksum(), original);
        assert!(modified.checksum_valid());
    }

    #[test]
    fn test_builder_defaults() {
        let storage = PartitionTableBuilder::new(Generation::Signed)
            .app0(&[0u8; 10])
            .unwrap()
            .build();
        let table = storage.table();
        assert_eq!(table.version, PART_TABLE_VERSION);
        assert_eq!(table.preloaded_app[0].size, 10);
        assert_eq!(table.preloaded_app[0].digest, [0u8; 32]);
        assert_eq!(table.preloaded_app[0].pubkey, [0u8; 32]);
        assert_eq!(table.preloaded_app[1].size, 0);
        assert_eq!(table.preloaded_app[1].digest, [0u8; 32]);
        assert_eq!(table.preloaded_app[1].signature, [0u8; 64]);
        assert_eq!(table.preloaded_app[1].pubkey, [UNSET_PUBKEY_FILL; 32]);
        assert_eq!(table.app_storage, [AppStorage::default(); N_APP_STORAGE]);
    }

    #[test]
    fn test_unset_pubkey_never_zero_on_wire() {
        let bytes = PartitionTableBuilder::new(Generation::Signed)
            .build()
            .to_bytes();
        let pubkey1 = 1 + 132 + 100;
        assert!(bytes[pubkey1..pubkey1 + 32].iter().all(|&b| b == UNSET_PUBKEY_FILL));
    }

    #[test]
    fn test_app1_fields() {
        let app1 = b"app one payload";
        let storage = PartitionTableBuilder::from_inputs(
            Generation::Signed,
            &AppInputs {
                app0: &[0u8; 4],
                app1: Some(app1),
                app1_signature: Some([0x77; 64]),
                app1_pubkey: Some([0x88; 32]),
            },
        )
        .unwrap();
        let slot = &storage.table().preloaded_app[1];
        assert_eq!(slot.size, app1.len() as u32);
        assert_eq!(slot.digest, app_digest(app1));
        assert_eq!(slot.signature, [0x77; 64]);
        assert_eq!(slot.pubkey, [0x88; 32]);
    }

    #[test]
    fn test_pubkey_rejected_without_field() {
        let result = PartitionTableBuilder::new(Generation::Unsigned).app1_pubkey([1u8; 32]);
        assert!(matches!(
            result,
            Err(Error::UnsupportedField {
                generation: Generation::Unsigned,
                ..
            })
        ));
    }

    #[test]
    fn test_payload_ceiling() {
        let max = vec![0u8; MAX_APP_SIZE];
        assert!(PartitionTableBuilder::new(Generation::Signed)
            .app0(&max)
            .is_ok());
        let too_big = vec![0u8; MAX_APP_SIZE + 1];
        assert_eq!(
            PartitionTableBuilder::new(Generation::Signed)
                .app1(&too_big)
                .err(),
            Some(Error::PayloadTooLarge {
                slot: 1,
                size: 131073,
                max: 131072
            })
        );
    }
}
