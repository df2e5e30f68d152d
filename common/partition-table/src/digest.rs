// Licensed under the Apache-2.0 license

use blake2::digest::{consts::U16, KeyInit, Mac};
use blake2::{Blake2s256, Blake2sMac, Digest};

pub const APP_DIGEST_SIZE: usize = 32;

/// Key used by the keyed checksum of the oldest table format.
const KEYED_CHECKSUM_KEY: [u8; 16] = [0u8; 16];

/// BLAKE2s-256 digest of a preloaded app binary.
pub fn app_digest(data: &[u8]) -> [u8; APP_DIGEST_SIZE] {
    Blake2s256::digest(data).into()
}

/// How the partition table checksum is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumMode {
    /// Unkeyed BLAKE2s with a 32-byte output.
    Blake2s256,
    /// BLAKE2s keyed with 16 zero bytes, 16-byte output.
    KeyedBlake2s128,
}

impl ChecksumMode {
    pub const fn size(self) -> usize {
        match self {
            ChecksumMode::Blake2s256 => 32,
            ChecksumMode::KeyedBlake2s128 => 16,
        }
    }

    pub fn compute(self, data: &[u8]) -> Checksum {
        match self {
            ChecksumMode::Blake2s256 => Checksum::Blake2s256(Blake2s256::digest(data).into()),
            ChecksumMode::KeyedBlake2s128 => {
                // The key length is part of the BLAKE2s parameter block, so the
                // 16-byte key goes through `new_from_slice`, not the 32-byte `new`.
                let mut mac = <Blake2sMac<U16> as KeyInit>::new_from_slice(&KEYED_CHECKSUM_KEY)
                    .expect("16-byte key is within the BLAKE2s key limit");
                Mac::update(&mut mac, data);
                Checksum::KeyedBlake2s128(mac.finalize().into_bytes().into())
            }
        }
    }
}

/// A partition table checksum as stored after the table bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checksum {
    Blake2s256([u8; 32]),
    KeyedBlake2s128([u8; 16]),
}

impl Checksum {
    pub fn zeroed(mode: ChecksumMode) -> Self {
        match mode {
            ChecksumMode::Blake2s256 => Checksum::Blake2s256([0u8; 32]),
            ChecksumMode::KeyedBlake2s128 => Checksum::KeyedBlake2s128([0u8; 16]),
        }
    }

    /// Reads a checksum of the given mode from the start of `bytes`.
    ///
    /// Returns `None` if `bytes` is shorter than the checksum.
    pub fn from_bytes(mode: ChecksumMode, bytes: &[u8]) -> Option<Self> {
        let mut checksum = Self::zeroed(mode);
        let dst = match &mut checksum {
            Checksum::Blake2s256(b) => &mut b[..],
            Checksum::KeyedBlake2s128(b) => &mut b[..],
        };
        let src = bytes.get(..dst.len())?;
        dst.copy_from_slice(src);
        Some(checksum)
    }

    pub fn mode(&self) -> ChecksumMode {
        match self {
            Checksum::Blake2s256(_) => ChecksumMode::Blake2s256,
            Checksum::KeyedBlake2s128(_) => ChecksumMode::KeyedBlake2s128,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Checksum::Blake2s256(b) => b,
            Checksum::KeyedBlake2s128(b) => b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake2s256_known_answer() {
        // BLAKE2s-256("abc") from RFC 7693.
        assert_eq!(
            hex::encode(app_digest(b"abc")),
            "508c5e8c327c14e2e1a72ba34eeb452f37458b209ed63a294d999b4c86675982"
        );
    }

    #[test]
    fn test_keyed_blake2s128_known_answer() {
        assert_eq!(
            hex::encode(ChecksumMode::KeyedBlake2s128.compute(b"abc").as_bytes()),
            "671cae2cb6af4c3fe71f008d16ab1253"
        );
    }

    #[test]
    fn test_key_length_is_significant() {
        // A zero key padded to 32 bytes must not give the 16-byte key's checksum.
        let mut padded = <Blake2sMac<U16> as KeyInit>::new_from_slice(&[0u8; 32]).unwrap();
        Mac::update(&mut padded, b"abc");
        assert_ne!(
            hex::encode(padded.finalize().into_bytes()),
            "671cae2cb6af4c3fe71f008d16ab1253"
        );
    }

    #[test]
    fn test_checksum_sizes() {
        for mode in [ChecksumMode::Blake2s256, ChecksumMode::KeyedBlake2s128] {
            let checksum = mode.compute(b"partition table");
            assert_eq!(checksum.as_bytes().len(), mode.size());
            assert_eq!(checksum.mode(), mode);
        }
    }

    #[test]
    fn test_keyed_differs_from_truncated_unkeyed() {
        let unkeyed = ChecksumMode::Blake2s256.compute(b"table");
        let keyed = ChecksumMode::KeyedBlake2s128.compute(b"table");
        assert_ne!(&unkeyed.as_bytes()[..16], keyed.as_bytes());
    }

    #[test]
    fn test_compute_is_deterministic() {
        let data = [0x5au8; 333];
        assert_eq!(
            ChecksumMode::KeyedBlake2s128.compute(&data),
            ChecksumMode::KeyedBlake2s128.compute(&data)
        );
        assert_eq!(
            ChecksumMode::Blake2s256.compute(&data),
            ChecksumMode::Blake2s256.compute(&data)
        );
    }

    #[test]
    fn test_from_bytes() {
        let bytes: Vec<u8> = (0..40).collect();
        let checksum = Checksum::from_bytes(ChecksumMode::KeyedBlake2s128, &bytes).unwrap();
        assert_eq!(checksum.as_bytes(), &bytes[..16]);
        assert!(Checksum::from_bytes(ChecksumMode::Blake2s256, &bytes[..31]).is_none());
    }
}
