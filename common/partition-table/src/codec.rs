// Licensed under the Apache-2.0 license

use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated input: need {expected} bytes, got {actual}")]
    TruncatedInput { expected: usize, actual: usize },
    #[error("output buffer too short: need {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },
}

/// A record with a fixed wire size and a fixed field order.
///
/// Byte order is a property of the record type, carried by the
/// `zerocopy::byteorder` wrappers of its fields, so there is no per-call
/// endianness argument. Records never contain implicit padding.
pub trait FixedCodec: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Encodes the record into the start of `buffer`.
    ///
    /// Returns the number of bytes written, which is always `SIZE`.
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError>;

    /// Decodes a record from the start of `buffer`. Trailing bytes are ignored.
    fn decode(buffer: &[u8]) -> Result<Self, CodecError>;

    /// Encodes the record into a new `SIZE`-byte vector.
    fn to_vec(&self) -> Vec<u8>;
}

impl<T> FixedCodec for T
where
    T: FromBytes + IntoBytes + Immutable + KnownLayout + Sized,
{
    const SIZE: usize = core::mem::size_of::<T>();

    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        let actual = buffer.len();
        self.write_to_prefix(buffer)
            .map_err(|_| CodecError::BufferTooShort {
                expected: Self::SIZE,
                actual,
            })
            .map(|_| Self::SIZE)
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        Ok(Self::read_from_prefix(buffer)
            .map_err(|_| CodecError::TruncatedInput {
                expected: Self::SIZE,
                actual: buffer.len(),
            })?
            .0)
    }

    fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}
