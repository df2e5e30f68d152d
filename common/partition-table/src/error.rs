// Licensed under the Apache-2.0 license

use thiserror::Error;

use crate::codec::CodecError;
use crate::generation::Generation;

/// Errors produced while building or decoding partition tables and flash images.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("preloaded app {slot} is {size} bytes; the slot holds at most {max} bytes")]
    PayloadTooLarge { slot: usize, size: usize, max: usize },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("{field} is not part of the {generation} partition table format")]
    UnsupportedField {
        generation: Generation,
        field: &'static str,
    },
    #[error("invalid flash layout: {0}")]
    InvalidLayout(String),
}
