// Licensed under the Apache-2.0 license

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("cannot read '{}'", path.display())]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("'{}' ends after {actual} bytes, expected at least {expected}", path.display())]
    UnexpectedEof {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
    #[error("malformed armor file '{}': {reason}", path.display())]
    MalformedArmor { path: PathBuf, reason: String },
    #[error("'{}' already exists, use --force to overwrite", path.display())]
    OutputExists { path: PathBuf },
    #[error("cannot write '{}'", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no partition table copy has a valid checksum")]
    ChecksumMismatch,
    #[error(transparent)]
    Image(#[from] partition_table::Error),
}

pub type Result<T> = core::result::Result<T, ToolError>;
