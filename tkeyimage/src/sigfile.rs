// Licensed under the Apache-2.0 license

//! Armored signature and public key files.
//!
//! An armor file is one `untrusted comment:` line followed by one line of
//! base64 holding a big-endian record. Only the second line is decoded.

use std::path::Path;

use log::debug;
use partition_table::FixedCodec;
use zerocopy::byteorder::{BigEndian, U16, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Result, ToolError};
use crate::files::{load_file, write_output};

/// Algorithm tag of Ed25519 records.
pub const ALG_ED25519: [u8; 2] = *b"Ed";

const COMMENT_PREFIX: &str = "untrusted comment: ";

/// Detached signature as stored in a `.sig` file.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SignatureRecord {
    pub alg: U16<BigEndian>,
    pub key_num: U64<BigEndian>,
    pub sig: [u8; 64],
}

/// Signer public key as stored in a `.pub` file.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PubkeyRecord {
    pub alg: U16<BigEndian>,
    pub key_num: U64<BigEndian>,
    pub pubkey: [u8; 32],
}

impl SignatureRecord {
    pub fn new(key_num: u64, sig: [u8; 64]) -> Self {
        Self {
            alg: u16::from_be_bytes(ALG_ED25519).into(),
            key_num: key_num.into(),
            sig,
        }
    }
}

impl PubkeyRecord {
    pub fn new(key_num: u64, pubkey: [u8; 32]) -> Self {
        Self {
            alg: u16::from_be_bytes(ALG_ED25519).into(),
            key_num: key_num.into(),
            pubkey,
        }
    }
}

fn malformed(path: &Path, reason: impl ToString) -> ToolError {
    ToolError::MalformedArmor {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Returns the decoded payload line of an armor file.
pub fn read_armor(path: &Path) -> Result<Vec<u8>> {
    let input = load_file(path)?;
    let text = String::from_utf8(input).map_err(|e| malformed(path, e))?;
    let mut lines = text.split('\n');
    let payload = match (lines.next(), lines.next()) {
        (Some(_), Some(payload)) => payload.trim_end_matches('\r'),
        _ => return Err(malformed(path, "too few lines")),
    };
    if payload.is_empty() {
        return Err(malformed(path, "empty payload line"));
    }
    let data = base64::decode(payload).map_err(|e| malformed(path, e))?;
    debug!("{}: {} byte armored record", path.display(), data.len());
    Ok(data)
}

fn read_record<T: FixedCodec>(path: &Path) -> Result<T> {
    let data = read_armor(path)?;
    T::decode(&data).map_err(|e| malformed(path, e))
}

pub fn read_signature(path: &Path) -> Result<[u8; 64]> {
    let record: SignatureRecord = read_record(path)?;
    Ok(record.sig)
}

pub fn read_pubkey(path: &Path) -> Result<[u8; 32]> {
    let record: PubkeyRecord = read_record(path)?;
    Ok(record.pubkey)
}

/// Writes `record` base64 encoded under an `untrusted comment:` line.
/// Fails with `OutputExists` if the file exists and `overwrite` is false.
pub fn write_armor(path: &Path, record: &[u8], comment: &str, overwrite: bool) -> Result<()> {
    let text = format!("{COMMENT_PREFIX}{comment}\n{}\n", base64::encode(record));
    write_output(path, text.as_bytes(), overwrite)
}
