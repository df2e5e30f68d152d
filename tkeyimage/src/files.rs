// Licensed under the Apache-2.0 license

use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;

use log::{debug, info};
use partition_table::MAX_APP_SIZE;
use tempfile::Builder;

use crate::error::{Result, ToolError};

/// Reads a whole input file.
pub fn load_file(path: &Path) -> Result<Vec<u8>> {
    let not_found = |source: io::Error| ToolError::InputNotFound {
        path: path.to_path_buf(),
        source,
    };
    let mut buffer = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut buffer))
        .map_err(not_found)?;
    debug!("read {} bytes from {}", buffer.len(), path.display());
    Ok(buffer)
}

/// Reads a preloaded app binary for `slot`.
///
/// Stops reading one byte past [`MAX_APP_SIZE`], so an oversized file is
/// rejected without being loaded in full.
pub fn load_app(path: &Path, slot: usize) -> Result<Vec<u8>> {
    let not_found = |source: io::Error| ToolError::InputNotFound {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(not_found)?;
    let mut buffer = Vec::new();
    file.take(MAX_APP_SIZE as u64 + 1)
        .read_to_end(&mut buffer)
        .map_err(not_found)?;
    if buffer.len() > MAX_APP_SIZE {
        let size = fs::metadata(path)
            .map(|m| m.len() as usize)
            .unwrap_or(buffer.len());
        return Err(partition_table::Error::PayloadTooLarge {
            slot,
            size,
            max: MAX_APP_SIZE,
        }
        .into());
    }
    debug!("app {slot}: {} bytes from {}", buffer.len(), path.display());
    Ok(buffer)
}

/// Reads exactly the first `len` bytes of a file; any trailing bytes are ignored.
pub fn read_prefix(path: &Path, len: usize) -> Result<Vec<u8>> {
    let not_found = |source: io::Error| ToolError::InputNotFound {
        path: path.to_path_buf(),
        source,
    };
    let mut buffer = Vec::with_capacity(len);
    File::open(path)
        .and_then(|file| file.take(len as u64).read_to_end(&mut buffer))
        .map_err(not_found)?;
    if buffer.len() < len {
        return Err(ToolError::UnexpectedEof {
            path: path.to_path_buf(),
            expected: len,
            actual: buffer.len(),
        });
    }
    Ok(buffer)
}

/// Writes `data` to `path` through a temporary file in the same directory,
/// so the destination either keeps its old content or gets all of `data`.
pub fn write_output(path: &Path, data: &[u8], overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(ToolError::OutputExists {
            path: path.to_path_buf(),
        });
    }
    let write_failure = |source: io::Error| ToolError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    // An overwritten file keeps its mode; a new one gets 0666 less the umask.
    let existing = if overwrite {
        fs::metadata(path).ok().map(|m| m.permissions())
    } else {
        None
    };
    let mut builder = Builder::new();
    // The mode goes to open(2), which applies the umask.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut tmp = builder.tempfile_in(dir).map_err(write_failure)?;
    if let Some(permissions) = existing {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(write_failure)?;
    }
    tmp.write_all(data)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(write_failure)?;

    let persisted = if overwrite {
        tmp.persist(path)
    } else {
        tmp.persist_noclobber(path)
    };
    match persisted {
        Ok(_) => {}
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
            return Err(ToolError::OutputExists {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(write_failure(e.error)),
    }
    info!("wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}
