// Licensed under the Apache-2.0 license

//! Host tool for TK1 partition tables and flash images.
//!
//! `create` writes either the bare partition table storage record or a
//! complete 1 MiB flash image, `show` prints a decoded table, and `verify`
//! checks checksums the way the bootloader does.

use std::fmt::Write;
use std::path::PathBuf;

use clap::Args;
use log::{info, warn};
use partition_table::{
    read_partition_table, AppInputs, FlashDump, Generation, PartitionTableBuilder, Report,
    TK1_FLASH_LAYOUT,
};

mod error;
pub mod files;
pub mod sigfile;

pub use error::{Result, ToolError};

use files::{load_app, read_prefix, write_output};

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Binary for preloaded app slot 0
    #[arg(long)]
    pub app0: PathBuf,

    /// Binary for preloaded app slot 1
    #[arg(long)]
    pub app1: Option<PathBuf>,

    /// Armored signature over the slot 1 binary
    #[arg(long)]
    pub app1_sig: Option<PathBuf>,

    /// Armored public key that verifies the slot 1 signature
    #[arg(long)]
    pub app1_pub: Option<PathBuf>,

    /// Write a complete flash image instead of the bare partition table
    #[arg(short, long, default_value_t = false)]
    pub flash: bool,

    /// Partition table format: legacy, unsigned or signed
    #[arg(long, default_value_t = Generation::Signed)]
    pub generation: Generation,

    /// Overwrite the output file if it exists
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Partition table or flash dump to read
    pub input: PathBuf,

    /// Treat the input as a dump of the entire flash
    #[arg(short, long, default_value_t = false)]
    pub flash: bool,

    /// Partition table format: legacy, unsigned or signed
    #[arg(long, default_value_t = Generation::Signed)]
    pub generation: Generation,
}

/// Input payloads read from disk, borrowed by [`AppInputs`].
struct LoadedApps {
    app0: Vec<u8>,
    app1: Option<Vec<u8>>,
    app1_signature: Option<[u8; 64]>,
    app1_pubkey: Option<[u8; 32]>,
}

impl LoadedApps {
    fn load(args: &CreateArgs) -> Result<Self> {
        Ok(Self {
            app0: load_app(&args.app0, 0)?,
            app1: args
                .app1
                .as_deref()
                .map(|path| load_app(path, 1))
                .transpose()?,
            app1_signature: args
                .app1_sig
                .as_deref()
                .map(sigfile::read_signature)
                .transpose()?,
            app1_pubkey: args
                .app1_pub
                .as_deref()
                .map(sigfile::read_pubkey)
                .transpose()?,
        })
    }

    fn inputs(&self) -> AppInputs<'_> {
        AppInputs {
            app0: &self.app0,
            app1: self.app1.as_deref(),
            app1_signature: self.app1_signature,
            app1_pubkey: self.app1_pubkey,
        }
    }
}

/// Writes the bare partition table storage record: table bytes then checksum.
pub fn create_partition_table(args: &CreateArgs) -> Result<()> {
    let apps = LoadedApps::load(args)?;
    let storage = PartitionTableBuilder::from_inputs(args.generation, &apps.inputs())?;
    write_output(&args.output, &storage.to_bytes(), args.force)?;
    info!(
        "{} partition table written to {}",
        args.generation,
        args.output.display()
    );
    Ok(())
}

/// Writes a complete flash image with the partition table at both copies.
pub fn create_flash_image(args: &CreateArgs) -> Result<()> {
    let apps = LoadedApps::load(args)?;
    let image = partition_table::create_flash_image(args.generation, &apps.inputs())?;
    write_output(&args.output, &image, args.force)?;
    info!("flash image written to {}", args.output.display());
    Ok(())
}

pub fn create(args: &CreateArgs) -> Result<()> {
    if args.flash {
        create_flash_image(args)
    } else {
        create_partition_table(args)
    }
}

/// Returns the report of the partition table in `args.input`.
///
/// For a flash dump the primary copy is shown. Checksums are not checked.
pub fn show(args: &ShowArgs) -> Result<String> {
    let storage = if args.flash {
        let bytes = read_prefix(&args.input, TK1_FLASH_LAYOUT.size)?;
        FlashDump::parse(&bytes, args.generation, &TK1_FLASH_LAYOUT)?
            .primary()
            .clone()
    } else {
        let bytes = read_prefix(&args.input, args.generation.storage_size())?;
        read_partition_table(&bytes, args.generation)?
    };
    Ok(Report(&storage).to_string())
}

/// Checks the partition table checksums in `args.input` and returns a summary.
///
/// Fails with [`ToolError::ChecksumMismatch`] if no copy would boot.
pub fn verify(args: &ShowArgs) -> Result<String> {
    let mut summary = String::new();
    if !args.flash {
        let bytes = read_prefix(&args.input, args.generation.storage_size())?;
        let storage = read_partition_table(&bytes, args.generation)?;
        if !storage.checksum_valid() {
            warn!("partition table checksum mismatch");
            return Err(ToolError::ChecksumMismatch);
        }
        let _ = writeln!(summary, "Partition table : ok");
        return Ok(summary);
    }

    let bytes = read_prefix(&args.input, TK1_FLASH_LAYOUT.size)?;
    let dump = FlashDump::parse(&bytes, args.generation, &TK1_FLASH_LAYOUT)?;
    let verification = dump.verify();
    let Some(active) = verification.active() else {
        return Err(ToolError::ChecksumMismatch);
    };

    let status = |ok: bool| if ok { "ok" } else { "bad checksum" };
    let _ = writeln!(summary, "Primary table   : {}", status(verification.primary_valid));
    let _ = writeln!(summary, "Mirror table    : {}", status(verification.mirror_valid));
    let _ = writeln!(
        summary,
        "Copies match    : {}",
        if verification.mirrored { "yes" } else { "no" }
    );
    let app1 = match verification.app1_digest_valid {
        None => "empty",
        Some(true) => "ok",
        Some(false) => "digest mismatch",
    };
    let _ = writeln!(summary, "Preloaded app 1 : {app1}");
    let _ = writeln!(summary, "Boots from      : {active:?}");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_app1_sig_without_app1() {
        let dir = tempdir().unwrap();
        let app0 = dir.path().join("app0.bin");
        std::fs::write(&app0, b"app0").unwrap();
        let sig = dir.path().join("app1.sig");
        sigfile::write_armor(
            &sig,
            &partition_table::FixedCodec::to_vec(&sigfile::SignatureRecord::new(0, [9; 64])),
            "sig",
            false,
        )
        .unwrap();

        let args = CreateArgs {
            output: dir.path().join("table.bin"),
            app0,
            app1: None,
            app1_sig: Some(sig),
            app1_pub: None,
            flash: false,
            generation: Generation::Signed,
            force: false,
        };
        let apps = LoadedApps::load(&args).unwrap();
        let inputs = apps.inputs();
        assert_eq!(inputs.app0, b"app0");
        assert!(inputs.app1.is_none());
        assert_eq!(inputs.app1_signature, Some([9; 64]));
    }
}
