// Licensed under the Apache-2.0 license

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use tkeyimage::{CreateArgs, ShowArgs};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log more; repeat for debug output
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a partition table or a full flash image
    Create(CreateArgs),
    /// Print a partition table or the primary table of a flash dump
    Show(ShowArgs),
    /// Check partition table checksums and the slot 1 digest
    Verify(ShowArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    SimpleLogger::new().with_level(level).env().init()?;

    match &cli.command {
        Commands::Create(args) => tkeyimage::create(args)
            .with_context(|| format!("failed to create {}", args.output.display())),
        Commands::Show(args) => {
            let report = tkeyimage::show(args)
                .with_context(|| format!("failed to read {}", args.input.display()))?;
            print!("{report}");
            Ok(())
        }
        Commands::Verify(args) => {
            let summary = tkeyimage::verify(args)
                .with_context(|| format!("failed to verify {}", args.input.display()))?;
            print!("{summary}");
            Ok(())
        }
    }
}
