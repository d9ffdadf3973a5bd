// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use flashlog_cli::commands::{append, clear, dump, format, info, Target};
use flashlog::ChipInfo;
use flashlog_cli::telemetry;

#[derive(Parser)]
#[command(name = "flashlog")]
#[command(about = "Inspect and maintain circular event logs stored in flash images", long_about = None)]
struct Cli {
    /// Flash image file
    #[arg(long, short, global = true, default_value = "flash.img")]
    image: PathBuf,

    /// State sidecar (defaults to <image>.state)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// JSON log configuration
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Erase sector size of the image
    #[arg(long, global = true, default_value_t = ChipInfo::SST26VF064B.sector_size)]
    sector_size: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an erased image and an empty state file
    Format {
        /// Image size in bytes
        #[arg(long, default_value_t = ChipInfo::SST26VF064B.capacity)]
        capacity: u32,
    },
    /// Show geometry and position of the log
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Append records (write-through)
    Append {
        /// One record per payload, zero padded to the record size
        #[arg(required = true)]
        payloads: Vec<String>,

        /// Payloads are hex encoded
        #[arg(long = "hex")]
        as_hex: bool,
    },
    /// List stored records, newest first
    Dump {
        /// Show at most this many records
        #[arg(long, short)]
        limit: Option<u32>,
    },
    /// Erase the log region
    Clear,
}

fn main() -> anyhow::Result<()> {
    telemetry::init_telemetry();

    let cli = Cli::parse();
    let target = Target::new(&cli.image, cli.state, cli.config, cli.sector_size)?;

    match cli.command {
        Commands::Format { capacity } => format::run(&target, capacity).map(|_| ()),
        Commands::Info { json } => info::run(&target, json).map(|_| ()),
        Commands::Append { payloads, as_hex } => {
            append::run(&target, &payloads, as_hex).map(|_| ())
        }
        Commands::Dump { limit } => dump::run(&target, limit),
        Commands::Clear => clear::run(&target),
    }
}
