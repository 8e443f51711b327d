use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ipshield",
    about = "IP Shield: timestamped proof of existence for creative work",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: ipshield.toml, if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the fingerprint of a file
    Hash(HashArgs),
    /// Register one or more files on the ledger
    Register(RegisterArgs),
    /// Check whether a fingerprint or file is registered
    Verify(VerifyArgs),
    /// List every registration on the ledger
    List,
    /// Show the networks the registry is deployed on
    Networks,
    /// Show network, identity, and registration counts
    Status,
}

#[derive(Args)]
pub struct HashArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Display name (single file only; defaults to the file name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Media type (defaults to a guess from the file extension)
    #[arg(short, long)]
    pub media_type: Option<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Fingerprint to look up (hex, `0x` prefix optional)
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub fingerprint: Option<String>,

    /// Fingerprint this file and look it up
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}
