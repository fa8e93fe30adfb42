//! pinvault CLI - a PIN-protected encrypted file vault.
//!
//! Command-line interface over the core library. Commands that touch vault
//! contents prompt for the PIN and go through the access controller, so the
//! attempt counter and lockout apply across invocations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pinvault_core::VERSION;
use tracing_subscriber::EnvFilter;

mod commands;

/// pinvault - hide files behind a numeric PIN
#[derive(Parser)]
#[command(name = "pinvault")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the vault store
    #[arg(
        short = 's',
        long = "vault",
        global = true,
        env = "PINVAULT_PATH",
        default_value = "pinvault.db"
    )]
    vault: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up a PIN for a fresh vault
    Setup {
        /// Generate a random policy-satisfying PIN and print it
        #[arg(long)]
        generate: bool,
    },

    /// Show the current vault state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a random PIN satisfying the policy (does not touch the vault)
    GenPin,

    /// List files stored in the vault
    Ls,

    /// Encrypt and store a file
    Add {
        /// File to encrypt into the vault
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Stored name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Mime type recorded with the file
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
    },

    /// Decrypt a file to a path or stdout
    Get {
        /// File id (32-character hex)
        #[arg(value_name = "ID")]
        id: String,

        /// Write the plaintext here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a file and its encryption metadata
    Rm {
        /// File id (32-character hex)
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Export an encrypted backup of all files
    Backup {
        /// Write the backup here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import files from an encrypted backup
    Restore {
        /// Backup file produced by `backup`
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Wipe the vault: PIN, files, metadata and sessions.
    /// All encrypted content is permanently lost.
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Setup { generate } => commands::setup(&cli.vault, generate),
        Commands::Status { json } => commands::status(&cli.vault, json),
        Commands::GenPin => commands::gen_pin(),
        Commands::Ls => commands::list(&cli.vault),
        Commands::Add { path, name, mime } => commands::add(&cli.vault, &path, name, &mime),
        Commands::Get { id, output } => commands::get(&cli.vault, &id, output.as_deref()),
        Commands::Rm { id } => commands::remove(&cli.vault, &id),
        Commands::Backup { output } => commands::backup(&cli.vault, output.as_deref()),
        Commands::Restore { input } => commands::restore(&cli.vault, &input),
        Commands::Reset { yes } => commands::reset(&cli.vault, yes),
    }
}
