use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::image::ImageArgs;

#[derive(Parser)]
#[command(name = "memsig")]
#[command(about = "Resolve byte signatures inside module images")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the compiled pattern and skip table of a signature
    Compile {
        /// Signature such as "48 8B ?? ?? 05"
        signature: String,
    },
    /// Resolve signatures against an image file
    Scan {
        #[command(flatten)]
        image: ImageArgs,

        /// Signatures or exported symbol names
        #[arg(required = true)]
        signatures: Vec<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve every entry of a signature set against an image file
    Resolve {
        #[command(flatten)]
        image: ImageArgs,

        /// Signature set (JSON)
        #[arg(short, long, env = "MEMSIG_SIGNATURES")]
        signatures: PathBuf,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("memsig=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Compile { signature } => commands::compile::run(&signature),
        Command::Scan {
            image,
            signatures,
            json,
        } => commands::scan::run(&image, &signatures, json),
        Command::Resolve {
            image,
            signatures,
            json,
        } => commands::resolve::run(&image, &signatures, json),
    }
}
