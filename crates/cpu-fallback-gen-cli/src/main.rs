use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

#[derive(Parser)]
#[command(name = "cpu-fallback-gen")]
#[command(author, version, about = "Generate CPU fallback kernels for an external backend", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the fallback header and source for a manifest
    Generate {
        /// Path to the operator manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Directory the generated files are written to
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Generator options (JSON); defaults target XLA
        #[arg(long)]
        options: Option<PathBuf>,
    },

    /// Show which manifest functions get a fallback
    List {
        /// Path to the operator manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Generate {
            manifest,
            out_dir,
            options,
        } => {
            let options = commands::load_options(options.as_deref())?;
            let written = commands::generate(&manifest, &out_dir, &options)?;
            println!("{}", written.header.display());
            println!("{}", written.source.display());
        }
        Commands::List { manifest, json } => {
            print!("{}", commands::list(&manifest, json)?);
        }
    }

    Ok(())
}
