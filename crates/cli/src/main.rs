//! Corner Shop CLI - seeding and mirror tools.
//!
//! # Usage
//!
//! ```bash
//! # Validate a seed file
//! cs-cli seed --file seed.json --dry-run
//!
//! # Seed the hosted collections
//! cs-cli seed --file seed.json
//!
//! # Print a seed file as normalized JSON (ids filled in)
//! cs-cli seed --file seed.json --print
//!
//! # Inspect the on-disk mirror
//! cs-cli mirror show --dir ./mirror --store products
//!
//! # Prime the mirror from a seed file
//! cs-cli mirror prime --dir ./mirror --file seed.json
//! ```
//!
//! # Commands
//!
//! - `seed` - Validate and upload products and orders
//! - `mirror show` - Print a mirrored store
//! - `mirror prime` - Write a seed file into the mirror

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cs-cli")]
#[command(author, version, about = "Corner Shop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the hosted collections from a JSON file
    Seed {
        /// Seed file with `products` and `orders` arrays
        #[arg(short, long)]
        file: PathBuf,

        /// Validate only, do not write anything
        #[arg(long)]
        dry_run: bool,

        /// Print the normalized seed file and exit
        #[arg(long, conflicts_with = "dry_run")]
        print: bool,
    },
    /// Inspect or prime the on-disk mirror
    Mirror {
        #[command(subcommand)]
        action: MirrorAction,
    },
}

#[derive(Subcommand)]
enum MirrorAction {
    /// Print every record of a mirrored store
    Show {
        /// Mirror directory
        #[arg(short, long)]
        dir: PathBuf,

        /// Store name (`products`, `orders`)
        #[arg(short, long, default_value = "products")]
        store: String,
    },
    /// Replace the mirrored stores with a seed file
    Prime {
        /// Mirror directory
        #[arg(short, long)]
        dir: PathBuf,

        /// Seed file with `products` and `orders` arrays
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

#[allow(clippy::print_stdout)]
async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Seed {
            file,
            dry_run,
            print,
        } => {
            if print {
                let value = commands::seed::describe(&file).await?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                commands::seed::run(&file, dry_run).await?;
            }
        }
        Commands::Mirror { action } => match action {
            MirrorAction::Show { dir, store } => {
                let records = commands::mirror::show(&dir, &store).await?;
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
            MirrorAction::Prime { dir, file } => {
                commands::mirror::prime(&dir, &file).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_print_conflicts_with_dry_run() {
        let parsed = Cli::try_parse_from(["cs-cli", "seed", "-f", "s.json", "--dry-run", "--print"]);
        assert!(parsed.is_err());
    }
}
