//! Boutique Catalog CLI

use std::process;

use boutique_app::observability;
use clap::Parser;
use tracing::error;

use crate::cli::Cli;

mod cli;

#[tokio::main]
pub async fn main() {
    let _env = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(error) = observability::init(cli.logging()) {
        eprintln!("{error}");
        process::exit(1);
    }

    if let Err(error) = cli.run().await {
        error!(%error, "command failed");
        process::exit(1);
    }
}
