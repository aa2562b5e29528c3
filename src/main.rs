//! LoopHub command-line client.

use clap::Parser;
use loophub::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "loophub=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
