use clap::Parser;
use tracing_subscriber::EnvFilter;

use gitsql::cli::{self, Args};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    cli::run(args)?;
    Ok(())
}
