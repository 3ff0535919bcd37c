use anyhow::{anyhow, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::Cli;

fn init_logging(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.with_target(false).try_init()
    };
    installed.map_err(|e| anyhow!("Failed to install logger: {}", e))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json)?;
    cli::run(cli.command)
}
