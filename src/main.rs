use std::path::Path;

use clap::Parser;
use pathlist::cli::commands::Cli;
use pathlist::cli::handlers;
use pathlist::io::config_io::{read_config, resolve_data_dir};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding a tracing filter, e.g. `pathlist=debug`
const LOG_ENV: &str = "PATHLIST_LOG";

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = resolve_data_dir(cli.data_dir.as_deref().map(Path::new))?;
    let config = read_config(&data_dir)?;
    init_tracing(&config.log.level);
    tracing::debug!(data_dir = %data_dir.display(), "starting");
    handlers::dispatch(cli, data_dir, config)
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
