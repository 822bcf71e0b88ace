use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the command line
    let level: LevelFilter = match (cli.log_level, cli.verbose) {
        (Some(level), _) => level.filter(),
        (None, true) => LevelFilter::DEBUG,
        (None, false) => LevelFilter::WARN,
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("strata_config={},strata_cli={}", level, level))
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(&cli)?;
    debug!(
        "Resolved {} source(s), profiles [{}]",
        config.sources().len(),
        config.profiles().join(",")
    );

    let _unlocked = cli.unlock.then(strata_config::SecretKeys::unlock);
    commands::execute(&config, &cli.command)
}
