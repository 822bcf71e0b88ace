//! Source assembly and command execution.

use crate::cli::{Cli, Commands};
use anyhow::{bail, Context, Result};
use std::path::Path;
use strata_config::interceptor::ProfileInterceptor;
use strata_config::source::resolve_path;
use strata_config::{
    ArgsSource, Config, ConfigBuilder, ConfigValue, DotEnvSource, PropertiesSource,
    TomlSource,
};
use tracing::{debug, info};

/// Build the configuration described by the global options.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base_dir = std::env::current_dir().context("Failed to read the working directory")?;
    let profiles = cli
        .profile
        .as_deref()
        .map(ProfileInterceptor::parse_profiles)
        .unwrap_or_default();

    let mut builder = ConfigBuilder::new().with_expressions(!cli.no_expand);
    if !cli.no_env {
        builder = builder.add_default_sources();
    }
    if cli.profile.is_some() {
        builder = builder.with_profiles(&profiles);
    }

    let dotenv = match &cli.dotenv {
        Some(path) => Some(DotEnvSource::load(resolve(path, &base_dir))?),
        None => DotEnvSource::load_optional(base_dir.join(".env"))?,
    };
    if let Some(dotenv) = dotenv {
        builder = builder.with_source(dotenv);
    }

    for path in &cli.properties {
        let path = resolve(path, &base_dir);
        let sources = PropertiesSource::load_with_profiles(&path, profiles.as_slice())
            .with_context(|| format!("Failed to load {}", path.display()))?;
        info!("Loaded {} properties file(s) for {}", sources.len(), path.display());
        for source in sources {
            builder = builder.with_source(source);
        }
    }

    for path in &cli.toml {
        let path = resolve(path, &base_dir);
        let source =
            TomlSource::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;
        builder = builder.with_source(source);
    }

    if !cli.overrides.is_empty() {
        let args = cli.overrides.iter().map(|o| format!("--{}", o));
        builder = builder.with_source(ArgsSource::new(args));
    }

    if !cli.secrets.is_empty() {
        builder = builder.with_secret_keys(cli.secrets.iter().cloned());
    }

    Ok(builder
        .with_lookup_logging(cli.verbose)
        .build()?)
}

fn resolve(path: &Path, base_dir: &Path) -> std::path::PathBuf {
    resolve_path(&path.to_string_lossy(), base_dir)
}

/// Run one command against a built configuration.
pub fn execute(config: &Config, command: &Commands) -> Result<()> {
    match command {
        Commands::Get { name, source } => {
            let value = resolved(config, name)?;
            if *source {
                println!("{}", describe(&value));
            } else {
                println!("{}", value.value());
            }
        }
        Commands::Raw { name } => match config.get_raw_value(name)? {
            Some(raw) => println!("{}", raw),
            None => bail!("{} is not set", name),
        },
        Commands::List { name } => {
            for item in config.get_values::<String>(name)? {
                println!("{}", item);
            }
        }
        Commands::Names => {
            for name in config.property_names() {
                println!("{}", name);
            }
        }
        Commands::Dump => {
            for name in config.property_names() {
                // Skip names whose value does not resolve, e.g. failed expansions
                match resolved(config, &name) {
                    Ok(value) => println!("{}", describe(&value)),
                    Err(e) => debug!("Skipping {}: {}", name, e),
                }
            }
        }
        Commands::Sources => {
            for source in config.sources().iter() {
                println!("{:>11}  {}", source.ordinal(), source.name());
            }
        }
        Commands::Profiles => {
            for profile in config.profiles() {
                println!("{}", profile);
            }
        }
    }
    Ok(())
}

fn resolved(config: &Config, name: &str) -> Result<ConfigValue> {
    let Some(value) = config.get_config_value(name)? else {
        bail!("{} is not set", name);
    };
    if let Some(problem) = value.problems().first() {
        return Err(problem.to_error().into());
    }
    Ok(value)
}

fn describe(value: &ConfigValue) -> String {
    let mut line = format!(
        "{} = {}  [{} ({})",
        value.name(),
        value.value(),
        value.source_name(),
        value.source_ordinal()
    );
    if let Some(number) = value.line_number() {
        line.push_str(&format!(":{}", number));
    }
    line.push(']');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("strata").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_files_profiles_and_overrides() {
        let dir = TempDir::new().expect("temp dir");
        let props = dir.path().join("app.properties");
        fs::write(&props, "host=base\nport=1\nurl=http://${host}:${port}\n").unwrap();
        fs::write(dir.path().join("app-dev.properties"), "host=dev\n").unwrap();

        let cli = parse(&[
            "--no-env",
            "--dotenv",
            dir.path().join("missing.env").to_str().unwrap(),
            "-P",
            props.to_str().unwrap(),
            "-p",
            "dev",
            "-D",
            "port=2",
            "names",
        ]);
        // A missing explicit .env file is an error
        assert!(load_config(&cli).is_err());

        let cli = parse(&[
            "--no-env",
            "-P",
            props.to_str().unwrap(),
            "-p",
            "dev",
            "-D",
            "port=2",
            "names",
        ]);
        let config = load_config(&cli).expect("config should load");
        assert_eq!(config.profiles(), ["dev".to_string()]);
        assert_eq!(config.get_value::<String>("url").unwrap(), "http://dev:2");
    }

    #[test]
    fn test_secret_flags() {
        let cli = parse(&["--no-env", "-D", "token=abc", "--secret", "token", "get", "token"]);
        let config = load_config(&cli).expect("config should load");
        assert!(execute(&config, &cli.command).is_err());

        let _unlocked = strata_config::SecretKeys::unlock();
        assert!(execute(&config, &cli.command).is_ok());
    }

    #[test]
    fn test_log_level_flag() {
        use tracing_subscriber::filter::LevelFilter;

        let cli = parse(&["-l", "info", "names"]);
        assert_eq!(cli.log_level.map(|l| l.filter()), Some(LevelFilter::INFO));
        assert!(parse(&["names"]).log_level.is_none());
    }

    #[test]
    fn test_missing_property_fails() {
        let cli = parse(&["--no-env", "raw", "nope"]);
        let config = load_config(&cli).expect("config should load");
        assert!(execute(&config, &cli.command).is_err());
    }
}
