use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// How much of the resolution process is written to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Only command output
    Off,
    /// Failures to load a source or bind a mapping
    Error,
    Warn,
    /// Loaded files and active profiles
    Info,
    /// Every lookup and interceptor decision
    Debug,
    Trace,
}

impl LogLevel {
    pub fn filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "strata - inspect layered configuration the way an application resolves it")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level for the resolution trace. RUST_LOG wins when set.
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Active profiles, comma separated (overrides strata.profile)
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Properties file; profile siblings such as app-dev.properties are loaded too
    #[arg(short = 'P', long = "properties", global = true, value_name = "FILE")]
    pub properties: Vec<PathBuf>,

    /// TOML file
    #[arg(short = 'T', long = "toml", global = true, value_name = "FILE")]
    pub toml: Vec<PathBuf>,

    /// .env file (defaults to ./.env when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub dotenv: Option<PathBuf>,

    /// Do not read the process environment
    #[arg(long = "no-env", global = true)]
    pub no_env: bool,

    /// Set a property with the highest priority
    #[arg(short = 'D', long = "set", global = true, value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Treat names matching this pattern as secret
    #[arg(long = "secret", global = true, value_name = "PATTERN")]
    pub secrets: Vec<String>,

    /// Allow reading secret properties
    #[arg(long, global = true)]
    pub unlock: bool,

    /// Disable ${...} expansion
    #[arg(long = "no-expand", global = true)]
    pub no_expand: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the resolved value of a property
    Get {
        /// Property name
        name: String,

        /// Also print where the value came from
        #[arg(short, long)]
        source: bool,
    },

    /// Print a property as written, before expansion
    Raw {
        /// Property name
        name: String,
    },

    /// Print a list property, one element per line
    List {
        /// Property name
        name: String,
    },

    /// Print every property name
    Names,

    /// Print every property with its value and source
    Dump,

    /// Print the sources in priority order
    Sources,

    /// Print the active profiles
    Profiles,
}
