//! # Strata Configuration Library
//!
//! Layered configuration resolution with deterministic precedence, profiles, `${...}`
//! expressions, secret gating, and structural mapping of flat property names into nested
//! values.
//!
//! ## Features
//!
//! - Ordered sources: environment, `.env`, properties and TOML files, arguments, maps
//! - Interceptor chain with relocation, fallback, profile overlay and expression expansion
//! - Typed lookups through a converter registry
//! - Schema driven mapping with aggregated validation problems
//! - Secret keys readable only inside an explicit scope
//! - `${handler::secret}` values decoded by registered secret keys handlers
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_config::{ConfigBuilder, MapSource, SecretKeys};
//!
//! let config = ConfigBuilder::new()
//!     .with_source(MapSource::new(
//!         "app",
//!         [
//!             ("db.host", "localhost"),
//!             ("db.url", "postgres://${db.host}:${db.port:5432}"),
//!             ("db.password", "hunter2"),
//!         ],
//!     ))
//!     .with_secret_keys(["db.password"])
//!     .build()?;
//!
//! assert_eq!(config.get_value::<String>("db.url")?, "postgres://localhost:5432");
//! assert!(config.get_value::<String>("db.password").is_err());
//!
//! let password = SecretKeys::do_unlocked(|| config.get_value::<String>("db.password"))?;
//! assert_eq!(password, "hunter2");
//! # Ok::<(), strata_config::ConfigError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
pub mod convert;
mod error;
pub mod expression;
mod handler;
pub mod interceptor;
pub mod mapping;
pub mod name;
mod secret;
pub mod source;
mod value;

pub use config::{Config, ConfigBuilder, PROFILE_KEY, VALIDATE_UNKNOWN_KEY};
pub use convert::{Converter, Converters};
pub use error::{
    ConfigError, ConfigResult, ConversionError, ErrorKind, Problem, ProblemKind, ValidationError,
};
pub use expression::Expressions;
pub use handler::{SecretHandlers, SecretKeysHandler};
pub use interceptor::{priorities, Interceptor, InterceptorContext};
pub use mapping::{ConfigMapping, MappedInstance, MappingSchema};
pub use name::PropertyName;
pub use secret::{SecretKeys, SecretScope};
pub use source::{
    ArgsSource, ConfigSource, DotEnvSource, DynamicSource, EnvSource, MapSource, PropertiesSource,
};
#[cfg(feature = "toml")]
pub use source::TomlSource;
pub use value::{ConfigValue, ConfigValueBuilder, ValueProblem};
