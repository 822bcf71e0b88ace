//! Error types for configuration resolution and mapping.

use std::fmt;
use thiserror::Error;

/// Result type used throughout the crate
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while resolving, converting or mapping configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required property is absent from every source, defaults included.
    #[error("The config property {name} is required but it could not be found in any config source")]
    NotFound {
        /// Property name that was looked up
        name: String,
    },

    /// The property exists but its converter reported the value as absent (e.g. `""`).
    #[error("The config property {name} is defined as an empty value")]
    EmptyValue {
        /// Property name that was looked up
        name: String,
    },

    /// A converter rejected a non-empty raw value.
    #[error("The config property {name} with the config value \"{value}\" threw an error whilst being converted: {source}")]
    Conversion {
        /// Property name that was converted
        name: String,
        /// The raw value handed to the converter
        value: String,
        /// The converter's own error
        #[source]
        source: ConversionError,
    },

    /// No converter is registered for the requested type.
    #[error("No Converter registered for {type_name}")]
    NoConverter {
        /// Name of the Rust type that has no converter
        type_name: &'static str,
    },

    /// An expression referenced a name that resolved to nothing and had no default.
    #[error("Could not expand value {key} in property {name}")]
    ExpansionNotFound {
        /// The referenced name
        key: String,
        /// The property whose value contained the expression
        name: String,
    },

    /// A `${handler::secret}` expression names a handler that is not registered.
    #[error("Secret keys handler {handler} not found for property {name}")]
    SecretHandlerNotFound {
        /// The handler name
        handler: String,
        /// The property whose value contained the expression
        name: String,
    },

    /// A secret keys handler rejected the secret.
    #[error("Secret keys handler {handler} could not decode property {name}: {message}")]
    SecretDecode {
        /// The handler name
        handler: String,
        /// The property whose value contained the expression
        name: String,
        /// The handler's own message
        message: String,
    },

    /// Expression expansion recursed past its depth bound.
    #[error("Recursive expression expansion is too deep for {name}")]
    ExpansionTooDeep {
        /// The name being resolved when the bound was hit
        name: String,
    },

    /// Access to a locked secret key.
    #[error("Not allowed to access secret key {name}")]
    Security {
        /// The secret property name
        name: String,
    },

    /// One or more problems found while mapping configuration roots.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No mapping was registered for the schema and prefix.
    #[error("Could not find a mapping for {schema} with prefix {prefix}")]
    MappingNotFound {
        /// Schema name
        schema: String,
        /// Root prefix
        prefix: String,
    },

    /// A mapped instance could not be turned into the requested Rust type.
    #[error("Could not bind mapping {schema} to the requested type: {source}")]
    Deserialize {
        /// Schema name
        schema: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// A source loader failed to read or parse its input.
    #[error("Failed to load config source {name}: {message}")]
    Source {
        /// Source name or path
        name: String,
        /// What went wrong
        message: String,
    },

    /// An ignore pattern is not a valid glob.
    #[error("Invalid ignore pattern {pattern}: {source}")]
    InvalidPattern {
        /// The offending glob
        pattern: String,
        /// Glob compiler error
        #[source]
        source: globset::Error,
    },
}

/// Coarse classification of [`ConfigError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Value absent everywhere
    NotFound,
    /// Value present but blank
    EmptyValue,
    /// Converter rejected the value
    Conversion,
    /// Expression could not be expanded
    Expansion,
    /// Locked secret accessed
    Security,
    /// Aggregate mapping failure
    Validation,
    /// Setup and loading errors
    Other,
}

impl ConfigError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::NotFound { .. } | ConfigError::MappingNotFound { .. } => {
                ErrorKind::NotFound
            }
            ConfigError::EmptyValue { .. } => ErrorKind::EmptyValue,
            ConfigError::Conversion { .. }
            | ConfigError::NoConverter { .. }
            | ConfigError::Deserialize { .. } => ErrorKind::Conversion,
            ConfigError::ExpansionNotFound { .. }
            | ConfigError::ExpansionTooDeep { .. }
            | ConfigError::SecretHandlerNotFound { .. }
            | ConfigError::SecretDecode { .. } => ErrorKind::Expansion,
            ConfigError::Security { .. } => ErrorKind::Security,
            ConfigError::Validation(_) => ErrorKind::Validation,
            ConfigError::Source { .. } | ConfigError::InvalidPattern { .. } => ErrorKind::Other,
        }
    }
}

/// Error returned by a [`Converter`](crate::Converter) that rejects its input.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConversionError {
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConversionError {
    /// Create an error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Create an error wrapping the converter's underlying cause.
    pub fn with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// What went wrong for one property during mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemKind {
    /// Required value missing
    NotFound,
    /// Required value present but blank
    EmptyValue,
    /// Converter rejected the value
    Conversion,
    /// Expression expansion failed
    Expansion,
    /// Property is under a mapped root but matches no schema node
    Unknown,
    /// Map entry explicitly named with the unnamed marker
    ExplicitUnnamedKey,
}

/// A single mapping problem, tied to the offending property name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    name: String,
    kind: ProblemKind,
    message: String,
}

impl Problem {
    /// Create a problem.
    pub fn new(name: impl Into<String>, kind: ProblemKind, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            message: message.into(),
        }
    }

    /// The offending property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Problem classification.
    pub fn kind(&self) -> &ProblemKind {
        &self.kind
    }

    /// Human readable description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Aggregate of every problem found while mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    problems: Vec<Problem>,
}

impl ValidationError {
    /// Wrap a non-empty list of problems.
    pub fn new(problems: Vec<Problem>) -> Self {
        Self { problems }
    }

    /// All collected problems, in discovery order.
    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Messages of all problems.
    pub fn messages(&self) -> Vec<&str> {
        self.problems.iter().map(Problem::message).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Configuration validation failed with {} problem(s):",
            self.problems.len()
        )?;
        for problem in &self.problems {
            write!(f, "\n  - {}", problem)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
