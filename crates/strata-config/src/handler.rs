//! Secret keys handlers
//!
//! A value written as `${handler::secret}` is not a reference: the text after `::` is handed
//! to the handler registered under `handler`, and its decoded output replaces the
//! expression.
//!
//! ```
//! use strata_config::{ConfigBuilder, ConversionError, MapSource};
//!
//! let config = ConfigBuilder::new()
//!     .with_source(MapSource::new("app", [("db.password", "${rot13::uhagre2}")]))
//!     .with_secret_handler("rot13", |secret: &str| -> Result<String, ConversionError> {
//!         Ok(secret
//!             .chars()
//!             .map(|c| match c {
//!                 'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
//!                 c => c,
//!             })
//!             .collect())
//!     })
//!     .build()?;
//!
//! assert_eq!(config.get_value::<String>("db.password")?, "hunter2");
//! # Ok::<(), strata_config::ConfigError>(())
//! ```

use crate::error::ConversionError;
use crate::value::ValueProblem;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Decodes the secret part of a `${handler::secret}` expression.
pub trait SecretKeysHandler: Send + Sync {
    /// Decode `secret`.
    fn decode(&self, secret: &str) -> Result<String, ConversionError>;
}

impl<F> SecretKeysHandler for F
where
    F: Fn(&str) -> Result<String, ConversionError> + Send + Sync,
{
    fn decode(&self, secret: &str) -> Result<String, ConversionError> {
        self(secret)
    }
}

/// Handlers by name.
#[derive(Clone, Default)]
pub struct SecretHandlers {
    by_name: BTreeMap<String, Arc<dyn SecretKeysHandler>>,
}

impl SecretHandlers {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any earlier one.
    pub fn register<H: SecretKeysHandler + 'static>(&mut self, name: impl Into<String>, handler: H) {
        let name = name.into();
        debug!("Registered secret keys handler {}", name);
        self.by_name.insert(name, Arc::new(handler));
    }

    /// Whether a handler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Decode `secret` with `handler` for the property `name`.
    pub fn decode(&self, handler: &str, secret: &str, name: &str) -> Result<String, ValueProblem> {
        let Some(found) = self.by_name.get(handler) else {
            return Err(ValueProblem::unknown_handler(handler, name));
        };
        found
            .decode(secret)
            .map_err(|e| ValueProblem::not_decoded(handler, name, e.message()))
    }
}

impl fmt::Debug for SecretHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.by_name.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_with_the_named_handler() {
        let mut handlers = SecretHandlers::new();
        handlers.register("upper", |s: &str| -> Result<String, ConversionError> {
            Ok(s.to_uppercase())
        });
        assert!(handlers.contains("upper"));
        assert_eq!(handlers.decode("upper", "abc", "k").unwrap(), "ABC");
    }

    #[test]
    fn unknown_handler_and_decode_failures_are_problems() {
        let mut handlers = SecretHandlers::new();
        handlers.register("broken", |_: &str| -> Result<String, ConversionError> {
            Err(ConversionError::new("bad padding"))
        });

        let unknown = handlers.decode("aes", "x", "db.password").unwrap_err();
        assert_eq!(
            unknown.to_string(),
            "Secret keys handler aes not found for property db.password"
        );

        let failed = handlers.decode("broken", "x", "db.password").unwrap_err();
        assert_eq!(
            failed.to_string(),
            "Secret keys handler broken could not decode property db.password: bad padding"
        );
    }
}
