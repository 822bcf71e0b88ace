//! `.env` file source.

use super::env::env_lookup;
use super::ConfigSource;
use crate::error::{ConfigError, ConfigResult};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

/// Default ordinal of `.env` files, just below the environment.
pub const DOTENV_ORDINAL: i32 = 295;

/// Variables read from a `.env` file, matched like environment variables.
#[derive(Debug, Clone)]
pub struct DotEnvSource {
    name: String,
    ordinal: i32,
    vars: BTreeMap<String, String>,
    lines: BTreeMap<String, u32>,
}

impl DotEnvSource {
    /// Parse `.env` content.
    pub fn parse(name: impl Into<String>, content: &str) -> Self {
        let name = name.into();
        let mut vars = BTreeMap::new();
        let mut lines = BTreeMap::new();

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                warn!("Ignoring malformed line {} in {}", idx + 1, name);
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                warn!("Ignoring line {} with empty key in {}", idx + 1, name);
                continue;
            }
            vars.insert(key.to_string(), parse_value(value.trim()));
            lines.insert(key.to_string(), (idx + 1) as u32);
        }

        Self {
            name,
            ordinal: DOTENV_ORDINAL,
            vars,
            lines,
        }
    }

    /// Read a `.env` file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Source {
            name: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!("Loaded .env file {}", path.display());
        Ok(Self::parse(
            format!("DotEnvConfigSource[source={}]", path.display()),
            &content,
        ))
    }

    /// Read a `.env` file if it exists.
    pub fn load_optional(path: impl AsRef<Path>) -> ConfigResult<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No .env file at {}", path.display());
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Override the ordinal.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = ordinal;
        self
    }
}

fn parse_value(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        return inner.replace("\\n", "\n").replace("\\\"", "\"");
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }
    match value.find(" #") {
        Some(comment) => value[..comment].trim_end().to_string(),
        None => value.to_string(),
    }
}

impl ConfigSource for DotEnvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn ordinal(&self) -> i32 {
        self.ordinal
    }

    fn get_value(&self, name: &str) -> Option<String> {
        env_lookup(&self.vars, name).cloned()
    }

    fn property_names(&self) -> BTreeSet<String> {
        self.vars.keys().cloned().collect()
    }

    fn line_number(&self, name: &str) -> Option<u32> {
        self.lines
            .get(name)
            .or_else(|| {
                let sanitized = super::env::replace_non_alphanumeric(name);
                self.lines
                    .get(&sanitized)
                    .or_else(|| self.lines.get(&sanitized.to_ascii_uppercase()))
            })
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quotes_comments_and_export() {
        let source = DotEnvSource::parse(
            ".env",
            r#"
# comment
export DB_HOST=localhost
DB_PASSWORD="p@ss word"
GREETING='hi there'
PORT=5432 # inline
broken line
"#,
        );

        assert_eq!(source.get_value("db.host").as_deref(), Some("localhost"));
        assert_eq!(source.get_value("db.password").as_deref(), Some("p@ss word"));
        assert_eq!(source.get_value("greeting").as_deref(), Some("hi there"));
        assert_eq!(source.get_value("port").as_deref(), Some("5432"));
        assert_eq!(source.line_number("db.host"), Some(3));
        assert_eq!(source.property_names().len(), 4);
    }

    #[test]
    fn missing_optional_file_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = DotEnvSource::load_optional(dir.path().join(".env")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "APP_NAME=demo\n").unwrap();

        let source = DotEnvSource::load(&path).unwrap();
        assert_eq!(source.get_value("app.name").as_deref(), Some("demo"));
        assert_eq!(source.ordinal(), DOTENV_ORDINAL);
    }
}
