//! TOML file source.
//!
//! Tables flatten into dotted names and arrays into indexed names:
//!
//! ```toml
//! [server]
//! host = "localhost"
//! ports = [80, 443]
//!
//! [[server.apps]]
//! name = "a"
//! ```
//!
//! yields `server.host`, `server.ports[0]`, `server.ports[1]` and `server.apps[0].name`.

use super::{ordinal_from, ConfigSource, DEFAULT_ORDINAL};
use crate::error::{ConfigError, ConfigResult};
use crate::name::quoted_if_needed;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Properties flattened from a TOML document.
#[derive(Debug, Clone)]
pub struct TomlSource {
    name: String,
    ordinal: i32,
    properties: BTreeMap<String, String>,
}

impl TomlSource {
    /// Parse TOML content.
    pub fn parse(name: impl Into<String>, content: &str) -> ConfigResult<Self> {
        let name = name.into();
        let table: toml::Table = toml::from_str(content).map_err(|e| ConfigError::Source {
            name: name.clone(),
            message: e.to_string(),
        })?;

        let mut properties = BTreeMap::new();
        for (key, value) in &table {
            flatten(&quoted_if_needed(key), value, &mut properties);
        }
        let ordinal = ordinal_from(&properties, DEFAULT_ORDINAL, &name);

        Ok(Self {
            name,
            ordinal,
            properties,
        })
    }

    /// Read a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Source {
            name: path.display().to_string(),
            message: e.to_string(),
        })?;
        let source = Self::parse(format!("TomlConfigSource[source={}]", path.display()), &content)?;
        debug!(
            "Loaded {} properties from {}",
            source.properties.len(),
            path.display()
        );
        Ok(source)
    }

    /// Override the ordinal.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = ordinal;
        self
    }
}

fn flatten(path: &str, value: &toml::Value, out: &mut BTreeMap<String, String>) {
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table {
                flatten(&format!("{}.{}", path, quoted_if_needed(key)), child, out);
            }
        }
        toml::Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                flatten(&format!("{}[{}]", path, idx), item, out);
            }
        }
        toml::Value::String(s) => {
            out.insert(path.to_string(), s.clone());
        }
        other => {
            out.insert(path.to_string(), other.to_string());
        }
    }
}

impl ConfigSource for TomlSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn ordinal(&self) -> i32 {
        self.ordinal
    }

    fn get_value(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }

    fn property_names(&self) -> BTreeSet<String> {
        self.properties.keys().cloned().collect()
    }
}
