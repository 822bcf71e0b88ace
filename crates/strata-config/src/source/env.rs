//! Environment variable source.

use super::ConfigSource;
use std::collections::{BTreeMap, BTreeSet};

/// Default ordinal of environment variables.
pub const ENV_ORDINAL: i32 = 300;

/// A snapshot of environment variables.
///
/// Names are matched case and separator insensitively: `server.http-port` finds
/// `server.http-port`, `server_http_port` or `SERVER_HTTP_PORT`, in that order.
#[derive(Debug, Clone)]
pub struct EnvSource {
    name: String,
    ordinal: i32,
    vars: BTreeMap<String, String>,
}

impl EnvSource {
    /// Snapshot the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Use an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: "EnvConfigSource".to_string(),
            ordinal: ENV_ORDINAL,
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Rename the source.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the ordinal.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = ordinal;
        self
    }
}

impl ConfigSource for EnvSource {
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
}

/// Look a dotted name up in environment-style variables.
pub(crate) fn env_lookup<'a>(vars: &'a BTreeMap<String, String>, name: &str) -> Option<&'a String> {
    if let Some(value) = vars.get(name) {
        return Some(value);
    }
    let sanitized = replace_non_alphanumeric(name);
    vars.get(&sanitized)
        .or_else(|| vars.get(&sanitized.to_ascii_uppercase()))
}

/// Replace every non-alphanumeric character by `_`; a closing quote at the end adds an extra `_`.
pub fn replace_non_alphanumeric(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    let last = name.chars().count().saturating_sub(1);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('_');
            if c == '"' && i == last {
                out.push('_');
            }
        }
    }
    out
}
