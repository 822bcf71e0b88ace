//! Configuration sources and the ordered source registry
//!
//! A [`ConfigSource`] is anything that can answer "what is the value of this name" and
//! "which names do you know". Sources are kept by the [`SourceRegistry`] in descending
//! ordinal order; the first source that knows a name wins.
//!
//! ## Stock sources
//!
//! | Source | Default ordinal |
//! |---|---|
//! | [`ArgsSource`] | 400 |
//! | [`EnvSource`] | 300 |
//! | [`DotEnvSource`] | 295 |
//! | [`PropertiesSource`] | 100 |
//! | `TomlSource` | 100 |
//! | [`MapSource`] | 100 |
//! | [`MapSource::defaults`] | `i32::MIN` |
//!
//! File-backed sources honour a `config_ordinal` property that overrides their ordinal.

mod args;
mod dotenv;
mod env;
mod map;
mod properties;
#[cfg(feature = "toml")]
mod toml;

pub use args::ArgsSource;
pub use dotenv::DotEnvSource;
pub use env::EnvSource;
pub use map::{DynamicSource, MapSource};
pub use properties::PropertiesSource;
#[cfg(feature = "toml")]
pub use self::toml::TomlSource;

use crate::value::ConfigValue;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Ordinal used when a source does not specify one.
pub const DEFAULT_ORDINAL: i32 = 100;

/// Property that overrides the ordinal of file and map backed sources.
pub const CONFIG_ORDINAL_KEY: &str = "config_ordinal";

/// A provider of raw configuration values.
pub trait ConfigSource: Send + Sync + fmt::Debug {
    /// Human readable name, reported in [`ConfigValue::source_name`].
    fn name(&self) -> &str;

    /// Priority of this source; higher wins on conflicts.
    fn ordinal(&self) -> i32 {
        DEFAULT_ORDINAL
    }

    /// Raw value for an exact name.
    fn get_value(&self, name: &str) -> Option<String>;

    /// Every name this source can currently resolve.
    fn property_names(&self) -> BTreeSet<String>;

    /// Line number provenance for a name, when the source tracks it.
    fn line_number(&self, _name: &str) -> Option<u32> {
        None
    }
}

/// Read the `config_ordinal` override from a property map.
pub(crate) fn ordinal_from<'a, I>(properties: I, default: i32, source: &str) -> i32
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    for (key, value) in properties {
        if key == CONFIG_ORDINAL_KEY {
            return match value.trim().parse() {
                Ok(ordinal) => ordinal,
                Err(_) => {
                    warn!(
                        "Ignoring invalid {} '{}' in {}",
                        CONFIG_ORDINAL_KEY, value, source
                    );
                    default
                }
            };
        }
    }
    default
}

/// Resolve a source path relative to a base directory.
///
/// - Absolute paths are used as-is
/// - `~` and `~/...` are resolved against the home directory
/// - Anything else is relative to `base_dir`
pub fn resolve_path(path: &str, base_dir: &Path) -> PathBuf {
    if path.starts_with('/') {
        PathBuf::from(path)
    } else if path == "~" || path.starts_with("~/") {
        match dirs::home_dir() {
            Some(home) => match path.strip_prefix("~/") {
                Some(rest) => home.join(rest),
                None => home,
            },
            None => base_dir.join(path),
        }
    } else {
        base_dir.join(path)
    }
}

/// All sources of one configuration, ordered by descending ordinal.
///
/// Built once; read-only afterwards. Ties keep registration order.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn ConfigSource>>,
}

impl SourceRegistry {
    /// Order the given sources.
    pub fn new(mut sources: Vec<Arc<dyn ConfigSource>>) -> Self {
        sources.sort_by_key(|source| std::cmp::Reverse(source.ordinal()));
        for (position, source) in sources.iter().enumerate() {
            debug!(
                "Config source #{}: {} (ordinal {})",
                position,
                source.name(),
                source.ordinal()
            );
        }
        Self { sources }
    }

    /// Look a name up in ordinal order.
    pub fn get_value(&self, name: &str) -> Option<ConfigValue> {
        self.sources
            .iter()
            .enumerate()
            .find_map(|(position, source)| {
                source.get_value(name).map(|value| {
                    trace!("{} found in {}", name, source.name());
                    ConfigValue::builder(name, value)
                        .source(source.name(), source.ordinal())
                        .source_position(position)
                        .line_number(source.line_number(name))
                        .build()
                })
            })
    }

    /// Union of every source's names.
    pub fn property_names(&self) -> BTreeSet<String> {
        self.sources
            .iter()
            .flat_map(|source| source.property_names())
            .collect()
    }

    /// The winning value of every known name.
    pub fn values(&self) -> Vec<ConfigValue> {
        let mut values: BTreeMap<String, ConfigValue> = BTreeMap::new();
        for name in self.property_names() {
            if let Some(value) = self.get_value(&name) {
                values.insert(name, value);
            }
        }
        values.into_values().collect()
    }

    /// Iterate sources, highest ordinal first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ConfigSource>> {
        self.sources.iter()
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether there are no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, ordinal: i32, pairs: &[(&str, &str)]) -> Arc<dyn ConfigSource> {
        Arc::new(MapSource::new(name, pairs.iter().copied()).with_ordinal(ordinal))
    }

    #[test]
    fn higher_ordinal_wins_regardless_of_registration_order() {
        let a = source("A", 100, &[("k", "a")]);
        let b = source("B", 200, &[("k", "b")]);

        for sources in [vec![a.clone(), b.clone()], vec![b, a]] {
            let registry = SourceRegistry::new(sources);
            let value = registry.get_value("k").unwrap();
            assert_eq!(value.value(), "b");
            assert_eq!(value.source_name(), "B");
            assert_eq!(value.source_ordinal(), 200);
            assert_eq!(value.source_position(), 0);
        }
    }

    #[test]
    fn ties_keep_registration_order() {
        let registry = SourceRegistry::new(vec![
            source("first", 100, &[("k", "1")]),
            source("second", 100, &[("k", "2")]),
        ]);
        assert_eq!(registry.get_value("k").unwrap().source_name(), "first");
    }

    #[test]
    fn property_names_are_a_union() {
        let registry = SourceRegistry::new(vec![
            source("A", 100, &[("a", "1"), ("shared", "x")]),
            source("B", 200, &[("b", "2"), ("shared", "y")]),
        ]);
        let names: Vec<_> = registry.property_names().into_iter().collect();
        assert_eq!(names, vec!["a", "b", "shared"]);
        assert!(registry.get_value("missing").is_none());
    }

    #[test]
    fn resolve_path_handles_home_and_relative() {
        let base = PathBuf::from("/etc/app");
        assert_eq!(resolve_path("/abs/x", &base), PathBuf::from("/abs/x"));
        assert_eq!(resolve_path("x.properties", &base), base.join("x.properties"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(resolve_path("~/x", &base), home.join("x"));
        }
    }
}
