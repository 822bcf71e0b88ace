//! In-memory sources.

use super::{ordinal_from, ConfigSource, DEFAULT_ORDINAL};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Name of the source holding builder and mapping defaults.
pub const DEFAULT_VALUES_SOURCE: &str = "DefaultValuesConfigSource";

/// A source backed by a fixed map.
#[derive(Debug, Clone)]
pub struct MapSource {
    name: String,
    ordinal: i32,
    properties: BTreeMap<String, String>,
}

impl MapSource {
    /// Create a map source. A `config_ordinal` entry overrides the default ordinal.
    pub fn new<I, K, V>(name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        let properties: BTreeMap<String, String> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let ordinal = ordinal_from(&properties, DEFAULT_ORDINAL, &name);
        Self {
            name,
            ordinal,
            properties,
        }
    }

    /// The lowest-priority source used for default values.
    pub fn defaults<I, K, V>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(DEFAULT_VALUES_SOURCE, properties).with_ordinal(i32::MIN)
    }

    /// Override the ordinal.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = ordinal;
        self
    }

    /// The backing properties.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

impl ConfigSource for MapSource {
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

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A source whose values are computed on every lookup.
///
/// Useful for live values (counters, clocks, remote caches); nothing is cached.
#[derive(Clone)]
pub struct DynamicSource {
    name: String,
    ordinal: i32,
    names: BTreeSet<String>,
    lookup: Lookup,
}

impl DynamicSource {
    /// Create a dynamic source that advertises `names` and answers through `lookup`.
    pub fn new<I, S, F>(name: impl Into<String>, names: I, lookup: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            ordinal: DEFAULT_ORDINAL,
            names: names.into_iter().map(Into::into).collect(),
            lookup: Arc::new(lookup),
        }
    }

    /// Override the ordinal.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = ordinal;
        self
    }
}

impl fmt::Debug for DynamicSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicSource")
            .field("name", &self.name)
            .field("ordinal", &self.ordinal)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl ConfigSource for DynamicSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn ordinal(&self) -> i32 {
        self.ordinal
    }

    fn get_value(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
    }

    fn property_names(&self) -> BTreeSet<String> {
        self.names.clone()
    }
}
