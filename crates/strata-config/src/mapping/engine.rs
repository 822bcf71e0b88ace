//! Binds a schema tree against a resolved configuration.
//!
//! The mapper walks the schema once per root and produces a `serde_json::Value` tree. Leaf
//! failures never abort the walk; they are collected as [`Problem`]s so one build reports
//! every problem at once.

use super::schema::{
    CollectionKind, CollectionSchema, GroupSchema, LeafSchema, MapSchema, MappingSchema, SchemaNode,
};
use super::validation::node_patterns;
use crate::config::Config;
use crate::convert::split;
use crate::error::{ConfigError, ErrorKind, Problem, ProblemKind};
use crate::expression::expand;
use crate::name::{
    first_segment, index, join, quoted_if_needed, strip_prefix, unindexed, unquoted, PropertyName,
};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

pub(crate) struct Mapper<'a> {
    config: &'a Config,
    names: BTreeSet<String>,
    problems: Vec<Problem>,
}

impl<'a> Mapper<'a> {
    /// Snapshot the enumerable names of `config`.
    pub(crate) fn new(config: &'a Config) -> Self {
        Self {
            config,
            names: config.property_names(),
            problems: Vec::new(),
        }
    }

    pub(crate) fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Map one root.
    pub(crate) fn map_root(&mut self, schema: &MappingSchema, prefix: &str) -> Value {
        debug!("Mapping {} at prefix '{}'", schema.name(), prefix);
        self.group(schema, schema.root(), prefix)
    }

    /// Collected problems.
    pub(crate) fn into_problems(self) -> Vec<Problem> {
        self.problems
    }

    fn group(&mut self, schema: &MappingSchema, group: &GroupSchema, path: &str) -> Value {
        let mut object = Map::new();
        for field in group.fields() {
            let child = if field.is_parent_name() {
                path.to_string()
            } else {
                join(path, &schema.property_name(field))
            };
            let value = self.node(schema, field.node(), &child, true);
            object.insert(field.id().to_string(), value);
        }
        Value::Object(object)
    }

    fn node(&mut self, schema: &MappingSchema, node: &SchemaNode, path: &str, required: bool) -> Value {
        match node {
            SchemaNode::Value(leaf) => self.leaf(leaf, path, required).unwrap_or(Value::Null),
            SchemaNode::Group(group) => self.group(schema, group, path),
            SchemaNode::Optional(inner) => self.optional(schema, inner, path),
            SchemaNode::Collection(collection) => self.collection(schema, collection, path, required),
            SchemaNode::Map(map) => self.map(schema, map, path),
        }
    }

    fn optional(&mut self, schema: &MappingSchema, inner: &SchemaNode, path: &str) -> Value {
        match inner {
            SchemaNode::Value(_) => self.node(schema, inner, path, false),
            SchemaNode::Collection(collection) if matches!(collection.element(), SchemaNode::Value(_)) => {
                self.node(schema, inner, path, false)
            }
            _ if self.addressed(schema, inner, path) => self.node(schema, inner, path, true),
            _ => Value::Null,
        }
    }

    /// Whether any enumerable name is consumed by `node` at `path`.
    fn addressed(&self, schema: &MappingSchema, node: &SchemaNode, path: &str) -> bool {
        let mut patterns = HashSet::new();
        node_patterns(schema, node, path, &mut patterns);
        self.names
            .iter()
            .any(|name| patterns.contains(&PropertyName::new(name.as_str())))
    }

    /// Raw value of `path` or the leaf default. `Err(())` means a problem was recorded.
    fn raw(&mut self, path: &str, default: Option<&str>) -> Result<Option<String>, ()> {
        let found = match self.config.get_config_value(path) {
            Ok(found) => found,
            Err(err) => {
                self.record(path, &err);
                return Err(());
            }
        };

        match found {
            Some(value) => {
                if let Some(problem) = value.problems().first() {
                    self.problems
                        .push(Problem::new(path, ProblemKind::Expansion, problem.to_string()));
                    return Err(());
                }
                Ok(Some(value.value().to_string()))
            }
            None => match default {
                Some(default) => self.expand_default(path, default).map(Some),
                None => Ok(None),
            },
        }
    }

    fn expand_default(&mut self, path: &str, default: &str) -> Result<String, ()> {
        let config = self.config;
        match expand(default, path, config.secret_handlers(), |key| {
            config.get_config_value(key)
        }) {
            Ok(expanded) => match expanded.problems.first() {
                Some(problem) => {
                    self.problems
                        .push(Problem::new(path, ProblemKind::Expansion, problem.to_string()));
                    Err(())
                }
                None => Ok(expanded.value),
            },
            Err(err) => {
                self.record(path, &err);
                Err(())
            }
        }
    }

    fn leaf(&mut self, leaf: &LeafSchema, path: &str, required: bool) -> Option<Value> {
        let raw = self.raw(path, leaf.default_value()).ok()?;
        let Some(raw) = raw else {
            if required {
                self.missing(path);
            }
            return None;
        };

        match leaf.ty().convert(self.config.converters(), path, &raw) {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                if required {
                    self.empty(path);
                }
                None
            }
            Err(err) => {
                self.record(path, &err);
                None
            }
        }
    }

    fn collection(
        &mut self,
        schema: &MappingSchema,
        collection: &CollectionSchema,
        path: &str,
        required: bool,
    ) -> Value {
        let items = match collection.element() {
            SchemaNode::Value(leaf) => match self.leaf_items(leaf, path, required) {
                Some(items) => items,
                None => return Value::Null,
            },
            element => {
                let indexes = self.indexes(path);
                debug!("Discovered {} element(s) under {}", indexes.len(), path);
                indexes
                    .into_iter()
                    .map(|i| self.node(schema, element, &format!("{}[{}]", path, i), true))
                    .collect()
            }
        };

        Value::Array(match collection.kind() {
            CollectionKind::List => items,
            CollectionKind::Set => dedupe(items),
        })
    }

    /// Elements of a leaf collection. `None` when absent.
    fn leaf_items(&mut self, leaf: &LeafSchema, path: &str, required: bool) -> Option<Vec<Value>> {
        let mut raws: Vec<(String, String)> = Vec::new();
        let mut failed = false;
        for i in 0.. {
            let name = format!("{}[{}]", path, i);
            match self.raw(&name, None) {
                Ok(Some(raw)) => raws.push((name, raw)),
                Ok(None) => break,
                Err(()) => {
                    failed = true;
                    break;
                }
            }
        }

        if raws.is_empty() && !failed {
            match self.raw(path, leaf.default_value()) {
                Ok(Some(raw)) => {
                    raws.extend(split(&raw).into_iter().map(|item| (path.to_string(), item)));
                    if raws.is_empty() {
                        if required {
                            self.empty(path);
                        }
                        return None;
                    }
                }
                Ok(None) => {
                    if required {
                        self.missing(path);
                    }
                    return None;
                }
                Err(()) => return None,
            }
        }

        let mut items = Vec::with_capacity(raws.len());
        let mut rejected = false;
        for (name, raw) in raws {
            match leaf.ty().convert(self.config.converters(), &name, &raw) {
                Ok(Some(value)) => items.push(value),
                Ok(None) => {}
                Err(err) => {
                    self.record(&name, &err);
                    rejected = true;
                }
            }
        }

        // Only blank elements: absent, like an empty comma list
        if items.is_empty() && !rejected && !failed {
            if required {
                self.empty(path);
            }
            return None;
        }
        Some(items)
    }

    /// Contiguous indexes from 0 addressed by names directly under `path`.
    fn indexes(&self, path: &str) -> Vec<usize> {
        let found: BTreeSet<usize> = self
            .names
            .iter()
            .filter_map(|name| {
                let rest = strip_prefix(name, path)?;
                if !rest.starts_with('[') {
                    return None;
                }
                let (segment, _) = first_segment(rest);
                let end = segment.find(']')? + 1;
                index(&segment[..end])
            })
            .collect();
        (0..).take_while(|i| found.contains(i)).collect()
    }

    fn map(&mut self, schema: &MappingSchema, map: &MapSchema, path: &str) -> Value {
        let mut key_patterns = HashSet::new();
        node_patterns(schema, map.value(), &join(path, "*"), &mut key_patterns);
        let mut unnamed_patterns = HashSet::new();
        if map.unnamed_key().is_some() {
            node_patterns(schema, map.value(), "", &mut unnamed_patterns);
        }

        let keys: Vec<String> = match map.keys() {
            Some(keys) => keys.to_vec(),
            None => self
                .names
                .iter()
                .filter_map(|name| {
                    let rest = strip_prefix(name, path)?;
                    if rest.is_empty()
                        || rest.starts_with('[')
                        || !key_patterns.contains(&PropertyName::new(name.as_str()))
                    {
                        return None;
                    }
                    if map.unnamed_key().is_some() && unnamed_patterns.contains(&PropertyName::new(rest)) {
                        return None;
                    }
                    let (segment, _) = first_segment(rest);
                    Some(unquoted(unindexed(segment)).to_string())
                })
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };

        let mut object = Map::new();
        let mut unnamed_entry = false;
        if let Some(marker) = map.unnamed_key() {
            if keys.iter().any(|key| key == marker) {
                self.problems.push(Problem::new(
                    join(path, &quoted_if_needed(marker)),
                    ProblemKind::ExplicitUnnamedKey,
                    format!("Explicit key {} of {} collides with the unnamed key", marker, path),
                ));
            }
            if self.addressed(schema, map.value(), path) {
                let value = self.node(schema, map.value(), path, true);
                object.insert(marker.to_string(), value);
                unnamed_entry = true;
            }
        }

        for key in &keys {
            if map.unnamed_key() == Some(key.as_str()) {
                continue;
            }
            let child = join(path, &quoted_if_needed(key));
            let value = self.node(schema, map.value(), &child, true);
            object.insert(key.clone(), value);
        }

        if keys.is_empty() && !unnamed_entry {
            if let Some(default_key) = map.default_key() {
                let child = join(path, &quoted_if_needed(default_key));
                let value = self.node(schema, map.value(), &child, true);
                object.insert(default_key.to_string(), value);
            }
        }

        debug!("Mapped {} key(s) under {}", object.len(), path);
        Value::Object(object)
    }

    fn missing(&mut self, path: &str) {
        self.problems.push(Problem::new(
            path,
            ProblemKind::NotFound,
            ConfigError::NotFound {
                name: path.to_string(),
            }
            .to_string(),
        ));
    }

    fn empty(&mut self, path: &str) {
        self.problems.push(Problem::new(
            path,
            ProblemKind::EmptyValue,
            ConfigError::EmptyValue {
                name: path.to_string(),
            }
            .to_string(),
        ));
    }

    fn record(&mut self, path: &str, err: &ConfigError) {
        let kind = match err.kind() {
            ErrorKind::NotFound => ProblemKind::NotFound,
            ErrorKind::EmptyValue => ProblemKind::EmptyValue,
            ErrorKind::Expansion => ProblemKind::Expansion,
            _ => ProblemKind::Conversion,
        };
        self.problems.push(Problem::new(path, kind, err.to_string()));
    }
}

fn dedupe(items: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
