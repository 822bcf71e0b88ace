use super::schema::{GroupSchema, MappingSchema, SchemaNode};
use crate::error::{ConfigError, ConfigResult};
use crate::name::{join, segments, unquoted};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

const MASK: &str = "******";

/// A Rust type that describes its own mapping.
///
/// ```
/// use serde::Deserialize;
/// use strata_config::mapping::{ConfigMapping, Field, GroupSchema, MappingSchema, SchemaNode};
///
/// #[derive(Deserialize)]
/// struct Server {
///     host: String,
///     port: u16,
/// }
///
/// impl ConfigMapping for Server {
///     fn schema() -> MappingSchema {
///         MappingSchema::new(
///             "Server",
///             GroupSchema::new()
///                 .field(Field::new("host", SchemaNode::leaf::<String>()))
///                 .field(Field::new("port", SchemaNode::leaf::<u16>().with_default("8080"))),
///         )
///     }
///
///     fn prefix() -> &'static str {
///         "server"
///     }
/// }
/// ```
pub trait ConfigMapping: DeserializeOwned + 'static {
    /// The schema tree. Its name identifies the mapping.
    fn schema() -> MappingSchema;

    /// Default root prefix.
    fn prefix() -> &'static str;
}

/// The bound object graph of one root.
///
/// Bound once when the configuration is built; later changes in dynamic sources do not
/// reach it. Group fields are keyed by field identifier, absent optionals are `null`.
#[derive(Debug, Clone)]
pub struct MappedInstance {
    schema: Arc<MappingSchema>,
    prefix: String,
    value: Value,
}

impl MappedInstance {
    pub(crate) fn new(schema: Arc<MappingSchema>, prefix: impl Into<String>, value: Value) -> Self {
        Self {
            schema,
            prefix: prefix.into(),
            value,
        }
    }

    /// The value tree.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The schema this instance was bound from.
    pub fn schema(&self) -> &MappingSchema {
        &self.schema
    }

    /// Name of the schema.
    pub fn schema_name(&self) -> &str {
        self.schema.name()
    }

    /// Root prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Read one member by field path, e.g. `apps."a.b".ports[1]`.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<T> {
        let not_found = || ConfigError::NotFound {
            name: join(&self.prefix, path),
        };

        let mut current = &self.value;
        for segment in segments(path) {
            let (key, indexes) = split_indexes(segment);
            if !key.is_empty() {
                current = current.get(unquoted(key)).ok_or_else(not_found)?;
            }
            for i in indexes {
                current = current.get(i).ok_or_else(not_found)?;
            }
        }
        if current.is_null() {
            return Err(not_found());
        }
        self.deserialize(current.clone())
    }

    /// Bind the whole tree to `T`.
    pub fn to_typed<T: DeserializeOwned>(&self) -> ConfigResult<T> {
        self.deserialize(self.value.clone())
    }

    fn deserialize<T: DeserializeOwned>(&self, value: Value) -> ConfigResult<T> {
        serde_json::from_value(value).map_err(|source| ConfigError::Deserialize {
            schema: self.schema.name().to_string(),
            source,
        })
    }

    fn redacted(&self) -> Value {
        redact_group(self.schema.root(), &self.value)
    }
}

impl PartialEq for MappedInstance {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name()
            && self.prefix == other.prefix
            && self.value == other.value
    }
}

/// Pretty JSON with secret leaves masked.
impl fmt::Display for MappedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string_pretty(&self.redacted()).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

/// `list[0][1]` into `list` and `[0, 1]`.
fn split_indexes(segment: &str) -> (&str, Vec<usize>) {
    let mut key = segment;
    let mut indexes = Vec::new();
    while let Some(inner) = key.strip_suffix(']') {
        let Some(open) = inner.rfind('[') else {
            break;
        };
        let Ok(i) = inner[open + 1..].parse() else {
            break;
        };
        indexes.push(i);
        key = &inner[..open];
    }
    indexes.reverse();
    (key, indexes)
}

fn redact_group(group: &GroupSchema, value: &Value) -> Value {
    let Value::Object(object) = value else {
        return value.clone();
    };
    let mut out = object.clone();
    for field in group.fields() {
        if let Some(member) = object.get(field.id()) {
            out.insert(field.id().to_string(), redact(field.node(), member));
        }
    }
    Value::Object(out)
}

fn redact(node: &SchemaNode, value: &Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match node {
        SchemaNode::Value(leaf) if leaf.is_secret() => Value::String(MASK.to_string()),
        SchemaNode::Value(_) => value.clone(),
        SchemaNode::Group(group) => redact_group(group, value),
        SchemaNode::Optional(inner) => redact(inner, value),
        SchemaNode::Collection(collection) => match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| redact(collection.element(), item))
                    .collect(),
            ),
            other => other.clone(),
        },
        SchemaNode::Map(map) => match value {
            Value::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), redact(map.value(), entry)))
                    .collect(),
            ),
            other => other.clone(),
        },
    }
}
