//! Mapping schema tree
//!
//! A [`MappingSchema`] describes how a flat namespace of property names binds into a nested
//! structure. Schemas are plain values, built by hand or by a [`ConfigMapping`]
//! implementation:
//!
//! ```
//! use strata_config::mapping::{Field, GroupSchema, MappingSchema, SchemaNode};
//!
//! let schema = MappingSchema::new(
//!     "Server",
//!     GroupSchema::new()
//!         .field(Field::new("host", SchemaNode::leaf::<String>()))
//!         .field(Field::new("http_port", SchemaNode::leaf::<u16>().with_default("8080")))
//!         .field(Field::new("aliases", SchemaNode::list(SchemaNode::leaf::<String>()))),
//! );
//! assert_eq!(schema.root().fields().len(), 3);
//! ```
//!
//! [`ConfigMapping`]: super::ConfigMapping

use super::naming::NamingStrategy;
use crate::convert::{Converter, Converters};
use crate::error::{ConfigError, ConfigResult};
use serde::Serialize;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

/// The root of a mapping.
#[derive(Debug, Clone)]
pub struct MappingSchema {
    name: String,
    naming_strategy: NamingStrategy,
    root: GroupSchema,
}

impl MappingSchema {
    /// Create a schema with the default naming strategy.
    pub fn new(name: impl Into<String>, root: GroupSchema) -> Self {
        Self {
            name: name.into(),
            naming_strategy: NamingStrategy::default(),
            root,
        }
    }

    /// Use another naming strategy for field identifiers.
    pub fn with_naming_strategy(mut self, strategy: NamingStrategy) -> Self {
        self.naming_strategy = strategy;
        self
    }

    /// Schema name, used to look the mapping up.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Naming strategy.
    pub fn naming_strategy(&self) -> NamingStrategy {
        self.naming_strategy
    }

    /// Root group.
    pub fn root(&self) -> &GroupSchema {
        &self.root
    }

    /// Property name of a field, after naming translation.
    pub fn property_name(&self, field: &Field) -> String {
        match &field.name {
            Some(name) => name.clone(),
            None => self.naming_strategy.apply(&field.id),
        }
    }
}

/// An ordered set of fields.
#[derive(Debug, Clone, Default)]
pub struct GroupSchema {
    fields: Vec<Field>,
}

impl GroupSchema {
    /// An empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// One member of a group.
#[derive(Debug, Clone)]
pub struct Field {
    id: String,
    name: Option<String>,
    parent_name: bool,
    node: SchemaNode,
}

impl Field {
    /// A field whose property name is derived from `id` by the naming strategy.
    pub fn new(id: impl Into<String>, node: impl Into<SchemaNode>) -> Self {
        Self {
            id: id.into(),
            name: None,
            parent_name: false,
            node: node.into(),
        }
    }

    /// Use an explicit property name, bypassing the naming strategy.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Flatten: the field's children live at the parent's path.
    pub fn parent_name(mut self) -> Self {
        self.parent_name = true;
        self
    }

    /// Identifier, also the key in the mapped value tree.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the field is flattened into its parent.
    pub fn is_parent_name(&self) -> bool {
        self.parent_name
    }

    /// The field's schema node.
    pub fn node(&self) -> &SchemaNode {
        &self.node
    }
}

/// A node of the schema tree.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    /// A single converted value
    Value(LeafSchema),
    /// Nested fields
    Group(GroupSchema),
    /// Absent unless some property addresses the inner node
    Optional(Box<SchemaNode>),
    /// List or set of elements
    Collection(CollectionSchema),
    /// Map from string keys to values
    Map(MapSchema),
}

impl SchemaNode {
    /// A leaf converted to `T` through the [`Converters`] registry.
    pub fn leaf<T: Serialize + 'static>() -> LeafSchema {
        LeafSchema::new(LeafType::of::<T>())
    }

    /// A nested group.
    pub fn group(group: GroupSchema) -> Self {
        SchemaNode::Group(group)
    }

    /// An optional node.
    pub fn optional(inner: impl Into<SchemaNode>) -> Self {
        SchemaNode::Optional(Box::new(inner.into()))
    }

    /// A list.
    pub fn list(element: impl Into<SchemaNode>) -> Self {
        SchemaNode::Collection(CollectionSchema {
            kind: CollectionKind::List,
            element: Box::new(element.into()),
        })
    }

    /// A set; duplicates are dropped keeping the first occurrence.
    pub fn set(element: impl Into<SchemaNode>) -> Self {
        SchemaNode::Collection(CollectionSchema {
            kind: CollectionKind::Set,
            element: Box::new(element.into()),
        })
    }

    /// A map with discovered keys.
    pub fn map(value: impl Into<SchemaNode>) -> MapSchema {
        MapSchema::new(value)
    }
}

impl From<LeafSchema> for SchemaNode {
    fn from(leaf: LeafSchema) -> Self {
        SchemaNode::Value(leaf)
    }
}

impl From<GroupSchema> for SchemaNode {
    fn from(group: GroupSchema) -> Self {
        SchemaNode::Group(group)
    }
}

impl From<MapSchema> for SchemaNode {
    fn from(map: MapSchema) -> Self {
        SchemaNode::Map(map)
    }
}

impl From<CollectionSchema> for SchemaNode {
    fn from(collection: CollectionSchema) -> Self {
        SchemaNode::Collection(collection)
    }
}

/// A single value.
#[derive(Debug, Clone)]
pub struct LeafSchema {
    ty: LeafType,
    default: Option<String>,
    secret: bool,
}

impl LeafSchema {
    /// A leaf of the given type.
    pub fn new(ty: LeafType) -> Self {
        Self {
            ty,
            default: None,
            secret: false,
        }
    }

    /// Raw default used when no source has the property. May contain expressions.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Mark as secret: the property joins the secret key set and is redacted when the
    /// mapped instance is displayed.
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Leaf type.
    pub fn ty(&self) -> &LeafType {
        &self.ty
    }

    /// Raw default.
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Whether the leaf is secret.
    pub fn is_secret(&self) -> bool {
        self.secret
    }
}

type ConvertFn =
    dyn Fn(&Converters, &str, &str) -> ConfigResult<Option<serde_json::Value>> + Send + Sync;

/// Conversion of a raw string into a JSON value for the mapped tree.
#[derive(Clone)]
pub struct LeafType {
    type_name: &'static str,
    convert: Arc<ConvertFn>,
}

impl LeafType {
    /// Convert with the registered converter for `T`.
    pub fn of<T: Serialize + 'static>() -> Self {
        Self {
            type_name: type_name::<T>(),
            convert: Arc::new(
                |converters: &Converters, name: &str, raw: &str| -> ConfigResult<Option<serde_json::Value>> {
                    match converters.convert_optional::<T>(name, raw)? {
                        Some(value) => to_json(&value).map(Some),
                        None => Ok(None),
                    }
                },
            ),
        }
    }

    /// Convert with a field-specific converter instead of the registry.
    pub fn with_converter<T, C>(converter: C) -> Self
    where
        T: Serialize + 'static,
        C: Converter<T> + 'static,
    {
        Self {
            type_name: type_name::<T>(),
            convert: Arc::new(move |_: &Converters, name: &str, raw: &str| -> ConfigResult<Option<serde_json::Value>> {
                let converted =
                    converter
                        .convert(raw)
                        .map_err(|source| ConfigError::Conversion {
                            name: name.to_string(),
                            value: raw.to_string(),
                            source,
                        })?;
                match converted {
                    Some(value) => to_json(&value).map(Some),
                    None => Ok(None),
                }
            }),
        }
    }

    /// Name of the target Rust type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Convert the raw value of property `name`.
    pub fn convert(
        &self,
        converters: &Converters,
        name: &str,
        raw: &str,
    ) -> ConfigResult<Option<serde_json::Value>> {
        (self.convert)(converters, name, raw)
    }
}

impl fmt::Debug for LeafType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LeafType").field(&self.type_name).finish()
    }
}

fn to_json<T: Serialize>(value: &T) -> ConfigResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|source| ConfigError::Deserialize {
        schema: type_name::<T>().to_string(),
        source,
    })
}

/// List or set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// Keeps every element in order
    List,
    /// Drops duplicates, keeping the first occurrence
    Set,
}

/// Indexed elements.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    kind: CollectionKind,
    element: Box<SchemaNode>,
}

impl CollectionSchema {
    /// List or set.
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Element node.
    pub fn element(&self) -> &SchemaNode {
        &self.element
    }
}

/// Keyed entries.
#[derive(Debug, Clone)]
pub struct MapSchema {
    value: Box<SchemaNode>,
    keys: Option<Vec<String>>,
    unnamed_key: Option<String>,
    default_key: Option<String>,
}

impl MapSchema {
    /// A map whose keys are discovered from property names.
    pub fn new(value: impl Into<SchemaNode>) -> Self {
        Self {
            value: Box::new(value.into()),
            keys: None,
            unnamed_key: None,
            default_key: None,
        }
    }

    /// Use a fixed key list instead of discovery.
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Properties addressing the map's value node directly at the map path produce an entry
    /// under `marker`.
    pub fn with_unnamed_key(mut self, marker: impl Into<String>) -> Self {
        self.unnamed_key = Some(marker.into());
        self
    }

    /// When discovery finds no key, produce one entry under `key`.
    pub fn with_defaults(mut self, key: impl Into<String>) -> Self {
        self.default_key = Some(key.into());
        self
    }

    /// Value node.
    pub fn value(&self) -> &SchemaNode {
        &self.value
    }

    /// Fixed keys.
    pub fn keys(&self) -> Option<&[String]> {
        self.keys.as_deref()
    }

    /// Unnamed key marker.
    pub fn unnamed_key(&self) -> Option<&str> {
        self.unnamed_key.as_deref()
    }

    /// Default key.
    pub fn default_key(&self) -> Option<&str> {
        self.default_key.as_deref()
    }
}
