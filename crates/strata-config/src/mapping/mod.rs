//! Structural mapping of flat property names into nested values
//!
//! A [`MappingSchema`] is registered with the builder together with a root prefix. When the
//! configuration is built, every root is bound once into a [`MappedInstance`]:
//!
//! | Node | Property names consumed |
//! |---|---|
//! | `Value` | `prefix.field` |
//! | `Group` | `prefix.field.*` (or `prefix.*` when flattened with `parent_name`) |
//! | `Optional` | whatever the inner node consumes; absent when nothing addresses it |
//! | `Collection` | `prefix.field[i]`, or a comma separated `prefix.field` for leaves |
//! | `Map` | `prefix.field.<key>...`, plus `prefix.field...` for an unnamed key |
//!
//! Missing required values, conversion failures and properties under a root that no node
//! consumes are collected and reported together as one
//! [`ValidationError`](crate::ValidationError).

mod engine;
mod instance;
mod naming;
mod schema;
mod validation;

pub use instance::{ConfigMapping, MappedInstance};
pub use naming::NamingStrategy;
pub use schema::{
    CollectionKind, CollectionSchema, Field, GroupSchema, LeafSchema, LeafType, MapSchema,
    MappingSchema, SchemaNode,
};

pub(crate) use engine::Mapper;
pub(crate) use validation::{group_secret_patterns, leaf_defaults, unknown_properties, Root};
