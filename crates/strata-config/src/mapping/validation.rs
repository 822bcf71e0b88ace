//! Compiled name patterns and unknown property detection.

use super::schema::{GroupSchema, MappingSchema, SchemaNode};
use crate::error::{Problem, ProblemKind};
use crate::name::{first_segment, join, strip_prefix, unindexed, unquoted, PropertyName};
use globset::GlobSet;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Every property name a node at `path` can consume, as wildcard patterns.
pub(crate) fn node_patterns(
    schema: &MappingSchema,
    node: &SchemaNode,
    path: &str,
    out: &mut HashSet<PropertyName>,
) {
    match node {
        SchemaNode::Value(_) => {
            out.insert(PropertyName::new(path));
        }
        SchemaNode::Group(group) => group_patterns(schema, group, path, out),
        SchemaNode::Optional(inner) => node_patterns(schema, inner, path, out),
        SchemaNode::Collection(collection) => {
            let indexed = format!("{}[*]", path);
            if let SchemaNode::Value(_) = collection.element() {
                out.insert(PropertyName::new(path));
            }
            node_patterns(schema, collection.element(), &indexed, out);
        }
        SchemaNode::Map(map) => {
            node_patterns(schema, map.value(), &join(path, "*"), out);
            if map.unnamed_key().is_some() {
                node_patterns(schema, map.value(), path, out);
            }
        }
    }
}

pub(crate) fn group_patterns(
    schema: &MappingSchema,
    group: &GroupSchema,
    path: &str,
    out: &mut HashSet<PropertyName>,
) {
    for field in group.fields() {
        let child = if field.is_parent_name() {
            path.to_string()
        } else {
            join(path, &schema.property_name(field))
        };
        node_patterns(schema, field.node(), &child, out);
    }
}

/// Patterns of every secret leaf below `path`.
pub(crate) fn secret_patterns(
    schema: &MappingSchema,
    node: &SchemaNode,
    path: &str,
    out: &mut HashSet<PropertyName>,
) {
    match node {
        SchemaNode::Value(leaf) => {
            if leaf.is_secret() {
                out.insert(PropertyName::new(path));
            }
        }
        SchemaNode::Group(group) => group_secret_patterns(schema, group, path, out),
        SchemaNode::Optional(inner) => secret_patterns(schema, inner, path, out),
        SchemaNode::Collection(collection) => {
            if let SchemaNode::Value(leaf) = collection.element() {
                if leaf.is_secret() {
                    out.insert(PropertyName::new(path));
                }
            }
            secret_patterns(schema, collection.element(), &format!("{}[*]", path), out);
        }
        SchemaNode::Map(map) => {
            secret_patterns(schema, map.value(), &join(path, "*"), out);
            if map.unnamed_key().is_some() {
                secret_patterns(schema, map.value(), path, out);
            }
        }
    }
}

pub(crate) fn group_secret_patterns(
    schema: &MappingSchema,
    group: &GroupSchema,
    path: &str,
    out: &mut HashSet<PropertyName>,
) {
    for field in group.fields() {
        let child = if field.is_parent_name() {
            path.to_string()
        } else {
            join(path, &schema.property_name(field))
        };
        secret_patterns(schema, field.node(), &child, out);
    }
}

/// Defaults of leaves reachable through groups only, keyed by their concrete name.
///
/// Leaves below optionals, collections and maps have no single concrete name; the mapper
/// applies their defaults itself.
pub(crate) fn leaf_defaults(
    schema: &MappingSchema,
    group: &GroupSchema,
    path: &str,
    out: &mut Vec<(String, String)>,
) {
    for field in group.fields() {
        let child = if field.is_parent_name() {
            path.to_string()
        } else {
            join(path, &schema.property_name(field))
        };
        match field.node() {
            SchemaNode::Value(leaf) => {
                if let Some(default) = leaf.default_value() {
                    out.push((child, default.to_string()));
                }
            }
            SchemaNode::Group(inner) => leaf_defaults(schema, inner, &child, out),
            _ => {}
        }
    }
}

/// A registered root, as seen by validation.
pub(crate) struct Root<'a> {
    pub(crate) schema: &'a MappingSchema,
    pub(crate) prefix: &'a str,
}

fn segment_key(segment: &str) -> &str {
    unquoted(unindexed(segment))
}

/// Report every name under a root prefix that no schema pattern accepts.
pub(crate) fn unknown_properties(
    roots: &[Root<'_>],
    names: &BTreeSet<String>,
    ignore: Option<&GlobSet>,
) -> Vec<Problem> {
    let mut patterns = HashSet::new();
    let mut prefixes = Vec::new();
    let mut top_level = HashSet::new();

    for root in roots {
        let mut own = HashSet::new();
        group_patterns(root.schema, root.schema.root(), root.prefix, &mut own);
        if root.prefix.is_empty() {
            for pattern in &own {
                top_level.insert(segment_key(first_segment(pattern.as_str()).0).to_string());
            }
        } else {
            prefixes.push(root.prefix);
        }
        patterns.extend(own);
    }

    let mut problems = Vec::new();
    for name in names {
        let under_root = prefixes
            .iter()
            .any(|prefix| strip_prefix(name, prefix).is_some())
            || top_level.contains(segment_key(first_segment(name).0));
        if !under_root || patterns.contains(&PropertyName::new(name.as_str())) {
            continue;
        }
        if ignore.is_some_and(|globs| globs.is_match(name)) {
            debug!("Ignoring unmapped property {}", name);
            continue;
        }
        problems.push(Problem::new(
            name.clone(),
            ProblemKind::Unknown,
            format!("{} does not map to any root", name),
        ));
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::schema::Field;
    use globset::{Glob, GlobSetBuilder};

    fn schema() -> MappingSchema {
        MappingSchema::new(
            "Server",
            GroupSchema::new()
                .field(Field::new("host", SchemaNode::leaf::<String>()))
                .field(Field::new("aliases", SchemaNode::list(SchemaNode::leaf::<String>())))
                .field(Field::new(
                    "apps",
                    SchemaNode::map(GroupSchema::new().field(Field::new("port", SchemaNode::leaf::<u16>()))),
                ))
                .field(Field::new(
                    "log",
                    GroupSchema::new().field(Field::new("level", SchemaNode::leaf::<String>())),
                ).parent_name()),
        )
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn compiles_patterns() {
        let schema = schema();
        let mut out = HashSet::new();
        group_patterns(&schema, schema.root(), "server", &mut out);
        for name in [
            "server.host",
            "server.aliases",
            "server.aliases[3]",
            "server.apps.a.port",
            "server.apps.\"x.y\".port",
            "server.level",
        ] {
            assert!(out.contains(&PropertyName::new(name)), "{}", name);
        }
        assert!(!out.contains(&PropertyName::new("server.apps.a.host")));
    }

    #[test]
    fn collects_secrets_and_concrete_defaults() {
        let schema = MappingSchema::new(
            "Db",
            GroupSchema::new()
                .field(Field::new("url", SchemaNode::leaf::<String>().with_default("mem")))
                .field(Field::new("password", SchemaNode::leaf::<String>().secret()))
                .field(Field::new(
                    "replicas",
                    SchemaNode::map(
                        GroupSchema::new()
                            .field(Field::new("token", SchemaNode::leaf::<String>().secret()))
                            .field(Field::new("weight", SchemaNode::leaf::<u8>().with_default("1"))),
                    ),
                )),
        );

        let mut secrets = HashSet::new();
        group_secret_patterns(&schema, schema.root(), "db", &mut secrets);
        assert!(secrets.contains(&PropertyName::new("db.password")));
        assert!(secrets.contains(&PropertyName::new("db.replicas.east.token")));
        assert!(!secrets.contains(&PropertyName::new("db.url")));

        let mut defaults = Vec::new();
        leaf_defaults(&schema, schema.root(), "db", &mut defaults);
        assert_eq!(defaults, vec![("db.url".to_string(), "mem".to_string())]);
    }

    #[test]
    fn reports_only_names_under_roots() {
        let schema = schema();
        let roots = [Root {
            schema: &schema,
            prefix: "server",
        }];
        let problems = unknown_properties(
            &roots,
            &names(&["server.host", "server.unknown", "client.unknown", "servers.x"]),
            None,
        );
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].message(), "server.unknown does not map to any root");
        assert_eq!(problems[0].kind(), &ProblemKind::Unknown);
    }

    #[test]
    fn ignore_globs_skip_names() {
        let schema = schema();
        let roots = [Root {
            schema: &schema,
            prefix: "server",
        }];
        let mut globs = GlobSetBuilder::new();
        globs.add(Glob::new("server.extra.*").unwrap());
        let globs = globs.build().unwrap();

        let problems = unknown_properties(
            &roots,
            &names(&["server.extra.a", "server.other"]),
            Some(&globs),
        );
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].name(), "server.other");
    }

    #[test]
    fn empty_prefix_checks_top_level_fields() {
        let schema = schema();
        let roots = [Root {
            schema: &schema,
            prefix: "",
        }];
        let problems = unknown_properties(
            &roots,
            &names(&["host", "apps.a.bogus", "unrelated.key"]),
            None,
        );
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].name(), "apps.a.bogus");
    }
}
