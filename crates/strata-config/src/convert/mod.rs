//! Converters from raw strings to typed values
//!
//! A [`Converter<T>`] returns `Ok(None)` for input that means "no value" (for the built-in
//! converters: the empty string), `Ok(Some(t))` on success, and an error for input it
//! rejects. Converters are registered per target type in [`Converters`]; when several
//! converters exist for one type, the highest priority wins and ties go to the first
//! registration.
//!
//! Lists are written as comma separated values. A backslash escapes a comma, empty items
//! are dropped, and a list without any item is absent:
//!
//! | Raw | List |
//! |---|---|
//! | `a,b` | `["a", "b"]` |
//! | `a\,b,c` | `["a,b", "c"]` |
//! | `a,` and `,a` | `["a"]` |
//! | `""`, `,` and `,,` | absent |

mod builtin;

use crate::error::{ConfigError, ConfigResult, ConversionError};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Priority of the built-in converters.
pub const BUILTIN_PRIORITY: i32 = 1;

/// Default priority of user converters.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Converts raw configuration text into `T`.
pub trait Converter<T>: Send + Sync {
    /// Convert `value`. `Ok(None)` means the value counts as absent.
    fn convert(&self, value: &str) -> Result<Option<T>, ConversionError>;
}

impl<T, F> Converter<T> for F
where
    F: Fn(&str) -> Result<Option<T>, ConversionError> + Send + Sync,
{
    fn convert(&self, value: &str) -> Result<Option<T>, ConversionError> {
        self(value)
    }
}

/// A converter for any [`FromStr`] type. Surrounding whitespace is trimmed and blank input
/// is absent.
pub fn from_str<T>() -> impl Converter<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    |value: &str| -> Result<Option<T>, ConversionError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        value.parse::<T>().map(Some).map_err(|e| {
            ConversionError::new(format!(
                "Cannot convert \"{}\" to {}: {}",
                value,
                type_name::<T>(),
                e
            ))
        })
    }
}

/// Split a comma separated value into items.
///
/// `\,` is a literal comma, any other escaped character stands for itself, and empty items
/// are dropped.
pub fn split(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ',' => {
                if !current.is_empty() {
                    items.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        items.push(current);
    }
    items
}

struct Entry {
    priority: i32,
    // Always an `Arc<dyn Converter<T>>` for the `TypeId` it is filed under.
    converter: Box<dyn Any + Send + Sync>,
}

/// Converters by target type.
pub struct Converters {
    by_type: HashMap<TypeId, Vec<Entry>>,
}

impl Converters {
    /// A registry with the built-in converters.
    pub fn new() -> Self {
        let mut converters = Self::empty();
        builtin::register(&mut converters);
        converters
    }

    /// A registry without any converter.
    pub fn empty() -> Self {
        Self {
            by_type: HashMap::new(),
        }
    }

    /// Register a converter for `T`.
    pub fn register<T, C>(&mut self, priority: i32, converter: C)
    where
        T: 'static,
        C: Converter<T> + 'static,
    {
        let converter: Arc<dyn Converter<T>> = Arc::new(converter);
        self.by_type.entry(TypeId::of::<T>()).or_default().push(Entry {
            priority,
            converter: Box::new(converter),
        });
    }

    /// Register [`from_str`] for `T` at the default priority.
    pub fn register_from_str<T>(&mut self)
    where
        T: FromStr + 'static,
        T::Err: fmt::Display,
    {
        self.register::<T, _>(DEFAULT_PRIORITY, from_str::<T>());
    }

    /// The winning converter for `T`.
    pub fn get<T: 'static>(&self) -> Option<Arc<dyn Converter<T>>> {
        let entries = self.by_type.get(&TypeId::of::<T>())?;
        let mut best: Option<&Entry> = None;
        for entry in entries {
            if best.map_or(true, |b| entry.priority > b.priority) {
                best = Some(entry);
            }
        }
        best?.converter.downcast_ref::<Arc<dyn Converter<T>>>().cloned()
    }

    /// Whether any converter is registered for `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    fn require<T: 'static>(&self) -> ConfigResult<Arc<dyn Converter<T>>> {
        self.get::<T>().ok_or(ConfigError::NoConverter {
            type_name: type_name::<T>(),
        })
    }

    /// Convert the value of property `name`, `Ok(None)` when the converter reports absent.
    pub fn convert_optional<T: 'static>(&self, name: &str, value: &str) -> ConfigResult<Option<T>> {
        self.require::<T>()?
            .convert(value)
            .map_err(|source| ConfigError::Conversion {
                name: name.to_string(),
                value: value.to_string(),
                source,
            })
    }

    /// Convert the value of property `name`; an absent result is [`ConfigError::EmptyValue`].
    pub fn convert<T: 'static>(&self, name: &str, value: &str) -> ConfigResult<T> {
        self.convert_optional(name, value)?
            .ok_or_else(|| ConfigError::EmptyValue {
                name: name.to_string(),
            })
    }

    /// Convert a comma separated value. Items converting to absent are skipped; a list
    /// without items is `Ok(None)`.
    pub fn convert_list<T: 'static>(&self, name: &str, value: &str) -> ConfigResult<Option<Vec<T>>> {
        let converter = self.require::<T>()?;
        let mut out = Vec::new();
        for item in split(value) {
            let converted = converter
                .convert(&item)
                .map_err(|source| ConfigError::Conversion {
                    name: name.to_string(),
                    value: item.clone(),
                    source,
                })?;
            out.extend(converted);
        }
        Ok((!out.is_empty()).then_some(out))
    }
}

impl Default for Converters {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converters")
            .field("types", &self.by_type.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn split_follows_list_rules() {
        assert_eq!(split("a,b"), vec!["a", "b"]);
        assert_eq!(split("a\\,b,c"), vec!["a,b", "c"]);
        assert_eq!(split("a,"), vec!["a"]);
        assert_eq!(split(",a"), vec!["a"]);
        assert!(split("").is_empty());
        assert!(split(",").is_empty());
        assert!(split(",,").is_empty());
    }

    #[test]
    fn empty_lists_are_absent() {
        let converters = Converters::new();
        for raw in ["", ",", ",,"] {
            assert_eq!(converters.convert_list::<String>("k", raw).unwrap(), None);
        }
        assert_eq!(
            converters.convert_list::<i32>("k", "1, 2,3").unwrap(),
            Some(vec![1, 2, 3])
        );
    }

    #[test]
    fn highest_priority_wins_ties_go_first() {
        let mut converters = Converters::empty();
        converters.register::<u8, _>(10, |_: &str| -> Result<Option<u8>, ConversionError> { Ok(Some(1)) });
        converters.register::<u8, _>(20, |_: &str| -> Result<Option<u8>, ConversionError> { Ok(Some(2)) });
        converters.register::<u8, _>(20, |_: &str| -> Result<Option<u8>, ConversionError> { Ok(Some(3)) });
        assert_eq!(converters.convert::<u8>("k", "x").unwrap(), 2);
    }

    #[test]
    fn user_converter_overrides_builtin() {
        let mut converters = Converters::new();
        converters.register::<bool, _>(DEFAULT_PRIORITY, |v: &str| -> Result<Option<bool>, ConversionError> {
            Ok(Some(v == "si"))
        });
        assert!(converters.convert::<bool>("k", "si").unwrap());
    }

    #[test]
    fn errors_carry_name_and_value() {
        let converters = Converters::new();
        let err = converters.convert::<i32>("server.port", "abc").unwrap_err();
        match err {
            ConfigError::Conversion { name, value, .. } => {
                assert_eq!(name, "server.port");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = converters.convert::<i32>("server.port", "").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue { .. }));
    }

    #[test]
    fn missing_converter() {
        struct Unknown;
        let converters = Converters::new();
        let err = converters.convert_optional::<Unknown>("k", "v").err().unwrap();
        assert!(matches!(err, ConfigError::NoConverter { .. }));
    }

    #[test]
    fn from_str_adapts_any_type() {
        #[derive(Debug, PartialEq)]
        struct Level(u8);
        impl FromStr for Level {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.strip_prefix('L')
                    .and_then(|n| n.parse().ok())
                    .map(Level)
                    .ok_or_else(|| format!("bad level {}", s))
            }
        }

        let mut converters = Converters::new();
        converters.register_from_str::<Level>();
        assert_eq!(converters.convert::<Level>("k", " L3 ").unwrap(), Level(3));
        assert!(converters.convert::<Level>("k", "x").is_err());
    }

    proptest! {
        #[test]
        fn split_never_yields_empty_items(raw in "[a-c,\\\\]{0,20}") {
            prop_assert!(split(&raw).iter().all(|item| !item.is_empty()));
        }

        #[test]
        fn split_roundtrips_escaped_items(items in prop::collection::vec("[a-z,]{1,5}", 1..5)) {
            let raw = items
                .iter()
                .map(|item| item.replace(',', "\\,"))
                .collect::<Vec<_>>()
                .join(",");
            prop_assert_eq!(split(&raw), items);
        }
    }
}
