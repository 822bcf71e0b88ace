//! Name relocation and fallback
//!
//! Both interceptors are driven by a name mapping: an exact map, a prefix map, or any
//! function from name to name. They differ in which name is tried first.
//!
//! - [`RelocateInterceptor`]: the mapped (new) name first, the requested name as fallback.
//!   Used when a property has moved and old names must keep working.
//! - [`FallbackInterceptor`]: the requested name first, the mapped name when the requested
//!   one is absent or empty.

use super::{Interceptor, InterceptorContext};
use crate::error::ConfigResult;
use crate::name::strip_prefix;
use crate::value::ConfigValue;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

type MapFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A name-to-name mapping.
#[derive(Clone)]
pub struct NameMapping {
    map: MapFn,
}

impl NameMapping {
    /// Map exact names.
    pub fn exact<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_fn(move |name| pairs.get(name).cloned())
    }

    /// Map names by prefix: `old.x` becomes `new.x` for the pair (`old`, `new`).
    ///
    /// The longest matching prefix wins.
    pub fn prefixes<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        pairs.sort_by_key(|(from, _)| std::cmp::Reverse(from.len()));
        Self::from_fn(move |name| {
            pairs.iter().find_map(|(from, to)| {
                strip_prefix(name, from).map(|rest| {
                    if rest.is_empty() {
                        to.clone()
                    } else if rest.starts_with('[') {
                        format!("{}{}", to, rest)
                    } else {
                        format!("{}.{}", to, rest)
                    }
                })
            })
        })
    }

    /// Map with an arbitrary function; `None` leaves the name alone.
    pub fn from_fn<F>(map: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self { map: Arc::new(map) }
    }

    /// The mapped name, if it differs from `name`.
    pub fn apply(&self, name: &str) -> Option<String> {
        (self.map)(name).filter(|mapped| mapped != name)
    }
}

impl fmt::Debug for NameMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameMapping").finish_non_exhaustive()
    }
}

/// Tries the relocated name before the requested one.
#[derive(Debug, Clone)]
pub struct RelocateInterceptor {
    mapping: NameMapping,
}

impl RelocateInterceptor {
    /// Relocate names through `mapping`.
    pub fn new(mapping: NameMapping) -> Self {
        Self { mapping }
    }
}

impl Interceptor for RelocateInterceptor {
    fn get_value(&self, ctx: &InterceptorContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        if let Some(relocated) = self.mapping.apply(name) {
            if let Some(value) = ctx.proceed(&relocated)? {
                return Ok(Some(value));
            }
        }
        ctx.proceed(name)
    }

    fn iterate_names(&self, ctx: &InterceptorContext<'_>) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for name in ctx.iterate_names() {
            if let Some(relocated) = self.mapping.apply(&name) {
                names.insert(relocated);
            }
            names.insert(name);
        }
        names
    }

    fn iterate_values(&self, ctx: &InterceptorContext<'_>) -> Vec<ConfigValue> {
        let mut values = Vec::new();
        for value in ctx.iterate_values() {
            if let Some(relocated) = self.mapping.apply(value.name()) {
                values.push(value.with_name(relocated));
            }
            values.push(value);
        }
        values
    }

    fn name(&self) -> &str {
        "RelocateInterceptor"
    }
}

/// Tries the fallback name when the requested one is absent or empty.
#[derive(Debug, Clone)]
pub struct FallbackInterceptor {
    mapping: NameMapping,
}

impl FallbackInterceptor {
    /// Fall back through `mapping`.
    pub fn new(mapping: NameMapping) -> Self {
        Self { mapping }
    }
}

impl Interceptor for FallbackInterceptor {
    fn get_value(&self, ctx: &InterceptorContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        let value = ctx.proceed(name)?;
        if value.as_ref().is_some_and(|v| !v.value().is_empty()) {
            return Ok(value);
        }
        match self.mapping.apply(name) {
            Some(fallback) => match ctx.proceed(&fallback)? {
                Some(found) => Ok(Some(found)),
                None => Ok(value),
            },
            None => Ok(value),
        }
    }

    fn name(&self) -> &str {
        "FallbackInterceptor"
    }
}
