//! The interceptor chain
//!
//! Every lookup walks an ordered list of [`Interceptor`]s before it reaches the
//! [`SourceRegistry`]. The interceptor with the highest priority sees the request first and
//! decides whether, and under which name, to hand it down with
//! [`InterceptorContext::proceed`]. Name enumeration walks the same list, so an interceptor
//! that renames lookups can rename enumerated names consistently.
//!
//! ## Stock interceptors
//!
//! | Interceptor | Priority |
//! |---|---|
//! | [`SecretKeysInterceptor`] | `LIBRARY + 900` |
//! | [`RelocateInterceptor`] | `LIBRARY + 700` |
//! | [`FallbackInterceptor`] | `LIBRARY + 600` |
//! | [`ProfileInterceptor`] | `LIBRARY + 500` |
//! | [`ExpressionInterceptor`] | `LIBRARY + 300` |
//! | user interceptors | `APPLICATION` by default |
//! | [`LoggingInterceptor`] | 500 |
//!
//! The chain is assembled once by [`ConfigBuilder::build`](crate::ConfigBuilder::build) and
//! never changes afterwards.

mod expression;
mod logging;
mod profile;
mod relocate;
mod secret;

pub use expression::ExpressionInterceptor;
pub use logging::LoggingInterceptor;
pub use profile::ProfileInterceptor;
pub use relocate::{FallbackInterceptor, NameMapping, RelocateInterceptor};
pub use secret::SecretKeysInterceptor;

use crate::error::{ConfigError, ConfigResult};
use crate::source::SourceRegistry;
use crate::value::ConfigValue;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Interceptor priorities. Higher runs first.
pub mod priorities {
    /// Interceptors that must run before anything else
    pub const PLATFORM: i32 = 5000;
    /// Stock library interceptors
    pub const LIBRARY: i32 = 3000;
    /// Default for user interceptors
    pub const APPLICATION: i32 = 1000;
}

/// Maximum nesting of [`InterceptorContext::restart`] calls.
pub const MAX_DEPTH: usize = 32;

/// One link of the chain.
///
/// Only [`get_value`](Interceptor::get_value) is required; enumeration passes through by
/// default. Closures of the right shape are interceptors too:
///
/// ```
/// use strata_config::{InterceptorContext, ConfigResult, ConfigValue};
///
/// let upper = |ctx: &InterceptorContext<'_>, name: &str| -> ConfigResult<Option<ConfigValue>> {
///     Ok(ctx.proceed(name)?.map(|v| v.with_value(v.value().to_uppercase())))
/// };
/// # let _ = upper;
/// ```
pub trait Interceptor: Send + Sync {
    /// Resolve `name`, usually by delegating to `ctx.proceed`.
    fn get_value(&self, ctx: &InterceptorContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>>;

    /// Enumerate names, usually by transforming `ctx.iterate_names()`.
    fn iterate_names(&self, ctx: &InterceptorContext<'_>) -> BTreeSet<String> {
        ctx.iterate_names()
    }

    /// Enumerate values, usually by transforming `ctx.iterate_values()`.
    fn iterate_values(&self, ctx: &InterceptorContext<'_>) -> Vec<ConfigValue> {
        ctx.iterate_values()
    }

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Interceptor for F
where
    F: Fn(&InterceptorContext<'_>, &str) -> ConfigResult<Option<ConfigValue>> + Send + Sync,
{
    fn get_value(&self, ctx: &InterceptorContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        self(ctx, name)
    }
}

/// The position of one request in the chain.
#[derive(Clone, Copy)]
pub struct InterceptorContext<'a> {
    chain: &'a Chain,
    index: usize,
    depth: usize,
}

impl<'a> InterceptorContext<'a> {
    /// Hand `name` to the next link.
    pub fn proceed(&self, name: &str) -> ConfigResult<Option<ConfigValue>> {
        self.chain.get_value_at(self.index + 1, self.depth, name)
    }

    /// Resolve `name` from the top of the chain, one nesting level deeper.
    ///
    /// Fails with [`ConfigError::ExpansionTooDeep`] past [`MAX_DEPTH`] levels.
    pub fn restart(&self, name: &str) -> ConfigResult<Option<ConfigValue>> {
        let depth = self.depth + 1;
        if depth >= MAX_DEPTH {
            return Err(ConfigError::ExpansionTooDeep {
                name: name.to_string(),
            });
        }
        self.chain.get_value_at(0, depth, name)
    }

    /// Names enumerated by the rest of the chain.
    pub fn iterate_names(&self) -> BTreeSet<String> {
        self.chain.names_at(self.index + 1)
    }

    /// Values enumerated by the rest of the chain.
    pub fn iterate_values(&self) -> Vec<ConfigValue> {
        self.chain.values_at(self.index + 1)
    }

    /// Nesting level of this request; 0 for direct lookups.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The underlying sources.
    pub fn sources(&self) -> &'a SourceRegistry {
        &self.chain.sources
    }
}

struct Link {
    priority: i32,
    interceptor: Arc<dyn Interceptor>,
}

/// Interceptors in priority order, ending at the source registry.
pub struct Chain {
    links: Vec<Link>,
    sources: SourceRegistry,
}

impl Chain {
    /// Order interceptors by descending priority; ties keep the given order.
    pub fn new(sources: SourceRegistry, interceptors: Vec<(i32, Arc<dyn Interceptor>)>) -> Self {
        let mut links: Vec<Link> = interceptors
            .into_iter()
            .map(|(priority, interceptor)| Link {
                priority,
                interceptor,
            })
            .collect();
        links.sort_by_key(|link| std::cmp::Reverse(link.priority));

        for link in &links {
            debug!(
                "Interceptor {} (priority {})",
                link.interceptor.name(),
                link.priority
            );
        }

        Self { links, sources }
    }

    /// Resolve a name through the whole chain.
    pub fn get_value(&self, name: &str) -> ConfigResult<Option<ConfigValue>> {
        self.get_value_at(0, 0, name)
    }

    /// Enumerate names through the whole chain.
    pub fn property_names(&self) -> BTreeSet<String> {
        self.names_at(0)
    }

    /// Enumerate values through the whole chain.
    pub fn values(&self) -> Vec<ConfigValue> {
        self.values_at(0)
    }

    /// The underlying sources.
    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// Priorities of the links, in call order.
    pub fn priorities(&self) -> Vec<i32> {
        self.links.iter().map(|link| link.priority).collect()
    }

    fn context(&self, index: usize, depth: usize) -> InterceptorContext<'_> {
        InterceptorContext {
            chain: self,
            index,
            depth,
        }
    }

    fn get_value_at(&self, index: usize, depth: usize, name: &str) -> ConfigResult<Option<ConfigValue>> {
        match self.links.get(index) {
            Some(link) => link.interceptor.get_value(&self.context(index, depth), name),
            None => Ok(self.sources.get_value(name)),
        }
    }

    fn names_at(&self, index: usize) -> BTreeSet<String> {
        match self.links.get(index) {
            Some(link) => link.interceptor.iterate_names(&self.context(index, 0)),
            None => self.sources.property_names(),
        }
    }

    fn values_at(&self, index: usize) -> Vec<ConfigValue> {
        match self.links.get(index) {
            Some(link) => link.interceptor.iterate_values(&self.context(index, 0)),
            None => self.sources.values(),
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field(
                "links",
                &self
                    .links
                    .iter()
                    .map(|link| (link.interceptor.name(), link.priority))
                    .collect::<Vec<_>>(),
            )
            .field("sources", &self.sources)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ConfigSource, MapSource};

    fn registry(pairs: &[(&str, &str)]) -> SourceRegistry {
        let source: Arc<dyn ConfigSource> = Arc::new(MapSource::new("test", pairs.iter().copied()));
        SourceRegistry::new(vec![source])
    }

    fn suffix(tag: &'static str) -> Arc<dyn Interceptor> {
        Arc::new(move |ctx: &InterceptorContext<'_>, name: &str| -> ConfigResult<Option<ConfigValue>> {
            Ok(ctx
                .proceed(name)?
                .map(|v| v.with_value(format!("{}{}", v.value(), tag))))
        })
    }

    #[test]
    fn higher_priority_sees_request_first() {
        let chain = Chain::new(
            registry(&[("k", "v")]),
            vec![(10, suffix("-low")), (20, suffix("-high"))],
        );
        // The high interceptor wraps the low one, so its suffix is applied last.
        assert_eq!(chain.get_value("k").unwrap().unwrap().value(), "v-low-high");
        assert_eq!(chain.priorities(), vec![20, 10]);
    }

    #[test]
    fn ties_keep_declaration_order() {
        let chain = Chain::new(
            registry(&[("k", "v")]),
            vec![(10, suffix("-first")), (10, suffix("-second"))],
        );
        assert_eq!(chain.get_value("k").unwrap().unwrap().value(), "v-second-first");
    }

    #[test]
    fn short_circuit_skips_sources() {
        let veto: Arc<dyn Interceptor> =
            Arc::new(|_: &InterceptorContext<'_>, _: &str| -> ConfigResult<Option<ConfigValue>> { Ok(None) });
        let chain = Chain::new(registry(&[("k", "v")]), vec![(1, veto)]);
        assert!(chain.get_value("k").unwrap().is_none());
        assert!(chain.property_names().contains("k"));
    }

    #[test]
    fn restart_is_bounded() {
        let recurse: Arc<dyn Interceptor> =
            Arc::new(|ctx: &InterceptorContext<'_>, name: &str| ctx.restart(name));
        let chain = Chain::new(registry(&[]), vec![(1, recurse)]);
        let err = chain.get_value("loop").unwrap_err();
        assert!(matches!(err, ConfigError::ExpansionTooDeep { .. }));
    }

    #[test]
    fn restart_reports_depth() {
        let probe: Arc<dyn Interceptor> = Arc::new(|ctx: &InterceptorContext<'_>, name: &str| {
            if name == "outer" {
                ctx.restart("inner")
            } else {
                Ok(Some(ConfigValue::builder(name, ctx.depth().to_string()).build()))
            }
        });
        let chain = Chain::new(registry(&[]), vec![(1, probe)]);
        assert_eq!(chain.get_value("outer").unwrap().unwrap().value(), "1");
    }
}
