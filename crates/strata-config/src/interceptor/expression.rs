use super::{Interceptor, InterceptorContext};
use crate::error::ConfigResult;
use crate::expression::{expand, Expressions};
use crate::handler::SecretHandlers;
use crate::name::unprofiled;
use crate::value::ConfigValue;

/// Expands `${...}` references in resolved values.
///
/// References are resolved from the top of the chain, so they see profile overlays,
/// relocations and secret gating exactly like a direct lookup. The raw value is kept on
/// the returned [`ConfigValue`]; failures to expand become problems on the value.
/// `${handler::secret}` calls are decoded by the registered [`SecretHandlers`].
#[derive(Debug, Clone)]
pub struct ExpressionInterceptor {
    enabled: bool,
    handlers: SecretHandlers,
}

impl ExpressionInterceptor {
    /// Create the interceptor; `enabled = false` passes values through untouched.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            handlers: SecretHandlers::new(),
        }
    }

    /// Decode handler calls with `handlers`.
    pub fn with_handlers(mut self, handlers: SecretHandlers) -> Self {
        self.handlers = handlers;
        self
    }
}

impl Default for ExpressionInterceptor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Interceptor for ExpressionInterceptor {
    fn get_value(&self, ctx: &InterceptorContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        let value = ctx.proceed(name)?;
        if !self.enabled || !Expressions::is_enabled() {
            return Ok(value);
        }
        let Some(value) = value else {
            return Ok(None);
        };
        if !value.value().contains('$') {
            return Ok(Some(value));
        }

        let expanded = expand(value.value(), unprofiled(name), &self.handlers, |key| {
            ctx.restart(key)
        })?;
        Ok(Some(
            value
                .derive()
                .value(expanded.value)
                .problems(expanded.problems)
                .build(),
        ))
    }

    fn name(&self) -> &str {
        "ExpressionInterceptor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, ConversionError};
    use crate::interceptor::{Chain, Interceptor, ProfileInterceptor};
    use crate::source::{ConfigSource, MapSource, SourceRegistry};
    use std::sync::Arc;

    fn build(pairs: &[(&str, &str)], profiles: &[&str]) -> Chain {
        let source: Arc<dyn ConfigSource> = Arc::new(MapSource::new("test", pairs.iter().copied()));
        let profile: Arc<dyn Interceptor> = Arc::new(ProfileInterceptor::new(profiles.iter().copied()));
        let mut handlers = SecretHandlers::new();
        handlers.register("plain", |s: &str| -> Result<String, ConversionError> {
            Ok(s.trim_start_matches("enc:").to_string())
        });
        let expression: Arc<dyn Interceptor> =
            Arc::new(ExpressionInterceptor::default().with_handlers(handlers));
        Chain::new(
            SourceRegistry::new(vec![source]),
            vec![(3300, expression), (3500, profile)],
        )
    }

    #[test]
    fn expands_and_keeps_raw_value() {
        let chain = build(&[("host", "localhost"), ("url", "http://${host}:${port:80}")], &[]);
        let value = chain.get_value("url").unwrap().unwrap();
        assert_eq!(value.value(), "http://localhost:80");
        assert_eq!(value.raw_value(), "http://${host}:${port:80}");
    }

    #[test]
    fn references_see_profiles() {
        let chain = build(
            &[("host", "prod-host"), ("%dev.host", "dev-host"), ("url", "${host}")],
            &["dev"],
        );
        assert_eq!(chain.get_value("url").unwrap().unwrap().value(), "dev-host");
    }

    #[test]
    fn self_reference_is_too_deep() {
        let chain = build(&[("k", "${k}")], &[]);
        let err = chain.get_value("k").unwrap_err();
        assert!(matches!(err, ConfigError::ExpansionTooDeep { .. }));
    }

    #[test]
    fn missing_reference_becomes_problem() {
        let chain = build(&[("a", "${b}"), ("c", "${a}")], &[]);
        let a = chain.get_value("a").unwrap().unwrap();
        assert_eq!(a.problems()[0].to_string(), "Could not expand value b in property a");

        let c = chain.get_value("c").unwrap().unwrap();
        assert_eq!(c.problems(), a.problems());
    }

    #[test]
    fn handler_calls_are_decoded() {
        let chain = build(&[("%dev.key", "${plain::enc:s3cret}"), ("key", "x")], &["dev"]);
        let value = chain.get_value("key").unwrap().unwrap();
        assert_eq!(value.value(), "s3cret");
        assert_eq!(value.raw_value(), "${plain::enc:s3cret}");

        let chain = build(&[("key", "${vault::abc}")], &[]);
        let value = chain.get_value("key").unwrap().unwrap();
        assert_eq!(
            value.problems()[0].to_string(),
            "Secret keys handler vault not found for property key"
        );
    }

    #[test]
    fn disabled_scope_returns_raw_text() {
        let chain = build(&[("host", "h"), ("url", "${host}")], &[]);
        let raw = Expressions::without(|| chain.get_value("url").unwrap().unwrap());
        assert_eq!(raw.value(), "${host}");
    }
}
