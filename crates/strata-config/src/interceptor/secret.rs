use super::{Interceptor, InterceptorContext};
use crate::error::{ConfigError, ConfigResult};
use crate::name::{unprofiled, PropertyName};
use crate::secret::SecretKeys;
use crate::value::ConfigValue;
use std::collections::{BTreeSet, HashSet};

/// Denies access to secret keys outside an unlocked scope.
///
/// Secret keys may be patterns (`db.*.password`); profile-qualified lookups of a secret
/// (`%dev.db.password`) are secret too. While locked, secret names are also hidden from
/// enumeration.
#[derive(Debug, Clone, Default)]
pub struct SecretKeysInterceptor {
    secrets: HashSet<PropertyName>,
}

impl SecretKeysInterceptor {
    /// Guard the given names or patterns.
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PropertyName>,
    {
        Self {
            secrets: secrets.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `name` is a secret.
    pub fn is_secret(&self, name: &str) -> bool {
        !self.secrets.is_empty() && self.secrets.contains(&PropertyName::new(unprofiled(name)))
    }

    /// The guarded names and patterns.
    pub fn secrets(&self) -> &HashSet<PropertyName> {
        &self.secrets
    }
}

impl Interceptor for SecretKeysInterceptor {
    fn get_value(&self, ctx: &InterceptorContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        if SecretKeys::is_locked() && self.is_secret(name) {
            return Err(ConfigError::Security {
                name: name.to_string(),
            });
        }
        ctx.proceed(name)
    }

    fn iterate_names(&self, ctx: &InterceptorContext<'_>) -> BTreeSet<String> {
        let names = ctx.iterate_names();
        if !SecretKeys::is_locked() {
            return names;
        }
        names
            .into_iter()
            .filter(|name| !self.is_secret(name))
            .collect()
    }

    fn iterate_values(&self, ctx: &InterceptorContext<'_>) -> Vec<ConfigValue> {
        let values = ctx.iterate_values();
        if !SecretKeys::is_locked() {
            return values;
        }
        values
            .into_iter()
            .filter(|value| !self.is_secret(value.name()))
            .collect()
    }

    fn name(&self) -> &str {
        "SecretKeysInterceptor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::Chain;
    use crate::source::{ConfigSource, MapSource, SourceRegistry};
    use std::sync::Arc;

    fn chain(secrets: &[&str]) -> Chain {
        let source: Arc<dyn ConfigSource> = Arc::new(MapSource::new(
            "test",
            [
                ("db.password", "hunter2"),
                ("%dev.db.password", "dev-pass"),
                ("vault.a.token", "t"),
                ("db.user", "admin"),
            ],
        ));
        let gate: Arc<dyn Interceptor> = Arc::new(SecretKeysInterceptor::new(secrets.iter().copied()));
        Chain::new(SourceRegistry::new(vec![source]), vec![(3900, gate)])
    }

    #[test]
    fn locked_secret_is_denied() {
        let chain = chain(&["db.password"]);
        let err = chain.get_value("db.password").unwrap_err();
        assert_eq!(err.to_string(), "Not allowed to access secret key db.password");
        assert!(chain.get_value("%dev.db.password").is_err());
        assert_eq!(chain.get_value("db.user").unwrap().unwrap().value(), "admin");
    }

    #[test]
    fn unlocked_secret_is_readable() {
        let chain = chain(&["db.password"]);
        let _scope = SecretKeys::unlock();
        assert_eq!(chain.get_value("db.password").unwrap().unwrap().value(), "hunter2");
        assert!(chain.property_names().contains("db.password"));
    }

    #[test]
    fn patterns_and_enumeration() {
        let chain = chain(&["db.password", "vault.*.token"]);
        assert!(chain.get_value("vault.a.token").is_err());

        let names = chain.property_names();
        assert!(!names.contains("db.password"));
        assert!(!names.contains("%dev.db.password"));
        assert!(!names.contains("vault.a.token"));
        assert!(names.contains("db.user"));
    }
}
