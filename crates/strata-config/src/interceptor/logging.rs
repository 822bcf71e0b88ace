use super::{Interceptor, InterceptorContext};
use crate::error::ConfigResult;
use crate::name::{unprofiled, PropertyName};
use crate::value::ConfigValue;
use std::collections::HashSet;
use tracing::debug;

const MASK: &str = "******";

/// Logs every lookup at debug level. Values of secret keys are masked.
#[derive(Debug, Clone, Default)]
pub struct LoggingInterceptor {
    secrets: HashSet<PropertyName>,
}

impl LoggingInterceptor {
    /// Log lookups, masking values of the given secret names or patterns.
    pub fn new(secrets: HashSet<PropertyName>) -> Self {
        Self { secrets }
    }

    fn is_secret(&self, name: &str) -> bool {
        self.secrets.contains(&PropertyName::new(unprofiled(name)))
    }
}

impl Interceptor for LoggingInterceptor {
    fn get_value(&self, ctx: &InterceptorContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        let value = ctx.proceed(name)?;
        match &value {
            Some(found) => {
                let shown = if self.is_secret(name) {
                    MASK
                } else {
                    found.value()
                };
                debug!(
                    name = found.name(),
                    source = found.source_name(),
                    ordinal = found.source_ordinal(),
                    "Lookup of {} resolved to {}",
                    name,
                    shown
                );
            }
            None => debug!("Lookup of {} found no value", name),
        }
        Ok(value)
    }

    fn name(&self) -> &str {
        "LoggingInterceptor"
    }
}
