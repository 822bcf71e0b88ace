use super::{Interceptor, InterceptorContext};
use crate::error::ConfigResult;
use crate::name::{profile_of, unprofiled};
use crate::value::ConfigValue;
use std::collections::BTreeSet;

/// Overlays `%profile.name` properties on `name`.
///
/// Profiles are kept in declared order and the last one wins: with `common,dev` active,
/// `%dev.k` beats `%common.k`, which beats `k`. A profile value still loses to a plain
/// value from a source with a strictly higher ordinal, so `K=...` in the environment
/// overrides `%dev.k` in a properties file.
#[derive(Debug, Clone, Default)]
pub struct ProfileInterceptor {
    profiles: Vec<String>,
}

impl ProfileInterceptor {
    /// Overlay the given profiles, in declared order.
    pub fn new<I, S>(profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Split a comma separated profile list.
    pub fn parse_profiles(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Active profiles in declared order.
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    fn is_active(&self, profile: &str) -> bool {
        self.profiles.iter().any(|p| p == profile)
    }

    /// Strip an active profile qualifier.
    fn normalize<'n>(&self, name: &'n str) -> &'n str {
        match profile_of(name) {
            Some(profile) if self.is_active(profile) => unprofiled(name),
            _ => name,
        }
    }

    /// How an enumerated name shows up: plain, stripped of an active qualifier, or hidden.
    fn visible<'n>(&self, name: &'n str) -> Option<&'n str> {
        match profile_of(name) {
            Some(profile) if self.is_active(profile) => Some(unprofiled(name)),
            Some(_) => None,
            None => Some(name),
        }
    }
}

impl Interceptor for ProfileInterceptor {
    fn get_value(&self, ctx: &InterceptorContext<'_>, name: &str) -> ConfigResult<Option<ConfigValue>> {
        if self.profiles.is_empty() {
            return ctx.proceed(name);
        }

        let plain = self.normalize(name);
        for profile in self.profiles.iter().rev() {
            let qualified = format!("%{}.{}", profile, plain);
            if let Some(profiled) = ctx.proceed(&qualified)? {
                if let Some(original) = ctx.proceed(plain)? {
                    if original.source_ordinal() > profiled.source_ordinal() {
                        return Ok(Some(original));
                    }
                }
                return Ok(Some(profiled.derive().name(plain).profile(profile.as_str()).build()));
            }
        }
        ctx.proceed(plain)
    }

    fn iterate_names(&self, ctx: &InterceptorContext<'_>) -> BTreeSet<String> {
        ctx.iterate_names()
            .iter()
            .filter_map(|name| self.visible(name))
            .map(str::to_string)
            .collect()
    }

    fn iterate_values(&self, ctx: &InterceptorContext<'_>) -> Vec<ConfigValue> {
        ctx.iterate_values()
            .into_iter()
            .filter_map(|value| {
                let visible = self.visible(value.name())?.to_string();
                Some(if visible == value.name() {
                    value
                } else {
                    value.with_name(visible)
                })
            })
            .collect()
    }

    fn name(&self) -> &str {
        "ProfileInterceptor"
    }
}
