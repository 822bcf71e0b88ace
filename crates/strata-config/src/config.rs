//! The resolved configuration and its builder
//!
//! ```
//! use strata_config::{ConfigBuilder, MapSource};
//!
//! let config = ConfigBuilder::new()
//!     .with_source(MapSource::new("app", [("server.port", "8080"), ("%dev.server.port", "9090")]))
//!     .with_profile("dev")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.get_value::<u16>("server.port").unwrap(), 9090);
//! ```

use crate::convert::{Converter, Converters, DEFAULT_PRIORITY};
use crate::error::{ConfigError, ConfigResult, ValidationError};
use crate::handler::{SecretHandlers, SecretKeysHandler};
use crate::interceptor::{
    priorities, Chain, ExpressionInterceptor, FallbackInterceptor, Interceptor, LoggingInterceptor,
    NameMapping, ProfileInterceptor, RelocateInterceptor, SecretKeysInterceptor,
};
use crate::mapping::{
    group_secret_patterns, leaf_defaults, unknown_properties, ConfigMapping, MappedInstance,
    Mapper, MappingSchema, Root,
};
use crate::name::PropertyName;
use crate::secret::SecretKeys;
use crate::source::{ConfigSource, EnvSource, MapSource, SourceRegistry};
use crate::value::ConfigValue;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Property naming the active profiles when the builder sets none.
pub const PROFILE_KEY: &str = "strata.profile";

/// Property toggling unknown property validation when the builder leaves it unset.
pub const VALIDATE_UNKNOWN_KEY: &str = "strata.mapping.validate-unknown";

/// A built configuration.
///
/// Every lookup walks the interceptor chain down to the sources; nothing is cached. Mapped
/// roots are bound once by [`ConfigBuilder::build`] and do not change afterwards.
#[derive(Debug)]
pub struct Config {
    chain: Chain,
    converters: Converters,
    handlers: SecretHandlers,
    profiles: Vec<String>,
    mappings: Vec<MappedInstance>,
}

impl Config {
    /// Start building a configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Resolve `name` through the chain.
    ///
    /// Fails with [`ConfigError::Security`] for a locked secret. Expansion failures are
    /// recorded on the returned value, see [`ConfigValue::problems`].
    pub fn get_config_value(&self, name: &str) -> ConfigResult<Option<ConfigValue>> {
        self.chain.get_value(name)
    }

    /// The value as written in its source, before expansion.
    pub fn get_raw_value(&self, name: &str) -> ConfigResult<Option<String>> {
        Ok(self
            .get_config_value(name)?
            .map(|value| value.raw_value().to_string()))
    }

    /// A resolved value without problems.
    fn resolve(&self, name: &str) -> ConfigResult<Option<ConfigValue>> {
        match self.get_config_value(name)? {
            Some(value) => match value.problems().first() {
                Some(problem) => Err(problem.to_error()),
                None => Ok(Some(value)),
            },
            None => Ok(None),
        }
    }

    /// Resolve and convert a required value.
    pub fn get_value<T: 'static>(&self, name: &str) -> ConfigResult<T> {
        let value = self.resolve(name)?.ok_or_else(|| ConfigError::NotFound {
            name: name.to_string(),
        })?;
        self.converters.convert(name, value.value())
    }

    /// Resolve and convert a value; absent and empty values are `None`.
    pub fn get_optional_value<T: 'static>(&self, name: &str) -> ConfigResult<Option<T>> {
        match self.resolve(name)? {
            Some(value) => self.converters.convert_optional(name, value.value()),
            None => Ok(None),
        }
    }

    /// Resolve a required list. Indexed properties `name[0]`, `name[1]`, ... win over a
    /// comma separated `name`.
    pub fn get_values<T: 'static>(&self, name: &str) -> ConfigResult<Vec<T>> {
        let (present, values) = self.values_of(name)?;
        match values {
            Some(values) => Ok(values),
            None if present => Err(ConfigError::EmptyValue {
                name: name.to_string(),
            }),
            None => Err(ConfigError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Resolve a list; absent and empty lists are `None`.
    pub fn get_optional_values<T: 'static>(&self, name: &str) -> ConfigResult<Option<Vec<T>>> {
        Ok(self.values_of(name)?.1)
    }

    fn values_of<T: 'static>(&self, name: &str) -> ConfigResult<(bool, Option<Vec<T>>)> {
        let mut indexed = Vec::new();
        for i in 0.. {
            let element = format!("{}[{}]", name, i);
            match self.resolve(&element)? {
                Some(value) => {
                    if let Some(converted) = self.converters.convert_optional(&element, value.value())? {
                        indexed.push(converted);
                    }
                }
                None if i == 0 => break,
                None => return Ok((true, (!indexed.is_empty()).then_some(indexed))),
            }
        }

        match self.resolve(name)? {
            Some(value) => Ok((true, self.converters.convert_list(name, value.value())?)),
            None => Ok((false, None)),
        }
    }

    /// Every enumerable name, after relocation and profile handling. Secret names are
    /// hidden while secrets are locked.
    pub fn property_names(&self) -> BTreeSet<String> {
        self.chain.property_names()
    }

    /// Every enumerable value, with the same rules as [`Config::property_names`].
    pub fn values(&self) -> Vec<ConfigValue> {
        self.chain.values()
    }

    /// The mapped root registered under `schema` and `prefix`.
    pub fn get_config_mapping(&self, schema: &str, prefix: &str) -> ConfigResult<&MappedInstance> {
        self.mappings
            .iter()
            .find(|m| m.schema_name() == schema && m.prefix() == prefix)
            .ok_or_else(|| ConfigError::MappingNotFound {
                schema: schema.to_string(),
                prefix: prefix.to_string(),
            })
    }

    /// Bind the mapping of `T` at its default prefix.
    pub fn get_mapping<T: ConfigMapping>(&self) -> ConfigResult<T> {
        self.get_mapping_with_prefix(T::prefix())
    }

    /// Bind the mapping of `T` registered at `prefix`.
    pub fn get_mapping_with_prefix<T: ConfigMapping>(&self, prefix: &str) -> ConfigResult<T> {
        self.get_config_mapping(T::schema().name(), prefix)?.to_typed()
    }

    /// Every mapped root.
    pub fn mappings(&self) -> &[MappedInstance] {
        &self.mappings
    }

    /// Active profiles in declared order.
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    /// The sources, highest ordinal first.
    pub fn sources(&self) -> &SourceRegistry {
        self.chain.sources()
    }

    /// The converter registry.
    pub fn converters(&self) -> &Converters {
        &self.converters
    }

    pub(crate) fn secret_handlers(&self) -> &SecretHandlers {
        &self.handlers
    }
}

/// Assembles a [`Config`].
pub struct ConfigBuilder {
    sources: Vec<Arc<dyn ConfigSource>>,
    defaults: BTreeMap<String, String>,
    interceptors: Vec<(i32, Arc<dyn Interceptor>)>,
    profiles: Option<Vec<String>>,
    secret_keys: Vec<String>,
    relocations: Vec<NameMapping>,
    fallbacks: Vec<NameMapping>,
    converters: Converters,
    handlers: SecretHandlers,
    expressions: bool,
    lookup_logging: bool,
    mappings: Vec<(Arc<MappingSchema>, String)>,
    validate_unknown: Option<bool>,
    ignore: Vec<String>,
    default_sources: bool,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// An empty builder with the built-in converters and expansion enabled.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            defaults: BTreeMap::new(),
            interceptors: Vec::new(),
            profiles: None,
            secret_keys: Vec::new(),
            relocations: Vec::new(),
            fallbacks: Vec::new(),
            converters: Converters::new(),
            handlers: SecretHandlers::new(),
            expressions: true,
            lookup_logging: false,
            mappings: Vec::new(),
            validate_unknown: None,
            ignore: Vec::new(),
            default_sources: false,
        }
    }

    /// Register a source.
    pub fn with_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Register shared sources.
    pub fn with_sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ConfigSource>>,
    {
        self.sources.extend(sources);
        self
    }

    /// Also read the process environment.
    pub fn add_default_sources(mut self) -> Self {
        self.default_sources = true;
        self
    }

    /// A value used when no source has `name`.
    pub fn with_default_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Several default values.
    pub fn with_default_values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.defaults
            .extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Register an interceptor; see [`priorities`] for the stock levels.
    pub fn with_interceptor<I: Interceptor + 'static>(mut self, priority: i32, interceptor: I) -> Self {
        self.interceptors.push((priority, Arc::new(interceptor)));
        self
    }

    /// Activate a comma separated list of profiles. Later profiles win.
    pub fn with_profile(self, profiles: &str) -> Self {
        self.with_profiles(ProfileInterceptor::parse_profiles(profiles))
    }

    /// Activate profiles in declared order.
    pub fn with_profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = self.profiles.get_or_insert_with(Vec::new);
        list.extend(
            profiles
                .into_iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty()),
        );
        self
    }

    /// Names or patterns only readable inside [`SecretKeys::unlock`].
    pub fn with_secret_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secret_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Relocate names with a custom mapping.
    pub fn with_relocation(mut self, mapping: NameMapping) -> Self {
        self.relocations.push(mapping);
        self
    }

    /// Relocate `old` names to `new` names.
    pub fn with_relocations<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with_relocation(NameMapping::exact(pairs))
    }

    /// Relocate names with a function.
    pub fn with_relocate_fn<F>(self, relocate: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.with_relocation(NameMapping::from_fn(relocate))
    }

    /// Fall back with a custom mapping.
    pub fn with_fallback(mut self, mapping: NameMapping) -> Self {
        self.fallbacks.push(mapping);
        self
    }

    /// Fall back from names to alternate names.
    pub fn with_fallbacks<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with_fallback(NameMapping::exact(pairs))
    }

    /// Fall back with a function.
    pub fn with_fallback_fn<F>(self, fallback: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.with_fallback(NameMapping::from_fn(fallback))
    }

    /// Register a secret keys handler for `${name::secret}` expressions.
    pub fn with_secret_handler<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: SecretKeysHandler + 'static,
    {
        self.handlers.register(name, handler);
        self
    }

    /// Register a converter for `T` at the default user priority.
    pub fn with_converter<T, C>(self, converter: C) -> Self
    where
        T: 'static,
        C: Converter<T> + 'static,
    {
        self.with_converter_priority(DEFAULT_PRIORITY, converter)
    }

    /// Register a converter for `T` at `priority`.
    pub fn with_converter_priority<T, C>(mut self, priority: i32, converter: C) -> Self
    where
        T: 'static,
        C: Converter<T> + 'static,
    {
        self.converters.register(priority, converter);
        self
    }

    /// Enable or disable `${...}` expansion.
    pub fn with_expressions(mut self, enabled: bool) -> Self {
        self.expressions = enabled;
        self
    }

    /// Log every lookup at debug level.
    pub fn with_lookup_logging(mut self, enabled: bool) -> Self {
        self.lookup_logging = enabled;
        self
    }

    /// Map `T` at its default prefix.
    pub fn with_mapping<T: ConfigMapping>(self) -> Self {
        self.with_mapping_at::<T>(T::prefix())
    }

    /// Map `T` at `prefix`.
    pub fn with_mapping_at<T: ConfigMapping>(self, prefix: impl Into<String>) -> Self {
        self.with_mapping_schema(T::schema(), prefix)
    }

    /// Map a schema at `prefix`.
    pub fn with_mapping_schema(mut self, schema: MappingSchema, prefix: impl Into<String>) -> Self {
        self.mappings.push((Arc::new(schema), prefix.into()));
        self
    }

    /// Report properties under a mapped prefix that no schema node consumes.
    pub fn validate_unknown(mut self, enabled: bool) -> Self {
        self.validate_unknown = Some(enabled);
        self
    }

    /// Exclude names matching `glob` from unknown property validation.
    pub fn with_mapping_ignore(mut self, glob: impl Into<String>) -> Self {
        self.ignore.push(glob.into());
        self
    }

    /// Assemble sources and interceptors, then bind every mapping.
    ///
    /// All mapping problems are returned together as one [`ConfigError::Validation`].
    pub fn build(self) -> ConfigResult<Config> {
        let ignore = compile_ignores(&self.ignore)?;

        let mut defaults: BTreeMap<String, String> = BTreeMap::new();
        for (schema, prefix) in &self.mappings {
            let mut found = Vec::new();
            leaf_defaults(schema, schema.root(), prefix, &mut found);
            defaults.extend(found);
        }
        defaults.extend(self.defaults);

        let mut sources = self.sources;
        if self.default_sources {
            sources.push(Arc::new(EnvSource::from_env()));
        }
        if !defaults.is_empty() {
            sources.push(Arc::new(MapSource::defaults(defaults)));
        }
        let registry = SourceRegistry::new(sources);

        let profiles = match self.profiles {
            Some(profiles) => profiles,
            None => registry
                .get_value(PROFILE_KEY)
                .map(|value| ProfileInterceptor::parse_profiles(value.value()))
                .unwrap_or_default(),
        };
        if !profiles.is_empty() {
            info!("Active profiles: {}", profiles.join(","));
        }

        let mut secrets: HashSet<PropertyName> = self
            .secret_keys
            .into_iter()
            .map(PropertyName::from)
            .collect();
        for (schema, prefix) in &self.mappings {
            group_secret_patterns(schema, schema.root(), prefix, &mut secrets);
        }

        let mut interceptors: Vec<(i32, Arc<dyn Interceptor>)> = Vec::new();
        if !secrets.is_empty() {
            interceptors.push((
                priorities::LIBRARY + 900,
                Arc::new(SecretKeysInterceptor::new(secrets.iter().cloned())),
            ));
        }
        for mapping in self.relocations {
            interceptors.push((priorities::LIBRARY + 700, Arc::new(RelocateInterceptor::new(mapping))));
        }
        for mapping in self.fallbacks {
            interceptors.push((priorities::LIBRARY + 600, Arc::new(FallbackInterceptor::new(mapping))));
        }
        if !profiles.is_empty() {
            interceptors.push((
                priorities::LIBRARY + 500,
                Arc::new(ProfileInterceptor::new(&profiles)),
            ));
        }
        interceptors.push((
            priorities::LIBRARY + 300,
            Arc::new(ExpressionInterceptor::new(self.expressions).with_handlers(self.handlers.clone())),
        ));
        interceptors.extend(self.interceptors);
        if self.lookup_logging {
            interceptors.push((500, Arc::new(LoggingInterceptor::new(secrets))));
        }

        let mut config = Config {
            chain: Chain::new(registry, interceptors),
            converters: self.converters,
            handlers: self.handlers,
            profiles,
            mappings: Vec::new(),
        };

        if self.mappings.is_empty() {
            return Ok(config);
        }

        let validate = match self.validate_unknown {
            Some(validate) => validate,
            None => config
                .get_optional_value::<bool>(VALIDATE_UNKNOWN_KEY)?
                .unwrap_or(true),
        };

        let (instances, problems) = {
            let _unlocked = SecretKeys::unlock();
            let mut mapper = Mapper::new(&config);
            let instances: Vec<MappedInstance> = self
                .mappings
                .iter()
                .map(|(schema, prefix)| {
                    let value = mapper.map_root(schema, prefix);
                    MappedInstance::new(schema.clone(), prefix.clone(), value)
                })
                .collect();

            let unknown = if validate {
                let roots: Vec<Root<'_>> = self
                    .mappings
                    .iter()
                    .map(|(schema, prefix)| Root {
                        schema: schema.as_ref(),
                        prefix: prefix.as_str(),
                    })
                    .collect();
                unknown_properties(&roots, mapper.names(), ignore.as_ref())
            } else {
                Vec::new()
            };

            let mut problems = mapper.into_problems();
            problems.extend(unknown);
            (instances, problems)
        };

        if !problems.is_empty() {
            debug!("Mapping failed with {} problem(s)", problems.len());
            return Err(ValidationError::new(problems).into());
        }

        debug!("Mapped {} root(s)", instances.len());
        config.mappings = instances;
        Ok(config)
    }
}

fn compile_ignores(patterns: &[String]) -> ConfigResult<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|source| ConfigError::InvalidPattern {
            pattern: patterns.join(","),
            source,
        })
}
