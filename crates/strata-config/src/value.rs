//! Resolved configuration values.

use crate::error::ConfigError;
use std::fmt;

/// A problem recorded on a value instead of failing the lookup.
///
/// Either an expression reference that could not be expanded, or a `${handler::secret}`
/// expression whose handler is missing or rejected the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueProblem {
    key: String,
    name: String,
    reason: Reason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Reason {
    NotExpanded,
    UnknownHandler,
    NotDecoded(String),
}

impl ValueProblem {
    /// Reference `key` inside the value of `name` could not be expanded.
    pub fn not_expanded(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            reason: Reason::NotExpanded,
        }
    }

    /// No secret keys handler is registered as `handler`.
    pub fn unknown_handler(handler: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: handler.into(),
            name: name.into(),
            reason: Reason::UnknownHandler,
        }
    }

    /// `handler` rejected the secret in the value of `name`.
    pub fn not_decoded(
        handler: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            key: handler.into(),
            name: name.into(),
            reason: Reason::NotDecoded(message.into()),
        }
    }

    /// The unresolved reference, or the handler name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The property whose value held the expression.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The matching error.
    pub fn to_error(&self) -> ConfigError {
        match &self.reason {
            Reason::NotExpanded => ConfigError::ExpansionNotFound {
                key: self.key.clone(),
                name: self.name.clone(),
            },
            Reason::UnknownHandler => ConfigError::SecretHandlerNotFound {
                handler: self.key.clone(),
                name: self.name.clone(),
            },
            Reason::NotDecoded(message) => ConfigError::SecretDecode {
                handler: self.key.clone(),
                name: self.name.clone(),
                message: message.clone(),
            },
        }
    }
}

impl fmt::Display for ValueProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_error())
    }
}

/// The result of resolving one configuration name.
///
/// Values are immutable. Interceptors that need to change a value call [`ConfigValue::derive`]
/// and build a new one; unset fields are carried over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue {
    name: String,
    value: String,
    raw_value: String,
    profile: Option<String>,
    source_name: String,
    source_ordinal: i32,
    source_position: usize,
    line_number: Option<u32>,
    problems: Vec<ValueProblem>,
}

impl ConfigValue {
    /// Start building a value.
    pub fn builder(name: impl Into<String>, value: impl Into<String>) -> ConfigValueBuilder {
        let value = value.into();
        ConfigValueBuilder {
            inner: ConfigValue {
                name: name.into(),
                raw_value: value.clone(),
                value,
                profile: None,
                source_name: String::new(),
                source_ordinal: 0,
                source_position: 0,
                line_number: None,
                problems: Vec::new(),
            },
        }
    }

    /// The name this value was requested as.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The effective (expanded) value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The value as found in the source, before expansion.
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }

    /// The profile the value was resolved under, if any.
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Name of the source that provided the value.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Ordinal of the source that provided the value.
    pub fn source_ordinal(&self) -> i32 {
        self.source_ordinal
    }

    /// Position of the source among all registered sources, highest ordinal first.
    pub fn source_position(&self) -> usize {
        self.source_position
    }

    /// Line in the source file, when the source tracks it.
    pub fn line_number(&self) -> Option<u32> {
        self.line_number
    }

    /// Problems recorded while resolving (e.g. unexpandable expressions).
    pub fn problems(&self) -> &[ValueProblem] {
        &self.problems
    }

    /// Whether resolution recorded any problem.
    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    /// Copy this value into a builder.
    pub fn derive(&self) -> ConfigValueBuilder {
        ConfigValueBuilder {
            inner: self.clone(),
        }
    }

    /// Copy with another name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        self.derive().name(name).build()
    }

    /// Copy with another effective value, keeping the raw value.
    pub fn with_value(&self, value: impl Into<String>) -> Self {
        self.derive().value(value).build()
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={} ({}:{})",
            self.name, self.value, self.source_name, self.source_ordinal
        )?;
        if let Some(line) = self.line_number {
            write!(f, " line {}", line)?;
        }
        Ok(())
    }
}

/// Builder for [`ConfigValue`].
#[derive(Debug, Clone)]
pub struct ConfigValueBuilder {
    inner: ConfigValue,
}

impl ConfigValueBuilder {
    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = name.into();
        self
    }

    /// Set the effective value.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.inner.value = value.into();
        self
    }

    /// Set the raw value.
    pub fn raw_value(mut self, raw: impl Into<String>) -> Self {
        self.inner.raw_value = raw.into();
        self
    }

    /// Set the profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.inner.profile = Some(profile.into());
        self
    }

    /// Set the source name and ordinal.
    pub fn source(mut self, name: impl Into<String>, ordinal: i32) -> Self {
        self.inner.source_name = name.into();
        self.inner.source_ordinal = ordinal;
        self
    }

    /// Set the source position.
    pub fn source_position(mut self, position: usize) -> Self {
        self.inner.source_position = position;
        self
    }

    /// Set the line number.
    pub fn line_number(mut self, line: Option<u32>) -> Self {
        self.inner.line_number = line;
        self
    }

    /// Record a problem.
    pub fn problem(mut self, problem: ValueProblem) -> Self {
        self.inner.problems.push(problem);
        self
    }

    /// Record several problems.
    pub fn problems(mut self, problems: impl IntoIterator<Item = ValueProblem>) -> Self {
        self.inner.problems.extend(problems);
        self
    }

    /// Finish.
    pub fn build(self) -> ConfigValue {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_shares_unset_fields() {
        let original = ConfigValue::builder("a", "${b}")
            .source("props", 100)
            .source_position(2)
            .line_number(Some(7))
            .build();
        let expanded = original.with_value("1");

        assert_eq!(expanded.value(), "1");
        assert_eq!(expanded.raw_value(), "${b}");
        assert_eq!(expanded.source_name(), "props");
        assert_eq!(expanded.source_ordinal(), 100);
        assert_eq!(expanded.source_position(), 2);
        assert_eq!(expanded.line_number(), Some(7));
        assert_eq!(original.value(), "${b}");
    }

    #[test]
    fn problems_render_and_convert() {
        let value = ConfigValue::builder("a", "${b}")
            .problem(ValueProblem::not_expanded("b", "a"))
            .build();
        assert!(value.has_problems());
        assert_eq!(
            value.problems()[0].to_string(),
            "Could not expand value b in property a"
        );
        assert_eq!(
            value.problems()[0].to_error().to_string(),
            "Could not expand value b in property a"
        );
    }

    #[test]
    fn renaming_keeps_value() {
        let value = ConfigValue::builder("%dev.a", "x").profile("dev").build();
        let renamed = value.with_name("a");
        assert_eq!(renamed.name(), "a");
        assert_eq!(renamed.value(), "x");
        assert_eq!(renamed.profile(), Some("dev"));
    }
}
