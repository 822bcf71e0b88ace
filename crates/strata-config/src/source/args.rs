//! Command-line argument source.

use super::ConfigSource;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Default ordinal of command-line arguments.
pub const ARGS_ORDINAL: i32 = 400;

/// Properties given as command-line arguments.
///
/// - `--key=value` and `-k=value` set a value
/// - `--key value` sets a value when the next argument is not itself an option
/// - a bare `--flag` is `true`
/// - repeating a key joins its values with commas, so `--tag a --tag b` is the list `a,b`
///
/// Arguments that do not start with `-` and are not consumed as a value are ignored.
#[derive(Debug, Clone)]
pub struct ArgsSource {
    name: String,
    ordinal: i32,
    properties: BTreeMap<String, String>,
}

impl ArgsSource {
    /// Parse the given arguments (without the program name).
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();

        let mut idx = 0;
        while idx < args.len() {
            let arg = &args[idx];
            idx += 1;

            let Some(option) = option_body(arg) else {
                debug!("Ignoring positional argument {}", arg);
                continue;
            };

            let (key, value) = match option.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => match args.get(idx) {
                    Some(next) if option_body(next).is_none() => {
                        idx += 1;
                        (option.to_string(), next.clone())
                    }
                    _ => (option.to_string(), "true".to_string()),
                },
            };

            values.entry(key).or_default().push(value);
        }

        let properties = values
            .into_iter()
            .map(|(key, mut values)| {
                let value = if values.len() == 1 {
                    values.remove(0)
                } else {
                    values
                        .iter()
                        .map(|v| v.replace(',', "\\,"))
                        .collect::<Vec<_>>()
                        .join(",")
                };
                (key, value)
            })
            .collect();

        Self {
            name: "ArgumentConfigSource".to_string(),
            ordinal: ARGS_ORDINAL,
            properties,
        }
    }

    /// Parse the arguments of the current process.
    pub fn from_env() -> Self {
        Self::new(std::env::args().skip(1))
    }

    /// Override the ordinal.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = ordinal;
        self
    }
}

/// The text after one or two leading dashes, if `arg` is an option.
fn option_body(arg: &str) -> Option<&str> {
    let body = arg
        .strip_prefix("--")
        .or_else(|| arg.strip_prefix('-'))?;
    let first = body.chars().next()?;
    (first.is_alphabetic() || first == '_').then_some(body)
}

impl ConfigSource for ArgsSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn ordinal(&self) -> i32 {
        self.ordinal
    }

    fn get_value(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned()
    }

    fn property_names(&self) -> BTreeSet<String> {
        self.properties.keys().cloned().collect()
    }
}
