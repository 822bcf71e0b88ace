//! `.properties` file source
//!
//! Supports the usual properties syntax:
//!
//! - `#` and `!` comment lines
//! - `key=value`, `key: value` and `key value` separators
//! - a trailing backslash continues the value on the next line
//! - `\t`, `\n`, `\r`, `\f` and `\uXXXX` escapes; any other escaped character stands for itself
//!
//! Every key remembers the line it started on, reported through
//! [`ConfigValue::line_number`](crate::ConfigValue::line_number).

use super::{ordinal_from, ConfigSource, DEFAULT_ORDINAL};
use crate::error::{ConfigError, ConfigResult};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Properties read from a `.properties` file or string.
#[derive(Debug, Clone)]
pub struct PropertiesSource {
    name: String,
    ordinal: i32,
    properties: BTreeMap<String, String>,
    lines: BTreeMap<String, u32>,
}

impl PropertiesSource {
    /// Parse properties content. `config_ordinal` in the content overrides `default_ordinal`.
    pub fn parse(name: impl Into<String>, content: &str, default_ordinal: i32) -> Self {
        let name = name.into();
        let mut properties = BTreeMap::new();
        let mut lines = BTreeMap::new();

        for (line_number, logical) in logical_lines(content) {
            let (key, value) = split_entry(&logical);
            if key.is_empty() {
                warn!("Ignoring entry without key at line {} in {}", line_number, name);
                continue;
            }
            lines.insert(key.clone(), line_number);
            properties.insert(key, value);
        }

        let ordinal = ordinal_from(&properties, default_ordinal, &name);
        Self {
            name,
            ordinal,
            properties,
            lines,
        }
    }

    /// Read a properties file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::load_with_ordinal(path, DEFAULT_ORDINAL)
    }

    /// Read a properties file with an explicit default ordinal.
    pub fn load_with_ordinal(path: impl AsRef<Path>, ordinal: i32) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Source {
            name: path.display().to_string(),
            message: e.to_string(),
        })?;
        let source = Self::parse(
            format!("PropertiesConfigSource[source={}]", path.display()),
            &content,
            ordinal,
        );
        debug!(
            "Loaded {} properties from {} (ordinal {})",
            source.properties.len(),
            path.display(),
            source.ordinal
        );
        Ok(source)
    }

    /// Read a properties file plus its profile-specific siblings.
    ///
    /// For `conf/app.properties` and profiles `["common", "dev"]` this also loads
    /// `conf/app-common.properties` and `conf/app-dev.properties` when they exist. Each
    /// profile file sits one ordinal above the previous one, so later profiles win while
    /// keys missing from a profile file still come from the base file.
    pub fn load_with_profiles<S: AsRef<str>>(
        path: impl AsRef<Path>,
        profiles: &[S],
    ) -> ConfigResult<Vec<Self>> {
        let path = path.as_ref();
        let base = Self::load(path)?;
        let mut ordinal = base.ordinal;
        let mut sources = vec![base];

        for profile in profiles {
            let profile_path = profile_file(path, profile.as_ref());
            if !profile_path.exists() {
                debug!("No profile file {}", profile_path.display());
                continue;
            }
            ordinal += 1;
            sources.push(Self::load_with_ordinal(&profile_path, ordinal)?);
        }
        Ok(sources)
    }

    /// Override the ordinal.
    pub fn with_ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = ordinal;
        self
    }

    /// The parsed properties.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

fn profile_file(path: &Path, profile: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, profile, ext.to_string_lossy()),
        None => format!("{}-{}", stem, profile),
    };
    path.with_file_name(file_name)
}

/// Join continuation lines, dropping comments and blanks. Yields the starting line number.
fn logical_lines(content: &str) -> Vec<(u32, String)> {
    let mut out = Vec::new();
    let mut current: Option<(u32, String)> = None;

    for (idx, raw) in content.lines().enumerate() {
        let trimmed = raw.trim_start();
        let line = match current.take() {
            Some((start, mut buf)) => {
                buf.push_str(trimmed);
                (start, buf)
            }
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                ((idx + 1) as u32, trimmed.to_string())
            }
        };

        if continues(&line.1) {
            let (start, mut buf) = line;
            buf.pop();
            current = Some((start, buf));
        } else {
            out.push(line);
        }
    }

    if let Some(line) = current {
        out.push(line);
    }
    out
}

/// A line continues when it ends with an odd number of backslashes.
fn continues(line: &str) -> bool {
    line.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (String, String) {
    let mut key_end = line.len();
    let mut escaped = false;
    for (pos, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = pos;
                break;
            }
            _ => {}
        }
    }

    let key = unescape(&line[..key_end]);
    let mut rest = line[key_end..].trim_start_matches([' ', '\t', '\x0c']);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches([' ', '\t', '\x0c']);
    }
    (key, unescape(rest))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

impl ConfigSource for PropertiesSource {
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

    fn line_number(&self, name: &str) -> Option<u32> {
        self.lines.get(name).copied()
    }
}
