//! Property names and segment helpers
//!
//! A property name is a dotted path such as `server.apps[0].name`. Segments may be quoted
//! (`map."a.b".value`) so they can contain dots, and may carry a trailing numeric index.
//!
//! [`PropertyName`] adds wildcard semantics on top of the plain string: a `*` segment
//! matches any concrete segment, and a `[*]` index matches any numeric index:
//!
//! - `foo.bar` matches `foo.*`
//! - `foo.bar.baz` matches `foo.*.baz`
//! - `foo."bar.baz"` matches `foo.*`
//! - `foo.bar[0]` matches `foo.bar[*]`
//!
//! The hash only mixes the structural characters of a name, so a pattern and every concrete
//! name of the same shape land in the same bucket and a `HashSet<PropertyName>` of patterns
//! can be probed with concrete names.

use std::fmt;
use std::hash::{Hash, Hasher};

/// A configuration name with wildcard-aware equality.
///
/// Equality is checked in both directions, but each direction is asymmetric (a `*` on one
/// side matches a segment on the other side, never the reverse), so equality is not
/// transitive between differently-shaped patterns.
#[derive(Clone)]
pub struct PropertyName {
    name: String,
    hash: u32,
}

impl PropertyName {
    /// Create a property name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let hash = structural_hash(&name);
        Self { name, hash }
    }

    /// The underlying name.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Consume into the underlying string.
    pub fn into_string(self) -> String {
        self.name
    }

    /// Whether the name contains a wildcard segment or index.
    pub fn is_pattern(&self) -> bool {
        self.name.contains('*')
    }
}

impl PartialEq for PropertyName {
    fn eq(&self, other: &Self) -> bool {
        equals(&self.name, &other.name)
    }
}

impl Eq for PropertyName {}

impl Hash for PropertyName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash);
    }
}

impl fmt::Debug for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyName({:?})", self.name)
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for PropertyName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PropertyName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Compare two names with [`PropertyName`] semantics.
pub fn equals(name: &str, other: &str) -> bool {
    equals_directed(name.as_bytes(), other.as_bytes())
        || equals_directed(other.as_bytes(), name.as_bytes())
}

/// One direction of the comparison: wildcards in `name` match segments of `other`.
///
/// Walks both names backwards. A `*` in `name` swallows the whole trailing segment of
/// `other` (a quoted segment as a unit), and `[*]` swallows a numeric index.
fn equals_directed(name: &[u8], other: &[u8]) -> bool {
    if name == other {
        return true;
    }

    if name == b"*" && (other.is_empty() || other == b"\"\"") {
        return false;
    }

    let mut mp = name.len() as isize - 1;
    let mut i = other.len() as isize - 1;

    while i >= 0 {
        if mp < 0 {
            return false;
        }

        let o = other[i as usize];
        let n = name[mp as usize];

        if n == b'*' {
            if o == b']' {
                return false;
            } else if o == b'"' {
                if let Some(begin) = rfind(other, b'"', i - 1) {
                    i = begin;
                }
            } else {
                i = match rfind(other, b'.', i) {
                    Some(dot) => dot + 1,
                    None => 0,
                };
            }
        } else if n == b']' && o == b']' && is_wildcard_index(name, mp) {
            if is_wildcard_index(other, i) {
                mp -= 3;
                i -= 3;
                continue;
            }
            match rfind(other, b'[', i) {
                Some(begin) if is_digits(&other[(begin + 1) as usize..i as usize]) => {
                    mp -= 3;
                    i = begin - 1;
                    continue;
                }
                _ => return false,
            }
        } else if o != n {
            return false;
        }

        mp -= 1;
        i -= 1;
    }

    mp < 0
}

/// Whether `bytes[end]` closes a `[*]`.
fn is_wildcard_index(bytes: &[u8], end: isize) -> bool {
    end >= 2 && bytes[(end - 1) as usize] == b'*' && bytes[(end - 2) as usize] == b'['
}

fn rfind(bytes: &[u8], needle: u8, from: isize) -> Option<isize> {
    if from < 0 {
        return None;
    }
    let upto = (from as usize).min(bytes.len().saturating_sub(1));
    bytes[..=upto]
        .iter()
        .rposition(|&b| b == needle)
        .map(|p| p as isize)
}

fn is_digits(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(u8::is_ascii_digit)
}

fn structural_hash(name: &str) -> u32 {
    let mut h: u32 = 0;
    let mut quoted = false;
    for c in name.bytes() {
        if quoted {
            if c == b'"' {
                quoted = false;
            }
            continue;
        } else if c == b'"' {
            quoted = true;
            continue;
        } else if c != b'.' && c != b'[' && c != b']' {
            continue;
        }
        h = h.wrapping_mul(31).wrapping_add(u32::from(c));
    }
    h
}

/// Strip a leading `%profile.` qualifier.
pub fn unprofiled(name: &str) -> &str {
    if name.starts_with('%') {
        if let Some(dot) = name.find('.') {
            return &name[dot + 1..];
        }
    }
    name
}

/// The profile qualifier of a `%profile.name` property, if any.
pub fn profile_of(name: &str) -> Option<&str> {
    let rest = name.strip_prefix('%')?;
    rest.find('.').map(|dot| &rest[..dot])
}

/// Remove surrounding quotes from a segment.
pub fn unquoted(segment: &str) -> &str {
    if segment.len() >= 2 && segment.starts_with('"') && segment.ends_with('"') {
        &segment[1..segment.len() - 1]
    } else {
        segment
    }
}

/// Quote a map key when it cannot be used as a bare segment.
pub fn quoted_if_needed(key: &str) -> String {
    if key.is_empty() || key.contains(['.', '[', ']', '"']) {
        format!("\"{}\"", key)
    } else {
        key.to_string()
    }
}

/// Whether the name ends with a numeric index such as `[3]`.
pub fn is_indexed(name: &str) -> bool {
    index(name).is_some()
}

/// The trailing numeric index of a name.
pub fn index(name: &str) -> Option<usize> {
    let inner = name.strip_suffix(']')?;
    let open = inner.rfind('[')?;
    let digits = &inner[open + 1..];
    if is_digits(digits.as_bytes()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// The name without its trailing numeric index.
pub fn unindexed(name: &str) -> &str {
    if let Some(inner) = name.strip_suffix(']') {
        if let Some(open) = inner.rfind('[') {
            if is_digits(&inner.as_bytes()[open + 1..]) {
                return &name[..open];
            }
        }
    }
    name
}

/// Split a name into dot-separated segments, honouring quotes.
///
/// Index suffixes stay attached to their segment: `a.b[0].c` yields `a`, `b[0]`, `c`.
pub fn segments(name: &str) -> Vec<&str> {
    if name.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (pos, c) in name.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '.' if !quoted => {
                out.push(&name[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    out.push(&name[start..]);
    out
}

/// Join a prefix and a child segment.
pub fn join(prefix: &str, child: &str) -> String {
    if prefix.is_empty() {
        child.to_string()
    } else if child.is_empty() {
        prefix.to_string()
    } else {
        format!("{}.{}", prefix, child)
    }
}

/// The part of `name` below `prefix`, if `name` lives under it.
///
/// Returns `Some("")` when the names are equal. An index directly after the prefix is kept
/// (`list[0].a` under `list` gives `[0].a`).
pub fn strip_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(name);
    }
    let rest = name.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else if let Some(child) = rest.strip_prefix('.') {
        Some(child)
    } else if rest.starts_with('[') {
        Some(rest)
    } else {
        None
    }
}

/// Whether `name` equals `prefix` or lives below it.
pub fn is_prefix_of(prefix: &str, name: &str) -> bool {
    strip_prefix(name, prefix).is_some()
}

/// Split off the first segment of a relative name, honouring quotes.
///
/// The returned segment keeps any index suffix; the remainder excludes the separating dot.
pub fn first_segment(rest: &str) -> (&str, &str) {
    let mut quoted = false;
    for (pos, c) in rest.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '.' if !quoted => return (&rest[..pos], &rest[pos + 1..]),
            _ => {}
        }
    }
    (rest, "")
}
