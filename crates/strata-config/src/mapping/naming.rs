//! Field identifier to property name translation.

/// How field identifiers become property names.
///
/// | Strategy | `http_port` | `maxRetries` |
/// |---|---|---|
/// | `Verbatim` | `http_port` | `maxRetries` |
/// | `KebabCase` | `http-port` | `max-retries` |
/// | `SnakeCase` | `http_port` | `max_retries` |
/// | `CamelCase` | `httpPort` | `maxRetries` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingStrategy {
    /// Use the identifier unchanged
    Verbatim,
    /// Lower case words joined by `-`
    #[default]
    KebabCase,
    /// Lower case words joined by `_`
    SnakeCase,
    /// First word lower case, following words capitalized
    CamelCase,
}

impl NamingStrategy {
    /// Translate a field identifier.
    pub fn apply(&self, identifier: &str) -> String {
        match self {
            NamingStrategy::Verbatim => identifier.to_string(),
            NamingStrategy::KebabCase => words(identifier).join("-"),
            NamingStrategy::SnakeCase => words(identifier).join("_"),
            NamingStrategy::CamelCase => {
                let mut out = String::with_capacity(identifier.len());
                for (i, word) in words(identifier).iter().enumerate() {
                    if i == 0 {
                        out.push_str(word);
                    } else {
                        let mut chars = word.chars();
                        if let Some(first) = chars.next() {
                            out.extend(first.to_uppercase());
                            out.push_str(chars.as_str());
                        }
                    }
                }
                out
            }
        }
    }
}

/// Split an identifier into lower case words.
///
/// `_` and `-` separate words, as does a lower case letter or digit followed by an upper
/// case letter. A run of capitals is one word, except that its last capital starts the
/// next word when a lower case letter follows (`HTTPServer` is `http`, `server`).
fn words(identifier: &str) -> Vec<String> {
    let chars: Vec<char> = identifier.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if !prev.is_uppercase() || next_is_lower {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_case_is_default() {
        assert_eq!(NamingStrategy::default(), NamingStrategy::KebabCase);
        assert_eq!(NamingStrategy::KebabCase.apply("http_port"), "http-port");
        assert_eq!(NamingStrategy::KebabCase.apply("maxRetries"), "max-retries");
        assert_eq!(NamingStrategy::KebabCase.apply("HTTPServer"), "http-server");
        assert_eq!(NamingStrategy::KebabCase.apply("host"), "host");
        assert_eq!(NamingStrategy::KebabCase.apply("ipv4Address"), "ipv4-address");
    }

    #[test]
    fn other_strategies() {
        assert_eq!(NamingStrategy::Verbatim.apply("http_port"), "http_port");
        assert_eq!(NamingStrategy::SnakeCase.apply("maxRetries"), "max_retries");
        assert_eq!(NamingStrategy::CamelCase.apply("http_port"), "httpPort");
        assert_eq!(NamingStrategy::CamelCase.apply("max_retry_count"), "maxRetryCount");
    }
}
