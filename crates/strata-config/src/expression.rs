//! `${...}` expression parsing and evaluation
//!
//! Syntax accepted in raw values:
//!
//! | Text | Meaning |
//! |---|---|
//! | `${key}` | value of `key` |
//! | `${key:default}` | value of `key`, or `default` when `key` is absent |
//! | `${${inner}}` | the referenced name is itself expanded first |
//! | `${handler::secret}` | `secret` decoded by the named [`SecretKeysHandler`](crate::SecretKeysHandler) |
//! | `$$` or `\$` | a literal `$` |
//!
//! Only the first `:` at the top level of an expression separates key and default, so
//! `${url:http://localhost}` defaults to `http://localhost`. When that first `:` is doubled
//! the expression is a handler call instead. A `$` that does not start an
//! expression, and a `${` that is never closed, are kept as text.
//!
//! Expansion can be switched off for the current thread with [`Expressions::disable`], which
//! is how callers read the raw text of an expression.

use crate::error::ConfigResult;
use crate::handler::SecretHandlers;
use crate::value::{ConfigValue, ValueProblem};
use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static DISABLED: Cell<usize> = const { Cell::new(0) };
}

/// Thread-local expression expansion switch.
pub struct Expressions;

impl Expressions {
    /// Whether expansion is enabled on this thread.
    pub fn is_enabled() -> bool {
        DISABLED.with(|d| d.get() == 0)
    }

    /// Disable expansion until the returned guard is dropped. Nestable.
    #[must_use = "expansion is enabled again as soon as the scope is dropped"]
    pub fn disable() -> ExpressionScope {
        DISABLED.with(|d| d.set(d.get() + 1));
        ExpressionScope {
            _thread_bound: PhantomData,
        }
    }

    /// Run `f` with expansion disabled.
    pub fn without<T>(f: impl FnOnce() -> T) -> T {
        let _scope = Self::disable();
        f()
    }
}

/// Guard returned by [`Expressions::disable`].
#[derive(Debug)]
pub struct ExpressionScope {
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for ExpressionScope {
    fn drop(&mut self) {
        DISABLED.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// A parsed piece of a raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Plain text
    Text(String),
    /// A `${key:default}` reference
    Reference {
        /// The referenced name, possibly built from nested expressions
        key: Vec<Node>,
        /// Text used when the key is absent
        default: Option<Vec<Node>>,
    },
    /// A `${handler::secret}` call
    Handler {
        /// The handler name
        handler: Vec<Node>,
        /// Text handed to the handler
        secret: Vec<Node>,
    },
}

/// A parsed raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    nodes: Vec<Node>,
}

/// The outcome of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expanded {
    /// The expanded text
    pub value: String,
    /// Problems found while expanding; the value is unusable when non-empty
    pub problems: Vec<ValueProblem>,
}

impl Expression {
    /// Parse a raw value.
    pub fn parse(raw: &str) -> Self {
        let chars: Vec<char> = raw.chars().collect();
        let (nodes, _, _) = parse_until(&chars, 0, &[]);
        Self { nodes }
    }

    /// Whether the value contains at least one reference.
    pub fn has_references(&self) -> bool {
        self.nodes
            .iter()
            .any(|node| matches!(node, Node::Reference { .. } | Node::Handler { .. }))
    }

    /// The parsed nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Evaluate against a resolver.
    ///
    /// `resolve` looks a referenced name up and returns `Ok(None)` when it is absent. Names
    /// that resolve to values with problems propagate those problems; absent names without
    /// a default add a "could not expand" problem for `name`. Handler calls that fail add a
    /// problem too.
    pub fn evaluate<F>(
        &self,
        name: &str,
        handlers: &SecretHandlers,
        mut resolve: F,
    ) -> ConfigResult<Expanded>
    where
        F: FnMut(&str) -> ConfigResult<Option<ConfigValue>>,
    {
        let mut eval = Eval {
            name,
            handlers,
            resolve: &mut resolve,
            problems: Vec::new(),
        };
        let value = eval.nodes(&self.nodes)?;
        let problems = eval.problems;
        Ok(Expanded { value, problems })
    }
}

/// Expand a raw value. Values without `$` are returned untouched.
pub fn expand<F>(
    raw: &str,
    name: &str,
    handlers: &SecretHandlers,
    resolve: F,
) -> ConfigResult<Expanded>
where
    F: FnMut(&str) -> ConfigResult<Option<ConfigValue>>,
{
    if !raw.contains('$') {
        return Ok(Expanded {
            value: raw.to_string(),
            problems: Vec::new(),
        });
    }
    Expression::parse(raw).evaluate(name, handlers, resolve)
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

fn push_char(nodes: &mut Vec<Node>, c: char) {
    let mut buf = [0u8; 4];
    push_text(nodes, c.encode_utf8(&mut buf));
}

/// Parse until one of `stops` at this nesting level, or the end of input.
///
/// Returns the nodes, the position of the stop character (or the input length) and the
/// stop character found.
fn parse_until(chars: &[char], mut pos: usize, stops: &[char]) -> (Vec<Node>, usize, Option<char>) {
    let mut nodes = Vec::new();

    while pos < chars.len() {
        let c = chars[pos];
        let next = chars.get(pos + 1).copied();

        match (c, next) {
            ('$', Some('$')) | ('\\', Some('$')) => {
                push_char(&mut nodes, '$');
                pos += 2;
            }
            ('$', Some('{')) => match parse_reference(chars, pos + 2) {
                Some((node, end)) => {
                    nodes.push(node);
                    pos = end;
                }
                None => {
                    push_text(&mut nodes, "${");
                    pos += 2;
                }
            },
            (c, _) if stops.contains(&c) => return (nodes, pos, Some(c)),
            (c, _) => {
                push_char(&mut nodes, c);
                pos += 1;
            }
        }
    }

    (nodes, pos, None)
}

/// Parse a reference body starting after `${`. Returns the node and the position after `}`.
fn parse_reference(chars: &[char], pos: usize) -> Option<(Node, usize)> {
    let (key, end, stop) = parse_until(chars, pos, &[':', '}']);
    match stop {
        Some('}') => Some((Node::Reference { key, default: None }, end + 1)),
        Some(':') if chars.get(end + 1) == Some(&':') => {
            let (secret, end, stop) = parse_until(chars, end + 2, &['}']);
            (stop == Some('}')).then_some((
                Node::Handler {
                    handler: key,
                    secret,
                },
                end + 1,
            ))
        }
        Some(':') => {
            let (default, end, stop) = parse_until(chars, end + 1, &['}']);
            (stop == Some('}')).then_some((
                Node::Reference {
                    key,
                    default: Some(default),
                },
                end + 1,
            ))
        }
        _ => None,
    }
}

struct Eval<'a, F> {
    name: &'a str,
    handlers: &'a SecretHandlers,
    resolve: &'a mut F,
    problems: Vec<ValueProblem>,
}

impl<F> Eval<'_, F>
where
    F: FnMut(&str) -> ConfigResult<Option<ConfigValue>>,
{
    fn nodes(&mut self, nodes: &[Node]) -> ConfigResult<String> {
        let mut out = String::new();
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Reference { key, default } => {
                    let key = self.nodes(key)?;
                    match (*self.resolve)(&key)? {
                        Some(value) if value.has_problems() => {
                            self.problems.extend(value.problems().iter().cloned());
                        }
                        Some(value) => out.push_str(value.value()),
                        None => match default {
                            Some(default) => {
                                let default = self.nodes(default)?;
                                out.push_str(&default);
                            }
                            None => self.problems.push(ValueProblem::not_expanded(key, self.name)),
                        },
                    }
                }
                Node::Handler { handler, secret } => {
                    let handler = self.nodes(handler)?;
                    let secret = self.nodes(secret)?;
                    match self.handlers.decode(&handler, &secret, self.name) {
                        Ok(decoded) => out.push_str(&decoded),
                        Err(problem) => self.problems.push(problem),
                    }
                }
            }
        }
        Ok(out)
    }
}
