//! Compiled event filters.
//!
//! Event-source flavors turn a trigger's filter document into an
//! [`EventFilter`]. Compilation is where malformed filters are rejected;
//! evaluation itself cannot fail.

use regex::Regex;
use serde_json::Value;

use crate::dispatch::Event;
use crate::document::{lookup, Document};
use crate::error::ConfigurationError;

/// A compiled filter deciding whether an event qualifies.
pub trait EventFilter: Send + Sync {
    /// Returns true when the event satisfies the filter.
    fn matches(&self, event: &Event) -> bool;
}

/// Matches every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchAll;

impl EventFilter for MatchAll {
    fn matches(&self, _event: &Event) -> bool {
        true
    }
}

#[derive(Debug)]
enum Condition {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Exists(bool),
    Regex(Regex),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
}

impl Condition {
    fn parse(path: &str, spec: &Value) -> Result<Self, ConfigurationError> {
        let Value::Object(ops) = spec else {
            return Ok(Self::Eq(spec.clone()));
        };
        if ops.len() != 1 {
            return Err(ConfigurationError::InvalidFilter {
                reason: format!("condition for '{path}' must contain exactly one operator"),
            });
        }
        let Some((op, arg)) = ops.iter().next() else {
            return Err(ConfigurationError::InvalidFilter {
                reason: format!("empty condition for '{path}'"),
            });
        };

        let number = |arg: &Value| {
            arg.as_f64().ok_or_else(|| ConfigurationError::InvalidFilter {
                reason: format!("operator '{op}' on '{path}' expects a number"),
            })
        };

        match op.as_str() {
            "eq" => Ok(Self::Eq(arg.clone())),
            "ne" => Ok(Self::Ne(arg.clone())),
            "in" => match arg {
                Value::Array(items) => Ok(Self::In(items.clone())),
                _ => Err(ConfigurationError::InvalidFilter {
                    reason: format!("operator 'in' on '{path}' expects an array"),
                }),
            },
            "exists" => match arg {
                Value::Bool(b) => Ok(Self::Exists(*b)),
                _ => Err(ConfigurationError::InvalidFilter {
                    reason: format!("operator 'exists' on '{path}' expects a boolean"),
                }),
            },
            "regex" => {
                let Some(pattern) = arg.as_str() else {
                    return Err(ConfigurationError::InvalidFilter {
                        reason: format!("operator 'regex' on '{path}' expects a string"),
                    });
                };
                Regex::new(pattern).map(Self::Regex).map_err(|e| {
                    ConfigurationError::InvalidFilter {
                        reason: format!("invalid regex for '{path}': {e}"),
                    }
                })
            }
            "gt" => number(arg).map(Self::Gt),
            "gte" => number(arg).map(Self::Gte),
            "lt" => number(arg).map(Self::Lt),
            "lte" => number(arg).map(Self::Lte),
            other => Err(ConfigurationError::InvalidFilter {
                reason: format!("unknown operator '{other}' for '{path}'"),
            }),
        }
    }

    fn holds(&self, actual: Option<&Value>) -> bool {
        match self {
            Self::Exists(expected) => actual.is_some() == *expected,
            Self::Ne(expected) => !actual.is_some_and(|v| same_value(v, expected)),
            Self::Eq(expected) => actual.is_some_and(|v| same_value(v, expected)),
            Self::In(options) => actual.is_some_and(|v| options.iter().any(|o| same_value(v, o))),
            Self::Regex(re) => actual.and_then(Value::as_str).is_some_and(|s| re.is_match(s)),
            Self::Gt(bound) => actual.and_then(Value::as_f64).is_some_and(|v| v > *bound),
            Self::Gte(bound) => actual.and_then(Value::as_f64).is_some_and(|v| v >= *bound),
            Self::Lt(bound) => actual.and_then(Value::as_f64).is_some_and(|v| v < *bound),
            Self::Lte(bound) => actual.and_then(Value::as_f64).is_some_and(|v| v <= *bound),
        }
    }
}

/// Equality used by `eq`, `ne` and `in`. Numbers compare by value, so `10`
/// equals `10.0`; nested arrays and objects compare structurally.
#[allow(clippy::float_cmp)]
fn same_value(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => actual == expected,
    }
}

/// Conjunction of per-field conditions over the event payload.
///
/// Keys are dotted payload paths. A plain value means equality; an object
/// with a single operator (`eq`, `ne`, `in`, `exists`, `regex`, `gt`, `gte`,
/// `lt`, `lte`) selects another comparison. An empty filter matches all events.
#[derive(Debug)]
pub struct FieldFilter {
    conditions: Vec<(String, Condition)>,
}

impl FieldFilter {
    /// Compiles a filter document.
    ///
    /// # Errors
    /// `InvalidFilter` on unknown operators, wrong operand types or bad regexes.
    pub fn compile(filter: &Document) -> Result<Self, ConfigurationError> {
        let mut conditions = Vec::with_capacity(filter.len());
        for (path, spec) in filter {
            if path.trim().is_empty() {
                return Err(ConfigurationError::InvalidFilter {
                    reason: "filter keys cannot be empty".to_string(),
                });
            }
            conditions.push((path.clone(), Condition::parse(path, spec)?));
        }
        Ok(Self { conditions })
    }
}

impl EventFilter for FieldFilter {
    fn matches(&self, event: &Event) -> bool {
        self.conditions
            .iter()
            .all(|(path, cond)| cond.holds(lookup(&event.payload, path)))
    }
}
