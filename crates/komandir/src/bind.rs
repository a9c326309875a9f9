//! Binding tokens, environment and defaults into typed values.
//!
//! # Precedence
//!
//! Each flag resolves from the first source that has a value:
//!
//! ```text
//! explicit token  →  environment variable  →  declared default  →  zero value
//! ```
//!
//! Positional arguments resolve by position from the positional tokens, then
//! from their declared default. A required argument with neither is
//! `MissingArgument`.

use std::fmt;

use tracing::trace;

use crate::env::{self, EnvReader};
use crate::error::{Error, Result};
use crate::schema::{ArgSpec, FlagSpec, Schema};
use crate::tokenize::FlagToken;
use crate::value::{Value, ValueKind};

/// Where a bound value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// A token on the command line.
    Explicit,
    /// The flag's environment variable.
    Environment,
    /// The declared default.
    Default,
    /// The kind's zero value.
    Zero,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Explicit => write!(f, "explicit"),
            ValueSource::Environment => write!(f, "environment"),
            ValueSource::Default => write!(f, "default"),
            ValueSource::Zero => write!(f, "zero"),
        }
    }
}

/// The resolved value of one flag or argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    /// The string the value was coerced from, if any.
    pub raw: Option<String>,
    pub source: ValueSource,
    pub typed: Value,
}

impl ParsedValue {
    fn new(raw: Option<String>, source: ValueSource, typed: Value) -> Self {
        Self { raw, source, typed }
    }
}

/// Bound values keyed by flag or argument name, in spec order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    entries: Vec<(&'static str, ParsedValue)>,
}

impl Bindings {
    pub fn get(&self, name: &str) -> Option<&ParsedValue> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Shorthand for the typed value of `name`.
    pub fn typed(&self, name: &str) -> Option<&Value> {
        self.get(name).map(|parsed| &parsed.typed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParsedValue)> {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, name: &'static str, value: ParsedValue) {
        trace!(name, source = %value.source, value = %value.typed, "bound");
        self.entries.push((name, value));
    }
}

/// Binds flag specs from tokens, the environment and defaults.
///
/// Every occurrence of a repeated flag is validated; the last one wins.
pub fn bind_flags(
    specs: &[FlagSpec],
    tokens: &[FlagToken],
    env_reader: &dyn EnvReader,
) -> Result<Bindings> {
    let mut bindings = Bindings::default();

    for spec in specs {
        let mut explicit = None;
        for token in tokens.iter().filter(|token| token.name == spec.name) {
            explicit = Some(match &token.value {
                None => ParsedValue::new(None, ValueSource::Explicit, Value::Bool(true)),
                Some(raw) => ParsedValue::new(
                    Some(raw.clone()),
                    ValueSource::Explicit,
                    coerce(spec.name, &spec.kind, raw)?,
                ),
            });
        }

        let parsed = match explicit {
            Some(parsed) => parsed,
            None => match spec.env.and_then(|var| env::lookup(env_reader, var)) {
                Some(raw) => {
                    let typed = coerce(spec.name, &spec.kind, &raw)?;
                    ParsedValue::new(Some(raw), ValueSource::Environment, typed)
                }
                None => fallback(spec.default.as_ref(), &spec.kind),
            },
        };

        bindings.insert(spec.name, parsed);
    }

    Ok(bindings)
}

/// Binds argument specs from positional tokens and defaults.
///
/// A variadic argument takes every remaining token. Without one, tokens beyond
/// the declared arguments are `UnexpectedArgument`.
pub fn bind_args(specs: &[ArgSpec], positionals: &[String]) -> Result<Bindings> {
    let mut bindings = Bindings::default();
    let mut remaining = positionals.iter();

    for spec in specs {
        if spec.variadic {
            let items = remaining
                .by_ref()
                .map(|raw| coerce(spec.name, &spec.kind, raw))
                .collect::<Result<Vec<_>>>()?;
            let source = if items.is_empty() {
                ValueSource::Zero
            } else {
                ValueSource::Explicit
            };
            bindings.insert(spec.name, ParsedValue::new(None, source, Value::List(items)));
            continue;
        }

        let parsed = match remaining.next() {
            Some(raw) => ParsedValue::new(
                Some(raw.clone()),
                ValueSource::Explicit,
                coerce(spec.name, &spec.kind, raw)?,
            ),
            None if spec.default.is_some() => fallback(spec.default.as_ref(), &spec.kind),
            None => {
                return Err(Error::MissingArgument {
                    name: spec.name.to_string(),
                })
            }
        };
        bindings.insert(spec.name, parsed);
    }

    if let Some(extra) = remaining.next() {
        return Err(Error::UnexpectedArgument {
            value: extra.clone(),
        });
    }

    Ok(bindings)
}

/// A spec whose bound value can be written into a schema record.
pub trait BoundSpec {
    fn name(&self) -> &'static str;
    fn field(&self) -> &'static str;
    fn kind(&self) -> &ValueKind;
}

impl BoundSpec for FlagSpec {
    fn name(&self) -> &'static str {
        self.name
    }

    fn field(&self) -> &'static str {
        self.field
    }

    fn kind(&self) -> &ValueKind {
        &self.kind
    }
}

impl BoundSpec for ArgSpec {
    fn name(&self) -> &'static str {
        self.name
    }

    fn field(&self) -> &'static str {
        self.field
    }

    fn kind(&self) -> &ValueKind {
        &self.kind
    }
}

/// Writes bound values into a schema record.
///
/// Assignment can still fail after coercion, e.g. `300` into a `u8` field;
/// that is reported as `InvalidFlagValue`.
pub fn apply<S: Schema, P: BoundSpec>(record: &mut S, specs: &[P], bindings: &Bindings) -> Result<()> {
    for spec in specs {
        let Some(parsed) = bindings.get(spec.name()) else {
            continue;
        };
        record
            .assign(spec.field(), parsed.typed.clone())
            .map_err(|err| {
                let shown = parsed
                    .raw
                    .clone()
                    .unwrap_or_else(|| parsed.typed.to_string());
                Error::invalid_value(spec.name(), spec.kind(), shown, err)
            })?;
    }
    Ok(())
}

fn coerce(name: &str, kind: &ValueKind, raw: &str) -> Result<Value> {
    kind.parse(raw)
        .map_err(|err| Error::invalid_value(name, kind, raw, err))
}

fn fallback(default: Option<&Value>, kind: &ValueKind) -> ParsedValue {
    match default {
        Some(value) => ParsedValue::new(None, ValueSource::Default, value.clone()),
        None => ParsedValue::new(None, ValueSource::Zero, kind.zero()),
    }
}
