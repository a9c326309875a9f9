//! Runtime values and coercion.
//!
//! Every flag and argument has a [`ValueKind`] derived from its declared
//! field type. Raw command-line strings are coerced into a [`Value`] of that
//! kind, and the value is then written into the schema record through
//! [`FromValue`].
//!
//! Types outside the built-in set can take part by implementing
//! [`FlagValue`] and marking the field `#[flag(custom)]`.

use std::any::type_name;
use std::fmt;
use std::num::IntErrorKind;
use std::time::Duration;

use thiserror::Error;

/// The coercion kind of a flag or argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// `true`/`false` switch.
    Bool,
    /// Free-form string.
    String,
    /// Integer in the combined `i64` and `u64` range.
    Integer,
    /// 64-bit float.
    Float,
    /// Go-style duration literal (`1h30m`, `250ms`).
    Duration,
    /// String restricted to a fixed set of choices.
    Enum(Vec<&'static str>),
    /// A [`FlagValue`] type, carried as its canonical flag text.
    Custom(CustomKind),
}

impl ValueKind {
    /// Coerces a raw string into a value of this kind.
    pub fn parse(&self, raw: &str) -> Result<Value, ValueError> {
        match self {
            ValueKind::Bool => parse_bool(raw).map(Value::Bool),
            ValueKind::String => Ok(Value::String(raw.to_string())),
            ValueKind::Integer => parse_integer(raw).map(Value::Integer),
            ValueKind::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| ValueError::Syntax(e.to_string())),
            ValueKind::Duration => parse_duration(raw).map(Value::Duration),
            ValueKind::Enum(choices) => {
                if choices.contains(&raw) {
                    Ok(Value::String(raw.to_string()))
                } else {
                    Err(ValueError::NotAChoice {
                        value: raw.to_string(),
                        choices: choices.join(", "),
                    })
                }
            }
            ValueKind::Custom(custom) => custom.parse(raw),
        }
    }

    /// The value bound when nothing else supplies one.
    pub fn zero(&self) -> Value {
        match self {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::String | ValueKind::Enum(_) => Value::String(String::new()),
            ValueKind::Integer => Value::Integer(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Duration => Value::Duration(Duration::ZERO),
            ValueKind::Custom(custom) => Value::String(custom.zero()),
        }
    }

    /// Returns true for boolean switches, which consume no value token.
    pub fn is_bool(&self) -> bool {
        matches!(self, ValueKind::Bool)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::Duration => write!(f, "duration"),
            ValueKind::Enum(choices) => write!(f, "one of [{}]", choices.join(", ")),
            ValueKind::Custom(custom) => write!(f, "{}", custom.name()),
        }
    }
}

/// Shape of a declared field type after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declared {
    pub kind: ValueKind,
    pub list: bool,
}

/// Classifies a field type as written in source (`"u16"`, `"Vec<String>"`,
/// `"std::time::Duration"`). Returns `None` for unsupported types.
///
/// A custom field is always a single value, whatever its declared type.
pub(crate) fn classify(
    declared_type: &str,
    choices: &[&'static str],
    custom: Option<CustomKind>,
) -> Option<Declared> {
    if let Some(custom) = custom {
        return choices.is_empty().then_some(Declared {
            kind: ValueKind::Custom(custom),
            list: false,
        });
    }

    let compact: String = declared_type.chars().filter(|c| !c.is_whitespace()).collect();

    let (inner, list) = match strip_vec(&compact) {
        Some(inner) => (inner, true),
        None => (compact.as_str(), false),
    };

    let kind = match last_segment(inner) {
        "bool" => ValueKind::Bool,
        "String" if !choices.is_empty() => ValueKind::Enum(choices.to_vec()),
        "String" => ValueKind::String,
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            ValueKind::Integer
        }
        "f32" | "f64" => ValueKind::Float,
        "Duration" => ValueKind::Duration,
        _ => return None,
    };

    if !choices.is_empty() && !matches!(kind, ValueKind::Enum(_)) {
        return None;
    }

    Some(Declared { kind, list })
}

fn strip_vec(ty: &str) -> Option<&str> {
    let generic = ty.strip_suffix('>')?;
    let (outer, inner) = generic.split_once('<')?;
    (last_segment(outer) == "Vec").then_some(inner)
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// A coerced flag or argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    String(String),
    /// Wide enough for both `i64::MIN` and `u64::MAX`.
    Integer(i128),
    Float(f64),
    Duration(Duration),
    /// Values collected by a variadic argument.
    List(Vec<Value>),
}

impl Value {
    /// Short name of the variant, used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Duration(_) => "duration",
            Value::List(_) => "list",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Duration(d) => write!(f, "{d:?}"),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// Errors from coercing a raw string or assigning a value into a field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// The raw string is not a literal of the requested kind.
    #[error("{0}")]
    Syntax(String),

    /// The raw string is not one of the declared choices.
    #[error("'{value}' is not one of [{choices}]")]
    NotAChoice { value: String, choices: String },

    /// A value of one variant was assigned to a field of another.
    #[error("expected {expected} value, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An integer does not fit the field's integer type.
    #[error("{value} is out of range for {target}")]
    OutOfRange { value: i128, target: &'static str },

    /// The record has no assignable field with this name.
    #[error("no assignable field named '{field}'")]
    UnknownField { field: String },
}

impl ValueError {
    pub fn mismatch(expected: &'static str, found: &Value) -> Self {
        ValueError::Mismatch {
            expected,
            found: found.type_name(),
        }
    }
}

/// Conversion from a bound [`Value`] into a record field's Rust type.
///
/// Implemented for every supported field type; the schema derives call it
/// when writing bound values into the record.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(ValueError::mismatch("bool", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(ValueError::mismatch("string", &other)),
        }
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value {
                        Value::Integer(n) => <$ty>::try_from(n).map_err(|_| ValueError::OutOfRange {
                            value: n,
                            target: stringify!($ty),
                        }),
                        other => Err(ValueError::mismatch("integer", &other)),
                    }
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(n) => Ok(n),
            other => Err(ValueError::mismatch("float", &other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        f64::from_value(value).map(|n| n as f32)
    }
}

impl FromValue for Duration {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Duration(d) => Ok(d),
            other => Err(ValueError::mismatch("duration", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(ValueError::mismatch("list", &other)),
        }
    }
}

/// A user-defined flag value type.
///
/// `parse_flag` reads the command-line text; `to_flag` writes the canonical
/// text back. `parse_flag(&v.to_flag())` must succeed for every value,
/// including `Self::default()`, which is the zero value of the flag.
///
/// ```
/// use komandir::FlagValue;
///
/// #[derive(Debug, Default, PartialEq)]
/// enum Level {
///     #[default]
///     Info,
///     Debug,
/// }
///
/// impl FlagValue for Level {
///     fn parse_flag(raw: &str) -> anyhow::Result<Self> {
///         match raw.to_ascii_lowercase().as_str() {
///             "info" => Ok(Level::Info),
///             "debug" => Ok(Level::Debug),
///             other => anyhow::bail!("unknown level '{other}'"),
///         }
///     }
///
///     fn to_flag(&self) -> String {
///         format!("{self:?}").to_lowercase()
///     }
/// }
///
/// assert_eq!(Level::parse_flag("DEBUG").unwrap(), Level::Debug);
/// ```
pub trait FlagValue: Default + Sized {
    fn parse_flag(raw: &str) -> anyhow::Result<Self>;

    fn to_flag(&self) -> String;
}

/// Coercion entry points of a [`FlagValue`] type, stored in its [`ValueKind`].
///
/// Two custom kinds are equal when they name the same type.
#[derive(Clone, Copy)]
pub struct CustomKind {
    type_name: &'static str,
    canonical: fn(&str) -> Result<String, ValueError>,
    zero: fn() -> String,
}

impl CustomKind {
    pub fn of<T: FlagValue>() -> Self {
        Self {
            type_name: type_name::<T>(),
            canonical: canonical_text::<T>,
            zero: || T::default().to_flag(),
        }
    }

    /// The type's name without its module path.
    pub fn name(&self) -> &'static str {
        last_segment(self.type_name)
    }

    fn parse(&self, raw: &str) -> Result<Value, ValueError> {
        (self.canonical)(raw).map(Value::String)
    }

    fn zero(&self) -> String {
        (self.zero)()
    }
}

impl fmt::Debug for CustomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomKind").field(&self.type_name).finish()
    }
}

impl PartialEq for CustomKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
    }
}

impl Eq for CustomKind {}

fn canonical_text<T: FlagValue>(raw: &str) -> Result<String, ValueError> {
    T::parse_flag(raw)
        .map(|value| value.to_flag())
        .map_err(|err| ValueError::Syntax(err.to_string()))
}

/// Converts a bound custom value into its field type.
///
/// Called by the schema derives for `#[flag(custom)]` fields.
pub fn from_custom<T: FlagValue>(value: Value) -> Result<T, ValueError> {
    match value {
        Value::String(text) => {
            T::parse_flag(&text).map_err(|err| ValueError::Syntax(err.to_string()))
        }
        other => Err(ValueError::mismatch(last_segment(type_name::<T>()), &other)),
    }
}

/// Parses a boolean literal. Accepts `1 0 t f T F true false TRUE FALSE True False`.
pub fn parse_bool(raw: &str) -> Result<bool, ValueError> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(ValueError::Syntax(format!("'{other}' is not a boolean"))),
    }
}

/// Parses an integer, accepting `0x`, `0o` and `0b` prefixes.
///
/// The result lies in `i64::MIN..=u64::MAX`; the field type narrows it
/// further on assignment.
pub fn parse_integer(raw: &str) -> Result<i128, ValueError> {
    let text = raw.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let (radix, digits) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        Some("0o") | Some("0O") => (8, &digits[2..]),
        Some("0b") | Some("0B") => (2, &digits[2..]),
        _ => (10, digits),
    };
    if digits.starts_with(['+', '-']) {
        return Err(ValueError::Syntax(format!("'{raw}' is not an integer")));
    }

    let overflow = || ValueError::Syntax(format!("'{raw}' overflows a 64-bit integer"));
    let magnitude = match u128::from_str_radix(digits, radix) {
        Ok(magnitude) => magnitude,
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow) => return Err(overflow()),
        Err(e) => return Err(ValueError::Syntax(format!("'{raw}': {e}"))),
    };
    let signed = match (negative, i128::try_from(magnitude)) {
        (false, Ok(n)) => n,
        (true, Ok(n)) => -n,
        (_, Err(_)) => return Err(overflow()),
    };
    if signed < i128::from(i64::MIN) || signed > i128::from(u64::MAX) {
        return Err(overflow());
    }
    Ok(signed)
}

/// Parses a duration such as `300ms`, `1.5h` or `2h45m`.
///
/// A duration is a sequence of decimal numbers, each with an optional
/// fraction and a mandatory unit (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`).
/// The bare literal `0` is also accepted. Negative durations are rejected.
pub fn parse_duration(raw: &str) -> Result<Duration, ValueError> {
    let text = raw.trim();
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    if text.is_empty() {
        return Err(ValueError::Syntax("empty duration".to_string()));
    }

    let mut rest = text;
    let mut nanos = 0f64;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let amount: f64 = number
            .parse()
            .map_err(|_| ValueError::Syntax(format!("invalid duration '{raw}'")))?;
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(ValueError::Syntax(format!("missing unit in duration '{raw}'"))),
            other => {
                return Err(ValueError::Syntax(format!(
                    "unknown unit '{other}' in duration '{raw}'"
                )))
            }
        };

        nanos += amount * scale;
        rest = tail;
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(ValueError::Syntax(format!("duration '{raw}' is too large")));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}
