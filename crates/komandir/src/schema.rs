//! Schema declaration and introspection.
//!
//! A schema is a plain record type whose fields describe flags or positional
//! arguments. The [`Schema`] trait is the field-description capability: it
//! lists each field with its metadata and declared type, and writes bound
//! values back into an instance. It is normally derived with
//! `#[derive(FlagSet)]` or `#[derive(ArgSet)]`, but can be written by hand.
//!
//! [`introspect_flags`] and [`introspect_args`] turn that description into
//! validated [`FlagSpec`]s and [`ArgSpec`]s. They are pure functions of the
//! type; no instance is needed.
//!
//! # Manual Implementation
//!
//! ```
//! use komandir::{introspect_flags, FieldDescriptor, FieldTags, FromValue, Schema, Value, ValueError};
//!
//! #[derive(Default)]
//! struct Flags {
//!     verbose: bool,
//! }
//!
//! impl Schema for Flags {
//!     fn describe_fields() -> Vec<FieldDescriptor> {
//!         vec![FieldDescriptor::new(
//!             "verbose",
//!             "bool",
//!             FieldTags::named("verbose").alias("v"),
//!         )]
//!     }
//!
//!     fn assign(&mut self, field: &str, value: Value) -> Result<(), ValueError> {
//!         match field {
//!             "verbose" => self.verbose = bool::from_value(value)?,
//!             _ => return Err(ValueError::UnknownField { field: field.to_string() }),
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let specs = introspect_flags::<Flags>().unwrap();
//! assert_eq!(specs[0].name, "verbose");
//! assert_eq!(specs[0].aliases, vec!["v"]);
//! ```

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::value::{classify, CustomKind, Declared, FlagValue, Value, ValueError, ValueKind};

/// A record type that declares flags or positional arguments.
pub trait Schema: Default {
    /// Describes the record's fields in declaration order.
    fn describe_fields() -> Vec<FieldDescriptor>;

    /// Writes a bound value into the field named `field` (the Rust field
    /// identifier, not the flag name).
    fn assign(&mut self, field: &str, value: Value) -> std::result::Result<(), ValueError>;
}

impl Schema for () {
    fn describe_fields() -> Vec<FieldDescriptor> {
        Vec::new()
    }

    fn assign(&mut self, field: &str, _value: Value) -> std::result::Result<(), ValueError> {
        Err(ValueError::UnknownField {
            field: field.to_string(),
        })
    }
}

/// One field of a schema record, as described by [`Schema::describe_fields`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// The Rust field identifier.
    pub field: &'static str,
    /// The field type as written in source, e.g. `"u16"` or `"Vec<String>"`.
    pub declared_type: &'static str,
    pub tags: FieldTags,
}

impl FieldDescriptor {
    pub fn new(field: &'static str, declared_type: &'static str, tags: FieldTags) -> Self {
        Self {
            field,
            declared_type,
            tags,
        }
    }
}

/// Declared metadata of a field.
///
/// A field without a `name` does not participate in parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTags {
    pub name: Option<&'static str>,
    pub aliases: Vec<&'static str>,
    pub description: Option<&'static str>,
    pub env: Option<&'static str>,
    pub default: Option<&'static str>,
    /// Allowed values; turns a string field into an enumeration.
    pub choices: Vec<&'static str>,
    /// Set for fields whose type implements [`FlagValue`].
    pub custom: Option<CustomKind>,
}

impl FieldTags {
    /// Tags with a flag or argument name.
    pub fn named(name: &'static str) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn desc(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn env(mut self, var: &'static str) -> Self {
        self.env = Some(var);
        self
    }

    pub fn default_value(mut self, literal: &'static str) -> Self {
        self.default = Some(literal);
        self
    }

    pub fn choices(mut self, choices: &[&'static str]) -> Self {
        self.choices = choices.to_vec();
        self
    }

    /// Marks the field as a [`FlagValue`] of type `T`.
    pub fn custom<T: FlagValue>(mut self) -> Self {
        self.custom = Some(CustomKind::of::<T>());
        self
    }
}

/// An introspected flag.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagSpec {
    pub name: &'static str,
    pub field: &'static str,
    pub aliases: Vec<&'static str>,
    pub description: &'static str,
    pub env: Option<&'static str>,
    /// The declared default, already coerced.
    pub default: Option<Value>,
    pub kind: ValueKind,
}

impl FlagSpec {
    /// Returns true if the flag consumes no value token.
    pub fn is_switch(&self) -> bool {
        self.kind.is_bool()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| *a == alias)
    }
}

/// An introspected positional argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub field: &'static str,
    pub description: &'static str,
    pub default: Option<Value>,
    /// For a variadic argument, the kind of each element.
    pub kind: ValueKind,
    /// Index among the positional arguments, in declaration order.
    pub position: usize,
    /// Consumes every remaining positional token.
    pub variadic: bool,
}

impl ArgSpec {
    /// Returns true if binding fails when no token is supplied.
    pub fn is_required(&self) -> bool {
        !self.variadic && self.default.is_none()
    }
}

/// Introspects a flag schema.
///
/// Fields without a name are skipped. Returns `UnsupportedFieldType`,
/// `DuplicateFlagName` or `InvalidDefault` on the first malformed field, and
/// no partial list.
pub fn introspect_flags<F: Schema>() -> Result<Vec<FlagSpec>> {
    let mut specs = Vec::new();
    let mut seen = HashSet::new();

    for descriptor in F::describe_fields() {
        let Some(name) = participating_name(&descriptor) else {
            continue;
        };
        let declared = classify_field(&descriptor).filter(|d| !d.list).ok_or(
            Error::UnsupportedFieldType {
                field: descriptor.field,
                declared_type: descriptor.declared_type,
            },
        )?;

        let aliases: Vec<&'static str> = descriptor
            .tags
            .aliases
            .iter()
            .copied()
            .filter(|alias| !alias.is_empty())
            .collect();

        for key in std::iter::once(name).chain(aliases.iter().copied()) {
            if !seen.insert(key) {
                return Err(Error::DuplicateFlagName {
                    name: key.to_string(),
                });
            }
        }

        let default = coerce_default(name, &declared.kind, descriptor.tags.default)?;

        specs.push(FlagSpec {
            name,
            field: descriptor.field,
            aliases,
            description: descriptor.tags.description.unwrap_or_default(),
            env: descriptor.tags.env.filter(|var| !var.is_empty()),
            default,
            kind: declared.kind,
        });
    }

    Ok(specs)
}

/// Introspects an argument schema.
///
/// Positions follow declaration order. A `Vec<T>` field is variadic and must
/// be declared last (`MisplacedVariadicArgument`). Aliases and environment
/// names are not meaningful for positional arguments and are ignored.
pub fn introspect_args<A: Schema>() -> Result<Vec<ArgSpec>> {
    let mut specs: Vec<ArgSpec> = Vec::new();
    let mut seen = HashSet::new();

    for descriptor in A::describe_fields() {
        let Some(name) = participating_name(&descriptor) else {
            continue;
        };
        let declared = classify_field(&descriptor).ok_or(Error::UnsupportedFieldType {
            field: descriptor.field,
            declared_type: descriptor.declared_type,
        })?;

        if let Some(previous) = specs.last().filter(|spec| spec.variadic) {
            return Err(Error::MisplacedVariadicArgument {
                name: previous.name.to_string(),
            });
        }
        if !seen.insert(name) {
            return Err(Error::DuplicateFlagName {
                name: name.to_string(),
            });
        }

        let default = match (declared.list, descriptor.tags.default) {
            (true, Some(literal)) => {
                return Err(Error::InvalidDefault {
                    name: name.to_string(),
                    expected: "no default for a variadic argument".to_string(),
                    value: literal.to_string(),
                })
            }
            _ => coerce_default(name, &declared.kind, descriptor.tags.default)?,
        };

        specs.push(ArgSpec {
            name,
            field: descriptor.field,
            description: descriptor.tags.description.unwrap_or_default(),
            default,
            kind: declared.kind,
            position: specs.len(),
            variadic: declared.list,
        });
    }

    Ok(specs)
}

fn participating_name(descriptor: &FieldDescriptor) -> Option<&'static str> {
    descriptor.tags.name.filter(|name| !name.is_empty())
}

fn classify_field(descriptor: &FieldDescriptor) -> Option<Declared> {
    classify(
        descriptor.declared_type,
        &descriptor.tags.choices,
        descriptor.tags.custom,
    )
}

fn coerce_default(
    name: &str,
    kind: &ValueKind,
    literal: Option<&'static str>,
) -> Result<Option<Value>> {
    literal
        .map(|literal| {
            kind.parse(literal).map_err(|_| Error::InvalidDefault {
                name: name.to_string(),
                expected: kind.to_string(),
                value: literal.to_string(),
            })
        })
        .transpose()
}
