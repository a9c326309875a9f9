//! Derive macros for komandir.
//!
//! - [`FlagSet`] - Declare a struct's fields as command-line flags
//! - [`ArgSet`] - Declare a struct's fields as positional arguments
//!
//! Both generate an implementation of `komandir::Schema`. Use them through the
//! `komandir` crate, which re-exports them.

mod schema;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

use schema::SchemaKind;

/// Derives `komandir::Schema` for a flag record.
///
/// # Field Attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `name = "..."` | Flag name, used as `--name`. Without it the field takes no part in parsing |
/// | `alias = "..."` | Alternative name, usually used as `-a`. May repeat |
/// | `desc = "..."` | One-line description |
/// | `env = "..."` | Environment variable read when the flag is absent |
/// | `default = "..."` | Default literal, coerced to the field's type |
/// | `choices("a", "b")` | Allowed values for a `String` field |
/// | `custom` | The field's type implements `komandir::FlagValue` |
///
/// Fields without `#[flag]` are not flags. Visibility does not matter: a
/// private field with `#[flag(name = "...")]` is a flag like a public one.
///
/// # Example
///
/// ```ignore
/// use komandir::FlagSet;
///
/// #[derive(Debug, Default, FlagSet)]
/// struct MigrateFlags {
///     #[flag(name = "migration-dir", alias = "dir", env = "MIGRATION_DIR", default = "migrations")]
///     dir: String,
///
///     #[flag(name = "verbose", alias = "v", desc = "verbose output")]
///     verbose: bool,
///
///     #[flag(name = "timeout", default = "30s")]
///     timeout: std::time::Duration,
///
///     #[flag(name = "level", custom, default = "info")]
///     level: LogLevel,
/// }
/// ```
///
/// where `LogLevel` implements `komandir::FlagValue`:
///
/// ```ignore
/// impl komandir::FlagValue for LogLevel {
///     fn parse_flag(raw: &str) -> anyhow::Result<Self> { /* ... */ }
///     fn to_flag(&self) -> String { /* ... */ }
/// }
/// ```
///
/// A field of a type the binder cannot fill (anything but `bool`, `String`,
/// the integer and float primitives and `Duration`) still compiles; it is
/// reported as `UnsupportedFieldType` when the command is prepared.
#[proc_macro_derive(FlagSet, attributes(flag))]
pub fn flag_set_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    schema::schema_derive_impl(input, SchemaKind::Flags)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derives `komandir::Schema` for a positional argument record.
///
/// Accepts `name`, `desc`, `default`, `choices(...)` and `custom` like [`FlagSet`];
/// `alias` and `env` are compile errors. Positions follow declaration order.
/// A `Vec<T>` field collects every remaining token and must be declared last.
///
/// # Example
///
/// ```ignore
/// use komandir::ArgSet;
///
/// #[derive(Debug, Default, ArgSet)]
/// struct CreateArgs {
///     #[arg(name = "name", desc = "migration name")]
///     name: String,
///
///     #[arg(name = "tags", desc = "labels")]
///     tags: Vec<String>,
/// }
/// ```
#[proc_macro_derive(ArgSet, attributes(arg))]
pub fn arg_set_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    schema::schema_derive_impl(input, SchemaKind::Args)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
