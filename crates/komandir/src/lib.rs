//! Declarative command trees for command-line programs.
//!
//! `komandir` turns plain Rust structs into flag and argument schemas, arranges
//! commands into a tree, and runs the one an argument list selects.
//!
//! # Features
//!
//! - **Typed schemas**: `#[derive(FlagSet)]` / `#[derive(ArgSet)]` on a struct
//!   declare names, aliases, descriptions, environment fallbacks and defaults
//! - **Precedence**: explicit token > environment variable > default > zero value
//! - **Custom types**: any [`FlagValue`] type, marked `#[flag(custom)]`
//! - **Subcommands**: nested [`Command`]s matched by name or alias
//! - **Hooks**: pre and post hooks around each action, with a [`Context`]
//!   carrying cancellation, a deadline and application values
//!
//! # Example
//!
//! ```rust
//! use komandir::{ArgSet, Command, Context, FlagSet};
//!
//! #[derive(Debug, Default, FlagSet)]
//! struct Flags {
//!     #[flag(name = "migration-dir", alias = "dir", default = "migrations")]
//!     dir: String,
//!     #[flag(name = "verbose", alias = "v")]
//!     verbose: bool,
//! }
//!
//! #[derive(Debug, Default, ArgSet)]
//! struct Args {
//!     #[arg(name = "direction", choices("up", "down"), default = "up")]
//!     direction: String,
//! }
//!
//! let mut migrate = Command::<Flags, Args>::new("migrate").action(|_ctx, cmd| {
//!     assert_eq!(cmd.flags().dir, "db");
//!     assert_eq!(cmd.args().direction, "down");
//!     Ok(())
//! });
//!
//! migrate.exec(&Context::background(), ["--dir", "db", "down"])?;
//! # Ok::<(), komandir::Error>(())
//! ```
//!
//! # Pipeline
//!
//! ```text
//! Schema ──introspect──▶ FlagSpec / ArgSpec
//! argv ──Tokenizer──▶ Tokens ──bind──▶ Bindings ──apply──▶ populated records
//! ```
//!
//! Each stage is public, so the pieces can be used without a [`Command`].

mod bind;
mod command;
mod context;
mod env;
mod error;
mod hooks;
mod schema;
mod tokenize;
mod value;

pub use bind::{apply, bind_args, bind_flags, Bindings, BoundSpec, ParsedValue, ValueSource};
pub use command::{Command, CommandState, Node, Scope};
pub use context::{CancelHandle, Context, Extensions};
pub use env::{EnvReader, MockEnv, RealEnv};
pub use error::{Error, ErrorKind, Result};
pub use hooks::{Hook, HookError, HookPhase};
pub use schema::{
    introspect_args, introspect_flags, ArgSpec, FieldDescriptor, FieldTags, FlagSpec, Schema,
};
pub use tokenize::{tokenize, FlagToken, Token, Tokenizer, Tokens};
pub use value::{
    from_custom, parse_bool, parse_duration, parse_integer, CustomKind, FlagValue, FromValue, Value,
    ValueError, ValueKind,
};

// Derive macros
pub use komandir_macros::{ArgSet, FlagSet};
