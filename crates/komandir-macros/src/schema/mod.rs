//! Implementation of the `#[derive(FlagSet)]` and `#[derive(ArgSet)]` macros.
//!
//! Both derives share one attribute parser and one code generator; they
//! differ only in the attribute they read and the keys they accept.

mod attrs;
mod derive;

pub use derive::{schema_derive_impl, SchemaKind};
