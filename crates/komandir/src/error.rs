//! Error types for the command-tree engine.
//!
//! Every stage (introspection, tokenizing, binding, dispatch) returns its
//! error immediately. Errors carry enough structure (flag or argument name,
//! expected kind, offending value) for a caller to render its own message;
//! the `Display` text is only a reasonable default.

use std::fmt;

use thiserror::Error;

use crate::command::CommandState;
use crate::hooks::HookError;

/// Errors returned by [`Command::exec`](crate::Command::exec) and the stages it drives.
#[derive(Debug, Error)]
pub enum Error {
    /// A described field has a type the binder cannot coerce into.
    #[error("field '{field}' has unsupported type '{declared_type}'")]
    UnsupportedFieldType {
        field: &'static str,
        declared_type: &'static str,
    },

    /// Two flags (or arguments) in one schema share a name or alias.
    #[error("duplicate flag name or alias '{name}'")]
    DuplicateFlagName { name: String },

    /// A variadic argument is followed by another argument.
    #[error("variadic argument '{name}' must be the last argument")]
    MisplacedVariadicArgument { name: String },

    /// A declared default literal does not coerce into the field's kind.
    #[error("invalid default '{value}' for '{name}': expected {expected}")]
    InvalidDefault {
        name: String,
        expected: String,
        value: String,
    },

    /// A flag reference matched no name or alias of the schema.
    #[error("unknown flag '{flag}'")]
    UnknownFlag { flag: String },

    /// A non-boolean flag was the last token and had no inline value.
    #[error("flag '{name}' requires a value")]
    MissingFlagValue { name: String },

    /// A flag or argument value failed to coerce into its declared kind.
    #[error("invalid value '{value}' for '{name}': expected {expected} ({reason})")]
    InvalidFlagValue {
        name: String,
        expected: String,
        value: String,
        reason: String,
    },

    /// A required positional argument was not supplied.
    #[error("missing required argument '{name}'")]
    MissingArgument { name: String },

    /// More positional tokens than the schema declares.
    #[error("unexpected argument '{value}'")]
    UnexpectedArgument { value: String },

    /// A process argument is not valid UTF-8. `value` is its lossy rendering.
    #[error("argument {position} is not valid UTF-8: '{value}'")]
    InvalidEncoding { position: usize, value: String },

    /// A lifecycle method was called in the wrong state.
    #[error("command '{command}' is {found}, expected {expected}")]
    InvalidState {
        command: String,
        expected: CommandState,
        found: CommandState,
    },

    /// Dispatch resolved to a node that has no action.
    #[error("command '{command}' has no action")]
    MissingAction { command: String },

    /// A pre or post hook failed.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The action failed. The action's own error is returned unchanged.
    #[error(transparent)]
    Action(anyhow::Error),
}

/// Coarse classification of an [`Error`], for choosing exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The declared schema is malformed. A programming error.
    Schema,
    /// The user supplied arguments that do not fit the schema.
    Usage,
    /// A lifecycle method was misused.
    State,
    /// A pre or post hook failed.
    Hook,
    /// The action failed.
    Action,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Schema => write!(f, "schema"),
            ErrorKind::Usage => write!(f, "usage"),
            ErrorKind::State => write!(f, "state"),
            ErrorKind::Hook => write!(f, "hook"),
            ErrorKind::Action => write!(f, "action"),
        }
    }
}

impl Error {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedFieldType { .. }
            | Error::DuplicateFlagName { .. }
            | Error::MisplacedVariadicArgument { .. }
            | Error::InvalidDefault { .. } => ErrorKind::Schema,
            Error::UnknownFlag { .. }
            | Error::MissingFlagValue { .. }
            | Error::InvalidFlagValue { .. }
            | Error::MissingArgument { .. }
            | Error::UnexpectedArgument { .. }
            | Error::InvalidEncoding { .. } => ErrorKind::Usage,
            Error::InvalidState { .. } | Error::MissingAction { .. } => ErrorKind::State,
            Error::Hook(_) => ErrorKind::Hook,
            Error::Action(_) => ErrorKind::Action,
        }
    }

    /// Returns true for schema-declaration errors surfaced at prepare time.
    pub fn is_schema_error(&self) -> bool {
        self.kind() == ErrorKind::Schema
    }

    /// Returns true for user-input errors surfaced at parse time.
    pub fn is_usage_error(&self) -> bool {
        self.kind() == ErrorKind::Usage
    }

    /// Returns the action's error, if this is an action failure.
    pub fn as_action_error(&self) -> Option<&anyhow::Error> {
        match self {
            Error::Action(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn invalid_value(
        name: impl Into<String>,
        expected: impl fmt::Display,
        value: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Error::InvalidFlagValue {
            name: name.into(),
            expected: expected.to_string(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for komandir operations.
pub type Result<T> = std::result::Result<T, Error>;
