//! Lifecycle hooks around a command's action.
//!
//! # Pipeline Position
//!
//! ```text
//! parsed flags and arguments
//!   → PRE HOOK   ← (validation, setup; an error skips the action)
//!   → action
//!   → POST HOOK  ← (cleanup; runs whether or not the action failed)
//! ```
//!
//! When both the action and the post hook fail, the action's error is
//! returned. A post hook error surfaces only when the action succeeded.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::context::Context;

/// A lifecycle hook.
///
/// Any `Fn(&Context) -> anyhow::Result<()>` closure is a hook.
pub trait Hook {
    fn run(&self, ctx: &Context) -> anyhow::Result<()>;
}

impl<F> Hook for F
where
    F: Fn(&Context) -> anyhow::Result<()>,
{
    fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// The phase at which a hook error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// Before the action.
    Pre,
    /// After the action.
    Post,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Pre => write!(f, "pre"),
            HookPhase::Post => write!(f, "post"),
        }
    }
}

/// Error returned by a hook.
#[derive(Debug, Error)]
#[error("{phase} hook failed: {source}")]
pub struct HookError {
    /// The hook phase where the error occurred
    pub phase: HookPhase,
    /// The error the hook returned
    #[source]
    pub source: Box<dyn StdError + Send + Sync + 'static>,
}

impl HookError {
    pub fn new<E>(phase: HookPhase, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            phase,
            source: source.into(),
        }
    }
}

pub(crate) fn run_hook(
    hook: Option<&dyn Hook>,
    phase: HookPhase,
    ctx: &Context,
) -> Result<(), HookError> {
    match hook {
        Some(hook) => hook.run(ctx).map_err(|err| HookError::new(phase, err)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_closure_is_a_hook() {
        let called = Cell::new(false);
        let hook = |_: &Context| -> anyhow::Result<()> {
            called.set(true);
            Ok(())
        };

        let ctx = Context::background();
        assert!(run_hook(Some(&hook), HookPhase::Pre, &ctx).is_ok());
        assert!(called.get());
    }

    #[test]
    fn test_missing_hook_is_ok() {
        let ctx = Context::background();
        assert!(run_hook(None, HookPhase::Post, &ctx).is_ok());
    }

    #[test]
    fn test_hook_error_carries_phase() {
        let hook = |_: &Context| -> anyhow::Result<()> { Err(anyhow::anyhow!("lock held")) };

        let ctx = Context::background();
        let err = run_hook(Some(&hook), HookPhase::Post, &ctx).unwrap_err();
        assert_eq!(err.phase, HookPhase::Post);
        assert_eq!(err.to_string(), "post hook failed: lock held");
    }

    #[test]
    fn test_hook_can_read_context() {
        struct Token(&'static str);

        let hook = |ctx: &Context| -> anyhow::Result<()> {
            let token = ctx.value_required::<Token>()?;
            anyhow::ensure!(token.0 == "secret", "bad token");
            Ok(())
        };

        let ctx = Context::background().with_value(Token("secret"));
        assert!(run_hook(Some(&hook), HookPhase::Pre, &ctx).is_ok());

        let ctx = Context::background();
        assert!(run_hook(Some(&hook), HookPhase::Pre, &ctx).is_err());
    }
}
