//! The invocation carrier handed to hooks and actions.
//!
//! A [`Context`] holds an optional deadline, a cancellation flag and a
//! type map of application values. The framework threads it through
//! unchanged; only hooks and actions look at it.
//!
//! ```rust
//! use std::time::Duration;
//! use komandir::Context;
//!
//! struct Database { url: String }
//!
//! let ctx = Context::background()
//!     .with_timeout(Duration::from_secs(30))
//!     .with_value(Database { url: "postgres://localhost".into() });
//!
//! let handle = ctx.cancel_handle();
//! assert!(!ctx.is_cancelled());
//! handle.cancel();
//! assert!(ctx.is_cancelled());
//!
//! let db = ctx.value_required::<Database>()?;
//! assert_eq!(db.url, "postgres://localhost");
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Type-keyed container for application values.
///
/// One value per type; inserting a second value of the same type replaces
/// the first.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, val: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(val))
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish_non_exhaustive()
    }
}

/// Clonable handle that cancels the [`Context`] it came from.
///
/// Safe to move to another thread (a signal handler, a watchdog).
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Cancellation, deadline and application values for one invocation.
#[derive(Debug, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
    values: Extensions,
}

impl Context {
    /// An empty context: no deadline, not cancelled, no values.
    pub fn background() -> Self {
        Self::default()
    }

    /// Sets the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets the deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn with_value<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.values.insert(value);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once the deadline, if any, has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `true` when cancelled or past the deadline.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    pub fn value<T: 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    /// Like [`value`](Self::value), but a missing value is an error.
    pub fn value_required<T: 'static>(&self) -> anyhow::Result<&T> {
        self.value::<T>().ok_or_else(|| {
            anyhow::anyhow!(
                "context value missing: type {} not found",
                std::any::type_name::<T>()
            )
        })
    }

    pub fn values(&self) -> &Extensions {
        &self.values
    }
}
