//! Trigger actions and where they run.

use std::fmt;
use std::sync::Arc;

use log::debug;
use tokio::runtime::Handle;

use crate::error::{BoxError, CallbackError, Result};

/// Zero-argument callback fired by a [`Trigger`](super::Trigger).
#[derive(Clone)]
pub struct Action(Arc<dyn Fn() -> std::result::Result<(), BoxError> + Send + Sync>);

impl Action {
    /// Wrap a fallible callback.
    pub fn new<F, E>(f: F) -> Self
    where
        F: Fn() -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self(Arc::new(move || f().map_err(Into::into)))
    }

    /// Wrap a callback that cannot fail.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Arc::new(move || {
            f();
            Ok(())
        }))
    }

    /// Run the callback on the current thread.
    pub fn run(&self) -> Result<()> {
        Ok((self.0)().map_err(CallbackError::Action)?)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action(..)")
    }
}

/// Runs the actions of a [`Trigger`](super::Trigger).
///
/// An error returned from `execute` stops the trigger's tokenizer. Executors
/// that defer the action can only report failures to run it at all; the
/// action's own outcome is theirs to handle.
pub trait Executor: Send + Sync + 'static {
    /// Run or schedule `action`.
    fn execute(&self, action: Action) -> Result<()>;
}

/// Runs actions directly on the tokenizer task.
///
/// Action errors stop the tokenizer, and no further tokens are read while an
/// action runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, action: Action) -> Result<()> {
        action.run()
    }
}

/// Runs each action on its own Tokio task.
#[derive(Debug, Clone)]
pub struct Spawned {
    handle: Handle,
}

impl Spawned {
    /// Spawn actions onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawn actions onto the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Executor for Spawned {
    fn execute(&self, action: Action) -> Result<()> {
        self.handle.spawn(async move {
            if let Err(e) = action.run() {
                debug!("trigger: spawned action failed: {}", e);
            }
        });
        Ok(())
    }
}

/// Runs each action on the Tokio blocking thread pool.
///
/// Suited to actions that block, such as synchronous file or network I/O.
#[derive(Debug, Clone)]
pub struct Blocking {
    handle: Handle,
}

impl Blocking {
    /// Run actions on the given runtime's blocking pool.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Run actions on the current runtime's blocking pool.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Executor for Blocking {
    fn execute(&self, action: Action) -> Result<()> {
        self.handle.spawn_blocking(move || {
            if let Err(e) = action.run() {
                debug!("trigger: blocking action failed: {}", e);
            }
        });
        Ok(())
    }
}

impl<F> Executor for F
where
    F: Fn(Action) -> Result<()> + Send + Sync + 'static,
{
    fn execute(&self, action: Action) -> Result<()> {
        self(action)
    }
}
