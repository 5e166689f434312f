//! Shared byte buffers for duplicating process streams.
//!
//! A [`SharedBuffer`] decouples the task that copies a process's output from
//! the task that watches it: the copier writes without ever waiting, and the
//! watcher reads at its own pace.

mod resize;
mod shared;

pub use resize::{MAX_BUFFER_SIZE, compute_resize};
pub use shared::{SharedBuffer, SharedReader, SharedWriter};
