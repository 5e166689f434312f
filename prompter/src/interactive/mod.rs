//! Reacting to prompts in command output.
//!
//! Two ready-made token consumers:
//!
//! - [`Conversation`] answers prompts by writing to the command's input.
//! - [`Trigger`] runs an [`Action`] whenever its prompt shows up.

mod conversation;
mod executor;
mod trigger;

pub use conversation::{Conversation, ScriptedReply};
pub use executor::{Action, Blocking, Executor, Inline, Spawned};
pub use trigger::{Callback, Trigger};
