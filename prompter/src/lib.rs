//! # Prompter
//!
//! Async scripted conversations and output triggers for interactive processes.
//!
//! Prompter watches the output of a long-running command, splits it into
//! tokens and reacts to the ones it recognizes, similar to the classic
//! `expect` tool.
//!
//! ## Features
//!
//! - Incremental tokenizer on a Tokio task, safe with multi-byte characters
//!   split across reads
//! - Scripted replies ([`Conversation`]) and callbacks ([`Trigger`])
//! - Ordered scripts or unordered pattern sets, matched exactly, by regex or
//!   by predicate
//! - Shared growable buffers to watch and capture output at the same time
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::process::Stdio;
//!
//! use prompter::{Conversation, MatcherSet};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut child = tokio::process::Command::new("sh")
//!         .stdin(Stdio::piped())
//!         .stdout(Stdio::piped())
//!         .spawn()?;
//!
//!     let script = MatcherSet::ordered()
//!         .exact("Name?", "prompter\n")
//!         .exact("Continue? [y/n]", "y\n")
//!         .build();
//!
//!     let mut conversation = Conversation::from_command(&mut child, script)?;
//!     if let Some(handle) = conversation.start() {
//!         handle.await?;
//!     }
//!
//!     child.wait().await?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod error;
pub mod interactive;
pub mod matcher;
pub mod process;
pub mod tokenizer;

// Re-export main types for convenience
pub use buffer::SharedBuffer;
pub use error::{Error, Result};
pub use interactive::{Action, Conversation, Executor, Trigger};
pub use matcher::{MatcherSet, Prompt, Reply};
pub use process::{CommandIo, ProcessStreams};
pub use tokenizer::{Delimiter, Encoding, TokenConsumer, Tokenizer, TokenizerConfig, WatchHandle};
