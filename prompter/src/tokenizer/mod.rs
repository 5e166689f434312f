//! Splitting process output into tokens.
//!
//! A [`Tokenizer`] owns the read side of a stream and runs a worker task that
//! decodes it, splits the text on a [`Delimiter`] and passes every token to a
//! [`TokenConsumer`].

mod config;
mod decoder;
mod delimiter;
mod watcher;

pub use config::{Encoding, TokenizerConfig};
pub use delimiter::{Delimiter, LINE_ENDING};
pub use watcher::{TokenConsumer, Tokenizer, WatchHandle};
