//! Matching tokens to replies.
//!
//! A [`MatcherSet`] is built once and never changes. It is either a script
//! ([`Discipline::Ordered`]) walked one step at a time, or a set of
//! independent patterns ([`Discipline::Unordered`]) that may each fire any
//! number of times.

mod prompt;
mod set;

pub use prompt::{Prompt, PromptFn, Reply, ReplyFn};
pub use set::{Discipline, Matcher, MatcherSet, MatcherSetBuilder};
