//! Matcher sets and their lookup disciplines.

use std::sync::Arc;

use log::trace;

use super::prompt::{Prompt, Reply};
use crate::error::{MatchError, Result};

/// A prompt paired with the reply it triggers.
#[derive(Debug, Clone)]
pub struct Matcher<T> {
    prompt: Prompt,
    reply: Reply<T>,
}

impl<T> Matcher<T> {
    /// Create a matcher.
    pub fn new(prompt: Prompt, reply: impl Into<Reply<T>>) -> Self {
        Self {
            prompt,
            reply: reply.into(),
        }
    }

    /// The prompt this matcher waits for.
    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    /// The reply this matcher produces.
    pub fn reply(&self) -> &Reply<T> {
        &self.reply
    }

    /// Whether `token` is this matcher's prompt.
    pub fn matches(&self, token: &str) -> bool {
        self.prompt.matches(token)
    }
}

/// How a [`MatcherSet`] walks its matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// A script: only the next unused matcher is tested, and each matcher
    /// fires at most once, in order.
    Ordered,

    /// A pattern set: every matcher is tested on every token and may fire
    /// any number of times. A token matching several matchers is an error.
    Unordered,
}

/// Immutable list of matchers with a lookup discipline.
///
/// # Example
///
/// ```rust
/// use prompter::matcher::MatcherSet;
///
/// let mut script = MatcherSet::<String>::ordered()
///     .exact("login:", "admin\n")
///     .exact("Password:", "secret\n")
///     .build();
///
/// assert_eq!(script.lookup("Password:").unwrap(), None);
/// assert_eq!(script.lookup("login:").unwrap().as_deref(), Some("admin\n"));
/// assert_eq!(script.lookup("Password:").unwrap().as_deref(), Some("secret\n"));
/// ```
#[derive(Debug, Clone)]
pub struct MatcherSet<T> {
    matchers: Arc<[Matcher<T>]>,
    discipline: Discipline,
    cursor: usize,
}

impl<T> MatcherSet<T> {
    /// Start building an ordered set.
    pub fn ordered() -> MatcherSetBuilder<T> {
        MatcherSetBuilder::new(Discipline::Ordered)
    }

    /// Start building an unordered set.
    pub fn unordered() -> MatcherSetBuilder<T> {
        MatcherSetBuilder::new(Discipline::Unordered)
    }

    /// The set's discipline.
    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    /// All matchers, in insertion order.
    pub fn matchers(&self) -> &[Matcher<T>] {
        &self.matchers
    }

    /// Number of matchers.
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Whether the set has no matchers.
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Whether an ordered set has used every matcher.
    ///
    /// Always `false` for a non-empty unordered set.
    pub fn is_exhausted(&self) -> bool {
        match self.discipline {
            Discipline::Ordered => self.cursor >= self.matchers.len(),
            Discipline::Unordered => self.matchers.is_empty(),
        }
    }
}

impl<T: Clone> MatcherSet<T> {
    /// Find the reply for `token`.
    ///
    /// Returns `Ok(None)` when no matcher applies. Fails when the matching
    /// reply function fails or, for an unordered set, when more than one
    /// matcher applies.
    pub fn lookup(&mut self, token: &str) -> Result<Option<T>> {
        match self.discipline {
            Discipline::Ordered => self.lookup_ordered(token),
            Discipline::Unordered => self.lookup_unordered(token),
        }
    }

    fn lookup_ordered(&mut self, token: &str) -> Result<Option<T>> {
        let Some(matcher) = self.matchers.get(self.cursor) else {
            return Ok(None);
        };
        if !matcher.matches(token) {
            return Ok(None);
        }

        let reply = matcher.reply.produce(token)?;
        trace!("matcher: step {} matched {:?}", self.cursor, token);
        self.cursor += 1;
        Ok(Some(reply))
    }

    fn lookup_unordered(&self, token: &str) -> Result<Option<T>> {
        let mut found = self.matchers.iter().filter(|m| m.matches(token));
        let Some(matcher) = found.next() else {
            return Ok(None);
        };

        let others = found.count();
        if others > 0 {
            return Err(MatchError::Ambiguous {
                token: token.to_string(),
                matches: others + 1,
            }
            .into());
        }

        trace!("matcher: matched {:?}", token);
        Ok(Some(matcher.reply.produce(token)?))
    }
}

/// Fluent builder for a [`MatcherSet`].
#[derive(Debug)]
pub struct MatcherSetBuilder<T> {
    discipline: Discipline,
    matchers: Vec<Matcher<T>>,
}

impl<T> MatcherSetBuilder<T> {
    fn new(discipline: Discipline) -> Self {
        Self {
            discipline,
            matchers: Vec::new(),
        }
    }

    /// Add a matcher for tokens equal to `prompt`.
    pub fn exact(self, prompt: impl Into<String>, reply: impl Into<Reply<T>>) -> Self {
        self.add(Matcher::new(Prompt::exact(prompt), reply))
    }

    /// Add a matcher for tokens entirely matched by `pattern`.
    pub fn regex(self, pattern: &str, reply: impl Into<Reply<T>>) -> Result<Self> {
        Ok(self.add(Matcher::new(Prompt::regex(pattern)?, reply)))
    }

    /// Add a matcher for tokens accepted by `predicate`.
    pub fn predicate<F>(self, predicate: F, reply: impl Into<Reply<T>>) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.add(Matcher::new(Prompt::custom(predicate), reply))
    }

    /// Add a prebuilt matcher.
    pub fn add(mut self, matcher: Matcher<T>) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Freeze the matchers into a set.
    pub fn build(self) -> MatcherSet<T> {
        MatcherSet {
            matchers: self.matchers.into(),
            discipline: self.discipline,
            cursor: 0,
        }
    }
}
