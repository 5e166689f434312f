//! Prompt predicates and reply producers.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{BoxError, CallbackError, MatchError, Result};

/// Custom prompt predicate.
pub type PromptFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Token-derived reply function.
pub type ReplyFn<T> = Arc<dyn Fn(&str) -> std::result::Result<T, BoxError> + Send + Sync>;

/// Decides whether a token is the prompt a matcher waits for.
#[derive(Clone)]
pub enum Prompt {
    /// The token equals this string.
    Exact(String),

    /// The whole token matches this regex.
    Pattern(Regex),

    /// Caller-provided predicate.
    Custom(PromptFn),
}

impl Prompt {
    /// Match tokens equal to `text`.
    pub fn exact(text: impl Into<String>) -> Self {
        Prompt::Exact(text.into())
    }

    /// Match tokens entirely matched by `pattern`.
    ///
    /// The pattern is anchored at both ends, so `"[0-9]+"` matches `"42"` but
    /// not `"v42"`.
    pub fn regex(pattern: &str) -> Result<Self> {
        let anchored = format!("^(?:{})$", pattern);
        Ok(Prompt::Pattern(
            Regex::new(&anchored).map_err(MatchError::InvalidPattern)?,
        ))
    }

    /// Match tokens accepted by `predicate`.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Prompt::Custom(Arc::new(predicate))
    }

    /// Check a token against this prompt.
    pub fn matches(&self, token: &str) -> bool {
        match self {
            Prompt::Exact(text) => text == token,
            Prompt::Pattern(regex) => regex.is_match(token),
            Prompt::Custom(predicate) => predicate(token),
        }
    }
}

impl fmt::Debug for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prompt::Exact(text) => f.debug_tuple("Exact").field(text).finish(),
            Prompt::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Prompt::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// What a matcher answers once its prompt is seen.
pub enum Reply<T> {
    /// The same value every time.
    Fixed(T),

    /// A value computed from the matched token.
    Dynamic(ReplyFn<T>),
}

impl<T> Reply<T> {
    /// Reply with `f(token)`.
    pub fn with<F>(f: F) -> Self
    where
        F: Fn(&str) -> T + Send + Sync + 'static,
    {
        Reply::Dynamic(Arc::new(move |token| Ok(f(token))))
    }

    /// Reply with `f(token)`, which may fail.
    ///
    /// A failure stops the tokenizer that asked for the reply.
    pub fn try_with<F, E>(f: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Reply::Dynamic(Arc::new(move |token| f(token).map_err(Into::into)))
    }
}

impl<T: Clone> Reply<T> {
    /// Produce the reply for a matched token.
    pub fn produce(&self, token: &str) -> Result<T> {
        match self {
            Reply::Fixed(value) => Ok(value.clone()),
            Reply::Dynamic(f) => Ok(f(token).map_err(CallbackError::Reply)?),
        }
    }
}

impl<T: Clone> Clone for Reply<T> {
    fn clone(&self) -> Self {
        match self {
            Reply::Fixed(value) => Reply::Fixed(value.clone()),
            Reply::Dynamic(f) => Reply::Dynamic(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Reply::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl<T> From<T> for Reply<T> {
    fn from(value: T) -> Self {
        Reply::Fixed(value)
    }
}

impl From<&str> for Reply<String> {
    fn from(value: &str) -> Self {
        Reply::Fixed(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_prompt() {
        let prompt = Prompt::exact("Password:");
        assert!(prompt.matches("Password:"));
        assert!(!prompt.matches("Password: "));
        assert!(!prompt.matches("password:"));
    }

    #[test]
    fn test_regex_prompt_is_anchored() {
        let prompt = Prompt::regex(r"[0-9]+|ok").unwrap();
        assert!(prompt.matches("42"));
        assert!(prompt.matches("ok"));
        assert!(!prompt.matches("v42"));
        assert!(!prompt.matches("ok!"));
    }

    #[test]
    fn test_invalid_regex_prompt() {
        assert!(matches!(
            Prompt::regex("[unclosed"),
            Err(crate::Error::Match(MatchError::InvalidPattern(_)))
        ));
    }

    #[test]
    fn test_custom_prompt() {
        let prompt = Prompt::custom(|token| token.ends_with("$ "));
        assert!(prompt.matches("user@host:~$ "));
        assert!(!prompt.matches("done"));
    }

    #[test]
    fn test_dynamic_reply() {
        let reply: Reply<String> = Reply::with(|token| token.to_uppercase());
        assert_eq!(reply.produce("abc").unwrap(), "ABC");

        let reply: Reply<u32> = Reply::try_with(|token: &str| token.parse::<u32>());
        assert_eq!(reply.produce("7").unwrap(), 7);
        assert!(matches!(
            reply.produce("seven"),
            Err(crate::Error::Callback(CallbackError::Reply(_)))
        ));
    }

    #[test]
    fn test_reply_from_str() {
        let reply: Reply<String> = "yes\n".into();
        assert_eq!(reply.produce("anything").unwrap(), "yes\n");
    }
}
