//! Callbacks fired by command output.

use log::trace;
use tokio::io::AsyncRead;

use super::executor::{Action, Executor, Inline};
use crate::error::Result;
use crate::matcher::MatcherSet;
use crate::process::{CommandIo, require};
use crate::tokenizer::{Delimiter, TokenConsumer, Tokenizer, TokenizerConfig, WatchHandle};

/// Hands the action of every matching token to an [`Executor`].
pub struct Callback<E> {
    matchers: MatcherSet<Action>,
    executor: E,
}

impl<E: Executor> Callback<E> {
    pub fn new(matchers: MatcherSet<Action>, executor: E) -> Self {
        Self { matchers, executor }
    }
}

impl<E: Executor> TokenConsumer for Callback<E> {
    async fn process_token(&mut self, token: &str) -> Result<bool> {
        let Some(action) = self.matchers.lookup(token)? else {
            return Ok(false);
        };

        trace!("trigger: firing on {:?}", token);
        self.executor.execute(action)?;
        Ok(true)
    }
}

/// Watches a command's output and fires actions when prompts appear.
///
/// By default actions run [`Inline`] on the tokenizer task, and a failing
/// action stops the trigger. With a deferring executor such as
/// [`Spawned`](super::Spawned), action failures never reach the trigger.
///
/// # Example
///
/// ```rust,no_run
/// use std::process::Stdio;
///
/// use prompter::interactive::{Action, Trigger};
/// use prompter::matcher::MatcherSet;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut child = tokio::process::Command::new("make")
///     .stdout(Stdio::piped())
///     .spawn()?;
///
/// let alerts = MatcherSet::unordered()
///     .predicate(|line| line.contains("warning:"), Action::from_fn(|| eprintln!("warning seen")))
///     .build();
///
/// let mut trigger = Trigger::from_command(&mut child, alerts)?;
/// if let Some(handle) = trigger.start() {
///     handle.await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Trigger<R, E = Inline> {
    tokenizer: Tokenizer<R, Callback<E>>,
}

impl<R> Trigger<R, Inline>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Create a trigger running actions inline.
    pub fn new(stdout: R, matchers: MatcherSet<Action>) -> Self {
        Self::with_executor(stdout, matchers, Inline)
    }

    /// Take a command's output for a trigger running actions inline.
    pub fn from_command<C>(command: &mut C, matchers: MatcherSet<Action>) -> Result<Self>
    where
        C: CommandIo<Stdout = R>,
    {
        let stdout = require(command.take_stdout(), "stdout")?;
        Ok(Self::new(stdout, matchers))
    }
}

impl<R, E> Trigger<R, E>
where
    R: AsyncRead + Unpin + Send + 'static,
    E: Executor,
{
    /// Create a trigger with a custom executor.
    pub fn with_executor(stdout: R, matchers: MatcherSet<Action>, executor: E) -> Self {
        Self::with_config(stdout, matchers, executor, TokenizerConfig::default())
    }

    /// Create a trigger with a custom executor and configuration.
    pub fn with_config(
        stdout: R,
        matchers: MatcherSet<Action>,
        executor: E,
        config: TokenizerConfig,
    ) -> Self {
        Self {
            tokenizer: Tokenizer::with_config(stdout, Callback::new(matchers, executor), config),
        }
    }

    /// Start splitting output by line. See [`Tokenizer::start`].
    pub fn start(&mut self) -> Option<WatchHandle> {
        self.tokenizer.start()
    }

    /// Start splitting output on `delimiter`. See [`Tokenizer::start_with`].
    pub fn start_with(&mut self, delimiter: Delimiter) -> Option<WatchHandle> {
        self.tokenizer.start_with(delimiter)
    }

    pub fn is_started(&self) -> bool {
        self.tokenizer.is_started()
    }
}
