//! Scripted conversations with a command.

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, StreamError};
use crate::matcher::MatcherSet;
use crate::process::{CommandIo, require};
use crate::tokenizer::{
    Delimiter, Encoding, TokenConsumer, Tokenizer, TokenizerConfig, WatchHandle,
};

/// Answers prompts by writing replies to the command's input.
///
/// A token with no reply is declined, so a prompt that arrives in pieces is
/// offered again once the rest of it is read. Replies are written as they
/// are; include a line ending if the command expects one.
pub struct ScriptedReply<W> {
    stdin: W,
    matchers: MatcherSet<String>,
    encoding: Encoding,
}

impl<W> ScriptedReply<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(stdin: W, matchers: MatcherSet<String>, encoding: Encoding) -> Self {
        Self {
            stdin,
            matchers,
            encoding,
        }
    }
}

impl<W> TokenConsumer for ScriptedReply<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn process_token(&mut self, token: &str) -> Result<bool> {
        let Some(reply) = self.matchers.lookup(token)? else {
            return Ok(false);
        };

        trace!("conversation: replying to {:?}", token);
        let bytes = self.encoding.encode(&reply)?;
        self.stdin.write_all(&bytes).await.map_err(StreamError::Write)?;
        self.stdin.flush().await.map_err(StreamError::Write)?;
        Ok(true)
    }
}

/// A scripted conversation: watches a command's output and answers its
/// prompts on its input.
///
/// # Example
///
/// ```rust,no_run
/// use std::process::Stdio;
///
/// use prompter::interactive::Conversation;
/// use prompter::matcher::MatcherSet;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut child = tokio::process::Command::new("passwd")
///     .stdin(Stdio::piped())
///     .stdout(Stdio::piped())
///     .spawn()?;
///
/// let script = MatcherSet::unordered()
///     .regex(r"(Current|New|Retype new) password: ", "hunter2\n")?
///     .build();
///
/// let mut conversation = Conversation::from_command(&mut child, script)?;
/// if let Some(handle) = conversation.start() {
///     handle.await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Conversation<R, W> {
    tokenizer: Tokenizer<R, ScriptedReply<W>>,
}

impl<R, W> Conversation<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a UTF-8 conversation over a command's output and input.
    pub fn new(stdout: R, stdin: W, matchers: MatcherSet<String>) -> Self {
        Self::with_config(stdout, stdin, matchers, TokenizerConfig::default())
    }

    /// Create a conversation with explicit configuration.
    ///
    /// Replies are encoded with the configured encoding.
    pub fn with_config(
        stdout: R,
        stdin: W,
        matchers: MatcherSet<String>,
        config: TokenizerConfig,
    ) -> Self {
        let reply = ScriptedReply::new(stdin, matchers, config.encoding);
        Self {
            tokenizer: Tokenizer::with_config(stdout, reply, config),
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

    /// Whether the conversation was already started.
    pub fn is_started(&self) -> bool {
        self.tokenizer.is_started()
    }

    /// Take a command's output and input for a UTF-8 conversation.
    pub fn from_command<C>(command: &mut C, matchers: MatcherSet<String>) -> Result<Self>
    where
        C: CommandIo<Stdout = R, Stdin = W>,
    {
        Self::from_command_with_config(command, matchers, TokenizerConfig::default())
    }

    /// Take a command's output and input with explicit configuration.
    ///
    /// Fails with [`StreamError::Unavailable`] if either stream was already
    /// taken or never piped.
    pub fn from_command_with_config<C>(
        command: &mut C,
        matchers: MatcherSet<String>,
        config: TokenizerConfig,
    ) -> Result<Self>
    where
        C: CommandIo<Stdout = R, Stdin = W>,
    {
        let stdout = require(command.take_stdout(), "stdout")?;
        let Some(stdin) = command.take_stdin() else {
            debug!("conversation: command has no stdin, dropping its stdout");
            drop(stdout);
            return Err(StreamError::Unavailable { stream: "stdin" }.into());
        };
        Ok(Self::with_config(stdout, stdin, matchers, config))
    }
}
