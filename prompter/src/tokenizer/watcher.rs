//! Stream tokenizer running on its own worker task.
//!
//! The worker reads whatever the stream has, decodes it, splits the text on a
//! delimiter and hands every token to a [`TokenConsumer`]. A consumer that
//! cannot handle the trailing, undelimited part of the text yet declines it,
//! and gets it back later extended with whatever arrived in the meantime.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::BytesMut;
use futures_util::FutureExt;
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use super::config::TokenizerConfig;
use super::decoder::Decoder;
use super::delimiter::Delimiter;
use crate::error::{Result, StreamError, WatcherError};

/// Receives tokens from a [`Tokenizer`].
///
/// Calls never overlap: the next token is offered only after the previous
/// call completed.
pub trait TokenConsumer: Send + 'static {
    /// Handle one token.
    ///
    /// Return `Ok(true)` when the token is fully handled. Return `Ok(false)`
    /// when more output is needed: if the token was the trailing,
    /// undelimited text of a pass, it is offered again once more text
    /// arrives, with that text appended.
    ///
    /// An error stops the tokenizer and is reported through its
    /// [`WatchHandle`].
    fn process_token(&mut self, token: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Outcome of one batch of reads.
enum Batch {
    /// Data was read and the stream is still open.
    Data,
    /// Data was read, then the stream ended.
    LastData,
    /// The stream ended without new data.
    Ended,
}

struct Worker<R, C> {
    reader: R,
    consumer: C,
    config: TokenizerConfig,
}

impl<R, C> Worker<R, C>
where
    R: AsyncRead + Unpin + Send + 'static,
    C: TokenConsumer,
{
    async fn run(mut self, delimiter: Delimiter) -> Result<()> {
        let mut decoder = Decoder::new(self.config.encoding, self.config.strip_ansi);
        let mut raw = BytesMut::with_capacity(self.config.read_buffer_size);
        let mut text = String::with_capacity(self.config.token_capacity);

        loop {
            let batch = self.read_batch(&mut decoder, &mut raw, &mut text).await?;
            if matches!(batch, Batch::Ended) {
                break;
            }

            offer_tokens(delimiter.regex(), &mut text, &mut self.consumer).await?;

            if matches!(batch, Batch::LastData) {
                break;
            }
        }

        if !text.is_empty() || !raw.is_empty() {
            debug!(
                "tokenizer: end of stream, dropping {} undelimited chars and {} undecoded bytes",
                text.chars().count(),
                raw.len()
            );
        } else {
            debug!("tokenizer: end of stream");
        }
        Ok(())
    }

    /// Wait for data, then keep reading while more is immediately available.
    async fn read_batch(
        &mut self,
        decoder: &mut Decoder,
        raw: &mut BytesMut,
        text: &mut String,
    ) -> Result<Batch> {
        if self.read_chunk(raw).await? == 0 {
            return Ok(Batch::Ended);
        }
        decoder.decode(raw, text)?;

        while let Some(read) = self.read_chunk(raw).now_or_never() {
            if read? == 0 {
                return Ok(Batch::LastData);
            }
            decoder.decode(raw, text)?;
        }
        Ok(Batch::Data)
    }

    async fn read_chunk(&mut self, raw: &mut BytesMut) -> Result<usize> {
        raw.reserve(self.config.read_buffer_size);
        let n = self.reader.read_buf(raw).await.map_err(StreamError::Read)?;
        trace!("tokenizer: read {} bytes", n);
        Ok(n)
    }
}

/// Offer every delimited token in `text`, then the trailing remainder.
async fn offer_tokens<C: TokenConsumer>(
    delimiter: &regex::Regex,
    text: &mut String,
    consumer: &mut C,
) -> Result<()> {
    let bounds: Vec<(usize, usize)> = delimiter
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut start = 0;
    for (from, to) in bounds {
        trace!("tokenizer: token {:?}", &text[start..from]);
        consumer.process_token(&text[start..from]).await?;
        start = to;
    }

    if start < text.len() {
        trace!("tokenizer: partial token {:?}", &text[start..]);
        if consumer.process_token(&text[start..]).await? {
            text.clear();
        } else {
            text.drain(..start);
        }
    } else {
        text.clear();
    }
    Ok(())
}

/// Splits a byte stream into tokens and feeds them to a consumer.
///
/// # Example
///
/// ```rust,no_run
/// use prompter::tokenizer::{TokenConsumer, Tokenizer};
///
/// struct Printer;
///
/// impl TokenConsumer for Printer {
///     async fn process_token(&mut self, token: &str) -> prompter::error::Result<bool> {
///         println!("{token}");
///         Ok(true)
///     }
/// }
///
/// # async fn example(stdout: tokio::process::ChildStdout) -> Result<(), prompter::Error> {
/// let mut tokenizer = Tokenizer::new(stdout, Printer);
/// if let Some(handle) = tokenizer.start() {
///     handle.await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Tokenizer<R, C> {
    worker: Option<Worker<R, C>>,
}

impl<R, C> Tokenizer<R, C>
where
    R: AsyncRead + Unpin + Send + 'static,
    C: TokenConsumer,
{
    /// Create a tokenizer for a UTF-8 stream.
    pub fn new(reader: R, consumer: C) -> Self {
        Self::with_config(reader, consumer, TokenizerConfig::default())
    }

    /// Create a tokenizer with explicit configuration.
    pub fn with_config(reader: R, consumer: C, config: TokenizerConfig) -> Self {
        Self {
            worker: Some(Worker {
                reader,
                consumer,
                config,
            }),
        }
    }

    /// Start tokenizing by line (`\r\n`, `\r` or `\n`).
    ///
    /// See [`start_with`](Self::start_with).
    pub fn start(&mut self) -> Option<WatchHandle> {
        self.start_with(Delimiter::line())
    }

    /// Spawn the worker, splitting tokens on `delimiter`.
    ///
    /// Only the first call starts anything; later calls return `None`.
    /// Must be called from within a Tokio runtime.
    pub fn start_with(&mut self, delimiter: Delimiter) -> Option<WatchHandle> {
        let Some(worker) = self.worker.take() else {
            debug!("tokenizer: already started");
            return None;
        };

        debug!("tokenizer: starting, delimiter {:?}", delimiter.as_str());
        Some(WatchHandle::new(tokio::spawn(worker.run(delimiter))))
    }

    /// Whether [`start`](Self::start) was already called.
    pub fn is_started(&self) -> bool {
        self.worker.is_none()
    }
}

/// Completion handle of a tokenizer worker.
///
/// Awaiting the handle yields `Ok(())` when the stream ended, or the error
/// that stopped the worker. The outcome is delivered once; waiting again
/// afterwards fails with [`WatcherError::AlreadyJoined`].
#[derive(Debug)]
pub struct WatchHandle {
    task: Option<JoinHandle<Result<()>>>,
}

impl WatchHandle {
    fn new(task: JoinHandle<Result<()>>) -> Self {
        Self { task: Some(task) }
    }

    /// Ask the worker to stop at its next suspension point.
    ///
    /// A reader that never yields cannot be interrupted this way; closing
    /// the underlying stream always stops the worker.
    pub fn cancel(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    /// Whether the worker has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the worker, giving up after `timeout`.
    ///
    /// On timeout the worker keeps running and the handle can be awaited
    /// again.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, &mut *self).await {
            Ok(result) => result,
            Err(_) => Err(WatcherError::Timeout(timeout).into()),
        }
    }
}

impl Future for WatchHandle {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(task) = self.task.as_mut() else {
            return Poll::Ready(Err(WatcherError::AlreadyJoined.into()));
        };

        let joined = ready!(Pin::new(task).poll(cx));
        self.task = None;
        Poll::Ready(joined.unwrap_or_else(|e| Err(WatcherError::from(e).into())))
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tokio::io::AsyncWriteExt;
    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::error::{CallbackError, Error};
    use crate::tokenizer::Encoding;

    const PAUSE: Duration = Duration::from_millis(5);
    const LIMIT: Duration = Duration::from_secs(3);

    /// Records every offered token and declines the configured ones.
    #[derive(Clone, Default)]
    struct Recorder {
        tokens: Arc<Mutex<Vec<String>>>,
        declined: Vec<String>,
        fail_on: Option<String>,
    }

    impl Recorder {
        fn declining(tokens: &[&str]) -> Self {
            Self {
                declined: tokens.iter().map(|t| t.to_string()).collect(),
                ..Default::default()
            }
        }

        fn tokens(&self) -> Vec<String> {
            self.tokens.lock().unwrap().clone()
        }
    }

    impl TokenConsumer for Recorder {
        async fn process_token(&mut self, token: &str) -> Result<bool> {
            if self.fail_on.as_deref() == Some(token) {
                return Err(CallbackError::Reply("boom".into()).into());
            }
            self.tokens.lock().unwrap().push(token.to_string());
            Ok(!self.declined.iter().any(|d| d == token))
        }
    }

    /// Mock stream delivering each chunk in its own read, with a pause in
    /// between so that every chunk gets its own tokenization pass.
    fn paced(chunks: &[&[u8]]) -> Mock {
        let mut builder = Builder::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                builder.wait(PAUSE);
            }
            builder.read(chunk);
        }
        builder.build()
    }

    async fn run(reader: Mock, delimiter: Delimiter, recorder: &Recorder) -> Result<()> {
        let mut tokenizer = Tokenizer::new(reader, recorder.clone());
        let mut handle = tokenizer.start_with(delimiter).unwrap();
        handle.wait_timeout(LIMIT).await
    }

    #[tokio::test]
    async fn test_complete_tokens() {
        let recorder = Recorder::default();
        let reader = paced(&[b"Token1\n", b"Token2\r", b"Token3\r\n"]);
        run(reader, Delimiter::line(), &recorder).await.unwrap();
        assert_eq!(recorder.tokens(), vec!["Token1", "Token2", "Token3"]);
    }

    #[tokio::test]
    async fn test_mixed_line_endings_single_read() {
        let recorder = Recorder::default();
        let reader = Builder::new().read(b"a\r\nb\rc\nd\r\n\ne\n").build();
        run(reader, Delimiter::line(), &recorder).await.unwrap();
        assert_eq!(recorder.tokens(), vec!["a", "b", "c", "d", "", "e"]);
    }

    #[tokio::test]
    async fn test_custom_delimiter() {
        let recorder = Recorder::default();
        let reader = paced(&[b"Token1\n", b"Token2\r", b"Token3\r\n"]);
        run(reader, Delimiter::new("[0-9]").unwrap(), &recorder)
            .await
            .unwrap();
        assert_eq!(
            recorder.tokens(),
            vec!["Token", "\n", "Token", "\r", "Token", "\r\n"]
        );
    }

    #[tokio::test]
    async fn test_declined_tokens_accumulate() {
        let recorder = Recorder::declining(&["\r", "\n"]);
        let reader = paced(&[b"Token1\n", b"Token2\r", b"Token3\r\n"]);
        run(reader, Delimiter::new("[0-9]").unwrap(), &recorder)
            .await
            .unwrap();
        assert_eq!(
            recorder.tokens(),
            vec!["Token", "\n", "\nToken", "\r", "\rToken", "\r\n"]
        );
    }

    #[tokio::test]
    async fn test_empty_tokens() {
        let recorder = Recorder::default();
        let reader = paced(&[b"Token1\n", b"\r", b"\r\n\r\n\n\r"]);
        run(reader, Delimiter::line(), &recorder).await.unwrap();
        assert_eq!(recorder.tokens(), vec!["Token1", "", "", "", "", ""]);
    }

    #[tokio::test]
    async fn test_token_longer_than_read_buffer() {
        let recorder = Recorder::default();
        let line = format!("{}\n", "a".repeat(65535));
        let reader = Builder::new().read(line.as_bytes()).build();
        run(reader, Delimiter::line(), &recorder).await.unwrap();
        assert_eq!(recorder.tokens(), vec!["a".repeat(65535)]);
    }

    #[tokio::test]
    async fn test_split_multibyte_char() {
        let recorder = Recorder::default();
        let euro = "€".as_bytes();
        let reader = paced(&[&euro[..2], &euro[2..]]);
        run(reader, Delimiter::line(), &recorder).await.unwrap();
        assert_eq!(recorder.tokens(), vec!["€"]);
    }

    #[tokio::test]
    async fn test_mixed_width_chars() {
        let recorder = Recorder::default();
        let reader = Builder::new().read("€a\nbЂञ\n𡥋".as_bytes()).build();
        run(reader, Delimiter::line(), &recorder).await.unwrap();
        assert_eq!(recorder.tokens(), vec!["€a", "bЂञ", "𡥋"]);
    }

    #[tokio::test]
    async fn test_read_error_fails_handle() {
        let recorder = Recorder::default();
        let reader = Builder::new()
            .read(b"first\n")
            .wait(PAUSE)
            .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let err = run(reader, Delimiter::line(), &recorder).await.unwrap_err();
        assert!(matches!(err, Error::Stream(StreamError::Read(_))));
        assert_eq!(recorder.tokens(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_consumer_error_stops_worker() {
        let recorder = Recorder {
            fail_on: Some("boom".to_string()),
            ..Default::default()
        };
        let reader = Builder::new().read(b"ok\nboom\nafter\n").build();
        let err = run(reader, Delimiter::line(), &recorder).await.unwrap_err();
        assert!(matches!(err, Error::Callback(CallbackError::Reply(_))));
        assert_eq!(recorder.tokens(), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_impossible_delimiter() {
        let recorder = Recorder::declining(&["Token1\n", "Token1\nToken2\r"]);
        let reader = paced(&[b"Token1\n", b"Token2\r", b"Token3\r\n"]);
        run(reader, Delimiter::new("$^").unwrap(), &recorder)
            .await
            .unwrap();
        assert_eq!(
            recorder.tokens(),
            vec!["Token1\n", "Token1\nToken2\r", "Token1\nToken2\rToken3\r\n"]
        );
    }

    #[tokio::test]
    async fn test_declined_text_not_reoffered_at_end() {
        let recorder = Recorder::declining(&["Token1\n", "Token1\nToken2\n"]);
        let reader = paced(&[b"Token1\n", b"Token2\n"]);
        run(reader, Delimiter::new(" ").unwrap(), &recorder)
            .await
            .unwrap();
        assert_eq!(recorder.tokens(), vec!["Token1\n", "Token1\nToken2\n"]);
    }

    #[tokio::test]
    async fn test_trailing_delimiter_before_end() {
        let recorder = Recorder::default();
        let reader = Builder::new().read(b"Token1\n\r").build();
        run(reader, Delimiter::line(), &recorder).await.unwrap();
        assert_eq!(recorder.tokens(), vec!["Token1", ""]);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let recorder = Recorder::default();
        let reader = Builder::new().read(b"once\n").build();
        let mut tokenizer = Tokenizer::new(reader, recorder.clone());

        let handle = tokenizer.start();
        assert!(handle.is_some());
        assert!(tokenizer.is_started());
        assert!(tokenizer.start().is_none());
        assert!(tokenizer.start_with(Delimiter::line()).is_none());

        handle.unwrap().await.unwrap();
        assert_eq!(recorder.tokens(), vec!["once"]);
    }

    #[tokio::test]
    async fn test_cancel() {
        let (mut process, stdout) = tokio::io::duplex(64);
        let recorder = Recorder::default();
        let mut tokenizer = Tokenizer::new(stdout, recorder.clone());
        let mut handle = tokenizer.start().unwrap();

        process.write_all(b"before\n").await.unwrap();
        tokio::time::sleep(PAUSE).await;
        handle.cancel();

        let err = handle.wait_timeout(LIMIT).await.unwrap_err();
        assert!(matches!(err, Error::Watcher(WatcherError::Cancelled)));
        assert_eq!(recorder.tokens(), vec!["before"]);
    }

    #[tokio::test]
    async fn test_closing_stream_finishes_worker() {
        let (mut process, stdout) = tokio::io::duplex(64);
        let recorder = Recorder::default();
        let mut tokenizer = Tokenizer::new(stdout, recorder.clone());
        let mut handle = tokenizer.start().unwrap();

        process.write_all(b"line\n").await.unwrap();
        drop(process);

        handle.wait_timeout(LIMIT).await.unwrap();
        assert!(handle.is_finished());
        assert_eq!(recorder.tokens(), vec!["line"]);
    }

    #[tokio::test]
    async fn test_wait_timeout_keeps_handle() {
        let (process, stdout) = tokio::io::duplex(64);
        let mut tokenizer = Tokenizer::new(stdout, Recorder::default());
        let mut handle = tokenizer.start().unwrap();

        let err = handle.wait_timeout(PAUSE).await.unwrap_err();
        assert!(matches!(err, Error::Watcher(WatcherError::Timeout(_))));

        drop(process);
        handle.wait_timeout(LIMIT).await.unwrap();
    }

    #[tokio::test]
    async fn test_outcome_delivered_once() {
        let reader = Builder::new().read(b"a\n").build();
        let mut tokenizer = Tokenizer::new(reader, Recorder::default());
        let mut handle = tokenizer.start().unwrap();

        handle.wait_timeout(LIMIT).await.unwrap();
        assert!(handle.is_finished());

        let err = handle.wait_timeout(LIMIT).await.unwrap_err();
        assert!(matches!(err, Error::Watcher(WatcherError::AlreadyJoined)));

        handle.cancel();
        assert!(handle.is_finished());
        let err = (&mut handle).await.unwrap_err();
        assert!(matches!(err, Error::Watcher(WatcherError::AlreadyJoined)));
    }

    #[tokio::test]
    async fn test_malformed_input_fails_handle() {
        let reader = Builder::new().read(b"ok\n\xFF\n").build();
        let err = run(reader, Delimiter::line(), &Recorder::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Stream(StreamError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_latin1_and_ansi_stripping() {
        let recorder = Recorder::default();
        let config = TokenizerConfig::default()
            .encoding(Encoding::Latin1)
            .strip_ansi(true);
        let reader = Builder::new().read(b"\x1b[1mcaf\xE9\x1b[0m\n").build();
        let mut tokenizer = Tokenizer::with_config(reader, recorder.clone(), config);
        tokenizer.start().unwrap().await.unwrap();
        assert_eq!(recorder.tokens(), vec!["café"]);
    }

    #[tokio::test]
    async fn test_small_read_buffer() {
        let recorder = Recorder::default();
        let config = TokenizerConfig::default().read_buffer_size(3);
        let reader = Builder::new().read("naïve\nrésumé\n".as_bytes()).build();
        let mut tokenizer = Tokenizer::with_config(reader, recorder.clone(), config);
        tokenizer.start().unwrap().await.unwrap();
        assert_eq!(recorder.tokens(), vec!["naïve", "résumé"]);
    }

    mod generated {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn test_any_mix_of_line_endings(
                tokens in prop::collection::vec("[a-zA-Z0-9 €]{1,8}", 1..12),
                endings in prop::collection::vec(prop::sample::select(vec!["\n", "\r", "\r\n"]), 12),
            ) {
                let mut input = String::new();
                for (token, ending) in tokens.iter().zip(&endings) {
                    input.push_str(token);
                    input.push_str(ending);
                }

                let recorder = Recorder::default();
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                runtime
                    .block_on(async {
                        let reader = Builder::new().read(input.as_bytes()).build();
                        run(reader, Delimiter::line(), &recorder).await
                    })
                    .unwrap();

                prop_assert_eq!(recorder.tokens(), tokens);
            }
        }
    }
}
