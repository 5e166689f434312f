//! Access to the standard streams of a running command.
//!
//! [`CommandIo`] is how conversations and triggers get hold of a command's
//! pipes. [`ProcessStreams`] sits between a command and its watchers: it
//! copies the command's output into shared buffers, so the output can be
//! watched and still be collected afterwards.

use std::io;

use log::{debug, trace};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;

use crate::buffer::{SharedBuffer, SharedReader, SharedWriter};
use crate::error::{Result, StreamError, WatcherError};
use crate::tokenizer::Encoding;

/// A command whose standard streams can be taken.
///
/// Each stream can be taken once; later calls return `None`.
pub trait CommandIo {
    /// Output stream type.
    type Stdout: AsyncRead + Unpin + Send + 'static;
    /// Error stream type.
    type Stderr: AsyncRead + Unpin + Send + 'static;
    /// Input stream type.
    type Stdin: AsyncWrite + Unpin + Send + 'static;

    /// Take the command's standard output.
    fn take_stdout(&mut self) -> Option<Self::Stdout>;

    /// Take the command's standard error.
    fn take_stderr(&mut self) -> Option<Self::Stderr>;

    /// Take the command's standard input.
    fn take_stdin(&mut self) -> Option<Self::Stdin>;
}

impl CommandIo for Child {
    type Stdout = ChildStdout;
    type Stderr = ChildStderr;
    type Stdin = ChildStdin;

    fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }
}

/// Turn a missing stream into [`StreamError::Unavailable`].
pub(crate) fn require<T>(stream: Option<T>, name: &'static str) -> Result<T> {
    Ok(stream.ok_or(StreamError::Unavailable { stream: name })?)
}

/// How much output [`ProcessStreams`] keeps.
///
/// `None` keeps everything; `Some(n)` keeps only the newest `n` bytes, even
/// if they were never read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamWindows {
    /// Window for standard output.
    pub stdout: Option<usize>,

    /// Window for standard error.
    pub stderr: Option<usize>,
}

impl StreamWindows {
    /// Set the standard output window.
    pub fn stdout(mut self, window: usize) -> Self {
        self.stdout = Some(window);
        self
    }

    /// Set the standard error window.
    pub fn stderr(mut self, window: usize) -> Self {
        self.stderr = Some(window);
        self
    }
}

/// Output collected by [`ProcessStreams`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

type Copier = (&'static str, JoinHandle<io::Result<u64>>);

/// A command's streams routed through shared buffers.
///
/// Three copier tasks move bytes between the command and the buffers:
/// output and error into their buffers, and the input buffer into the
/// command. The buffer endpoints are handed out through [`CommandIo`].
///
/// # Example
///
/// ```rust,no_run
/// use std::process::Stdio;
///
/// use prompter::process::{CommandIo, ProcessStreams, StreamWindows};
/// use prompter::tokenizer::Encoding;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut child = tokio::process::Command::new("sh")
///     .stdin(Stdio::piped())
///     .stdout(Stdio::piped())
///     .stderr(Stdio::piped())
///     .spawn()?;
///
/// let mut streams = ProcessStreams::attach(&mut child, StreamWindows::default());
/// let stdout = streams.take_stdout();
/// // ... watch stdout, write to streams.take_stdin() ...
/// child.wait().await?;
/// streams.finish().await?;
/// let output = streams.output(Encoding::Utf8)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ProcessStreams {
    stdout: SharedBuffer,
    stderr: SharedBuffer,
    stdin: SharedBuffer,
    copiers: Vec<Copier>,
}

impl ProcessStreams {
    /// Take the command's streams and start copying.
    ///
    /// Streams the command does not have are left empty and closed. Must be
    /// called from within a Tokio runtime.
    pub fn attach<C: CommandIo>(command: &mut C, windows: StreamWindows) -> Self {
        let stdout = window_buffer(windows.stdout);
        let stderr = window_buffer(windows.stderr);
        let stdin = SharedBuffer::new();
        let mut copiers = Vec::with_capacity(3);

        match (command.take_stdout(), stdout.writer()) {
            (Some(source), Some(sink)) => copiers.push(("stdout", spawn_output(source, sink))),
            _ => stdout.close_writer(),
        }
        match (command.take_stderr(), stderr.writer()) {
            (Some(source), Some(sink)) => copiers.push(("stderr", spawn_output(source, sink))),
            _ => stderr.close_writer(),
        }
        match (stdin.reader(), command.take_stdin()) {
            (Some(source), Some(sink)) => copiers.push(("stdin", spawn_input(source, sink))),
            _ => stdin.close(),
        }

        debug!("process streams: started {} copiers", copiers.len());
        Self {
            stdout,
            stderr,
            stdin,
            copiers,
        }
    }

    /// Close the input stream and wait for every copier to finish.
    ///
    /// Output copiers finish when the command closes its output, usually on
    /// exit. Returns the first copier failure, after all copiers stopped.
    pub async fn finish(&mut self) -> Result<()> {
        self.stdin.close_writer();

        let mut first_error = None;
        for (stream, copier) in self.copiers.drain(..) {
            let outcome = match copier.await {
                Ok(Ok(bytes)) => {
                    trace!("process streams: {} copied {} bytes", stream, bytes);
                    continue;
                }
                Ok(Err(source)) => WatcherError::Copy { stream, source },
                Err(e) => WatcherError::from(e),
            };
            debug!("process streams: {} copier failed: {}", stream, outcome);
            first_error.get_or_insert(outcome);
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Decode everything the output buffers still hold.
    ///
    /// Call after [`finish`](Self::finish) for the complete output.
    pub fn output(&self, encoding: Encoding) -> Result<CapturedOutput> {
        Ok(CapturedOutput {
            stdout: encoding.decode(&self.stdout.buffered_data()?)?,
            stderr: encoding.decode(&self.stderr.buffered_data()?)?,
        })
    }
}

impl CommandIo for ProcessStreams {
    type Stdout = SharedReader;
    type Stderr = SharedReader;
    type Stdin = SharedWriter;

    fn take_stdout(&mut self) -> Option<SharedReader> {
        self.stdout.reader()
    }

    fn take_stderr(&mut self) -> Option<SharedReader> {
        self.stderr.reader()
    }

    fn take_stdin(&mut self) -> Option<SharedWriter> {
        self.stdin.writer()
    }
}

impl Drop for ProcessStreams {
    fn drop(&mut self) {
        for (_, copier) in &self.copiers {
            copier.abort();
        }
    }
}

fn window_buffer(window: Option<usize>) -> SharedBuffer {
    match window {
        Some(window) => SharedBuffer::with_window(window),
        None => SharedBuffer::new(),
    }
}

fn spawn_output<R>(mut source: R, mut sink: SharedWriter) -> JoinHandle<io::Result<u64>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let copied = tokio::io::copy(&mut source, &mut sink).await;
        sink.close();
        copied
    })
}

fn spawn_input<W>(mut source: SharedReader, mut sink: W) -> JoinHandle<io::Result<u64>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let copied = tokio::io::copy(&mut source, &mut sink).await?;
        sink.shutdown().await?;
        Ok(copied)
    })
}
