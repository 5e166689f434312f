//! Growable byte queue shared between one writer and one reader.
//!
//! Output captured from a process is written here by a copier and read back
//! by whoever watches it, either through blocking `std::io::Read` or through
//! `tokio::io::AsyncRead`. The writer never waits for the reader: the ring
//! grows instead.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use log::trace;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::resize::compute_resize;
use crate::error::BufferError;

const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Ring storage and cursors.
///
/// `start` is the oldest byte still inside the window, `read` the first
/// unread byte and `write` the first free slot. The ring is empty when
/// `read == write` and one slot always stays free so that a full ring is
/// distinguishable from an empty one.
#[derive(Debug)]
struct Ring {
    data: Vec<u8>,
    start: usize,
    read: usize,
    write: usize,
    window: usize,
    reader_open: bool,
    writer_open: bool,
    reader_taken: bool,
    writer_taken: bool,
    read_waker: Option<Waker>,
}

impl Ring {
    fn new(window: usize, buffer_size: usize) -> Self {
        Self {
            data: vec![0; buffer_size],
            start: 0,
            read: 0,
            write: 0,
            window,
            reader_open: true,
            writer_open: true,
            reader_taken: false,
            writer_taken: false,
            read_waker: None,
        }
    }

    fn distance(&self, from: usize, to: usize) -> usize {
        if to >= from {
            to - from
        } else {
            to + self.data.len() - from
        }
    }

    fn advance(&self, position: usize, n: usize) -> usize {
        (position + n) % self.data.len()
    }

    /// Bytes inside the window, read or not.
    fn buffered_size(&self) -> usize {
        self.distance(self.start, self.write)
    }

    /// Bytes not read yet.
    fn read_size(&self) -> usize {
        self.distance(self.read, self.write)
    }

    /// Free slots available to the writer.
    fn write_size(&self) -> usize {
        let len = self.data.len();
        (self.start + len - self.write - 1) % len
    }

    fn copy_out(&self, position: usize, dst: &mut [u8]) {
        let first = dst.len().min(self.data.len() - position);
        dst[..first].copy_from_slice(&self.data[position..position + first]);
        let rest = dst.len() - first;
        dst[first..].copy_from_slice(&self.data[..rest]);
    }

    fn copy_in(&mut self, position: usize, src: &[u8]) {
        let first = src.len().min(self.data.len() - position);
        self.data[position..position + first].copy_from_slice(&src[..first]);
        let rest = src.len() - first;
        self.data[..rest].copy_from_slice(&src[first..]);
    }

    fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.read_size());
        self.copy_out(self.read, &mut dst[..n]);
        self.read = self.advance(self.read, n);
        n
    }

    fn write_from(&mut self, src: &[u8]) -> Result<(), BufferError> {
        if src.is_empty() || self.window == 0 {
            return Ok(());
        }

        // only the newest `window` bytes of an oversized write survive
        let src = if src.len() > self.window {
            &src[src.len() - self.window..]
        } else {
            src
        };

        if src.len() > self.write_size() {
            self.make_space(src.len())?;
        }
        self.copy_in(self.write, src);
        self.write = self.advance(self.write, src.len());

        let buffered = self.buffered_size();
        if buffered > self.window {
            self.advance_start(buffered - self.window);
        }
        Ok(())
    }

    /// Make room for `needed` bytes by dropping data outside the window or by
    /// growing the ring.
    fn make_space(&mut self, needed: usize) -> Result<(), BufferError> {
        let capacity = self.data.len() - 1;
        if needed < capacity && capacity > self.window {
            let missing = needed - self.write_size();
            self.advance_start(missing);
            Ok(())
        } else {
            self.resize(needed)
        }
    }

    fn resize(&mut self, needed: usize) -> Result<(), BufferError> {
        let length = self.data.len();
        let exceeded = BufferError::CapacityExceeded { needed, length };

        let new_length = compute_resize(self.write_size(), needed, length).ok_or(exceeded)?;

        let mut data = Vec::new();
        data.try_reserve_exact(new_length)
            .map_err(|_| BufferError::CapacityExceeded { needed, length })?;
        data.resize(new_length, 0);

        let buffered = self.buffered_size();
        let unread = self.read_size();
        self.copy_out(self.start, &mut data[..buffered]);

        trace!("shared buffer resized {} -> {}", length, new_length);

        self.data = data;
        self.start = 0;
        self.read = buffered - unread;
        self.write = buffered;
        Ok(())
    }

    fn advance_start(&mut self, n: usize) {
        let consumed = self.distance(self.start, self.read);
        self.start = self.advance(self.start, n);
        // unread data fell out of the window
        if n > consumed {
            self.read = self.start;
        }
    }

    fn snapshot(&self) -> Vec<u8> {
        let mut out = vec![0; self.buffered_size()];
        self.copy_out(self.start, &mut out);
        out
    }

    fn wait_for_input(&self) -> bool {
        self.read_size() == 0 && self.reader_open && self.writer_open
    }
}

#[derive(Debug)]
struct Shared {
    ring: Mutex<Ring>,
    readable: Condvar,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, Ring>, BufferError> {
        self.ring.lock().map_err(|_| BufferError::Poisoned)
    }

    /// Release the lock and wake a reader blocked on either side.
    fn notify(&self, mut ring: MutexGuard<'_, Ring>) {
        let waker = ring.read_waker.take();
        drop(ring);
        self.readable.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn close_writer(&self) {
        let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        ring.writer_open = false;
        self.notify(ring);
    }

    fn close_reader(&self) {
        let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        ring.reader_open = false;
        self.notify(ring);
    }
}

/// Shared byte queue with one [`SharedWriter`] and one [`SharedReader`].
///
/// # Example
///
/// ```rust
/// use std::io::{Read, Write};
/// use prompter::buffer::SharedBuffer;
///
/// let buffer = SharedBuffer::new();
/// let mut writer = buffer.writer().unwrap();
/// let mut reader = buffer.reader().unwrap();
///
/// writer.write_all(b"hello").unwrap();
/// writer.close();
///
/// let mut out = String::new();
/// reader.read_to_string(&mut out).unwrap();
/// assert_eq!(out, "hello");
/// ```
#[derive(Debug, Clone)]
pub struct SharedBuffer {
    shared: Arc<Shared>,
}

impl SharedBuffer {
    /// Create a buffer that keeps everything written until it is read.
    pub fn new() -> Self {
        Self::with_window(usize::MAX)
    }

    /// Create a buffer that keeps at most the newest `window` bytes.
    ///
    /// Older bytes are discarded, read or not, once the window overflows.
    pub fn with_window(window: usize) -> Self {
        Self::with_capacity(window, DEFAULT_BUFFER_SIZE)
    }

    /// Create a buffer with an explicit initial ring length.
    ///
    /// `buffer_size` is raised to 2 if smaller, since one slot always stays
    /// free.
    pub fn with_capacity(window: usize, buffer_size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                ring: Mutex::new(Ring::new(window, buffer_size.max(2))),
                readable: Condvar::new(),
            }),
        }
    }

    /// Take the writer endpoint. Returns `None` if it was already taken.
    pub fn writer(&self) -> Option<SharedWriter> {
        let mut ring = self.shared.lock().ok()?;
        if ring.writer_taken {
            return None;
        }
        ring.writer_taken = true;
        Some(SharedWriter {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Take the reader endpoint. Returns `None` if it was already taken.
    pub fn reader(&self) -> Option<SharedReader> {
        let mut ring = self.shared.lock().ok()?;
        if ring.reader_taken {
            return None;
        }
        ring.reader_taken = true;
        Some(SharedReader {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Every byte still inside the window, including bytes already read.
    pub fn buffered_data(&self) -> Result<Vec<u8>, BufferError> {
        Ok(self.shared.lock()?.snapshot())
    }

    /// Number of bytes the ring can hold without growing.
    pub fn capacity(&self) -> Result<usize, BufferError> {
        Ok(self.shared.lock()?.data.len() - 1)
    }

    /// Mark that no more data will be written.
    ///
    /// The reader still drains what is buffered before seeing end of data.
    pub fn close_writer(&self) {
        self.shared.close_writer();
    }

    /// Close both endpoints and wake any waiting reader.
    pub fn close(&self) {
        let mut ring = self.shared.ring.lock().unwrap_or_else(PoisonError::into_inner);
        ring.reader_open = false;
        ring.writer_open = false;
        self.shared.notify(ring);
    }
}

impl Default for SharedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing endpoint of a [`SharedBuffer`].
///
/// Dropping the writer closes it.
#[derive(Debug)]
pub struct SharedWriter {
    shared: Arc<Shared>,
}

impl SharedWriter {
    /// Append `data`, growing the ring if needed. Never waits on the reader.
    pub fn write_bytes(&self, data: &[u8]) -> Result<(), BufferError> {
        let mut ring = self.shared.lock()?;
        if !ring.writer_open {
            return Err(BufferError::Closed);
        }
        ring.write_from(data)?;
        trace!("shared buffer: wrote {} bytes, {} unread", data.len(), ring.read_size());
        self.shared.notify(ring);
        Ok(())
    }

    /// Mark that no more data will be written.
    pub fn close(&mut self) {
        self.shared.close_writer();
    }
}

impl io::Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsyncWrite for SharedWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(self.write_bytes(buf).map(|()| buf.len()).map_err(io::Error::from))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.close();
        Poll::Ready(Ok(()))
    }
}

impl Drop for SharedWriter {
    fn drop(&mut self) {
        self.shared.close_writer();
    }
}

/// Reading endpoint of a [`SharedBuffer`].
///
/// Reads wait until at least one byte is available, and report end of data
/// (`Ok(0)`) once the writer is closed and everything buffered was read.
#[derive(Debug)]
pub struct SharedReader {
    shared: Arc<Shared>,
}

impl SharedReader {
    /// Number of bytes that can be read without waiting.
    pub fn available(&self) -> Result<usize, BufferError> {
        Ok(self.shared.lock()?.read_size())
    }

    /// Blocking read into `dst`.
    pub fn read_bytes(&self, dst: &mut [u8]) -> Result<usize, BufferError> {
        if dst.is_empty() {
            return Ok(0);
        }

        let mut ring = self.shared.lock()?;
        if !ring.reader_open {
            return Err(BufferError::Closed);
        }
        while ring.wait_for_input() {
            ring = self
                .shared
                .readable
                .wait(ring)
                .map_err(|_| BufferError::Poisoned)?;
        }
        Ok(ring.read_into(dst))
    }
}

impl io::Read for SharedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl AsyncRead for SharedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let mut ring = match self.shared.lock() {
            Ok(ring) => ring,
            Err(e) => return Poll::Ready(Err(e.into())),
        };
        if !ring.reader_open {
            return Poll::Ready(Err(BufferError::Closed.into()));
        }
        if ring.wait_for_input() {
            ring.read_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let n = ring.read_size().min(buf.remaining());
        let dst = buf.initialize_unfilled_to(n);
        ring.read_into(dst);
        buf.advance(n);
        Poll::Ready(Ok(()))
    }
}

impl Drop for SharedReader {
    fn drop(&mut self) {
        self.shared.close_reader();
    }
}
