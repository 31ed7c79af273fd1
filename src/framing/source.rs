//! Readers that feed one real file into a tar builder
//!
//! The tar builders pad each entry by the number of bytes they actually
//! copied, so a file that shrank after its header was written would
//! silently corrupt the archive. These readers stop at the size recorded in
//! the header, fail with [ContextError::FileTruncated] if the file runs out
//! first, and never read more than one chunk at a time.

use crate::errors::ContextError;
use futures_util::ready;
use std::{
    io,
    io::Read,
    path::{Path, PathBuf},
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Progress {
    path: PathBuf,
    size: u64,
    remaining: u64,
    chunk_size: usize,
}

impl Progress {
    fn new(path: &Path, size: u64, chunk_size: usize) -> Self {
        Progress {
            path: path.to_path_buf(),
            size,
            remaining: size,
            chunk_size: chunk_size.max(1),
        }
    }

    fn want(&self, available: usize) -> usize {
        (available as u64).min(self.remaining).min(self.chunk_size as u64) as usize
    }

    fn account(&mut self, count: usize) -> io::Result<()> {
        if count == 0 {
            return Err(ContextError::FileTruncated {
                path: self.path.clone(),
                expected: self.size,
                found: self.size - self.remaining,
            }
            .into_stream());
        }
        self.remaining -= count as u64;
        Ok(())
    }
}

/// Blocking file reader bounded to the size in its tar header
#[derive(Debug)]
pub struct FileSource<R> {
    inner: R,
    progress: Progress,
}

impl<R: Read> FileSource<R> {
    pub fn new(inner: R, path: &Path, size: u64, chunk_size: usize) -> Self {
        FileSource {
            inner,
            progress: Progress::new(path, size, chunk_size),
        }
    }
}

impl<R: Read> Read for FileSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = self.progress.want(buf.len());
        if want == 0 {
            return Ok(0);
        }
        let count = self.inner.read(&mut buf[..want])?;
        self.progress.account(count)?;
        Ok(count)
    }
}

/// Suspendable file reader bounded to the size in its tar header
///
/// Every chunk read first checks the cancellation token, and fails with
/// [ContextError::Cancelled] once it has fired.
#[derive(Debug)]
pub struct AsyncFileSource<R> {
    inner: R,
    chunk: Vec<u8>,
    cancel: CancellationToken,
    progress: Progress,
}

impl<R: AsyncRead + Unpin> AsyncFileSource<R> {
    pub fn new(inner: R, path: &Path, size: u64, chunk_size: usize, cancel: CancellationToken) -> Self {
        let progress = Progress::new(path, size, chunk_size);
        AsyncFileSource {
            inner,
            chunk: vec![0; progress.chunk_size],
            cancel,
            progress,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for AsyncFileSource<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            return Poll::Ready(Err(ContextError::Cancelled.into_stream()));
        }
        let want = this.progress.want(buf.remaining());
        if want == 0 {
            return Poll::Ready(Ok(()));
        }
        let mut chunk = ReadBuf::new(&mut this.chunk[..want]);
        ready!(Pin::new(&mut this.inner).poll_read(cx, &mut chunk))?;
        let filled = chunk.filled();
        this.progress.account(filled.len())?;
        buf.put_slice(filled);
        Poll::Ready(Ok(()))
    }
}
