use std::{
    io,
    io::{BufRead, Cursor, Read},
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};

/// Read-only view of a finished build context, positioned at the start
///
/// Handed to the callback of [BuildContext::access()] and
/// [BuildContext::access_async()]. It borrows the backing buffer, so it
/// can't outlive the callback, and the build context's guard is held until
/// the callback returns.
///
/// [BuildContext::access()]: crate::BuildContext::access
/// [BuildContext::access_async()]: crate::BuildContext::access_async
#[derive(Debug)]
pub struct ContextReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ContextReader<'a> {
    pub(crate) fn new(buffer: &'a [u8]) -> Self {
        ContextReader {
            cursor: Cursor::new(buffer),
        }
    }

    /// Total length of the compressed archive in bytes
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> &'a [u8] {
        let buffer = *self.cursor.get_ref();
        let position = (self.cursor.position() as usize).min(buffer.len());
        &buffer[position..]
    }
}

impl<'a> Read for ContextReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl<'a> BufRead for ContextReader<'a> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.cursor.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.cursor.consume(amt)
    }
}

impl<'a> AsyncRead for ContextReader<'a> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.cursor).poll_read(cx, buf)
    }
}

impl<'a> AsyncBufRead for ContextReader<'a> {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        Pin::new(&mut self.get_mut().cursor).poll_fill_buf(cx)
    }

    fn consume(mut self: Pin<&mut Self>, amt: usize) {
        BufRead::consume(&mut self.cursor, amt)
    }
}
