//! Reusable in-memory build contexts
//!
//! A [BuildContext] owns one growable buffer holding a gzip compressed tar
//! stream. The buffer is only touched while the context's guard is held,
//! and the guard is held for the whole of one rebuild or one access,
//! including every suspension point in the async forms. A second operation
//! waits until the first one is completely finished.


mod builder;
mod inspect;
mod reader;
mod session;
mod session_async;

pub use builder::{BuildContextBuilder, DEFAULT_CHUNK_SIZE, DEFAULT_COMPRESSION_LEVEL};
pub use inspect::{list_entries, EntrySummary};
pub use reader::ContextReader;
pub use session::ArchiveSession;
pub use session_async::AsyncArchiveSession;

use crate::errors::ContextError;
use builder::Settings;
use futures_util::future::BoxFuture;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// A reusable, rewindable gzip tar archive for an image builder
///
/// Every rebuild discards the previous contents and starts over from an
/// empty buffer; every access reads from the start. A context that has
/// never been rebuilt reads as a valid archive with no entries.
///
/// The blocking forms ([rebuild()], [access()]) wait for the guard by
/// blocking the current thread, so like any blocking call they must not be
/// used from inside an async task. Use [rebuild_async()] and
/// [access_async()] there instead.
///
/// Async callbacks return a boxed future borrowing only the session or
/// reader they are given, so anything else they use has to be moved in.
///
/// [rebuild()]: BuildContext::rebuild
/// [access()]: BuildContext::access
/// [rebuild_async()]: BuildContext::rebuild_async
/// [access_async()]: BuildContext::access_async
#[derive(Debug)]
pub struct BuildContext {
    buffer: Mutex<Vec<u8>>,
    disposed: Arc<AtomicBool>,
    settings: Settings,
}

impl Default for BuildContext {
    fn default() -> Self {
        BuildContext::new()
    }
}

impl BuildContext {
    /// Construct an empty build context with default settings
    pub fn new() -> Self {
        BuildContext::builder().build()
    }

    /// Construct a build context with custom settings, via
    /// BuildContextBuilder
    pub fn builder() -> BuildContextBuilder {
        BuildContextBuilder::new()
    }

    pub(crate) fn from_parts(buffer: Vec<u8>, settings: Settings) -> Self {
        BuildContext {
            buffer: Mutex::new(buffer),
            disposed: Arc::new(AtomicBool::new(false)),
            settings,
        }
    }

    /// Replace the archive contents, blocking
    ///
    /// `populate` receives a fresh [ArchiveSession] writing into the emptied
    /// buffer. The session is disposed when `populate` returns, whether or
    /// not it succeeded, and any error from `populate` is returned after
    /// that. A failed rebuild leaves the context usable; its contents are
    /// not meaningful until the next successful rebuild.
    pub fn rebuild<F, T, E>(&self, populate: F) -> Result<T, E>
    where
        F: FnOnce(&mut ArchiveSession<'_>) -> Result<T, E>,
        E: From<ContextError>,
    {
        self.check_usable()?;
        let mut buffer = self.buffer.blocking_lock();
        self.begin(&mut buffer)?;
        log::debug!("rebuilding build context, discarding {} bytes", buffer.len());
        buffer.clear();

        let result = {
            let mut session = ArchiveSession::new(&mut buffer, &self.disposed, &self.settings);
            let result = populate(&mut session);
            log::debug!("archive session wrote {} entries", session.entry_count());
            settle(result, session.dispose())
        };

        log::debug!("build context holds {} bytes", buffer.len());
        self.end(&mut buffer);
        result
    }

    /// Replace the archive contents without blocking
    ///
    /// Same contract as [BuildContext::rebuild()]. The guard is held until
    /// the session has been disposed, across every await in `populate`.
    /// When `cancel` fires, waiting for the guard or running `populate`
    /// stops with [ContextError::Cancelled]; the session is still disposed
    /// before this returns.
    pub async fn rebuild_async<F, T, E>(&self, cancel: &CancellationToken, populate: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut AsyncArchiveSession) -> BoxFuture<'s, Result<T, E>>,
        E: From<ContextError>,
    {
        self.check_usable()?;
        let mut buffer = self.lock_async(cancel).await?;
        self.begin(&mut buffer)?;
        log::debug!("rebuilding build context, discarding {} bytes", buffer.len());
        buffer.clear();

        let mut session = AsyncArchiveSession::new(
            std::mem::take(&mut *buffer),
            self.disposed.clone(),
            cancel.clone(),
            self.settings.clone(),
        );
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ContextError::Cancelled.into()),
            result = populate(&mut session) => result,
        };
        log::debug!("archive session wrote {} entries", session.entry_count());
        let teardown = session.dispose().await;
        *buffer = session.into_buffer();

        log::debug!("build context holds {} bytes", buffer.len());
        self.end(&mut buffer);
        settle(result, teardown)
    }

    /// Read the finished archive from its first byte, blocking
    ///
    /// The reader must be consumed before `consume` returns; no rebuild can
    /// start until then.
    pub fn access<F, T, E>(&self, consume: F) -> Result<T, E>
    where
        F: FnOnce(ContextReader<'_>) -> Result<T, E>,
        E: From<ContextError>,
    {
        self.check_usable()?;
        let mut buffer = self.buffer.blocking_lock();
        self.begin(&mut buffer)?;
        self.ensure_archive(&mut buffer)?;
        let result = consume(ContextReader::new(&buffer[..]));
        self.end(&mut buffer);
        result
    }

    /// Read the finished archive from its first byte without blocking
    ///
    /// Same contract as [BuildContext::access()], with cancellation
    /// observed while waiting for the guard and while `consume` runs.
    pub async fn access_async<F, T, E>(&self, cancel: &CancellationToken, consume: F) -> Result<T, E>
    where
        F: for<'r> FnOnce(ContextReader<'r>) -> BoxFuture<'r, Result<T, E>>,
        E: From<ContextError>,
    {
        self.check_usable()?;
        let mut buffer = self.lock_async(cancel).await?;
        self.begin(&mut buffer)?;
        self.ensure_archive(&mut buffer)?;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ContextError::Cancelled.into()),
            result = consume(ContextReader::new(&buffer[..])) => result,
        };
        self.end(&mut buffer);
        result
    }

    /// List the path and size of every entry, in archive order
    pub fn entries(&self) -> Result<Vec<EntrySummary>, ContextError> {
        self.access(|reader| list_entries(reader))
    }

    /// Release the backing buffer; every later operation fails with
    /// [ContextError::Disposed]
    ///
    /// Calling this again does nothing. If an operation is in progress, it
    /// fails at its next ingestion call and the buffer is released when it
    /// ends.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.buffer.try_lock() {
            Ok(mut buffer) => {
                log::debug!("build context disposed, releasing {} bytes", buffer.len());
                release(&mut buffer);
            }
            Err(_) => log::debug!("build context disposed while in use"),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn check_usable(&self) -> Result<(), ContextError> {
        if self.is_disposed() {
            Err(ContextError::Disposed("build context"))
        } else {
            Ok(())
        }
    }

    async fn lock_async(&self, cancel: &CancellationToken) -> Result<MutexGuard<'_, Vec<u8>>, ContextError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ContextError::Cancelled),
            guard = self.buffer.lock() => Ok(guard),
        }
    }

    /// Recheck disposal once the guard is held; dispose() may have run while
    /// we were waiting and found the guard taken
    fn begin(&self, buffer: &mut Vec<u8>) -> Result<(), ContextError> {
        let result = self.check_usable();
        if result.is_err() {
            release(buffer);
        }
        result
    }

    fn end(&self, buffer: &mut Vec<u8>) {
        if self.is_disposed() {
            log::debug!("releasing {} bytes from disposed build context", buffer.len());
            release(buffer);
        }
    }

    fn ensure_archive(&self, buffer: &mut Vec<u8>) -> Result<(), ContextError> {
        if buffer.is_empty() {
            log::debug!("build context read before any rebuild, writing an empty archive");
            ArchiveSession::new(buffer, &self.disposed, &self.settings).dispose()?;
        }
        Ok(())
    }
}

fn release(buffer: &mut Vec<u8>) {
    *buffer = Vec::new();
}

/// Combine a callback's result with the session teardown result, keeping
/// the callback's error when both failed
fn settle<T, E: From<ContextError>>(result: Result<T, E>, teardown: Result<(), ContextError>) -> Result<T, E> {
    match (result, teardown) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(teardown_err)) => {
            log::warn!("archive teardown also failed, {}", teardown_err);
            Err(err)
        }
    }
}
