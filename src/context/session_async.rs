use crate::{
    context::builder::Settings,
    errors::ContextError,
    framing::{self, AsyncFileSource},
    vpath::VirtualPath,
    walk,
};
use async_compression::{tokio::write::GzipEncoder, Level};
use futures_util::future::{BoxFuture, FutureExt};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{fs::File, io::AsyncWriteExt};
use tokio_tar::Builder;
use tokio_util::sync::CancellationToken;

/// One suspendable population pass over a build context's backing buffer
///
/// This is the counterpart of [ArchiveSession] handed out by
/// [BuildContext::rebuild_async()], with the same ordering and teardown
/// rules. The backing buffer is lent to the session for the length of the
/// rebuild and given back to the build context when the session is
/// disposed; the build context's guard stays held the whole time.
///
/// Reads from real files stop with [ContextError::Cancelled] as soon as
/// the rebuild's cancellation token fires.
///
/// [ArchiveSession]: crate::ArchiveSession
/// [BuildContext::rebuild_async()]: crate::BuildContext::rebuild_async
pub struct AsyncArchiveSession {
    builder: Option<Builder<GzipEncoder<Vec<u8>>>>,
    returned: Option<Vec<u8>>,
    context_disposed: Arc<AtomicBool>,
    cancel: CancellationToken,
    settings: Settings,
    entry_count: usize,
    partial_entry: bool,
}

impl AsyncArchiveSession {
    pub(crate) fn new(
        buffer: Vec<u8>,
        context_disposed: Arc<AtomicBool>,
        cancel: CancellationToken,
        settings: Settings,
    ) -> Self {
        let level = Level::Precise(settings.compression_level as i32);
        AsyncArchiveSession {
            builder: Some(Builder::new(GzipEncoder::with_quality(buffer, level))),
            returned: None,
            context_disposed,
            cancel,
            settings,
            entry_count: 0,
            partial_entry: false,
        }
    }

    fn builder(&mut self) -> Result<&mut Builder<GzipEncoder<Vec<u8>>>, ContextError> {
        if self.context_disposed.load(Ordering::Acquire) {
            return Err(ContextError::Disposed("build context"));
        }
        self.builder
            .as_mut()
            .ok_or(ContextError::Disposed("archive session"))
    }

    /// Stream one real file into the archive under `virtual_path`
    pub async fn add_file<P: AsRef<Path>>(&mut self, real_path: P, virtual_path: &str) -> Result<(), ContextError> {
        self.builder()?;
        self.add_file_at(real_path.as_ref(), &VirtualPath::parse(virtual_path)?)
            .await
    }

    /// Add every file in a real directory under `virtual_path`, in the same
    /// order as [ArchiveSession::add_directory()]
    ///
    /// [ArchiveSession::add_directory()]: crate::ArchiveSession::add_directory
    pub async fn add_directory<P: AsRef<Path>>(
        &mut self,
        real_path: P,
        virtual_path: &str,
        recurse: bool,
    ) -> Result<(), ContextError> {
        self.builder()?;
        let base = VirtualPath::parse(virtual_path)?;
        self.add_directory_at(real_path.as_ref(), &base, recurse)
            .await
    }

    /// Add one in-memory blob as a file entry; the session stays open
    pub async fn add_entry(&mut self, virtual_path: &str, contents: &[u8]) -> Result<(), ContextError> {
        self.builder()?;
        let path = VirtualPath::parse(virtual_path)?;
        self.partial_entry = true;
        framing::append_async(self.builder()?, &path, contents.len() as u64, contents).await?;
        self.partial_entry = false;
        self.entry_count += 1;
        log::trace!("added {} byte blob as {}", contents.len(), path);
        Ok(())
    }

    fn add_directory_at<'s>(
        &'s mut self,
        real_path: &'s Path,
        base: &'s VirtualPath,
        recurse: bool,
    ) -> BoxFuture<'s, Result<(), ContextError>> {
        async move {
            self.builder()?;
            let listing = walk::list_async(real_path, self.settings.sorted).await?;
            for (path, name) in &listing.files {
                self.add_file_at(path, &base.join(name)?).await?;
            }
            if recurse {
                for (path, name) in &listing.directories {
                    self.add_directory_at(path, &base.join(name)?, true).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn add_file_at(&mut self, real_path: &Path, path: &VirtualPath) -> Result<(), ContextError> {
        self.builder()?;
        let file = File::open(real_path)
            .await
            .map_err(|e| ContextError::from_io(e, real_path))?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(ContextError::NotAFile(real_path.to_path_buf()));
        }
        let size = metadata.len();
        let source = AsyncFileSource::new(
            file,
            real_path,
            size,
            self.settings.chunk_size,
            self.cancel.clone(),
        );
        self.partial_entry = true;
        framing::append_async(self.builder()?, path, size, source).await?;
        self.partial_entry = false;

        self.entry_count += 1;
        log::trace!("added {:?} as {}, {} bytes", real_path, path, size);
        Ok(())
    }

    /// Number of entries written so far
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn is_disposed(&self) -> bool {
        self.builder.is_none()
    }

    /// Close the tar layer then the gzip layer
    ///
    /// Both layers are closed even if the first fails; the first error is
    /// returned. Calling this again does nothing. Not cancellable.
    pub async fn dispose(&mut self) -> Result<(), ContextError> {
        let mut builder = match self.builder.take() {
            Some(builder) => builder,
            None => return Ok(()),
        };
        if self.partial_entry {
            log::warn!("closing archive after a failed entry, the archive is truncated");
        }
        let framing_result = builder.finish().await;
        let compression_result = match builder.into_inner().await {
            Ok(mut compression) => {
                let result = compression.shutdown().await;
                self.returned = Some(compression.into_inner());
                result
            }
            Err(err) => Err(err),
        };
        framing_result?;
        compression_result?;
        Ok(())
    }

    /// Give the backing buffer back after disposal
    pub(crate) fn into_buffer(mut self) -> Vec<u8> {
        self.returned.take().unwrap_or_default()
    }
}
