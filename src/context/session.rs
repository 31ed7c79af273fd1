use crate::{
    context::builder::Settings,
    errors::ContextError,
    framing::{self, FileSource},
    vpath::VirtualPath,
    walk,
};
use flate2::{write::GzEncoder, Compression};
use std::{
    fs::File,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};
use tar::Builder;

/// One blocking population pass over a build context's backing buffer
///
/// Sessions are handed out by [BuildContext::rebuild()]. Entries are
/// written in exactly the order the ingestion calls are made. The session
/// writes through the buffer it borrows but never owns or closes it;
/// disposing a session only closes the tar and gzip layers.
///
/// [BuildContext::rebuild()]: crate::BuildContext::rebuild
pub struct ArchiveSession<'a> {
    builder: Option<Builder<GzEncoder<&'a mut Vec<u8>>>>,
    context_disposed: &'a AtomicBool,
    settings: &'a Settings,
    entry_count: usize,
    partial_entry: bool,
}

impl<'a> ArchiveSession<'a> {
    pub(crate) fn new(
        buffer: &'a mut Vec<u8>,
        context_disposed: &'a AtomicBool,
        settings: &'a Settings,
    ) -> Self {
        let compression = GzEncoder::new(buffer, Compression::new(settings.compression_level));
        ArchiveSession {
            builder: Some(Builder::new(compression)),
            context_disposed,
            settings,
            entry_count: 0,
            partial_entry: false,
        }
    }

    fn builder(&mut self) -> Result<&mut Builder<GzEncoder<&'a mut Vec<u8>>>, ContextError> {
        if self.context_disposed.load(Ordering::Acquire) {
            return Err(ContextError::Disposed("build context"));
        }
        self.builder
            .as_mut()
            .ok_or(ContextError::Disposed("archive session"))
    }

    /// Stream one real file into the archive under `virtual_path`
    pub fn add_file<P: AsRef<Path>>(&mut self, real_path: P, virtual_path: &str) -> Result<(), ContextError> {
        self.builder()?;
        self.add_file_at(real_path.as_ref(), &VirtualPath::parse(virtual_path)?)
    }

    /// Add every file in a real directory under `virtual_path`
    ///
    /// Files come first, each mapped to `virtual_path` joined with its file
    /// name. With `recurse`, each subdirectory follows and is added the same
    /// way under its own name. Empty directories produce no entries.
    pub fn add_directory<P: AsRef<Path>>(
        &mut self,
        real_path: P,
        virtual_path: &str,
        recurse: bool,
    ) -> Result<(), ContextError> {
        self.builder()?;
        self.add_directory_at(real_path.as_ref(), &VirtualPath::parse(virtual_path)?, recurse)
    }

    /// Add one in-memory blob as a file entry
    ///
    /// The session stays open afterward.
    pub fn add_entry(&mut self, virtual_path: &str, contents: &[u8]) -> Result<(), ContextError> {
        self.builder()?;
        let path = VirtualPath::parse(virtual_path)?;
        self.partial_entry = true;
        framing::append(self.builder()?, &path, contents.len() as u64, contents)?;
        self.partial_entry = false;
        self.entry_count += 1;
        log::trace!("added {} byte blob as {}", contents.len(), path);
        Ok(())
    }

    fn add_directory_at(&mut self, real_path: &Path, base: &VirtualPath, recurse: bool) -> Result<(), ContextError> {
        self.builder()?;
        let listing = walk::list(real_path, self.settings.sorted)?;
        for (path, name) in &listing.files {
            self.add_file_at(path, &base.join(name)?)?;
        }
        if recurse {
            for (path, name) in &listing.directories {
                self.add_directory_at(path, &base.join(name)?, true)?;
            }
        }
        Ok(())
    }

    fn add_file_at(&mut self, real_path: &Path, path: &VirtualPath) -> Result<(), ContextError> {
        self.builder()?;
        let file = File::open(real_path).map_err(|e| ContextError::from_io(e, real_path))?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(ContextError::NotAFile(real_path.to_path_buf()));
        }
        let size = metadata.len();
        let source = FileSource::new(file, real_path, size, self.settings.chunk_size);
        self.partial_entry = true;
        framing::append(self.builder()?, path, size, source)?;
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

    /// Close the tar layer then the gzip layer, leaving the buffer open
    ///
    /// Both layers are closed even if the first fails; the first error is
    /// returned. Calling this again does nothing.
    pub fn dispose(&mut self) -> Result<(), ContextError> {
        let mut builder = match self.builder.take() {
            Some(builder) => builder,
            None => return Ok(()),
        };
        if self.partial_entry {
            log::warn!("closing archive after a failed entry, the archive is truncated");
        }
        let framing_result = builder.finish();
        let compression_result = builder
            .into_inner()
            .and_then(|mut compression| compression.try_finish());
        framing_result?;
        compression_result?;
        Ok(())
    }
}

impl<'a> Drop for ArchiveSession<'a> {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            log::error!("error closing archive session, {}", err);
        }
    }
}
