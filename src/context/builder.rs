//! Settings for new build contexts

use crate::context::BuildContext;

/// Chunk size used when streaming real files into the archive
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Gzip level used unless another is configured
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

#[derive(Clone, Debug)]
pub(crate) struct Settings {
    pub compression_level: u32,
    pub chunk_size: usize,
    pub sorted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            sorted: true,
        }
    }
}

/// Builder for configuring custom [BuildContext] instances
#[derive(Clone, Debug, Default)]
pub struct BuildContextBuilder {
    settings: Settings,
    capacity: usize,
}

impl BuildContextBuilder {
    /// Start constructing a build context with default settings
    pub fn new() -> Self {
        Default::default()
    }

    /// Change the gzip compression level
    ///
    /// Levels run from 0 (store only) to 9 (smallest output). Larger values
    /// are clamped to 9.
    pub fn compression_level(mut self, level: u32) -> Self {
        self.settings.compression_level = level.min(9);
        self
    }

    /// Change how many bytes are read from a real file at a time
    ///
    /// This bounds peak memory while streaming files; it has no effect on
    /// the archive contents. The default is [DEFAULT_CHUNK_SIZE].
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.settings.chunk_size = bytes.max(1);
        self
    }

    /// Walk directories in the order the operating system lists them
    ///
    /// By default the files and subdirectories of each directory are added
    /// in lexicographic order of their names, which makes archives
    /// reproducible for an unchanged tree. Listing order is not stable
    /// across filesystems or even across runs.
    pub fn unsorted_traversal(mut self) -> Self {
        self.settings.sorted = false;
        self
    }

    /// Reserve space in the backing buffer ahead of the first rebuild
    pub fn initial_capacity(mut self, bytes: usize) -> Self {
        self.capacity = bytes;
        self
    }

    /// Construct a BuildContext using the parameters from this Builder
    pub fn build(self) -> BuildContext {
        log::debug!("new build context, {:?}", self.settings);
        BuildContext::from_parts(Vec::with_capacity(self.capacity), self.settings)
    }
}
