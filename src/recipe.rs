//! The standard way to populate a build context for an image build
//!
//! A [Recipe] adds one real directory tree at a mount point inside the
//! archive, then adds the Dockerfile at `/Dockerfile`.

use crate::{
    context::{ArchiveSession, AsyncArchiveSession, BuildContext},
    errors::ContextError,
};
use futures_util::future::FutureExt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Dockerfile embedded at compile time, used unless another one is given
pub static DEFAULT_DOCKERFILE: &[u8] = include_bytes!("../templates/Dockerfile");

/// Archive path of the Dockerfile entry
pub const DOCKERFILE_PATH: &str = "/Dockerfile";

#[derive(Clone, Debug)]
pub struct Recipe {
    root: PathBuf,
    mount_point: String,
    recurse: bool,
    dockerfile: Vec<u8>,
}

impl Recipe {
    /// Archive everything under `root` at `/`, plus the default Dockerfile
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Recipe {
            root: root.as_ref().to_path_buf(),
            mount_point: "/".to_string(),
            recurse: true,
            dockerfile: DEFAULT_DOCKERFILE.to_vec(),
        }
    }

    /// Archive the directory the running executable lives in
    ///
    /// Falls back to the current directory when the executable's location
    /// can't be determined.
    pub fn for_current_exe() -> Result<Self, ContextError> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let root = match exe_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        Ok(Recipe::new(root))
    }

    /// Use these bytes as the Dockerfile
    pub fn dockerfile(mut self, contents: Vec<u8>) -> Self {
        self.dockerfile = contents;
        self
    }

    /// Read the whole Dockerfile from a real path now
    pub fn dockerfile_from_path<P: AsRef<Path>>(self, path: P) -> Result<Self, ContextError> {
        let path = path.as_ref();
        let contents = std::fs::read(path).map_err(|e| ContextError::from_io(e, path))?;
        log::debug!("loaded {} byte dockerfile from {:?}", contents.len(), path);
        Ok(self.dockerfile(contents))
    }

    /// Put the directory tree somewhere other than the archive root
    pub fn mount_point(mut self, virtual_path: &str) -> Self {
        self.mount_point = virtual_path.to_string();
        self
    }

    /// Only archive the files directly inside the root directory
    pub fn no_recurse(mut self) -> Self {
        self.recurse = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Add the directory tree then the Dockerfile, blocking
    pub fn populate(&self, session: &mut ArchiveSession<'_>) -> Result<(), ContextError> {
        session.add_directory(&self.root, &self.mount_point, self.recurse)?;
        session.add_entry(DOCKERFILE_PATH, &self.dockerfile)
    }

    /// Add the directory tree then the Dockerfile without blocking
    pub async fn populate_async(&self, session: &mut AsyncArchiveSession) -> Result<(), ContextError> {
        session
            .add_directory(&self.root, &self.mount_point, self.recurse)
            .await?;
        session.add_entry(DOCKERFILE_PATH, &self.dockerfile).await
    }

    /// Rebuild `context` from this recipe, blocking
    pub fn build(&self, context: &BuildContext) -> Result<(), ContextError> {
        log::info!("building context from {:?}", self.root);
        context.rebuild(|session| self.populate(session))
    }

    /// Rebuild `context` from this recipe without blocking
    pub async fn build_async(&self, context: &BuildContext, cancel: &CancellationToken) -> Result<(), ContextError> {
        log::info!("building context from {:?}", self.root);
        let recipe = self.clone();
        context
            .rebuild_async(cancel, move |session| {
                async move { recipe.populate_async(session).await }.boxed()
            })
            .await
    }
}
