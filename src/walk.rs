//! Directory listing for archive ingestion

use crate::errors::ContextError;
use std::{
    ffi::OsString,
    fs,
    fs::Metadata,
    path::{Path, PathBuf},
};

/// Immediate children of one real directory, split by kind
///
/// Symbolic links are followed when classifying, so a link to a file is
/// listed as a file. Anything that is neither a file nor a directory after
/// following links is skipped.
#[derive(Debug, Default)]
pub struct Listing {
    pub files: Vec<(PathBuf, String)>,
    pub directories: Vec<(PathBuf, String)>,
}

impl Listing {
    fn push(&mut self, path: PathBuf, name: OsString, metadata: &Metadata) -> Result<(), ContextError> {
        let name = match name.into_string() {
            Ok(name) => name,
            Err(_) => return Err(ContextError::NonUtf8Path(path)),
        };
        if metadata.is_dir() {
            self.directories.push((path, name));
        } else if metadata.is_file() {
            self.files.push((path, name));
        } else {
            log::debug!("skipping special file {:?}", path);
        }
        Ok(())
    }

    fn finish(mut self, sorted: bool) -> Self {
        if sorted {
            self.files.sort_by(|a, b| a.1.cmp(&b.1));
            self.directories.sort_by(|a, b| a.1.cmp(&b.1));
        }
        self
    }
}

/// List a directory, blocking
pub fn list(dir: &Path, sorted: bool) -> Result<Listing, ContextError> {
    let mut listing = Listing::default();
    for entry in fs::read_dir(dir).map_err(|e| ContextError::from_io(e, dir))? {
        let entry = entry?;
        let path = entry.path();
        let metadata = fs::metadata(&path).map_err(|e| ContextError::from_io(e, &path))?;
        listing.push(path, entry.file_name(), &metadata)?;
    }
    Ok(listing.finish(sorted))
}

/// List a directory on the tokio runtime
pub async fn list_async(dir: &Path, sorted: bool) -> Result<Listing, ContextError> {
    let mut listing = Listing::default();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ContextError::from_io(e, dir))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ContextError::from_io(e, &path))?;
        listing.push(path, entry.file_name(), &metadata)?;
    }
    Ok(listing.finish(sorted))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[(PathBuf, String)]) -> Vec<&str> {
        list.iter().map(|(_, name)| name.as_str()).collect()
    }

    #[test]
    fn sorted_listing() {
        let dir = tempfile::tempdir().unwrap();
        for name in &["c", "a", "b"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        fs::create_dir(dir.path().join("z")).unwrap();
        fs::create_dir(dir.path().join("y")).unwrap();

        let listing = list(dir.path(), true).unwrap();
        assert_eq!(names(&listing.files), vec!["a", "b", "c"]);
        assert_eq!(names(&listing.directories), vec!["y", "z"]);
        assert_eq!(listing.files[0].0, dir.path().join("a"));
    }

    #[test]
    fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        match list(&missing, true) {
            Err(ContextError::NotFound(path)) => assert_eq!(path, missing),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn async_listing_matches() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f2"), "x").unwrap();
        fs::write(dir.path().join("f1"), "y").unwrap();
        fs::create_dir(dir.path().join("d")).unwrap();

        let blocking = list(dir.path(), true).unwrap();
        let suspendable = list_async(dir.path(), true).await.unwrap();
        assert_eq!(blocking.files, suspendable.files);
        assert_eq!(blocking.directories, suspendable.directories);
    }
}
