//! Paths inside the archive

use crate::errors::ContextError;
use std::{fmt, str::FromStr};

/// A path as it appears inside the archive
///
/// Archive paths always use `/` as their separator, no matter which
/// separator the host filesystem uses. They are kept in a normal form:
/// repeated separators are collapsed, `.` components are dropped and there
/// is no trailing separator. A leading `/` is preserved when present.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualPath(String);

impl VirtualPath {
    /// Parse and normalize an archive path
    pub fn parse(s: &str) -> Result<VirtualPath, ContextError> {
        if s.contains('\0') {
            return Err(ContextError::InvalidArchivePath(s.to_string()));
        }
        let mut normal = String::with_capacity(s.len());
        if s.starts_with('/') {
            normal.push('/');
        }
        for component in s.split('/') {
            match component {
                "" | "." => (),
                ".." => return Err(ContextError::InvalidArchivePath(s.to_string())),
                name => {
                    if !normal.is_empty() && !normal.ends_with('/') {
                        normal.push('/');
                    }
                    normal.push_str(name);
                }
            }
        }
        Ok(VirtualPath(normal))
    }

    /// The archive root, `/`
    pub fn root() -> VirtualPath {
        VirtualPath("/".to_string())
    }

    /// Append one or more `/`-separated components
    ///
    /// Joining onto the empty path gives a relative path.
    pub fn join(&self, name: &str) -> Result<VirtualPath, ContextError> {
        if self.0.is_empty() {
            VirtualPath::parse(name.trim_start_matches('/'))
        } else {
            VirtualPath::parse(&format!("{}/{}", self.0, name))
        }
    }

    /// Last path component, if there is one
    pub fn file_name(&self) -> Option<&str> {
        match self.0.rsplit('/').next() {
            Some("") | None => None,
            Some(name) => Some(name),
        }
    }

    /// True if this path names a directory with no components, `/` or empty
    pub fn is_root(&self) -> bool {
        self.file_name().is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for VirtualPath {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VirtualPath::parse(s)
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}
