//! Tar framing for archive entries
//!
//! Entries go through `tar::Builder` on the blocking side and
//! `tokio_tar::Builder` on the suspendable side. The builders handle data
//! padding and the end of archive marker; this module only prepares the
//! headers, which are shared so both sides emit the same tar stream.

mod source;

pub use source::{AsyncFileSource, FileSource};

use crate::{errors::ContextError, vpath::VirtualPath};
use std::io::{Read, Write};
use tar::{EntryType, Header};
use tokio::io::{AsyncRead, AsyncWrite};

const NAME_FIELD_LEN: usize = 100;
const LONG_NAME_MARKER: &[u8] = b"././@LongLink";

fn base_header(name: &[u8], size: u64, kind: EntryType) -> Header {
    let mut header = Header::new_gnu();
    // set_path() refuses absolute paths; archive paths are already normalized
    // so the name goes in as raw bytes.
    header.as_old_mut().name[..name.len()].copy_from_slice(name);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_size(size);
    header.set_entry_type(kind);
    header.set_cksum();
    header
}

/// Headers for one regular file entry
///
/// Paths longer than the 100 byte name field get a GNU long name record
/// first, with the entry header's own name field holding a truncated copy.
#[derive(Clone, Debug)]
struct EntryHeaders {
    long_name: Option<(Header, Vec<u8>)>,
    header: Header,
}

impl EntryHeaders {
    fn new(path: &VirtualPath, size: u64) -> Result<Self, ContextError> {
        if path.is_root() {
            return Err(ContextError::InvalidArchivePath(path.to_string()));
        }
        let name = path.as_str().as_bytes();
        let long_name = if name.len() > NAME_FIELD_LEN {
            let mut record = name.to_vec();
            record.push(0);
            let header = base_header(LONG_NAME_MARKER, record.len() as u64, EntryType::GNULongName);
            Some((header, record))
        } else {
            None
        };
        let header = base_header(
            &name[..name.len().min(NAME_FIELD_LEN)],
            size,
            EntryType::Regular,
        );
        Ok(EntryHeaders { long_name, header })
    }
}

/// Append one entry whose data comes from `data`, blocking
pub fn append<W: Write, R: Read>(
    builder: &mut tar::Builder<W>,
    path: &VirtualPath,
    size: u64,
    data: R,
) -> Result<(), ContextError> {
    let headers = EntryHeaders::new(path, size)?;
    if let Some((header, record)) = &headers.long_name {
        builder.append(header, &record[..])?;
    }
    builder
        .append(&headers.header, data)
        .map_err(ContextError::from_stream)
}

/// Append one entry whose data comes from `data` without blocking
pub async fn append_async<W, R>(
    builder: &mut tokio_tar::Builder<W>,
    path: &VirtualPath,
    size: u64,
    data: R,
) -> Result<(), ContextError>
where
    W: AsyncWrite + Unpin + Send + 'static,
    R: AsyncRead + Unpin,
{
    let headers = EntryHeaders::new(path, size)?;
    if let Some((header, record)) = &headers.long_name {
        builder.append(&async_header(header), &record[..]).await?;
    }
    builder
        .append(&async_header(&headers.header), data)
        .await
        .map_err(ContextError::from_stream)
}

fn async_header(header: &Header) -> tokio_tar::Header {
    tokio_tar::Header::from_byte_slice(header.as_bytes()).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> VirtualPath {
        VirtualPath::parse(s).unwrap()
    }

    fn read_back(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = tar::Archive::new(bytes);
        let mut result = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            result.push((name, data));
        }
        result
    }

    #[test]
    fn short_name_header() {
        let headers = EntryHeaders::new(&path("/a.txt"), 3).unwrap();
        assert!(headers.long_name.is_none());
        assert_eq!(headers.header.path_bytes().as_ref(), b"/a.txt");
        assert_eq!(headers.header.size().unwrap(), 3);
        assert_eq!(headers.header.entry_type(), EntryType::Regular);
        assert_eq!(headers.header.mode().unwrap(), 0o644);
    }

    #[test]
    fn long_name_header() {
        let long = format!("/{}", "d/".repeat(80)) + "file";
        let headers = EntryHeaders::new(&path(&long), 10).unwrap();
        let (marker, record) = headers.long_name.unwrap();
        assert_eq!(marker.entry_type(), EntryType::GNULongName);
        assert_eq!(marker.size().unwrap(), long.len() as u64 + 1);
        assert_eq!(&record[..long.len()], long.as_bytes());
        assert_eq!(headers.header.path_bytes().len(), NAME_FIELD_LEN);
    }

    #[test]
    fn root_is_not_an_entry() {
        assert!(EntryHeaders::new(&VirtualPath::root(), 0).is_err());
    }

    #[test]
    fn builder_stream_reads_back() {
        let long = format!("/{}", "long-directory-name/".repeat(8)) + "leaf";
        let mut builder = tar::Builder::new(Vec::new());
        append(&mut builder, &path("/one"), 3, &b"abc"[..]).unwrap();
        append(&mut builder, &path("/empty"), 0, &b""[..]).unwrap();
        append(&mut builder, &path(&long), 1, &b"z"[..]).unwrap();
        append(&mut builder, &path("two/three"), 2, &b"ok"[..]).unwrap();
        let bytes = builder.into_inner().unwrap();
        assert_eq!(bytes.len() % 512, 0);
        assert_eq!(
            read_back(&bytes),
            vec![
                ("/one".to_string(), b"abc".to_vec()),
                ("/empty".to_string(), vec![]),
                (long, b"z".to_vec()),
                ("two/three".to_string(), b"ok".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn async_stream_matches_blocking() {
        let long = format!("/{}", "long-directory-name/".repeat(8)) + "leaf";

        let mut blocking = tar::Builder::new(Vec::new());
        append(&mut blocking, &path("/a"), 5, &b"hello"[..]).unwrap();
        append(&mut blocking, &path(&long), 2, &b"ok"[..]).unwrap();
        let blocking = blocking.into_inner().unwrap();

        let mut suspendable = tokio_tar::Builder::new(Vec::new());
        append_async(&mut suspendable, &path("/a"), 5, &b"hello"[..])
            .await
            .unwrap();
        append_async(&mut suspendable, &path(&long), 2, &b"ok"[..])
            .await
            .unwrap();
        let suspendable = suspendable.into_inner().await.unwrap();

        assert_eq!(blocking, suspendable);
        assert_eq!(read_back(&suspendable)[1], (long, b"ok".to_vec()));
    }
}
