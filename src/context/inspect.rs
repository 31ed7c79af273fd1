use crate::errors::ContextError;
use flate2::read::GzDecoder;
use serde::Serialize;
use std::io::Read;

/// Path and length of one entry in a finished build context
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub path: String,
    pub size: u64,
}

/// Decode a gzip tar stream and list its entries in archive order
pub fn list_entries<R: Read>(reader: R) -> Result<Vec<EntrySummary>, ContextError> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut result = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        result.push(EntrySummary {
            path: String::from_utf8_lossy(&entry.path_bytes()).into_owned(),
            size: entry.size(),
        });
    }
    Ok(result)
}
