//! Build contexts for container image builders
//!
//! A build context is the gzip compressed tar archive an image builder
//! receives as its input tree. [BuildContext] keeps one in memory and lets
//! it be rebuilt and read back any number of times, one operation at a
//! time, with blocking and async forms of each operation.
//!
//! ```no_run
//! use buildctx::{BuildContext, ContextError};
//! use std::io::Read;
//!
//! # fn main() -> Result<(), ContextError> {
//! let context = BuildContext::new();
//! context.rebuild(|session| {
//!     session.add_directory("app", "/", true)?;
//!     session.add_entry("/Dockerfile", b"FROM scratch\nCOPY . /\n")
//! })?;
//! let archive = context.access(|mut reader| -> Result<Vec<u8>, ContextError> {
//!     let mut bytes = Vec::new();
//!     reader.read_to_end(&mut bytes)?;
//!     Ok(bytes)
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod errors;
pub mod recipe;

mod framing;
mod vpath;
mod walk;

pub use crate::{
    context::{
        list_entries, ArchiveSession, AsyncArchiveSession, BuildContext, BuildContextBuilder,
        ContextReader, EntrySummary,
    },
    errors::ContextError,
    recipe::Recipe,
    vpath::VirtualPath,
};
pub use tokio_util::sync::CancellationToken;
