//! Pluggable blob storage.
//!
//! Backends persist opaque bytes keyed by `(address, type, tag)` and never
//! interpret the segments beyond using them as path components. The engine
//! owns backend selection; everything above the trait is backend-agnostic.

mod file;
mod remote;

pub use file::FileBackend;
pub use remote::RemoteBackend;

use async_trait::async_trait;
use keybroker::Error;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store `data`, overwriting any existing blob. The write must be
    /// atomic: a crashed or timed-out call never leaves a partial blob
    /// observable.
    async fn set(&self, addr: &str, typ: &str, tag: &str, data: &[u8]) -> Result<(), Error>;

    /// Store `data` only if no blob exists at the key. Returns whether the
    /// write happened; `false` means another writer got there first and the
    /// existing blob is untouched.
    async fn set_if_absent(
        &self,
        addr: &str,
        typ: &str,
        tag: &str,
        data: &[u8],
    ) -> Result<bool, Error>;

    async fn get(&self, addr: &str, typ: &str, tag: &str) -> Result<Vec<u8>, Error>;

    async fn delete(&self, addr: &str, typ: &str, tag: &str) -> Result<(), Error>;
}

/// Key segments become path components verbatim, so traversal characters
/// are rejected before they reach any backend.
pub(crate) fn check_segment(segment: &str) -> Result<(), Error> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\'])
    {
        return Err(Error::InvalidTag(format!(
            "illegal key segment: {segment:?}"
        )));
    }
    Ok(())
}
