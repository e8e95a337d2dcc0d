mod adapter;
mod cache;
mod naming;
mod remote;

pub use adapter::FileStorage;
pub use cache::FileCache;
pub use naming::{PublicUrls, generate_filename, source_name};
pub use remote::{RemoteError, RemoteStore, SupabaseStore};

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub const LONG_TERM_CACHE: &str = "public, max-age=31536000";

/// Largest payload accepted for a single file, uploaded or fetched.
pub const MAX_FILE_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub data: Bytes,
    pub mime: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FileData {
    pub original_name: String,
    pub bytes: Bytes,
    pub mime: String,
}

impl FileData {
    pub fn new(original_name: impl Into<String>, bytes: Bytes, mime: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            bytes,
            mime: mime.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub name: String,
    pub url: String,
    pub mime: String,
    pub size: u64,
    pub original_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    RemoteAndLocal,
    /// The remote push failed or is disabled. The pinned local copy is the only one.
    LocalOnly,
    RemoteOnly,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::RemoteAndLocal => write!(f, "remote+local"),
            Placement::LocalOnly => write!(f, "local-only"),
            Placement::RemoteOnly => write!(f, "remote-only"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreOutcome {
    pub result: UploadResult,
    pub placement: Placement,
}

impl StoreOutcome {
    pub fn is_degraded(&self) -> bool {
        self.placement == Placement::LocalOnly
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid URL {0}")]
    InvalidUrl(String),
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("{filename} ({size} bytes) fits neither the local cache nor the remote store")]
    NoCapacity { filename: String, size: u64 },
}

/// `Ok(None)` once the body outgrows `limit`; reading stops at that chunk.
pub(crate) async fn read_capped(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Option<Bytes>, reqwest::Error> {
    if response
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Ok(None);
    }

    let mut buffer = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        if buffer.len() + chunk.len() > limit {
            return Ok(None);
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(Some(buffer.freeze()))
}
