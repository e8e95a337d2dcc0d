use super::{LONG_TERM_CACHE, MAX_FILE_BYTES, StoredFile, read_capped};
use crate::config::RemoteConfig;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("request to remote store failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote store answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("remote object exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Upsert: overwrites any existing object under `filename`.
    async fn put(&self, filename: &str, data: Bytes, mime: &str) -> Result<(), RemoteError>;

    async fn get_public(&self, filename: &str) -> Result<StoredFile, RemoteError>;
}

/// Supabase Storage over its REST API.
pub struct SupabaseStore {
    client: Client,
    config: RemoteConfig,
    push_timeout: Duration,
    read_timeout: Duration,
}

impl SupabaseStore {
    pub fn new(
        client: Client,
        config: RemoteConfig,
        push_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            client,
            config,
            push_timeout,
            read_timeout,
        }
    }

    fn object_url(&self, filename: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{filename}",
            self.config.url, self.config.bucket
        )
    }

    fn public_url(&self, filename: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{filename}",
            self.config.url, self.config.bucket
        )
    }
}

#[async_trait]
impl RemoteStore for SupabaseStore {
    async fn put(&self, filename: &str, data: Bytes, mime: &str) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(self.object_url(filename))
            .bearer_auth(&self.config.key)
            .header(header::CONTENT_TYPE, mime)
            .header(header::CACHE_CONTROL, LONG_TERM_CACHE)
            .header("x-upsert", "true")
            .timeout(self.push_timeout)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, body });
        }

        Ok(())
    }

    async fn get_public(&self, filename: &str) -> Result<StoredFile, RemoteError> {
        let response = self
            .client
            .get(self.public_url(filename))
            .timeout(self.read_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                status,
                body: String::new(),
            });
        }

        let mime = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM.essence_str())
            .to_string();
        let data = read_capped(response, MAX_FILE_BYTES)
            .await?
            .ok_or(RemoteError::TooLarge {
                limit: MAX_FILE_BYTES,
            })?;

        Ok(StoredFile {
            filename: filename.to_string(),
            size: data.len() as u64,
            data,
            mime,
        })
    }
}
