use super::{
    FileCache, FileData, MAX_FILE_BYTES, Placement, PublicUrls, RemoteStore, StorageError,
    StoreOutcome, StoredFile, SupabaseStore, UploadResult, generate_filename, read_capped,
    source_name,
};
use crate::config::AppConfig;
use reqwest::{Client, Url, header};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct FileStorage {
    cache: FileCache,
    remote: Option<Arc<dyn RemoteStore>>,
    client: Client,
    urls: PublicUrls,
    fetch_timeout: Duration,
}

impl FileStorage {
    pub fn new(
        cache: FileCache,
        remote: Option<Arc<dyn RemoteStore>>,
        client: Client,
        urls: PublicUrls,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            remote,
            client,
            urls,
            fetch_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let remote: Option<Arc<dyn RemoteStore>> = match &config.remote {
            Some(remote) => {
                info!(url = %remote.url, bucket = %remote.bucket, "remote store enabled");
                Some(Arc::new(SupabaseStore::new(
                    client.clone(),
                    remote.clone(),
                    config.push_timeout,
                    config.fetch_timeout,
                )))
            }
            None => {
                info!("remote store credentials not configured, using local cache only");
                None
            }
        };

        Ok(Self::new(
            FileCache::new(config.cache_max_bytes, config.cache_ttl),
            remote,
            client,
            PublicUrls::new(config.deployment_url.clone(), config.base_url.clone()),
            config.fetch_timeout,
        ))
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Remote failures are absorbed and reported through the returned
    /// [`Placement`]. The call only fails when no tier could keep the file.
    pub async fn store(
        &self,
        file: FileData,
        forwarded_host: Option<&str>,
    ) -> Result<StoreOutcome, StorageError> {
        let filename = generate_filename(&file.original_name);
        let size = file.bytes.len() as u64;

        let pushed = match &self.remote {
            Some(remote) => match remote.put(&filename, file.bytes.clone(), &file.mime).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(%filename, error = %e, "remote upload failed, keeping local copy");
                    false
                }
            },
            None => false,
        };

        let local = StoredFile {
            filename: filename.clone(),
            data: file.bytes,
            mime: file.mime.clone(),
            size,
        };

        // Without a remote copy the local one must not be subject to eviction.
        let placement = if !pushed {
            if !self.cache.pin(local).await {
                return Err(StorageError::NoCapacity { filename, size });
            }
            Placement::LocalOnly
        } else if self.cache.fits(size) {
            self.cache.insert(local).await;
            Placement::RemoteAndLocal
        } else {
            Placement::RemoteOnly
        };

        info!(%filename, size, %placement, "file stored");

        Ok(StoreOutcome {
            result: UploadResult {
                url: self.urls.file_url(forwarded_host, &filename),
                name: filename,
                mime: file.mime,
                size,
                original_name: file.original_name,
            },
            placement,
        })
    }

    pub async fn store_from_url(
        &self,
        source: &str,
        forwarded_host: Option<&str>,
    ) -> Result<StoreOutcome, StorageError> {
        let url = Url::parse(source).map_err(|_| StorageError::InvalidUrl(source.to_string()))?;
        let failed = |reason: String| StorageError::Fetch {
            url: source.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url.clone())
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("source answered {status}")));
        }

        let mime = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(mime::APPLICATION_OCTET_STREAM.essence_str())
            .to_string();
        let bytes = read_capped(response, MAX_FILE_BYTES)
            .await
            .map_err(|e| failed(e.to_string()))?
            .ok_or_else(|| failed("source exceeds the 50MB file limit".to_string()))?;

        debug!(url = %source, size = bytes.len(), %mime, "fetched remote source");

        self.store(FileData::new(source_name(&url), bytes, mime), forwarded_host)
            .await
    }

    /// Local cache first, then the remote store's public path.
    pub async fn retrieve(&self, filename: &str) -> Option<StoredFile> {
        if let Some(file) = self.cache.get(filename).await {
            return Some(file);
        }

        let remote = self.remote.as_ref()?;
        match remote.get_public(filename).await {
            Ok(file) => {
                if self.cache.fits(file.size) {
                    self.cache.insert(file.clone()).await;
                }
                Some(file)
            }
            Err(e) => {
                debug!(%filename, error = %e, "remote read-back failed");
                None
            }
        }
    }
}
