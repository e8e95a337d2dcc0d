//! `POST /api/upload`: request validation and per-item fan-out to storage.

use crate::errors::ApiError;
use crate::storage::{FileData, FileStorage, MAX_FILE_BYTES, UploadResult};
use axum::{
    Extension, Json,
    extract::{
        Multipart,
        multipart::{Field, MultipartError},
    },
    http::{HeaderMap, StatusCode},
};
use bytes::{Bytes, BytesMut};
use reqwest::Url;
use serde::Serialize;

/// Most items (files plus URLs) a single request may carry.
pub const MAX_ITEMS: usize = 3;
/// Cap on a non-file form field such as `urls`.
pub const MAX_FIELD_BYTES: usize = 10 * 1024 * 1024;
/// Whole-body cap handed to `DefaultBodyLimit`.
pub const MAX_BODY_BYTES: usize = MAX_ITEMS * MAX_FILE_BYTES + MAX_FIELD_BYTES;

const FORWARDED_HOST: &str = "x-forwarded-host";

#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub bytes: Bytes,
    pub mime: String,
}

#[derive(Debug, Default)]
pub struct UploadRequest {
    pub files: Vec<IncomingFile>,
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<UploadResult>,
}

impl UploadRequest {
    pub fn item_count(&self) -> usize {
        self.files.len() + self.urls.len()
    }

    /// Reject empty requests and requests with too many items.
    pub fn validate(&self) -> Result<(), ApiError> {
        match self.item_count() {
            0 => Err(ApiError::BadRequest("No files or URLs provided".to_string())),
            n if n > MAX_ITEMS => Err(ApiError::BadRequest(format!(
                "A maximum of {MAX_ITEMS} files can be uploaded at once"
            ))),
            _ => Ok(()),
        }
    }

    /// Buffer the recognised fields of a multipart body, enforcing part limits.
    pub async fn from_multipart(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut request = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("files") => {
                    if request.files.len() == MAX_ITEMS {
                        return Err(ApiError::BadRequest(format!(
                            "Too many files. Maximum {MAX_ITEMS} files."
                        )));
                    }

                    let original_name = field.file_name().unwrap_or_default().to_string();
                    let mime = field
                        .content_type()
                        .unwrap_or(mime::APPLICATION_OCTET_STREAM.essence_str())
                        .to_string();
                    let bytes = read_limited(field, MAX_FILE_BYTES, || {
                        ApiError::PayloadTooLarge(
                            "File too large. Maximum 50MB per file.".to_string(),
                        )
                    })
                    .await?;

                    // Browsers send an empty part when no file was picked.
                    if bytes.is_empty() && original_name.is_empty() {
                        continue;
                    }

                    request.files.push(IncomingFile {
                        original_name,
                        bytes,
                        mime,
                    });
                }
                Some("urls") => {
                    let bytes = read_limited(field, MAX_FIELD_BYTES, || {
                        ApiError::PayloadTooLarge("Form field too large. Maximum 10MB.".to_string())
                    })
                    .await?;
                    let url = String::from_utf8(bytes.to_vec())
                        .map_err(|_| ApiError::BadRequest("URL must be valid UTF-8".to_string()))?;
                    request.urls.push(url);
                }
                _ => {}
            }
        }

        Ok(request)
    }
}

/// Read a field chunk by chunk, giving up as soon as it outgrows `limit`.
async fn read_limited<F>(
    mut field: Field<'_>,
    limit: usize,
    too_large: F,
) -> Result<Bytes, ApiError>
where
    F: Fn() -> ApiError,
{
    let mut buffer = BytesMut::new();

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buffer.len() + chunk.len() > limit {
            return Err(too_large());
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer.freeze())
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge("Upload too large".to_string());
    }
    tracing::debug!(error = %err.body_text(), "malformed multipart body");
    ApiError::BadRequest("Error while uploading file".to_string())
}

/// Host the client reached us through, taking the first hop of a proxy chain.
pub fn forwarded_host(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(FORWARDED_HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Store every item in order, files first then URLs.
///
/// Not transactional: items stored before a failing one stay stored.
pub async fn process(
    storage: &FileStorage,
    request: UploadRequest,
    forwarded_host: Option<&str>,
) -> Result<Vec<UploadResult>, ApiError> {
    request.validate()?;

    let mut uploaded = Vec::with_capacity(request.item_count());
    let mut degraded = 0usize;

    for file in request.files {
        let name = file.original_name.clone();
        let outcome = storage
            .store(
                FileData::new(file.original_name, file.bytes, file.mime),
                forwarded_host,
            )
            .await
            .map_err(|e| {
                tracing::error!(original_name = %name, error = %e, "file upload failed");
                ApiError::UploadFailed { name: name.clone() }
            })?;
        if outcome.is_degraded() {
            degraded += 1;
        }
        uploaded.push(outcome.result);
    }

    for url in request.urls {
        if Url::parse(&url).is_err() {
            return Err(ApiError::BadRequest(format!("Invalid URL: {url}")));
        }

        let outcome = storage
            .store_from_url(&url, forwarded_host)
            .await
            .map_err(|e| {
                tracing::error!(%url, error = %e, "URL upload failed");
                ApiError::FetchFailed { url: url.clone() }
            })?;
        if outcome.is_degraded() {
            degraded += 1;
        }
        uploaded.push(outcome.result);
    }

    if degraded > 0 {
        tracing::warn!(
            degraded,
            total = uploaded.len(),
            "upload stored without a remote copy"
        );
    }

    Ok(uploaded)
}

pub async fn upload(
    Extension(storage): Extension<FileStorage>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let request = UploadRequest::from_multipart(&mut multipart).await?;
    tracing::debug!(
        files = request.files.len(),
        urls = request.urls.len(),
        "upload request received"
    );

    let files = process(&storage, request, forwarded_host(&headers)).await?;

    Ok(Json(UploadResponse {
        success: true,
        files,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileCache, PublicUrls};
    use axum::http::HeaderValue;
    use std::time::Duration;

    fn local_storage() -> FileStorage {
        FileStorage::new(
            FileCache::new(1024 * 1024, None),
            None,
            reqwest::Client::new(),
            PublicUrls::default(),
            Duration::from_secs(5),
        )
    }

    fn text_file(name: &str) -> IncomingFile {
        IncomingFile {
            original_name: name.to_string(),
            bytes: Bytes::from(name.to_string()),
            mime: "text/plain".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_and_oversized_requests_store_nothing() {
        let storage = local_storage();

        let err = process(&storage, UploadRequest::default(), None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let request = UploadRequest {
            files: vec![text_file("a.txt"), text_file("b.txt")],
            urls: vec!["https://a.example".into(), "https://b.example".into()],
        };
        let err = process(&storage, request, None).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        assert!(storage.cache().is_empty().await);
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let storage = local_storage();
        let request = UploadRequest {
            files: vec![text_file("one.txt"), text_file("two.md"), text_file("three")],
            urls: Vec::new(),
        };

        let results = process(&storage, request, Some("relay.example.com"))
            .await
            .unwrap();

        let originals: Vec<_> = results.iter().map(|r| r.original_name.as_str()).collect();
        assert_eq!(originals, ["one.txt", "two.md", "three"]);
        assert!(results[0].name.ends_with(".txt"));
        assert!(results[1].name.ends_with(".md"));
        assert!(!results[2].name.contains('.'));
        assert!(results.iter().all(|r| r.url.starts_with("https://relay.example.com/files/")));
    }

    #[tokio::test]
    async fn malformed_url_aborts_after_earlier_items() {
        let storage = local_storage();
        let request = UploadRequest {
            files: vec![text_file("kept.txt")],
            urls: vec!["not a url".into()],
        };

        let err = process(&storage, request, None).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("not a url"));

        // No rollback of what was already stored.
        assert_eq!(storage.cache().len().await, 1);
    }

    #[test]
    fn forwarded_host_takes_first_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(forwarded_host(&headers), None);

        headers.insert(
            FORWARDED_HOST,
            HeaderValue::from_static("relay.example.com, internal:8080"),
        );
        assert_eq!(forwarded_host(&headers), Some("relay.example.com"));
    }
}
