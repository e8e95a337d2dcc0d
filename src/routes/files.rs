//! `GET /files/{filename}`: serve stored bytes through a stable proxy path.

use crate::errors::ApiError;
use crate::storage::FileStorage;
use axum::{
    Extension,
    extract::Path,
    response::{IntoResponse, Response},
};
use headers::{CacheControl, ContentLength, HeaderMapExt};
use http::{HeaderValue, header};
use std::time::Duration;

const ONE_YEAR: Duration = Duration::from_secs(31_536_000);

pub async fn get_file(
    Path(filename): Path<String>,
    Extension(storage): Extension<FileStorage>,
) -> Result<Response, ApiError> {
    let file = storage.retrieve(&filename).await.ok_or_else(|| {
        tracing::debug!(%filename, "file not found");
        ApiError::NotFound
    })?;

    let content_type = HeaderValue::from_str(&file.mime)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let size = file.size;

    let mut response = file.data.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.typed_insert(ContentLength(size));
    headers.typed_insert(CacheControl::new().with_public().with_max_age(ONE_YEAR));

    Ok(response)
}
