use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Internal server error")]
    Internal,
    #[error("File not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("Failed to upload file {name}")]
    UploadFailed { name: String },
    #[error("Failed to upload from URL: {url}")]
    FetchFailed { url: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::PayloadTooLarge(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal | ApiError::UploadFailed { .. } | ApiError::FetchFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // The file proxy answers with a bare error object, upload endpoints with an envelope.
        let body = match self {
            ApiError::NotFound => json!({ "error": self.to_string() }),
            _ => json!({ "success": false, "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_violations_map_to_bad_request() {
        assert_eq!(
            ApiError::BadRequest("no input".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::PayloadTooLarge("too big".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upstream_failures_name_the_offending_item() {
        let err = ApiError::FetchFailed {
            url: "https://example.com/a.png".into(),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("https://example.com/a.png"));

        let err = ApiError::UploadFailed {
            name: "photo.jpg".into(),
        };
        assert!(err.to_string().contains("photo.jpg"));
    }
}
