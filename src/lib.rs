pub mod config;
pub mod errors;
pub mod routes;
pub mod storage;

use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use storage::FileStorage;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub fn router(storage: FileStorage) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route(
            "/api/upload",
            post(routes::upload).layer(DefaultBodyLimit::max(routes::upload::MAX_BODY_BYTES)),
        )
        .route("/files/{filename}", get(routes::get_file))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(storage)),
        )
}
