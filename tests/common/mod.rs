//! Shared setup for HTTP-level tests.

use axum_test::TestServer;
use file_relay::config::RemoteConfig;
use file_relay::router;
use file_relay::storage::{FileCache, FileStorage, PublicUrls, RemoteStore, SupabaseStore};
use std::sync::Arc;
use std::time::Duration;

/// Storage with no remote store, as when credentials are missing.
pub fn local_storage() -> FileStorage {
    FileStorage::new(
        FileCache::new(64 * 1024 * 1024, None),
        None,
        reqwest::Client::new(),
        PublicUrls::default(),
        Duration::from_secs(5),
    )
}

/// Storage backed by a Supabase-compatible endpoint at `url`.
pub fn remote_storage(url: String) -> FileStorage {
    let client = reqwest::Client::new();
    let remote: Arc<dyn RemoteStore> = Arc::new(SupabaseStore::new(
        client.clone(),
        RemoteConfig {
            url,
            key: "test-anon-key".to_string(),
            bucket: "auten".to_string(),
        },
        Duration::from_secs(5),
        Duration::from_secs(5),
    ));

    FileStorage::new(
        FileCache::new(64 * 1024 * 1024, None),
        Some(remote),
        client,
        PublicUrls::default(),
        Duration::from_secs(5),
    )
}

pub fn server(storage: FileStorage) -> TestServer {
    TestServer::new(router(storage)).unwrap()
}
