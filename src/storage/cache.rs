use super::StoredFile;
use moka::future::Cache;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;

/// Remote-backed copies live in an evicting cache weighed by payload size.
/// Local-only files are pinned and never evicted.
#[derive(Clone)]
pub struct FileCache {
    files: Cache<String, StoredFile>,
    pinned: Arc<RwLock<Pinned>>,
    max_bytes: u64,
}

#[derive(Default)]
struct Pinned {
    files: HashMap<String, StoredFile>,
    bytes: u64,
}

impl FileCache {
    pub fn new(max_bytes: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder()
            .weigher(|_name: &String, file: &StoredFile| -> u32 {
                file.size.try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(max_bytes)
            .eviction_listener(|name: Arc<String>, _file, cause| {
                if cause.was_evicted() {
                    tracing::debug!(filename = %name, ?cause, "remote-backed file left local cache");
                }
            });

        if let Some(ttl) = ttl {
            builder = builder.time_to_idle(ttl);
        }

        Self {
            files: builder.build(),
            pinned: Arc::new(RwLock::new(Pinned::default())),
            max_bytes,
        }
    }

    pub fn fits(&self, size: u64) -> bool {
        size <= self.max_bytes && size <= u64::from(u32::MAX)
    }

    pub async fn insert(&self, file: StoredFile) {
        self.files.insert(file.filename.clone(), file).await;
    }

    /// Keep `file` until process exit. Returns `false` when the pinned set is full.
    pub async fn pin(&self, file: StoredFile) -> bool {
        let mut pinned = self.pinned.write().await;
        if pinned.bytes + file.size > self.max_bytes {
            return false;
        }

        pinned.bytes += file.size;
        pinned.files.insert(file.filename.clone(), file);
        true
    }

    pub async fn get(&self, filename: &str) -> Option<StoredFile> {
        if let Some(file) = self.pinned.read().await.files.get(filename) {
            return Some(file.clone());
        }
        self.files.get(filename).await
    }

    pub async fn contains(&self, filename: &str) -> bool {
        self.pinned.read().await.files.contains_key(filename) || self.files.contains_key(filename)
    }

    pub async fn len(&self) -> u64 {
        self.files.run_pending_tasks().await;
        self.files.entry_count() + self.pinned.read().await.files.len() as u64
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn file(name: &str, payload: &'static [u8]) -> StoredFile {
        StoredFile {
            filename: name.to_string(),
            data: Bytes::from_static(payload),
            mime: "text/plain".to_string(),
            size: payload.len() as u64,
        }
    }

    #[tokio::test]
    async fn insert_then_get() {
        let cache = FileCache::new(1024, None);
        cache.insert(file("a.txt", b"hello")).await;

        let hit = cache.get("a.txt").await.unwrap();
        assert_eq!(hit.data, Bytes::from_static(b"hello"));
        assert_eq!(hit.size, 5);
        assert!(cache.get("b.txt").await.is_none());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn capacity_is_bounded_by_bytes() {
        let cache = FileCache::new(8, None);
        assert!(cache.fits(8));
        assert!(!cache.fits(9));

        cache.insert(file("a", b"12345")).await;
        cache.insert(file("b", b"67890")).await;
        cache.files.run_pending_tasks().await;

        assert!(cache.files.weighted_size() <= 8);
    }

    #[tokio::test]
    async fn pinned_file_survives_a_full_hot_cache() {
        let cache = FileCache::new(100, None);
        for name in ["a", "b", "c", "d"] {
            cache
                .insert(file(name, b"0123456789012345678901234"))
                .await;
            for _ in 0..20 {
                cache.get(name).await;
            }
        }

        assert!(cache.pin(file("new.txt", b"0123456789012345678901234")).await);
        cache.files.run_pending_tasks().await;

        let kept = cache.get("new.txt").await.unwrap();
        assert_eq!(kept.size, 25);
        assert!(cache.contains("new.txt").await);
    }

    #[tokio::test]
    async fn pinned_set_refuses_past_its_bound() {
        let cache = FileCache::new(10, None);
        assert!(cache.pin(file("a", b"123456")).await);
        assert!(!cache.pin(file("b", b"123456")).await);

        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert_eq!(cache.len().await, 1);
    }
}
