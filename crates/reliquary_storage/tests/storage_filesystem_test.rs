//! Tests for the filesystem content store.

use bytes::Bytes;
use reliquary_core::{ContentHasher, MediaKind, PutMetadata};
use reliquary_error::{ReliquaryErrorKind, StorageErrorKind};
use reliquary_storage::{ContentStore, FileSystemContentStore, MemoryContentStore};
use std::sync::Arc;
use tempfile::TempDir;

fn files_under(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            found.extend(files_under(&path));
        } else {
            found.push(path);
        }
    }
    found
}

#[tokio::test]
async fn test_store_and_retrieve() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();

    let bytes = Bytes::from_static(b"GIF89a hello");
    let hash = ContentHasher::hash(&bytes);

    let stored = store
        .put(&hash, MediaKind::Gif, "gif", &bytes, &PutMetadata::for_requester("alice"))
        .await
        .unwrap();

    assert!(stored.newly_stored);
    assert_eq!(store.backend_name(), "filesystem");
    assert_eq!(stored.record.content_hash, hash);
    assert_eq!(stored.record.size_bytes, bytes.len() as u64);
    assert_eq!(stored.record.last_requester_id.as_deref(), Some("alice"));
    assert!(stored.record.stored_location.contains("gifs"));
    assert!(stored.record.stored_location.ends_with(&format!("{}.gif", hash)));

    let retrieved = store.retrieve(&stored.record).await.unwrap();
    assert_eq!(retrieved, bytes);

    let found = store.exists(&hash, MediaKind::Gif).await.unwrap();
    assert_eq!(found, Some(stored.record));
}

#[tokio::test]
async fn test_deduplication_ignores_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();

    let bytes = Bytes::from_static(b"duplicate clip");
    let hash = ContentHasher::hash(&bytes);

    let first = store
        .put(&hash, MediaKind::Video, "mp4", &bytes, &PutMetadata::for_requester("alice"))
        .await
        .unwrap();
    let second = store
        .put(&hash, MediaKind::Video, "mp4", &bytes, &PutMetadata::for_requester("bob"))
        .await
        .unwrap();

    assert!(first.newly_stored);
    assert!(!second.newly_stored);
    assert_eq!(first.record.stored_location, second.record.stored_location);
    assert_eq!(first.record.created_at, second.record.created_at);
    assert_eq!(second.record.last_requester_id.as_deref(), Some("bob"));

    // One artifact plus its record, nothing else
    assert_eq!(files_under(temp_dir.path()).len(), 2);

    let reread = store.exists(&hash, MediaKind::Video).await.unwrap().unwrap();
    assert_eq!(reread.last_requester_id.as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_hash_verification() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();

    let bytes = Bytes::from_static(b"original");
    let wrong = ContentHasher::hash(b"something else");

    let err = store
        .put(&wrong, MediaKind::Image, "png", &bytes, &PutMetadata::default())
        .await
        .unwrap_err();
    match err.kind() {
        ReliquaryErrorKind::Storage(e) => {
            assert!(matches!(e.kind, StorageErrorKind::HashMismatch { .. }))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.exists(&wrong, MediaKind::Image).await.unwrap().is_none());
}

#[tokio::test]
async fn test_retrieve_detects_tampering() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();

    let bytes = Bytes::from_static(b"pristine");
    let hash = ContentHasher::hash(&bytes);
    let stored = store
        .put(&hash, MediaKind::Image, "png", &bytes, &PutMetadata::default())
        .await
        .unwrap();

    std::fs::write(&stored.record.stored_location, b"tampered").unwrap();

    assert!(store.retrieve(&stored.record).await.is_err());
}

#[tokio::test]
async fn test_concurrent_puts_produce_one_artifact() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FileSystemContentStore::new(temp_dir.path()).unwrap());

    let bytes = Bytes::from(vec![7u8; 64 * 1024]);
    let hash = ContentHasher::hash(&bytes);

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        let bytes = bytes.clone();
        let hash = hash.clone();
        handles.push(tokio::spawn(async move {
            store
                .put(
                    &hash,
                    MediaKind::Video,
                    "mp4",
                    &bytes,
                    &PutMetadata::for_requester(format!("user-{i}")),
                )
                .await
                .unwrap()
        }));
    }

    let mut created = std::collections::HashSet::new();
    let mut locations = std::collections::HashSet::new();
    let mut fresh = 0;
    for handle in handles {
        let stored = handle.await.unwrap();
        created.insert(stored.record.created_at);
        locations.insert(stored.record.stored_location.clone());
        if stored.newly_stored {
            fresh += 1;
        }
    }

    assert_eq!(fresh, 1, "exactly one writer stores the bytes");
    assert_eq!(created.len(), 1, "everyone sees the first writer's record");
    assert_eq!(locations.len(), 1);

    let files = files_under(temp_dir.path());
    assert_eq!(files.len(), 2, "no temp files left behind: {files:?}");
}

#[tokio::test]
async fn test_refresh_location() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();

    let bytes = Bytes::from_static(b"upload me");
    let hash = ContentHasher::hash(&bytes);
    store
        .put(&hash, MediaKind::Gif, "gif", &bytes, &PutMetadata::default())
        .await
        .unwrap();

    let refreshed = store
        .refresh_location(&hash, MediaKind::Gif, "https://cdn.example.com/x.gif")
        .await
        .unwrap();
    assert_eq!(
        refreshed.public_location.as_deref(),
        Some("https://cdn.example.com/x.gif")
    );

    let reread = store.exists(&hash, MediaKind::Gif).await.unwrap().unwrap();
    assert_eq!(reread.public_location, refreshed.public_location);

    let missing = ContentHasher::hash(b"never stored");
    assert!(
        store
            .refresh_location(&missing, MediaKind::Gif, "https://cdn.example.com/y.gif")
            .await
            .is_err()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_requester_refresh_keeps_concurrent_public_location() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FileSystemContentStore::new(temp_dir.path()).unwrap());

    for round in 0..100 {
        let bytes = Bytes::from(format!("converging clip {round}"));
        let hash = ContentHasher::hash(&bytes);
        store
            .put(&hash, MediaKind::Video, "mp4", &bytes, &PutMetadata::for_requester("a"))
            .await
            .unwrap();

        let location = format!("https://cdn.example.com/{round}.mp4");
        let refresh = {
            let store = store.clone();
            let hash = hash.clone();
            let location = location.clone();
            tokio::spawn(async move {
                store
                    .refresh_location(&hash, MediaKind::Video, &location)
                    .await
                    .unwrap()
            })
        };
        let put = {
            let store = store.clone();
            let hash = hash.clone();
            tokio::spawn(async move {
                store
                    .put(&hash, MediaKind::Video, "mp4", &bytes, &PutMetadata::for_requester("b"))
                    .await
                    .unwrap()
            })
        };
        refresh.await.unwrap();
        let stored = put.await.unwrap();
        assert!(!stored.newly_stored);

        let record = store.exists(&hash, MediaKind::Video).await.unwrap().unwrap();
        assert_eq!(
            record.public_location.as_deref(),
            Some(location.as_str()),
            "round {round} lost the public location"
        );
        assert_eq!(record.last_requester_id.as_deref(), Some("b"));
    }
}

#[tokio::test]
async fn test_same_bytes_different_kinds_are_separate() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();

    let bytes = Bytes::from_static(b"ambiguous");
    let hash = ContentHasher::hash(&bytes);

    store
        .put(&hash, MediaKind::Gif, "gif", &bytes, &PutMetadata::default())
        .await
        .unwrap();

    assert!(store.exists(&hash, MediaKind::Gif).await.unwrap().is_some());
    assert!(store.exists(&hash, MediaKind::Image).await.unwrap().is_none());
}

#[tokio::test]
async fn test_memory_store_failure_does_not_poison_retry() {
    let store = MemoryContentStore::new();
    let bytes = Bytes::from_static(b"retry me");
    let hash = ContentHasher::hash(&bytes);

    store.fail_next_puts(1);
    let err = store
        .put(&hash, MediaKind::Image, "png", &bytes, &PutMetadata::default())
        .await;
    assert!(err.is_err());
    assert!(store.is_empty().await);

    let stored = store
        .put(&hash, MediaKind::Image, "png", &bytes, &PutMetadata::default())
        .await
        .unwrap();
    assert!(stored.newly_stored);
    assert_eq!(store.physical_writes(), 1);
    assert_eq!(store.retrieve(&stored.record).await.unwrap(), bytes);
}
