//! Tests for request ledgers.

use reliquary_core::{
    ChannelKind, ContentHasher, DeliveredLocation, LedgerRecord, MediaKind, RequestKey,
};
use reliquary_interface::Ledger;
use reliquary_storage::{JsonFileLedger, MemoryLedger};
use tempfile::TempDir;

fn sample_record(source: &str, location: &str) -> LedgerRecord {
    let hash = ContentHasher::hash(source.as_bytes());
    LedgerRecord::new(
        RequestKey::derive(source, None),
        vec![DeliveredLocation {
            location: location.to_string(),
            channel: ChannelKind::Unlimited,
            content_hash: hash,
            kind: MediaKind::Gif,
            extension: "gif".to_string(),
            size_bytes: 42,
        }],
        "requester-1",
    )
}

#[tokio::test]
async fn test_file_ledger_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ledger").join("requests.jsonl");

    let record = sample_record("https://example.com/a.gif", "https://cdn/a.gif");
    {
        let ledger = JsonFileLedger::open(&path).await.unwrap();
        assert!(ledger.lookup(&record.key).await.unwrap().is_none());
        ledger.record(record.clone()).await.unwrap();
        assert_eq!(ledger.lookup(&record.key).await.unwrap(), Some(record.clone()));
    }

    let reopened = JsonFileLedger::open(&path).await.unwrap();
    assert_eq!(reopened.lookup(&record.key).await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_file_ledger_later_line_wins() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("requests.jsonl");

    let ledger = JsonFileLedger::open(&path).await.unwrap();
    let first = sample_record("https://example.com/a.gif", "https://cdn/old.gif");
    let second = sample_record("https://example.com/a.gif", "https://cdn/new.gif");
    ledger.record(first).await.unwrap();
    ledger.record(second.clone()).await.unwrap();
    drop(ledger);

    let reopened = JsonFileLedger::open(&path).await.unwrap();
    let found = reopened.lookup(&second.key).await.unwrap().unwrap();
    assert_eq!(found.items[0].location, "https://cdn/new.gif");
}

#[tokio::test]
async fn test_file_ledger_skips_torn_line() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("requests.jsonl");

    let record = sample_record("https://example.com/b.gif", "https://cdn/b.gif");
    let mut contents = serde_json::to_string(&record).unwrap();
    contents.push('\n');
    contents.push_str("{\"key\":\"trunc");
    std::fs::write(&path, contents).unwrap();

    let ledger = JsonFileLedger::open(&path).await.unwrap();
    assert_eq!(ledger.lookup(&record.key).await.unwrap(), Some(record.clone()));

    let later = sample_record("https://example.com/d.gif", "https://cdn/d.gif");
    ledger.record(later.clone()).await.unwrap();
    drop(ledger);

    let reopened = JsonFileLedger::open(&path).await.unwrap();
    assert_eq!(reopened.lookup(&record.key).await.unwrap(), Some(record));
    assert_eq!(reopened.lookup(&later.key).await.unwrap(), Some(later));

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.ends_with('\n'));
    assert_eq!(contents.lines().count(), 3);
}

#[tokio::test]
async fn test_memory_ledger_write_failure() {
    let ledger = MemoryLedger::new();
    let record = sample_record("https://example.com/c.gif", "https://cdn/c.gif");

    ledger.set_fail_writes(true);
    assert!(ledger.record(record.clone()).await.is_err());
    assert!(ledger.is_empty().await);

    ledger.set_fail_writes(false);
    ledger.record(record.clone()).await.unwrap();
    assert_eq!(ledger.lookup(&record.key).await.unwrap(), Some(record));
    assert_eq!(ledger.lookups(), 1);
}
