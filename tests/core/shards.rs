// Integration tests for flushing and shard rollover

use crate::common::{
    create_test_registry, create_test_registry_with, create_test_services, log_document,
    test_config,
};
use quarry::core::error::QuarryError;
use quarry::core::services::Services;
use quarry::core::storage::Backend;
use std::fs;
use std::sync::Barrier;
use std::thread;

#[test]
fn test_rollover_past_max_size() {
    let test = create_test_registry_with(|config| config.shard.max_size = 1024);
    let (index, _) = test.registry.get_or_create("logs-2024", "disk").unwrap();

    for _ in 0..20 {
        index.create_document("", log_document("info", 100), false).unwrap();
    }
    index.check_shards().unwrap();

    let shards = index.shards();
    let ids: Vec<u64> = shards.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(index.shard_num(), 2);
    assert_eq!(shards[0].doc_num, 20);
    assert!(shards[0].storage_size > 1024);
    assert_eq!(shards[1].storage_size, 0);
    assert_eq!(index.wal_size(), 0);

    let data = test.dir.path();
    assert_eq!(
        test.engine.opened(),
        vec![
            Backend::Disk {
                path: data.join("logs-2024").join("000000")
            },
            Backend::Disk {
                path: data.join("logs-2024").join("000001")
            },
        ]
    );
}

#[test]
fn test_below_max_size_only_flushes() {
    let test = create_test_registry_with(|config| config.shard.max_size = 1024 * 1024);
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();

    for _ in 0..3 {
        index.create_document("", log_document("info", 32), false).unwrap();
    }
    index.check_shards().unwrap();

    assert_eq!(index.shard_num(), 1);
    assert_eq!(index.shards()[0].doc_num, 3);
    assert_eq!(index.wal_size(), 0);
    assert_eq!(test.engine.opened().len(), 1);
}

#[test]
fn test_writes_after_rollover_land_in_new_shard() {
    let test = create_test_registry_with(|config| config.shard.max_size = 256);
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();

    for _ in 0..4 {
        index.create_document("", log_document("info", 100), false).unwrap();
    }
    index.check_shards().unwrap();
    let sealed = index.shards()[0].clone();

    index.create_document("", log_document("error", 10), false).unwrap();
    index.check_shards().unwrap();

    let shards = index.shards();
    assert_eq!(shards.len(), 2);
    assert_eq!(shards[0], sealed);
    assert_eq!(shards[1].doc_num, 1);
}

#[test]
fn test_failed_open_leaves_shards_unchanged() {
    let test = create_test_registry_with(|config| config.shard.max_size = 128);
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();
    for _ in 0..4 {
        index.create_document("", log_document("info", 64), false).unwrap();
    }
    index.flush().unwrap();

    test.engine.set_fail_open(true);
    let err = index.check_shards().unwrap_err();
    assert!(matches!(err, QuarryError::ShardError { shard: 1, .. }));
    assert_eq!(index.shard_num(), 1);
    assert_eq!(index.shards().len(), 1);

    // the old writer is still usable
    index.create_document("", log_document("info", 8), false).unwrap();
    index.flush().unwrap();
    assert_eq!(index.shards()[0].doc_num, 5);

    test.engine.set_fail_open(false);
    index.check_shards().unwrap();
    assert_eq!(index.shard_num(), 2);
}

#[test]
fn test_object_store_backend_gets_bucket() {
    let test = create_test_registry_with(|config| {
        config.storage.s3.bucket = "search-logs".to_string();
    });
    let (index, _) = test.registry.get_or_create("events", "s3").unwrap();
    index.create_document("", log_document("info", 8), false).unwrap();
    index.flush().unwrap();

    let opened = test.engine.opened();
    assert_eq!(
        opened,
        vec![Backend::S3 {
            bucket: "search-logs".to_string(),
            prefix: "events/000000".to_string(),
        }]
    );
}

#[test]
fn test_tantivy_shard_written_to_disk() {
    let (services, temp) = create_test_services();
    let (index, _) = services.registry.get_or_create("logs", "disk").unwrap();

    index.create_document("", log_document("info", 8), false).unwrap();
    index.check_shards().unwrap();

    assert_eq!(index.shards()[0].doc_num, 1);
    assert!(temp.path().join("logs").join("000000").join("meta.json").exists());
    services.shutdown().unwrap();
}

#[test]
fn test_tantivy_refuses_object_store() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut config = test_config(temp.path());
    config.storage.minio.bucket = "search-local".to_string();
    let services = Services::new(config).unwrap();
    let (index, _) = services.registry.get_or_create("logs", "minio").unwrap();
    index.create_document("", log_document("info", 8), false).unwrap();

    let err = index.check_shards().unwrap_err();
    assert!(matches!(err, QuarryError::ShardError { shard: 0, .. }));
    assert_eq!(index.wal_size(), 1);
}

#[test]
fn test_failed_save_leaves_rollover_undone() {
    let test = create_test_registry_with(|config| config.shard.max_size = 128);
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();
    for _ in 0..4 {
        index.create_document("", log_document("info", 64), false).unwrap();
    }
    index.flush().unwrap();

    test.metadata.set_fail_set(true);
    let err = index.check_shards().unwrap_err();
    assert!(err.is_persistence(), "unexpected error: {err}");
    assert_eq!(index.shard_num(), 1);
    assert_eq!(index.shards().len(), 1);
    // the writer opened for shard 1 was released
    assert_eq!(test.engine.closes(), 1);
    assert_eq!(test.metadata.definition("logs").unwrap().shard_num, 1);

    test.metadata.set_fail_set(false);
    index.check_shards().unwrap();
    let ids: Vec<u64> = index.shards().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(test.metadata.definition("logs").unwrap().shard_num, 2);
}

#[test]
fn test_failed_save_keeps_wal_and_stats() {
    let test = create_test_registry();
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();
    index.create_document("a", log_document("info", 8), false).unwrap();
    index.create_document("b", log_document("info", 8), false).unwrap();

    test.metadata.set_fail_set(true);
    let err = index.flush().unwrap_err();
    assert!(err.is_persistence(), "unexpected error: {err}");
    assert_eq!(index.wal_size(), 2);
    assert_eq!(index.shards()[0].doc_num, 0);
    assert_eq!(test.metadata.definition("logs").unwrap().shards[0].doc_num, 0);

    test.metadata.set_fail_set(false);
    assert_eq!(index.flush().unwrap(), 2);
    assert_eq!(index.wal_size(), 0);
    assert_eq!(index.shards()[0].doc_num, 2);

    let stored = test.metadata.definition("logs").unwrap();
    assert_eq!(stored.shards[0].doc_num, 2);
    assert_eq!(stored.shards[0].storage_size, index.shards()[0].storage_size);
    assert_eq!(stored.wal_applied_seq, 2);
    // committed once, only counted again
    assert_eq!(test.engine.documents(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_reopen_skips_entries_saved_as_applied() {
    let test = create_test_registry();
    let wal_file = test.dir.path().join("_wal").join("logs").join("wal.log");
    {
        let (index, _) = test.registry.get_or_create("logs", "").unwrap();
        index.create_document("a", log_document("info", 8), false).unwrap();
        index.create_document("b", log_document("info", 8), false).unwrap();

        // put the log back as if the process died before the WAL reset
        let before_flush = fs::read(&wal_file).unwrap();
        index.flush().unwrap();
        test.registry.close().unwrap();
        fs::write(&wal_file, before_flush).unwrap();
    }

    let reopened = test.reopen();
    let index = reopened.get("logs").expect("index should be reloaded");
    assert_eq!(index.wal_size(), 0);
    assert_eq!(index.flush().unwrap(), 0);
    assert_eq!(index.shards()[0].doc_num, 2);

    index.create_document("c", log_document("info", 8), false).unwrap();
    assert_eq!(index.flush().unwrap(), 1);
    assert_eq!(index.shards()[0].doc_num, 3);
    assert_eq!(
        test.engine.documents(),
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );
}

#[test]
fn test_concurrent_check_shards_rolls_over_once() {
    const THREADS: usize = 8;
    let test = create_test_registry_with(|config| config.shard.max_size = 128);
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();
    for _ in 0..4 {
        index.create_document("", log_document("info", 64), false).unwrap();
    }
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                barrier.wait();
                index.check_shards().expect("check_shards failed");
            });
        }
    });

    assert_eq!(index.shard_num(), 2);
    let ids: Vec<u64> = index.shards().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(index.shards()[0].doc_num, 4);
    assert_eq!(test.engine.opened().len(), 2);
}
