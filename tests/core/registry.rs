// Integration tests for the index registry

use crate::common::{
    create_test_registry, create_test_registry_with, create_test_services, log_document,
    test_config,
};
use quarry::core::error::QuarryError;
use quarry::core::index::Index;
use quarry::core::registry::VERSION;
use quarry::core::services::Services;
use quarry::core::storage::{Backend, MetadataStore};
use quarry::core::types::index_key;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_concurrent_get_or_create_creates_once() {
    const THREADS: usize = 16;
    let test = create_test_registry();
    let barrier = Barrier::new(THREADS);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    test.registry
                        .get_or_create("logs-2024", "disk")
                        .expect("get_or_create failed")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect()
    });

    let created = results.iter().filter(|(_, existed)| !existed).count();
    assert_eq!(created, 1, "exactly one caller should create the index");

    let first = &results[0].0;
    assert!(results.iter().all(|(index, _)| Arc::ptr_eq(index, first)));
    assert_eq!(test.metadata.set_count("logs-2024"), 1);
    assert_eq!(test.registry.len(), 1);
}

#[test]
fn test_concurrent_get_or_create_distinct_names() {
    let test = create_test_registry();
    let names: Vec<String> = (0..8).map(|i| format!("index-{i}")).collect();

    thread::scope(|s| {
        for name in &names {
            for _ in 0..4 {
                let registry = &test.registry;
                s.spawn(move || {
                    registry
                        .get_or_create(name, "")
                        .expect("get_or_create failed");
                });
            }
        }
    });

    assert_eq!(test.registry.list_name(), names);
    for name in &names {
        assert_eq!(test.metadata.set_count(name), 1, "index {name}");
    }
}

#[test]
fn test_get_or_create_rejects_invalid_names() {
    let test = create_test_registry();

    let err = test.registry.get_or_create("", "disk").unwrap_err();
    assert!(matches!(err, QuarryError::InvalidIndexName(ref m) if m.contains("cannot be empty")));

    let err = test.registry.get_or_create("_system", "disk").unwrap_err();
    assert!(matches!(err, QuarryError::InvalidIndexName(ref m) if m.contains("cannot start with _")));

    let err = test.registry.get_or_create("logs/2024", "disk").unwrap_err();
    assert!(err.is_bad_request());

    assert!(test.registry.is_empty());
    assert_eq!(test.metadata.set_count(""), 0);
    assert_eq!(test.metadata.set_count("_system"), 0);
}

#[test]
fn test_get_or_create_rejects_unknown_storage_type() {
    let test = create_test_registry();

    let err = test.registry.get_or_create("logs", "tape").unwrap_err();
    assert!(matches!(err, QuarryError::InvalidStorageType(_)));
    assert!(test.registry.get("logs").is_none());
}

#[test]
fn test_persistence_failure_caches_nothing() {
    let test = create_test_registry();
    test.metadata.set_fail_set(true);

    let err = test.registry.get_or_create("logs", "disk").unwrap_err();
    assert!(err.is_persistence(), "unexpected error: {err}");
    assert!(test.registry.is_empty());

    test.metadata.set_fail_set(false);
    let (index, existed) = test.registry.get_or_create("logs", "disk").unwrap();
    assert!(!existed);
    assert!(!index.is_closed());
    assert_eq!(test.metadata.set_count("logs"), 1);
}

#[test]
fn test_delete_unknown_is_noop() {
    let test = create_test_registry();
    test.registry.get_or_create("logs", "disk").unwrap();

    test.registry.delete("unknown");

    assert_eq!(test.registry.list_name(), vec!["logs"]);
}

#[test]
fn test_delete_closes_even_when_close_fails() {
    let test = create_test_registry();
    let (index, _) = test.registry.get_or_create("logs", "disk").unwrap();
    index.create_document("", log_document("info", 16), false).unwrap();
    index.flush().unwrap();

    test.engine.set_fail_close(true);
    test.registry.delete("logs");

    assert!(test.registry.get("logs").is_none());
    assert_eq!(test.engine.closes(), 1);
    assert!(index.is_closed());

    let err = index
        .create_document("", log_document("info", 16), false)
        .unwrap_err();
    assert!(matches!(err, QuarryError::IndexClosed(_)));
}

#[test]
fn test_delete_index_unknown_is_not_found() {
    let test = create_test_registry();

    let err = test.registry.delete_index("missing").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_delete_index_drops_definition() {
    let test = create_test_registry();
    test.registry.get_or_create("logs", "disk").unwrap();
    assert!(test.dir.path().join("_wal").join("logs").exists());

    test.registry.delete_index("logs").unwrap();

    assert!(test.registry.is_empty());
    assert!(test.metadata.definition("logs").is_none());
    assert!(!test.dir.path().join("_wal").join("logs").exists());

    // a later reference starts from scratch
    let (_, existed) = test.registry.get_or_create("logs", "disk").unwrap();
    assert!(!existed);
}

#[test]
fn test_list_stat_sorted_with_empty_wal() {
    let test = create_test_registry();
    for name in ["metrics", "audit", "logs"] {
        test.registry.get_or_create(name, "").unwrap();
    }

    let stats = test.registry.list_stat();
    let names: Vec<&str> = stats.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["audit", "logs", "metrics"]);
    assert!(stats.iter().all(|s| s.wal_size == 0));
    assert!(stats.iter().all(|s| s.shard_num == 1 && s.doc_num == 0));
}

#[test]
fn test_list_stat_counts_pending_writes() {
    let test = create_test_registry();
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();
    for _ in 0..3 {
        index.create_document("", log_document("warn", 8), false).unwrap();
    }

    let stats = test.registry.list_stat();
    assert_eq!(stats[0].wal_size, 3);
}

#[test]
fn test_close_empties_registry() {
    let test = create_test_registry();
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();
    test.registry.get_or_create("metrics", "").unwrap();

    test.registry.close().unwrap();

    assert!(test.registry.is_empty());
    assert!(index.is_closed());
}

#[test]
fn test_evicted_index_reloads_with_state() {
    let test = create_test_registry_with(|config| config.shard.max_size = 128);
    {
        let (index, _) = test.registry.get_or_create("logs", "disk").unwrap();
        for _ in 0..4 {
            index.create_document("", log_document("info", 64), false).unwrap();
        }
        index.check_shards().unwrap();
        assert_eq!(index.shard_num(), 2);
    }

    let evicted = test.registry.evict_idle(Duration::ZERO);
    assert_eq!(evicted, vec!["logs".to_string()]);
    assert!(test.registry.is_empty());

    let (index, existed) = test.registry.get_or_create("logs", "disk").unwrap();
    assert!(existed);
    assert_eq!(index.shard_num(), 2);
    let ids: Vec<u64> = index.shards().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[test]
fn test_evict_idle_keeps_recently_used() {
    let test = create_test_registry();
    test.registry.get_or_create("logs", "").unwrap();

    let evicted = test.registry.evict_idle(Duration::from_secs(3600));
    assert!(evicted.is_empty());
    assert_eq!(test.registry.len(), 1);
}

#[test]
fn test_store_index_then_get_then_delete() {
    let test = create_test_registry();
    let index = Arc::new(Index::new("manual", "disk", test.registry.context().clone()).unwrap());

    test.registry.store_index(index.clone()).unwrap();
    assert!(Arc::ptr_eq(&index, &test.registry.get("manual").unwrap()));
    assert_eq!(test.metadata.set_count("manual"), 1);

    test.registry.delete("manual");
    assert!(test.registry.get("manual").is_none());
    assert!(index.is_closed());
}

#[test]
fn test_close_stops_at_first_failure() {
    let test = create_test_registry();
    for name in ["audit", "logs"] {
        let (index, _) = test.registry.get_or_create(name, "").unwrap();
        index.create_document("", log_document("info", 8), false).unwrap();
        index.flush().unwrap();
    }

    test.engine.set_fail_close(true);
    let err = test.registry.close().unwrap_err();
    assert!(matches!(err, QuarryError::StorageError(_)));

    // both indexes stay registered; the one after the failure is untouched
    assert_eq!(test.registry.list_name(), vec!["audit", "logs"]);
    assert_eq!(test.engine.closes(), 1);
    assert!(test.registry.get("audit").unwrap().is_closed());
    assert!(!test.registry.get("logs").unwrap().is_closed());
}

#[test]
fn test_dot_names_stay_inside_data_path() {
    let test = create_test_registry_with(|config| {
        config.storage.data_path = config.storage.data_path.join("data");
    });
    let data = test.dir.path().join("data");
    let sentinel = test.dir.path().join("sentinel.txt");
    fs::write(&sentinel, "keep").unwrap();
    test.registry.get_or_create("logs", "disk").unwrap();

    for name in ["..", "."] {
        let (index, existed) = test.registry.get_or_create(name, "disk").unwrap();
        assert!(!existed);
        index.create_document("", log_document("info", 8), false).unwrap();
        index.flush().unwrap();

        test.registry.delete_index(name).unwrap();
        assert!(test.metadata.definition(name).is_none());
    }

    assert_eq!(
        test.engine.opened(),
        vec![
            Backend::Disk {
                path: data.join("%2E%2E").join("000000")
            },
            Backend::Disk {
                path: data.join("%2E").join("000000")
            },
        ]
    );
    assert!(sentinel.exists());
    assert!(data.join("_wal").join("logs").exists());
    assert_eq!(test.registry.list_name(), vec!["logs"]);
}

#[test]
fn test_dot_prefixed_name_on_file_metadata() {
    let temp = tempfile::TempDir::new().unwrap();
    {
        let services = Services::new(test_config(temp.path())).unwrap();
        let (index, existed) = services.registry.get_or_create(".kibana", "disk").unwrap();
        assert!(!existed);
        index.create_document("", log_document("info", 8), false).unwrap();
        index.check_shards().unwrap();
        services.shutdown().unwrap();
    }

    let services = Services::new(test_config(temp.path())).unwrap();
    let index = services.registry.get(".kibana").expect("index should be reloaded");
    assert_eq!(index.shards()[0].doc_num, 1);
    services.shutdown().unwrap();
}

#[test]
fn test_index_named_version_keeps_version_marker() {
    let (services, temp) = create_test_services();

    let (index, existed) = services.registry.get_or_create("version", "").unwrap();
    assert!(!existed);
    assert_eq!(index.name(), "version");
    assert_eq!(services.registry.version().unwrap().as_deref(), Some(VERSION));
    services.shutdown().unwrap();

    let reopened = Services::new(test_config(temp.path())).unwrap();
    assert_eq!(reopened.registry.list_name(), vec!["version"]);
    assert_eq!(reopened.registry.version().unwrap().as_deref(), Some(VERSION));
    reopened.shutdown().unwrap();
}

#[test]
fn test_open_skips_unreadable_definitions() {
    let test = create_test_registry();
    test.registry.get_or_create("logs", "").unwrap();
    test.metadata
        .set(&index_key("broken"), b"{ not json")
        .unwrap();
    let misfiled = test.metadata.get(&index_key("logs")).unwrap().unwrap();
    test.metadata.set(&index_key("other"), &misfiled).unwrap();
    test.registry.close().unwrap();

    let reopened = test.reopen();
    assert_eq!(reopened.list_name(), vec!["logs"]);
}

#[test]
fn test_services_start_with_corrupt_definition_file() {
    let temp = tempfile::TempDir::new().unwrap();
    {
        let services = Services::new(test_config(temp.path())).unwrap();
        services.registry.get_or_create("logs", "").unwrap();
        services.shutdown().unwrap();
    }
    let broken = temp.path().join("_metadata").join("index").join("broken.json");
    fs::write(&broken, "{").unwrap();

    let services = Services::new(test_config(temp.path())).unwrap();
    assert_eq!(services.registry.list_name(), vec!["logs"]);
    services.shutdown().unwrap();
}
