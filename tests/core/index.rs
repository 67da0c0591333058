// Integration tests for document writes on a single index

use crate::common::{create_test_registry, create_test_services, log_document, test_config};
use quarry::core::document::Document;
use quarry::core::error::QuarryError;
use quarry::core::index::{Index, IndexContext};
use quarry::core::registry::IndexRegistry;
use quarry::core::template::Template;
use quarry::core::types::{FieldType, IndexSettings, Mappings, Property, TIME_FIELD_NAME};
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_create_document_generates_ulid() {
    let test = create_test_registry();
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();

    let first = index.create_document("", log_document("info", 8), false).unwrap();
    let second = index.create_document("", log_document("info", 8), false).unwrap();

    assert_eq!(first.len(), 26);
    assert_ne!(first, second);
    assert_eq!(index.wal_size(), 2);
}

#[test]
fn test_create_document_keeps_caller_id() {
    let test = create_test_registry();
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();

    let id = index
        .create_document("evt-1", log_document("info", 8), true)
        .unwrap();
    assert_eq!(id, "evt-1");

    index.flush().unwrap();
    assert_eq!(test.engine.documents(), vec!["evt-1".to_string()]);
}

#[test]
fn test_new_fields_are_mapped_and_persisted_once() {
    let test = create_test_registry();
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();
    assert_eq!(test.metadata.set_count("logs"), 1);

    index.create_document("", log_document("info", 8), false).unwrap();
    assert_eq!(test.metadata.set_count("logs"), 2);

    // same shape, nothing new to map
    index.create_document("", log_document("warn", 8), false).unwrap();
    assert_eq!(test.metadata.set_count("logs"), 2);

    let mappings = index.mappings().unwrap();
    assert_eq!(mappings.get_property("level").unwrap().field_type, FieldType::Text);
    assert_eq!(
        mappings.get_property(TIME_FIELD_NAME).unwrap().field_type,
        FieldType::Date
    );
}

#[test]
fn test_nested_objects_map_to_dotted_fields() {
    let test = create_test_registry();
    let (index, _) = test.registry.get_or_create("access", "").unwrap();

    let doc = Document::from_json(json!({
        "http": { "status": 200, "secure": true },
        "path": "/health"
    }))
    .unwrap();
    index.create_document("", doc, false).unwrap();

    let mappings = index.mappings().unwrap();
    assert_eq!(
        mappings.get_property("http.status").unwrap().field_type,
        FieldType::Numeric
    );
    assert_eq!(
        mappings.get_property("http.secure").unwrap().field_type,
        FieldType::Bool
    );
}

#[test]
fn test_mismatched_field_type_is_rejected() {
    let test = create_test_registry();
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();
    index.create_document("", log_document("info", 8), false).unwrap();

    let doc = Document::from_json(json!({ "level": 5 })).unwrap();
    let err = index.create_document("", doc, false).unwrap_err();

    assert!(matches!(err, QuarryError::InvalidDocumentField { ref field, .. } if field == "level"));
    assert_eq!(index.wal_size(), 1);
}

#[test]
fn test_pending_writes_survive_reopen() {
    let test = create_test_registry();
    {
        let (index, _) = test.registry.get_or_create("logs", "").unwrap();
        index.create_document("a", log_document("info", 8), false).unwrap();
        index.create_document("b", log_document("info", 8), false).unwrap();
        test.registry.close().unwrap();
    }

    let ctx = IndexContext::new(
        test_config(test.dir.path()),
        Arc::new(test.engine.clone()),
        test.metadata.clone(),
    );
    let reopened = IndexRegistry::open(Arc::new(ctx)).unwrap();
    let index = reopened.get("logs").expect("index should be reloaded");
    assert_eq!(index.wal_size(), 2);

    assert_eq!(index.flush().unwrap(), 2);
    assert_eq!(test.engine.documents(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(index.wal_size(), 0);
    assert_eq!(index.shards()[0].doc_num, 2);
}

#[test]
fn test_template_applies_to_matching_names() {
    let (services, _temp) = create_test_services();

    let mut mappings = Mappings::new();
    mappings.set_property("level", Property::new(FieldType::Keyword));
    let mut template = Template::new("logs", vec!["logs-*".to_string()]);
    template.settings = Some(IndexSettings {
        number_of_replicas: 2,
        ..IndexSettings::default()
    });
    template.mappings = Some(mappings);
    services.templates.put(template).unwrap();

    let (logs, _) = services.registry.get_or_create("logs-app", "").unwrap();
    assert_eq!(logs.settings().unwrap().number_of_replicas, 2);
    assert_eq!(
        logs.mappings().unwrap().get_property("level").unwrap().field_type,
        FieldType::Keyword
    );

    let (metrics, _) = services.registry.get_or_create("metrics", "").unwrap();
    assert_eq!(metrics.settings().unwrap().number_of_replicas, 0);
    assert!(metrics.mappings().unwrap().get_property("level").is_none());
}

#[test]
fn test_undefined_search_analyzer_blocks_flush() {
    let test = create_test_registry();
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();
    index
        .set_settings(IndexSettings {
            default_search_analyzer: Some("missing".to_string()),
            ..IndexSettings::default()
        })
        .unwrap();
    index.create_document("", log_document("info", 8), false).unwrap();

    let err = index.flush().unwrap_err();
    assert!(matches!(err, QuarryError::ConfigError(_)));
    assert_eq!(index.wal_size(), 1);
}

#[test]
fn test_index_new_rejects_reserved_names() {
    let test = create_test_registry();
    let ctx = test.registry.context().clone();

    let err = Index::new("", "disk", ctx.clone()).unwrap_err();
    assert_eq!(err.to_string(), "Invalid index name: index name cannot be empty");

    let err = Index::new("_system", "disk", ctx).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid index name: index name cannot start with _"
    );
}

#[test]
fn test_failed_mapping_save_writes_nothing() {
    let test = create_test_registry();
    let (index, _) = test.registry.get_or_create("logs", "").unwrap();

    test.metadata.set_fail_set(true);
    let err = index
        .create_document("", log_document("info", 8), false)
        .unwrap_err();
    assert!(err.is_persistence(), "unexpected error: {err}");
    assert_eq!(index.wal_size(), 0);
    assert!(index.mappings().unwrap().get_property("level").is_none());

    test.metadata.set_fail_set(false);
    index.create_document("", log_document("info", 8), false).unwrap();
    assert_eq!(index.wal_size(), 1);
    assert!(index.mappings().unwrap().get_property("level").is_some());
}
