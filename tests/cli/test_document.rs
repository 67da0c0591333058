//! Tests for put-document and check-shards

use crate::cli::test_helpers::{create_cli_test_services, setup_index_with_documents};
use quarry::cli::commands::document::{execute as put_document, DocumentArgs};
use quarry::cli::commands::shards::{execute as check_shards, ShardsArgs};
use quarry::cli::OutputFormat;
use std::io::Write;

fn document_args(index: &str, document: &str) -> DocumentArgs {
    DocumentArgs {
        index: index.to_string(),
        document: Some(document.to_string()),
        file: None,
        id: None,
        upsert: false,
        no_check: false,
    }
}

#[test]
fn test_put_document_creates_index() {
    let (services, _temp) = create_cli_test_services();

    let args = document_args("logs", r#"{"level": "info", "msg": "started"}"#);
    assert!(put_document(args, &services, OutputFormat::Human).is_ok());

    let index = services.registry.get("logs").expect("index should exist");
    assert_eq!(index.shards()[0].doc_num, 1);
    assert_eq!(index.wal_size(), 0);
}

#[test]
fn test_put_document_no_check_leaves_wal() {
    let (services, _temp) = create_cli_test_services();

    let mut args = document_args("logs", r#"{"level": "info"}"#);
    args.id = Some("evt-1".to_string());
    args.no_check = true;
    assert!(put_document(args, &services, OutputFormat::Json).is_ok());

    let index = services.registry.get("logs").unwrap();
    assert_eq!(index.wal_size(), 1);
    assert_eq!(index.shards()[0].doc_num, 0);
}

#[test]
fn test_put_document_rejects_non_object() {
    let (services, _temp) = create_cli_test_services();

    let args = document_args("logs", "[1, 2, 3]");
    assert!(put_document(args, &services, OutputFormat::Human).is_err());
}

#[test]
fn test_put_document_from_file() {
    let (services, temp) = create_cli_test_services();
    let path = temp.path().join("events.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    for i in 0..5 {
        writeln!(file, r#"{{"seq": {i}, "level": "debug"}}"#).unwrap();
    }
    drop(file);

    let args = DocumentArgs {
        index: "events".to_string(),
        document: None,
        file: Some(path),
        id: None,
        upsert: false,
        no_check: false,
    };
    assert!(put_document(args, &services, OutputFormat::Json).is_ok());

    let index = services.registry.get("events").unwrap();
    assert_eq!(index.shards()[0].doc_num, 5);
}

#[test]
fn test_check_shards_all_indexes() {
    let (services, _temp) = create_cli_test_services();
    setup_index_with_documents(&services, "logs", 2);
    setup_index_with_documents(&services, "metrics", 1);

    let args = ShardsArgs { index: None };
    assert!(check_shards(args, &services, OutputFormat::Human).is_ok());
}

#[test]
fn test_check_shards_missing_index() {
    let (services, _temp) = create_cli_test_services();

    let args = ShardsArgs {
        index: Some("missing".to_string()),
    };
    let err = check_shards(args, &services, OutputFormat::Json).unwrap_err();
    assert!(err.to_string().contains("not found"));
}
