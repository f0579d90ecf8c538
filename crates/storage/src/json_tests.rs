// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

use super::*;
use serde::Deserialize;

fn temp_store() -> (tempfile::TempDir, JsonStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStore::open(dir.path()).unwrap();
    (dir, store)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Record {
    name: String,
    value: i32,
}

#[test]
fn save_and_load_round_trip() {
    let (_dir, store) = temp_store();
    let record = Record {
        name: "test".to_string(),
        value: 42,
    };

    store.save("records", "r1", &record).unwrap();
    let loaded: Record = store.load("records", "r1").unwrap();
    assert_eq!(record, loaded);
}

#[test]
fn load_missing_returns_not_found() {
    let (_dir, store) = temp_store();
    let result: Result<Record, _> = store.load("records", "missing");
    assert!(matches!(
        result,
        Err(pb_core::ports::StorageError::NotFound { .. })
    ));
}

#[test]
fn save_overwrites_by_key() {
    let (_dir, store) = temp_store();
    store
        .save("records", "r1", &Record { name: "a".into(), value: 1 })
        .unwrap();
    store
        .save("records", "r1", &Record { name: "a".into(), value: 2 })
        .unwrap();
    let loaded: Record = store.load("records", "r1").unwrap();
    assert_eq!(loaded.value, 2);
}

#[test]
fn list_returns_ids_of_kind() {
    let (_dir, store) = temp_store();
    for id in ["a", "b", "c"] {
        store
            .save("items", id, &Record { name: id.into(), value: 0 })
            .unwrap();
    }

    let mut ids = store.list("items").unwrap();
    ids.sort();
    assert_eq!(ids, ["a", "b", "c"]);
    assert!(store.list("nothing").unwrap().is_empty());
}

#[test]
fn nested_kinds_create_directories() {
    let (_dir, store) = temp_store();
    store
        .save("runs/wf", "1", &Record { name: "r".into(), value: 1 })
        .unwrap();
    assert!(store.exists("runs/wf", "1"));
    assert_eq!(store.list("runs/wf").unwrap(), ["1"]);
}
