//! Integration tests for the TOML file store

use std::fs;
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use nestset::config::{ColumnNames, Settings};
use nestset::domain::{check_forest, NewNode};
use nestset::infrastructure::di::ServiceContainer;
use nestset::infrastructure::store::TomlFileStore;
use nestset::infrastructure::traits::BoundsStore;
use nestset::infrastructure::StoreError;

fn custom_columns() -> ColumnNames {
    ColumnNames {
        key: "pk".into(),
        parent: "up".into(),
        left: "l".into(),
        right: "r".into(),
    }
}

fn container(path: &std::path::Path, columns: ColumnNames) -> ServiceContainer {
    let store = TomlFileStore::open(path, columns.clone()).expect("open store");
    let settings = Settings {
        store: path.to_path_buf(),
        columns,
        ..Settings::default()
    };
    ServiceContainer::with_store(settings, Arc::new(store))
}

#[test]
fn given_missing_file_when_opening_then_empty_forest() {
    let temp = TempDir::new().unwrap();
    let store = TomlFileStore::open(&temp.path().join("forest.toml"), ColumnNames::default()).unwrap();

    assert!(store.all().unwrap().is_empty());
    assert_eq!(store.max_right().unwrap(), 0);
}

#[test]
fn given_custom_columns_when_mutating_and_reopening_then_forest_round_trips() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("forest.toml");
    let written = {
        let c = container(&path, custom_columns());
        let a = c.nested_set.insert(NewNode::root("a")).unwrap();
        let b = c.nested_set.insert(NewNode::child("b", a.id)).unwrap();
        c.nested_set.insert(NewNode::root("c")).unwrap();
        c.nested_set.move_up(3).unwrap();
        c.nested_set.insert(NewNode::child("d", b.id)).unwrap();
        c.store.all().unwrap()
    };

    // Act
    let reopened = TomlFileStore::open(&path, custom_columns()).unwrap();

    // Assert
    assert_eq!(reopened.all().unwrap(), written);
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("[[node]]"));
    assert!(content.contains("pk = "));
    assert!(content.contains("up = "));
    assert!(!content.contains("lft"), "default column names leaked: {content}");
}

#[test]
fn given_reopened_store_when_inserting_then_fresh_key() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("forest.toml");
    {
        let c = container(&path, ColumnNames::default());
        c.nested_set.insert(NewNode::root("a")).unwrap();
        c.nested_set.insert(NewNode::root("b")).unwrap();
    }

    let c = container(&path, ColumnNames::default());
    let node = c.nested_set.insert(NewNode::root("c")).unwrap();

    assert_eq!(node.id, 3);
    assert_eq!((node.left, node.right), (5, 6));
}

#[test]
fn given_rejected_move_when_committing_then_file_untouched() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("forest.toml");
    let c = container(&path, ColumnNames::default());
    let a = c.nested_set.insert(NewNode::root("a")).unwrap();
    let b = c.nested_set.insert(NewNode::child("b", a.id)).unwrap();
    let before = fs::read_to_string(&path).unwrap();

    assert!(c.nested_set.reparent(a.id, Some(b.id)).is_err());

    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn given_bounds_with_gap_when_opening_then_format_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("forest.toml");
    fs::write(
        &path,
        r#"
[[node]]
id = 1
lft = 1
rght = 4
name = "orphaned span"
"#,
    )
    .unwrap();

    let err = TomlFileStore::open(&path, ColumnNames::default()).unwrap_err();

    assert!(matches!(err, StoreError::Format { .. }), "{err}");
}

#[test]
fn given_wrong_parent_reference_when_opening_then_format_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("forest.toml");
    fs::write(
        &path,
        r#"
[[node]]
id = 1
lft = 1
rght = 4
name = "a"

[[node]]
id = 2
lft = 2
rght = 3
name = "claims to be a root"
"#,
    )
    .unwrap();

    let err = TomlFileStore::open(&path, ColumnNames::default()).unwrap_err();

    assert!(matches!(err, StoreError::Format { .. }), "{err}");
}

#[test]
fn given_garbage_when_opening_then_format_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("forest.toml");
    fs::write(&path, "node = [[[").unwrap();

    let err = TomlFileStore::open(&path, ColumnNames::default()).unwrap_err();

    assert!(matches!(err, StoreError::Format { .. }));
}

#[test]
fn given_missing_bound_column_when_opening_then_format_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("forest.toml");
    fs::write(&path, "[[node]]\nid = 1\nlft = 1\nname = \"a\"\n").unwrap();

    let err = TomlFileStore::open(&path, ColumnNames::default()).unwrap_err();

    assert!(err.to_string().contains("rght"), "{err}");
}

#[test]
fn given_two_containers_on_one_file_when_both_insert_then_reopened_forest_has_both() {
    // Arrange: both open the same empty file
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("forest.toml");
    let first = container(&path, ColumnNames::default());
    let second = container(&path, ColumnNames::default());

    // Act
    first.nested_set.insert(NewNode::root("from first")).unwrap();
    let b = second.nested_set.insert(NewNode::root("from second")).unwrap();

    // Assert
    assert_eq!((b.left, b.right), (3, 4));
    let reopened = TomlFileStore::open(&path, ColumnNames::default()).unwrap();
    let mut names: Vec<String> = reopened.all().unwrap().into_iter().map(|n| n.name).collect();
    names.sort();
    assert_eq!(names, vec!["from first", "from second"]);
}

#[test]
fn given_containers_on_one_file_when_writing_from_threads_then_no_insert_lost() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("forest.toml");
    let per_writer = 10;

    let writers: Vec<_> = (0..2)
        .map(|w| {
            let path = path.clone();
            thread::spawn(move || {
                let c = container(&path, ColumnNames::default());
                for i in 0..per_writer {
                    c.nested_set.insert(NewNode::root(format!("w{w}-{i}"))).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let nodes = TomlFileStore::open(&path, ColumnNames::default()).unwrap().all().unwrap();
    assert_eq!(nodes.len(), 2 * per_writer);
    assert!(check_forest(&nodes).is_ok());
}

#[test]
fn given_host_create_hook_when_reopening_then_record_persisted() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("forest.toml");
    let c = container(&path, ColumnNames::default());
    let a = c.nested_set.insert(NewNode::root("a")).unwrap();

    let bounds = c.nested_set.before_create(Some(a.id), None).unwrap();
    c.store
        .insert(nestset::domain::NewRecord {
            name: "b".into(),
            parent: Some(a.id),
            bounds,
        })
        .unwrap();

    let nodes = TomlFileStore::open(&path, ColumnNames::default()).unwrap().all().unwrap();
    assert_eq!(nodes.len(), 2);
    assert!(check_forest(&nodes).is_ok());
}
