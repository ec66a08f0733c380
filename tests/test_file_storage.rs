use alert_filters::{
    EngineConfig, FileStorage, FilterSource, FilterSync, MemoryAddress, Persistence, SavedFilters,
    StorageError, StorageSource,
};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_missing_file_reads_as_empty() {
    let dir = tempdir().expect("temp dir");
    let storage = FileStorage::new(dir.path().join("absent.json"));
    assert_eq!(storage.get("savedFilters").expect("readable"), None);
}

#[test]
fn test_set_creates_parent_dirs_and_keeps_other_keys() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("nested").join("store.json");
    let mut storage = FileStorage::new(&path);

    storage.set("theme", "dark").expect("writable");
    storage.set("savedFilters", "{}").expect("writable");

    assert_eq!(storage.get("theme").unwrap().as_deref(), Some("dark"));
    assert_eq!(storage.get("savedFilters").unwrap().as_deref(), Some("{}"));
    assert!(path.exists());
}

#[test]
fn test_corrupt_file_is_reported_then_overwritten() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("store.json");
    fs::write(&path, "not json at all").expect("write corrupt file");

    let mut storage = FileStorage::new(&path);
    assert!(matches!(
        storage.get("savedFilters"),
        Err(StorageError::Corrupt { .. })
    ));

    let persistence = Persistence::new(storage.clone(), "savedFilters");
    assert_eq!(persistence.load(), None);

    storage.set("savedFilters", "[]").expect("overwrite corrupt file");
    assert_eq!(storage.get("savedFilters").unwrap().as_deref(), Some("[]"));
}

#[test]
fn test_filters_persist_across_sessions() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("store.json");
    let config = EngineConfig::default().with_default_filters(["severity=critical"]);

    let mut first = FilterSync::new(MemoryAddress::new("/"), FileStorage::new(&path), &config);
    assert_eq!(first.resolution().source, FilterSource::Defaults);
    first.add("team=sre");

    let second = FilterSync::new(MemoryAddress::new("/"), FileStorage::new(&path), &config);
    assert_eq!(second.resolution().source, FilterSource::Saved);
    assert_eq!(second.store().tokens(), vec!["severity=critical", "team=sre"]);

    let saved = Persistence::new(FileStorage::new(&path), "savedFilters").load();
    assert_eq!(
        saved,
        Some(SavedFilters {
            filters: vec!["severity=critical".to_string(), "team=sre".to_string()],
            present: true,
        })
    );
}
