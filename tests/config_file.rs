//! Configuration File Tests

use redis_objects::{Container, Error, Item, MemoryStore, RedisKey, StoreConfig};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "addr = \"10.1.2.3:6380\"\nnamespace = \"shop\"\nconnect_timeout_ms = 750"
    )
    .unwrap();

    let config = StoreConfig::load(file.path()).unwrap();
    assert_eq!(config.addr, "10.1.2.3:6380");
    assert_eq!(config.namespace, "shop");
    assert!(config.track_objects);
    assert_eq!(config.connect_timeout(), Duration::from_millis(750));
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = StoreConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_container_follows_config() {
    let config = StoreConfig::default().with_namespace("cfg").with_tracking(false);
    let c = Container::with_config(Arc::new(MemoryStore::new()), &config);
    assert!(!c.is_tracking());
    let a = c.get_key::<Item<i64>>("k");
    let b = c.get_key::<Item<i64>>("k");
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.full_name().unwrap(), "cfg:k");
    assert_eq!(c.tracked_count(), 0);
}
