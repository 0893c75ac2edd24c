//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 内存存储集成测试

#[path = "../common/mod.rs"]
mod common;

use common::count_warnings;
use oxcoder::cache::{CacheFormat, MemoryStore, SerializerWithFallback, StoreOptions};
use oxcoder::value::{RString, Value};
use oxcoder::{Config, Entry};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn store(format: CacheFormat, options: StoreOptions) -> MemoryStore {
    MemoryStore::new(SerializerWithFallback::new(format), options)
}

/// 测试各格式的读写
#[test]
fn test_write_read_every_format() {
    for format in CacheFormat::ALL {
        let store = store(format, StoreOptions::default());
        let value = Value::Hash(vec![(Value::string("n"), Value::Int(1))]);
        store.write("key", value.clone()).unwrap();
        assert_eq!(store.read("key", None).unwrap(), Some(value), "{}", format);
    }
}

/// 测试大值按阈值压缩存储
#[test]
fn test_large_values_are_stored_compressed() {
    let store = store(
        CacheFormat::MessagePack,
        StoreOptions {
            compress_threshold: 64,
            ..Default::default()
        },
    );
    store.write("big", "0".repeat(4096)).unwrap();
    assert!(store.read_raw("big").unwrap().len() < 4096);
    assert_eq!(
        store.read("big", None).unwrap(),
        Some(Value::string("0".repeat(4096)))
    );

    let uncompressed = self::store(
        CacheFormat::MessagePack,
        StoreOptions {
            compress: false,
            ..Default::default()
        },
    );
    uncompressed.write("big", "0".repeat(4096)).unwrap();
    assert!(uncompressed.read_raw("big").unwrap().len() > 4096);
}

/// 测试默认过期时间
#[test]
fn test_default_expiry_is_applied() {
    let store = store(
        CacheFormat::Coder,
        StoreOptions {
            expires_in: Some(Duration::from_secs(60)),
            ..Default::default()
        },
    );
    store.write("k", 1).unwrap();
    let loaded = store
        .coder()
        .load_metadata(&store.read_raw("k").unwrap())
        .unwrap()
        .unwrap();
    assert!(loaded.expires_at.is_some());
    assert!(!loaded.expired());

    // 显式指定的过期时间优先
    store
        .write_entry("old", Entry::new(1).with_expires_at(1.0))
        .unwrap();
    assert!(!store.exist("old", None).unwrap());
    assert_eq!(store.len(), 1);
}

/// 测试版本不一致时重新计算
#[test]
fn test_fetch_recomputes_on_version_change() {
    let store = MemoryStore::default();
    let v1 = RString::utf8("v1");
    let v2 = RString::utf8("v2");
    store.fetch("k", Some(&v1), || Ok(Value::Int(1))).unwrap();
    assert_eq!(
        store.fetch("k", Some(&v1), || Ok(Value::Int(99))).unwrap(),
        Value::Int(1)
    );
    assert_eq!(
        store.fetch("k", Some(&v2), || Ok(Value::Int(2))).unwrap(),
        Value::Int(2)
    );
    assert_eq!(store.read("k", Some(&v1)).unwrap(), None);
}

/// 测试无法识别的数据按未命中处理
#[test]
fn test_unrecognized_bytes_read_as_miss() {
    let store = MemoryStore::default();
    store.write_raw("k", vec![0x10, 0x20, 0x30]).unwrap();
    let (result, warnings) = count_warnings(|| store.read("k", None));
    assert_eq!(result.unwrap(), None);
    assert_eq!(warnings, 1);
}

/// 测试存储由不同格式写入的数据
#[test]
fn test_reads_entries_written_by_other_formats() {
    let store = MemoryStore::default();
    for format in CacheFormat::ALL {
        let dumped = SerializerWithFallback::new(format)
            .dump(&Entry::new("shared").with_version("v"))
            .unwrap();
        store.write_raw(format.name(), dumped).unwrap();
        assert_eq!(
            store.read(format.name(), Some(&RString::utf8("v"))).unwrap(),
            Some(Value::string("shared")),
            "{}",
            format
        );
    }
}

/// 测试删除和清空
#[test]
fn test_delete_and_clear() {
    let store = MemoryStore::default();
    store.write("a", 1).unwrap();
    store.write("b", 2).unwrap();
    assert!(store.delete("a"));
    assert!(!store.delete("a"));
    assert_eq!(store.len(), 1);
    store.clear();
    assert!(store.is_empty());
}

/// 测试从配置创建存储
#[test]
fn test_from_config() {
    let config = Config::from_toml_str(
        r#"
        [cache]
        format = "coder"
        compress_threshold = 16
        default_expires_in = 30
        max_key_length = 8
        "#,
    )
    .unwrap();
    let store = MemoryStore::from_config(&config).unwrap();
    assert_eq!(store.coder().format(), CacheFormat::Coder);
    assert!(store.write("too-long-key", 1).is_err());
    store.write("short", "0".repeat(100)).unwrap();
    assert!(store.read_raw("short").unwrap()[2] as i8 <= -1);
}

/// 测试并发读写
#[test]
fn test_concurrent_access() {
    let store = Arc::new(MemoryStore::default());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("{}:{}", t, i);
                    store.write(&key, Value::Int(i)).unwrap();
                    assert_eq!(store.read(&key, None).unwrap(), Some(Value::Int(i)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.len(), 400);
}
