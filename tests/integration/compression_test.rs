//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 压缩阈值集成测试

use oxcoder::cache::{CacheFormat, SerializerWithFallback, NO_COMPRESSION, ZLIB_HEADER};
use oxcoder::value::{RString, Value};
use oxcoder::Entry;
use rand::RngCore;
use std::time::Duration;

fn compressible() -> Entry {
    Entry::new("0".repeat(2048))
        .with_version("v1")
        .with_expires_at(4_102_444_800.0)
}

fn incompressible() -> Entry {
    let mut bytes = vec![0u8; 2048];
    rand::thread_rng().fill_bytes(&mut bytes);
    Entry::new(Value::binary(bytes)).with_version("v1")
}

/// 测试压缩后的结果不大于未压缩结果，且对可压缩载荷严格更小
#[test]
fn test_threshold_monotonicity() {
    for format in CacheFormat::ALL {
        let coder = SerializerWithFallback::new(format);
        let e = compressible();
        let compressed = coder.dump_compressed(&e, 1).unwrap();
        let plain = coder.dump_compressed(&e, NO_COMPRESSION).unwrap();
        assert!(compressed.len() < plain.len(), "{}", format);
        assert_eq!(plain, coder.dump(&e).unwrap());
        assert_eq!(coder.load(&compressed).unwrap(), Some(e), "{}", format);
    }
}

/// 测试不可压缩或低于阈值的载荷不会变大
#[test]
fn test_no_spurious_compression() {
    for format in CacheFormat::ALL {
        if format == CacheFormat::Json {
            continue;
        }
        let coder = SerializerWithFallback::new(format);
        let e = incompressible();
        let plain = coder.dump(&e).unwrap();
        assert_eq!(coder.dump_compressed(&e, 1).unwrap(), plain, "{}", format);

        let small = Entry::new("0".repeat(100)).with_version("v1");
        assert_eq!(
            coder.dump_compressed(&small, 1024).unwrap(),
            coder.dump(&small).unwrap(),
            "{}",
            format
        );
    }
}

/// 测试 MessagePack 格式的压缩场景
#[test]
fn test_message_pack_compression_scenario() {
    let coder = SerializerWithFallback::new(CacheFormat::MessagePack);
    let e = Entry::new("0".repeat(2048))
        .with_version("v1")
        .with_expires_in(Duration::from_secs(100));

    let compressed = coder.dump_compressed(&e, 1).unwrap();
    assert_eq!(compressed[0], ZLIB_HEADER);
    assert!(compressed.len() < coder.dump(&e).unwrap().len());

    let loaded = coder.load(&compressed).unwrap().unwrap();
    assert_eq!(loaded.value(), &Value::string("0".repeat(2048)));
    assert_eq!(loaded.version(), Some(&RString::utf8("v1")));
    assert_eq!(loaded.expires_at(), e.expires_at());
    assert!(!loaded.expired());
}

/// 测试压缩结果可以再次编码为相同的字节
#[test]
fn test_compressed_redump_is_stable() {
    for format in CacheFormat::ALL {
        let coder = SerializerWithFallback::new(format);
        let first = coder.dump_compressed(&compressible(), 1).unwrap();
        let reloaded = coder.load(&first).unwrap().unwrap();
        assert_eq!(coder.dump_compressed(&reloaded, 1).unwrap(), first, "{}", format);
    }
}
