//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! MessagePack 扩展类型注册表集成测试

use oxcoder::cache::{CacheFormat, SerializerWithFallback};
use oxcoder::serialization::message_pack::{ExtensionRegistry, ExtensionRegistryBuilder};
use oxcoder::serialization::{MessagePackSerializer, Serializer};
use oxcoder::value::Value;
use oxcoder::{CoderError, Entry};
use std::sync::Arc;
use std::thread;

const POINT_TYPE_ID: i8 = 42;

fn point(x: i64, y: i64) -> Value {
    Value::object("Point", Value::Array(vec![Value::Int(x), Value::Int(y)]))
}

/// 内置类型加一个递归编码的 Point 类型
fn registry_with_point() -> Arc<ExtensionRegistry> {
    let mut builder = ExtensionRegistryBuilder::with_builtin_types();
    builder
        .register_recursive(
            POINT_TYPE_ID,
            "Point",
            |value, packer| match value {
                Value::Object(obj) => packer.write(&obj.data),
                other => Err(CoderError::unserializable(other.class_name(), "not a Point")),
            },
            |unpacker| Ok(Value::object("Point", unpacker.read()?)),
        )
        .unwrap();
    Arc::new(builder.build())
}

/// 测试自定义递归类型可嵌套在其他值中
#[test]
fn test_custom_recursive_type() {
    let serializer = MessagePackSerializer::with_registry(registry_with_point());
    let value = Value::Array(vec![
        point(1, 2),
        Value::range(point(0, 0), point(3, 4), false),
    ]);
    let dumped = serializer.dump(&value).unwrap();
    assert_eq!(serializer.load(&dumped).unwrap(), value);
}

/// 测试重复注册在构建时立即报错
#[test]
fn test_duplicate_registration_fails_at_setup() {
    let mut builder = ExtensionRegistry::builder();
    builder
        .register_raw(POINT_TYPE_ID, "Point", |_| Ok(vec![]), |_| Ok(Value::Nil))
        .unwrap();

    let err = builder
        .register_raw(POINT_TYPE_ID, "Other", |_| Ok(vec![]), |_| Ok(Value::Nil))
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "Type ID 42 has already been registered");

    let err = builder
        .register_raw(43, "Point", |_| Ok(vec![]), |_| Ok(Value::Nil))
        .err()
        .unwrap();
    assert!(matches!(err, CoderError::DuplicateTypeClass(_)));
}

/// 测试内置类型 ID 不可被覆盖，保留 ID 不可注册
#[test]
fn test_builtin_and_reserved_ids() {
    let mut builder = ExtensionRegistryBuilder::with_builtin_types();
    for id in [0, 9, 14, 17, 127] {
        assert!(matches!(
            builder.register_raw(id, format!("Custom{}", id), |_| Ok(vec![]), |_| Ok(Value::Nil)),
            Err(CoderError::DuplicateTypeId(_))
        ));
    }
    for id in [6, 11, 12, -1] {
        assert!(matches!(
            builder.register_raw(id, format!("Custom{}", id), |_| Ok(vec![]), |_| Ok(Value::Nil)),
            Err(CoderError::ReservedTypeId(_))
        ));
    }
}

/// 测试读取 DateTime 与 URI 扩展类型
#[test]
fn test_datetime_and_uri_extensions() {
    let serializer = MessagePackSerializer::new();

    // ext8，类型 9：2000-01-01T12:34:56 +00:00
    let datetime = [
        0xcc, 0x80, 0xc7, 0x0a, 0x09, 0xce, 0x00, 0x25, 0x68, 0x59, 12, 34, 56, 0, 0,
    ];
    assert_eq!(
        serializer.load(&datetime).unwrap(),
        Value::Time(chrono::DateTime::parse_from_rfc3339("2000-01-01T12:34:56Z").unwrap())
    );

    let uri = Value::object("URI::Generic", Value::string("https://example.com/#test"));
    let dumped = serializer.dump(&uri).unwrap();
    assert_eq!(&dumped[2..5], &[0xc7, 25, 14]);
    assert_eq!(serializer.load(&dumped).unwrap(), uri);
}

/// 测试未注册类名的对象以通用 Object 类型写出
#[test]
fn test_unregistered_object_falls_back_to_object_type() {
    let serializer = MessagePackSerializer::new();
    let value = Value::object("Unregistered", Value::Int(1));
    let dumped = serializer.dump(&value).unwrap();
    assert_eq!(serializer.load(&dumped).unwrap(), value);
}

/// 测试读取端缺少自定义类型时按未命中处理
#[test]
fn test_missing_type_on_reader_is_a_miss() {
    let writer = SerializerWithFallback::builder(CacheFormat::MessagePack)
        .message_pack(MessagePackSerializer::with_registry(registry_with_point()))
        .build()
        .unwrap();
    let reader = SerializerWithFallback::new(CacheFormat::MessagePack);
    let dumped = writer.dump(&Entry::new(point(1, 2)).with_version("v")).unwrap();
    assert!(writer.load(&dumped).unwrap().is_some());
    assert_eq!(reader.load(&dumped).unwrap(), None);

    // coder 格式的对象载荷延迟解码，同样按未命中处理
    let writer = SerializerWithFallback::builder(CacheFormat::Coder)
        .message_pack(MessagePackSerializer::with_registry(registry_with_point()))
        .build()
        .unwrap();
    let dumped = writer.dump(&Entry::new(point(1, 2))).unwrap();
    assert_eq!(reader.load(&dumped).unwrap(), None);
}

/// 测试并发序列化互不干扰
#[test]
fn test_concurrent_dump_and_load() {
    let serializer = Arc::new(MessagePackSerializer::with_registry(registry_with_point()).with_pool_size(2));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let serializer = Arc::clone(&serializer);
            thread::spawn(move || {
                for j in 0..200 {
                    let value = Value::Array(vec![point(i, j), Value::string("x".repeat(j as usize))]);
                    let dumped = serializer.dump(&value).unwrap();
                    assert_eq!(serializer.load(&dumped).unwrap(), value);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(serializer.pool().idle() <= serializer.pool().capacity());
}

/// 测试已注册类型的列表
#[test]
fn test_registered_types() {
    let registry = registry_with_point();
    let types: Vec<(i8, &str)> = registry.registered_types().collect();
    assert!(types.contains(&(0, "Symbol")));
    assert!(types.contains(&(POINT_TYPE_ID, "Point")));
    assert!(types.windows(2).all(|w| w[0].0 < w[1].0));
}
