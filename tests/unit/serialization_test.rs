//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 值序列化器单元测试

use chrono::{FixedOffset, NaiveDate, TimeZone};
use num_bigint::BigInt;
use oxcoder::serialization::{
    detect, FallbackSerializer, JsonSerializer, MarshalSerializer, MessageFormat,
    MessagePackSerializer, Serializer, SerializerEnum, ValueFormat,
};
use oxcoder::value::{RString, Value};
use oxcoder::CoderError;
use rust_decimal::Decimal;
use std::str::FromStr;

/// 两种二进制格式都能无损表示的值
fn rich_values() -> Vec<Value> {
    let offset = FixedOffset::east_opt(3600).unwrap();
    vec![
        Value::integer(BigInt::from(1u8) << 90),
        Value::Symbol("status".into()),
        Value::Decimal(Decimal::from_str("12.345").unwrap()),
        Value::Rational(3, 4),
        Value::range(Value::Int(1), Value::Int(10), true),
        Value::Set(vec![Value::Int(1), Value::Int(2)]),
        Value::Time(offset.with_ymd_and_hms(2024, 2, 29, 12, 30, 0).unwrap()),
        Value::Date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()),
        Value::Regexp("^a+$".into()),
        Value::Str(RString::ascii("ascii")),
        Value::Hash(vec![(
            Value::Symbol("nested".into()),
            Value::Array(vec![Value::Nil, Value::Float(2.5)]),
        )]),
    ]
}

/// 测试 Marshal 和 MessagePack 序列化器的往返操作
#[test]
fn test_binary_serializers_round_trip() {
    let serializers = [
        SerializerEnum::Marshal(MarshalSerializer::new()),
        SerializerEnum::MessagePack(MessagePackSerializer::new()),
    ];
    for serializer in &serializers {
        for value in rich_values() {
            let dumped = serializer.dump(&value).unwrap();
            assert!(serializer.dumped(&dumped));
            assert_eq!(
                serializer.load(&dumped).unwrap(),
                value,
                "{:?}",
                serializer.format()
            );
        }
    }
}

/// 测试 JSON 序列化器的有损转换
///
/// 符号变为字符串，哈希键统一为字符串
#[test]
fn test_json_is_lossy() {
    let serializer = JsonSerializer::new();
    let value = Value::Hash(vec![(Value::Symbol("k".into()), Value::Symbol("v".into()))]);
    let dumped = serializer.dump(&value).unwrap();
    assert_eq!(dumped, br#"{"k":"v"}"#.to_vec());
    assert_eq!(
        serializer.load(&dumped).unwrap(),
        Value::Hash(vec![(Value::string("k"), Value::string("v"))])
    );
}

/// 测试 JSON 拒绝无法表示的字节串
#[test]
fn test_json_rejects_invalid_utf8() {
    let err = JsonSerializer::new()
        .dump(&Value::binary(vec![0xFF, 0xFE]))
        .unwrap_err();
    assert!(matches!(err, CoderError::Unserializable { .. }));
}

/// 测试签名探测
#[test]
fn test_detect_by_signature() {
    let value = Value::Array(vec![Value::Int(1)]);
    for format in ValueFormat::ALL {
        let dumped = SerializerEnum::for_format(format).dump(&value).unwrap();
        assert_eq!(detect(&dumped), Some(format));
    }
    assert_eq!(detect(b"\x00\x01"), None);
}

/// 测试消息格式名称解析
#[test]
fn test_message_format_names() {
    assert_eq!(
        "json_allow_marshal".parse::<MessageFormat>().unwrap(),
        MessageFormat::JsonAllowMarshal
    );
    assert!(matches!(
        "yaml".parse::<MessageFormat>(),
        Err(CoderError::UnknownFormat(_))
    ));
}

/// 测试回退序列化器拒绝 Marshal 数据
#[test]
fn test_fallback_serializer_refuses_marshal() {
    let dumped = MarshalSerializer::new().dump(&Value::Int(1)).unwrap();
    for format in [MessageFormat::Json, MessageFormat::MessagePack] {
        assert!(matches!(
            FallbackSerializer::new(format).load(&dumped),
            Err(CoderError::MarshalFallbackDisabled)
        ));
    }
    assert_eq!(
        FallbackSerializer::new(MessageFormat::MessagePackAllowMarshal)
            .load(&dumped)
            .unwrap(),
        Value::Int(1)
    );
}

/// 测试匿名类无法序列化
#[test]
fn test_anonymous_module_is_unserializable() {
    let anonymous = Value::Module(String::new());
    assert!(matches!(
        MessagePackSerializer::new().dump(&anonymous),
        Err(CoderError::Unserializable { .. })
    ));
    assert!(matches!(
        MarshalSerializer::new().dump(&anonymous),
        Err(CoderError::Unserializable { .. })
    ));
}
