//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 格式探测与回退加载集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{count_warnings, entry, sample_expiries, sample_values, sample_versions};
use oxcoder::cache::{
    CacheFormat, Codec, FramedCoder, JsonCodec, Marshal61Codec, Marshal7Codec, MessagePackCodec,
    SerializerWithFallback,
};
use oxcoder::metrics::GLOBAL_METRICS;
use oxcoder::value::{Encoding, Value};
use oxcoder::{CoderError, Entry};
use serial_test::serial;

/// JSON 只能无损表示 UTF-8 字符串和 i64 范围内的整数
fn json_safe(value: &Value) -> bool {
    match value {
        Value::Str(s) => *s.encoding() == Encoding::Utf8,
        Value::BigInt(_) => false,
        _ => true,
    }
}

fn entries_for(format: CacheFormat) -> Vec<Entry> {
    let mut entries = Vec::new();
    for value in sample_values() {
        if format == CacheFormat::Json && !json_safe(&value) {
            continue;
        }
        for version in sample_versions() {
            for expires_at in sample_expiries() {
                entries.push(entry(value.clone(), version.clone(), expires_at));
            }
        }
    }
    entries
}

/// 测试样例中包含超出 i64 的整数和非常见编码的字符串
#[test]
fn test_samples_cover_wide_values() {
    let samples = sample_values();
    assert!(samples.iter().any(|v| matches!(v, Value::BigInt(_))));
    assert!(samples
        .iter()
        .any(|v| matches!(v, Value::Str(s) if matches!(s.encoding(), Encoding::Other(_)))));
    assert!(entries_for(CacheFormat::Json)
        .iter()
        .all(|e| json_safe(e.value())));
}

/// 测试任一格式写出的条目都能被默认优先级的读取器加载
#[test]
fn test_cross_format_load_matrix() {
    let readers: Vec<SerializerWithFallback> = CacheFormat::ALL
        .into_iter()
        .map(SerializerWithFallback::new)
        .collect();
    for format in CacheFormat::ALL {
        let writer = SerializerWithFallback::new(format);
        for e in entries_for(format) {
            let dumped = writer.dump(&e).unwrap();
            for reader in &readers {
                assert_eq!(
                    reader.load(&dumped).unwrap().as_ref(),
                    Some(&e),
                    "{} -> {}",
                    format,
                    reader.format()
                );
            }
        }
    }
}

/// 测试重复编码的结果不变
#[test]
fn test_idempotent_redump() {
    for format in CacheFormat::ALL {
        let coder = SerializerWithFallback::new(format);
        for e in entries_for(format) {
            let dumped = coder.dump(&e).unwrap();
            let reloaded = coder.load(&dumped).unwrap().unwrap();
            assert_eq!(coder.dump(&reloaded).unwrap(), dumped, "{}", format);
        }
    }
}

/// 测试正确产生的数据最多被一个格式声明
#[test]
fn test_detection_exclusivity() {
    let codecs: Vec<Box<dyn Codec>> = vec![
        Box::new(Marshal61Codec::new()),
        Box::new(Marshal7Codec::v7_1()),
        Box::new(MessagePackCodec::new()),
        Box::new(FramedCoder::default()),
        Box::new(JsonCodec::new()),
    ];
    for writer in &codecs {
        for e in entries_for(writer.format()) {
            let dumped = writer.dump(&e).unwrap();
            let claims: Vec<CacheFormat> = codecs
                .iter()
                .filter(|codec| codec.dumped(&dumped))
                .map(|codec| codec.format())
                .collect();
            assert!(claims.len() <= 1, "{} claimed by {:?}", writer.format(), claims);
            if let Some(claimed) = claims.first() {
                assert_eq!(*claimed, writer.format());
            }
        }
    }
}

/// 测试无法识别的数据按未命中处理且只记录一次警告
#[test]
#[serial]
fn test_garbage_is_a_miss_with_one_warning() {
    GLOBAL_METRICS.reset();
    let reader = SerializerWithFallback::default();
    let (result, warnings) = count_warnings(|| reader.load(b"\x10\x20\x30"));
    assert_eq!(result.unwrap(), None);
    assert_eq!(warnings, 1);
    assert_eq!(
        GLOBAL_METRICS.operation_count("unknown", "load", "unrecognized"),
        1
    );
}

/// 测试可识别的数据不产生警告
#[test]
#[serial]
fn test_recognized_payload_does_not_warn() {
    let reader = SerializerWithFallback::default();
    let dumped = reader.dump(&Entry::new(1).with_version("v")).unwrap();
    let (result, warnings) = count_warnings(|| reader.load(&dumped));
    assert!(result.unwrap().is_some());
    assert_eq!(warnings, 0);
}

/// 测试 Marshal 回退加载产生一次警告
#[test]
fn test_marshal_fallback_inside_coder_warns() {
    let writer = SerializerWithFallback::builder(CacheFormat::Coder)
        .coder_object_format(oxcoder::serialization::ValueFormat::Marshal)
        .build()
        .unwrap();
    let reader = SerializerWithFallback::new(CacheFormat::Coder);
    let e = Entry::new(vec![Value::Int(1)]);
    let dumped = writer.dump(&e).unwrap();
    let (result, warnings) = count_warnings(|| reader.load(&dumped));
    assert_eq!(result.unwrap(), Some(e));
    assert_eq!(warnings, 1);
}

/// 测试禁用 Marshal 时返回专门的错误
#[test]
fn test_marshal_disabled_error() {
    let reader = SerializerWithFallback::builder(CacheFormat::MessagePack)
        .allow_marshal(false)
        .build()
        .unwrap();
    for format in [
        CacheFormat::Marshal61,
        CacheFormat::Marshal70,
        CacheFormat::Marshal71,
    ] {
        let dumped = SerializerWithFallback::new(format)
            .dump(&Entry::new(1).with_version("v"))
            .unwrap();
        assert!(matches!(
            reader.load(&dumped),
            Err(CoderError::MarshalFallbackDisabled)
        ));
    }
}

/// 测试自定义优先级只探测列出的格式
#[test]
#[serial]
fn test_custom_fallback_order() {
    let reader = SerializerWithFallback::builder(CacheFormat::Json)
        .fallback_order(vec![CacheFormat::Json])
        .build()
        .unwrap();
    let dumped = SerializerWithFallback::new(CacheFormat::Coder)
        .dump(&Entry::new(1))
        .unwrap();
    let (result, warnings) = count_warnings(|| reader.load(&dumped));
    assert_eq!(result.unwrap(), None);
    assert_eq!(warnings, 1);
    assert_eq!(reader.detect(&dumped), None);
}

/// 测试未知格式名称
#[test]
fn test_unknown_format_name() {
    assert!(matches!(
        "marshal_9_9".parse::<CacheFormat>(),
        Err(CoderError::UnknownFormat(name)) if name == "marshal_9_9"
    ));
}
