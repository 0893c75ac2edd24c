//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 指标收集集成测试

use oxcoder::cache::{CacheFormat, SerializerWithFallback};
use oxcoder::metrics::{get_metrics_string, GLOBAL_METRICS};
use oxcoder::Entry;
use serial_test::serial;

#[test]
#[serial]
fn test_metrics_recording() {
    GLOBAL_METRICS.reset();
    let coder = SerializerWithFallback::new(CacheFormat::Coder);
    let dumped = coder.dump(&Entry::new("abc").with_version("v1")).unwrap();
    coder.load(&dumped).unwrap();
    coder.load(b"\x10\x20").unwrap();

    let output = get_metrics_string();

    println!("Metrics output:\n{}", output);

    assert!(output.contains(
        "coder_operations_total{format=\"coder\", operation=\"dump\", result=\"ok\"} 1"
    ));
    assert!(output.contains(
        "coder_operations_total{format=\"coder\", operation=\"load\", result=\"hit\"} 1"
    ));
    assert!(output.contains(
        "coder_operations_total{format=\"unknown\", operation=\"load\", result=\"unrecognized\"} 1"
    ));
    assert!(output.contains(&format!(
        "coder_bytes_written_sum{{format=\"coder\", operation=\"dump\"}} {}",
        dumped.len()
    )));
    assert!(output.contains("coder_bytes_written_count{format=\"coder\", operation=\"dump\"} 1"));
}

#[test]
#[serial]
fn test_errors_are_counted() {
    GLOBAL_METRICS.reset();
    let coder = SerializerWithFallback::new(CacheFormat::Json);
    let invalid = Entry::new(oxcoder::Value::binary(vec![0xFF]));
    assert!(coder.dump(&invalid).is_err());
    assert_eq!(GLOBAL_METRICS.operation_count("json", "dump", "error"), 1);
}
