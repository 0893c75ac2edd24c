//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和样例数据。

use num_bigint::BigInt;
use oxcoder::value::{Encoding, RString, Value};
use oxcoder::Entry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry};

static INIT: Once = Once::new();

#[allow(dead_code)]
pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 统计 WARN 级别事件的日志层
#[derive(Clone, Default)]
pub struct WarnCounter {
    count: Arc<AtomicUsize>,
}

impl WarnCounter {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// 在当前线程上运行 `f` 并返回其间产生的警告数
#[allow(dead_code)]
pub fn count_warnings<T>(f: impl FnOnce() -> T) -> (T, usize) {
    let counter = WarnCounter::default();
    let subscriber = Registry::default().with(counter.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, counter.count())
}

/// 各类值的样例
#[allow(dead_code)]
pub fn sample_values() -> Vec<Value> {
    vec![
        Value::Nil,
        Value::Bool(true),
        Value::Bool(false),
        Value::Int(0),
        Value::Int(-1),
        Value::Int(1 << 40),
        Value::integer(BigInt::from(u64::MAX) * 3),
        Value::integer(-(BigInt::from(1u8) << 100u32)),
        Value::Float(1.5),
        Value::string("héllo"),
        Value::Str(RString::ascii("plain")),
        Value::binary(vec![0u8, 0xFF, 0x80]),
        Value::Str(RString::new(
            vec![0x82, 0xA0, 0x82, 0xA2],
            Encoding::Other("Shift_JIS".to_string()),
        )),
        Value::Array(vec![Value::Int(1), Value::string("two"), Value::Nil]),
        Value::Hash(vec![
            (Value::string("a"), Value::Int(1)),
            (
                Value::string("nested"),
                Value::Array(vec![Value::Bool(true), Value::Float(-0.25)]),
            ),
        ]),
    ]
}

/// 各类版本号的样例
#[allow(dead_code)]
pub fn sample_versions() -> Vec<Option<RString>> {
    vec![
        None,
        Some(RString::utf8("")),
        Some(RString::utf8("v1")),
        Some(RString::utf8("x".repeat(256))),
        Some(RString::new(vec![0xFF, 0x00, 0xFE], Encoding::Binary)),
    ]
}

/// 各类过期时间的样例
#[allow(dead_code)]
pub fn sample_expiries() -> Vec<Option<f64>> {
    vec![None, Some(0.0), Some(4_102_444_800.5)]
}

/// 构造带可选版本和过期时间的条目
#[allow(dead_code)]
pub fn entry(value: Value, version: Option<RString>, expires_at: Option<f64>) -> Entry {
    let mut entry = Entry::new(value);
    if let Some(version) = version {
        entry = entry.with_version(version);
    }
    if let Some(expires_at) = expires_at {
        entry = entry.with_expires_at(expires_at);
    }
    entry
}
