//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了编解码操作的指标收集功能。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{span, Level};

/// 指标收集器
///
/// 用于收集编解码器的运行时计数
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// 操作总数统计
    /// key: "format:op:result"
    pub operations_total: Arc<Mutex<HashMap<String, u64>>>,
    /// 写出字节数
    /// key: "format:op" -> (total_bytes, count)
    pub bytes_written: Arc<Mutex<HashMap<String, (u64, u64)>>>,
}

lazy_static! {
    /// 全局指标实例
    pub static ref GLOBAL_METRICS: Metrics = Metrics::default();
}

impl Metrics {
    /// 记录操作指标
    ///
    /// # 参数
    ///
    /// * `format` - 格式名称（message_pack/coder/...，无法识别时为 unknown）
    /// * `op` - 操作类型（dump/dump_compressed/load）
    /// * `result` - 操作结果（ok/hit/miss/error/unrecognized）
    pub fn record_operation(&self, format: &str, op: &str, result: &str) {
        let span = span!(Level::TRACE, "codec_operation", format, op, result);
        let _enter = span.enter();
        let key = format!("{}:{}:{}", format, op, result);
        let mut map = self
            .operations_total
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *map.entry(key).or_insert(0) += 1;
    }

    /// 记录写出的字节数
    pub fn record_bytes(&self, format: &str, op: &str, bytes: usize) {
        let key = format!("{}:{}", format, op);
        let mut map = self
            .bytes_written
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(key).or_insert((0, 0));
        entry.0 += bytes as u64;
        entry.1 += 1;
    }

    /// 读取单个计数
    pub fn operation_count(&self, format: &str, op: &str, result: &str) -> u64 {
        let key = format!("{}:{}:{}", format, op, result);
        self.operations_total
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    /// 清空所有指标
    pub fn reset(&self) {
        self.operations_total
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.bytes_written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// 获取指标字符串
///
/// 将所有指标格式化为字符串返回，用于监控系统采集
pub fn get_metrics_string() -> String {
    let metrics = &GLOBAL_METRICS;
    let ops = metrics
        .operations_total
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let bytes = metrics
        .bytes_written
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    let mut ops: Vec<_> = ops.iter().collect();
    ops.sort();
    let mut bytes: Vec<_> = bytes.iter().collect();
    bytes.sort_by(|a, b| a.0.cmp(b.0));

    let mut output = String::new();
    for (k, v) in ops {
        let parts: Vec<&str> = k.split(':').collect();
        if parts.len() == 3 {
            output.push_str(&format!(
                "coder_operations_total{{format=\"{}\", operation=\"{}\", result=\"{}\"}} {}\n",
                parts[0], parts[1], parts[2], v
            ));
        }
    }
    for (k, (total, count)) in bytes {
        let parts: Vec<&str> = k.split(':').collect();
        if parts.len() == 2 {
            output.push_str(&format!(
                "coder_bytes_written_sum{{format=\"{}\", operation=\"{}\"}} {}\n",
                parts[0], parts[1], total
            ));
            output.push_str(&format!(
                "coder_bytes_written_count{{format=\"{}\", operation=\"{}\"}} {}\n",
                parts[0], parts[1], count
            ));
        }
    }
    output
}
