//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 统一工具模块
//!
//! 提供库、命令行和测试共用的工具函数，包括：
//! - 日志设置工具
//! - 输入验证工具
//! - 字节预览工具

use crate::error::CoderError;
use std::sync::Once;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 安装全局日志订阅器
///
/// 优先使用 `RUST_LOG` 环境变量，未设置时使用 `default_filter`
pub fn setup_logging_with(default_filter: &str) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(filter)
            .try_init()
            .ok();
    });
}

pub fn setup_logging() {
    setup_logging_with("debug");
}

pub fn validate_key_length(key: &str, max_length: usize) -> Result<(), CoderError> {
    if key.is_empty() {
        return Err(CoderError::InvalidInput(
            "Cache key cannot be empty".to_string(),
        ));
    }
    if key.len() > max_length {
        return Err(CoderError::InvalidInput(format!(
            "Cache key exceeds maximum length of {} bytes (got {} bytes)",
            max_length,
            key.len()
        )));
    }
    Ok(())
}

/// 以十六进制显示字节数组的前 `limit` 个字节
///
/// 超出部分以 `...` 表示，空数组显示为 `<empty>`
pub fn hex_prefix(data: &[u8], limit: usize) -> String {
    if data.is_empty() {
        return "<empty>".to_string();
    }
    let mut out = data
        .iter()
        .take(limit)
        .map(|b| format!("0x{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if data.len() > limit {
        out.push_str(" ...");
    }
    out
}

/// 解析十六进制字符串，忽略空白和可选的 `0x` 前缀
pub fn parse_hex(text: &str) -> Result<Vec<u8>, CoderError> {
    let digits: String = text
        .split_whitespace()
        .map(|chunk| chunk.trim_start_matches("0x"))
        .collect();
    if !digits.is_ascii() {
        return Err(CoderError::InvalidInput(
            "hex input must be ASCII".to_string(),
        ));
    }
    if digits.len() % 2 != 0 {
        return Err(CoderError::InvalidInput(
            "hex input must have an even number of digits".to_string(),
        ));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| CoderError::InvalidInput(format!("invalid hex: {}", e)))
        })
        .collect()
}
