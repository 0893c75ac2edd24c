//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了编解码系统的配置结构和解析逻辑。

use crate::cache::{CacheFormat, DEFAULT_FALLBACK_ORDER};
use crate::error::{CoderError, Result};
use crate::serialization::message_pack::DEFAULT_POOL_SIZE;
use crate::serialization::{MessageFormat, ValueFormat};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

pub const CONFIG_VERSION: u32 = 1;

/// 缓冲区池大小上限
pub const MAX_POOL_SIZE: usize = 1024;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub message_pack: MessagePackConfig,
}

/// 缓存条目编解码配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CacheConfig {
    /// 写出格式
    pub format: CacheFormat,
    /// 读取时的格式探测优先级
    pub fallback_order: Vec<CacheFormat>,
    /// 是否允许加载 Marshal 数据
    pub allow_marshal: bool,
    /// 写入时是否压缩
    pub compress: bool,
    /// 压缩阈值（字节）
    pub compress_threshold: usize,
    /// `coder` 格式中对象载荷的序列化格式
    pub coder_object_format: ValueFormat,
    /// 默认过期时间（秒）
    pub default_expires_in: Option<u64>,
    /// 键的最大长度
    pub max_key_length: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            format: CacheFormat::MessagePack,
            fallback_order: DEFAULT_FALLBACK_ORDER.to_vec(),
            allow_marshal: true,
            compress: true,
            compress_threshold: 1024,
            coder_object_format: ValueFormat::MessagePack,
            default_expires_in: None,
            max_key_length: 256,
        }
    }
}

/// 消息序列化配置
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct MessagesConfig {
    /// 消息格式
    pub format: MessageFormat,
}

/// MessagePack 配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct MessagePackConfig {
    /// 缓冲区池大小
    pub pool_size: usize,
}

impl Default for MessagePackConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl Config {
    /// 从 TOML 文本解析并验证配置
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| CoderError::ConfigError(e.to_string()))?;
        config.validate().map_err(CoderError::ConfigError)?;
        Ok(config)
    }

    /// 从 TOML 文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保各个值在合理范围内并且相互一致
    pub fn validate(&self) -> std::result::Result<(), String> {
        // 验证配置版本
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        self.cache.validate()?;

        if self.message_pack.pool_size == 0 || self.message_pack.pool_size > MAX_POOL_SIZE {
            return Err(format!(
                "message_pack pool_size must be between 1 and {}",
                MAX_POOL_SIZE
            ));
        }

        Ok(())
    }
}

impl CacheConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.fallback_order.is_empty() {
            return Err("cache fallback_order cannot be empty".to_string());
        }

        let mut seen = HashSet::new();
        for format in &self.fallback_order {
            if !seen.insert(format) {
                return Err(format!(
                    "cache fallback_order lists '{}' more than once",
                    format
                ));
            }
        }

        // 写出格式必须能被优先级列表中的某个格式读回
        if !self
            .fallback_order
            .iter()
            .any(|reader| reader.loads(self.format))
        {
            return Err(format!(
                "cache fallback_order has no loader for write format '{}'",
                self.format
            ));
        }

        if self.compress_threshold == 0 {
            return Err("cache compress_threshold must be at least 1 byte".to_string());
        }

        if self.coder_object_format == ValueFormat::Marshal && !self.allow_marshal {
            return Err(
                "cache coder_object_format 'marshal' requires allow_marshal = true".to_string(),
            );
        }

        if self.max_key_length == 0 || self.max_key_length > 1024 {
            return Err("cache max_key_length must be between 1 and 1024".to_string());
        }

        if self.default_expires_in == Some(0) {
            return Err("cache default_expires_in cannot be zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_marshal_7_1_loads_7_0() {
        let cache = CacheConfig {
            format: CacheFormat::Marshal70,
            fallback_order: vec![CacheFormat::Marshal71],
            ..Default::default()
        };
        assert!(cache.validate().is_ok());
    }

    #[test]
    fn test_missing_loader_is_rejected() {
        let cache = CacheConfig {
            format: CacheFormat::Json,
            fallback_order: vec![CacheFormat::MessagePack],
            ..Default::default()
        };
        assert!(cache.validate().unwrap_err().contains("no loader"));
    }
}
