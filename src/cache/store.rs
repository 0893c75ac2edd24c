//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于内存的缓存存储，条目以编码后的字节保存。

use super::{Entry, LoadedEntry, SerializerWithFallback, NO_COMPRESSION};
use crate::config::Config;
use crate::error::Result;
use crate::utils::validate_key_length;
use crate::value::{RString, Value};
use dashmap::DashMap;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// 存储写入选项
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// 写入时是否压缩
    pub compress: bool,
    /// 压缩阈值（字节）
    pub compress_threshold: usize,
    /// 条目未指定过期时间时使用的默认值
    pub expires_in: Option<Duration>,
    /// 键的最大长度
    pub max_key_length: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            compress: true,
            compress_threshold: 1024,
            expires_in: None,
            max_key_length: 256,
        }
    }
}

/// 内存缓存存储
///
/// 读取时的任何解码错误都记录日志并按未命中处理
pub struct MemoryStore {
    data: DashMap<String, Vec<u8>>,
    coder: SerializerWithFallback,
    options: StoreOptions,
}

impl MemoryStore {
    pub fn new(coder: SerializerWithFallback, options: StoreOptions) -> Self {
        Self {
            data: DashMap::new(),
            coder,
            options,
        }
    }

    /// 根据配置创建存储
    pub fn from_config(config: &Config) -> Result<Self> {
        let coder = SerializerWithFallback::from_config(&config.cache, &config.message_pack)?;
        let options = StoreOptions {
            compress: config.cache.compress,
            compress_threshold: config.cache.compress_threshold,
            expires_in: config.cache.default_expires_in.map(Duration::from_secs),
            max_key_length: config.cache.max_key_length,
        };
        Ok(Self::new(coder, options))
    }

    pub fn coder(&self) -> &SerializerWithFallback {
        &self.coder
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// 写入值，使用默认过期时间
    pub fn write(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.write_entry(key, Entry::new(value))
    }

    /// 写入条目
    ///
    /// 条目未设置过期时间时使用存储的默认值
    #[instrument(skip(self, entry), level = "debug")]
    pub fn write_entry(&self, key: &str, entry: Entry) -> Result<()> {
        validate_key_length(key, self.options.max_key_length)?;
        let entry = match (entry.expires_at(), self.options.expires_in) {
            (None, Some(expires_in)) => entry.with_expires_in(expires_in),
            _ => entry,
        };
        let threshold = if self.options.compress {
            self.options.compress_threshold
        } else {
            NO_COMPRESSION
        };
        let dumped = self.coder.dump_compressed(&entry, threshold)?;
        debug!("Store write: key={}, bytes={}", key, dumped.len());
        self.data.insert(key.to_string(), dumped);
        Ok(())
    }

    /// 直接写入编码后的字节
    pub fn write_raw(&self, key: &str, dumped: Vec<u8>) -> Result<()> {
        validate_key_length(key, self.options.max_key_length)?;
        self.data.insert(key.to_string(), dumped);
        Ok(())
    }

    /// 读取编码后的字节
    pub fn read_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.data.get(key).map(|dumped| dumped.value().clone())
    }

    /// 读取值
    ///
    /// 指定 `version` 时，版本不一致的条目视为未命中
    #[instrument(skip(self), level = "debug")]
    pub fn read(&self, key: &str, version: Option<&RString>) -> Result<Option<Value>> {
        validate_key_length(key, self.options.max_key_length)?;
        let Some(loaded) = self.read_metadata(key, version) else {
            return Ok(None);
        };
        match self.coder.resolve(loaded.payload) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                error!("Store read: key={}, failed to resolve payload: {}", key, e);
                Ok(None)
            }
        }
    }

    /// 读取值，未命中时调用 `compute` 计算并写入
    pub fn fetch<F>(&self, key: &str, version: Option<&RString>, compute: F) -> Result<Value>
    where
        F: FnOnce() -> Result<Value>,
    {
        if let Some(value) = self.read(key, version)? {
            return Ok(value);
        }
        let value = compute()?;
        let entry = Entry::new(value.clone());
        let entry = match version {
            Some(version) => entry.with_version(version.clone()),
            None => entry,
        };
        self.write_entry(key, entry)?;
        Ok(value)
    }

    /// 键是否存在且未过期
    ///
    /// 只解析元数据，不解码值
    pub fn exist(&self, key: &str, version: Option<&RString>) -> Result<bool> {
        validate_key_length(key, self.options.max_key_length)?;
        Ok(self.read_metadata(key, version).is_some())
    }

    pub fn delete(&self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 只在键仍对应 `observed` 时删除，期间被并发写入的新值保留
    fn remove_if_unchanged(&self, key: &str, observed: &[u8]) -> bool {
        self.data
            .remove_if(key, |_, current| current.as_slice() == observed)
            .is_some()
    }

    fn read_metadata(&self, key: &str, version: Option<&RString>) -> Option<LoadedEntry> {
        let dumped = self.read_raw(key)?;
        let loaded = match self.coder.load_metadata(&dumped) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                debug!("Store read: key={}, unreadable entry treated as miss", key);
                return None;
            }
            Err(e) => {
                error!("Store read: key={}, failed to load entry: {}", key, e);
                return None;
            }
        };
        if loaded.expired() {
            let removed = self.remove_if_unchanged(key, &dumped);
            debug!("Store read: key={}, expired=true, removed={}", key, removed);
            return None;
        }
        if loaded.mismatched(version) {
            debug!("Store read: key={}, version mismatch", key);
            return None;
        }
        Some(loaded)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(SerializerWithFallback::default(), StoreOptions::default())
    }
}
