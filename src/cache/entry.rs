//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存条目及其两阶段加载结果。

use crate::error::{CoderError, Result};
use crate::value::{Encoding, RString, Value};
use std::time::Duration;

/// 当前时间（Unix 纪元以来的秒数，带小数）
pub fn now_f64() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// 缓存条目
///
/// 由值、可选版本号和可选过期时间组成。构造后不再修改。
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    value: Value,
    version: Option<RString>,
    expires_at: Option<f64>,
}

impl Entry {
    /// 创建不带版本和过期时间的条目
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            version: None,
            expires_at: None,
        }
    }

    /// 设置版本号
    pub fn with_version(mut self, version: impl Into<RString>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// 设置相对当前时间的过期时长
    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_at = Some(now_f64() + expires_in.as_secs_f64());
        self
    }

    /// 设置绝对过期时间（Unix 秒）
    pub fn with_expires_at(mut self, expires_at: f64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub(crate) fn from_parts(value: Value, version: Option<RString>, expires_at: Option<f64>) -> Self {
        Self {
            value,
            version,
            expires_at,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn version(&self) -> Option<&RString> {
        self.version.as_ref()
    }

    pub fn expires_at(&self) -> Option<f64> {
        self.expires_at
    }

    /// 剩余有效时长，未设置过期时间时返回 `None`
    ///
    /// 超出 `Duration` 表示范围的过期时间按 `Duration::MAX` 处理
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_at.map(|at| {
            Duration::try_from_secs_f64((at - now_f64()).max(0.0)).unwrap_or(Duration::MAX)
        })
    }

    /// 条目是否已过期
    pub fn expired(&self) -> bool {
        is_expired(self.expires_at)
    }

    /// 与调用方提供的版本是否不一致
    ///
    /// 只有双方都带版本且不相等时才视为不一致
    pub fn mismatched(&self, version: Option<&RString>) -> bool {
        is_mismatched(self.version.as_ref(), version)
    }

    /// 是否为裸值（无版本、无过期时间）
    pub fn is_bare(&self) -> bool {
        self.version.is_none() && self.expires_at.is_none()
    }

    /// 打包为 `[value, expires_at, version]`，去掉末尾的空元素
    pub fn pack(&self) -> Value {
        let mut members = vec![
            self.value.clone(),
            self.expires_at.map(Value::Float).unwrap_or(Value::Nil),
            self.version.clone().map(Value::Str).unwrap_or(Value::Nil),
        ];
        while members.last().is_some_and(Value::is_nil) {
            members.pop();
        }
        Value::Array(members)
    }

    /// [`Entry::pack`] 的逆操作
    pub fn unpack(packed: Value) -> Result<Self> {
        let members = packed.into_array().ok_or_else(|| {
            CoderError::Deserialization("packed entry is not an array".to_string())
        })?;
        if members.len() > 3 {
            return Err(CoderError::Deserialization(format!(
                "packed entry has {} members, expected at most 3",
                members.len()
            )));
        }
        let mut members = members.into_iter();
        let value = members.next().unwrap_or(Value::Nil);
        let expires_at = match members.next() {
            None | Some(Value::Nil) => None,
            Some(Value::Float(f)) => Some(f),
            Some(Value::Int(i)) => Some(i as f64),
            Some(other) => {
                return Err(CoderError::Deserialization(format!(
                    "packed entry expiry must be numeric, got {}",
                    other.class_name()
                )))
            }
        };
        let version = match members.next() {
            None | Some(Value::Nil) => None,
            Some(Value::Str(s)) => Some(s),
            Some(other) => {
                return Err(CoderError::Deserialization(format!(
                    "packed entry version must be a string, got {}",
                    other.class_name()
                )))
            }
        };
        Ok(Self::from_parts(value, version, expires_at))
    }
}

pub(crate) fn is_expired(expires_at: Option<f64>) -> bool {
    expires_at.is_some_and(|at| at <= now_f64())
}

pub(crate) fn is_mismatched(ours: Option<&RString>, theirs: Option<&RString>) -> bool {
    match (ours, theirs) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

/// 尚未解码的载荷类型
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadKind {
    /// 带编码的字符串
    String(Encoding),
    /// 由内层值序列化器产生的对象
    Object,
}

/// 两阶段加载中的载荷句柄
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 已解码的值
    Value(Value),
    /// 延迟解码的载荷，需要调用 `resolve` 才能取得值
    Deferred {
        bytes: Vec<u8>,
        compressed: bool,
        kind: PayloadKind,
    },
}

impl Payload {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Payload::Deferred { .. })
    }
}

/// 加载的第一阶段结果：元数据和载荷句柄
///
/// 只需检查过期或版本的调用方不必为值的解压和反序列化付出代价
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEntry {
    pub version: Option<RString>,
    pub expires_at: Option<f64>,
    pub payload: Payload,
}

impl LoadedEntry {
    pub fn new(version: Option<RString>, expires_at: Option<f64>, payload: Payload) -> Self {
        Self {
            version,
            expires_at,
            payload,
        }
    }

    pub fn expired(&self) -> bool {
        is_expired(self.expires_at)
    }

    pub fn mismatched(&self, version: Option<&RString>) -> bool {
        is_mismatched(self.version.as_ref(), version)
    }
}

impl From<Entry> for LoadedEntry {
    fn from(entry: Entry) -> Self {
        LoadedEntry::new(entry.version, entry.expires_at, Payload::Value(entry.value))
    }
}
