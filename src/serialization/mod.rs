//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了值级别的序列化机制，支持 Marshal、JSON 和 MessagePack 三种格式。

pub mod fallback;
pub mod json;
pub mod marshal;
pub mod message_pack;

use crate::error::{CoderError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use fallback::{FallbackSerializer, MessageFormat};
pub use json::JsonSerializer;
pub use marshal::MarshalSerializer;
pub use message_pack::MessagePackSerializer;

/// 序列化器特征
///
/// 定义值与字节数组之间的转换，以及根据签名识别自身输出的能力
pub trait Serializer: Send + Sync {
    /// 序列化值为字节数组
    fn dump(&self, value: &Value) -> Result<Vec<u8>>;

    /// 从字节数组反序列化值
    fn load(&self, data: &[u8]) -> Result<Value>;

    /// 字节数组是否可能由该序列化器产生
    fn dumped(&self, data: &[u8]) -> bool;
}

/// 值序列化格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    Marshal,
    Json,
    #[default]
    MessagePack,
}

impl ValueFormat {
    pub const ALL: [ValueFormat; 3] = [
        ValueFormat::Marshal,
        ValueFormat::Json,
        ValueFormat::MessagePack,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ValueFormat::Marshal => "marshal",
            ValueFormat::Json => "json",
            ValueFormat::MessagePack => "message_pack",
        }
    }
}

impl fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueFormat {
    type Err = CoderError;

    fn from_str(s: &str) -> Result<Self> {
        ValueFormat::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| CoderError::UnknownFormat(s.to_string()))
    }
}

/// 序列化器枚举
///
/// 用于在配置驱动的场景中持有具体的序列化器
#[derive(Clone, Debug)]
pub enum SerializerEnum {
    Marshal(MarshalSerializer),
    Json(JsonSerializer),
    MessagePack(MessagePackSerializer),
}

impl SerializerEnum {
    /// 按格式创建默认配置的序列化器
    pub fn for_format(format: ValueFormat) -> Self {
        match format {
            ValueFormat::Marshal => SerializerEnum::Marshal(MarshalSerializer::new()),
            ValueFormat::Json => SerializerEnum::Json(JsonSerializer::new()),
            ValueFormat::MessagePack => SerializerEnum::MessagePack(MessagePackSerializer::new()),
        }
    }

    pub fn format(&self) -> ValueFormat {
        match self {
            SerializerEnum::Marshal(_) => ValueFormat::Marshal,
            SerializerEnum::Json(_) => ValueFormat::Json,
            SerializerEnum::MessagePack(_) => ValueFormat::MessagePack,
        }
    }
}

impl Serializer for SerializerEnum {
    fn dump(&self, value: &Value) -> Result<Vec<u8>> {
        match self {
            SerializerEnum::Marshal(s) => s.dump(value),
            SerializerEnum::Json(s) => s.dump(value),
            SerializerEnum::MessagePack(s) => s.dump(value),
        }
    }

    fn load(&self, data: &[u8]) -> Result<Value> {
        match self {
            SerializerEnum::Marshal(s) => s.load(data),
            SerializerEnum::Json(s) => s.load(data),
            SerializerEnum::MessagePack(s) => s.load(data),
        }
    }

    fn dumped(&self, data: &[u8]) -> bool {
        match self {
            SerializerEnum::Marshal(s) => s.dumped(data),
            SerializerEnum::Json(s) => s.dumped(data),
            SerializerEnum::MessagePack(s) => s.dumped(data),
        }
    }
}

/// 根据签名探测字节数组的值格式
///
/// 探测顺序为 MessagePack、Marshal、JSON
pub fn detect(data: &[u8]) -> Option<ValueFormat> {
    if message_pack::signature(data) {
        Some(ValueFormat::MessagePack)
    } else if marshal::signature(data) {
        Some(ValueFormat::Marshal)
    } else if json::signature(data) {
        Some(ValueFormat::Json)
    } else {
        None
    }
}
