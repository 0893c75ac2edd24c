//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了带回退的消息序列化器。
//!
//! 写出时使用配置的格式，读取时按签名探测数据实际使用的格式，
//! 便于在不同格式之间平滑迁移。

use super::{
    detect, JsonSerializer, MarshalSerializer, MessagePackSerializer, Serializer, SerializerEnum,
    ValueFormat,
};
use crate::config::Config;
use crate::error::{CoderError, Result};
use crate::utils::hex_prefix;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// 消息序列化格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    Marshal,
    #[default]
    Json,
    JsonAllowMarshal,
    MessagePack,
    MessagePackAllowMarshal,
}

impl MessageFormat {
    pub const ALL: [MessageFormat; 5] = [
        MessageFormat::Marshal,
        MessageFormat::Json,
        MessageFormat::JsonAllowMarshal,
        MessageFormat::MessagePack,
        MessageFormat::MessagePackAllowMarshal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MessageFormat::Marshal => "marshal",
            MessageFormat::Json => "json",
            MessageFormat::JsonAllowMarshal => "json_allow_marshal",
            MessageFormat::MessagePack => "message_pack",
            MessageFormat::MessagePackAllowMarshal => "message_pack_allow_marshal",
        }
    }

    /// 写出时使用的值格式
    pub fn value_format(&self) -> ValueFormat {
        match self {
            MessageFormat::Marshal => ValueFormat::Marshal,
            MessageFormat::Json | MessageFormat::JsonAllowMarshal => ValueFormat::Json,
            MessageFormat::MessagePack | MessageFormat::MessagePackAllowMarshal => {
                ValueFormat::MessagePack
            }
        }
    }

    /// 读取时是否接受 Marshal 数据
    pub fn allows_marshal(&self) -> bool {
        matches!(
            self,
            MessageFormat::Marshal
                | MessageFormat::JsonAllowMarshal
                | MessageFormat::MessagePackAllowMarshal
        )
    }

    /// 由写出格式和 Marshal 许可组合出消息格式
    pub fn for_value_format(format: ValueFormat, allow_marshal: bool) -> Self {
        match (format, allow_marshal) {
            (ValueFormat::Marshal, _) => MessageFormat::Marshal,
            (ValueFormat::Json, false) => MessageFormat::Json,
            (ValueFormat::Json, true) => MessageFormat::JsonAllowMarshal,
            (ValueFormat::MessagePack, false) => MessageFormat::MessagePack,
            (ValueFormat::MessagePack, true) => MessageFormat::MessagePackAllowMarshal,
        }
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MessageFormat {
    type Err = CoderError;

    fn from_str(s: &str) -> Result<Self> {
        MessageFormat::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| CoderError::UnknownFormat(s.to_string()))
    }
}

/// 带回退的序列化器
///
/// 读取顺序：MessagePack、Marshal、JSON，最后仍按 JSON 尝试一次
#[derive(Clone, Debug)]
pub struct FallbackSerializer {
    format: MessageFormat,
    serializer: SerializerEnum,
    marshal: MarshalSerializer,
    json: JsonSerializer,
    message_pack: MessagePackSerializer,
}

impl FallbackSerializer {
    pub fn new(format: MessageFormat) -> Self {
        Self::with_message_pack(format, MessagePackSerializer::new())
    }

    /// 使用指定的 MessagePack 序列化器（例如带自定义扩展类型）
    pub fn with_message_pack(format: MessageFormat, message_pack: MessagePackSerializer) -> Self {
        let serializer = match format.value_format() {
            ValueFormat::MessagePack => SerializerEnum::MessagePack(message_pack.clone()),
            other => SerializerEnum::for_format(other),
        };
        Self {
            format,
            serializer,
            marshal: MarshalSerializer::new(),
            json: JsonSerializer::new(),
            message_pack,
        }
    }

    /// 按 `[messages]` 和 `[message_pack]` 配置创建
    pub fn from_config(config: &Config) -> Self {
        Self::with_message_pack(
            config.messages.format,
            MessagePackSerializer::new().with_pool_size(config.message_pack.pool_size),
        )
    }

    pub fn format(&self) -> MessageFormat {
        self.format
    }

    pub fn message_pack(&self) -> &MessagePackSerializer {
        &self.message_pack
    }

    fn load_marshal(&self, data: &[u8]) -> Result<Value> {
        if !self.format.allows_marshal() {
            return Err(CoderError::MarshalFallbackDisabled);
        }
        if self.format != MessageFormat::Marshal {
            warn!(format = %self.format, "Marshal load fallback occurred");
        }
        self.marshal.load(data)
    }
}

impl Serializer for FallbackSerializer {
    fn dump(&self, value: &Value) -> Result<Vec<u8>> {
        self.serializer.dump(value)
    }

    fn load(&self, data: &[u8]) -> Result<Value> {
        match detect(data) {
            Some(ValueFormat::MessagePack) => self.message_pack.load(data),
            Some(ValueFormat::Marshal) => self.load_marshal(data),
            Some(ValueFormat::Json) => self.json.load(data),
            None => self.json.load(data).map_err(|_| {
                CoderError::InvalidDump(format!(
                    "unrecognized message prefix {}",
                    hex_prefix(data, 8)
                ))
            }),
        }
    }

    fn dumped(&self, data: &[u8]) -> bool {
        detect(data).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        Value::Hash(vec![(Value::string("k"), Value::Array(vec![Value::Int(1)]))])
    }

    #[test]
    fn test_each_format_loads_every_other() {
        for writer in MessageFormat::ALL {
            let dumped = FallbackSerializer::new(writer).dump(&sample()).unwrap();
            for reader in MessageFormat::ALL {
                let result = FallbackSerializer::new(reader).load(&dumped);
                if writer == MessageFormat::Marshal && !reader.allows_marshal() {
                    assert!(matches!(result, Err(CoderError::MarshalFallbackDisabled)));
                } else {
                    assert_eq!(result.unwrap(), sample(), "{} -> {}", writer, reader);
                }
            }
        }
    }

    #[test]
    fn test_unrecognized_dump_is_invalid() {
        let serializer = FallbackSerializer::new(MessageFormat::Json);
        assert!(!serializer.dumped(b"\x10garbage"));
        let err = serializer.load(b"\x10garbage").unwrap_err();
        assert!(matches!(err, CoderError::InvalidDump(_)));
    }

    #[test]
    fn test_dumped_matches_detected_formats() {
        let serializer = FallbackSerializer::new(MessageFormat::JsonAllowMarshal);
        for format in ValueFormat::ALL {
            let dumped = SerializerEnum::for_format(format).dump(&sample()).unwrap();
            assert_eq!(detect(&dumped), Some(format));
            assert!(serializer.dumped(&dumped), "{}", format);
        }
    }

    #[test]
    fn test_json_without_signature_is_still_tried() {
        let value = FallbackSerializer::new(MessageFormat::Json)
            .load(b"null")
            .unwrap();
        assert_eq!(value, Value::Nil);
    }

    #[test]
    fn test_from_config_uses_message_format() {
        let mut config = Config::default();
        config.messages.format = MessageFormat::MessagePack;
        config.message_pack.pool_size = 2;
        let serializer = FallbackSerializer::from_config(&config);
        assert_eq!(serializer.format(), MessageFormat::MessagePack);
        assert!(serializer.message_pack.dumped(&serializer.dump(&sample()).unwrap()));
        assert_eq!(serializer.message_pack.pool().capacity(), 2);

        let marshal = FallbackSerializer::new(MessageFormat::Marshal)
            .dump(&sample())
            .unwrap();
        assert!(matches!(
            serializer.load(&marshal),
            Err(CoderError::MarshalFallbackDisabled)
        ));
    }

    #[test]
    fn test_format_names() {
        for format in MessageFormat::ALL {
            assert_eq!(format.name().parse::<MessageFormat>().unwrap(), format);
        }
        assert!("yaml".parse::<MessageFormat>().is_err());
    }
}
