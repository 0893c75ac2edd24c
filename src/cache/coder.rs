//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 带帧头的条目格式。
//!
//! 布局（多字节数值均为小端序）：
//!
//! ```text
//! [00 11] [type: i8] [expires_at: f64] [version_length: i32] [version] [payload]
//! ```
//!
//! `type` 为 1 表示对象，2/3/4 分别表示 UTF-8、二进制、US-ASCII 字符串，
//! 取负表示载荷已压缩。`expires_at` 为 -1.0 表示不过期，`version_length`
//! 为 -1 表示无版本。

use super::{
    try_compress, CacheFormat, Codec, Compressor, Entry, LoadedEntry, Payload, PayloadKind,
    ZlibCompressor, NO_COMPRESSION,
};
use crate::error::{CoderError, Result};
use crate::serialization::{marshal, FallbackSerializer, MarshalSerializer, Serializer};
use crate::value::{Encoding, RString, Value};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::sync::Arc;

/// 格式签名
pub const SIGNATURE: [u8; 2] = [0x00, 0x11];

const OBJECT_TYPE: i8 = 1;
const UTF8_STRING_TYPE: i8 = 2;
const BINARY_STRING_TYPE: i8 = 3;
const US_ASCII_STRING_TYPE: i8 = 4;

const TYPE_INDEX: usize = 2;
const EXPIRES_AT_INDEX: usize = 3;
const VERSION_LENGTH_INDEX: usize = 11;
const VERSION_INDEX: usize = 15;

fn string_type(encoding: &Encoding) -> Option<i8> {
    match encoding {
        Encoding::Utf8 => Some(UTF8_STRING_TYPE),
        Encoding::Binary => Some(BINARY_STRING_TYPE),
        Encoding::UsAscii => Some(US_ASCII_STRING_TYPE),
        Encoding::Other(_) => None,
    }
}

fn payload_kind(type_tag: i8) -> Result<PayloadKind> {
    match type_tag.unsigned_abs() as i8 {
        OBJECT_TYPE => Ok(PayloadKind::Object),
        UTF8_STRING_TYPE => Ok(PayloadKind::String(Encoding::Utf8)),
        BINARY_STRING_TYPE => Ok(PayloadKind::String(Encoding::Binary)),
        US_ASCII_STRING_TYPE => Ok(PayloadKind::String(Encoding::UsAscii)),
        _ => Err(CoderError::Deserialization(format!(
            "unknown payload type {}",
            type_tag
        ))),
    }
}

/// 帧格式编解码器
///
/// 压缩器可替换；对象载荷由内层序列化器写出，读取时按签名探测
#[derive(Clone)]
pub struct FramedCoder {
    compressor: Arc<dyn Compressor>,
    objects: FallbackSerializer,
    marshal: MarshalSerializer,
}

impl FramedCoder {
    pub fn new(compressor: Arc<dyn Compressor>, objects: FallbackSerializer) -> Self {
        Self {
            compressor,
            objects,
            marshal: MarshalSerializer::new(),
        }
    }

    pub fn compressor(&self) -> &dyn Compressor {
        self.compressor.as_ref()
    }

    /// 解码延迟载荷
    ///
    /// 只有此时才会解压和反序列化
    pub fn resolve(&self, payload: Payload) -> Result<Value> {
        match payload {
            Payload::Value(value) => Ok(value),
            Payload::Deferred {
                bytes,
                compressed,
                kind,
            } => {
                let bytes = if compressed {
                    self.compressor.decompress(&bytes)?
                } else {
                    bytes
                };
                match kind {
                    PayloadKind::String(encoding) => Ok(Value::Str(RString::new(bytes, encoding))),
                    PayloadKind::Object => self.objects.load(&bytes),
                }
            }
        }
    }

    /// 非 UTF-8 标记或以 Marshal 签名开头的版本号以 Marshal 转义
    fn dump_version(&self, version: &RString) -> Result<Vec<u8>> {
        if *version.encoding() != Encoding::Utf8 || version.starts_with(&marshal::SIGNATURE) {
            self.marshal.dump(&Value::Str(version.clone()))
        } else {
            Ok(version.bytes().to_vec())
        }
    }

    fn load_version(&self, bytes: &[u8]) -> Result<RString> {
        if marshal::signature(bytes) {
            match self.marshal.load(bytes)? {
                Value::Str(version) => Ok(version),
                other => Err(CoderError::Deserialization(format!(
                    "escaped version must be a String, got {}",
                    other.class_name()
                ))),
            }
        } else {
            Ok(RString::new(bytes, Encoding::Utf8))
        }
    }
}

impl Codec for FramedCoder {
    fn format(&self) -> CacheFormat {
        CacheFormat::Coder
    }

    fn dump(&self, entry: &Entry) -> Result<Vec<u8>> {
        self.dump_compressed(entry, NO_COMPRESSION)
    }

    fn dump_compressed(&self, entry: &Entry, threshold: usize) -> Result<Vec<u8>> {
        let string = entry
            .value()
            .as_rstring()
            .and_then(|s| string_type(s.encoding()).map(|tag| (tag, s)));
        let (mut type_tag, mut payload) = match string {
            Some((tag, s)) => (tag, s.bytes().to_vec()),
            None => (OBJECT_TYPE, self.objects.dump(entry.value())?),
        };
        if let Some(compressed) = try_compress(self.compressor.as_ref(), &payload, threshold)? {
            payload = compressed;
            type_tag = -type_tag;
        }

        let version = entry.version().map(|v| self.dump_version(v)).transpose()?;
        let version_length = match &version {
            Some(v) => i32::try_from(v.len())
                .map_err(|_| CoderError::unserializable("String", "version too long"))?,
            None => -1,
        };

        let mut dumped = Vec::with_capacity(
            VERSION_INDEX + version.as_ref().map_or(0, Vec::len) + payload.len(),
        );
        dumped.extend_from_slice(&SIGNATURE);
        dumped.write_i8(type_tag)?;
        dumped.write_f64::<LittleEndian>(entry.expires_at().unwrap_or(-1.0))?;
        dumped.write_i32::<LittleEndian>(version_length)?;
        if let Some(version) = &version {
            dumped.extend_from_slice(version);
        }
        dumped.extend_from_slice(&payload);
        Ok(dumped)
    }

    fn load(&self, dumped: &[u8]) -> Result<LoadedEntry> {
        if !self.dumped(dumped) {
            return Err(CoderError::InvalidDump(
                "missing coder signature".to_string(),
            ));
        }
        if dumped.len() < VERSION_INDEX {
            return Err(CoderError::Truncated {
                offset: 0,
                needed: VERSION_INDEX,
                available: dumped.len(),
            });
        }

        let type_tag = dumped[TYPE_INDEX] as i8;
        let kind = payload_kind(type_tag)?;
        let expires_at = LittleEndian::read_f64(&dumped[EXPIRES_AT_INDEX..VERSION_LENGTH_INDEX]);
        let expires_at = (expires_at >= 0.0).then_some(expires_at);
        let version_length = LittleEndian::read_i32(&dumped[VERSION_LENGTH_INDEX..VERSION_INDEX]);

        let (version, payload_index) = match usize::try_from(version_length) {
            Ok(len) => {
                let end = VERSION_INDEX + len;
                if dumped.len() < end {
                    return Err(CoderError::Truncated {
                        offset: VERSION_INDEX,
                        needed: len,
                        available: dumped.len() - VERSION_INDEX,
                    });
                }
                (Some(self.load_version(&dumped[VERSION_INDEX..end])?), end)
            }
            Err(_) => (None, VERSION_INDEX),
        };

        let bytes = dumped[payload_index..].to_vec();
        let compressed = type_tag < 0;
        let payload = match kind {
            PayloadKind::String(encoding) if !compressed => {
                Payload::Value(Value::Str(RString::new(bytes, encoding)))
            }
            kind => Payload::Deferred {
                bytes,
                compressed,
                kind,
            },
        };
        Ok(LoadedEntry::new(version, expires_at, payload))
    }

    fn dumped(&self, dumped: &[u8]) -> bool {
        dumped.starts_with(&SIGNATURE)
    }
}

impl Default for FramedCoder {
    fn default() -> Self {
        Self::new(
            Arc::new(ZlibCompressor::new()),
            FallbackSerializer::new(crate::serialization::MessageFormat::MessagePackAllowMarshal),
        )
    }
}

impl std::fmt::Debug for FramedCoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedCoder")
            .field("objects", &self.objects.format())
            .finish()
    }
}
