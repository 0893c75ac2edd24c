//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存条目的编解码器。
//!
//! 每种格式都以一段互不重叠的签名开头，读取时据此探测格式。

pub mod coder;
pub mod compressor;
pub mod entry;
pub mod fallback;
pub mod json;
pub mod marshal;
pub mod message_pack;
pub mod store;

use crate::error::{CoderError, Result};
use crate::value::{Encoding, RString, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use coder::FramedCoder;
pub use compressor::{try_compress, Compressor, ZlibCompressor, ZLIB_HEADER};
pub use entry::{Entry, LoadedEntry, Payload, PayloadKind};
pub use fallback::{SerializerWithFallback, SerializerWithFallbackBuilder};
pub use json::JsonCodec;
pub use marshal::{Marshal61Codec, Marshal7Codec};
pub use message_pack::MessagePackCodec;
pub use store::{MemoryStore, StoreOptions};

/// 不压缩时使用的阈值
pub const NO_COMPRESSION: usize = usize::MAX;

/// 条目编解码器特征
pub trait Codec: Send + Sync {
    /// 编解码器对应的格式
    fn format(&self) -> CacheFormat;

    /// 把条目编码为带签名的字节数组
    fn dump(&self, entry: &Entry) -> Result<Vec<u8>>;

    /// 与 `dump` 相同，但载荷达到 `threshold` 且压缩后更小时写出压缩形式
    fn dump_compressed(&self, entry: &Entry, threshold: usize) -> Result<Vec<u8>>;

    /// 解码自身格式的字节数组
    fn load(&self, dumped: &[u8]) -> Result<LoadedEntry>;

    /// 字节数组是否以该格式的签名开头
    fn dumped(&self, dumped: &[u8]) -> bool;
}

/// 缓存条目格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum CacheFormat {
    #[serde(rename = "marshal_6_1")]
    Marshal61,
    #[serde(rename = "marshal_7_0")]
    Marshal70,
    #[serde(rename = "marshal_7_1")]
    Marshal71,
    #[serde(rename = "message_pack")]
    MessagePack,
    #[serde(rename = "coder")]
    Coder,
    #[serde(rename = "json")]
    Json,
}

/// 默认的读取优先级，JSON 的签名最弱，放在最后
pub const DEFAULT_FALLBACK_ORDER: [CacheFormat; 5] = [
    CacheFormat::MessagePack,
    CacheFormat::Coder,
    CacheFormat::Marshal71,
    CacheFormat::Marshal61,
    CacheFormat::Json,
];

impl CacheFormat {
    pub const ALL: [CacheFormat; 6] = [
        CacheFormat::Marshal61,
        CacheFormat::Marshal70,
        CacheFormat::Marshal71,
        CacheFormat::MessagePack,
        CacheFormat::Coder,
        CacheFormat::Json,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CacheFormat::Marshal61 => "marshal_6_1",
            CacheFormat::Marshal70 => "marshal_7_0",
            CacheFormat::Marshal71 => "marshal_7_1",
            CacheFormat::MessagePack => "message_pack",
            CacheFormat::Coder => "coder",
            CacheFormat::Json => "json",
        }
    }

    /// 是否为 Marshal 系列格式
    pub fn is_marshal(&self) -> bool {
        matches!(
            self,
            CacheFormat::Marshal61 | CacheFormat::Marshal70 | CacheFormat::Marshal71
        )
    }

    /// 该格式的读取器能否加载 `written` 格式写出的数据
    ///
    /// 7.0 与 7.1 共享同一种线上格式
    pub fn loads(&self, written: CacheFormat) -> bool {
        *self == written
            || matches!(
                (self, written),
                (CacheFormat::Marshal70, CacheFormat::Marshal71)
                    | (CacheFormat::Marshal71, CacheFormat::Marshal70)
            )
    }

    /// 签名的文字描述
    pub fn signature(&self) -> &'static str {
        match self {
            CacheFormat::Marshal61 => "04 08",
            CacheFormat::Marshal70 | CacheFormat::Marshal71 => "00 04 08 | 01 ..",
            CacheFormat::MessagePack => "cc 80",
            CacheFormat::Coder => "00 11",
            CacheFormat::Json => r#"\A(?:[{\["]|-?\d|true|false)"#,
        }
    }
}

impl fmt::Display for CacheFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CacheFormat {
    type Err = CoderError;

    fn from_str(s: &str) -> Result<Self> {
        CacheFormat::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| CoderError::UnknownFormat(s.to_string()))
    }
}

/// 裸字符串标记字节
pub(crate) const BARE_UTF8: u8 = 0xFF;
pub(crate) const BARE_BINARY: u8 = 0xFE;
pub(crate) const BARE_US_ASCII: u8 = 0xFD;

/// 无版本、无过期时间的字符串条目写为一个标记字节加原始字节
pub(crate) fn try_dump_bare_string(entry: &Entry) -> Option<Vec<u8>> {
    if !entry.is_bare() {
        return None;
    }
    let s = entry.value().as_rstring()?;
    let marker = match s.encoding() {
        Encoding::Utf8 => BARE_UTF8,
        Encoding::Binary => BARE_BINARY,
        Encoding::UsAscii => BARE_US_ASCII,
        Encoding::Other(_) => return None,
    };
    let mut dumped = Vec::with_capacity(1 + s.len());
    dumped.push(marker);
    dumped.extend_from_slice(s.bytes());
    Some(dumped)
}

/// 字节数组是否以裸字符串标记开头
pub fn is_bare_string(dumped: &[u8]) -> bool {
    matches!(
        dumped.first(),
        Some(&BARE_UTF8) | Some(&BARE_BINARY) | Some(&BARE_US_ASCII)
    )
}

pub(crate) fn try_load_bare_string(dumped: &[u8]) -> Option<Entry> {
    let (marker, bytes) = dumped.split_first()?;
    let encoding = match *marker {
        BARE_UTF8 => Encoding::Utf8,
        BARE_BINARY => Encoding::Binary,
        BARE_US_ASCII => Encoding::UsAscii,
        _ => return None,
    };
    Some(Entry::new(Value::Str(RString::new(bytes, encoding))))
}

/// 整体压缩：压缩后以 zlib 头开头，由分派器识别
pub(crate) fn compress_whole(
    compressor: &dyn Compressor,
    dumped: Vec<u8>,
    threshold: usize,
) -> Result<Vec<u8>> {
    Ok(try_compress(compressor, &dumped, threshold)?.unwrap_or(dumped))
}

/// 以 zlib 头开头时先解压
pub(crate) fn inflate_whole<'a>(
    compressor: &dyn Compressor,
    dumped: &'a [u8],
) -> Result<std::borrow::Cow<'a, [u8]>> {
    if dumped.first() == Some(&ZLIB_HEADER) {
        Ok(std::borrow::Cow::Owned(compressor.decompress(dumped)?))
    } else {
        Ok(std::borrow::Cow::Borrowed(dumped))
    }
}
