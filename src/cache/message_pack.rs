//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! MessagePack 条目格式。

use super::{
    compress_whole, inflate_whole, try_dump_bare_string, try_load_bare_string, CacheFormat, Codec,
    Entry, LoadedEntry, ZlibCompressor,
};
use crate::error::{CoderError, Result};
use crate::serialization::{MessagePackSerializer, Serializer};
use crate::utils::hex_prefix;

/// MessagePack 条目编解码器
///
/// 裸字符串条目走单字节标记的快速路径，其余条目打包为数组后写出
#[derive(Clone, Debug, Default)]
pub struct MessagePackCodec {
    serializer: MessagePackSerializer,
    zlib: ZlibCompressor,
}

impl MessagePackCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用指定的序列化器（自定义扩展类型或池大小）
    pub fn with_serializer(serializer: MessagePackSerializer) -> Self {
        Self {
            serializer,
            zlib: ZlibCompressor::new(),
        }
    }
}

impl Codec for MessagePackCodec {
    fn format(&self) -> CacheFormat {
        CacheFormat::MessagePack
    }

    fn dump(&self, entry: &Entry) -> Result<Vec<u8>> {
        match try_dump_bare_string(entry) {
            Some(dumped) => Ok(dumped),
            None => self.serializer.dump(&entry.pack()),
        }
    }

    fn dump_compressed(&self, entry: &Entry, threshold: usize) -> Result<Vec<u8>> {
        compress_whole(&self.zlib, self.dump(entry)?, threshold)
    }

    fn load(&self, dumped: &[u8]) -> Result<LoadedEntry> {
        let data = inflate_whole(&self.zlib, dumped)?;
        if let Some(entry) = try_load_bare_string(&data) {
            return Ok(entry.into());
        }
        if !self.serializer.dumped(&data) {
            return Err(CoderError::InvalidDump(format!(
                "not a message_pack payload: {}",
                hex_prefix(&data, 4)
            )));
        }
        Ok(Entry::unpack(self.serializer.load(&data)?)?.into())
    }

    fn dumped(&self, dumped: &[u8]) -> bool {
        self.serializer.dumped(dumped)
    }
}
