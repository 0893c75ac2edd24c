//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存数据的压缩器。

use crate::error::{CoderError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// zlib 数据流的首字节
pub const ZLIB_HEADER: u8 = 0x78;

/// 压缩器特征
///
/// 纯函数，无内部状态；解压失败时把错误原样交给调用方
#[cfg_attr(test, mockall::automock)]
pub trait Compressor: Send + Sync {
    /// 压缩字节数组
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// 解压字节数组
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// 基于 flate2 的 zlib 压缩器
#[derive(Clone, Debug, Default)]
pub struct ZlibCompressor {
    level: Compression,
}

impl ZlibCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定压缩级别（0-9）
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Compressor for ZlibCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 16), self.level);
        encoder.write_all(data).map_err(CoderError::Compression)?;
        encoder.finish().map_err(CoderError::Compression)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut decoded = Vec::with_capacity(data.len() * 2);
        decoder
            .read_to_end(&mut decoded)
            .map_err(CoderError::Decompression)?;
        Ok(decoded)
    }
}

/// 达到阈值时尝试压缩
///
/// 只有压缩结果严格小于原始数据时才返回 `Some`
pub fn try_compress(
    compressor: &dyn Compressor,
    data: &[u8],
    threshold: usize,
) -> Result<Option<Vec<u8>>> {
    if data.len() < threshold {
        return Ok(None);
    }
    let compressed = compressor.compress(data)?;
    Ok((compressed.len() < data.len()).then_some(compressed))
}
