//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! Marshal 系列条目格式。

use super::{
    compress_whole, inflate_whole, try_compress, try_dump_bare_string, try_load_bare_string,
    CacheFormat, Codec, Compressor, Entry, LoadedEntry, ZlibCompressor,
};
use crate::error::{CoderError, Result};
use crate::serialization::{marshal, MarshalSerializer, Serializer};
use crate::utils::hex_prefix;

/// 7.x 格式中未压缩载荷的标记
const MARK_UNCOMPRESSED: u8 = 0x00;
/// 7.x 格式中压缩载荷的标记
const MARK_COMPRESSED: u8 = 0x01;

fn unpack_marshal(marshal: &MarshalSerializer, data: &[u8]) -> Result<LoadedEntry> {
    Ok(Entry::unpack(marshal.load(data)?)?.into())
}

/// 6.1 格式：直接写出打包后的 Marshal 数据
#[derive(Clone, Debug, Default)]
pub struct Marshal61Codec {
    marshal: MarshalSerializer,
    zlib: ZlibCompressor,
}

impl Marshal61Codec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Codec for Marshal61Codec {
    fn format(&self) -> CacheFormat {
        CacheFormat::Marshal61
    }

    fn dump(&self, entry: &Entry) -> Result<Vec<u8>> {
        self.marshal.dump(&entry.pack())
    }

    fn dump_compressed(&self, entry: &Entry, threshold: usize) -> Result<Vec<u8>> {
        compress_whole(&self.zlib, self.dump(entry)?, threshold)
    }

    fn load(&self, dumped: &[u8]) -> Result<LoadedEntry> {
        let data = inflate_whole(&self.zlib, dumped)?;
        if !marshal::signature(&data) {
            return Err(CoderError::InvalidDump(format!(
                "not a marshal_6_1 payload: {}",
                hex_prefix(&data, 4)
            )));
        }
        unpack_marshal(&self.marshal, &data)
    }

    fn dumped(&self, dumped: &[u8]) -> bool {
        marshal::signature(dumped)
    }
}

/// 7.0 / 7.1 格式：一个压缩标记字节加 Marshal 数据
///
/// 7.1 额外为裸字符串条目提供单字节开销的快速路径
#[derive(Clone, Debug)]
pub struct Marshal7Codec {
    bare_strings: bool,
    marshal: MarshalSerializer,
    zlib: ZlibCompressor,
}

impl Marshal7Codec {
    pub fn v7_0() -> Self {
        Self {
            bare_strings: false,
            marshal: MarshalSerializer::new(),
            zlib: ZlibCompressor::new(),
        }
    }

    pub fn v7_1() -> Self {
        Self {
            bare_strings: true,
            ..Self::v7_0()
        }
    }

    fn dump_marked(&self, entry: &Entry) -> Result<Vec<u8>> {
        let packed = self.marshal.dump(&entry.pack())?;
        let mut dumped = Vec::with_capacity(1 + packed.len());
        dumped.push(MARK_UNCOMPRESSED);
        dumped.extend_from_slice(&packed);
        Ok(dumped)
    }
}

impl Codec for Marshal7Codec {
    fn format(&self) -> CacheFormat {
        if self.bare_strings {
            CacheFormat::Marshal71
        } else {
            CacheFormat::Marshal70
        }
    }

    fn dump(&self, entry: &Entry) -> Result<Vec<u8>> {
        if self.bare_strings {
            if let Some(dumped) = try_dump_bare_string(entry) {
                return Ok(dumped);
            }
        }
        self.dump_marked(entry)
    }

    fn dump_compressed(&self, entry: &Entry, threshold: usize) -> Result<Vec<u8>> {
        let plain = self.dump(entry)?;
        let packed = self.marshal.dump(&entry.pack())?;
        match try_compress(&self.zlib, &packed, threshold)? {
            Some(compressed) if compressed.len() + 1 < plain.len() => {
                let mut dumped = Vec::with_capacity(1 + compressed.len());
                dumped.push(MARK_COMPRESSED);
                dumped.extend_from_slice(&compressed);
                Ok(dumped)
            }
            _ => Ok(plain),
        }
    }

    fn load(&self, dumped: &[u8]) -> Result<LoadedEntry> {
        if let Some(entry) = try_load_bare_string(dumped) {
            return Ok(entry.into());
        }
        match dumped.split_first() {
            Some((&MARK_UNCOMPRESSED, rest)) => unpack_marshal(&self.marshal, rest),
            Some((&MARK_COMPRESSED, rest)) => {
                let inflated = self.zlib.decompress(rest)?;
                unpack_marshal(&self.marshal, &inflated)
            }
            _ => Err(CoderError::InvalidDump(format!(
                "not a {} payload: {}",
                self.format(),
                hex_prefix(dumped, 4)
            ))),
        }
    }

    fn dumped(&self, dumped: &[u8]) -> bool {
        match dumped.split_first() {
            Some((&MARK_UNCOMPRESSED, rest)) => marshal::signature(rest),
            Some((&MARK_COMPRESSED, _)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{RString, Value};

    #[test]
    fn test_marshal_6_1_layout() {
        let dumped = Marshal61Codec::new().dump(&Entry::new(Value::Nil)).unwrap();
        assert_eq!(dumped, b"\x04\x08[\x00");
    }

    #[test]
    fn test_marshal_7_1_bare_string_overhead() {
        let codec = Marshal7Codec::v7_1();
        let dumped = codec.dump(&Entry::new("abc")).unwrap();
        assert_eq!(dumped, b"\xffabc");
        let dumped = codec
            .dump(&Entry::new(Value::Str(RString::ascii("abc"))))
            .unwrap();
        assert_eq!(dumped, b"\xfdabc");
    }

    #[test]
    fn test_marshal_7_0_has_no_bare_strings() {
        let dumped = Marshal7Codec::v7_0().dump(&Entry::new("abc")).unwrap();
        assert_eq!(&dumped[..3], b"\x00\x04\x08");
    }

    #[test]
    fn test_compressed_marker() {
        let codec = Marshal7Codec::v7_1();
        let entry = Entry::new("0".repeat(2048)).with_version("v1");
        let dumped = codec.dump_compressed(&entry, 1).unwrap();
        assert_eq!(dumped[0], MARK_COMPRESSED);
        assert!(codec.dumped(&dumped));
        assert_eq!(codec.load(&dumped).unwrap(), LoadedEntry::from(entry));
    }

    #[test]
    fn test_dumped_does_not_claim_coder_signature() {
        let codec = Marshal7Codec::v7_1();
        assert!(!codec.dumped(b"\x00\x11\x01"));
        assert!(!codec.dumped(b""));
        assert!(!Marshal61Codec::new().dumped(b"\x00\x04\x08"));
    }
}
