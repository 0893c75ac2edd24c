//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了 MessagePack 的打包器和解包器。

use super::registry::{ExtensionCodec, ExtensionRegistry, ENCODED_STRING_CLASS, OBJECT_CLASS};
use crate::error::{CoderError, Result};
use crate::value::{Encoding, RString, Value};
use byteorder::{BigEndian, ByteOrder};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rmp::encode;
use rmp::Marker;

/// 最大嵌套层级
pub const MAX_DEPTH: usize = 512;

fn encode_error(e: impl std::fmt::Display) -> CoderError {
    CoderError::Serialization(e.to_string())
}

fn length(len: usize, class: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| CoderError::unserializable(class, "too large for MessagePack"))
}

/// MessagePack 打包器
///
/// 递归扩展类型的打包函数会拿到一个新的嵌套打包器，其输出成为扩展载荷
pub struct Packer<'r> {
    registry: &'r ExtensionRegistry,
    buf: Vec<u8>,
    depth: usize,
}

impl<'r> Packer<'r> {
    pub fn new(registry: &'r ExtensionRegistry) -> Self {
        Self::with_buffer(registry, Vec::new())
    }

    /// 复用已有缓冲区，缓冲区会先被清空
    pub fn with_buffer(registry: &'r ExtensionRegistry, mut buf: Vec<u8>) -> Self {
        buf.clear();
        Self {
            registry,
            buf,
            depth: 0,
        }
    }

    fn nested(registry: &'r ExtensionRegistry, depth: usize) -> Self {
        Self {
            registry,
            buf: Vec::new(),
            depth,
        }
    }

    pub fn registry(&self) -> &'r ExtensionRegistry {
        self.registry
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// 写入一个值
    pub fn write(&mut self, value: &Value) -> Result<()> {
        self.write_value(value, self.depth)
    }

    fn write_value(&mut self, value: &Value, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(CoderError::DepthLimitExceeded(MAX_DEPTH));
        }
        match value {
            Value::Nil => encode::write_nil(&mut self.buf).map_err(encode_error)?,
            Value::Bool(b) => encode::write_bool(&mut self.buf, *b).map_err(encode_error)?,
            Value::Int(i) => {
                encode::write_sint(&mut self.buf, *i).map_err(encode_error)?;
            }
            Value::BigInt(n) => match n.to_u64() {
                Some(u) => {
                    encode::write_uint(&mut self.buf, u).map_err(encode_error)?;
                }
                None => self.write_extension("Integer", value, depth)?,
            },
            Value::Float(f) => encode::write_f64(&mut self.buf, *f).map_err(encode_error)?,
            Value::Str(s) => match s.encoding() {
                Encoding::Utf8 => {
                    encode::write_str_len(&mut self.buf, length(s.len(), "String")?)
                        .map_err(encode_error)?;
                    self.buf.extend_from_slice(s.bytes());
                }
                Encoding::Binary => {
                    encode::write_bin_len(&mut self.buf, length(s.len(), "String")?)
                        .map_err(encode_error)?;
                    self.buf.extend_from_slice(s.bytes());
                }
                _ => self.write_extension(ENCODED_STRING_CLASS, value, depth)?,
            },
            Value::Array(items) => {
                encode::write_array_len(&mut self.buf, length(items.len(), "Array")?)
                    .map_err(encode_error)?;
                for item in items {
                    self.write_value(item, depth + 1)?;
                }
            }
            Value::Hash(pairs) => {
                encode::write_map_len(&mut self.buf, length(pairs.len(), "Hash")?)
                    .map_err(encode_error)?;
                for (k, v) in pairs {
                    self.write_value(k, depth + 1)?;
                    self.write_value(v, depth + 1)?;
                }
            }
            other => self.write_extension(other.class_name(), other, depth)?,
        }
        Ok(())
    }

    fn write_extension(&mut self, class: &str, value: &Value, depth: usize) -> Result<()> {
        let registry = self.registry;
        let extension = registry
            .find_by_class(class)
            .or_else(|| match value {
                Value::Object(_) => registry.find_by_class(OBJECT_CLASS),
                _ => None,
            })
            .ok_or_else(|| {
                CoderError::unserializable(class, "no MessagePack extension type registered")
            })?;
        let payload = match extension.codec() {
            ExtensionCodec::Raw { pack, .. } => pack(value)?,
            ExtensionCodec::Recursive { pack, .. } => {
                let mut nested = Packer::nested(registry, depth + 1);
                pack(value, &mut nested)?;
                nested.into_inner()
            }
        };
        encode::write_ext_meta(&mut self.buf, length(payload.len(), class)?, extension.id())
            .map_err(encode_error)?;
        self.buf.extend_from_slice(&payload);
        Ok(())
    }
}

/// MessagePack 解包器
pub struct Unpacker<'r, 'd> {
    registry: &'r ExtensionRegistry,
    data: &'d [u8],
    pos: usize,
    depth: usize,
}

impl<'r, 'd> Unpacker<'r, 'd> {
    pub fn new(registry: &'r ExtensionRegistry, data: &'d [u8]) -> Self {
        Self::nested(registry, data, 0)
    }

    fn nested(registry: &'r ExtensionRegistry, data: &'d [u8], depth: usize) -> Self {
        Self {
            registry,
            data,
            pos: 0,
            depth,
        }
    }

    pub fn registry(&self) -> &'r ExtensionRegistry {
        self.registry
    }

    /// 尚未读取的字节数
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// 读取一个值
    pub fn read(&mut self) -> Result<Value> {
        self.read_value(self.depth)
    }

    fn take(&mut self, n: usize) -> Result<&'d [u8]> {
        let data = self.data;
        match self.pos.checked_add(n).filter(|end| *end <= data.len()) {
            Some(end) => {
                let bytes = &data[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            None => Err(CoderError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            }),
        }
    }

    fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    fn take_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    fn take_len(&mut self, len: u32) -> Result<&'d [u8]> {
        self.take(len as usize)
    }

    fn read_value(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(CoderError::DepthLimitExceeded(MAX_DEPTH));
        }
        let offset = self.pos;
        let value = match Marker::from_u8(self.take_u8()?) {
            Marker::Null => Value::Nil,
            Marker::True => Value::Bool(true),
            Marker::False => Value::Bool(false),
            Marker::FixPos(n) => Value::Int(i64::from(n)),
            Marker::FixNeg(n) => Value::Int(i64::from(n)),
            Marker::U8 => Value::Int(i64::from(self.take_u8()?)),
            Marker::U16 => Value::Int(i64::from(self.take_u16()?)),
            Marker::U32 => Value::Int(i64::from(self.take_u32()?)),
            Marker::U64 => Value::integer(BigInt::from(BigEndian::read_u64(self.take(8)?))),
            Marker::I8 => Value::Int(i64::from(self.take_u8()? as i8)),
            Marker::I16 => Value::Int(i64::from(BigEndian::read_i16(self.take(2)?))),
            Marker::I32 => Value::Int(i64::from(BigEndian::read_i32(self.take(4)?))),
            Marker::I64 => Value::Int(BigEndian::read_i64(self.take(8)?)),
            Marker::F32 => Value::Float(f64::from(BigEndian::read_f32(self.take(4)?))),
            Marker::F64 => Value::Float(BigEndian::read_f64(self.take(8)?)),
            Marker::FixStr(len) => self.read_str(u32::from(len))?,
            Marker::Str8 => {
                let len = self.take_u8()?;
                self.read_str(u32::from(len))?
            }
            Marker::Str16 => {
                let len = self.take_u16()?;
                self.read_str(u32::from(len))?
            }
            Marker::Str32 => {
                let len = self.take_u32()?;
                self.read_str(len)?
            }
            Marker::Bin8 => {
                let len = self.take_u8()?;
                Value::binary(self.take_len(u32::from(len))?)
            }
            Marker::Bin16 => {
                let len = self.take_u16()?;
                Value::binary(self.take_len(u32::from(len))?)
            }
            Marker::Bin32 => {
                let len = self.take_u32()?;
                Value::binary(self.take_len(len)?)
            }
            Marker::FixArray(len) => self.read_array(u32::from(len), depth)?,
            Marker::Array16 => {
                let len = self.take_u16()?;
                self.read_array(u32::from(len), depth)?
            }
            Marker::Array32 => {
                let len = self.take_u32()?;
                self.read_array(len, depth)?
            }
            Marker::FixMap(len) => self.read_map(u32::from(len), depth)?,
            Marker::Map16 => {
                let len = self.take_u16()?;
                self.read_map(u32::from(len), depth)?
            }
            Marker::Map32 => {
                let len = self.take_u32()?;
                self.read_map(len, depth)?
            }
            Marker::FixExt1 => self.read_ext(1, depth)?,
            Marker::FixExt2 => self.read_ext(2, depth)?,
            Marker::FixExt4 => self.read_ext(4, depth)?,
            Marker::FixExt8 => self.read_ext(8, depth)?,
            Marker::FixExt16 => self.read_ext(16, depth)?,
            Marker::Ext8 => {
                let len = self.take_u8()?;
                self.read_ext(u32::from(len), depth)?
            }
            Marker::Ext16 => {
                let len = self.take_u16()?;
                self.read_ext(u32::from(len), depth)?
            }
            Marker::Ext32 => {
                let len = self.take_u32()?;
                self.read_ext(len, depth)?
            }
            Marker::Reserved => {
                return Err(CoderError::Deserialization(format!(
                    "reserved MessagePack marker at offset {}",
                    offset
                )))
            }
        };
        Ok(value)
    }

    fn read_str(&mut self, len: u32) -> Result<Value> {
        Ok(Value::Str(RString::new(self.take_len(len)?, Encoding::Utf8)))
    }

    fn read_array(&mut self, len: u32, depth: usize) -> Result<Value> {
        let mut items = Vec::with_capacity((len as usize).min(self.remaining()));
        for _ in 0..len {
            items.push(self.read_value(depth + 1)?);
        }
        Ok(Value::Array(items))
    }

    fn read_map(&mut self, len: u32, depth: usize) -> Result<Value> {
        let mut pairs = Vec::with_capacity((len as usize).min(self.remaining()));
        for _ in 0..len {
            let k = self.read_value(depth + 1)?;
            let v = self.read_value(depth + 1)?;
            pairs.push((k, v));
        }
        Ok(Value::Hash(pairs))
    }

    fn read_ext(&mut self, len: u32, depth: usize) -> Result<Value> {
        let type_id = self.take_u8()? as i8;
        let payload = self.take_len(len)?;
        let registry = self.registry;
        let extension = registry
            .get(type_id)
            .ok_or(CoderError::UnknownExtension(type_id))?;
        match extension.codec() {
            ExtensionCodec::Raw { unpack, .. } => unpack(payload),
            ExtensionCodec::Recursive { unpack, .. } => {
                let mut nested = Unpacker::nested(registry, payload, depth + 1);
                unpack(&mut nested)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;

    fn pack(value: &Value) -> Vec<u8> {
        let registry = ExtensionRegistry::builtin();
        let mut packer = Packer::new(&registry);
        packer.write(value).unwrap();
        packer.into_inner()
    }

    fn unpack(data: &[u8]) -> Value {
        let registry = ExtensionRegistry::builtin();
        Unpacker::new(&registry, data).read().unwrap()
    }

    #[test]
    fn test_native_encodings() {
        assert_eq!(pack(&Value::Nil), vec![0xc0]);
        assert_eq!(pack(&Value::Int(128)), vec![0xcc, 0x80]);
        assert_eq!(pack(&Value::Int(-1)), vec![0xff]);
        assert_eq!(pack(&Value::string("a")), vec![0xa1, b'a']);
        assert_eq!(pack(&Value::binary(vec![1u8])), vec![0xc4, 0x01, 0x01]);
        assert_eq!(
            pack(&Value::Array(vec![Value::Bool(true), Value::Bool(false)])),
            vec![0x92, 0xc3, 0xc2]
        );
    }

    #[test]
    fn test_integers_roundtrip() {
        for n in [0i64, 127, 128, 255, 256, -32, -33, -129, 65_536, i64::MIN, i64::MAX] {
            assert_eq!(unpack(&pack(&Value::Int(n))), Value::Int(n), "n = {}", n);
        }
        let above_i64 = Value::integer(BigInt::from(u64::MAX));
        assert_eq!(unpack(&pack(&above_i64)), above_i64);
        let huge = Value::integer((BigInt::one() << 200) * -3);
        assert_eq!(unpack(&pack(&huge)), huge);
    }

    #[test]
    fn test_map_preserves_order() {
        let value = Value::Hash(vec![
            (Value::string("z"), Value::Int(1)),
            (Value::string("a"), Value::Float(0.5)),
        ]);
        assert_eq!(unpack(&pack(&value)), value);
    }

    #[test]
    fn test_unknown_extension() {
        let registry = ExtensionRegistry::builtin();
        let err = Unpacker::new(&registry, &[0xd4, 0x64, 0x00])
            .read()
            .unwrap_err();
        assert!(err.is_missing_type());
    }

    #[test]
    fn test_truncated_input() {
        let registry = ExtensionRegistry::builtin();
        let err = Unpacker::new(&registry, &[0xa5, b'a']).read().unwrap_err();
        assert!(matches!(err, CoderError::Truncated { needed: 5, .. }));
    }
}
