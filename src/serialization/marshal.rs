//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了 Ruby Marshal 4.8 格式的一个子集。
//!
//! 支持 nil、布尔、整数（含大整数）、浮点、带编码的字符串、符号、数组、
//! 哈希、正则、模块以及对象链接。其余值类型以 `U`（用户序列化）记录写出，
//! 数据部分由基本类型组成。

use super::Serializer;
use crate::error::{CoderError, Result};
use crate::value::{
    date_from_julian_day, duration_from_parts, duration_parts, julian_day, time_from_parts,
    time_parts, Encoding, RString, Value,
};
use num_bigint::{BigInt, Sign};
use std::collections::HashMap;

/// Marshal 4.8 签名
pub const SIGNATURE: [u8; 2] = [0x04, 0x08];

/// 最大嵌套层级
const MAX_DEPTH: usize = 512;

/// 单次解码允许产生的最大节点数，对象链接展开后的节点也计入
const MAX_NODES: usize = 1 << 20;

const TYPE_NIL: u8 = b'0';
const TYPE_TRUE: u8 = b'T';
const TYPE_FALSE: u8 = b'F';
const TYPE_FIXNUM: u8 = b'i';
const TYPE_BIGNUM: u8 = b'l';
const TYPE_FLOAT: u8 = b'f';
const TYPE_STRING: u8 = b'"';
const TYPE_SYMBOL: u8 = b':';
const TYPE_SYMLINK: u8 = b';';
const TYPE_IVAR: u8 = b'I';
const TYPE_ARRAY: u8 = b'[';
const TYPE_HASH: u8 = b'{';
const TYPE_REGEXP: u8 = b'/';
const TYPE_LINK: u8 = b'@';
const TYPE_USERDEF: u8 = b'U';
const TYPE_CLASS: u8 = b'c';
const TYPE_MODULE: u8 = b'm';

/// 字节数组是否以 Marshal 签名开头
pub fn signature(data: &[u8]) -> bool {
    data.starts_with(&SIGNATURE)
}

/// Marshal 序列化器
#[derive(Clone, Debug, Default)]
pub struct MarshalSerializer;

impl MarshalSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for MarshalSerializer {
    fn dump(&self, value: &Value) -> Result<Vec<u8>> {
        let mut writer = Writer::default();
        writer.buf.extend_from_slice(&SIGNATURE);
        writer.write_value(value, 0)?;
        Ok(writer.buf)
    }

    fn load(&self, data: &[u8]) -> Result<Value> {
        if !signature(data) {
            return Err(CoderError::Deserialization(
                "missing Marshal 4.8 signature".to_string(),
            ));
        }
        Reader::new(data, SIGNATURE.len()).read_value(0)
    }

    fn dumped(&self, data: &[u8]) -> bool {
        signature(data)
    }
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
    symbols: HashMap<String, usize>,
}

impl Writer {
    fn write_long(&mut self, x: i64) -> Result<()> {
        if i32::try_from(x).is_err() {
            return Err(CoderError::unserializable(
                "Integer",
                format!("long {} too big to dump", x),
            ));
        }
        if x == 0 {
            self.buf.push(0);
        } else if 0 < x && x < 123 {
            self.buf.push((x + 5) as u8);
        } else if -124 < x && x < 0 {
            self.buf.push(((x - 5) & 0xff) as u8);
        } else {
            let mut bytes = [0u8; 4];
            let mut rest = x;
            let mut len = 0usize;
            for (i, slot) in bytes.iter_mut().enumerate() {
                *slot = (rest & 0xff) as u8;
                rest >>= 8;
                len = i + 1;
                if rest == 0 || rest == -1 {
                    break;
                }
            }
            let count = if x < 0 { -(len as i8) } else { len as i8 };
            self.buf.push(count as u8);
            self.buf.extend_from_slice(&bytes[..len]);
        }
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = i64::try_from(len)
            .map_err(|_| CoderError::unserializable("Array", "length too big to dump"))?;
        self.write_long(len)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_len(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn write_symbol(&mut self, name: &str) -> Result<()> {
        if let Some(index) = self.symbols.get(name).copied() {
            self.buf.push(TYPE_SYMLINK);
            return self.write_len(index);
        }
        let index = self.symbols.len();
        if name.is_ascii() {
            self.buf.push(TYPE_SYMBOL);
            self.write_bytes(name.as_bytes())?;
            self.symbols.insert(name.to_string(), index);
        } else {
            self.buf.push(TYPE_IVAR);
            self.buf.push(TYPE_SYMBOL);
            self.write_bytes(name.as_bytes())?;
            self.symbols.insert(name.to_string(), index);
            self.write_long(1)?;
            self.write_symbol("E")?;
            self.buf.push(TYPE_TRUE);
        }
        Ok(())
    }

    fn write_string(&mut self, s: &RString) -> Result<()> {
        if *s.encoding() == Encoding::Binary {
            self.buf.push(TYPE_STRING);
            return self.write_bytes(s.bytes());
        }
        self.buf.push(TYPE_IVAR);
        self.buf.push(TYPE_STRING);
        self.write_bytes(s.bytes())?;
        self.write_encoding(s.encoding())
    }

    fn write_encoding(&mut self, encoding: &Encoding) -> Result<()> {
        self.write_long(1)?;
        match encoding {
            Encoding::Utf8 => {
                self.write_symbol("E")?;
                self.buf.push(TYPE_TRUE);
            }
            Encoding::UsAscii => {
                self.write_symbol("E")?;
                self.buf.push(TYPE_FALSE);
            }
            other => {
                self.write_symbol("encoding")?;
                self.buf.push(TYPE_STRING);
                self.write_bytes(other.name().as_bytes())?;
            }
        }
        Ok(())
    }

    fn write_bignum(&mut self, n: &BigInt) -> Result<()> {
        let (sign, mut magnitude) = n.to_bytes_le();
        if magnitude.len() % 2 == 1 {
            magnitude.push(0);
        }
        self.buf.push(TYPE_BIGNUM);
        self.buf.push(if sign == Sign::Minus { b'-' } else { b'+' });
        self.write_len(magnitude.len() / 2)?;
        self.buf.extend_from_slice(&magnitude);
        Ok(())
    }

    fn write_float(&mut self, f: f64) -> Result<()> {
        let repr = if f.is_nan() {
            "nan".to_string()
        } else if f == f64::INFINITY {
            "inf".to_string()
        } else if f == f64::NEG_INFINITY {
            "-inf".to_string()
        } else {
            format!("{:?}", f)
        };
        self.buf.push(TYPE_FLOAT);
        self.write_bytes(repr.as_bytes())
    }

    fn write_userdef(&mut self, class: &str, data: &Value, depth: usize) -> Result<()> {
        self.buf.push(TYPE_USERDEF);
        self.write_symbol(class)?;
        self.write_value(data, depth + 1)
    }

    fn write_value(&mut self, value: &Value, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(CoderError::DepthLimitExceeded(MAX_DEPTH));
        }
        match value {
            Value::Nil => self.buf.push(TYPE_NIL),
            Value::Bool(true) => self.buf.push(TYPE_TRUE),
            Value::Bool(false) => self.buf.push(TYPE_FALSE),
            Value::Int(i) => {
                if i32::try_from(*i).is_ok() {
                    self.buf.push(TYPE_FIXNUM);
                    self.write_long(*i)?;
                } else {
                    self.write_bignum(&BigInt::from(*i))?;
                }
            }
            Value::BigInt(n) => self.write_bignum(n)?,
            Value::Float(f) => self.write_float(*f)?,
            Value::Str(s) => self.write_string(s)?,
            Value::Symbol(name) => self.write_symbol(name)?,
            Value::Array(items) => {
                self.buf.push(TYPE_ARRAY);
                self.write_len(items.len())?;
                for item in items {
                    self.write_value(item, depth + 1)?;
                }
            }
            Value::Hash(pairs) => {
                self.buf.push(TYPE_HASH);
                self.write_len(pairs.len())?;
                for (k, v) in pairs {
                    self.write_value(k, depth + 1)?;
                    self.write_value(v, depth + 1)?;
                }
            }
            Value::Regexp(source) => {
                self.buf.push(TYPE_IVAR);
                self.buf.push(TYPE_REGEXP);
                self.write_bytes(source.as_bytes())?;
                self.buf.push(0);
                self.write_encoding(&Encoding::Utf8)?;
            }
            Value::Module(name) => {
                if name.is_empty() {
                    return Err(CoderError::unserializable(
                        "Module",
                        "can't dump anonymous class",
                    ));
                }
                self.buf.push(TYPE_CLASS);
                self.write_bytes(name.as_bytes())?;
            }
            Value::Object(obj) => self.write_userdef(&obj.class, &obj.data, depth)?,
            other => {
                let data = userdef_data(other)?;
                self.write_userdef(other.class_name(), &data, depth)?;
            }
        }
        Ok(())
    }
}

/// 内置复合类型在 `U` 记录中的数据部分
fn userdef_data(value: &Value) -> Result<Value> {
    let data = match value {
        Value::Decimal(d) => Value::string(d.to_string()),
        Value::Rational(n, d) => Value::Array(vec![Value::Int(*n), Value::Int(*d)]),
        Value::Complex(re, im) => Value::Array(vec![(**re).clone(), (**im).clone()]),
        Value::Range {
            begin,
            end,
            exclusive,
        } => Value::Array(vec![
            (**begin).clone(),
            (**end).clone(),
            Value::Bool(*exclusive),
        ]),
        Value::Set(items) => Value::Array(items.clone()),
        Value::Time(time) => {
            let (secs, nsecs, offset) = time_parts(time);
            Value::Array(vec![Value::Int(secs), Value::Int(nsecs), Value::Int(offset)])
        }
        Value::Date(date) => Value::Int(julian_day(date)),
        Value::Duration(duration) => {
            Value::Array(vec![Value::Int(duration.value), duration_parts(duration)])
        }
        Value::IpAddr(addr) => Value::string(addr.to_string()),
        Value::Path(path) => {
            let path = path
                .to_str()
                .ok_or_else(|| CoderError::unserializable("Pathname", "path is not valid UTF-8"))?;
            Value::string(path)
        }
        other => {
            return Err(CoderError::unserializable(
                other.class_name(),
                "no Marshal representation",
            ))
        }
    };
    Ok(data)
}

fn userdef_value(class: String, data: Value) -> Result<Value> {
    let malformed = |class: &str| CoderError::Deserialization(format!("malformed {} data", class));
    let value = match class.as_str() {
        "BigDecimal" => {
            let text = data.as_str().ok_or_else(|| malformed("BigDecimal"))?;
            Value::Decimal(text.parse().map_err(|_| malformed("BigDecimal"))?)
        }
        "Rational" => match data.as_array() {
            Some([Value::Int(n), Value::Int(d)]) => Value::Rational(*n, *d),
            _ => return Err(malformed("Rational")),
        },
        "Complex" => match data.into_array() {
            Some(parts) if parts.len() == 2 => {
                let mut parts = parts.into_iter();
                match (parts.next(), parts.next()) {
                    (Some(re), Some(im)) => Value::Complex(Box::new(re), Box::new(im)),
                    _ => return Err(malformed("Complex")),
                }
            }
            _ => return Err(malformed("Complex")),
        },
        "Range" => match data.into_array() {
            Some(parts) if parts.len() == 3 => {
                let mut parts = parts.into_iter();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(begin), Some(end), Some(Value::Bool(exclusive))) => {
                        Value::range(begin, end, exclusive)
                    }
                    _ => return Err(malformed("Range")),
                }
            }
            _ => return Err(malformed("Range")),
        },
        "Set" => Value::Set(data.into_array().ok_or_else(|| malformed("Set"))?),
        "Time" => match data.as_array() {
            Some([Value::Int(secs), Value::Int(nsecs), Value::Int(offset)]) => {
                Value::Time(time_from_parts(*secs, *nsecs, *offset)?)
            }
            _ => return Err(malformed("Time")),
        },
        "Date" => {
            let jd = data.as_i64().ok_or_else(|| malformed("Date"))?;
            Value::Date(date_from_julian_day(jd)?)
        }
        "ActiveSupport::Duration" => match data.as_array() {
            Some([value, parts]) => Value::Duration(duration_from_parts(value, parts)?),
            _ => return Err(malformed("ActiveSupport::Duration")),
        },
        "IPAddr" => {
            let text = data.as_str().ok_or_else(|| malformed("IPAddr"))?;
            Value::IpAddr(text.parse().map_err(|_| malformed("IPAddr"))?)
        }
        "Pathname" => {
            let text = data.as_str().ok_or_else(|| malformed("Pathname"))?;
            Value::Path(text.into())
        }
        _ => Value::object(class, data),
    };
    Ok(value)
}

/// 已解码对象表中的一项：对象值及其节点数
type LinkedObject = (Value, usize);

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    symbols: Vec<String>,
    /// 按链接编号索引，`None` 表示对象仍在解码中
    objects: Vec<Option<LinkedObject>>,
    nodes: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            symbols: Vec::new(),
            objects: Vec::new(),
            nodes: 0,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let data = self.data;
        let end = self.pos.checked_add(n).filter(|end| *end <= data.len());
        match end {
            Some(end) => {
                let bytes = &data[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            None => Err(CoderError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.data.len().saturating_sub(self.pos),
            }),
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_long(&mut self) -> Result<i64> {
        let c = self.read_byte()? as i8;
        let x = match c {
            0 => 0,
            5..=127 => i64::from(c) - 5,
            1..=4 => {
                let bytes = self.take(c as usize)?;
                bytes
                    .iter()
                    .enumerate()
                    .fold(0i64, |acc, (i, b)| acc | (i64::from(*b) << (8 * i)))
            }
            -128..=-5 => i64::from(c) + 5,
            _ => {
                let bytes = self.take(-c as usize)?;
                bytes.iter().enumerate().fold(-1i64, |acc, (i, b)| {
                    (acc & !(0xff << (8 * i))) | (i64::from(*b) << (8 * i))
                })
            }
        };
        Ok(x)
    }

    fn read_len(&mut self) -> Result<usize> {
        let len = self.read_long()?;
        usize::try_from(len)
            .map_err(|_| CoderError::Deserialization(format!("negative length {}", len)))
    }

    fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        self.take(len)
    }

    fn read_symbol_body(&mut self) -> Result<String> {
        let name = String::from_utf8_lossy(self.read_bytes()?).into_owned();
        self.symbols.push(name.clone());
        Ok(name)
    }

    fn read_symlink(&mut self) -> Result<String> {
        let index = self.read_len()?;
        self.symbols
            .get(index)
            .cloned()
            .ok_or_else(|| CoderError::Deserialization(format!("bad symbol link {}", index)))
    }

    fn read_symbol(&mut self) -> Result<String> {
        match self.read_byte()? {
            TYPE_SYMBOL => self.read_symbol_body(),
            TYPE_SYMLINK => self.read_symlink(),
            other => Err(CoderError::Deserialization(format!(
                "expected symbol, got type byte 0x{:02x}",
                other
            ))),
        }
    }

    fn register(&mut self) -> usize {
        self.objects.push(None);
        self.objects.len() - 1
    }

    fn count_nodes(&mut self, n: usize) -> Result<()> {
        self.nodes = self.nodes.saturating_add(n);
        if self.nodes > MAX_NODES {
            return Err(CoderError::NodeLimitExceeded(MAX_NODES));
        }
        Ok(())
    }

    fn linked(&self, index: usize) -> Result<&LinkedObject> {
        match self.objects.get(index) {
            Some(Some(object)) => Ok(object),
            Some(None) => Err(CoderError::Deserialization(format!(
                "object link {} refers to an enclosing object",
                index
            ))),
            None => Err(CoderError::Deserialization(format!(
                "bad object link {}",
                index
            ))),
        }
    }

    fn read_value(&mut self, depth: usize) -> Result<Value> {
        Ok(self.read_object(depth)?.0)
    }

    /// 读取一个值，同时返回它在对象表中的编号
    fn read_object(&mut self, depth: usize) -> Result<(Value, Option<usize>)> {
        if depth > MAX_DEPTH {
            return Err(CoderError::DepthLimitExceeded(MAX_DEPTH));
        }
        self.count_nodes(1)?;
        let start = self.pos;
        let nodes_before = self.nodes;
        let mut slot = None;
        let value = match self.read_byte()? {
            TYPE_NIL => Value::Nil,
            TYPE_TRUE => Value::Bool(true),
            TYPE_FALSE => Value::Bool(false),
            TYPE_FIXNUM => Value::Int(self.read_long()?),
            TYPE_BIGNUM => {
                slot = Some(self.register());
                let sign = match self.read_byte()? {
                    b'-' => Sign::Minus,
                    _ => Sign::Plus,
                };
                let shorts = self.read_len()?;
                let len = shorts.checked_mul(2).ok_or_else(|| {
                    CoderError::Deserialization("bignum length overflow".to_string())
                })?;
                Value::integer(BigInt::from_bytes_le(sign, self.take(len)?))
            }
            TYPE_FLOAT => {
                slot = Some(self.register());
                let raw = self.read_bytes()?;
                let text = raw.split(|b| *b == 0).next().unwrap_or_default();
                let text = String::from_utf8_lossy(text);
                let f = match text.as_ref() {
                    "nan" => f64::NAN,
                    "inf" => f64::INFINITY,
                    "-inf" => f64::NEG_INFINITY,
                    other => other.parse().map_err(|_| {
                        CoderError::Deserialization(format!("bad float {:?}", other))
                    })?,
                };
                Value::Float(f)
            }
            TYPE_STRING => {
                slot = Some(self.register());
                Value::binary(self.read_bytes()?)
            }
            TYPE_REGEXP => {
                slot = Some(self.register());
                let source = String::from_utf8_lossy(self.read_bytes()?).into_owned();
                self.read_byte()?;
                Value::Regexp(source)
            }
            TYPE_SYMBOL => Value::Symbol(self.read_symbol_body()?),
            TYPE_SYMLINK => Value::Symbol(self.read_symlink()?),
            TYPE_IVAR => {
                let (inner, inner_slot) = self.read_object(depth + 1)?;
                let value = self.read_ivars(inner, depth)?;
                // 实例变量属于被包装的对象，链接应看到带编码的值
                if let Some(Some((linked, _))) = inner_slot.and_then(|i| self.objects.get_mut(i)) {
                    *linked = value.clone();
                }
                return Ok((value, inner_slot));
            }
            TYPE_ARRAY => {
                slot = Some(self.register());
                let len = self.read_len()?;
                let mut items = Vec::with_capacity(len.min(self.data.len() - self.pos));
                for _ in 0..len {
                    items.push(self.read_value(depth + 1)?);
                }
                Value::Array(items)
            }
            TYPE_HASH => {
                slot = Some(self.register());
                let len = self.read_len()?;
                let mut pairs = Vec::with_capacity(len.min(self.data.len() - self.pos));
                for _ in 0..len {
                    let k = self.read_value(depth + 1)?;
                    let v = self.read_value(depth + 1)?;
                    pairs.push((k, v));
                }
                Value::Hash(pairs)
            }
            TYPE_LINK => {
                let index = self.read_len()?;
                let nodes = self.linked(index)?.1;
                self.count_nodes(nodes)?;
                return Ok((self.linked(index)?.0.clone(), None));
            }
            TYPE_USERDEF => {
                slot = Some(self.register());
                let class = self.read_symbol()?;
                let data = self.read_value(depth + 1)?;
                userdef_value(class, data)?
            }
            TYPE_CLASS | TYPE_MODULE => {
                slot = Some(self.register());
                Value::Module(String::from_utf8_lossy(self.read_bytes()?).into_owned())
            }
            other => {
                return Err(CoderError::Deserialization(format!(
                    "unsupported Marshal type byte 0x{:02x} at offset {}",
                    other, start
                )))
            }
        };
        let nodes = self.nodes - nodes_before + 1;
        if let Some(entry) = slot.and_then(|i| self.objects.get_mut(i)) {
            *entry = Some((value.clone(), nodes));
        }
        Ok((value, slot))
    }

    /// 读取实例变量并把编码信息应用到内部值上
    fn read_ivars(&mut self, inner: Value, depth: usize) -> Result<Value> {
        let count = self.read_len()?;
        let mut encoding = None;
        for _ in 0..count {
            let name = self.read_symbol()?;
            let value = self.read_value(depth + 1)?;
            match (name.as_str(), value) {
                ("E", Value::Bool(true)) => encoding = Some(Encoding::Utf8),
                ("E", Value::Bool(false)) => encoding = Some(Encoding::UsAscii),
                ("encoding", Value::Str(name)) => {
                    encoding = Some(Encoding::from_name(&String::from_utf8_lossy(name.bytes())))
                }
                _ => {}
            }
        }
        Ok(match (inner, encoding) {
            (Value::Str(s), Some(encoding)) => Value::Str(RString::new(s.into_bytes(), encoding)),
            (inner, _) => inner,
        })
    }
}
