//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了可缓存值的数据模型。
//!
//! 所有编解码器只处理这里列出的封闭集合；调用方自定义的类型通过
//! [`Value::Object`] 携带类名和数据，由扩展注册表按类名分派。

use crate::error::{CoderError, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

/// 字符串编码标记
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// UTF-8
    Utf8,
    /// 二进制（ASCII-8BIT）
    Binary,
    /// US-ASCII
    UsAscii,
    /// 其他编码，保存编码名称
    Other(String),
}

impl Encoding {
    /// 编码名称
    pub fn name(&self) -> &str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Binary => "ASCII-8BIT",
            Encoding::UsAscii => "US-ASCII",
            Encoding::Other(name) => name,
        }
    }

    /// 根据名称解析编码
    pub fn from_name(name: &str) -> Self {
        match name {
            "UTF-8" => Encoding::Utf8,
            "ASCII-8BIT" | "BINARY" => Encoding::Binary,
            "US-ASCII" => Encoding::UsAscii,
            other => Encoding::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 带编码标记的字节串
///
/// 字节内容不会按编码校验，UTF-8 标记的字符串也可能包含非法字节
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RString {
    bytes: Vec<u8>,
    encoding: Encoding,
}

impl RString {
    pub fn new(bytes: impl Into<Vec<u8>>, encoding: Encoding) -> Self {
        Self {
            bytes: bytes.into(),
            encoding,
        }
    }

    /// 创建 UTF-8 字符串
    pub fn utf8(s: impl Into<String>) -> Self {
        Self::new(s.into().into_bytes(), Encoding::Utf8)
    }

    /// 创建二进制字符串
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(bytes, Encoding::Binary)
    }

    /// 创建 US-ASCII 字符串
    pub fn ascii(s: impl Into<String>) -> Self {
        Self::new(s.into().into_bytes(), Encoding::UsAscii)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 以 `&str` 形式访问，字节不是合法 UTF-8 时返回 `None`
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.bytes.starts_with(prefix)
    }
}

impl From<&str> for RString {
    fn from(s: &str) -> Self {
        RString::utf8(s)
    }
}

impl From<String> for RString {
    fn from(s: String) -> Self {
        RString::utf8(s)
    }
}

/// `ActiveSupport::Duration` 风格的时长组成部分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationPart {
    Years,
    Months,
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl DurationPart {
    /// 线上格式中各部分的固定顺序
    pub const ALL: [DurationPart; 7] = [
        DurationPart::Years,
        DurationPart::Months,
        DurationPart::Weeks,
        DurationPart::Days,
        DurationPart::Hours,
        DurationPart::Minutes,
        DurationPart::Seconds,
    ];
}

/// 带组成部分的时长
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DurationValue {
    /// 总秒数
    pub value: i64,
    /// 按 [`DurationPart::ALL`] 顺序排列的组成部分
    pub parts: Vec<(DurationPart, i64)>,
}

impl DurationValue {
    pub fn new(value: i64, mut parts: Vec<(DurationPart, i64)>) -> Self {
        parts.sort_by_key(|(part, _)| DurationPart::ALL.iter().position(|p| p == part));
        Self { value, parts }
    }

    pub fn seconds(value: i64) -> Self {
        Self::new(value, vec![(DurationPart::Seconds, value)])
    }

    /// 取出指定部分
    pub fn part(&self, part: DurationPart) -> Option<i64> {
        self.parts.iter().find(|(p, _)| *p == part).map(|(_, v)| *v)
    }
}

/// 调用方自定义类型的值
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    /// 类名，同时作为扩展注册表的分派键
    pub class: String,
    /// 对象数据
    pub data: Box<Value>,
}

impl ObjectValue {
    pub fn new(class: impl Into<String>, data: Value) -> Self {
        Self {
            class: class.into(),
            data: Box::new(data),
        }
    }
}

/// 可缓存的值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    /// 超出 i64 范围的整数，请通过 [`Value::integer`] 构造
    BigInt(BigInt),
    Float(f64),
    Str(RString),
    Symbol(String),
    Array(Vec<Value>),
    /// 保持插入顺序的键值对
    Hash(Vec<(Value, Value)>),
    Decimal(Decimal),
    Rational(i64, i64),
    Complex(Box<Value>, Box<Value>),
    Range {
        begin: Box<Value>,
        end: Box<Value>,
        exclusive: bool,
    },
    Set(Vec<Value>),
    Time(DateTime<FixedOffset>),
    Date(NaiveDate),
    Duration(DurationValue),
    IpAddr(IpAddr),
    Path(PathBuf),
    Regexp(String),
    /// 模块或类的名称，空字符串表示匿名类
    Module(String),
    Object(ObjectValue),
}

impl Value {
    /// 构造整数值，能放进 i64 时使用 [`Value::Int`]
    pub fn integer(n: BigInt) -> Self {
        match n.to_i64() {
            Some(i) => Value::Int(i),
            None => Value::BigInt(n),
        }
    }

    /// 构造 UTF-8 字符串值
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(RString::utf8(s))
    }

    /// 构造二进制字符串值
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Str(RString::binary(bytes))
    }

    pub fn range(begin: Value, end: Value, exclusive: bool) -> Self {
        Value::Range {
            begin: Box::new(begin),
            end: Box::new(end),
            exclusive,
        }
    }

    pub fn object(class: impl Into<String>, data: Value) -> Self {
        Value::Object(ObjectValue::new(class, data))
    }

    /// 值的类名
    ///
    /// 用作扩展注册表的分派键和错误信息中的类型名
    pub fn class_name(&self) -> &str {
        match self {
            Value::Nil => "NilClass",
            Value::Bool(true) => "TrueClass",
            Value::Bool(false) => "FalseClass",
            Value::Int(_) | Value::BigInt(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Array(_) => "Array",
            Value::Hash(_) => "Hash",
            Value::Decimal(_) => "BigDecimal",
            Value::Rational(..) => "Rational",
            Value::Complex(..) => "Complex",
            Value::Range { .. } => "Range",
            Value::Set(_) => "Set",
            Value::Time(_) => "Time",
            Value::Date(_) => "Date",
            Value::Duration(_) => "ActiveSupport::Duration",
            Value::IpAddr(_) => "IPAddr",
            Value::Path(_) => "Pathname",
            Value::Regexp(_) => "Regexp",
            Value::Module(_) => "Module",
            Value::Object(obj) => &obj.class,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_rstring(&self) -> Option<&RString> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 字符串或符号的文本内容
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => s.as_str(),
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<RString> for Value {
    fn from(s: RString) -> Self {
        Value::Str(s)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::integer(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}

/// 公元 0001-01-01 的儒略日减一
const JULIAN_DAY_OFFSET: i64 = 1_721_425;

/// 日期对应的儒略日
pub(crate) fn julian_day(date: &NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) + JULIAN_DAY_OFFSET
}

/// 由儒略日还原日期
pub(crate) fn date_from_julian_day(jd: i64) -> Result<NaiveDate> {
    i32::try_from(jd - JULIAN_DAY_OFFSET)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| CoderError::Deserialization(format!("julian day {} out of range", jd)))
}

/// 时间的 (秒, 纳秒, UTC 偏移秒数) 表示
pub(crate) fn time_parts(time: &DateTime<FixedOffset>) -> (i64, i64, i64) {
    (
        time.timestamp(),
        i64::from(time.timestamp_subsec_nanos()),
        i64::from(time.offset().local_minus_utc()),
    )
}

/// 由 (秒, 纳秒, UTC 偏移秒数) 还原时间
pub(crate) fn time_from_parts(secs: i64, nsecs: i64, offset: i64) -> Result<DateTime<FixedOffset>> {
    let offset = i32::try_from(offset)
        .ok()
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| CoderError::Deserialization(format!("invalid utc offset {}", offset)))?;
    let nsecs = u32::try_from(nsecs)
        .map_err(|_| CoderError::Deserialization(format!("invalid nanoseconds {}", nsecs)))?;
    DateTime::from_timestamp(secs, nsecs)
        .map(|utc| utc.with_timezone(&offset))
        .ok_or_else(|| CoderError::Deserialization(format!("timestamp {} out of range", secs)))
}

/// 时长的各部分，缺失的部分为 `Nil`
pub(crate) fn duration_parts(duration: &DurationValue) -> Value {
    Value::Array(
        DurationPart::ALL
            .iter()
            .map(|part| duration.part(*part).map(Value::Int).unwrap_or(Value::Nil))
            .collect(),
    )
}

/// 由总秒数和各部分还原时长
pub(crate) fn duration_from_parts(value: &Value, parts: &Value) -> Result<DurationValue> {
    let value = value
        .as_i64()
        .ok_or_else(|| CoderError::Deserialization("duration value must be an integer".into()))?;
    let parts = parts
        .as_array()
        .ok_or_else(|| CoderError::Deserialization("duration parts must be an array".into()))?;
    let parts = DurationPart::ALL
        .iter()
        .zip(parts)
        .filter_map(|(part, v)| v.as_i64().map(|n| (*part, n)))
        .collect();
    Ok(DurationValue::new(value, parts))
}
