//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 内置扩展类型的编解码函数。

use super::packer::{Packer, Unpacker};
use super::registry::{
    ExtensionCodec, ExtensionRegistryBuilder, ENCODED_STRING_CLASS, OBJECT_CLASS, URI_CLASS,
};
use crate::error::{CoderError, Result};
use crate::value::{
    date_from_julian_day, duration_from_parts, duration_parts, julian_day, time_from_parts,
    time_parts, Encoding, RString, Value,
};
use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, FixedOffset, Timelike};
use num_bigint::{BigInt, Sign};

/// 安装全部内置类型
pub(crate) fn install(builder: &mut ExtensionRegistryBuilder) {
    builder.insert(0, "Symbol", ExtensionCodec::raw(pack_symbol, unpack_symbol));
    builder.insert(1, "Integer", ExtensionCodec::raw(pack_bigint, unpack_bigint));
    builder.insert(2, "BigDecimal", ExtensionCodec::raw(pack_decimal, unpack_decimal));
    builder.insert(3, "Rational", ExtensionCodec::recursive(write_rational, read_rational));
    builder.insert(4, "Complex", ExtensionCodec::recursive(write_complex, read_complex));
    builder.insert(5, "Range", ExtensionCodec::recursive(write_range, read_range));
    builder.insert(7, "Set", ExtensionCodec::recursive(write_set, read_set));
    builder.insert(8, "Time", ExtensionCodec::recursive(write_time, read_time));
    builder.insert(9, "DateTime", ExtensionCodec::recursive(write_datetime, read_datetime));
    builder.insert(10, "Date", ExtensionCodec::recursive(write_date, read_date));
    builder.insert(
        13,
        "ActiveSupport::Duration",
        ExtensionCodec::recursive(write_duration, read_duration),
    );
    builder.insert(14, URI_CLASS, ExtensionCodec::raw(pack_uri, unpack_uri));
    builder.insert(15, "IPAddr", ExtensionCodec::raw(pack_ip_addr, unpack_ip_addr));
    builder.insert(16, "Pathname", ExtensionCodec::raw(pack_path, unpack_path));
    builder.insert(17, "Regexp", ExtensionCodec::raw(pack_regexp, unpack_regexp));
    builder.insert(18, "Module", ExtensionCodec::raw(pack_module, unpack_module));
    builder.insert(
        19,
        ENCODED_STRING_CLASS,
        ExtensionCodec::recursive(write_encoded_string, read_encoded_string),
    );
    builder.insert(
        127,
        OBJECT_CLASS,
        ExtensionCodec::recursive(write_object, read_object),
    );
}

fn mismatch(expected: &str, value: &Value) -> CoderError {
    CoderError::Serialization(format!(
        "{} extension cannot pack {}",
        expected,
        value.class_name()
    ))
}

fn malformed(class: &str) -> CoderError {
    CoderError::Deserialization(format!("malformed {} extension payload", class))
}

fn utf8(bytes: &[u8], class: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| malformed(class))
}

fn read_int(unpacker: &mut Unpacker<'_, '_>, class: &str) -> Result<i64> {
    unpacker.read()?.as_i64().ok_or_else(|| malformed(class))
}

fn pack_symbol(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Symbol(name) => Ok(name.as_bytes().to_vec()),
        other => Err(mismatch("Symbol", other)),
    }
}

fn unpack_symbol(payload: &[u8]) -> Result<Value> {
    Ok(Value::Symbol(utf8(payload, "Symbol")?))
}

/// 符号字节 + 大端 u32 分块，最低位分块在前
fn pack_bigint(value: &Value) -> Result<Vec<u8>> {
    let n = match value {
        Value::BigInt(n) => n.clone(),
        Value::Int(i) => BigInt::from(*i),
        other => return Err(mismatch("Integer", other)),
    };
    let (sign, digits) = n.to_u32_digits();
    let mut payload = vec![0u8; 1 + digits.len() * 4];
    payload[0] = u8::from(sign == Sign::Minus);
    for (chunk, digit) in payload[1..].chunks_exact_mut(4).zip(&digits) {
        BigEndian::write_u32(chunk, *digit);
    }
    Ok(payload)
}

fn unpack_bigint(payload: &[u8]) -> Result<Value> {
    let (sign, chunks) = payload.split_first().ok_or_else(|| malformed("Integer"))?;
    if chunks.len() % 4 != 0 {
        return Err(malformed("Integer"));
    }
    let digits: Vec<u32> = chunks.chunks_exact(4).map(BigEndian::read_u32).collect();
    let sign = if *sign == 0 { Sign::Plus } else { Sign::Minus };
    Ok(Value::integer(BigInt::from_slice(sign, &digits)))
}

fn pack_decimal(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Decimal(d) => Ok(d.to_string().into_bytes()),
        other => Err(mismatch("BigDecimal", other)),
    }
}

fn unpack_decimal(payload: &[u8]) -> Result<Value> {
    let text = utf8(payload, "BigDecimal")?;
    text.parse()
        .map(Value::Decimal)
        .map_err(|_| malformed("BigDecimal"))
}

/// 分子为 0 时省略分母
fn write_rational(value: &Value, packer: &mut Packer<'_>) -> Result<()> {
    match value {
        Value::Rational(n, d) => {
            packer.write(&Value::Int(*n))?;
            if *n != 0 {
                packer.write(&Value::Int(*d))?;
            }
            Ok(())
        }
        other => Err(mismatch("Rational", other)),
    }
}

fn read_rational(unpacker: &mut Unpacker<'_, '_>) -> Result<Value> {
    let n = read_int(unpacker, "Rational")?;
    let d = if n == 0 { 1 } else { read_int(unpacker, "Rational")? };
    Ok(Value::Rational(n, d))
}

fn write_complex(value: &Value, packer: &mut Packer<'_>) -> Result<()> {
    match value {
        Value::Complex(re, im) => {
            packer.write(re)?;
            packer.write(im)
        }
        other => Err(mismatch("Complex", other)),
    }
}

fn read_complex(unpacker: &mut Unpacker<'_, '_>) -> Result<Value> {
    let re = unpacker.read()?;
    let im = unpacker.read()?;
    Ok(Value::Complex(Box::new(re), Box::new(im)))
}

fn write_range(value: &Value, packer: &mut Packer<'_>) -> Result<()> {
    match value {
        Value::Range {
            begin,
            end,
            exclusive,
        } => {
            packer.write(begin)?;
            packer.write(end)?;
            packer.write(&Value::Bool(*exclusive))
        }
        other => Err(mismatch("Range", other)),
    }
}

fn read_range(unpacker: &mut Unpacker<'_, '_>) -> Result<Value> {
    let begin = unpacker.read()?;
    let end = unpacker.read()?;
    let exclusive = unpacker.read()?.as_bool().ok_or_else(|| malformed("Range"))?;
    Ok(Value::range(begin, end, exclusive))
}

fn write_set(value: &Value, packer: &mut Packer<'_>) -> Result<()> {
    match value {
        Value::Set(items) => packer.write(&Value::Array(items.clone())),
        other => Err(mismatch("Set", other)),
    }
}

fn read_set(unpacker: &mut Unpacker<'_, '_>) -> Result<Value> {
    let items = unpacker.read()?.into_array().ok_or_else(|| malformed("Set"))?;
    Ok(Value::Set(items))
}

fn write_time(value: &Value, packer: &mut Packer<'_>) -> Result<()> {
    match value {
        Value::Time(time) => {
            let (secs, nsecs, offset) = time_parts(time);
            packer.write(&Value::Int(secs))?;
            packer.write(&Value::Int(nsecs))?;
            packer.write(&Value::Int(offset))
        }
        other => Err(mismatch("Time", other)),
    }
}

fn read_time(unpacker: &mut Unpacker<'_, '_>) -> Result<Value> {
    let secs = read_int(unpacker, "Time")?;
    let nsecs = read_int(unpacker, "Time")?;
    let offset = read_int(unpacker, "Time")?;
    Ok(Value::Time(time_from_parts(secs, nsecs, offset)?))
}

const NANOS_PER_SEC: i64 = 1_000_000_000;
const SECS_PER_DAY: i64 = 86_400;

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs()
}

fn reduced(n: i64, d: i64) -> Value {
    match gcd(n, d) {
        0 => Value::Rational(0, 1),
        g => Value::Rational(n / g, d / g),
    }
}

fn read_ratio(unpacker: &mut Unpacker<'_, '_>, class: &str) -> Result<(i64, i64)> {
    match read_rational(unpacker)? {
        Value::Rational(_, 0) => Err(malformed(class)),
        Value::Rational(n, d) => Ok((n, d)),
        _ => Err(malformed(class)),
    }
}

/// 儒略日、时、分、秒、秒的小数部分和以天为单位的偏移，均为当地时间
///
/// 写出时间值时使用 8 号类型，本类型主要用于读取其他程序写入的数据
fn write_datetime(value: &Value, packer: &mut Packer<'_>) -> Result<()> {
    let time = match value {
        Value::Time(time) => time,
        other => return Err(mismatch("DateTime", other)),
    };
    let local = time.naive_local();
    packer.write(&Value::Int(julian_day(&local.date())))?;
    packer.write(&Value::Int(i64::from(local.hour())))?;
    packer.write(&Value::Int(i64::from(local.minute())))?;
    packer.write(&Value::Int(i64::from(local.second())))?;
    let nanos = i64::from(time.timestamp_subsec_nanos());
    write_rational(&reduced(nanos, NANOS_PER_SEC), packer)?;
    let offset = i64::from(time.offset().local_minus_utc());
    write_rational(&reduced(offset, SECS_PER_DAY), packer)
}

fn read_datetime(unpacker: &mut Unpacker<'_, '_>) -> Result<Value> {
    let jd = read_int(unpacker, "DateTime")?;
    let hour = read_int(unpacker, "DateTime")?;
    let minute = read_int(unpacker, "DateTime")?;
    let second = read_int(unpacker, "DateTime")?;
    let (frac_n, frac_d) = read_ratio(unpacker, "DateTime")?;
    let (offset_n, offset_d) = read_ratio(unpacker, "DateTime")?;

    let nanos = i64::try_from(i128::from(frac_n) * i128::from(NANOS_PER_SEC) / i128::from(frac_d))
        .map_err(|_| malformed("DateTime"))?;
    let offset =
        i64::try_from(i128::from(offset_n) * i128::from(SECS_PER_DAY) / i128::from(offset_d))
            .map_err(|_| malformed("DateTime"))?;
    let to_u32 = |n: i64| u32::try_from(n).map_err(|_| malformed("DateTime"));
    let local = date_from_julian_day(jd)?
        .and_hms_nano_opt(to_u32(hour)?, to_u32(minute)?, to_u32(second)?, to_u32(nanos)?)
        .ok_or_else(|| malformed("DateTime"))?;
    let utc_secs = local
        .and_utc()
        .timestamp()
        .checked_sub(offset)
        .ok_or_else(|| malformed("DateTime"))?;
    let time: DateTime<FixedOffset> = time_from_parts(utc_secs, nanos, offset)?;
    Ok(Value::Time(time))
}

fn write_date(value: &Value, packer: &mut Packer<'_>) -> Result<()> {
    match value {
        Value::Date(date) => packer.write(&Value::Int(julian_day(date))),
        other => Err(mismatch("Date", other)),
    }
}

fn read_date(unpacker: &mut Unpacker<'_, '_>) -> Result<Value> {
    let jd = read_int(unpacker, "Date")?;
    Ok(Value::Date(date_from_julian_day(jd)?))
}

fn write_duration(value: &Value, packer: &mut Packer<'_>) -> Result<()> {
    match value {
        Value::Duration(duration) => {
            packer.write(&Value::Int(duration.value))?;
            packer.write(&duration_parts(duration))
        }
        other => Err(mismatch("ActiveSupport::Duration", other)),
    }
}

fn read_duration(unpacker: &mut Unpacker<'_, '_>) -> Result<Value> {
    let value = unpacker.read()?;
    let parts = unpacker.read()?;
    Ok(Value::Duration(duration_from_parts(&value, &parts)?))
}

fn pack_uri(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Object(obj) if obj.class == URI_CLASS => match obj.data.as_str() {
            Some(uri) => Ok(uri.as_bytes().to_vec()),
            None => Err(mismatch(URI_CLASS, value)),
        },
        other => Err(mismatch(URI_CLASS, other)),
    }
}

fn unpack_uri(payload: &[u8]) -> Result<Value> {
    Ok(Value::object(URI_CLASS, Value::string(utf8(payload, URI_CLASS)?)))
}

fn pack_ip_addr(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::IpAddr(addr) => Ok(addr.to_string().into_bytes()),
        other => Err(mismatch("IPAddr", other)),
    }
}

fn unpack_ip_addr(payload: &[u8]) -> Result<Value> {
    let text = utf8(payload, "IPAddr")?;
    text.parse()
        .map(Value::IpAddr)
        .map_err(|_| malformed("IPAddr"))
}

fn pack_path(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Path(path) => path
            .to_str()
            .map(|p| p.as_bytes().to_vec())
            .ok_or_else(|| CoderError::unserializable("Pathname", "path is not valid UTF-8")),
        other => Err(mismatch("Pathname", other)),
    }
}

fn unpack_path(payload: &[u8]) -> Result<Value> {
    Ok(Value::Path(utf8(payload, "Pathname")?.into()))
}

fn pack_regexp(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Regexp(source) => Ok(source.as_bytes().to_vec()),
        other => Err(mismatch("Regexp", other)),
    }
}

fn unpack_regexp(payload: &[u8]) -> Result<Value> {
    Ok(Value::Regexp(utf8(payload, "Regexp")?))
}

fn pack_module(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Module(name) if name.is_empty() => Err(CoderError::unserializable(
            "Module",
            "cannot serialize anonymous module or class",
        )),
        Value::Module(name) => Ok(name.as_bytes().to_vec()),
        other => Err(mismatch("Module", other)),
    }
}

fn unpack_module(payload: &[u8]) -> Result<Value> {
    Ok(Value::Module(utf8(payload, "Module")?))
}

/// 编码名 + 二进制字节
fn write_encoded_string(value: &Value, packer: &mut Packer<'_>) -> Result<()> {
    match value {
        Value::Str(s) => {
            packer.write(&Value::string(s.encoding().name()))?;
            packer.write(&Value::binary(s.bytes()))
        }
        other => Err(mismatch(ENCODED_STRING_CLASS, other)),
    }
}

fn read_encoded_string(unpacker: &mut Unpacker<'_, '_>) -> Result<Value> {
    let name = unpacker.read()?;
    let bytes = unpacker.read()?;
    match (name.as_str(), bytes) {
        (Some(name), Value::Str(bytes)) => Ok(Value::Str(RString::new(
            bytes.into_bytes(),
            Encoding::from_name(name),
        ))),
        _ => Err(malformed(ENCODED_STRING_CLASS)),
    }
}

/// 类名 + 对象数据
fn write_object(value: &Value, packer: &mut Packer<'_>) -> Result<()> {
    match value {
        Value::Object(obj) => {
            packer.write(&Value::string(obj.class.as_str()))?;
            packer.write(&obj.data)
        }
        other => Err(mismatch(OBJECT_CLASS, other)),
    }
}

fn read_object(unpacker: &mut Unpacker<'_, '_>) -> Result<Value> {
    let class = unpacker.read()?;
    let data = unpacker.read()?;
    let class = class.as_str().ok_or_else(|| malformed(OBJECT_CLASS))?;
    Ok(Value::object(class, data))
}
