//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了JSON序列化器的实现。
//!
//! JSON 是有损格式：符号变为字符串，集合变为数组，时间变为 ISO 8601 文本。

use super::Serializer;
use crate::error::{CoderError, Result};
use crate::value::{RString, Value};
use chrono::SecondsFormat;
use lazy_static::lazy_static;
use regex::bytes::Regex;
use serde_json::{Map, Number};

lazy_static! {
    /// JSON 文档的开头：对象、数组、字符串、数字或布尔值
    static ref JSON_START: Regex =
        Regex::new(r#"\A(?:[{\["]|-?\d|true|false)"#).expect("JSON start pattern is valid");
}

/// 字节数组是否看起来像 JSON 文档
pub fn signature(data: &[u8]) -> bool {
    JSON_START.is_match(data)
}

/// JSON序列化器
///
/// 基于serde_json，经由 `serde_json::Value` 中转
#[derive(Clone, Debug, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    /// 创建新的JSON序列化器
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for JsonSerializer {
    fn dump(&self, value: &Value) -> Result<Vec<u8>> {
        let json = to_json(value)?;
        serde_json::to_vec(&json).map_err(|e| CoderError::Serialization(e.to_string()))
    }

    fn load(&self, data: &[u8]) -> Result<Value> {
        let json: serde_json::Value =
            serde_json::from_slice(data).map_err(|e| CoderError::Deserialization(e.to_string()))?;
        Ok(from_json(json))
    }

    fn dumped(&self, data: &[u8]) -> bool {
        signature(data)
    }
}

fn utf8_text<'a>(s: &'a RString, class: &str) -> Result<&'a str> {
    s.as_str()
        .ok_or_else(|| CoderError::unserializable(class, "string is not valid UTF-8"))
}

/// 值的文本形式，用于没有原生 JSON 表示的类型
fn to_s(value: &Value) -> Result<String> {
    let text = match value {
        Value::Nil => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::BigInt(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => utf8_text(s, "String")?.to_string(),
        Value::Symbol(s) | Value::Regexp(s) | Value::Module(s) => s.clone(),
        Value::Decimal(d) => d.to_string(),
        Value::Rational(n, d) => format!("{}/{}", n, d),
        Value::Complex(re, im) => format!("{}+{}i", to_s(re)?, to_s(im)?),
        Value::Range {
            begin,
            end,
            exclusive,
        } => format!(
            "{}{}{}",
            to_s(begin)?,
            if *exclusive { "..." } else { ".." },
            to_s(end)?
        ),
        Value::Time(t) => t.to_rfc3339_opts(SecondsFormat::Millis, false),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::Duration(d) => d.value.to_string(),
        Value::IpAddr(addr) => addr.to_string(),
        Value::Path(path) => path.to_string_lossy().into_owned(),
        Value::Array(_) | Value::Hash(_) | Value::Set(_) | Value::Object(_) => {
            return Err(CoderError::unserializable(
                value.class_name(),
                "no textual JSON form",
            ))
        }
    };
    Ok(text)
}

/// 把值转换为 JSON 文档
pub(crate) fn to_json(value: &Value) -> Result<serde_json::Value> {
    let json = match value {
        Value::Nil => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Duration(d) => serde_json::Value::Number(d.value.into()),
        Value::Array(items) | Value::Set(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect::<Result<_>>()?)
        }
        Value::Hash(pairs) => {
            let mut map = Map::with_capacity(pairs.len());
            for (k, v) in pairs {
                let key = match k {
                    Value::Array(_) | Value::Hash(_) | Value::Set(_) | Value::Object(_) => {
                        return Err(CoderError::unserializable(
                            "Hash",
                            format!("{} keys have no JSON form", k.class_name()),
                        ))
                    }
                    other => to_s(other)?,
                };
                map.insert(key, to_json(v)?);
            }
            serde_json::Value::Object(map)
        }
        Value::Object(obj) => to_json(&obj.data)?,
        other => serde_json::Value::String(to_s(other)?),
    };
    Ok(json)
}

/// 把 JSON 文档转换为值
pub(crate) fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::integer(u.into())
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::string(s),
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::Hash(
            map.into_iter()
                .map(|(k, v)| (Value::string(k), from_json(v)))
                .collect(),
        ),
    }
}
