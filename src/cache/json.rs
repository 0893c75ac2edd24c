//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! JSON 条目格式。
//!
//! 条目写为 `[value, expires_at, version]` 数组。非 UTF-8 的版本号写为
//! `{"encoding": 名称, "bytes": [字节...]}` 以保证逐字节还原。

use super::{compress_whole, inflate_whole, CacheFormat, Codec, Entry, LoadedEntry, ZlibCompressor};
use crate::error::{CoderError, Result};
use crate::serialization::json::{from_json, signature, to_json};
use crate::value::{Encoding, RString, Value};
use serde_json::json;

const ESCAPE_ENCODING: &str = "encoding";
const ESCAPE_BYTES: &str = "bytes";

/// JSON 条目编解码器
#[derive(Clone, Debug, Default)]
pub struct JsonCodec {
    zlib: ZlibCompressor,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

fn dump_version(version: &RString) -> serde_json::Value {
    match (version.encoding(), version.as_str()) {
        (Encoding::Utf8, Some(text)) => serde_json::Value::String(text.to_string()),
        (encoding, _) => json!({
            "encoding": encoding.name(),
            "bytes": version.bytes(),
        }),
    }
}

fn load_version(json: serde_json::Value) -> Result<Option<RString>> {
    let malformed = || CoderError::Deserialization("malformed JSON entry version".to_string());
    match json {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(text) => Ok(Some(RString::utf8(text))),
        serde_json::Value::Object(map) => {
            let encoding = map
                .get(ESCAPE_ENCODING)
                .and_then(|v| v.as_str())
                .ok_or_else(malformed)?;
            let bytes = map
                .get(ESCAPE_BYTES)
                .and_then(|v| v.as_array())
                .ok_or_else(malformed)?
                .iter()
                .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(malformed)?;
            Ok(Some(RString::new(bytes, Encoding::from_name(encoding))))
        }
        _ => Err(malformed()),
    }
}

impl Codec for JsonCodec {
    fn format(&self) -> CacheFormat {
        CacheFormat::Json
    }

    fn dump(&self, entry: &Entry) -> Result<Vec<u8>> {
        let mut members = vec![
            to_json(entry.value())?,
            entry.expires_at().map(|at| json!(at)).unwrap_or(serde_json::Value::Null),
            entry.version().map(dump_version).unwrap_or(serde_json::Value::Null),
        ];
        while members.last().is_some_and(serde_json::Value::is_null) {
            members.pop();
        }
        serde_json::to_vec(&members).map_err(|e| CoderError::Serialization(e.to_string()))
    }

    fn dump_compressed(&self, entry: &Entry, threshold: usize) -> Result<Vec<u8>> {
        compress_whole(&self.zlib, self.dump(entry)?, threshold)
    }

    fn load(&self, dumped: &[u8]) -> Result<LoadedEntry> {
        let data = inflate_whole(&self.zlib, dumped)?;
        let json: serde_json::Value = serde_json::from_slice(&data)
            .map_err(|e| CoderError::Deserialization(e.to_string()))?;
        let serde_json::Value::Array(members) = json else {
            return Err(CoderError::Deserialization(
                "JSON entry is not an array".to_string(),
            ));
        };
        if members.len() > 3 {
            return Err(CoderError::Deserialization(format!(
                "JSON entry has {} members, expected at most 3",
                members.len()
            )));
        }
        let mut members = members.into_iter();
        let value = members.next().map(from_json).unwrap_or(Value::Nil);
        let expires_at = match members.next() {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(other) => {
                return Err(CoderError::Deserialization(format!(
                    "JSON entry expiry must be numeric, got {}",
                    other
                )))
            }
        };
        let version = match members.next() {
            Some(v) => load_version(v)?,
            None => None,
        };
        Ok(Entry::from_parts(value, version, expires_at).into())
    }

    fn dumped(&self, dumped: &[u8]) -> bool {
        signature(dumped)
    }
}
