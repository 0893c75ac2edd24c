//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 带格式探测的条目序列化分派器。
//!
//! 写出时使用配置指定的格式；读取时按优先级列表逐个检查签名，
//! 无法识别的数据记录一次警告并按未命中处理。

use super::{
    try_load_bare_string, CacheFormat, Codec, Compressor, Entry, FramedCoder, JsonCodec,
    LoadedEntry, Marshal61Codec, Marshal7Codec, MessagePackCodec, Payload, ZlibCompressor,
    DEFAULT_FALLBACK_ORDER, ZLIB_HEADER,
};
use crate::config::{CacheConfig, MessagePackConfig};
use crate::error::{CoderError, Result};
use crate::metrics::GLOBAL_METRICS;
use crate::serialization::{FallbackSerializer, MessageFormat, MessagePackSerializer, ValueFormat};
use crate::utils::hex_prefix;
use crate::value::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// 无法识别的数据在指标中使用的格式名
const UNKNOWN_FORMAT: &str = "unknown";

/// 各格式的编解码器实例
#[derive(Clone, Debug)]
struct Codecs {
    marshal_6_1: Marshal61Codec,
    marshal_7_0: Marshal7Codec,
    marshal_7_1: Marshal7Codec,
    message_pack: MessagePackCodec,
    coder: FramedCoder,
    json: JsonCodec,
}

impl Codecs {
    fn get(&self, format: CacheFormat) -> &dyn Codec {
        match format {
            CacheFormat::Marshal61 => &self.marshal_6_1,
            CacheFormat::Marshal70 => &self.marshal_7_0,
            CacheFormat::Marshal71 => &self.marshal_7_1,
            CacheFormat::MessagePack => &self.message_pack,
            CacheFormat::Coder => &self.coder,
            CacheFormat::Json => &self.json,
        }
    }
}

/// 带回退的条目序列化器
///
/// 构造后不可变，可在线程间共享
#[derive(Clone, Debug)]
pub struct SerializerWithFallback {
    format: CacheFormat,
    fallback_order: Vec<CacheFormat>,
    allow_marshal: bool,
    codecs: Codecs,
    zlib: ZlibCompressor,
}

impl SerializerWithFallback {
    /// 使用默认读取优先级创建分派器
    pub fn new(format: CacheFormat) -> Self {
        Self::builder(format).assemble()
    }

    pub fn builder(format: CacheFormat) -> SerializerWithFallbackBuilder {
        SerializerWithFallbackBuilder::new(format)
    }

    /// 根据配置创建分派器
    pub fn from_config(cache: &CacheConfig, message_pack: &MessagePackConfig) -> Result<Self> {
        Self::builder(cache.format)
            .fallback_order(cache.fallback_order.clone())
            .allow_marshal(cache.allow_marshal)
            .coder_object_format(cache.coder_object_format)
            .message_pack(MessagePackSerializer::new().with_pool_size(message_pack.pool_size))
            .build()
    }

    pub fn format(&self) -> CacheFormat {
        self.format
    }

    pub fn fallback_order(&self) -> &[CacheFormat] {
        &self.fallback_order
    }

    pub fn allow_marshal(&self) -> bool {
        self.allow_marshal
    }

    /// 以写出格式编码条目
    pub fn dump(&self, entry: &Entry) -> Result<Vec<u8>> {
        let result = self.codecs.get(self.format).dump(entry);
        self.record_dump("dump", &result);
        result
    }

    /// 以写出格式编码条目，载荷达到阈值时尝试压缩
    pub fn dump_compressed(&self, entry: &Entry, threshold: usize) -> Result<Vec<u8>> {
        let result = self.codecs.get(self.format).dump_compressed(entry, threshold);
        self.record_dump("dump_compressed", &result);
        result
    }

    fn record_dump(&self, op: &str, result: &Result<Vec<u8>>) {
        match result {
            Ok(dumped) => {
                GLOBAL_METRICS.record_operation(self.format.name(), op, "ok");
                GLOBAL_METRICS.record_bytes(self.format.name(), op, dumped.len());
            }
            Err(_) => GLOBAL_METRICS.record_operation(self.format.name(), op, "error"),
        }
    }

    /// 完整加载：元数据加值
    ///
    /// 无法识别的数据返回 `Ok(None)`；解压失败或数据截断等错误原样返回
    pub fn load(&self, dumped: &[u8]) -> Result<Option<Entry>> {
        match self.load_metadata(dumped)? {
            Some(loaded) => match self.resolve(loaded.payload) {
                Ok(value) => Ok(Some(Entry::from_parts(
                    value,
                    loaded.version,
                    loaded.expires_at,
                ))),
                Err(e) if e.is_missing_type() => {
                    debug!(error = %e, "Deferred payload references an unknown type");
                    Ok(None)
                }
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    /// 加载的第一阶段：只解析版本号和过期时间
    ///
    /// `coder` 格式的载荷保持未解码状态，直到调用 `resolve`
    pub fn load_metadata(&self, dumped: &[u8]) -> Result<Option<LoadedEntry>> {
        if dumped.first() == Some(&ZLIB_HEADER) {
            let inflated = self.zlib.decompress(dumped)?;
            return self.load_detected(&inflated);
        }
        self.load_detected(dumped)
    }

    /// 加载的第二阶段：取得载荷的值
    pub fn resolve(&self, payload: Payload) -> Result<Value> {
        self.codecs.coder.resolve(payload)
    }

    /// 返回声明该数据的格式，不做解码
    pub fn detect(&self, dumped: &[u8]) -> Option<CacheFormat> {
        if dumped.first() == Some(&ZLIB_HEADER) {
            let inflated = self.zlib.decompress(dumped).ok()?;
            return self.claimed_by(&inflated);
        }
        self.claimed_by(dumped)
    }

    fn claimed_by(&self, dumped: &[u8]) -> Option<CacheFormat> {
        self.fallback_order
            .iter()
            .copied()
            .find(|format| self.codecs.get(*format).dumped(dumped))
    }

    fn load_detected(&self, dumped: &[u8]) -> Result<Option<LoadedEntry>> {
        if let Some(entry) = try_load_bare_string(dumped) {
            GLOBAL_METRICS.record_operation(self.format.name(), "load", "hit");
            return Ok(Some(entry.into()));
        }

        if let Some(format) = self.claimed_by(dumped) {
            debug!(format = %format, "Detected cache entry format");
            return self.load_with(format, dumped);
        }

        // 签名探测可能漏判，最后用优先级最低的格式再试一次
        if let Some(&last) = self.fallback_order.last() {
            match self.load_with(last, dumped) {
                Ok(Some(loaded)) => return Ok(Some(loaded)),
                Ok(None) => {}
                Err(e) => debug!(format = %last, error = %e, "Last resort load failed"),
            }
        }

        warn!(
            "Unrecognized payload prefix {}; deserializing as nil",
            hex_prefix(dumped, 8)
        );
        GLOBAL_METRICS.record_operation(UNKNOWN_FORMAT, "load", "unrecognized");
        Ok(None)
    }

    fn load_with(&self, format: CacheFormat, dumped: &[u8]) -> Result<Option<LoadedEntry>> {
        if format.is_marshal() && !self.allow_marshal && !self.format.is_marshal() {
            GLOBAL_METRICS.record_operation(format.name(), "load", "error");
            return Err(CoderError::MarshalFallbackDisabled);
        }
        if format != self.format && !format.loads(self.format) {
            debug!(written = %format, configured = %self.format, "Loading entry written in another format");
        }
        match self.codecs.get(format).load(dumped) {
            Ok(loaded) => {
                GLOBAL_METRICS.record_operation(format.name(), "load", "hit");
                Ok(Some(loaded))
            }
            Err(e) if e.is_missing_type() => {
                debug!(format = %format, error = %e, "Entry references an unknown type");
                GLOBAL_METRICS.record_operation(format.name(), "load", "miss");
                Ok(None)
            }
            Err(e) => {
                GLOBAL_METRICS.record_operation(format.name(), "load", "error");
                Err(e)
            }
        }
    }
}

impl Default for SerializerWithFallback {
    fn default() -> Self {
        Self::new(CacheFormat::MessagePack)
    }
}

/// 分派器构建器
pub struct SerializerWithFallbackBuilder {
    format: CacheFormat,
    fallback_order: Vec<CacheFormat>,
    allow_marshal: bool,
    compressor: Arc<dyn Compressor>,
    coder_object_format: ValueFormat,
    message_pack: MessagePackSerializer,
}

impl SerializerWithFallbackBuilder {
    pub fn new(format: CacheFormat) -> Self {
        Self {
            format,
            fallback_order: DEFAULT_FALLBACK_ORDER.to_vec(),
            allow_marshal: true,
            compressor: Arc::new(ZlibCompressor::new()),
            coder_object_format: ValueFormat::MessagePack,
            message_pack: MessagePackSerializer::new(),
        }
    }

    /// 读取时的格式探测优先级
    pub fn fallback_order(mut self, order: Vec<CacheFormat>) -> Self {
        self.fallback_order = order;
        self
    }

    pub fn allow_marshal(mut self, allow: bool) -> Self {
        self.allow_marshal = allow;
        self
    }

    /// `coder` 格式使用的压缩器
    pub fn compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    /// `coder` 格式中对象载荷的序列化格式
    pub fn coder_object_format(mut self, format: ValueFormat) -> Self {
        self.coder_object_format = format;
        self
    }

    /// 使用指定的 MessagePack 序列化器（自定义扩展类型或池大小）
    pub fn message_pack(mut self, serializer: MessagePackSerializer) -> Self {
        self.message_pack = serializer;
        self
    }

    /// 验证设置并构建分派器
    pub fn build(self) -> Result<SerializerWithFallback> {
        let config = CacheConfig {
            format: self.format,
            fallback_order: self.fallback_order.clone(),
            allow_marshal: self.allow_marshal,
            coder_object_format: self.coder_object_format,
            ..Default::default()
        };
        config.validate().map_err(CoderError::ConfigError)?;
        Ok(self.assemble())
    }

    fn assemble(self) -> SerializerWithFallback {
        let objects = FallbackSerializer::with_message_pack(
            MessageFormat::for_value_format(self.coder_object_format, self.allow_marshal),
            self.message_pack.clone(),
        );
        SerializerWithFallback {
            format: self.format,
            fallback_order: self.fallback_order,
            allow_marshal: self.allow_marshal,
            codecs: Codecs {
                marshal_6_1: Marshal61Codec::new(),
                marshal_7_0: Marshal7Codec::v7_0(),
                marshal_7_1: Marshal7Codec::v7_1(),
                message_pack: MessagePackCodec::with_serializer(self.message_pack),
                coder: FramedCoder::new(self.compressor, objects),
                json: JsonCodec::new(),
            },
            zlib: ZlibCompressor::new(),
        }
    }
}
