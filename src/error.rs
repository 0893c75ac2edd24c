//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了编解码系统的错误类型和处理机制。

use thiserror::Error;

/// 编解码错误类型枚举
///
/// 定义了缓存条目序列化、格式探测和扩展类型注册中可能发生的各种错误
#[derive(Error, Debug)]
pub enum CoderError {
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 反序列化错误（数据格式不合法）
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// 数据被截断
    #[error("Truncated payload: needed {needed} bytes at offset {offset}, got {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// 值无法被当前格式序列化
    #[error("Cannot serialize {class}: {reason}")]
    Unserializable { class: String, reason: String },

    /// 压缩失败
    #[error("Compression error: {0}")]
    Compression(#[source] std::io::Error),

    /// 解压缩失败
    #[error("Decompression error: {0}")]
    Decompression(#[source] std::io::Error),

    /// Marshal 回退加载已禁用
    #[error("Marshal load fallback is disabled; refusing to load a Marshal payload")]
    MarshalFallbackDisabled,

    /// 无法识别的数据
    #[error("Invalid dump: {0}")]
    InvalidDump(String),

    /// 未知的格式名称
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// 扩展类型ID重复注册
    #[error("Type ID {0} has already been registered")]
    DuplicateTypeId(i8),

    /// 扩展类型类名重复注册
    #[error("Type class {0} has already been registered")]
    DuplicateTypeClass(String),

    /// 扩展类型ID已保留
    #[error("Type ID {0} is reserved and cannot be registered")]
    ReservedTypeId(i8),

    /// 读取时遇到未注册的扩展类型
    #[error("Unknown MessagePack extension type {0}")]
    UnknownExtension(i8),

    /// 嵌套层级超过上限
    #[error("Nesting depth exceeds limit of {0}")]
    DepthLimitExceeded(usize),

    /// 解码产生的节点总数超过上限
    #[error("Decoded value exceeds limit of {0} nodes")]
    NodeLimitExceeded(usize),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 输入参数不合法
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoderError {
    /// 构造一个不可序列化错误
    pub fn unserializable(class: impl Into<String>, reason: impl Into<String>) -> Self {
        CoderError::Unserializable {
            class: class.into(),
            reason: reason.into(),
        }
    }

    /// 该错误是否表示数据引用了本进程未知的类型
    ///
    /// 缓存层把这类错误视为未命中而不是故障
    pub fn is_missing_type(&self) -> bool {
        matches!(self, CoderError::UnknownExtension(_))
    }
}

/// 编解码操作结果类型别名
///
/// 简化错误处理，所有编解码操作都返回此类型
pub type Result<T> = std::result::Result<T, CoderError>;
