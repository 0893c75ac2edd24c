//! oxcoder - 缓存条目编解码库
//!
//! 把 (值, 版本, 过期时间) 条目编码为带签名的字节数组，支持多种格式、
//! 可选压缩和读取时的格式自动探测。

#![doc(html_root_url = "https://docs.rs/oxcoder/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod serialization;
pub mod utils;
pub mod value;

// Re-export commonly used items
pub use cache::{
    CacheFormat, Codec, Entry, LoadedEntry, MemoryStore, Payload, SerializerWithFallback,
    StoreOptions,
};
pub use config::Config;
pub use error::{CoderError, Result};
pub use serialization::message_pack::{ExtensionRegistry, ExtensionRegistryBuilder};
pub use value::{Encoding, RString, Value};

/// oxcoder 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
