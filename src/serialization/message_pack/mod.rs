//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了 MessagePack 序列化器及其扩展类型注册表。
//!
//! 输出以整数 128（字节 `CC 80`）开头作为签名。

pub mod extensions;
pub mod packer;
pub mod pool;
pub mod registry;

use super::Serializer;
use crate::error::{CoderError, Result};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

pub use packer::{Packer, Unpacker};
pub use pool::{BufferPool, PooledBuffer, DEFAULT_POOL_SIZE};
pub use registry::{Extension, ExtensionCodec, ExtensionRegistry, ExtensionRegistryBuilder};

/// MessagePack 签名，即整数 128 的编码
pub const SIGNATURE: [u8; 2] = [0xCC, 0x80];

/// 字节数组是否以 MessagePack 签名开头
pub fn signature(data: &[u8]) -> bool {
    data.starts_with(&SIGNATURE)
}

/// MessagePack 序列化器
#[derive(Clone)]
pub struct MessagePackSerializer {
    registry: Arc<ExtensionRegistry>,
    pool: Arc<BufferPool>,
}

impl MessagePackSerializer {
    /// 使用共享的内置注册表
    pub fn new() -> Self {
        Self::with_registry(ExtensionRegistry::shared())
    }

    /// 使用自定义注册表
    pub fn with_registry(registry: Arc<ExtensionRegistry>) -> Self {
        Self {
            registry,
            pool: Arc::new(BufferPool::default()),
        }
    }

    /// 设置缓冲区池大小
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool = Arc::new(BufferPool::new(size));
        self
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }
}

impl Default for MessagePackSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MessagePackSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePackSerializer")
            .field("registry", &self.registry)
            .field("pool_size", &self.pool.capacity())
            .finish()
    }
}

impl Serializer for MessagePackSerializer {
    fn dump(&self, value: &Value) -> Result<Vec<u8>> {
        let mut pooled = self.pool.checkout();
        let mut packer = Packer::with_buffer(&self.registry, pooled.take());
        let result = packer
            .write(&Value::Int(128))
            .and_then(|_| packer.write(value));
        let buf = packer.into_inner();
        let dumped = result.map(|_| buf.clone());
        pooled.restore(buf);
        dumped
    }

    fn load(&self, data: &[u8]) -> Result<Value> {
        if !signature(data) {
            return Err(CoderError::Deserialization(
                "missing MessagePack signature".to_string(),
            ));
        }
        let mut unpacker = Unpacker::new(&self.registry, &data[SIGNATURE.len()..]);
        let value = unpacker.read()?;
        if unpacker.remaining() > 0 {
            return Err(CoderError::Deserialization(format!(
                "{} trailing bytes after MessagePack value",
                unpacker.remaining()
            )));
        }
        Ok(value)
    }

    fn dumped(&self, data: &[u8]) -> bool {
        signature(data)
    }
}
