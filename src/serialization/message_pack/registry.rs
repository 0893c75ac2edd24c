//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了 MessagePack 扩展类型注册表。
//!
//! 类型 ID 一经发布即写入了缓存数据，因此内置类型的 ID 固定不变。

use super::extensions;
use super::packer::{Packer, Unpacker};
use crate::error::{CoderError, Result};
use crate::value::Value;
use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// 非 UTF-8、非二进制字符串的分派键
pub const ENCODED_STRING_CLASS: &str = "EncodedString";

/// 调用方对象的兜底分派键
pub const OBJECT_CLASS: &str = "Object";

/// URI 的分派键
pub const URI_CLASS: &str = "URI::Generic";

/// 为不支持的类型保留的 ID，不可被重新注册
pub const RESERVED_TYPE_IDS: [i8; 3] = [6, 11, 12];

pub type RawPackFn = dyn Fn(&Value) -> Result<Vec<u8>> + Send + Sync;
pub type RawUnpackFn = dyn Fn(&[u8]) -> Result<Value> + Send + Sync;
pub type RecursivePackFn = dyn Fn(&Value, &mut Packer<'_>) -> Result<()> + Send + Sync;
pub type RecursiveUnpackFn = dyn Fn(&mut Unpacker<'_, '_>) -> Result<Value> + Send + Sync;

/// 扩展类型的编解码函数
#[derive(Clone)]
pub enum ExtensionCodec {
    /// 载荷为不透明字节
    Raw {
        pack: Arc<RawPackFn>,
        unpack: Arc<RawUnpackFn>,
    },
    /// 载荷本身由嵌套的打包器写出，可以包含任意值
    Recursive {
        pack: Arc<RecursivePackFn>,
        unpack: Arc<RecursiveUnpackFn>,
    },
}

impl ExtensionCodec {
    pub fn raw<P, U>(pack: P, unpack: U) -> Self
    where
        P: Fn(&Value) -> Result<Vec<u8>> + Send + Sync + 'static,
        U: Fn(&[u8]) -> Result<Value> + Send + Sync + 'static,
    {
        ExtensionCodec::Raw {
            pack: Arc::new(pack),
            unpack: Arc::new(unpack),
        }
    }

    pub fn recursive<P, U>(pack: P, unpack: U) -> Self
    where
        P: Fn(&Value, &mut Packer<'_>) -> Result<()> + Send + Sync + 'static,
        U: Fn(&mut Unpacker<'_, '_>) -> Result<Value> + Send + Sync + 'static,
    {
        ExtensionCodec::Recursive {
            pack: Arc::new(pack),
            unpack: Arc::new(unpack),
        }
    }

    pub fn is_recursive(&self) -> bool {
        matches!(self, ExtensionCodec::Recursive { .. })
    }
}

/// 已注册的扩展类型
#[derive(Clone)]
pub struct Extension {
    id: i8,
    class: String,
    codec: ExtensionCodec,
}

impl Extension {
    pub fn id(&self) -> i8 {
        self.id
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn codec(&self) -> &ExtensionCodec {
        &self.codec
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("recursive", &self.codec.is_recursive())
            .finish()
    }
}

/// 扩展类型注册表
///
/// 构建完成后只读，可在线程间共享
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    by_id: BTreeMap<i8, Extension>,
    by_class: HashMap<String, i8>,
}

lazy_static! {
    static ref BUILTIN_REGISTRY: Arc<ExtensionRegistry> = Arc::new(ExtensionRegistry::builtin());
}

impl ExtensionRegistry {
    pub fn builder() -> ExtensionRegistryBuilder {
        ExtensionRegistryBuilder::new()
    }

    /// 只包含内置类型的注册表
    pub fn builtin() -> Self {
        ExtensionRegistryBuilder::with_builtin_types().build()
    }

    /// 进程内共享的内置注册表
    pub fn shared() -> Arc<Self> {
        Arc::clone(&BUILTIN_REGISTRY)
    }

    pub fn get(&self, id: i8) -> Option<&Extension> {
        self.by_id.get(&id)
    }

    pub fn find_by_class(&self, class: &str) -> Option<&Extension> {
        self.by_class.get(class).and_then(|id| self.by_id.get(id))
    }

    pub fn is_registered(&self, id: i8) -> bool {
        self.by_id.contains_key(&id)
    }

    /// 按 ID 升序列出 (ID, 类名)
    pub fn registered_types(&self) -> impl Iterator<Item = (i8, &str)> + '_ {
        self.by_id.values().map(|ext| (ext.id, ext.class.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.registered_types()).finish()
    }
}

/// 扩展类型注册表构建器
#[derive(Debug, Default)]
pub struct ExtensionRegistryBuilder {
    registry: ExtensionRegistry,
}

impl ExtensionRegistryBuilder {
    /// 创建空的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建已包含全部内置类型的构建器
    pub fn with_builtin_types() -> Self {
        let mut builder = Self::new();
        extensions::install(&mut builder);
        builder
    }

    /// 注册扩展类型
    ///
    /// ID 已被占用、属于保留 ID 或为负数（MessagePack 自身保留）时立即报错
    pub fn register(
        &mut self,
        id: i8,
        class: impl Into<String>,
        codec: ExtensionCodec,
    ) -> Result<&mut Self> {
        let class = class.into();
        if id < 0 || RESERVED_TYPE_IDS.contains(&id) {
            return Err(CoderError::ReservedTypeId(id));
        }
        if self.registry.by_id.contains_key(&id) {
            return Err(CoderError::DuplicateTypeId(id));
        }
        if self.registry.by_class.contains_key(&class) {
            return Err(CoderError::DuplicateTypeClass(class));
        }
        self.insert(id, class, codec);
        Ok(self)
    }

    /// 注册载荷为不透明字节的扩展类型
    pub fn register_raw<P, U>(
        &mut self,
        id: i8,
        class: impl Into<String>,
        pack: P,
        unpack: U,
    ) -> Result<&mut Self>
    where
        P: Fn(&Value) -> Result<Vec<u8>> + Send + Sync + 'static,
        U: Fn(&[u8]) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(id, class, ExtensionCodec::raw(pack, unpack))
    }

    /// 注册载荷可包含任意值的扩展类型
    pub fn register_recursive<P, U>(
        &mut self,
        id: i8,
        class: impl Into<String>,
        pack: P,
        unpack: U,
    ) -> Result<&mut Self>
    where
        P: Fn(&Value, &mut Packer<'_>) -> Result<()> + Send + Sync + 'static,
        U: Fn(&mut Unpacker<'_, '_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(id, class, ExtensionCodec::recursive(pack, unpack))
    }

    pub(crate) fn insert(&mut self, id: i8, class: impl Into<String>, codec: ExtensionCodec) {
        let class = class.into();
        self.registry.by_class.insert(class.clone(), id);
        self.registry.by_id.insert(id, Extension { id, class, codec });
    }

    pub fn build(self) -> ExtensionRegistry {
        self.registry
    }
}
