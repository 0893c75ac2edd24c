//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 打包缓冲区池。

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

/// 默认池大小
pub const DEFAULT_POOL_SIZE: usize = 5;

/// 归还时超过该容量的缓冲区直接丢弃
const MAX_RETAINED_CAPACITY: usize = 1 << 20;

/// 可复用缓冲区池
///
/// 每次序列化借出一个缓冲区，用完清空后归还；池满时多余的缓冲区被丢弃
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// 借出一个空缓冲区
    pub fn checkout(&self) -> PooledBuffer<'_> {
        let buf = self
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    /// 当前空闲的缓冲区数量
    pub fn idle(&self) -> usize {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn checkin(&self, mut buf: Vec<u8>) {
        if buf.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buf.clear();
        let mut buffers = self
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if buffers.len() < self.capacity {
            buffers.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

/// 借出的缓冲区，离开作用域时自动归还
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<u8>>,
}

impl PooledBuffer<'_> {
    /// 取走缓冲区的所有权，之后需通过 [`PooledBuffer::restore`] 放回
    pub fn take(&mut self) -> Vec<u8> {
        self.buf.take().unwrap_or_default()
    }

    pub fn restore(&mut self, buf: Vec<u8>) {
        self.buf = Some(buf);
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        const EMPTY: &Vec<u8> = &Vec::new();
        self.buf.as_ref().unwrap_or(EMPTY)
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.get_or_insert_with(Vec::new)
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.checkin(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_are_reused_and_cleared() {
        let pool = BufferPool::new(2);
        {
            let mut buf = pool.checkout();
            buf.extend_from_slice(b"abc");
        }
        assert_eq!(pool.idle(), 1);
        let buf = pool.checkout();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 3);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pool_does_not_grow_past_capacity() {
        let pool = BufferPool::new(1);
        let a = pool.checkout();
        let b = pool.checkout();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_take_and_restore() {
        let pool = BufferPool::new(1);
        let mut pooled = pool.checkout();
        let mut buf = pooled.take();
        buf.push(1);
        pooled.restore(buf);
        assert_eq!(pooled.as_slice(), &[1]);
        drop(pooled);
        assert_eq!(pool.idle(), 1);
    }
}
