//! A pool of reusable gzip decoder states.
//!
//! Building a gzip decoder allocates the inflate window and an input buffer, which costs far
//! more than decoding a small response. [`ReaderPool`] keeps released states on a free list so
//! later bodies only pay for a reset.
//!
//! A pool is a cheap, cloneable handle and is safe to share between threads. Each state is
//! owned by exactly one [`DecodedStream`](crate::DecodedStream) between acquire and release.
//! Pass a pool explicitly where one is wanted, or use the process-wide instance returned by
//! [`ReaderPool::get_global_instance`].

use crate::decoder::{DEFAULT_BUFFER_SIZE, GzipState, MIN_BUFFER_SIZE};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;
use triomphe::Arc;

static GLOBAL_POOL: Lazy<ReaderPool> = Lazy::new(ReaderPool::new);

/// Settings for a [`ReaderPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    buffer_size: usize,
    max_idle: Option<usize>,
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// The input buffer size of every state the pool allocates.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// The maximum number of idle states kept, `None` when unbounded.
    pub fn max_idle(&self) -> Option<usize> {
        self.max_idle
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { buffer_size: DEFAULT_BUFFER_SIZE, max_idle: None }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    fn new() -> Self {
        Self { config: PoolConfig::default() }
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.buffer_size = buffer_size;
        self
    }

    /// Caps the number of idle states retained; states released into a full pool are dropped.
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.config.max_idle = Some(max_idle);
        self
    }

    pub fn build(self) -> PoolConfig {
        self.config
    }
}

/// A thread-safe free list of idle [`GzipState`]s.
#[derive(Clone)]
pub struct ReaderPool {
    inner: Arc<Inner>,
}

struct Inner {
    config: PoolConfig,
    idle: Mutex<Vec<GzipState>>,
}

impl ReaderPool {
    /// Creates an empty pool with the default configuration.
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self { inner: Arc::new(Inner { config, idle: Mutex::new(Vec::new()) }) }
    }

    /// Returns the process-wide pool, created on first use.
    pub fn get_global_instance() -> &'static ReaderPool {
        &GLOBAL_POOL
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Takes an idle state, or allocates one when the pool is empty.
    ///
    /// The state still holds whatever was left from its previous source and must be reset
    /// onto a new body before use.
    pub fn acquire(&self) -> GzipState {
        if let Some(state) = self.lock().pop() {
            trace!("reusing idle gzip decoder");
            return state;
        }

        trace!(buffer_size = self.inner.config.buffer_size, "allocating gzip decoder");
        GzipState::new(self.inner.config.buffer_size)
    }

    /// Resets `state` and returns it to the free list.
    pub fn release(&self, mut state: GzipState) {
        state.reset();

        let mut idle = self.lock();
        if self.inner.config.max_idle.is_some_and(|max| idle.len() >= max) {
            trace!(idle = idle.len(), "pool full, dropping gzip decoder");
            return;
        }
        if state.buffer_size() != self.inner.config.buffer_size.max(MIN_BUFFER_SIZE) {
            trace!(buffer_size = state.buffer_size(), "dropping gzip decoder of foreign size");
            return;
        }
        idle.push(state);
    }

    /// The number of idle states currently held.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    /// A panic while the lock is held can't leave the free list half-updated, so poisoning is
    /// ignored.
    fn lock(&self) -> MutexGuard<'_, Vec<GzipState>> {
        self.inner.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ReaderPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReaderPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderPool").field("config", &self.inner.config).field("idle", &self.idle()).finish()
    }
}
