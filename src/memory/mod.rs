//! Fixed-capacity allocators backing short-lived execution objects.

mod manager;
mod pool;
mod stack;

pub use manager::{
    MemoryManager, MemoryStats, PooledBuffer, TempAllocatorGuard, LARGE_CLASS, MEDIUM_CLASS,
    SMALL_CLASS,
};
pub use pool::MemoryPool;
pub use stack::{StackAllocator, MAX_ALIGN};
