use parking_lot::{Mutex, MutexGuard, RwLock};
use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::pool::MemoryPool;
use super::stack::{StackAllocator, MAX_ALIGN};

pub const SMALL_CLASS: usize = 64;
pub const MEDIUM_CLASS: usize = 512;
pub const LARGE_CLASS: usize = 4096;

const SMALL_SLOTS: usize = 4096;
const MEDIUM_SLOTS: usize = 2048;
const LARGE_SLOTS: usize = 1024;
const TEMP_ARENA_SIZE: usize = 16384;

#[repr(C, align(16))]
struct Block<const S: usize>([u8; S]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeClass {
    Small,
    Medium,
    Large,
    Oversized,
}

impl SizeClass {
    fn for_size(size: usize) -> Self {
        match size {
            0..=SMALL_CLASS => SizeClass::Small,
            0..=MEDIUM_CLASS => SizeClass::Medium,
            0..=LARGE_CLASS => SizeClass::Large,
            _ => SizeClass::Oversized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryStats {
    pub total_allocated: usize,
    pub total_deallocated: usize,
    pub current_usage: usize,
    pub peak_usage: usize,
    pub pool_utilization_small: f64,
    pub pool_utilization_medium: f64,
    pub pool_utilization_large: f64,
    pub stack_usage: usize,
    pub fallback_allocations: usize,
}

/// Size-classed allocation front end.
///
/// Requests up to 64, 512 and 4096 bytes are served from fixed pools; larger
/// requests, and requests whose class is exhausted, go to the global heap.
/// One instance is built per shell and shared through an `Arc`.
pub struct MemoryManager {
    small: MemoryPool<Block<SMALL_CLASS>, SMALL_SLOTS>,
    medium: MemoryPool<Block<MEDIUM_CLASS>, MEDIUM_SLOTS>,
    large: MemoryPool<Block<LARGE_CLASS>, LARGE_SLOTS>,
    stack: StackAllocator<TEMP_ARENA_SIZE>,
    // Held by every open temp scope and by `reset_temp`.
    temp_lock: Mutex<()>,

    total_allocated: AtomicUsize,
    total_deallocated: AtomicUsize,
    peak_usage: AtomicUsize,
    fallback_allocations: AtomicUsize,

    // Separate from the pool locks so statistics never contend with them.
    histogram: RwLock<HashMap<usize, usize>>,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self {
            small: MemoryPool::new(),
            medium: MemoryPool::new(),
            large: MemoryPool::new(),
            stack: StackAllocator::new(),
            temp_lock: Mutex::new(()),
            total_allocated: AtomicUsize::new(0),
            total_deallocated: AtomicUsize::new(0),
            peak_usage: AtomicUsize::new(0),
            fallback_allocations: AtomicUsize::new(0),
            histogram: RwLock::new(HashMap::new()),
        }
    }

    /// Allocates `size` bytes of uninitialized memory.
    ///
    /// Alignments above 16 bytes are not supported and return `None`, as do
    /// zero-sized requests.
    pub fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if size == 0 || !alignment.is_power_of_two() || alignment > MAX_ALIGN {
            return None;
        }

        let pooled = match SizeClass::for_size(size) {
            SizeClass::Small => self.small.allocate().map(NonNull::cast),
            SizeClass::Medium => self.medium.allocate().map(NonNull::cast),
            SizeClass::Large => self.large.allocate().map(NonNull::cast),
            SizeClass::Oversized => None,
        };

        let ptr = match pooled {
            Some(ptr) => ptr,
            None => {
                if SizeClass::for_size(size) != SizeClass::Oversized {
                    debug!(size, "size class exhausted, falling back to heap");
                }
                self.fallback_allocate(size)?
            }
        };

        self.record(size, true);
        Some(ptr)
    }

    /// Returns memory obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this manager with the
    /// same `size`, and must not be used afterwards. The size is not recovered
    /// from the pointer.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        let returned = match SizeClass::for_size(size) {
            SizeClass::Small => Self::return_to(&self.small, ptr),
            SizeClass::Medium => Self::return_to(&self.medium, ptr),
            SizeClass::Large => Self::return_to(&self.large, ptr),
            SizeClass::Oversized => false,
        };

        if !returned {
            if let Ok(layout) = Layout::from_size_align(size, MAX_ALIGN) {
                alloc::dealloc(ptr.as_ptr(), layout);
            }
        }

        self.record(size, false);
    }

    fn return_to<T, const N: usize>(pool: &MemoryPool<T, N>, ptr: NonNull<u8>) -> bool {
        let ptr = ptr.cast::<T>();
        if pool.contains(ptr) {
            pool.deallocate(ptr);
            true
        } else {
            false
        }
    }

    fn fallback_allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(size, MAX_ALIGN).ok()?;
        // SAFETY: layout has a non-zero size, checked in `allocate`.
        let ptr = NonNull::new(unsafe { alloc::alloc(layout) })?;
        self.fallback_allocations.fetch_add(1, Ordering::Relaxed);
        Some(ptr)
    }

    fn record(&self, size: usize, allocating: bool) {
        if allocating {
            let allocated = self.total_allocated.fetch_add(size, Ordering::Relaxed) + size;
            let current = allocated.saturating_sub(self.total_deallocated.load(Ordering::Relaxed));
            self.peak_usage.fetch_max(current, Ordering::Relaxed);

            *self.histogram.write().entry(size).or_insert(0) += 1;
        } else {
            self.total_deallocated.fetch_add(size, Ordering::Relaxed);
        }
    }

    pub fn allocate_temp(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        self.stack.allocate(size, alignment)
    }

    /// Waits for any open temp scope to close, then releases the arena.
    pub fn reset_temp(&self) {
        let _held = self.temp_lock.lock();
        self.stack.reset();
    }

    /// Scratch scope over the temp arena; the arena is reset when it drops.
    ///
    /// Only one scope is open at a time. A second call blocks until the
    /// first guard is dropped, so opening two on one thread deadlocks.
    pub fn temp_scope(&self) -> TempAllocatorGuard<'_> {
        TempAllocatorGuard {
            manager: self,
            _exclusive: self.temp_lock.lock(),
        }
    }

    /// Leases a zeroed block of `size` bytes that returns itself on drop.
    pub fn lease(self: &Arc<Self>, size: usize) -> Option<PooledBuffer> {
        let ptr = self.allocate(size, MAX_ALIGN)?;
        // SAFETY: `ptr` is valid for `size` bytes and exclusively ours.
        unsafe { ptr.as_ptr().write_bytes(0, size) };

        Some(PooledBuffer {
            manager: Arc::clone(self),
            ptr,
            len: size,
        })
    }

    pub fn stats(&self) -> MemoryStats {
        let total_allocated = self.total_allocated.load(Ordering::Relaxed);
        let total_deallocated = self.total_deallocated.load(Ordering::Relaxed);

        MemoryStats {
            total_allocated,
            total_deallocated,
            current_usage: total_allocated.saturating_sub(total_deallocated),
            peak_usage: self.peak_usage.load(Ordering::Relaxed),
            pool_utilization_small: self.small.utilization(),
            pool_utilization_medium: self.medium.utilization(),
            pool_utilization_large: self.large.utilization(),
            stack_usage: self.stack.used(),
            fallback_allocations: self.fallback_allocations.load(Ordering::Relaxed),
        }
    }

    /// Requested sizes and how often each was seen, smallest first.
    pub fn allocation_histogram(&self) -> Vec<(usize, usize)> {
        let mut entries: Vec<_> = self
            .histogram
            .read()
            .iter()
            .map(|(&size, &count)| (size, count))
            .collect();
        entries.sort_unstable();
        entries
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Scoped access to the manager's temp arena.
///
/// Values placed with [`construct`](Self::construct) are never dropped; the
/// whole arena is reset when the guard goes away.
pub struct TempAllocatorGuard<'a> {
    manager: &'a MemoryManager,
    _exclusive: MutexGuard<'a, ()>,
}

impl<'a> TempAllocatorGuard<'a> {
    pub fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        self.manager.allocate_temp(size, alignment)
    }

    #[allow(clippy::mut_from_ref)]
    pub fn construct<T>(&self, value: T) -> Option<&mut T> {
        let ptr = self
            .allocate(std::mem::size_of::<T>(), std::mem::align_of::<T>())?
            .cast::<T>();
        // SAFETY: the range is fresh and aligned for T. The guard holds
        // `temp_lock`, so the arena is only reset by this guard's own drop,
        // which ends the borrow first.
        unsafe {
            ptr.as_ptr().write(value);
            Some(&mut *ptr.as_ptr())
        }
    }

    pub fn copy_str(&self, value: &str) -> Option<&str> {
        let ptr = self.allocate(value.len(), 1)?;
        // SAFETY: as in `construct`; the bytes come from a valid str.
        unsafe {
            std::ptr::copy_nonoverlapping(value.as_ptr(), ptr.as_ptr(), value.len());
            let bytes = std::slice::from_raw_parts(ptr.as_ptr(), value.len());
            Some(std::str::from_utf8_unchecked(bytes))
        }
    }
}

impl Drop for TempAllocatorGuard<'_> {
    fn drop(&mut self) {
        // `_exclusive` is still held here; it is released after this body.
        self.manager.stack.reset();
    }
}

/// A zeroed byte block leased from a [`MemoryManager`].
pub struct PooledBuffer {
    manager: Arc<MemoryManager>,
    ptr: NonNull<u8>,
    len: usize,
}

// The block is owned exclusively by this buffer.
unsafe impl Send for PooledBuffer {}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: initialized in `lease`, valid for `len` bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` are exactly what `lease` allocated.
        unsafe { self.manager.deallocate(self.ptr, self.len) };
    }
}
