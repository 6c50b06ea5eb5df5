use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Granularity every request size is rounded up to.
pub const MAX_ALIGN: usize = 16;

#[repr(C, align(16))]
struct Arena<const N: usize>([MaybeUninit<u8>; N]);

pub(crate) const fn align_up(value: usize, alignment: usize) -> Option<usize> {
    match value.checked_add(alignment - 1) {
        Some(bumped) => Some(bumped & !(alignment - 1)),
        None => None,
    }
}

/// Bump-pointer arena over a fixed `N`-byte buffer.
///
/// Allocations are released together by [`reset`](Self::reset). The arena
/// never runs destructors.
pub struct StackAllocator<const N: usize> {
    arena: Box<UnsafeCell<Arena<N>>>,
    top: AtomicUsize,
}

// Every successful allocation claims a disjoint range through the CAS on `top`.
unsafe impl<const N: usize> Send for StackAllocator<N> {}
unsafe impl<const N: usize> Sync for StackAllocator<N> {}

impl<const N: usize> StackAllocator<N> {
    pub const STACK_SIZE: usize = N;

    pub fn new() -> Self {
        Self {
            arena: Box::new(UnsafeCell::new(Arena([MaybeUninit::uninit(); N]))),
            top: AtomicUsize::new(0),
        }
    }

    fn base(&self) -> *mut u8 {
        self.arena.get().cast::<u8>()
    }

    /// Returns `None` when the aligned request does not fit or `alignment` is
    /// not a power of two.
    pub fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if !alignment.is_power_of_two() {
            return None;
        }

        let size = align_up(size.max(1), MAX_ALIGN)?;
        let base = self.base() as usize;
        let mut current = self.top.load(Ordering::Relaxed);

        loop {
            let aligned = align_up(base.checked_add(current)?, alignment)? - base;
            let new_top = aligned.checked_add(size)?;
            if new_top > N {
                return None;
            }

            match self
                .top
                .compare_exchange_weak(current, new_top, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return NonNull::new(self.base().wrapping_add(aligned)),
                Err(observed) => current = observed,
            }
        }
    }

    /// Rewinds the arena to `ptr`, releasing it and everything allocated
    /// after it.
    ///
    /// Only correct under strict LIFO discipline: `ptr` must be the most
    /// recent live allocation (or older, releasing the newer ones with it).
    /// Pointers outside the arena or past the current top are ignored.
    pub fn rewind_to(&self, ptr: NonNull<u8>) {
        let base = self.base() as usize;
        let addr = ptr.as_ptr() as usize;
        if addr < base || addr >= base + N {
            return;
        }

        let offset = addr - base;
        // fetch_update only fails when the closure declines, i.e. the pointer
        // is not behind the current top.
        let _ = self.top.fetch_update(Ordering::AcqRel, Ordering::Acquire, |top| {
            (offset < top).then_some(offset)
        });
    }

    pub fn reset(&self) {
        self.top.store(0, Ordering::Release);
    }

    pub fn used(&self) -> usize {
        self.top.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        N - self.used()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for StackAllocator<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> std::fmt::Debug for StackAllocator<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackAllocator")
            .field("capacity", &N)
            .field("used", &self.used())
            .finish()
    }
}
