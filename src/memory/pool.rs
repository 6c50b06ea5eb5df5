use parking_lot::RwLock;
use std::cell::UnsafeCell;
use std::mem::{self, MaybeUninit};
use std::ptr::NonNull;

const WORD_BITS: usize = u64::BITS as usize;

/// Bitmap of used slots plus the "next free" scan hint.
struct SlotMap {
    used: Box<[u64]>,
    next_free: usize,
    allocated: usize,
}

impl SlotMap {
    fn new(slots: usize) -> Self {
        Self {
            used: vec![0; slots.div_ceil(WORD_BITS)].into_boxed_slice(),
            next_free: 0,
            allocated: 0,
        }
    }

    fn is_used(&self, slot: usize) -> bool {
        self.used[slot / WORD_BITS] & (1 << (slot % WORD_BITS)) != 0
    }

    fn mark(&mut self, slot: usize, used: bool) {
        let bit = 1 << (slot % WORD_BITS);
        if used {
            self.used[slot / WORD_BITS] |= bit;
        } else {
            self.used[slot / WORD_BITS] &= !bit;
        }
    }

    /// Scans word by word from the hint, wrapping around once.
    fn find_free(&self, slots: usize) -> Option<usize> {
        let words = self.used.len();
        if words == 0 {
            return None;
        }

        let start_word = self.next_free / WORD_BITS;
        let start_bit = self.next_free % WORD_BITS;

        for step in 0..=words {
            let index = (start_word + step) % words;
            let mut free = !self.used[index];
            if step == 0 {
                free &= u64::MAX << start_bit;
            } else if step == words {
                free &= !(u64::MAX << start_bit);
            }

            if free != 0 {
                let slot = index * WORD_BITS + free.trailing_zeros() as usize;
                if slot < slots {
                    return Some(slot);
                }
            }
        }

        None
    }
}

/// Fixed-capacity slab of `N` storage slots for values of type `T`.
///
/// `allocate` hands out a pointer to an *uninitialized* slot and never grows;
/// once all `N` slots are in use it returns `None`. The pool never runs
/// destructors: whatever the caller writes into a slot must be dropped by the
/// caller before the slot is handed back.
///
/// A single reader/writer lock guards the bitmap, the scan hint and the
/// allocation count, so every statistic is a consistent snapshot.
pub struct MemoryPool<T, const N: usize> {
    storage: Box<[UnsafeCell<MaybeUninit<T>>]>,
    slots: RwLock<SlotMap>,
}

// Slots are handed out exclusively; the bitmap is only touched under the lock.
unsafe impl<T: Send, const N: usize> Send for MemoryPool<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for MemoryPool<T, N> {}

impl<T, const N: usize> MemoryPool<T, N> {
    const NON_ZERO_SIZED: () = assert!(mem::size_of::<T>() > 0, "pool slots must have a size");

    pub const POOL_SIZE: usize = N;
    pub const ELEMENT_SIZE: usize = mem::size_of::<T>();

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NON_ZERO_SIZED;

        let storage = (0..N)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            storage,
            slots: RwLock::new(SlotMap::new(N)),
        }
    }

    pub fn allocate(&self) -> Option<NonNull<T>> {
        let mut slots = self.slots.write();
        let slot = slots.find_free(N)?;

        slots.mark(slot, true);
        slots.allocated += 1;
        slots.next_free = (slot + 1) % N;

        NonNull::new(self.storage[slot].get().cast::<T>())
    }

    /// Returns a slot to the pool. Pointers outside the backing storage, not
    /// on a slot boundary, or already free are ignored.
    pub fn deallocate(&self, ptr: NonNull<T>) {
        let Some(slot) = self.slot_of(ptr) else {
            return;
        };

        let mut slots = self.slots.write();
        if !slots.is_used(slot) {
            return;
        }

        slots.mark(slot, false);
        slots.allocated -= 1;
        if slot < slots.next_free {
            slots.next_free = slot;
        }
    }

    pub fn contains(&self, ptr: NonNull<T>) -> bool {
        self.slot_of(ptr).is_some()
    }

    fn slot_of(&self, ptr: NonNull<T>) -> Option<usize> {
        let stride = mem::size_of::<UnsafeCell<MaybeUninit<T>>>();
        let begin = self.storage.as_ptr() as usize;
        let end = begin + stride * N;
        let addr = ptr.as_ptr() as usize;

        if addr < begin || addr >= end {
            return None;
        }

        let offset = addr - begin;
        (offset % stride == 0).then_some(offset / stride)
    }

    pub fn allocated(&self) -> usize {
        self.slots.read().allocated
    }

    pub fn available(&self) -> usize {
        N - self.allocated()
    }

    pub fn utilization(&self) -> f64 {
        if N == 0 {
            return 0.0;
        }
        self.allocated() as f64 / N as f64
    }

    pub fn is_full(&self) -> bool {
        self.allocated() >= N
    }

    pub fn is_empty(&self) -> bool {
        self.allocated() == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Default for MemoryPool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> std::fmt::Debug for MemoryPool<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("capacity", &N)
            .field("allocated", &self.allocated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_allocate_until_exhausted() {
        let pool = MemoryPool::<u64, 8>::new();
        let mut live = Vec::new();

        for _ in 0..8 {
            live.push(pool.allocate().unwrap());
            assert_eq!(pool.allocated() + pool.available(), 8);
        }

        assert!(pool.is_full());
        assert!(pool.allocate().is_none());

        let addresses: HashSet<usize> = live.iter().map(|p| p.as_ptr() as usize).collect();
        assert_eq!(addresses.len(), 8);
    }

    #[test]
    fn test_slot_reuse_after_deallocate() {
        let pool = MemoryPool::<u32, 4>::new();
        let first = pool.allocate().unwrap();
        let _second = pool.allocate().unwrap();

        pool.deallocate(first);
        assert_eq!(pool.allocated(), 1);

        // The hint rewinds to the freed slot.
        let reused = pool.allocate().unwrap();
        assert_eq!(reused, first);
    }

    #[test]
    fn test_foreign_and_double_free_are_ignored() {
        let pool = MemoryPool::<u64, 4>::new();
        let ptr = pool.allocate().unwrap();

        let mut outside = 7u64;
        pool.deallocate(NonNull::from(&mut outside));
        assert_eq!(pool.allocated(), 1);

        pool.deallocate(ptr);
        pool.deallocate(ptr);
        assert_eq!(pool.allocated(), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_non_word_multiple_capacity() {
        let pool = MemoryPool::<u8, 70>::new();
        let slots: Vec<_> = (0..70).filter_map(|_| pool.allocate()).collect();
        assert_eq!(slots.len(), 70);
        assert!(pool.allocate().is_none());

        pool.deallocate(slots[65]);
        assert_eq!(pool.allocate(), Some(slots[65]));
    }

    #[test]
    fn test_slots_are_writable() {
        let pool = MemoryPool::<[u8; 32], 2>::new();
        let ptr = pool.allocate().unwrap();
        unsafe {
            ptr.as_ptr().write([0xAB; 32]);
            assert_eq!((*ptr.as_ptr())[31], 0xAB);
        }
        pool.deallocate(ptr);
    }

    #[test]
    fn test_concurrent_allocations_are_distinct() {
        let pool = Arc::new(MemoryPool::<u64, 256>::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    (0..64)
                        .filter_map(|_| pool.allocate())
                        .map(|p| p.as_ptr() as usize)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for addr in handle.join().unwrap() {
                assert!(seen.insert(addr), "address issued twice");
            }
        }

        assert_eq!(seen.len(), 256);
        assert!(pool.is_full());
    }

    proptest! {
        #[test]
        fn prop_counts_stay_consistent(ops in proptest::collection::vec(any::<(bool, usize)>(), 1..200)) {
            let pool = MemoryPool::<u32, 16>::new();
            let mut live: Vec<NonNull<u32>> = Vec::new();

            for (alloc, index) in ops {
                if alloc {
                    match pool.allocate() {
                        Some(ptr) => {
                            prop_assert!(!live.contains(&ptr));
                            live.push(ptr);
                        }
                        None => {
                            prop_assert_eq!(live.len(), 16);
                        }
                    }
                } else if !live.is_empty() {
                    let ptr = live.swap_remove(index % live.len());
                    pool.deallocate(ptr);
                }

                prop_assert_eq!(pool.allocated(), live.len());
                prop_assert_eq!(pool.allocated() + pool.available(), 16);
            }
        }
    }
}
