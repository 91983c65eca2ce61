use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::ptr::NonNull;

use crate::Error;

/// A fixed-capacity, heap-allocated buffer of `T` with no implicit
/// construction or destruction of elements.
///
/// The buffer hands out raw access to individual slots by index. It never
/// tracks which slots hold a live value; the owner is fully responsible for
/// constructing values with [`write`], reading them back out with [`read`],
/// and dropping them with [`drop_in_place`] before the buffer itself is
/// dropped. Dropping a `RawSlots` releases the allocation without running
/// any element destructors.
///
/// There is no resize operation. Growth is always performed by the owner:
/// allocate a new buffer, move live elements across, discard the old one.
///
/// [`write`]: RawSlots::write
/// [`read`]: RawSlots::read
/// [`drop_in_place`]: RawSlots::drop_in_place
pub struct RawSlots<T> {
    ptr: NonNull<T>,
    capacity: usize,
}

impl<T> RawSlots<T> {
    fn layout(capacity: usize) -> Layout {
        Layout::array::<T>(capacity).expect("allocation size overflow")
    }

    /// Allocates storage for exactly `capacity` elements, aborting on
    /// allocation failure.
    ///
    /// No elements are constructed. Zero-size layouts (capacity 0, or a
    /// zero-sized `T`) do not touch the allocator.
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(slots) => slots,
            Err(_) => handle_alloc_error(Self::layout(capacity)),
        }
    }

    /// Allocates storage for exactly `capacity` elements.
    ///
    /// Returns [`Error::OutOfMemory`] if the allocator cannot satisfy the
    /// request. No elements are constructed.
    pub fn try_new(capacity: usize) -> Result<Self, Error> {
        let layout = Self::layout(capacity);
        let ptr = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            // SAFETY: The layout has non-zero size. A null return is mapped
            // to an error rather than dereferenced.
            let raw = unsafe { alloc::alloc::alloc(layout) };
            NonNull::new(raw.cast::<T>()).ok_or(Error::OutOfMemory)?
        };

        Ok(Self { ptr, capacity })
    }

    /// Returns the number of slots in the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the base pointer of the buffer.
    pub fn as_non_null(&self) -> NonNull<T> {
        self.ptr
    }

    /// Constructs `value` in place at `index`.
    ///
    /// # Safety
    ///
    /// - `index` must be less than [`capacity`](RawSlots::capacity).
    /// - The slot at `index` must not currently hold a live value, or that
    ///   value is leaked.
    pub unsafe fn write(&mut self, index: usize, value: T) {
        debug_assert!(index < self.capacity);
        // SAFETY: Caller guarantees `index` is in bounds, so the pointer
        // arithmetic stays within the allocation.
        unsafe {
            self.ptr.as_ptr().add(index).write(value);
        }
    }

    /// Moves the value at `index` out of the buffer.
    ///
    /// # Safety
    ///
    /// - `index` must be less than [`capacity`](RawSlots::capacity).
    /// - The slot at `index` must hold a live value, and the owner must
    ///   treat the slot as dead afterwards.
    pub unsafe fn read(&mut self, index: usize) -> T {
        debug_assert!(index < self.capacity);
        // SAFETY: Caller guarantees the slot is in bounds and initialized.
        unsafe { self.ptr.as_ptr().add(index).read() }
    }

    /// Returns a reference to the value at `index`.
    ///
    /// # Safety
    ///
    /// - `index` must be less than [`capacity`](RawSlots::capacity).
    /// - The slot at `index` must hold a live value.
    pub unsafe fn get(&self, index: usize) -> &T {
        debug_assert!(index < self.capacity);
        // SAFETY: Caller guarantees the slot is in bounds and initialized.
        unsafe { &*self.ptr.as_ptr().add(index) }
    }

    /// Returns a mutable reference to the value at `index`.
    ///
    /// # Safety
    ///
    /// - `index` must be less than [`capacity`](RawSlots::capacity).
    /// - The slot at `index` must hold a live value.
    pub unsafe fn get_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.capacity);
        // SAFETY: Caller guarantees the slot is in bounds and initialized.
        unsafe { &mut *self.ptr.as_ptr().add(index) }
    }

    /// Drops the value at `index` in place.
    ///
    /// # Safety
    ///
    /// - `index` must be less than [`capacity`](RawSlots::capacity).
    /// - The slot at `index` must hold a live value, and the owner must
    ///   treat the slot as dead afterwards.
    pub unsafe fn drop_in_place(&mut self, index: usize) {
        debug_assert!(index < self.capacity);
        // SAFETY: Caller guarantees the slot is in bounds and initialized.
        unsafe {
            core::ptr::drop_in_place(self.ptr.as_ptr().add(index));
        }
    }
}

impl<T> Drop for RawSlots<T> {
    fn drop(&mut self) {
        let layout = Self::layout(self.capacity);
        if layout.size() != 0 {
            // SAFETY: The pointer was produced by `alloc` with this exact
            // layout. Elements are not dropped here; the owner must have
            // already dropped every live value.
            unsafe {
                alloc::alloc::dealloc(self.ptr.as_ptr().cast(), layout);
            }
        }
    }
}

// SAFETY: RawSlots owns its allocation outright; sending it between threads
// moves sole ownership of the buffer along with it.
unsafe impl<T: Send> Send for RawSlots<T> {}
// SAFETY: Shared access only hands out `&T` through the owner's accessors.
unsafe impl<T: Sync> Sync for RawSlots<T> {}

#[cfg(test)]
mod tests {
    use core::sync::atomic::AtomicUsize;
    use core::sync::atomic::Ordering;

    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut slots: RawSlots<u64> = RawSlots::new(8);
        assert_eq!(slots.capacity(), 8);

        // SAFETY: Indices are in bounds; each slot is written before read.
        unsafe {
            slots.write(0, 10);
            slots.write(7, 70);
            assert_eq!(*slots.get(0), 10);
            assert_eq!(*slots.get(7), 70);
            assert_eq!(slots.read(0), 10);
            assert_eq!(slots.read(7), 70);
        }
    }

    #[test]
    fn zero_capacity_allocates_nothing() {
        let slots: RawSlots<u64> = RawSlots::new(0);
        assert_eq!(slots.capacity(), 0);

        let slots = RawSlots::<u64>::try_new(0).unwrap();
        assert_eq!(slots.capacity(), 0);
    }

    #[test]
    fn dropping_buffer_does_not_drop_elements() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Counted;
        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut slots: RawSlots<Counted> = RawSlots::new(4);
        // SAFETY: Indices are in bounds and the slots start dead.
        unsafe {
            slots.write(1, Counted);
            slots.write(2, Counted);
            slots.drop_in_place(1);
        }
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);

        // The value at index 2 is intentionally leaked: dropping the buffer
        // must not run element destructors.
        drop(slots);
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_mut_allows_in_place_update() {
        let mut slots: RawSlots<alloc::string::String> = RawSlots::new(2);
        // SAFETY: Index 0 is in bounds and written before access.
        unsafe {
            slots.write(0, alloc::string::String::from("a"));
            slots.get_mut(0).push('b');
            assert_eq!(slots.get(0), "ab");
            slots.drop_in_place(0);
        }
    }
}
