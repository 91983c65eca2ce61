//! The core open-addressing table: metadata encoding, linear probing,
//! the insert/find/erase state machine, and the grow/rehash policy.

use alloc::boxed::Box;
use alloc::vec;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::Error;
use crate::raw_slots::RawSlots;

/// Metadata tag for a never-occupied slot. Terminates probe sequences.
const EMPTY: u8 = 0x80;

/// Metadata tag for a tombstone. Skipped by lookups, reused by insertion.
const DELETED: u8 = 0xFF;

/// Capacity used when growing a zero-capacity table.
const DEFAULT_CAPACITY: usize = 16;

/// A slot is free when the high bit of its metadata is set. Live slots
/// store a 7-bit hash tag, so their high bit is always clear.
#[inline(always)]
const fn is_free(metadata: u8) -> bool {
    metadata >= 0x80
}

/// Bucket-selecting portion of the hash: everything above the low 7 bits.
#[inline(always)]
const fn h1(hash: u64) -> usize {
    (hash >> 7) as usize
}

/// Tag portion of the hash: the low 7 bits, stored per slot.
#[inline(always)]
const fn h2(hash: u64) -> u8 {
    (hash & 0x7F) as u8
}

const _: () = {
    assert!(is_free(EMPTY));
    assert!(is_free(DELETED));
    assert!(!is_free(h2(0xFFFF)));
};

/// An open-addressing hash table with a one-byte hash tag per slot.
///
/// `HashTable<T>` stores elements of type `T` and resolves collisions by
/// linear probing. Unlike a standard map, operations take the element's
/// hash and an equality predicate explicitly; operations that may rehash
/// additionally take a hasher callback so element positions can be
/// re-derived at the new capacity. [`HashMap`](crate::HashMap) layers the
/// usual keyed interface on top.
///
/// Each slot has a parallel metadata byte holding either a sentinel
/// (`EMPTY`, `DELETED`) or the low 7 bits of the element's hash, so most
/// non-matching slots are rejected with a single byte comparison.
///
/// Removals leave tombstones. Once tombstones reach half the live count,
/// the table is rebuilt at the same capacity to restore short probe
/// sequences.
///
/// # Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use siphasher::sip::SipHasher;
/// # use tagmap::hash_table::{Entry, HashTable};
/// #
/// # fn hash_u64(n: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     n.hash(&mut hasher);
/// #     hasher.finish()
/// # }
/// #
/// let mut table: HashTable<(u64, &str)> = HashTable::new();
/// let hash = hash_u64(1);
///
/// match table.entry(hash, |(k, _)| *k == 1, |(k, _)| hash_u64(*k)) {
///     Entry::Vacant(entry) => {
///         entry.insert((1, "one"));
///     }
///     Entry::Occupied(_) => unreachable!(),
/// }
/// assert_eq!(table.find(hash, |(k, _)| *k == 1), Some(&(1, "one")));
/// ```
pub struct HashTable<T> {
    metadata: Box<[u8]>,
    slots: RawSlots<T>,
    len: usize,
    deleted: usize,
}

impl<T> HashTable<T> {
    /// Creates an empty table with the default capacity of 16 slots.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty table with exactly `capacity` slots.
    ///
    /// Aborts the process if the allocation cannot be satisfied; use
    /// [`try_with_capacity`](HashTable::try_with_capacity) to recover from
    /// allocation failure instead.
    ///
    /// A zero-capacity table allocates nothing and grows on first insert.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            metadata: vec![EMPTY; capacity].into_boxed_slice(),
            slots: RawSlots::new(capacity),
            len: 0,
            deleted: 0,
        }
    }

    /// Creates an empty table with exactly `capacity` slots, returning
    /// [`Error::OutOfMemory`] if the allocation cannot be satisfied.
    pub fn try_with_capacity(capacity: usize) -> Result<Self, Error> {
        Ok(Self {
            metadata: vec![EMPTY; capacity].into_boxed_slice(),
            slots: RawSlots::try_new(capacity)?,
            len: 0,
            deleted: 0,
        })
    }

    /// Returns the number of live elements in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots in the table.
    ///
    /// The capacity is fixed between resizes; the table grows before the
    /// live count can reach 87.5% of it.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Returns a reference to the element matching `hash` and `eq`, if any.
    ///
    /// The probe walks forward from the hash's ideal bucket and stops at
    /// the first never-occupied slot: insertion always fills the first free
    /// slot in a chain, so an `EMPTY` slot proves the element was never
    /// inserted along it. Tombstones and tag mismatches are skipped.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use tagmap::hash_table::{Entry, HashTable};
    /// let mut table: HashTable<u64> = HashTable::new();
    /// if let Entry::Vacant(entry) = table.entry(7, |v| *v == 7, |v| *v) {
    ///     entry.insert(7);
    /// }
    /// assert_eq!(table.find(7, |v| *v == 7), Some(&7));
    /// assert_eq!(table.find(8, |v| *v == 8), None);
    /// ```
    pub fn find(&self, hash: u64, mut eq: impl FnMut(&T) -> bool) -> Option<&T> {
        let index = self.find_index(hash, &mut eq)?;
        // SAFETY: find_index only returns indices whose metadata marks the
        // slot live.
        Some(unsafe { self.slots.get(index) })
    }

    /// Returns a mutable reference to the element matching `hash` and
    /// `eq`, if any.
    pub fn find_mut(&mut self, hash: u64, mut eq: impl FnMut(&T) -> bool) -> Option<&mut T> {
        let index = self.find_index(hash, &mut eq)?;
        // SAFETY: find_index only returns indices whose metadata marks the
        // slot live.
        Some(unsafe { self.slots.get_mut(index) })
    }

    /// Returns a handle to the live slot matching `hash` and `eq`, through
    /// which the element can be inspected or removed in place.
    pub fn find_entry(
        &mut self,
        hash: u64,
        mut eq: impl FnMut(&T) -> bool,
    ) -> Option<OccupiedEntry<'_, T>> {
        let index = self.find_index(hash, &mut eq)?;
        Some(OccupiedEntry { table: self, index })
    }

    /// Looks up the slot for `hash`/`eq`, growing the table first if the
    /// insertion would push the load factor to 0.875 or beyond.
    ///
    /// Returns [`Entry::Occupied`] when an equal element is already
    /// present; the existing element is never overwritten. Otherwise
    /// returns [`Entry::Vacant`] positioned at the first free slot of the
    /// probe sequence, reusing a tombstone when one is available.
    ///
    /// `hasher` must return the same hash for an element that was used to
    /// insert it; it is invoked when the table rehashes.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use tagmap::hash_table::{Entry, HashTable};
    /// let mut table: HashTable<(u64, u32)> = HashTable::new();
    /// let inserted = match table.entry(3, |(k, _)| *k == 3, |(k, _)| *k) {
    ///     Entry::Vacant(entry) => {
    ///         entry.insert((3, 30));
    ///         true
    ///     }
    ///     Entry::Occupied(_) => false,
    /// };
    /// assert!(inserted);
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn entry(
        &mut self,
        hash: u64,
        mut eq: impl FnMut(&T) -> bool,
        hasher: impl Fn(&T) -> u64,
    ) -> Entry<'_, T> {
        if self.needs_grow() {
            self.grow_rehash(&hasher);
        }

        match self.probe_insert(hash, &mut eq) {
            Err(index) => Entry::Occupied(OccupiedEntry { table: self, index }),
            Ok(index) => Entry::Vacant(VacantEntry {
                table: self,
                index,
                hash,
            }),
        }
    }

    /// Removes and returns the element matching `hash` and `eq`, if any.
    ///
    /// The slot is marked as a tombstone rather than emptied, so probe
    /// chains passing through it keep searching. If tombstones reach half
    /// the live count afterwards, the table is rebuilt at the same
    /// capacity, discarding every tombstone. The rebuild invalidates any
    /// previously obtained positions.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use tagmap::hash_table::{Entry, HashTable};
    /// let mut table: HashTable<u64> = HashTable::new();
    /// if let Entry::Vacant(entry) = table.entry(9, |v| *v == 9, |v| *v) {
    ///     entry.insert(9);
    /// }
    /// assert_eq!(table.remove(9, |v| *v == 9, |v| *v), Some(9));
    /// assert_eq!(table.remove(9, |v| *v == 9, |v| *v), None);
    /// ```
    pub fn remove(
        &mut self,
        hash: u64,
        mut eq: impl FnMut(&T) -> bool,
        hasher: impl Fn(&T) -> u64,
    ) -> Option<T> {
        let index = self.find_index(hash, &mut eq)?;
        Some(self.remove_at(index, &hasher))
    }

    /// Removes all elements from the table, keeping the allocated capacity.
    pub fn clear(&mut self) {
        if core::mem::needs_drop::<T>() && self.len > 0 {
            for index in 0..self.capacity() {
                if !is_free(self.metadata[index]) {
                    // SAFETY: The metadata marks the slot live; it is reset
                    // below so the value cannot be dropped twice.
                    unsafe { self.slots.drop_in_place(index) };
                }
            }
        }
        self.metadata.fill(EMPTY);
        self.len = 0;
        self.deleted = 0;
    }

    /// Grows the table to at least `min_capacity` slots, rehashing every
    /// live element. Does nothing if the capacity is already sufficient.
    ///
    /// Aborts the process on allocation failure; see
    /// [`try_reserve`](HashTable::try_reserve).
    pub fn reserve(&mut self, min_capacity: usize, hasher: impl Fn(&T) -> u64) {
        if min_capacity > self.capacity() {
            self.resize_rehash(min_capacity, &hasher);
        }
    }

    /// Grows the table to at least `min_capacity` slots, returning
    /// [`Error::OutOfMemory`] on allocation failure.
    ///
    /// The new storage is fully allocated before any element is moved, so
    /// an error leaves the table valid and unmodified.
    pub fn try_reserve(
        &mut self,
        min_capacity: usize,
        hasher: impl Fn(&T) -> u64,
    ) -> Result<(), Error> {
        if min_capacity <= self.capacity() {
            return Ok(());
        }
        let mut new_table = Self::try_with_capacity(min_capacity)?;
        self.move_into(&mut new_table, &hasher);
        *self = new_table;
        Ok(())
    }

    /// Returns an iterator over the live elements in storage-index order.
    ///
    /// The order is probe-sequence-dependent and unspecified. It is stable
    /// as long as no operation grows or compacts the table.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            table: self,
            index: 0,
            remaining: self.len,
        }
    }

    /// Returns an iterator yielding mutable references to the live
    /// elements in storage-index order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            metadata: &self.metadata,
            slots: self.slots.as_non_null(),
            index: 0,
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Walks the probe sequence for `hash` looking for a live, equal
    /// element. Bounded to one full sweep of the table so a ring with no
    /// `EMPTY` slot cannot probe forever.
    fn find_index(&self, hash: u64, eq: &mut impl FnMut(&T) -> bool) -> Option<usize> {
        if self.len == 0 {
            return None;
        }

        let capacity = self.capacity();
        let tag = h2(hash);
        let mut index = h1(hash) % capacity;
        for _ in 0..capacity {
            let metadata = self.metadata[index];
            if metadata == tag {
                // SAFETY: A tag value in the metadata marks the slot live.
                if eq(unsafe { self.slots.get(index) }) {
                    return Some(index);
                }
            } else if metadata == EMPTY {
                return None;
            }
            index += 1;
            if index == capacity {
                index = 0;
            }
        }

        None
    }

    /// Finds where `hash`/`eq` should be inserted.
    ///
    /// Returns `Err(index)` if an equal element is already live at
    /// `index`, otherwise `Ok` with the first free slot of the probe
    /// sequence. Duplicate detection keeps scanning to the terminating
    /// `EMPTY` slot even after passing a tombstone, so an element living
    /// beyond a tombstone in its chain is still found.
    fn probe_insert(&self, hash: u64, eq: &mut impl FnMut(&T) -> bool) -> Result<usize, usize> {
        let capacity = self.capacity();
        let tag = h2(hash);
        let mut index = h1(hash) % capacity;
        let mut first_free = None;

        for _ in 0..capacity {
            let metadata = self.metadata[index];
            if metadata == EMPTY {
                return Ok(first_free.unwrap_or(index));
            }
            if metadata == DELETED {
                first_free.get_or_insert(index);
            } else if metadata == tag {
                // SAFETY: A tag value in the metadata marks the slot live.
                if eq(unsafe { self.slots.get(index) }) {
                    return Err(index);
                }
            }
            index += 1;
            if index == capacity {
                index = 0;
            }
        }

        // The full ring held no EMPTY slot. The grow check keeps
        // len < capacity, so at least one tombstone was recorded above.
        Ok(first_free.expect("full probe sweep found no free slot"))
    }

    /// Projected load factor check for one more element: grow when
    /// `(len + 1) / capacity` reaches 0.875, counting live elements only.
    fn needs_grow(&self) -> bool {
        (self.len as u128 + 1) * 8 >= self.capacity() as u128 * 7 || self.len == self.capacity()
    }

    fn grow_rehash(&mut self, hasher: &impl Fn(&T) -> u64) {
        let new_capacity = if self.capacity() == 0 {
            DEFAULT_CAPACITY
        } else {
            self.capacity() * 2
        };
        self.resize_rehash(new_capacity, hasher);
    }

    /// Rebuilds the table at `new_capacity`, re-deriving every element's
    /// position from its hash. Serves growth, `reserve`, and same-capacity
    /// tombstone compaction alike.
    fn resize_rehash(&mut self, new_capacity: usize, hasher: &impl Fn(&T) -> u64) {
        debug_assert!(new_capacity > self.len);
        let mut new_table = Self::with_capacity(new_capacity);
        self.move_into(&mut new_table, hasher);
        *self = new_table;
    }

    /// Moves every live element into `new_table`, leaving `self` empty of
    /// live slots (its metadata is cleared as elements move out, so
    /// dropping `self` afterwards releases storage only).
    fn move_into(&mut self, new_table: &mut Self, hasher: &impl Fn(&T) -> u64) {
        for index in 0..self.capacity() {
            if !is_free(self.metadata[index]) {
                self.metadata[index] = EMPTY;
                self.len -= 1;
                // SAFETY: The metadata marked the slot live; it was reset
                // above, transferring ownership of the value to us.
                let value = unsafe { self.slots.read(index) };
                new_table.insert_moved(hasher(&value), value);
            }
        }
        self.deleted = 0;
        debug_assert_eq!(self.len, 0);
    }

    /// Insertion into a table known to contain no equal element, used when
    /// rehashing. The destination always has an `EMPTY` slot because every
    /// caller guarantees `len < capacity`.
    fn insert_moved(&mut self, hash: u64, value: T) {
        let capacity = self.capacity();
        let mut index = h1(hash) % capacity;
        while self.metadata[index] != EMPTY {
            index += 1;
            if index == capacity {
                index = 0;
            }
        }
        self.metadata[index] = h2(hash);
        // SAFETY: `index` is in bounds and its slot is EMPTY, hence dead.
        unsafe { self.slots.write(index, value) };
        self.len += 1;
    }

    /// Removes the live element at `index`, then compacts tombstones if
    /// they have reached half the live count.
    fn remove_at(&mut self, index: usize, hasher: &impl Fn(&T) -> u64) -> T {
        debug_assert!(!is_free(self.metadata[index]));
        self.metadata[index] = DELETED;
        self.deleted += 1;
        self.len -= 1;
        // SAFETY: The metadata marked the slot live; it is now a tombstone,
        // transferring ownership of the value to us.
        let value = unsafe { self.slots.read(index) };

        if self.deleted as u128 * 2 >= self.len as u128 {
            self.resize_rehash(self.capacity(), hasher);
        }

        value
    }
}

impl<T> Default for HashTable<T> {
    /// Returns a zero-capacity table. The first insertion grows it to the
    /// default capacity.
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<T> Debug for HashTable<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field("len", &self.len)
            .field("deleted", &self.deleted)
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<T> Clone for HashTable<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        let mut new_table = Self::with_capacity(self.capacity());
        for index in 0..self.capacity() {
            let metadata = self.metadata[index];
            if !is_free(metadata) {
                // SAFETY: The source slot is live; the destination slot is
                // dead until its metadata is written below.
                unsafe {
                    let value = self.slots.get(index).clone();
                    new_table.slots.write(index, value);
                }
                // Written after the value so a panicking clone cannot leave
                // metadata pointing at an uninitialized slot.
                new_table.metadata[index] = metadata;
                new_table.len += 1;
            } else if metadata == DELETED {
                new_table.metadata[index] = DELETED;
                new_table.deleted += 1;
            }
        }
        debug_assert_eq!(new_table.len, self.len);
        new_table
    }
}

impl<T> Drop for HashTable<T> {
    fn drop(&mut self) {
        if core::mem::needs_drop::<T>() && self.len > 0 {
            for index in 0..self.capacity() {
                if !is_free(self.metadata[index]) {
                    // SAFETY: The metadata marks the slot live, and nothing
                    // reads the slot after this.
                    unsafe { self.slots.drop_in_place(index) };
                }
            }
        }
        // RawSlots releases the buffer without touching element state.
    }
}

/// A view into a single slot of a [`HashTable`], either occupied by an
/// equal element or vacant at the insertion point the probe selected.
///
/// Constructed by [`HashTable::entry`].
pub enum Entry<'a, T> {
    /// An equal element is already present.
    Occupied(OccupiedEntry<'a, T>),
    /// No equal element is present; the entry points at the slot an
    /// insertion will fill.
    Vacant(VacantEntry<'a, T>),
}

/// A view into a live slot of a [`HashTable`].
pub struct OccupiedEntry<'a, T> {
    table: &'a mut HashTable<T>,
    index: usize,
}

impl<'a, T> OccupiedEntry<'a, T> {
    /// Returns a reference to the element.
    pub fn get(&self) -> &T {
        // SAFETY: The entry was constructed from a live slot index, and no
        // table operation can run while the entry borrows the table.
        unsafe { self.table.slots.get(self.index) }
    }

    /// Returns a mutable reference to the element.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: As in `get`.
        unsafe { self.table.slots.get_mut(self.index) }
    }

    /// Converts the entry into a mutable reference tied to the table's
    /// lifetime.
    pub fn into_mut(self) -> &'a mut T {
        let table = self.table;
        // SAFETY: As in `get`.
        unsafe { table.slots.get_mut(self.index) }
    }

    /// Removes the element and returns it.
    ///
    /// `hasher` must return the same hash for an element that was used to
    /// insert it; it is invoked if the removal triggers tombstone
    /// compaction.
    pub fn remove(self, hasher: impl Fn(&T) -> u64) -> T {
        self.table.remove_at(self.index, &hasher)
    }
}

/// A view into a free slot of a [`HashTable`], ready to accept an element.
pub struct VacantEntry<'a, T> {
    table: &'a mut HashTable<T>,
    index: usize,
    hash: u64,
}

impl<'a, T> VacantEntry<'a, T> {
    /// Writes `value` into the slot and returns a mutable reference to it.
    ///
    /// The element must be the one whose hash was passed to
    /// [`HashTable::entry`] and must satisfy its equality predicate.
    pub fn insert(self, value: T) -> &'a mut T {
        let table = self.table;
        if table.metadata[self.index] == DELETED {
            table.deleted -= 1;
        }
        table.metadata[self.index] = h2(self.hash);
        // SAFETY: The entry was constructed from a free (hence dead) slot
        // index, and no table operation ran while the entry existed.
        unsafe { table.slots.write(self.index, value) };
        table.len += 1;
        // SAFETY: The slot was just initialized above.
        unsafe { table.slots.get_mut(self.index) }
    }
}

/// An iterator over the live elements of a [`HashTable`].
pub struct Iter<'a, T> {
    table: &'a HashTable<T>,
    index: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let index = self.index;
            self.index += 1;
            if !is_free(self.table.metadata[index]) {
                self.remaining -= 1;
                // SAFETY: The metadata marks the slot live.
                return Some(unsafe { self.table.slots.get(index) });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// A mutable iterator over the live elements of a [`HashTable`].
pub struct IterMut<'a, T> {
    metadata: &'a [u8],
    slots: NonNull<T>,
    index: usize,
    remaining: usize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let index = self.index;
            self.index += 1;
            if !is_free(self.metadata[index]) {
                self.remaining -= 1;
                // SAFETY: The metadata marks the slot live, the iterator
                // holds the table's unique borrow, and each index is
                // yielded at most once.
                return Some(unsafe { &mut *self.slots.as_ptr().add(index) });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
