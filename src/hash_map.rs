//! A keyed hash map built on the tagged open-addressing [`HashTable`].
//!
//! `HashMap<K, V, S>` pairs the table with a [`BuildHasher`] so callers
//! work with keys instead of raw hashes. Insertion is insert-if-absent:
//! an existing entry is never overwritten by [`HashMap::insert`].

use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::Error;
use crate::hash_table::Entry;
use crate::hash_table::HashTable;

/// Default hasher builder, used when the `foldhash` feature is enabled.
#[cfg(feature = "foldhash")]
pub type DefaultHashBuilder = foldhash::fast::RandomState;

/// Placeholder hasher builder used when the `foldhash` feature is
/// disabled. It does not implement [`BuildHasher`]; construct maps with
/// [`HashMap::with_hasher`] instead.
#[cfg(not(feature = "foldhash"))]
pub type DefaultHashBuilder = ();

/// A hash map over keys `K` and values `V` using open addressing with a
/// one-byte hash tag per slot.
///
/// Keys must implement `Hash + Eq`, and the two must agree: equal keys
/// must produce equal hashes. The hasher builder `S` is consulted for
/// every lookup and for re-deriving positions when the table grows or
/// compacts tombstones.
///
/// Insertion never overwrites: [`insert`](HashMap::insert) on a key that
/// is already present leaves the map unchanged. Callers wanting upsert
/// semantics can combine it with [`get_mut`](HashMap::get_mut).
///
/// # Example
///
/// ```rust
/// use tagmap::HashMap;
///
/// let mut map: HashMap<i32, &str> = HashMap::new();
/// assert!(map.insert(1, "one"));
/// assert!(!map.insert(1, "uno"));
/// assert_eq!(map.get(&1), Some(&"one"));
/// ```
#[derive(Clone)]
pub struct HashMap<K, V, S = DefaultHashBuilder> {
    table: HashTable<(K, V)>,
    hash_builder: S,
}

impl<K, V, S> Debug for HashMap<K, V, S>
where
    K: Debug + Hash + Eq,
    V: Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Creates an empty map with the default capacity and hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates an empty map with at least `capacity` slots and the
    /// default hasher builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates an empty map with the default capacity and the given
    /// hasher builder.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use tagmap::HashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: HashMap<i32, String, _> = HashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            table: HashTable::new(),
            hash_builder,
        }
    }

    /// Creates an empty map with at least `capacity` slots and the given
    /// hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            hash_builder,
        }
    }

    /// Creates an empty map with at least `capacity` slots, returning
    /// [`Error::OutOfMemory`] if the allocation cannot be satisfied.
    pub fn try_with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Result<Self, Error> {
        Ok(Self {
            table: HashTable::try_with_capacity(capacity)?,
            hash_builder,
        })
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots in the map's table.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Inserts a key-value pair if the key is not already present.
    ///
    /// Returns `true` if the pair was inserted. Returns `false` if the
    /// key is already present: the existing value is kept, the map is
    /// unchanged, and the offered pair is dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tagmap::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// assert!(map.insert(5, "first"));
    /// assert!(!map.insert(5, "second"));
    /// assert_eq!(map.get(&5), Some(&"first"));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = self.hash_builder.hash_one(&key);
        let hash_builder = &self.hash_builder;
        match self.table.entry(
            hash,
            |(k, _)| k == &key,
            |(k, _)| hash_builder.hash_one(k),
        ) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert((key, value));
                true
            }
        }
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tagmap::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = self.hash_builder.hash_one(key);
        self.table.find(hash, |(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.hash_builder.hash_one(key);
        self.table.find_mut(hash, |(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns a reference to the value for `key`, or
    /// [`Error::KeyNotFound`] if the key is absent.
    ///
    /// Unlike [`insert`](HashMap::insert), this never creates an entry.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tagmap::{Error, HashMap};
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.at(&1), Ok(&"a"));
    /// assert_eq!(map.at(&2), Err(Error::KeyNotFound));
    /// ```
    pub fn at(&self, key: &K) -> Result<&V, Error> {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Returns a mutable reference to the value for `key`, or
    /// [`Error::KeyNotFound`] if the key is absent.
    pub fn at_mut(&mut self, key: &K) -> Result<&mut V, Error> {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    /// Returns `true` if the map contains a value for the key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removes a key from the map, returning its value if it was present.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tagmap::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes a key from the map, returning the stored key and value if
    /// the key was present.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        let hash = self.hash_builder.hash_one(key);
        let hash_builder = &self.hash_builder;
        self.table.remove(
            hash,
            |(k, _)| k == key,
            |(k, _)| hash_builder.hash_one(k),
        )
    }

    /// Removes all entries from the map, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Grows the map to hold at least `min_capacity` slots. Does nothing
    /// if the capacity is already sufficient.
    pub fn reserve(&mut self, min_capacity: usize) {
        let hash_builder = &self.hash_builder;
        self.table
            .reserve(min_capacity, |(k, _)| hash_builder.hash_one(k));
    }

    /// Grows the map to hold at least `min_capacity` slots, returning
    /// [`Error::OutOfMemory`] on allocation failure. An error leaves the
    /// map valid and unmodified.
    pub fn try_reserve(&mut self, min_capacity: usize) -> Result<(), Error> {
        let hash_builder = &self.hash_builder;
        self.table
            .try_reserve(min_capacity, |(k, _)| hash_builder.hash_one(k))
    }

    /// Returns an iterator over the map's key-value pairs.
    ///
    /// The order is probe-sequence-dependent and unspecified.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the map's key-value pairs with mutable
    /// references to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Returns an iterator over the map's keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the map's values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, S> Extend<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Extends the map with the pairs from `iter`. Insert-if-absent
    /// applies: when a key occurs more than once, the first occurrence
    /// wins.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// An iterator over the key-value pairs of a [`HashMap`].
pub struct Iter<'a, K, V> {
    inner: crate::hash_table::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// An iterator over the key-value pairs of a [`HashMap`] with mutable
/// references to the values.
pub struct IterMut<'a, K, V> {
    inner: crate::hash_table::IterMut<'a, (K, V)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (&*k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a [`HashMap`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An iterator over the values of a [`HashMap`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::hash::BuildHasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    #[derive(Clone)]
    struct SipHashBuilder {
        k0: u64,
        k1: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap_or(0),
                k1: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    type TestMap<K, V> = HashMap<K, V, SipHashBuilder>;

    #[test]
    fn insert_new() {
        let mut map: TestMap<i32, String> = HashMap::new();
        assert!(map.insert(5, "Hello, world!".to_string()));
        assert!(map.insert(2, "wow!".to_string()));

        assert_eq!(map.get(&5), Some(&"Hello, world!".to_string()));
        assert_eq!(map.get(&2), Some(&"wow!".to_string()));
        assert_eq!(map.get(&3), None);
    }

    #[test]
    fn insert_existing_keeps_value() {
        let mut map: TestMap<i32, &str> = HashMap::new();
        assert!(map.insert(5, "123"));
        assert!(!map.insert(5, "456"));

        assert_eq!(map.get(&5), Some(&"123"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn insert_after_erase() {
        let mut map: TestMap<i32, &str> = HashMap::new();
        map.insert(5, "123");
        map.remove(&5);
        map.insert(5, "456");

        assert_eq!(map.get(&5), Some(&"456"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn auto_grow() {
        let mut map: TestMap<i32, &str> = HashMap::with_capacity(4);
        assert_eq!(map.capacity(), 4);

        for k in 1..=5 {
            map.insert(k, "123");
        }
        assert!(map.capacity() > 4);

        let capacity = map.capacity();
        for k in 1..capacity as i32 {
            map.insert(k * 10, "123");
        }
        assert!(map.capacity() >= capacity);
        for k in 1..=5 {
            assert_eq!(map.get(&k), Some(&"123"));
        }
    }

    #[test]
    fn erase_existing() {
        let mut map: TestMap<i32, &str> = HashMap::new();
        assert_eq!(map.len(), 0);

        map.insert(1, "abc");
        map.insert(2, "def");
        assert_eq!(map.len(), 2);

        assert_eq!(map.remove(&1), Some("abc"));
        assert_eq!(map.len(), 1);

        assert_eq!(map.remove(&2), Some("def"));
        assert_eq!(map.len(), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn erase_non_existing() {
        let mut map: TestMap<i32, &str> = HashMap::new();
        map.insert(1, "abc");
        map.insert(2, "def");

        assert_eq!(map.remove(&1), Some("abc"));
        assert_eq!(map.len(), 1);

        assert_eq!(map.remove(&5), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn erase_by_position() {
        let mut map: TestMap<i32, &str> = HashMap::new();
        map.insert(1, "abc");
        map.insert(2, "def");

        // Erase through a table-level entry handle, the positional
        // counterpart of remove-by-key.
        let hash = map.hash_builder.hash_one(&1);
        let hash_builder = map.hash_builder.clone();
        let entry = map.table.find_entry(hash, |(k, _)| *k == 1).unwrap();
        let (key, value) = entry.remove(|(k, _)| hash_builder.hash_one(k));
        assert_eq!((key, value), (1, "abc"));
        assert_eq!(map.len(), 1);

        let hash = map.hash_builder.hash_one(&5);
        assert!(map.table.find_entry(hash, |(k, _)| *k == 5).is_none());
    }

    #[test]
    fn clone_is_independent() {
        let mut map1: TestMap<i32, String> = HashMap::new();
        map1.insert(1, "abc".to_string());
        map1.insert(2, "def".to_string());

        let mut map2 = map1.clone();
        assert_eq!(map1.len(), 2);
        assert_eq!(map2.len(), 2);
        assert!(map2.contains_key(&1));
        assert!(map2.contains_key(&2));
        assert!(!map2.contains_key(&3));

        // Erasing in one map must not affect the other.
        map1.remove(&1);
        map2.remove(&2);
        assert_eq!(map1.get(&2), Some(&"def".to_string()));
        assert_eq!(map2.get(&1), Some(&"abc".to_string()));
    }

    #[test]
    fn taken_map_is_valid() {
        let mut map1: TestMap<i32, &str> = HashMap::new();
        map1.insert(1, "abc");
        map1.insert(2, "def");

        let map2 = core::mem::take(&mut map1);

        assert!(map1.is_empty());
        assert_eq!(map2.len(), 2);
        assert_eq!(map1.get(&1), None);
        assert_eq!(map2.get(&1), Some(&"abc"));

        // The emptied map must keep working as if freshly constructed.
        map1.insert(1, "hello");
        map1.insert(3, "world");
        assert_eq!(map1.len(), 2);
        assert_eq!(map1.get(&3), Some(&"world"));
        assert_eq!(map2.get(&3), None);
    }

    #[test]
    fn cleared_is_valid() {
        let mut map: TestMap<i32, &str> = HashMap::new();
        map.insert(1, "abc");
        map.insert(2, "def");

        let capacity = map.capacity();
        map.clear();

        assert_eq!(map.capacity(), capacity);
        assert_eq!(map.len(), 0);
        assert_eq!(map.get(&1), None);
        assert_eq!(map.get(&2), None);

        map.insert(1, "123");
        map.insert(2, "456");
        assert_eq!(map.get(&1), Some(&"123"));
        assert_eq!(map.get(&2), Some(&"456"));
    }

    #[test]
    fn at_reports_key_not_found() {
        let mut map: TestMap<i32, String> = HashMap::new();
        map.insert(1, "abc".to_string());

        assert_eq!(map.at(&1), Ok(&"abc".to_string()));
        assert_eq!(map.at(&2), Err(Error::KeyNotFound));

        map.at_mut(&1).unwrap().push('!');
        assert_eq!(map.get(&1), Some(&"abc!".to_string()));
        assert_eq!(map.at_mut(&2), Err(Error::KeyNotFound));
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut map: TestMap<i32, String> = HashMap::new();
        map.insert(1, "hello".to_string());

        if let Some(value) = map.get_mut(&1) {
            value.push_str(" world");
        }
        assert_eq!(map.get(&1), Some(&"hello world".to_string()));
        assert_eq!(map.get_mut(&2), None);
    }

    #[test]
    fn iteration_covers_live_entries() {
        let mut map: TestMap<i32, i32> = HashMap::new();
        for k in 0..10 {
            map.insert(k, k * 2);
        }
        map.remove(&0);
        map.remove(&5);

        let mut keys: Vec<i32> = map.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, [1, 2, 3, 4, 6, 7, 8, 9]);

        let sum: i32 = map.values().sum();
        assert_eq!(sum, (1 + 2 + 3 + 4 + 6 + 7 + 8 + 9) * 2);
        assert_eq!(map.iter().len(), 8);
    }

    #[test]
    fn iter_mut_updates_values() {
        let mut map: TestMap<i32, i32> = HashMap::new();
        for k in 0..4 {
            map.insert(k, 1);
        }
        for (_, v) in map.iter_mut() {
            *v += 1;
        }
        for k in 0..4 {
            assert_eq!(map.get(&k), Some(&2));
        }
    }

    #[test]
    fn from_iterator_first_occurrence_wins() {
        let map: TestMap<i32, &str> =
            [(1, "a"), (2, "b"), (1, "shadowed")].into_iter().collect();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&1), Some(&"a"));
        assert_eq!(map.get(&2), Some(&"b"));
    }

    #[test]
    fn reserve_preserves_entries() {
        let mut map: TestMap<i32, i32> = HashMap::new();
        for k in 0..10 {
            map.insert(k, k);
        }

        map.reserve(200);
        assert!(map.capacity() >= 200);
        for k in 0..10 {
            assert_eq!(map.get(&k), Some(&k));
        }

        map.try_reserve(300).unwrap();
        assert!(map.capacity() >= 300);
    }

    #[cfg(feature = "foldhash")]
    #[test]
    fn default_hasher_round_trip() {
        let mut map: HashMap<&str, i32> = HashMap::new();
        map.insert("one", 1);
        map.insert("two", 2);

        assert_eq!(map.get(&"one"), Some(&1));
        assert_eq!(map.remove(&"two"), Some(2));
        assert_eq!(map.get(&"two"), None);
    }
}
