use crate::hash_table::HashTable;
use crate::hash_table::KeyQuery;

/// Keys usable with the numeric dialect: fixed-size integers of at most 32
/// bits, hashed by identity.
///
/// The conversion must be injective (distinct keys must produce distinct
/// hash words) because [`IntMap`] equality compares hashes instead of
/// keys. Every implementation here is a plain bit conversion, which is
/// injective by construction; that is the reason the dialect is restricted
/// to these types rather than being open to arbitrary `Hash` keys.
pub trait IntKey: Copy {
    /// Returns the key's value as the full 32-bit hash word.
    fn identity_hash(self) -> u32;
}

macro_rules! impl_int_key {
    ($($ty:ty),*) => {
        $(
            impl IntKey for $ty {
                #[inline(always)]
                fn identity_hash(self) -> u32 {
                    self as u32
                }
            }
        )*
    };
}

impl_int_key!(u8, u16, u32, i8, i16, i32);

/// [`KeyQuery`] hook for the numeric dialect: identity hashing, equality by
/// hash comparison.
///
/// A match never consults the stored key's bits beyond its hash, which is
/// sound because [`IntKey::identity_hash`] is injective. This also enables
/// the distance cutoff during lookups: a miss is detected as soon as the
/// scan passes the position the key would occupy.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntQuery;

impl<K> KeyQuery<K> for IntQuery
where
    K: IntKey,
{
    const DISTANCE_CUTOFF: bool = true;

    #[inline(always)]
    fn hash(&self, key: &K) -> u32 {
        key.identity_hash()
    }

    #[inline(always)]
    fn is_match(&self, _query: &K, query_hash: u32, stored: &K) -> bool {
        stored.identity_hash() == query_hash
    }
}

/// The numeric map dialect: a [`HashTable`] over integer keys of at most 32
/// bits, hashed by identity, with equality decided by the full stored hash.
///
/// Skipping the key comparison keeps the probe loop to a single integer
/// compare per slot, and the Fibonacci mapping spreads the identity hashes,
/// so even adversarially clustered keys (sequential counters, multiples of
/// large powers of two) probe well.
///
/// All table operations ([`insert`](HashTable::insert),
/// [`get`](HashTable::get), [`update`](HashTable::update),
/// [`remove`](HashTable::remove), [`fetch`](HashTable::fetch), ...) are
/// provided by [`HashTable`]; this alias only adds construction.
///
/// ```rust
/// use robin_hash::IntMap;
///
/// let mut depths: IntMap<u32, u8> = IntMap::new();
///
/// assert!(depths.insert(0x1000, 3));
/// assert!(depths.insert(0x2000, 5));
/// assert!(!depths.insert(0x1000, 9)); // present; not an upsert
///
/// assert_eq!(depths.get(&0x1000), Some(&3));
///
/// depths.update(&0x1000, 4);
/// assert_eq!(depths[&0x1000], 4);
///
/// depths.remove(&0x2000);
/// assert_eq!(depths.get(&0x2000), None);
/// ```
pub type IntMap<K, V> = HashTable<K, V, IntQuery>;

impl<K, V> HashTable<K, V, IntQuery>
where
    K: IntKey,
{
    /// Creates an empty map with the default capacity and load factor.
    pub fn new() -> Self {
        Self::with_query(IntQuery)
    }

    /// Creates an empty map sized for `capacity`.
    ///
    /// The capacity is rounded up to a power of two, with a floor of
    /// [`MIN_CAPACITY`](crate::hash_table::MIN_CAPACITY).
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_query(capacity, IntQuery)
    }

    /// Creates an empty map with explicit capacity and load factor.
    ///
    /// # Panics
    ///
    /// Panics if `load_factor` is not strictly between 0 and 1.
    pub fn with_load_factor(capacity: usize, load_factor: f32) -> Self {
        Self::with_capacity_and_load_factor(capacity, load_factor, IntQuery)
    }
}
