use core::hash::BuildHasher;
use core::hash::Hash;

use crate::hash_table::HashTable;
use crate::hash_table::KeyQuery;

/// Key-equality hook for the general dialect.
///
/// The comparator must agree with the key's `Hash` implementation: keys it
/// considers equal must hash identically through the map's `BuildHasher`,
/// or lookups will miss. The usual way to satisfy this for a non-structural
/// comparator is a key type whose `Hash` covers exactly the compared
/// fields.
///
/// ```rust
/// # use core::hash::{BuildHasher, Hash, Hasher};
/// # use siphasher::sip::SipHasher;
/// # use robin_hash::{HashMap, KeyEq};
/// # #[derive(Default)]
/// # struct SimpleHasher;
/// # impl BuildHasher for SimpleHasher {
/// #     type Hasher = SipHasher;
/// #
/// #     fn build_hasher(&self) -> Self::Hasher {
/// #         SipHasher::new()
/// #     }
/// # }
/// struct Ticket {
///     id: u32,
///     issued_at: u64,
/// }
///
/// // Tickets are keyed by id alone; `issued_at` is payload.
/// impl Hash for Ticket {
///     fn hash<H: Hasher>(&self, state: &mut H) {
///         self.id.hash(state);
///     }
/// }
///
/// #[derive(Default)]
/// struct ById;
///
/// impl KeyEq<Ticket> for ById {
///     fn is_eq(&self, a: &Ticket, b: &Ticket) -> bool {
///         a.id == b.id
///     }
/// }
///
/// let mut seen: HashMap<Ticket, &str, SimpleHasher, ById> =
///     HashMap::with_hasher_and_eq(SimpleHasher, ById);
/// assert!(seen.insert(Ticket { id: 7, issued_at: 100 }, "first"));
/// assert!(!seen.insert(Ticket { id: 7, issued_at: 999 }, "second"));
/// assert_eq!(seen.get(&Ticket { id: 7, issued_at: 0 }), Some(&"first"));
/// ```
pub trait KeyEq<K> {
    /// Returns `true` if the two keys are equal under this comparator.
    fn is_eq(&self, a: &K, b: &K) -> bool;
}

/// The default comparator: structural equality via [`Eq`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralEq;

impl<K> KeyEq<K> for StructuralEq
where
    K: Eq,
{
    #[inline(always)]
    fn is_eq(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

/// [`KeyQuery`] hook for the general dialect: keys are hashed through a
/// `BuildHasher` and compared with a [`KeyEq`] comparator.
///
/// The 64-bit hasher output is folded to the table's 32-bit hash word by
/// xoring the halves, so entropy from both survives; the Fibonacci mapping
/// does the rest.
#[derive(Clone, Default)]
pub struct HashedQuery<S, E = StructuralEq> {
    hash_builder: S,
    eq: E,
}

impl<S, E> HashedQuery<S, E> {
    /// Creates a hook from a hasher builder and a comparator.
    pub fn new(hash_builder: S, eq: E) -> Self {
        Self { hash_builder, eq }
    }
}

impl<K, S, E> KeyQuery<K> for HashedQuery<S, E>
where
    K: Hash,
    S: BuildHasher,
    E: KeyEq<K>,
{
    const DISTANCE_CUTOFF: bool = false;

    #[inline(always)]
    fn hash(&self, key: &K) -> u32 {
        let hash = self.hash_builder.hash_one(key);
        (hash ^ (hash >> 32)) as u32
    }

    #[inline(always)]
    fn is_match(&self, query: &K, _query_hash: u32, stored: &K) -> bool {
        self.eq.is_eq(query, stored)
    }
}

/// The general map dialect: a [`HashTable`] whose keys are hashed through a
/// configurable `BuildHasher` and compared with a [`KeyEq`] comparator
/// (structural equality unless overridden).
///
/// All table operations ([`insert`](HashTable::insert),
/// [`get`](HashTable::get), [`update`](HashTable::update),
/// [`remove`](HashTable::remove), [`fetch`](HashTable::fetch), ...) are
/// provided by [`HashTable`]; this alias only adds construction.
///
/// The hasher must spread keys across the full 32-bit hash word. A
/// degenerate hasher that maps more keys to one hash value than the probe
/// window holds will grow the table without bound.
///
/// ```rust
/// # use core::hash::BuildHasher;
/// # use siphasher::sip::SipHasher;
/// # use robin_hash::HashMap;
/// # #[derive(Default)]
/// # struct SimpleHasher;
/// # impl BuildHasher for SimpleHasher {
/// #     type Hasher = SipHasher;
/// #
/// #     fn build_hasher(&self) -> Self::Hasher {
/// #         SipHasher::new()
/// #     }
/// # }
/// let mut map: HashMap<String, u32, SimpleHasher> = HashMap::new();
///
/// assert!(map.insert("one".to_string(), 1));
/// assert_eq!(map.get(&"one".to_string()), Some(&1));
///
/// map.update(&"one".to_string(), 11);
/// assert_eq!(map[&"one".to_string()], 11);
///
/// map.remove(&"one".to_string());
/// assert!(map.is_empty());
/// ```
pub type HashMap<K, V, S, E = StructuralEq> = HashTable<K, V, HashedQuery<S, E>>;

impl<K, V, S> HashTable<K, V, HashedQuery<S, StructuralEq>>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates an empty map with a default-constructed hasher builder and
    /// the structural-equality comparator.
    pub fn new() -> Self
    where
        S: Default,
    {
        Self::with_hasher(S::default())
    }

    /// Creates an empty map sized for `capacity` with a
    /// default-constructed hasher builder.
    pub fn with_capacity(capacity: usize) -> Self
    where
        S: Default,
    {
        Self::with_capacity_and_hasher(capacity, S::default())
    }

    /// Creates an empty map with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_query(HashedQuery::new(hash_builder, StructuralEq))
    }

    /// Creates an empty map sized for `capacity` with the given hasher
    /// builder.
    ///
    /// The capacity is rounded up to a power of two, with a floor of
    /// [`MIN_CAPACITY`](crate::hash_table::MIN_CAPACITY).
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::with_capacity_and_query(capacity, HashedQuery::new(hash_builder, StructuralEq))
    }

    /// Creates an empty map with explicit capacity and load factor.
    ///
    /// # Panics
    ///
    /// Panics if `load_factor` is not strictly between 0 and 1.
    pub fn with_load_factor_and_hasher(capacity: usize, load_factor: f32, hash_builder: S) -> Self {
        Self::with_capacity_and_load_factor(
            capacity,
            load_factor,
            HashedQuery::new(hash_builder, StructuralEq),
        )
    }
}

impl<K, V, S, E> HashTable<K, V, HashedQuery<S, E>>
where
    K: Hash,
    S: BuildHasher,
    E: KeyEq<K>,
{
    /// Creates an empty map with the given hasher builder and key
    /// comparator.
    pub fn with_hasher_and_eq(hash_builder: S, eq: E) -> Self {
        Self::with_query(HashedQuery::new(hash_builder, eq))
    }
}
