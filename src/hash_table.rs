//! A hash table using linear Robin Hood probing with a hard probe budget.
//!
//! Every key maps to a home slot via Fibonacci multiply-shift hashing over a
//! 32-bit hash. Collisions are resolved by walking forward linearly; on each
//! step the entry that is further from its own home keeps the slot
//! (take-from-the-rich), so probe distances stay tightly clustered. The walk
//! is never allowed to exceed `probe_limit = min(15, log2(capacity))` slots:
//! an insertion that would need a longer walk grows the table instead and
//! retries. Lookups and removals therefore scan at most `probe_limit` slots,
//! giving logarithmic worst-case behavior without tombstones or overflow
//! chains.
//!
//! ## Design
//!
//! The backing array holds `capacity + probe_limit` slots. Homes are always
//! below `capacity`; the pad past the logical end lets a probe walk run off
//! the edge without wrap-around arithmetic, at the cost of a few extra slots.
//! Capacity is always a power of two so the home computation is a multiply
//! and a shift, never a modulo.
//!
//! Each slot stores its probe distance in a byte directly next to the entry,
//! so a probe touches a single contiguous slot. A distance byte of `EMPTY`
//! (0xFF) marks a vacant slot; the protocol never stores a real distance
//! above 14, so the sentinel is unreachable by live entries and no separate
//! occupancy bitmap is needed. The entry payload is `MaybeUninit` and is
//! initialized exactly when the distance byte is not the sentinel.
//!
//! Removal uses backward-shift deletion: after clearing the matched slot,
//! every entry directly behind it that is not already at its home moves one
//! slot toward it. This restores the distance invariant in place and keeps
//! lookups immune to delete-heavy workloads.
//!
//! The table grows (doubling) when an insertion would push the live count
//! past `capacity * load_factor`, or when an insertion exhausts the probe
//! budget. Growth re-homes every entry through the normal insertion walk; if
//! the larger table still cannot place an entry within its window, growth
//! recurses. Removal never shrinks the table.
//!
//! Hashing and key equality are decided by a [`KeyQuery`] hook chosen at
//! construction time and monomorphized into the probe loop, so the equality
//! check inlines instead of going through dynamic dispatch per slot. See
//! [`crate::hash_map`] for the general dialect (hasher + comparator) and
//! [`crate::int_map`] for the numeric dialect (identity hash, hash
//! equality).
//!
//! A hash function that assigns the same 32-bit hash to more keys than the
//! probe window can hold defeats the resize escape valve: the table would
//! grow without bound trying to separate entries that cannot be separated.
//! Both dialects document the resulting precondition on their hashers.

use alloc::alloc::handle_alloc_error;
use alloc::string::String;
use core::alloc::Layout;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

/// Multiplier for Fibonacci hashing: `floor(2^32 / phi)`.
const FIB_MULTIPLIER: u32 = 0x9E37_79B9;

/// Width of the hash word consumed by the multiply-shift mapping.
const HASH_BITS: u32 = 32;

/// Distance byte marking a vacant slot. Live entries never store a distance
/// above `MAX_PROBE_LIMIT - 1`, so this value is unreachable by the
/// protocol.
const EMPTY: u8 = 0xFF;

/// Hard cap on the probe window, regardless of capacity.
pub const MAX_PROBE_LIMIT: u8 = 15;

/// Smallest logical capacity; requested capacities are rounded up to a power
/// of two of at least this size.
pub const MIN_CAPACITY: usize = 16;

/// Fraction of logical capacity that may be occupied before the table grows,
/// unless overridden at construction.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.88;

#[inline(always)]
fn probe_limit_for(capacity: usize) -> u8 {
    debug_assert!(capacity.is_power_of_two());
    capacity.trailing_zeros().min(MAX_PROBE_LIMIT as u32) as u8
}

#[inline(always)]
fn max_pop_for(capacity: usize, load_factor: f32) -> usize {
    (capacity as f32 * load_factor) as usize
}

/// Decides how keys are hashed and how a probe walk tests equality.
///
/// The hook is fixed when the table is constructed and is generic rather
/// than boxed, so the comparison inlines into the probe loop.
pub trait KeyQuery<K> {
    /// Whether a lookup walk may stop once a slot's stored distance falls
    /// below the scan offset.
    ///
    /// Under Robin Hood ordering such a slot belongs to a later home group:
    /// had the queried key been present, it would have displaced the
    /// occupant during insertion. The numeric dialect enables this; the
    /// general dialect leaves it off and relies on the empty-slot
    /// termination alone, matching its per-key comparator semantics.
    const DISTANCE_CUTOFF: bool;

    /// Produces the full 32-bit hash for a key.
    fn hash(&self, key: &K) -> u32;

    /// Tests whether an occupied slot holding `stored` matches the queried
    /// key.
    fn is_match(&self, query: &K, query_hash: u32, stored: &K) -> bool;
}

/// Error returned by [`HashTable::fetch`] when the key has no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyNotFound;

impl core::fmt::Display for KeyNotFound {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("key not found")
    }
}

impl core::error::Error for KeyNotFound {}

/// One slot of the backing array.
///
/// The distance byte doubles as the occupancy tag: `EMPTY` means vacant,
/// anything else is the entry's distance from its home slot and implies
/// `entry` is initialized.
struct Slot<K, V> {
    distance: u8,
    entry: MaybeUninit<(K, V)>,
}

fn slots_layout<K, V>(total: usize) -> Layout {
    Layout::array::<Slot<K, V>>(total).expect("allocation size overflow")
}

/// Allocates `total` slots, all marked vacant.
fn allocate_slots<K, V>(total: usize) -> NonNull<Slot<K, V>> {
    let layout = slots_layout::<K, V>(total);
    // SAFETY: `total` is at least `MIN_CAPACITY` and a slot is at least one
    // byte, so the layout size is non-zero. Allocation failure is handled
    // before the pointer is used.
    unsafe {
        let raw = alloc::alloc::alloc(layout) as *mut Slot<K, V>;
        if raw.is_null() {
            handle_alloc_error(layout);
        }

        for index in 0..total {
            raw.add(index).write(Slot {
                distance: EMPTY,
                entry: MaybeUninit::uninit(),
            });
        }

        NonNull::new_unchecked(raw)
    }
}

/// Releases an array previously produced by [`allocate_slots`].
///
/// # Safety
///
/// `slots` must have been allocated by [`allocate_slots`] with the same
/// `total`, and must not be used afterwards. Occupied entries are not
/// dropped; the caller must have moved them out or dropped them first.
unsafe fn deallocate_slots<K, V>(slots: NonNull<Slot<K, V>>, total: usize) {
    // SAFETY: The caller guarantees the pointer and layout match the
    // original allocation.
    unsafe {
        alloc::alloc::dealloc(slots.as_ptr() as *mut u8, slots_layout::<K, V>(total));
    }
}

/// A Robin Hood hash table with a bounded probe window.
///
/// `HashTable<K, V, Q>` stores key-value pairs and resolves hashing and
/// equality through the [`KeyQuery`] hook `Q`, fixed at construction. Most
/// callers want one of the dialects built on top of it,
/// [`HashMap`](crate::HashMap) or [`IntMap`](crate::IntMap), and only drop
/// down to this type to supply a custom hook.
///
/// ## Performance Characteristics
///
/// - **Memory**: 1 byte per slot overhead, plus the size of `(K, V)`.
/// - **Lookup/update/removal**: at most `probe_limit` slot comparisons.
/// - **Insertion**: amortized `O(probe_limit)`; a growth rebuild is linear
///   in the table size.
pub struct HashTable<K, V, Q> {
    slots: NonNull<Slot<K, V>>,
    /// Logical capacity: a power of two, at least [`MIN_CAPACITY`]. Homes
    /// are always below this; the array extends `probe_limit` slots past
    /// it.
    capacity: usize,
    probe_limit: u8,
    /// Precomputed `HASH_BITS - log2(capacity)`.
    shift: u32,
    populated: usize,
    /// Live-entry count at which the next insertion grows the table.
    max_pop: usize,
    load_factor: f32,
    query: Q,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, Q> Debug for HashTable<K, V, Q> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut distances = String::with_capacity(self.total_slots());
        for slot in self.slots() {
            if slot.distance == EMPTY {
                distances.push('.');
            } else {
                distances.push(char::from_digit(slot.distance as u32, 16).unwrap_or('?'));
            }
        }

        f.debug_struct("HashTable")
            .field("populated", &self.populated)
            .field("capacity", &self.capacity)
            .field("probe_limit", &self.probe_limit)
            .field("distances", &distances)
            .finish()
    }
}

impl<K, V, Q> Clone for HashTable<K, V, Q>
where
    K: Clone,
    V: Clone,
    Q: Clone,
{
    fn clone(&self) -> Self {
        let total = self.total_slots();
        let slots = allocate_slots::<K, V>(total);

        // SAFETY: `slots` is a fresh allocation of the same length as the
        // source array, with every distance byte set to `EMPTY`. Source
        // slots with a non-sentinel distance are initialized, making
        // `assume_init_ref` safe; the destination entry is vacant, making
        // `write` safe.
        unsafe {
            let dst = core::slice::from_raw_parts_mut(slots.as_ptr(), total);
            for (dst, src) in dst.iter_mut().zip(self.slots()) {
                if src.distance != EMPTY {
                    dst.distance = src.distance;
                    dst.entry.write(src.entry.assume_init_ref().clone());
                }
            }
        }

        Self {
            slots,
            capacity: self.capacity,
            probe_limit: self.probe_limit,
            shift: self.shift,
            populated: self.populated,
            max_pop: self.max_pop,
            load_factor: self.load_factor,
            query: self.query.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K, V, Q> Drop for HashTable<K, V, Q> {
    fn drop(&mut self) {
        if core::mem::needs_drop::<(K, V)>() && self.populated > 0 {
            for slot in self.slots_mut() {
                if slot.distance != EMPTY {
                    // SAFETY: a non-sentinel distance marks the entry
                    // initialized.
                    unsafe {
                        slot.entry.assume_init_drop();
                    }
                }
            }
        }

        // SAFETY: `self.slots` was produced by `allocate_slots` with
        // `total_slots()` slots and is not used after this point. All live
        // entries were dropped above.
        unsafe {
            deallocate_slots(self.slots, self.total_slots());
        }
    }
}

impl<K, V, Q> HashTable<K, V, Q> {
    #[inline(always)]
    fn total_slots(&self) -> usize {
        self.capacity + self.probe_limit as usize
    }

    #[inline(always)]
    fn slots(&self) -> &[Slot<K, V>] {
        // SAFETY: `self.slots` points to a live allocation of exactly
        // `total_slots()` slots.
        unsafe { core::slice::from_raw_parts(self.slots.as_ptr(), self.total_slots()) }
    }

    #[inline(always)]
    fn slots_mut(&mut self) -> &mut [Slot<K, V>] {
        // SAFETY: `self.slots` points to a live allocation of exactly
        // `total_slots()` slots, and `&mut self` guarantees exclusivity.
        unsafe { core::slice::from_raw_parts_mut(self.slots.as_ptr(), self.total_slots()) }
    }

    /// Returns the number of live entries in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table contains no entries.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the length of the backing slot array.
    ///
    /// This includes the probe-window pad past the logical capacity, so the
    /// value is `logical_capacity + probe_limit`. It is not the number of
    /// entries the table can hold before growing; the load factor governs
    /// that.
    pub fn capacity(&self) -> usize {
        self.total_slots()
    }

    /// Returns the hard upper bound on any probe walk at the current
    /// capacity.
    pub fn probe_limit(&self) -> u8 {
        self.probe_limit
    }

    /// Returns the load factor the table was constructed with.
    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }

    /// Removes all entries from the table.
    ///
    /// The allocated capacity is preserved. All keys and values are
    /// dropped.
    pub fn clear(&mut self) {
        if self.populated == 0 {
            return;
        }

        for slot in self.slots_mut() {
            if slot.distance != EMPTY {
                slot.distance = EMPTY;
                if core::mem::needs_drop::<(K, V)>() {
                    // SAFETY: the slot was occupied, so the entry is
                    // initialized; the distance byte is reset first so a
                    // panicking destructor cannot cause a double drop.
                    unsafe {
                        slot.entry.assume_init_drop();
                    }
                }
            }
        }

        self.populated = 0;
    }
}

impl<K, V, Q> HashTable<K, V, Q>
where
    Q: KeyQuery<K>,
{
    /// Creates an empty table with the default capacity and load factor.
    pub fn with_query(query: Q) -> Self {
        Self::with_capacity_and_query(MIN_CAPACITY, query)
    }

    /// Creates an empty table sized for `capacity` with the default load
    /// factor.
    ///
    /// The capacity is rounded up to a power of two, with a floor of
    /// [`MIN_CAPACITY`]; zero is accepted and coerced to the minimum.
    pub fn with_capacity_and_query(capacity: usize, query: Q) -> Self {
        Self::with_capacity_and_load_factor(capacity, DEFAULT_LOAD_FACTOR, query)
    }

    /// Creates an empty table with explicit capacity and load factor.
    ///
    /// # Panics
    ///
    /// Panics if `load_factor` is not strictly between 0 and 1.
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f32, query: Q) -> Self {
        assert!(
            load_factor > 0.0 && load_factor < 1.0,
            "load factor must be strictly between 0 and 1"
        );

        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        let probe_limit = probe_limit_for(capacity);

        Self {
            slots: allocate_slots::<K, V>(capacity + probe_limit as usize),
            capacity,
            probe_limit,
            shift: HASH_BITS - capacity.trailing_zeros(),
            populated: 0,
            max_pop: max_pop_for(capacity, load_factor),
            load_factor,
            query,
            _marker: PhantomData,
        }
    }

    /// Maps a hash to its home slot: the top `log2(capacity)` bits of the
    /// Fibonacci product. Always below `capacity`.
    #[inline(always)]
    fn home_index(&self, hash: u32) -> usize {
        (hash.wrapping_mul(FIB_MULTIPLIER) >> self.shift) as usize
    }

    /// Scans the probe window for `key`, returning the matching slot index.
    ///
    /// The window is `[home, home + probe_limit)`. An empty slot always
    /// ends the scan: a present key cannot lie beyond one. Hooks with
    /// [`DISTANCE_CUTOFF`](KeyQuery::DISTANCE_CUTOFF) additionally stop at
    /// the first slot whose stored distance falls below the scan offset:
    /// such a slot belongs to a later home group, and a present key would
    /// have displaced it during insertion.
    #[inline(always)]
    fn probe(&self, key: &K, hash: u32) -> Option<usize> {
        let home = self.home_index(hash);
        let slots = self.slots();

        for offset in 0..self.probe_limit as usize {
            // SAFETY: `home < capacity` and `offset < probe_limit`, so the
            // index is below `capacity + probe_limit`, the slice length.
            let slot = unsafe { slots.get_unchecked(home + offset) };
            if slot.distance == EMPTY {
                return None;
            }
            if Q::DISTANCE_CUTOFF && (slot.distance as usize) < offset {
                return None;
            }

            // SAFETY: a non-sentinel distance marks the entry initialized.
            let stored = unsafe { slot.entry.assume_init_ref() };
            if self.query.is_match(key, hash, &stored.0) {
                return Some(home + offset);
            }
        }

        None
    }

    /// Returns a reference to the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        if self.populated == 0 {
            return None;
        }

        let hash = self.query.hash(key);
        let index = self.probe(key, hash)?;
        // SAFETY: `probe` only returns occupied, in-bounds indices.
        Some(unsafe { &self.slots().get_unchecked(index).entry.assume_init_ref().1 })
    }

    /// Returns a mutable reference to the value stored for `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.populated == 0 {
            return None;
        }

        let hash = self.query.hash(key);
        let index = self.probe(key, hash)?;
        // SAFETY: `probe` only returns occupied, in-bounds indices.
        Some(unsafe {
            &mut self
                .slots_mut()
                .get_unchecked_mut(index)
                .entry
                .assume_init_mut()
                .1
        })
    }

    /// Returns a reference to the value stored for `key`, or
    /// [`KeyNotFound`] if the key has no entry.
    ///
    /// This is the failure-signaling read; use [`get`](Self::get) when
    /// absence is an expected outcome rather than an error.
    pub fn fetch(&self, key: &K) -> Result<&V, KeyNotFound> {
        self.get(key).ok_or(KeyNotFound)
    }

    /// Returns `true` if the table contains an entry for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Inserts a key-value pair, returning `true` if it was inserted.
    ///
    /// If the key is already present the table is left untouched and
    /// `false` is returned: insertion is not an upsert. Use
    /// [`update`](Self::update) to overwrite an existing value.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        // Grow before probing so the live count never exceeds
        // `capacity * load_factor` once the insertion lands.
        if self.populated >= self.max_pop || self.populated >= self.capacity {
            self.grow();
        }

        let hash = self.query.hash(&key);
        if self.probe(&key, hash).is_some() {
            return false;
        }

        self.insert_unique(hash, key, value);
        true
    }

    /// Overwrites the value stored for `key` in place.
    ///
    /// If the key is absent this is a silent no-op: update never inserts.
    pub fn update(&mut self, key: &K, value: V) {
        let hash = self.query.hash(key);
        if let Some(index) = self.probe(key, hash) {
            // SAFETY: `probe` only returns occupied, in-bounds indices. The
            // assignment drops the previous value.
            unsafe {
                self.slots_mut()
                    .get_unchecked_mut(index)
                    .entry
                    .assume_init_mut()
                    .1 = value;
            }
        }
    }

    /// Removes the entry stored for `key`.
    ///
    /// If the key is absent this is a silent no-op. Removal never shrinks
    /// the table.
    pub fn remove(&mut self, key: &K) {
        if self.populated == 0 {
            return;
        }

        let hash = self.query.hash(key);
        if let Some(index) = self.probe(key, hash) {
            self.remove_at(index);
        }
    }

    /// Grows the table until it can hold `additional` more entries without
    /// resizing.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.populated.saturating_add(additional);
        let mut capacity = self.capacity;
        while max_pop_for(capacity, self.load_factor) < required {
            capacity = capacity.checked_mul(2).expect("capacity overflow");
        }
        if capacity > self.capacity {
            self.grow_to(capacity);
        }
    }

    /// Robin Hood emplacement of a key known to be absent.
    ///
    /// Used by both insertion (after the presence check) and the growth
    /// rebuild (where the old table's invariants guarantee uniqueness).
    fn insert_unique(&mut self, hash: u32, key: K, value: V) {
        let mut index = self.home_index(hash);
        let mut distance = 0u8;
        let mut entry = (key, value);

        loop {
            if distance == self.probe_limit {
                // Probe budget exhausted. Grow and re-home the in-flight
                // entry, which may be a displaced occupant rather than the
                // original argument, so its hash must be recomputed.
                self.grow();
                let hash = self.query.hash(&entry.0);
                let (key, value) = entry;
                return self.insert_unique(hash, key, value);
            }

            // SAFETY: `index - distance` is the in-flight entry's home,
            // which is below `capacity`, and `distance < probe_limit`, so
            // `index` is below `capacity + probe_limit`.
            let slot = unsafe { self.slots_mut().get_unchecked_mut(index) };
            if slot.distance == EMPTY {
                slot.distance = distance;
                slot.entry.write(entry);
                self.populated += 1;
                return;
            }

            if distance > slot.distance {
                // Take from the rich: the occupant sits closer to its home
                // than the candidate, so the candidate claims the slot and
                // the displaced occupant continues the walk. Ties keep the
                // incumbent.
                // SAFETY: the slot is occupied, so the entry is
                // initialized.
                let occupant = unsafe { slot.entry.assume_init_mut() };
                core::mem::swap(occupant, &mut entry);
                core::mem::swap(&mut slot.distance, &mut distance);
            }

            index += 1;
            distance += 1;
        }
    }

    /// Clears the slot at `index` and backshifts the run behind it.
    ///
    /// Every entry directly behind the hole whose distance is non-zero
    /// moves one slot toward its home with its distance decremented,
    /// restoring the `distance == index - home` invariant without
    /// tombstones. The shift target is always the slot immediately behind
    /// the entry being moved. The run ends at the first vacant slot or the
    /// first entry already at its home.
    fn remove_at(&mut self, index: usize) {
        let total = self.total_slots();

        {
            let slots = self.slots_mut();

            // SAFETY: `index` came from a successful probe, so it is in
            // bounds and occupied.
            unsafe {
                let slot = slots.get_unchecked_mut(index);
                slot.distance = EMPTY;
                slot.entry.assume_init_drop();
            }

            let mut next = index + 1;
            while next < total {
                // SAFETY: `next < total` by the loop condition, and
                // `next - 1` was vacated by the previous iteration (or is
                // the cleared `index` itself).
                unsafe {
                    let distance = slots.get_unchecked(next).distance;
                    if distance == EMPTY || distance == 0 {
                        break;
                    }

                    let entry = slots.get_unchecked_mut(next).entry.assume_init_read();
                    let hole = slots.get_unchecked_mut(next - 1);
                    hole.distance = distance - 1;
                    hole.entry.write(entry);
                    slots.get_unchecked_mut(next).distance = EMPTY;
                }
                next += 1;
            }
        }

        self.populated -= 1;
    }

    /// Doubles the logical capacity.
    fn grow(&mut self) {
        let new_capacity = self.capacity.checked_mul(2).expect("capacity overflow");
        self.grow_to(new_capacity);
    }

    /// Rebuilds the table at `new_capacity`, re-homing every live entry.
    ///
    /// One more hash bit feeds the home index after each doubling, so every
    /// entry must be re-inserted through the normal walk. The walk may
    /// itself exhaust the new probe budget mid-rebuild; `insert_unique`
    /// then grows again, and the remaining entries drain into whichever
    /// table is current. The old array is released as soon as it is empty.
    fn grow_to(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity.is_power_of_two() && new_capacity > self.capacity);

        let old_slots = self.slots;
        let old_total = self.total_slots();

        let probe_limit = probe_limit_for(new_capacity);
        self.slots = allocate_slots::<K, V>(new_capacity + probe_limit as usize);
        self.capacity = new_capacity;
        self.probe_limit = probe_limit;
        self.shift = HASH_BITS - new_capacity.trailing_zeros();
        self.max_pop = max_pop_for(new_capacity, self.load_factor);
        self.populated = 0;

        // SAFETY: `old_slots` is the previous allocation of `old_total`
        // slots; occupied entries are moved out exactly once (the old
        // distance bytes are never consulted again) and the array is then
        // released without running destructors for the moved-out contents.
        unsafe {
            for index in 0..old_total {
                let slot = &*old_slots.as_ptr().add(index);
                if slot.distance != EMPTY {
                    let (key, value) = slot.entry.assume_init_read();
                    let hash = self.query.hash(&key);
                    self.insert_unique(hash, key, value);
                }
            }

            deallocate_slots(old_slots, old_total);
        }
    }
}

impl<K, V, Q> Default for HashTable<K, V, Q>
where
    Q: KeyQuery<K> + Default,
{
    fn default() -> Self {
        Self::with_query(Q::default())
    }
}

impl<K, V, Q> core::ops::Index<&K> for HashTable<K, V, Q>
where
    Q: KeyQuery<K>,
{
    type Output = V;

    fn index(&self, key: &K) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("no entry found for key"),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::int_map::IntQuery;

    #[derive(Clone)]
    struct SipQuery {
        k0: u64,
        k1: u64,
    }

    impl SipQuery {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }
    }

    impl KeyQuery<u64> for SipQuery {
        const DISTANCE_CUTOFF: bool = false;

        fn hash(&self, key: &u64) -> u32 {
            let mut hasher = SipHasher::new_with_keys(self.k0, self.k1);
            hasher.write_u64(*key);
            let hash = hasher.finish();
            (hash ^ (hash >> 32)) as u32
        }

        fn is_match(&self, query: &u64, _query_hash: u32, stored: &u64) -> bool {
            query == stored
        }
    }

    /// Checks the structural invariants over the whole slot array: distance
    /// bookkeeping, window bounds, the no-gap rule, and the live count.
    fn audit<K, V, Q: KeyQuery<K>>(table: &HashTable<K, V, Q>) {
        let slots = table.slots();
        let mut live = 0;

        for (index, slot) in slots.iter().enumerate() {
            if slot.distance == EMPTY {
                continue;
            }
            live += 1;

            assert!(
                slot.distance < table.probe_limit,
                "distance {} at {} exceeds the probe budget: {:?}",
                slot.distance,
                index,
                table
            );

            let key = unsafe { &slot.entry.assume_init_ref().0 };
            let home = table.home_index(table.query.hash(key));
            assert_eq!(
                home + slot.distance as usize,
                index,
                "stored distance disagrees with home: {:?}",
                table
            );

            if index > 0 {
                let prev = &slots[index - 1];
                if prev.distance == EMPTY {
                    assert_eq!(
                        slot.distance, 0,
                        "occupied slot after a gap must be at home: {:?}",
                        table
                    );
                } else {
                    assert!(
                        slot.distance <= prev.distance + 1,
                        "distance may rise by at most one per slot: {:?}",
                        table
                    );
                }
            }
        }

        assert_eq!(live, table.len());
    }

    #[test]
    fn capacity_is_normalized() {
        let table: HashTable<u64, u64, SipQuery> =
            HashTable::with_capacity_and_query(0, SipQuery::default());
        assert_eq!(table.capacity(), 16 + 4);
        assert_eq!(table.probe_limit(), 4);

        let table: HashTable<u64, u64, SipQuery> =
            HashTable::with_capacity_and_query(100, SipQuery::default());
        assert_eq!(table.capacity(), 128 + 7);

        let table: HashTable<u64, u64, SipQuery> =
            HashTable::with_capacity_and_query(1 << 20, SipQuery::default());
        assert_eq!(table.probe_limit(), MAX_PROBE_LIMIT);
        assert_eq!(table.capacity(), (1 << 20) + 15);
    }

    #[test]
    #[should_panic(expected = "load factor")]
    fn rejects_bad_load_factor() {
        let _ =
            HashTable::<u64, u64, _>::with_capacity_and_load_factor(16, 1.5, SipQuery::default());
    }

    #[test]
    fn insert_and_get() {
        let mut table = HashTable::with_query(SipQuery::default());

        for key in 0..1000u64 {
            assert!(table.insert(key, key * 2), "{:?}", table);
        }
        assert_eq!(table.len(), 1000);
        audit(&table);

        for key in 0..1000u64 {
            assert_eq!(table.get(&key), Some(&(key * 2)), "{:?}", table);
        }
        assert_eq!(table.get(&1000), None);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut table = HashTable::with_query(SipQuery::default());

        assert!(table.insert(42, 1));
        assert!(!table.insert(42, 2));
        assert_eq!(table.len(), 1);
        // The original value survives; insertion is not an upsert.
        assert_eq!(table.get(&42), Some(&1));
    }

    #[test]
    fn update_overwrites_present_keys_only() {
        let mut table = HashTable::with_query(SipQuery::default());

        table.insert(5, "x");
        table.update(&5, "y");
        assert_eq!(table.get(&5), Some(&"y"));

        table.update(&99, "z");
        assert_eq!(table.get(&99), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_is_a_noop_for_absent_keys() {
        let mut table = HashTable::with_query(SipQuery::default());
        table.insert(1, 1);

        table.remove(&2);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&1), Some(&1));
    }

    #[test]
    fn remove_backshifts_the_run() {
        let mut table = HashTable::with_query(SipQuery::default());

        for key in 0..200u64 {
            table.insert(key, key);
        }
        for key in (0..200u64).step_by(3) {
            table.remove(&key);
            audit(&table);
        }

        for key in 0..200u64 {
            if key % 3 == 0 {
                assert_eq!(table.get(&key), None, "{:?}", table);
            } else {
                assert_eq!(table.get(&key), Some(&key), "{:?}", table);
            }
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn growth_preserves_entries() {
        let mut table: HashTable<u64, u64, SipQuery> =
            HashTable::with_capacity_and_query(16, SipQuery::default());

        for key in 0..5000u64 {
            assert!(table.insert(key, !key));
        }
        audit(&table);

        assert_eq!(table.len(), 5000);
        for key in 0..5000u64 {
            assert_eq!(table.get(&key), Some(&!key));
        }
    }

    #[test]
    fn load_factor_trigger_fires_before_the_insert_lands() {
        // Identity hashing makes the walk deterministic: keys 0..14 spread
        // over distinct homes (one collision at distance 1), so growth
        // cannot fire early from the probe budget.
        let mut table: HashTable<u32, u32, IntQuery> =
            HashTable::with_capacity_and_query(16, IntQuery);

        for key in 0..14u32 {
            assert!(table.insert(key, key));
            assert_eq!(table.capacity(), 16 + 4, "{:?}", table);
        }

        // floor(16 * 0.88) = 14, so the 15th insertion grows first.
        assert!(table.insert(14, 14));
        assert_eq!(table.capacity(), 32 + 5, "{:?}", table);
        assert_eq!(table.len(), 15);
        audit(&table);
    }

    #[test]
    fn probe_budget_overflow_grows_the_table() {
        let mut table: HashTable<u32, u32, IntQuery> =
            HashTable::with_capacity_and_query(16, IntQuery);

        // Five keys sharing one home cannot fit a probe window of four, so
        // the fifth insertion must grow the table.
        let crowded: Vec<u32> = (0u32..)
            .filter(|key| key.wrapping_mul(FIB_MULTIPLIER) >> 28 == 0)
            .take(5)
            .collect();

        for &key in &crowded {
            assert!(table.insert(key, key), "{:?}", table);
        }

        assert_eq!(table.capacity(), 32 + 5, "{:?}", table);
        audit(&table);
        for &key in &crowded {
            assert_eq!(table.get(&key), Some(&key), "{:?}", table);
        }
    }

    #[test]
    fn reserve_sizes_for_the_requested_load() {
        let mut table: HashTable<u64, u64, SipQuery> =
            HashTable::with_capacity_and_query(16, SipQuery::default());

        table.reserve(1000);
        assert!(table.capacity() >= 1000);
        // The reserved capacity already satisfies the load-factor trigger
        // for the requested count.
        assert!(table.max_pop >= 1000);

        for key in 0..1000u64 {
            table.insert(key, key);
        }
        assert_eq!(table.len(), 1000);
        audit(&table);
    }

    #[test]
    fn clear_drops_entries_and_keeps_capacity() {
        let mut table: HashTable<u64, String, SipQuery> =
            HashTable::with_query(SipQuery::default());

        for key in 0..100u64 {
            table.insert(key, key.to_string());
        }
        let capacity = table.capacity();

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), capacity);
        assert_eq!(table.get(&7), None);

        // The table remains usable after clearing.
        assert!(table.insert(7, "seven".to_string()));
        assert_eq!(table.get(&7), Some(&"seven".to_string()));
        audit(&table);
    }

    #[test]
    fn fetch_distinguishes_absence() {
        let mut table = HashTable::with_query(SipQuery::default());
        table.insert(1, "one");

        assert_eq!(table.fetch(&1), Ok(&"one"));
        assert_eq!(table.fetch(&2), Err(KeyNotFound));
    }

    #[test]
    fn index_reads_present_keys() {
        let mut table = HashTable::with_query(SipQuery::default());
        table.insert(1, "one");
        assert_eq!(table[&1], "one");
    }

    #[test]
    #[should_panic(expected = "no entry found for key")]
    fn index_panics_on_absent_keys() {
        let table: HashTable<u64, &str, SipQuery> = HashTable::with_query(SipQuery::default());
        let _ = table[&1];
    }

    #[test]
    fn clone_is_independent() {
        let mut table: HashTable<u64, String, SipQuery> =
            HashTable::with_query(SipQuery::default());
        for key in 0..50u64 {
            table.insert(key, key.to_string());
        }

        let snapshot = table.clone();
        table.update(&7, "changed".to_string());
        table.remove(&8);

        assert_eq!(snapshot.len(), 50);
        assert_eq!(snapshot.get(&7), Some(&"7".to_string()));
        assert_eq!(snapshot.get(&8), Some(&"8".to_string()));
        audit(&snapshot);
    }

    #[test]
    fn insert_then_remove_restores_observable_state() {
        let mut table = HashTable::with_query(SipQuery::default());
        for key in 0..32u64 {
            table.insert(key, key);
        }
        let len = table.len();

        table.insert(777, 777);
        table.remove(&777);

        assert_eq!(table.len(), len);
        assert_eq!(table.get(&777), None);
        for key in 0..32u64 {
            assert_eq!(table.get(&key), Some(&key));
        }
        audit(&table);
    }

    #[test]
    fn churn_keeps_invariants() {
        let mut table = HashTable::with_query(SipQuery::default());

        for round in 0..10u64 {
            for key in 0..500u64 {
                table.insert(key, key + round);
            }
            for key in (0..500u64).step_by(2) {
                table.remove(&key);
            }
            audit(&table);
        }

        for key in (1..500u64).step_by(2) {
            assert!(table.contains_key(&key));
        }
    }
}
