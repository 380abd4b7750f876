//! The translation cache (C8, spec.md §4.8/§3): a fixed-size, direct-mapped
//! table of `N = 2^k` slots, one guest PC per slot, inserts evicting
//! whatever was there. Grounded on spec.md §3's entry/hashing description
//! directly — no teacher analogue exists in-pack for this exact shape.

const GOLDEN_RATIO: u64 = 0x9E37_79B9_7F4A_7C15;

/// `hash(pc)`: multiply by the 64-bit golden-ratio constant and take the
/// upper 32 bits (spec.md §3 "Hashing").
fn hash_pc(pc: u64) -> u32 {
    (pc.wrapping_mul(GOLDEN_RATIO) >> 32) as u32
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    guest_pc: u64,
    host_addr: usize,
    size: usize,
    hash: u32,
    counter: u32,
    valid: bool,
    hot: bool,
    linked: bool,
    /// The two chain-table slots spec.md §4.8's `Chain(from_pc, to_pc,
    /// slot_index ∈ {0,1})` addresses.
    chain: [Option<u64>; 2],
}

impl Slot {
    fn is_empty(&self) -> bool {
        !self.valid || self.host_addr == 0
    }
}

/// A live cache entry, as returned from a successful [`TranslationCache::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHit {
    pub host_addr: usize,
    pub size: usize,
    pub hot: bool,
}

/// Observable hit/miss/flush counters (spec.md §4.8: "hit/miss stats").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub flushes: u64,
}

pub struct TranslationCache {
    slots: Vec<Slot>,
    mask: usize,
    hot_threshold: u32,
    stats: CacheStats,
}

impl TranslationCache {
    /// `slots_log2 = k`: the table holds `2^k` direct-mapped slots.
    /// `hot_threshold` is the tunable a slot's hit counter must exceed to
    /// be considered hot (spec.md §4.8).
    pub fn new(slots_log2: u32, hot_threshold: u32) -> TranslationCache {
        let n = 1usize << slots_log2;
        TranslationCache {
            slots: vec![Slot::default(); n],
            mask: n - 1,
            hot_threshold,
            stats: CacheStats::default(),
        }
    }

    fn index_of(&self, pc: u64) -> (usize, u32) {
        let hash = hash_pc(pc);
        ((hash as usize) & self.mask, hash)
    }

    /// `Lookup(pc)` (spec.md §4.8).
    pub fn lookup(&mut self, pc: u64) -> Option<CacheHit> {
        let (index, _hash) = self.index_of(pc);
        let slot = &mut self.slots[index];
        if !slot.is_empty() && slot.guest_pc == pc {
            slot.counter += 1;
            slot.hot = slot.counter > self.hot_threshold;
            self.stats.hits += 1;
            Some(CacheHit {
                host_addr: slot.host_addr,
                size: slot.size,
                hot: slot.hot,
            })
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// `Insert(pc, host, size)` — overwrites the slot unconditionally
    /// (spec.md §4.8: "Any prior entry at that slot is considered
    /// logically deleted").
    pub fn insert(&mut self, pc: u64, host_addr: usize, size: usize) {
        let (index, hash) = self.index_of(pc);
        self.slots[index] = Slot {
            guest_pc: pc,
            host_addr,
            size,
            hash,
            counter: 1,
            valid: true,
            hot: false,
            linked: false,
            chain: [None, None],
        };
    }

    /// `Invalidate(pc)` — clears the slot only if it still holds `pc`.
    pub fn invalidate(&mut self, pc: u64) -> bool {
        let (index, _) = self.index_of(pc);
        let slot = &mut self.slots[index];
        if !slot.is_empty() && slot.guest_pc == pc {
            *slot = Slot::default();
            true
        } else {
            false
        }
    }

    /// `Flush()` — clears every slot and bumps the flush counter. Callers
    /// (the engine) are responsible for also resetting the arena cursor
    /// and for the stop-the-world discipline spec.md §5 requires.
    pub fn flush(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::default();
        }
        self.stats.flushes += 1;
    }

    /// `Chain(from_pc, to_pc, slot_index)` — records the destination so
    /// the optimiser (C9) can patch it in later.
    pub fn chain(&mut self, from_pc: u64, to_pc: u64, slot_index: usize) -> bool {
        debug_assert!(slot_index < 2);
        let (index, _) = self.index_of(from_pc);
        let slot = &mut self.slots[index];
        if slot.is_empty() || slot.guest_pc != from_pc {
            return false;
        }
        slot.chain[slot_index] = Some(to_pc);
        true
    }

    /// Mark a slot's `linked` flag (used by the block optimiser after a
    /// successful `link`/`unlink`).
    pub fn set_linked(&mut self, pc: u64, linked: bool) {
        let (index, _) = self.index_of(pc);
        let slot = &mut self.slots[index];
        if !slot.is_empty() && slot.guest_pc == pc {
            slot.linked = linked;
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup_round_trips() {
        let mut cache = TranslationCache::new(8, 50);
        cache.insert(0x401000, 0xBEEF_0000, 32);
        let hit = cache.lookup(0x401000).expect("hit");
        assert_eq!(hit.host_addr, 0xBEEF_0000);
        assert_eq!(hit.size, 32);
    }

    #[test]
    fn invalidate_clears_only_matching_pc() {
        let mut cache = TranslationCache::new(8, 50);
        cache.insert(0x401000, 1, 1);
        assert!(cache.invalidate(0x401000));
        assert!(cache.lookup(0x401000).is_none());
    }

    #[test]
    fn direct_mapped_collision_evicts_older_entry() {
        let mut cache = TranslationCache::new(4, 50); // 16 slots
        let pc1 = 0x401000u64;
        // Find a pc2 that collides with pc1's slot but differs in value.
        let (idx1, _) = cache.index_of(pc1);
        let mut pc2 = pc1 + 1;
        while cache.index_of(pc2).0 != idx1 {
            pc2 += 1;
        }
        cache.insert(pc1, 0x1000, 16);
        cache.insert(pc2, 0x2000, 16);
        assert!(cache.lookup(pc1).is_none());
        assert_eq!(cache.lookup(pc2).unwrap().host_addr, 0x2000);
    }

    #[test]
    fn flush_clears_every_slot_and_counts() {
        let mut cache = TranslationCache::new(4, 50);
        cache.insert(1, 0x1000, 4);
        cache.flush();
        assert!(cache.lookup(1).is_none());
        assert_eq!(cache.stats().flushes, 1);
    }
}
