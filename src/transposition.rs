//! Transposition table data structure.

use serde::Serialize;
use std::mem;

use crate::game::Move;

pub const DEFAULT_HASH_MB: usize = 64;
pub const MAX_HASH_MB: usize = 16 * 1024;
/// Slots inspected by `hashfull`; only this prefix of the table is sampled.
const HASHFULL_SAMPLE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// Score is the true value at the stored depth.
    Exact,
    /// Search failed high: true value is at least the score.
    Lower,
    /// Search failed low: true value is at most the score.
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtEntry {
    pub key: u64,
    pub depth: u8,
    pub score: i32,
    pub bound: Bound,
    pub best_move: Option<Move>,
    pub age: u32,
}

/// Result of `lookup_score`. The move is filled in whenever the position is
/// known, even if the score is not safe to reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtLookup {
    pub usable: bool,
    pub score: i32,
    pub best_move: Option<Move>,
}

impl TtLookup {
    const MISS: TtLookup = TtLookup {
        usable: false,
        score: 0,
        best_move: None,
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TtStats {
    pub hits: u64,
    pub probes: u64,
    pub stores: u64,
    pub collisions: u64,
    /// Occupancy of the sampled prefix, in permille.
    pub hashfull: u32,
    pub generation: u32,
    pub capacity: usize,
}

impl TtStats {
    /// Fraction of probes that produced a usable score.
    pub fn hit_rate(&self) -> f64 {
        if self.probes == 0 {
            0.0
        } else {
            self.hits as f64 / self.probes as f64
        }
    }
}

/// Direct-mapped table: one entry per slot, index = key mod capacity.
pub struct TranspositionTable {
    slots: Box<[Option<TtEntry>]>,
    generation: u32,
    hits: u64,
    probes: u64,
    stores: u64,
    collisions: u64,
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_MB)
    }
}

impl TranspositionTable {
    /// Table sized to a budget in megabytes, at most `MAX_HASH_MB`.
    pub fn new(size_mb: usize) -> Self {
        Self::with_bytes(size_mb.min(MAX_HASH_MB) * 1024 * 1024)
    }

    /// Table holding `bytes / size_of::<slot>()` slots, at least one.
    pub fn with_bytes(bytes: usize) -> Self {
        let capacity = (bytes / mem::size_of::<Option<TtEntry>>()).max(1);
        Self::with_capacity(capacity)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let slots = vec![None; capacity.max(1)].into_boxed_slice();
        Self {
            slots,
            generation: 0,
            hits: 0,
            probes: 0,
            stores: 0,
            collisions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    fn index(&self, key: u64) -> usize {
        (key % self.slots.len() as u64) as usize
    }

    /// Entry stored for exactly this key, if the slot still holds it.
    pub fn probe(&mut self, key: u64) -> Option<TtEntry> {
        self.probes += 1;
        let index = self.index(key);
        self.slots[index].filter(|entry| entry.key == key)
    }

    /// Reusable score for a node searched to `depth` with window `(alpha, beta)`.
    /// The score is usable only when the stored depth is sufficient and its bound
    /// cannot change the caller's decision; the move is reported regardless.
    pub fn lookup_score(&mut self, key: u64, depth: u8, alpha: i32, beta: i32) -> TtLookup {
        let Some(entry) = self.probe(key) else {
            return TtLookup::MISS;
        };
        let unusable = TtLookup {
            best_move: entry.best_move,
            ..TtLookup::MISS
        };
        if entry.depth < depth {
            return unusable;
        }

        let usable = match entry.bound {
            Bound::Exact => true,
            Bound::Lower => entry.score >= beta,
            Bound::Upper => entry.score <= alpha,
        };
        if !usable {
            return unusable;
        }

        self.hits += 1;
        TtLookup {
            usable: true,
            score: entry.score,
            best_move: entry.best_move,
        }
    }

    /// Store a search result. Replaces the slot when it is empty, holds an entry
    /// from an older search, or holds an entry searched no deeper than `depth`.
    pub fn store(&mut self, key: u64, depth: u8, score: i32, bound: Bound, best_move: Option<Move>) {
        let index = self.index(key);
        let replace = match &self.slots[index] {
            None => true,
            Some(existing) => existing.age < self.generation || existing.depth <= depth,
        };
        if !replace {
            return;
        }

        if let Some(existing) = &self.slots[index] {
            if existing.key != key {
                self.collisions += 1;
            }
        }
        self.slots[index] = Some(TtEntry {
            key,
            depth,
            score,
            bound,
            best_move,
            age: self.generation,
        });
        self.stores += 1;
    }

    /// Start a new search generation. Entries stay; older ones become replaceable.
    pub fn new_search(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.reset_counters();
    }

    /// Wipe every entry and counter.
    pub fn clear(&mut self) {
        self.slots.fill(None);
        self.generation = 0;
        self.reset_counters();
    }

    fn reset_counters(&mut self) {
        self.hits = 0;
        self.probes = 0;
        self.stores = 0;
        self.collisions = 0;
    }

    /// Permille of occupied slots among the first `HASHFULL_SAMPLE` slots.
    pub fn hashfull(&self) -> u32 {
        let sample = self.slots.len().min(HASHFULL_SAMPLE);
        let filled = self.slots[..sample].iter().filter(|s| s.is_some()).count();
        (filled * 1000 / sample) as u32
    }

    pub fn stats(&self) -> TtStats {
        TtStats {
            hits: self.hits,
            probes: self.probes,
            stores: self.stores,
            collisions: self.collisions,
            hashfull: self.hashfull(),
            generation: self.generation,
            capacity: self.slots.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Square;

    fn mv(from: &str, to: &str) -> Move {
        Move::new(Square::parse(from).unwrap(), Square::parse(to).unwrap())
    }

    #[test]
    fn test_capacity_from_byte_budget() {
        let slot = mem::size_of::<Option<TtEntry>>();
        assert_eq!(TranspositionTable::with_bytes(slot * 100).capacity(), 100);
        assert_eq!(TranspositionTable::with_bytes(0).capacity(), 1);
        assert_eq!(TranspositionTable::new(1).capacity(), 1024 * 1024 / slot);
    }

    #[test]
    fn test_store_then_probe_round_trip() {
        let mut tt = TranspositionTable::with_capacity(1024);
        let best = mv("e2", "e4");
        tt.store(77, 5, 120, Bound::Exact, Some(best));

        let entry = tt.probe(77).unwrap();
        assert_eq!(entry.depth, 5);
        assert_eq!(entry.score, 120);
        assert_eq!(entry.best_move, Some(best));

        for depth in 0..=5 {
            let hit = tt.lookup_score(77, depth, -50, 50);
            assert!(hit.usable);
            assert_eq!(hit.score, 120);
        }
    }

    #[test]
    fn test_probe_rejects_index_collision() {
        let mut tt = TranspositionTable::with_capacity(16);
        tt.store(3, 4, 10, Bound::Exact, None);
        // 19 maps to the same slot as 3
        assert!(tt.probe(19).is_none());
        assert!(!tt.lookup_score(19, 0, -100, 100).usable);
    }

    #[test]
    fn test_shallow_entry_returns_move_but_no_score() {
        let mut tt = TranspositionTable::with_capacity(64);
        let best = mv("g1", "f3");
        tt.store(5, 2, 40, Bound::Exact, Some(best));
        let lookup = tt.lookup_score(5, 3, -100, 100);
        assert!(!lookup.usable);
        assert_eq!(lookup.best_move, Some(best));
    }

    #[test]
    fn test_bound_rules() {
        let mut tt = TranspositionTable::with_capacity(64);
        tt.store(1, 4, 200, Bound::Lower, None);
        assert!(tt.lookup_score(1, 4, 0, 150).usable);
        assert!(tt.lookup_score(1, 4, 0, 200).usable);
        assert!(!tt.lookup_score(1, 4, 0, 250).usable);

        tt.store(2, 4, -30, Bound::Upper, None);
        assert!(tt.lookup_score(2, 4, 0, 100).usable);
        assert!(tt.lookup_score(2, 4, -30, 100).usable);
        assert!(!tt.lookup_score(2, 4, -60, 100).usable);
    }

    #[test]
    fn test_shallower_store_never_evicts_deeper_same_generation() {
        let mut tt = TranspositionTable::with_capacity(16);
        tt.store(4, 6, 99, Bound::Exact, None);
        tt.store(4, 3, 11, Bound::Exact, None);
        tt.store(20, 2, 11, Bound::Exact, None);
        let entry = tt.probe(4).unwrap();
        assert_eq!(entry.depth, 6);
        assert_eq!(entry.score, 99);
        assert_eq!(tt.stats().collisions, 0);

        // Equal depth replaces.
        tt.store(20, 6, 7, Bound::Lower, None);
        assert_eq!(tt.probe(20).unwrap().score, 7);
        assert_eq!(tt.stats().collisions, 1);
    }

    #[test]
    fn test_stale_generation_is_replaced() {
        let mut tt = TranspositionTable::with_capacity(16);
        tt.store(4, 9, 1, Bound::Exact, None);
        tt.new_search();
        tt.store(20, 1, 2, Bound::Upper, None);
        let entry = tt.probe(20).unwrap();
        assert_eq!(entry.depth, 1);
        assert_eq!(entry.age, 1);
    }

    #[test]
    fn test_new_search_keeps_entries_and_resets_counters() {
        let mut tt = TranspositionTable::with_capacity(64);
        tt.store(9, 3, 15, Bound::Exact, None);
        tt.lookup_score(9, 1, -10, 10);
        assert_eq!(tt.stats().hits, 1);

        tt.new_search();
        let stats = tt.stats();
        assert_eq!(stats.generation, 1);
        assert_eq!((stats.hits, stats.probes, stats.stores, stats.collisions), (0, 0, 0, 0));
        assert!(tt.probe(9).is_some());
    }

    #[test]
    fn test_clear_wipes_everything() {
        let mut tt = TranspositionTable::with_capacity(64);
        tt.store(9, 3, 15, Bound::Exact, None);
        tt.new_search();
        tt.clear();
        assert!(tt.probe(9).is_none());
        assert_eq!(tt.generation(), 0);
        assert_eq!(tt.hashfull(), 0);
    }

    #[test]
    fn test_hashfull_samples_prefix() {
        let mut tt = TranspositionTable::with_capacity(4000);
        for key in 0..500u64 {
            tt.store(key, 1, 0, Bound::Exact, None);
        }
        assert_eq!(tt.hashfull(), 500);
        // Slots past the sampled prefix are invisible to the estimate.
        tt.store(3500, 1, 0, Bound::Exact, None);
        assert_eq!(tt.hashfull(), 500);
    }

    #[test]
    fn test_hit_rate() {
        let mut tt = TranspositionTable::with_capacity(64);
        tt.store(1, 2, 0, Bound::Exact, None);
        tt.lookup_score(1, 1, 0, 0);
        tt.lookup_score(2, 1, 0, 0);
        let stats = tt.stats();
        assert_eq!(stats.probes, 2);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
