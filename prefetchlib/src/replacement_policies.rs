use std::fmt::Debug;

use crate::cache::CacheLine;

/// A generic trait for implementing new replacement policies. A cache owns exactly one.
///
/// Policies may keep per-way state, but they never modify the lines themselves, only the cache
/// does that
pub trait ReplacementPolicy: Debug {
    /// Updates the policy after a line has been hit or installed
    ///
    /// The line holding `tag` is always resident in `set` when this is called
    ///
    /// # Arguments
    ///
    /// * `set`: The lines of the set, in way order
    /// * `set_index`: The index of the set within the cache
    /// * `tag`: The tag of the line which was accessed
    ///
    /// returns: ()
    fn record_access(&mut self, set: &[CacheLine], set_index: usize, tag: u32);

    /// Used by the cache to pick a way to overwrite when a new line needs adding to a full set
    ///
    /// Only called when every line of the set is valid. The returned way must be in
    /// `0..set.len()`
    ///
    /// # Arguments
    ///
    /// * `set`: The lines of the set, in way order
    /// * `set_index`: The index of the set within the cache
    ///
    /// returns: usize
    fn eviction_index(&mut self, set: &[CacheLine], set_index: usize) -> usize;
}

fn resident_way(set: &[CacheLine], tag: u32) -> usize {
    set.iter()
        .position(|line| line.valid && line.tag == tag)
        .unwrap_or_else(|| panic!("tag {tag:#x} was recorded but isn't resident"))
}

/// Least Recently Used replacement policy
///
/// Each way keeps a logical timestamp. An accessed way is stamped one past the newest stamp in its
/// set, and the victim is the way with the oldest stamp, the lowest way winning ties
#[derive(Debug)]
pub struct LeastRecentlyUsed {
    last_used_times: Vec<u64>,
    associativity: usize,
}

impl LeastRecentlyUsed {
    pub fn new(sets: u32, associativity: u32) -> Self {
        let associativity = associativity as usize;
        Self {
            last_used_times: vec![0; sets as usize * associativity],
            associativity,
        }
    }

    fn set_times(&self, set_index: usize) -> &[u64] {
        let start = set_index * self.associativity;
        &self.last_used_times[start..start + self.associativity]
    }

    /// Oldest way among those `candidate` accepts
    fn oldest_where(&self, set_index: usize, candidate: impl Fn(usize) -> bool) -> Option<usize> {
        self.set_times(set_index)
            .iter()
            .enumerate()
            .filter(|(way, _time)| candidate(*way))
            .min_by_key(|(_way, time)| **time)
            .map(|(way, _time)| way)
    }
}

impl ReplacementPolicy for LeastRecentlyUsed {
    fn record_access(&mut self, set: &[CacheLine], set_index: usize, tag: u32) {
        let way = resident_way(set, tag);
        let now = self.set_times(set_index).iter().max().copied().unwrap_or(0) + 1;
        self.last_used_times[set_index * self.associativity + way] = now;
    }

    fn eviction_index(&mut self, _set: &[CacheLine], set_index: usize) -> usize {
        self.oldest_where(set_index, |_| true).unwrap_or(0)
    }
}

/// LRU which avoids evicting modified lines
///
/// The victim is the least recently used clean line. Only when every line in the set is modified
/// does it fall back to plain LRU, saving a writeback whenever it can
#[derive(Debug)]
pub struct LruPreferClean {
    lru: LeastRecentlyUsed,
}

impl LruPreferClean {
    pub fn new(sets: u32, associativity: u32) -> Self {
        Self {
            lru: LeastRecentlyUsed::new(sets, associativity),
        }
    }
}

impl ReplacementPolicy for LruPreferClean {
    fn record_access(&mut self, set: &[CacheLine], set_index: usize, tag: u32) {
        self.lru.record_access(set, set_index, tag);
    }

    fn eviction_index(&mut self, set: &[CacheLine], set_index: usize) -> usize {
        self.lru
            .oldest_where(set_index, |way| !set[way].is_dirty())
            .unwrap_or_else(|| self.lru.eviction_index(set, set_index))
    }
}

/// Evicts a uniformly random way. Keeps no per-way state
///
/// The generator is owned by the policy, so a seeded policy makes the same choices every run
#[derive(Debug)]
pub struct RandomPolicy {
    rng: fastrand::Rng,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self {
            rng: fastrand::Rng::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn record_access(&mut self, _set: &[CacheLine], _set_index: usize, _tag: u32) {}

    fn eviction_index(&mut self, set: &[CacheLine], _set_index: usize) -> usize {
        self.rng.usize(0..set.len())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::cache::LineStatus;

    fn full_set(tags: &[u32]) -> Vec<CacheLine> {
        tags.iter()
            .map(|&tag| CacheLine {
                tag,
                valid: true,
                status: LineStatus::Valid,
            })
            .collect()
    }

    #[test]
    fn lru_evicts_the_oldest_way() {
        let set = full_set(&[10, 11, 12, 13]);
        let mut lru = LeastRecentlyUsed::new(2, 4);
        for tag in [12, 10, 13, 11] {
            lru.record_access(&set, 1, tag);
        }
        assert_eq!(lru.eviction_index(&set, 1), 2);
        lru.record_access(&set, 1, 12);
        assert_eq!(lru.eviction_index(&set, 1), 0);
    }

    #[test]
    fn lru_ties_go_to_the_lowest_way() {
        let set = full_set(&[1, 2, 3, 4]);
        let mut lru = LeastRecentlyUsed::new(1, 4);
        assert_eq!(lru.eviction_index(&set, 0), 0);
        lru.record_access(&set, 0, 1);
        assert_eq!(lru.eviction_index(&set, 0), 1);
    }

    #[test]
    fn lru_sets_are_independent() {
        let set = full_set(&[1, 2]);
        let mut lru = LeastRecentlyUsed::new(2, 2);
        lru.record_access(&set, 0, 1);
        lru.record_access(&set, 0, 2);
        lru.record_access(&set, 1, 2);
        assert_eq!(lru.eviction_index(&set, 0), 0);
        assert_eq!(lru.eviction_index(&set, 1), 0);
        lru.record_access(&set, 1, 1);
        assert_eq!(lru.eviction_index(&set, 1), 1);
    }

    #[test]
    #[should_panic]
    fn recording_a_missing_tag_panics() {
        let set = full_set(&[1, 2]);
        LeastRecentlyUsed::new(1, 2).record_access(&set, 0, 3);
    }

    #[test]
    fn prefer_clean_skips_recent_dirty_lines() {
        let mut set = full_set(&[1, 2, 3, 4]);
        let mut policy = LruPreferClean::new(1, 4);
        for tag in [1, 2, 3, 4] {
            policy.record_access(&set, 0, tag);
        }
        set[0].status = LineStatus::Modified;
        set[1].status = LineStatus::Modified;
        assert_eq!(policy.eviction_index(&set, 0), 2);
        // The newest line is still chosen when it is the only clean one
        set[2].status = LineStatus::Modified;
        assert_eq!(policy.eviction_index(&set, 0), 3);
    }

    #[test]
    fn prefer_clean_falls_back_to_lru() {
        let mut set = full_set(&[1, 2, 3, 4]);
        for line in &mut set {
            line.status = LineStatus::Modified;
        }
        let mut policy = LruPreferClean::new(1, 4);
        for tag in [3, 1, 4, 2] {
            policy.record_access(&set, 0, tag);
        }
        assert_eq!(policy.eviction_index(&set, 0), 2);
    }

    #[test]
    fn random_is_reproducible_with_a_seed() {
        let set = full_set(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut a = RandomPolicy::with_seed(42);
        let mut b = RandomPolicy::with_seed(42);
        for _ in 0..100 {
            assert_eq!(a.eviction_index(&set, 0), b.eviction_index(&set, 0));
        }
    }

    #[test]
    fn random_is_roughly_uniform() {
        const TRIALS: usize = 80_000;
        let set = full_set(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut policy = RandomPolicy::with_seed(0x5eed);
        let mut counts = [0usize; 8];
        for _ in 0..TRIALS {
            let way = policy.eviction_index(&set, 0);
            counts[way] += 1;
        }
        let expected = TRIALS / counts.len();
        for count in counts {
            // 10% either side is far outside the noise for this many trials
            assert!(count.abs_diff(expected) < expected / 10, "{counts:?}");
        }
    }
}
