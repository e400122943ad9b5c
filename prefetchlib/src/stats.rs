use serde::{Deserialize, Serialize};

/// Counters collected over a simulation. They only ever increase
///
/// `accesses`, `hits` and `misses` count demand accesses only, so `hits + misses == accesses`
/// always holds. Accesses issued by a prefetcher are counted in `prefetch_accesses`, and the lines
/// they actually brought in are counted in `prefetched_lines`. Evictions and writebacks are
/// physical events and are counted whichever kind of access caused them
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct Statistics {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub writebacks: u64,
    pub prefetched_lines: u64,
    pub prefetch_accesses: u64,
}

impl Statistics {
    /// Fraction of demand accesses which hit, 0 if nothing has been accessed yet
    pub fn hit_ratio(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.accesses as f64
        }
    }

    pub fn miss_ratio(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.misses as f64 / self.accesses as f64
        }
    }
}
