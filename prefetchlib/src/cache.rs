use std::ops::Range;

use log::{debug, trace};

use crate::error::ConfigError;
use crate::prefetchers::Prefetcher;
use crate::replacement_policies::ReplacementPolicy;
use crate::stats::Statistics;

/// The kind of a memory reference
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operation {
    Read,
    Write,
}

/// State of a single cache line. `Modified` lines are written back when they are evicted
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum LineStatus {
    #[default]
    Invalid,
    Valid,
    Modified,
}

/// Metadata for one way of one set. Only the state is modelled, never the data
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct CacheLine {
    pub tag: u32,
    pub valid: bool,
    pub status: LineStatus,
}

impl CacheLine {
    fn installed(tag: u32, operation: Operation) -> Self {
        Self {
            tag,
            valid: true,
            status: match operation {
                Operation::Read => LineStatus::Valid,
                Operation::Write => LineStatus::Modified,
            },
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.status == LineStatus::Modified
    }
}

/// Whether an access found its line resident
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AccessResult {
    Hit,
    Miss,
}

impl AccessResult {
    pub fn is_miss(self) -> bool {
        self == AccessResult::Miss
    }
}

/// An address split into the set it maps to and the tag identifying its line within that set
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Addr {
    pub set: u32,
    pub tag: u32,
}

/// Shape of a cache. Every dimension is a positive power of two, which is checked on construction
/// so the address can be split with shifts and masks
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CacheGeometry {
    line_size: u32,
    sets: u32,
    associativity: u32,
}

impl CacheGeometry {
    pub fn new(line_size: u32, sets: u32, associativity: u32) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("line_size", line_size),
            ("sets", sets),
            ("associativity", associativity),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
            if !value.is_power_of_two() {
                return Err(ConfigError::NotPowerOfTwo {
                    field,
                    value: value as u64,
                });
            }
        }
        Ok(Self {
            line_size,
            sets,
            associativity,
        })
    }

    pub fn line_size(&self) -> u32 {
        self.line_size
    }

    pub fn sets(&self) -> u32 {
        self.sets
    }

    pub fn associativity(&self) -> u32 {
        self.associativity
    }

    /// Total number of lines, `sets * associativity`
    pub fn lines(&self) -> usize {
        self.sets as usize * self.associativity as usize
    }
}

/// The line array together with its replacement policy and counters
///
/// This is everything an access touches apart from the prefetcher, which is kept outside in
/// [`CacheSystem`] so a prefetcher can be handed a `&mut Cache` to issue its own accesses through.
/// A `Cache` on its own never prefetches
#[derive(Debug)]
pub struct Cache {
    geometry: CacheGeometry,
    offset_bits: u32,
    set_mask: u32,
    tag_shift: u32,
    lines: Vec<CacheLine>,
    policy: Box<dyn ReplacementPolicy>,
    stats: Statistics,
}

impl Cache {
    pub fn new(geometry: CacheGeometry, policy: Box<dyn ReplacementPolicy>) -> Self {
        let offset_bits = geometry.line_size.trailing_zeros();
        let set_bits = geometry.sets.trailing_zeros();
        debug!(
            "New cache: {} sets of {} ways, {} byte lines, policy {:?}",
            geometry.sets, geometry.associativity, geometry.line_size, policy
        );
        Self {
            geometry,
            offset_bits,
            set_mask: geometry.sets - 1,
            tag_shift: offset_bits + set_bits,
            lines: vec![CacheLine::default(); geometry.lines()],
            policy,
            stats: Statistics::default(),
        }
    }

    /// Splits an address into its set index and tag. The offset within the line is dropped, the
    /// cache only ever deals in whole lines
    pub fn split_address(&self, address: u32) -> Addr {
        // Shifting a u32 by 32 overflows, which happens when a single set spans the whole space
        let tag = address.checked_shr(self.tag_shift).unwrap_or(0);
        Addr {
            set: (address >> self.offset_bits) & self.set_mask,
            tag,
        }
    }

    fn set_range(&self, set: u32) -> Range<usize> {
        let ways = self.geometry.associativity as usize;
        let start = set as usize * ways;
        start..start + ways
    }

    /// The lines of a single set, in way order
    pub fn set(&self, set: u32) -> &[CacheLine] {
        &self.lines[self.set_range(set)]
    }

    /// Looks up an address, installing its line on a miss
    ///
    /// On a hit the line becomes modified if this is a write. On a miss a free way is used if the
    /// set has one, otherwise the replacement policy picks a victim. Either way the policy is told
    /// about the line afterwards, so its state always reflects the line actually resident.
    ///
    /// `is_prefetch` marks accesses issued by a prefetcher. They update the line array and policy
    /// exactly like demand accesses, but are counted separately
    ///
    /// # Arguments
    ///
    /// * `address`: The byte address of the reference
    /// * `operation`: Whether the reference reads or writes
    /// * `is_prefetch`: True only for speculative accesses issued by a prefetcher
    ///
    /// returns: AccessResult
    pub fn access(&mut self, address: u32, operation: Operation, is_prefetch: bool) -> AccessResult {
        let Addr { set, tag } = self.split_address(address);
        let range = self.set_range(set);
        if is_prefetch {
            self.stats.prefetch_accesses += 1;
        } else {
            self.stats.accesses += 1;
        }

        let mut matching = self.lines[range.clone()]
            .iter()
            .enumerate()
            .filter(|(_way, line)| line.valid && line.tag == tag)
            .map(|(way, _line)| way);
        let hit = matching.next();
        assert!(
            matching.next().is_none(),
            "tag {tag:#x} is resident more than once in set {set}"
        );

        if let Some(way) = hit {
            if !is_prefetch {
                self.stats.hits += 1;
            }
            if operation == Operation::Write {
                self.lines[range.start + way].status = LineStatus::Modified;
            }
            self.policy
                .record_access(&self.lines[range], set as usize, tag);
            return AccessResult::Hit;
        }

        if !is_prefetch {
            self.stats.misses += 1;
        }
        let set_lines = &self.lines[range.clone()];
        let way = match set_lines.iter().position(|line| !line.valid) {
            // Free way, nothing to evict
            Some(way) => way,
            None => {
                let victim = self.policy.eviction_index(set_lines, set as usize);
                assert!(
                    victim < set_lines.len(),
                    "replacement policy chose way {victim} of a {} way set",
                    set_lines.len()
                );
                let evicted = set_lines[victim];
                self.stats.evictions += 1;
                if evicted.is_dirty() {
                    self.stats.writebacks += 1;
                }
                trace!(
                    "Evicting tag {:#x} from set {set} way {victim}, dirty: {}",
                    evicted.tag,
                    evicted.is_dirty()
                );
                victim
            }
        };
        self.lines[range.start + way] = CacheLine::installed(tag, operation);
        self.policy
            .record_access(&self.lines[range], set as usize, tag);
        AccessResult::Miss
    }

    /// Issues a speculative read on behalf of a prefetcher
    pub fn prefetch(&mut self, address: u32) -> AccessResult {
        self.access(address, Operation::Read, true)
    }

    pub fn line_size(&self) -> u32 {
        self.geometry.line_size
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Gets the number of lines which have never been filled. Useful for analysing cache
    /// performance or debugging
    pub fn invalid_line_count(&self) -> usize {
        self.lines.iter().filter(|line| !line.valid).count()
    }
}

/// A cache paired with the prefetcher watching its demand accesses
///
/// Dropping it releases the policy and prefetcher state with it
#[derive(Debug)]
pub struct CacheSystem {
    cache: Cache,
    prefetcher: Box<dyn Prefetcher>,
}

impl CacheSystem {
    pub fn new(
        geometry: CacheGeometry,
        policy: Box<dyn ReplacementPolicy>,
        prefetcher: Box<dyn Prefetcher>,
    ) -> Self {
        debug!("Prefetcher: {prefetcher:?}");
        Self {
            cache: Cache::new(geometry, policy),
            prefetcher,
        }
    }

    /// Performs a demand access, then lets the prefetcher react to it
    ///
    /// The prefetcher only runs once the access has been fully resolved. Its own accesses go
    /// straight to the [`Cache`], which has no prefetcher, so they can never cascade
    pub fn access(&mut self, address: u32, operation: Operation) -> AccessResult {
        let result = self.cache.access(address, operation, false);
        let prefetched = self
            .prefetcher
            .handle_access(&mut self.cache, address, result.is_miss());
        if prefetched > 0 {
            trace!("Prefetched {prefetched} lines after access to {address:#x}");
        }
        self.cache.stats.prefetched_lines += prefetched as u64;
        result
    }

    pub fn statistics(&self) -> Statistics {
        self.cache.stats
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::prefetchers::NullPrefetcher;
    use crate::replacement_policies::LeastRecentlyUsed;

    fn lru_cache(line_size: u32, sets: u32, associativity: u32) -> Cache {
        let geometry = CacheGeometry::new(line_size, sets, associativity).unwrap();
        Cache::new(
            geometry,
            Box::new(LeastRecentlyUsed::new(sets, associativity)),
        )
    }

    #[test]
    fn geometry_rejects_non_powers_of_two() {
        assert!(matches!(
            CacheGeometry::new(24, 4, 4),
            Err(ConfigError::NotPowerOfTwo {
                field: "line_size",
                value: 24
            })
        ));
        assert!(matches!(
            CacheGeometry::new(16, 4, 3),
            Err(ConfigError::NotPowerOfTwo {
                field: "associativity",
                ..
            })
        ));
        assert!(matches!(
            CacheGeometry::new(16, 0, 4),
            Err(ConfigError::Zero { field: "sets" })
        ));
    }

    #[test]
    fn splits_addresses() {
        let cache = lru_cache(16, 4, 2);
        assert_eq!(cache.split_address(0), Addr { set: 0, tag: 0 });
        assert_eq!(cache.split_address(0x1f), Addr { set: 1, tag: 0 });
        assert_eq!(cache.split_address(0x40), Addr { set: 0, tag: 1 });
        assert_eq!(cache.split_address(0x1234), Addr { set: 3, tag: 0x48 });
    }

    #[test]
    fn split_with_a_single_full_width_set() {
        let cache = lru_cache(1 << 31, 2, 1);
        assert_eq!(
            cache.split_address(0xffff_ffff),
            Addr { set: 1, tag: 0 }
        );
    }

    #[test]
    fn offsets_within_a_line_hit() {
        let mut cache = lru_cache(16, 4, 2);
        assert_eq!(cache.access(0x100, Operation::Read, false), AccessResult::Miss);
        assert_eq!(cache.access(0x10f, Operation::Read, false), AccessResult::Hit);
        assert_eq!(cache.statistics().hits, 1);
        assert_eq!(cache.statistics().misses, 1);
    }

    #[test]
    fn writes_mark_lines_modified() {
        let mut cache = lru_cache(16, 1, 2);
        cache.access(0, Operation::Read, false);
        assert_eq!(cache.set(0)[0].status, LineStatus::Valid);
        cache.access(0, Operation::Write, false);
        assert_eq!(cache.set(0)[0].status, LineStatus::Modified);
        cache.access(16, Operation::Write, false);
        assert_eq!(cache.set(0)[1].status, LineStatus::Modified);
    }

    #[test]
    fn no_eviction_while_a_way_is_free() {
        let mut cache = lru_cache(16, 1, 4);
        for i in 0..4 {
            cache.access(i * 16, Operation::Write, false);
            assert_eq!(cache.statistics().evictions, 0);
        }
        assert_eq!(cache.invalid_line_count(), 0);
        cache.access(64, Operation::Read, false);
        assert_eq!(cache.statistics().evictions, 1);
        assert_eq!(cache.statistics().writebacks, 1);
    }

    #[test]
    fn prefetch_accesses_are_counted_separately() {
        let mut cache = lru_cache(16, 4, 2);
        assert_eq!(cache.prefetch(0x40), AccessResult::Miss);
        assert_eq!(cache.prefetch(0x40), AccessResult::Hit);
        let stats = cache.statistics();
        assert_eq!(stats.accesses, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.prefetch_accesses, 2);
        assert_eq!(cache.access(0x40, Operation::Read, false), AccessResult::Hit);
    }

    #[test]
    fn null_prefetcher_system_matches_plain_cache() {
        let geometry = CacheGeometry::new(16, 4, 4).unwrap();
        let mut system = CacheSystem::new(
            geometry,
            Box::new(LeastRecentlyUsed::new(4, 4)),
            Box::new(NullPrefetcher),
        );
        let mut cache = lru_cache(16, 4, 4);
        for address in (0..4096).step_by(52) {
            assert_eq!(
                system.access(address, Operation::Read),
                cache.access(address, Operation::Read, false)
            );
        }
        assert_eq!(system.statistics(), *cache.statistics());
    }
}
