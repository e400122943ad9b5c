use std::fmt::Debug;

use log::trace;

use crate::cache::Cache;

/// Number of entries in the stride prefetcher's reference prediction table
pub const RPT_SIZE: usize = 128;

/// A generic trait for prefetchers. A cache system owns exactly one, and any state it keeps is
/// released when it is dropped
pub trait Prefetcher: Debug {
    /// Reacts to a demand access which the cache has already resolved
    ///
    /// Implementations warm the cache by calling [`Cache::prefetch`], which never prefetches in
    /// turn
    ///
    /// # Arguments
    ///
    /// * `cache`: The cache the access went to
    /// * `address`: The address of the demand access
    /// * `was_miss`: Whether the demand access missed
    ///
    /// returns: u32, the number of prefetches which brought a new line into the cache. Prefetches
    /// which hit a resident line don't count
    fn handle_access(&mut self, cache: &mut Cache, address: u32, was_miss: bool) -> u32;
}

/// Never prefetches. The baseline the other prefetchers are measured against
#[derive(Debug, Default)]
pub struct NullPrefetcher;

impl Prefetcher for NullPrefetcher {
    fn handle_access(&mut self, _cache: &mut Cache, _address: u32, _was_miss: bool) -> u32 {
        0
    }
}

/// Prefetches the `amount` lines following every access
#[derive(Debug)]
pub struct SequentialPrefetcher {
    amount: u32,
}

impl SequentialPrefetcher {
    pub fn new(amount: u32) -> Self {
        Self { amount }
    }
}

impl Prefetcher for SequentialPrefetcher {
    fn handle_access(&mut self, cache: &mut Cache, address: u32, _was_miss: bool) -> u32 {
        let line_size = cache.line_size();
        (1..=self.amount)
            .map(|i| address.wrapping_add(i.wrapping_mul(line_size)))
            .filter(|&target| cache.prefetch(target).is_miss())
            .count() as u32
    }
}

/// Prefetches the line following every access
#[derive(Debug, Default)]
pub struct AdjacentPrefetcher;

impl Prefetcher for AdjacentPrefetcher {
    fn handle_access(&mut self, cache: &mut Cache, address: u32, _was_miss: bool) -> u32 {
        let target = address.wrapping_add(cache.line_size());
        u32::from(cache.prefetch(target).is_miss())
    }
}

#[derive(Debug, Default, Copy, Clone)]
struct RptEntry {
    address: u32,
    stride: i32,
    // 0 marks a slot which has never been filled
    time_of_access: u64,
}

/// Stride prefetcher driven by a reference prediction table
///
/// The table remembers the last [`RPT_SIZE`] distinct lines accessed, each with the stride that led
/// to it from the access before. When the stride into the current line matches the stride into the
/// previous one the pattern is taken as confirmed, and the next line along it is prefetched.
/// Requiring the confirmation costs one access of coverage compared to sequential prefetching, but
/// pollutes the cache far less on irregular streams.
///
/// When the table is full the entry touched longest ago is replaced
#[derive(Debug)]
pub struct StridePrefetcher {
    table: Vec<RptEntry>,
}

impl StridePrefetcher {
    pub fn new() -> Self {
        Self {
            table: vec![RptEntry::default(); RPT_SIZE],
        }
    }

    /// Indices of the most and least recently touched entries. Ties go to the lowest index
    fn newest_and_oldest(&self) -> (usize, usize) {
        let mut newest = 0;
        let mut oldest = 0;
        for (i, entry) in self.table.iter().enumerate() {
            if entry.time_of_access > self.table[newest].time_of_access {
                newest = i;
            }
            if entry.time_of_access < self.table[oldest].time_of_access {
                oldest = i;
            }
        }
        (newest, oldest)
    }
}

impl Default for StridePrefetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Prefetcher for StridePrefetcher {
    fn handle_access(&mut self, cache: &mut Cache, address: u32, _was_miss: bool) -> u32 {
        let block = address & !(cache.line_size() - 1);
        let found = self
            .table
            .iter()
            .position(|entry| entry.time_of_access != 0 && entry.address == block);
        let (newest, oldest) = self.newest_and_oldest();
        let previous = self.table[newest];

        // Another reference to the line just seen keeps the stride that led into it
        if found == Some(newest) {
            self.table[newest].time_of_access += 1;
            return 0;
        }

        let stride = if previous.time_of_access == 0 {
            0
        } else {
            block.wrapping_sub(previous.address) as i32
        };
        let confirmed = stride != 0 && stride == previous.stride;

        self.table[found.unwrap_or(oldest)] = RptEntry {
            address: block,
            stride,
            time_of_access: previous.time_of_access + 1,
        };

        if !confirmed {
            return 0;
        }
        let target = block.wrapping_add_signed(stride);
        trace!("Stride {stride} confirmed at {block:#x}, prefetching {target:#x}");
        u32::from(cache.prefetch(target).is_miss())
    }
}
