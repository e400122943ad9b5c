//! # PrefetchLib
//!
//! Prefetchlib simulates a single set-associative cache to study how the replacement policy and
//! hardware prefetching affect the hit rate
//!
//! It provides a cache whose replacement policy and prefetcher are chosen at construction, and a
//! simulator to run these caches over traces of reads and writes
//!
//! Only line metadata is modelled, there is no timing and no data

/// Contains the cache, its lines, and the cache system pairing it with a prefetcher
pub mod cache;

/// Contains definitions for the JSON configuration format, and validation of cache geometry
pub mod config;

/// Contains the error types
pub mod error;

/// Contains the readers used for trace files
pub mod io;

/// Contains the provided prefetchers, with a trait for implementing custom prefetchers
pub mod prefetchers;

/// Contains the provided replacement policies, with a trait for implementing custom replacement
/// policies
pub mod replacement_policies;

/// Contains the simulator used to run a trace through a cache configuration
pub mod simulator;

/// Contains the statistics collected by a cache
pub mod stats;

/// Contains the trace format parser
pub mod trace;


/// Contains utilities for building synthetic traces for tests and benchmarks.
pub mod util;
