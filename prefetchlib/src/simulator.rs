use std::io::BufRead;
use std::time::{Duration, Instant};

use log::info;
use serde::{Deserialize, Serialize};

use crate::cache::CacheSystem;
use crate::config::CacheConfig;
use crate::error::{ConfigError, SimulationError, TraceError};
use crate::stats::Statistics;
use crate::trace::{MemoryAccess, TraceReader};

/// The simulator feeds a trace through a cache system and collects results.
///
/// It supports calling simulate multiple times, the cache stays warm between calls and the time
/// taken and the statistics accumulate
pub struct Simulator {
    system: CacheSystem,
    config: CacheConfig,
    simulation_time: Duration,
}

/// The result of a simulation. Can be serialised to the output format
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    pub config: CacheConfig,
    pub statistics: Statistics,
    pub hit_ratio: f64,
    pub miss_ratio: f64,
}

impl Simulator {
    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A cache configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<Simulator, ConfigError>
    pub fn new(config: &CacheConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            system: config.build()?,
            config: config.clone(),
            simulation_time: Duration::new(0, 0),
        })
    }

    /// Simulates every reference in a trace, stopping at the first malformed line
    ///
    /// # Arguments
    ///
    /// * `reader`: The trace, in the `<R|W> <hex address>` per line format
    ///
    /// returns: Result<SimulationResult, SimulationError>
    pub fn simulate(&mut self, reader: impl BufRead) -> Result<SimulationResult, SimulationError> {
        let start = Instant::now();
        let replayed = self.replay(reader);
        // Accesses before a malformed line have been simulated, so their time counts too
        self.simulation_time += start.elapsed();
        replayed?;
        Ok(self.result())
    }

    fn replay(&mut self, reader: impl BufRead) -> Result<(), TraceError> {
        for access in TraceReader::new(reader) {
            let MemoryAccess { operation, address } = access?;
            self.system.access(address, operation);
        }
        Ok(())
    }

    /// Simulates references which have already been parsed
    pub fn run(&mut self, accesses: impl IntoIterator<Item = MemoryAccess>) -> SimulationResult {
        let start = Instant::now();
        for MemoryAccess { operation, address } in accesses {
            self.system.access(address, operation);
        }
        self.simulation_time += start.elapsed();
        self.result()
    }

    fn result(&self) -> SimulationResult {
        let statistics = self.system.statistics();
        info!(
            "Simulated {} accesses: {} hits, {} misses, {} prefetched lines",
            statistics.accesses, statistics.hits, statistics.misses, statistics.prefetched_lines
        );
        SimulationResult {
            config: self.config.clone(),
            statistics,
            hit_ratio: statistics.hit_ratio(),
            miss_ratio: statistics.miss_ratio(),
        }
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Gets the number of lines which were never filled
    pub fn get_invalid_line_count(&self) -> usize {
        self.system.cache().invalid_line_count()
    }
}
