use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheGeometry, CacheSystem};
use crate::error::ConfigError;
use crate::prefetchers::{
    AdjacentPrefetcher, NullPrefetcher, Prefetcher, SequentialPrefetcher, StridePrefetcher,
};
use crate::replacement_policies::{
    LeastRecentlyUsed, LruPreferClean, RandomPolicy, ReplacementPolicy,
};

/// A configuration for a single cache with its prefetcher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    pub cache_size: ByteSize,
    pub line_size: ByteSize,
    pub associativity: u32,
    #[serde(default = "ReplacementPolicyConfig::default")]
    pub replacement_policy: ReplacementPolicyConfig,
    #[serde(default = "PrefetcherConfig::default")]
    pub prefetcher: PrefetcherConfig,
    /// Lines fetched ahead by the sequential prefetcher, ignored by the others
    #[serde(default)]
    pub prefetch_amount: Option<u32>,
    /// Seeds the random replacement policy. Without one every run differs
    #[serde(default)]
    pub seed: Option<u64>,
}

/// The replacement policy - lru, lru_prefer_clean, or rand. Defaults to lru.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, ValueEnum, Eq, PartialEq)]
pub enum ReplacementPolicyConfig {
    #[serde(alias = "lru")]
    #[value(name = "lru")]
    LeastRecentlyUsed,
    #[serde(alias = "lru_prefer_clean")]
    #[value(name = "lru_prefer_clean")]
    LruPreferClean,
    #[serde(alias = "rand", alias = "random")]
    #[value(name = "rand", alias = "random")]
    Random,
}

impl Default for ReplacementPolicyConfig {
    fn default() -> Self {
        ReplacementPolicyConfig::LeastRecentlyUsed
    }
}

/// The prefetching strategy - null, sequential, adjacent, or custom (stride). Defaults to null.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, ValueEnum, Eq, PartialEq)]
pub enum PrefetcherConfig {
    #[serde(alias = "null")]
    #[value(name = "null")]
    Null,
    #[serde(alias = "sequential")]
    #[value(name = "sequential")]
    Sequential,
    #[serde(alias = "adjacent")]
    #[value(name = "adjacent")]
    Adjacent,
    #[serde(alias = "custom", alias = "stride")]
    #[value(name = "custom", alias = "stride")]
    Custom,
}

impl Default for PrefetcherConfig {
    fn default() -> Self {
        PrefetcherConfig::Null
    }
}

/// A size in bytes, written either as a plain number or with a binary suffix, e.g. `32K` or `4MB`
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(try_from = "RawByteSize", into = "u64")]
pub struct ByteSize(pub u64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawByteSize {
    Bytes(u64),
    Text(String),
}

impl TryFrom<RawByteSize> for ByteSize {
    type Error = ConfigError;

    fn try_from(value: RawByteSize) -> Result<Self, Self::Error> {
        match value {
            RawByteSize::Bytes(bytes) => Ok(ByteSize(bytes)),
            RawByteSize::Text(text) => text.parse(),
        }
    }
}

impl From<ByteSize> for u64 {
    fn from(value: ByteSize) -> Self {
        value.0
    }
}

impl FromStr for ByteSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidByteSize(s.to_string());
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let digits = upper.strip_suffix('B').unwrap_or(upper.as_str());
        let (digits, shift) = match digits.chars().last() {
            Some('K') => (&digits[..digits.len() - 1], 10),
            Some('M') => (&digits[..digits.len() - 1], 20),
            Some('G') => (&digits[..digits.len() - 1], 30),
            _ => (digits, 0),
        };
        let value: u64 = digits.trim().parse().map_err(|_| invalid())?;
        value
            .checked_mul(1 << shift)
            .map(ByteSize)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn to_u32(field: &'static str, value: u64) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero { field });
    }
    if !value.is_power_of_two() {
        return Err(ConfigError::NotPowerOfTwo { field, value });
    }
    u32::try_from(value).map_err(|_| ConfigError::TooLarge { field, value })
}

impl CacheConfig {
    /// Reads a configuration from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Validates the sizes and derives the number of sets
    pub fn geometry(&self) -> Result<CacheGeometry, ConfigError> {
        let cache_size = self.cache_size.0;
        if cache_size == 0 {
            return Err(ConfigError::Zero { field: "cache_size" });
        }
        if !cache_size.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                field: "cache_size",
                value: cache_size,
            });
        }
        let line_size = to_u32("line_size", self.line_size.0)?;
        let associativity = to_u32("associativity", self.associativity as u64)?;
        let set_size = line_size as u64 * associativity as u64;
        if cache_size < set_size {
            return Err(ConfigError::CacheTooSmall {
                cache_size,
                line_size: line_size as u64,
                associativity: associativity as u64,
            });
        }
        let sets = to_u32("sets", cache_size / set_size)?;
        CacheGeometry::new(line_size, sets, associativity)
    }

    pub fn build_policy(&self, geometry: &CacheGeometry) -> Box<dyn ReplacementPolicy> {
        let (sets, associativity) = (geometry.sets(), geometry.associativity());
        match self.replacement_policy {
            ReplacementPolicyConfig::LeastRecentlyUsed => {
                Box::new(LeastRecentlyUsed::new(sets, associativity))
            }
            ReplacementPolicyConfig::LruPreferClean => {
                Box::new(LruPreferClean::new(sets, associativity))
            }
            ReplacementPolicyConfig::Random => match self.seed {
                Some(seed) => Box::new(RandomPolicy::with_seed(seed)),
                None => Box::new(RandomPolicy::new()),
            },
        }
    }

    pub fn build_prefetcher(&self) -> Result<Box<dyn Prefetcher>, ConfigError> {
        let prefetcher: Box<dyn Prefetcher> = match self.prefetcher {
            PrefetcherConfig::Null => Box::new(NullPrefetcher),
            PrefetcherConfig::Sequential => {
                let amount = self
                    .prefetch_amount
                    .ok_or(ConfigError::MissingPrefetchAmount)?;
                Box::new(SequentialPrefetcher::new(amount))
            }
            PrefetcherConfig::Adjacent => Box::new(AdjacentPrefetcher),
            PrefetcherConfig::Custom => Box::new(StridePrefetcher::new()),
        };
        Ok(prefetcher)
    }

    /// Builds the cache system described by this configuration. Nothing is built if any part of
    /// the configuration is invalid
    pub fn build(&self) -> Result<CacheSystem, ConfigError> {
        let geometry = self.geometry()?;
        let prefetcher = self.build_prefetcher()?;
        Ok(CacheSystem::new(
            geometry,
            self.build_policy(&geometry),
            prefetcher,
        ))
    }
}
