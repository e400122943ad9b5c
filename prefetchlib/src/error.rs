use thiserror::Error;

/// Errors found while building a cache from a configuration. All of these are fatal, no partial
/// cache is ever produced
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be a power of two, got {value}")]
    NotPowerOfTwo { field: &'static str, value: u64 },

    #[error("{field} of {value} is too large for a 32 bit address space")]
    TooLarge { field: &'static str, value: u64 },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error(
        "a cache of {cache_size} bytes can't hold a single set of {associativity} lines of {line_size} bytes"
    )]
    CacheTooSmall {
        cache_size: u64,
        line_size: u64,
        associativity: u64,
    },

    #[error("couldn't parse byte size {0:?}")]
    InvalidByteSize(String),

    #[error("the sequential prefetcher needs a prefetch amount")]
    MissingPrefetchAmount,

    #[error("couldn't read the config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("couldn't parse the config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors found while reading a trace
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("line {line}: {reason} ({content:?})")]
    Parse {
        line: usize,
        content: String,
        reason: &'static str,
    },

    #[error("couldn't read the trace: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Trace(#[from] TraceError),
}
