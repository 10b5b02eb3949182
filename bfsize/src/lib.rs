use thiserror::Error;

pub mod model;
pub mod search;
pub mod sizing;
pub mod utils;

pub use model::{
    bernoulli_at_least, bloom_filter_fp_rate, bloom_filter_size_estimate, fp_bound_from_rate,
    query_fp_bound, query_fp_rate, Containment, FpRateInfo, Params,
};
pub use search::{MonotoneSearch, Phase};
pub use sizing::{find_minimum_size, find_minimum_size_traced, Probe, Row, Sizing};
pub use utils::ParseError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid {name}={value}: must be a probability in [0,1]")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("invalid bloom filter size {0}: must be positive")]
    InvalidBfSize(u64),
    #[error("invalid number of hash functions {0}: must be at least 1")]
    InvalidHashCount(u32),
    #[error("invalid theta={0}: must be in (0,1)")]
    InvalidTheta(f64),
    #[error("invalid containment={0}: must be in [0,1]")]
    InvalidContainment(f64),
    #[error("invalid target query false positive rate {0}: must be in (0,1)")]
    InvalidTarget(f64),
    #[error("invalid epsilon={0}: must be in [0,1]")]
    InvalidEpsilon(f64),
    #[error("target unreachable: still failing at {bf_size} bits after {steps} growth steps")]
    TargetUnreachable { steps: u32, bf_size: u64 },
    #[error("{0}")]
    Parse(#[from] ParseError),
}
