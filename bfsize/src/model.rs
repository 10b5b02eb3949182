//! Probability model relating a bloom filter's size to the false positive
//! rate of a query run against it.
//!
//! A query of `Q` items is reported as a match when at least `ceil(theta·Q)`
//! of its items are found in the filter. Items genuinely present in the
//! experiment are always found; the other ones are found only by accident,
//! each independently with the filter's false positive rate. The query false
//! positive rate is the probability that those accidents are numerous enough
//! to push a query over the threshold.

use std::{fmt::Display, str::FromStr};

use crate::{utils::parse_probability, Error, ParseError};

pub mod beta;

const THETA_PREFIX: &str = "theta-";

/// Parameters of a query against a filter, everything but the filter size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// number of hash functions of the filter
    pub num_hash_funcs: u32,
    /// number of distinct items inserted into the filter
    pub experiment_size: u64,
    /// number of items in a query
    pub query_size: u64,
    /// fraction of the query items needed to report a match
    pub theta: f64,
    /// fraction of the query items genuinely present in the experiment
    pub containment: f64,
}

impl Params {
    pub fn new(experiment_size: u64, query_size: u64, theta: f64, containment: f64) -> Self {
        Self {
            num_hash_funcs: 1,
            experiment_size,
            query_size,
            theta,
            containment,
        }
    }

    pub fn hashes(mut self, num_hash_funcs: u32) -> Self {
        self.num_hash_funcs = num_hash_funcs;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.num_hash_funcs == 0 {
            return Err(Error::InvalidHashCount(self.num_hash_funcs));
        }
        if !(self.theta > 0.0 && self.theta < 1.0) {
            return Err(Error::InvalidTheta(self.theta));
        }
        if !(0.0..=1.0).contains(&self.containment) {
            return Err(Error::InvalidContainment(self.containment));
        }
        Ok(())
    }

    #[inline(always)]
    fn query_positive_kmers(&self) -> u64 {
        f64::round(self.containment * self.query_size as f64) as u64
    }

    #[inline(always)]
    fn kmers_needed_to_pass(&self) -> u64 {
        f64::ceil(self.theta * self.query_size as f64) as u64
    }
}

/// How the containment index of a query is given
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Containment {
    /// containment index given as is
    Absolute(f64),
    /// containment index given as `theta - delta`
    BelowTheta(f64),
}

impl Containment {
    /// Resolves the containment index for a given theta
    pub fn resolve(&self, theta: f64) -> Result<f64, Error> {
        let c = match self {
            Self::Absolute(c) => *c,
            Self::BelowTheta(delta) => theta - delta,
        };

        if !(0.0..=1.0).contains(&c) {
            return Err(Error::InvalidContainment(c));
        }
        Ok(c)
    }
}

impl FromStr for Containment {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix(THETA_PREFIX) {
            Some(delta) => Ok(Self::BelowTheta(parse_probability(delta)?)),
            None => Ok(Self::Absolute(parse_probability(s)?)),
        }
    }
}

impl Display for Containment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute(c) => write!(f, "{c}"),
            Self::BelowTheta(delta) => write!(f, "{THETA_PREFIX}{delta}"),
        }
    }
}

/// Outcome of evaluating the model for one filter size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpRateInfo {
    /// false positive rate of the bloom filter, per item
    pub bf_fp_rate: f64,
    /// query items genuinely present in the experiment
    pub query_positive_kmers: u64,
    /// query items that must be found to report a match
    pub kmers_needed_to_pass: u64,
    /// query items absent from the experiment
    pub query_negative_kmers: u64,
    /// probability of wrongly reporting the query as a match
    pub query_fp_rate: f64,
}

/// Theoretical false positive rate of a bloom filter of `bf_size` bits holding
/// `num_items` distinct items with `num_hashes` hash functions, that is
/// `(1 - e^(-k·n/m))^k`.
///
/// # Panics
///
/// Panics if `bf_size` is zero.
#[inline]
pub fn bloom_filter_fp_rate(bf_size: u64, num_items: u64, num_hashes: u32) -> f64 {
    assert!(bf_size > 0, "bloom filter size must be positive");
    let k = num_hashes as f64;
    let load = k * num_items as f64 / bf_size as f64;
    (-f64::exp_m1(-load)).powi(num_hashes as i32)
}

/// Probability of getting at least `num_successes` successes out of
/// `num_trials` independent Bernoulli trials of success probability `p`.
///
/// The binomial upper tail is computed as `I_p(k, n-k+1)`, the regularized
/// incomplete beta function, which stays accurate for millions of trials and
/// vanishingly small `p`.
pub fn bernoulli_at_least(num_successes: i64, num_trials: u64, p: f64) -> f64 {
    if num_successes <= 0 {
        return 1.0;
    }

    let k = num_successes as u64;
    if k > num_trials {
        return 0.0;
    }

    debug_assert!((0.0..=1.0).contains(&p), "p={p} is not a probability");
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }

    beta::beta_reg(k as f64, (num_trials - k + 1) as f64, p)
}

// evaluates the model without validating the parameters, the caller is
// responsible for it
pub(crate) fn evaluate(bf_size: u64, params: &Params) -> FpRateInfo {
    let query_positive_kmers = params.query_positive_kmers();
    let kmers_needed_to_pass = params.kmers_needed_to_pass();

    let bf_fp_rate = bloom_filter_fp_rate(bf_size, params.experiment_size, params.num_hash_funcs);

    let query_negative_kmers = params
        .query_size
        .checked_sub(query_positive_kmers)
        .expect("containment must not exceed 1");

    let query_fp_rate = bernoulli_at_least(
        kmers_needed_to_pass as i64 - query_positive_kmers as i64,
        query_negative_kmers,
        bf_fp_rate,
    );

    FpRateInfo {
        bf_fp_rate,
        query_positive_kmers,
        kmers_needed_to_pass,
        query_negative_kmers,
        query_fp_rate,
    }
}

/// Computes the probability that a query is reported as a match by a filter
/// of `bf_size` bits although it is not one.
///
/// When the items genuinely present already reach the threshold, no false
/// positive is needed and the rate is exactly `1.0` whatever the filter size.
pub fn query_fp_rate(bf_size: u64, params: &Params) -> Result<FpRateInfo, Error> {
    if bf_size == 0 {
        return Err(Error::InvalidBfSize(bf_size));
    }
    params.validate()?;
    Ok(evaluate(bf_size, params))
}

/// Upper bound of the query false positive rate given the filter false
/// positive rate `r`.
///
/// A query is `epsilon`-far from an experiment when its containment index is
/// below `theta - epsilon`. For such a query
///
/// ```text
/// P[query false positive] <= exp(-|Q|·(epsilon - r)² / (3·r))
/// ```
pub fn fp_bound_from_rate(r: f64, query_size: u64, epsilon: f64) -> f64 {
    if r == 0.0 {
        return 0.0;
    }
    f64::exp(-(query_size as f64 * (epsilon - r).powi(2)) / (3.0 * r))
}

/// Upper bound of the query false positive rate for an `epsilon`-far query
/// against a filter of `bf_size` bits, see [fp_bound_from_rate].
///
/// Only `num_hash_funcs`, `experiment_size` and `query_size` are used from
/// `params`.
pub fn query_fp_bound(bf_size: u64, params: &Params, epsilon: f64) -> Result<f64, Error> {
    if bf_size == 0 {
        return Err(Error::InvalidBfSize(bf_size));
    }
    if params.num_hash_funcs == 0 {
        return Err(Error::InvalidHashCount(params.num_hash_funcs));
    }
    if !(0.0..=1.0).contains(&epsilon) {
        return Err(Error::InvalidEpsilon(epsilon));
    }

    let r = bloom_filter_fp_rate(bf_size, params.experiment_size, params.num_hash_funcs);
    Ok(fp_bound_from_rate(r, params.query_size, epsilon))
}

/// Estimates the size in bits of a filter holding `num_items` distinct items
/// with a false positive rate of `fp_rate`. This only accounts for the
/// filter false positive rate, use [crate::find_minimum_size] to size a
/// filter against a query false positive rate.
pub fn bloom_filter_size_estimate(
    num_items: u64,
    fp_rate: f64,
    num_hashes: u32,
) -> Result<u64, Error> {
    if !(fp_rate > 0.0 && fp_rate < 1.0) {
        return Err(Error::InvalidProbability {
            name: "bloom filter false positive rate",
            value: fp_rate,
        });
    }
    if num_hashes == 0 {
        return Err(Error::InvalidHashCount(num_hashes));
    }

    let n = num_items as f64;
    let bits = match num_hashes {
        1 => -n / f64::ln_1p(-fp_rate),
        k => -(k as f64 * n) / f64::ln_1p(-fp_rate.powf(1.0 / k as f64)),
    };

    Ok(f64::ceil(bits) as u64)
}
