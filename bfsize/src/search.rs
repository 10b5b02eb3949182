//! Inversion of a monotone predicate over filter sizes.
//!
//! Given a predicate that is false up to some unknown size and true from
//! there on, [MonotoneSearch] finds the smallest size, rounded up to a
//! multiple of a resolution, for which it holds. The search first grows a
//! bracket geometrically from a seed, then bisects it. All along, the lower
//! end of the bracket is known to fail (size `0` is failing by convention and
//! never probed) and the upper end is known to pass.

use std::fmt::Display;

use crate::Error;

/// Arbitrary starting point of the growth phase, not derived from the inputs
pub const DEFAULT_SEED: u64 = 1000;
pub const DEFAULT_GROWTH: u64 = 4;
/// Number of growth steps after which the predicate is considered never
/// satisfiable
pub const DEFAULT_MAX_GROWTH_STEPS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// geometric growth until the predicate holds
    Bracket,
    /// bisection of the bracket
    Refine,
    /// check of the size rounded down to the resolution
    Round,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Bracket => "bracket",
            Self::Refine => "refine",
            Self::Round => "round",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonotoneSearch {
    seed: u64,
    growth: u64,
    max_growth_steps: u32,
    resolution: u64,
}

impl Default for MonotoneSearch {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            growth: DEFAULT_GROWTH,
            max_growth_steps: DEFAULT_MAX_GROWTH_STEPS,
            resolution: 1,
        }
    }
}

impl MonotoneSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed.max(1);
        self
    }

    pub fn growth(mut self, growth: u64) -> Self {
        self.growth = growth.max(2);
        self
    }

    pub fn max_growth_steps(mut self, steps: u32) -> Self {
        self.max_growth_steps = steps;
        self
    }

    /// Sets the granularity of the result, values below 1 are clamped to 1
    pub fn resolution(mut self, resolution: u64) -> Self {
        self.resolution = resolution.max(1);
        self
    }

    /// Returns the smallest positive multiple of the resolution for which
    /// `passes` holds, assuming `passes` is monotone. Every evaluation of the
    /// predicate is given the phase it belongs to.
    ///
    /// Fails with [Error::TargetUnreachable] if the predicate still does not
    /// hold after the maximum number of growth steps.
    pub fn run<F>(&self, mut passes: F) -> Result<u64, Error>
    where
        F: FnMut(Phase, u64) -> bool,
    {
        let mut lo = 0u64;
        let mut hi = self.seed;
        let mut steps = 0u32;

        while !passes(Phase::Bracket, hi) {
            if steps >= self.max_growth_steps {
                tracing::warn!(steps, size = hi, "giving up growing the search bracket");
                return Err(Error::TargetUnreachable { steps, bf_size: hi });
            }
            lo = hi;
            hi = hi
                .checked_mul(self.growth)
                .ok_or(Error::TargetUnreachable { steps, bf_size: lo })?;
            steps += 1;
        }

        tracing::debug!(lo, hi, steps, "search bracket found");

        while hi - lo > self.resolution {
            let mid = lo + (hi - lo) / 2;
            if passes(Phase::Refine, mid) {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        // rounding down may cross back over the threshold, in which case
        // the next multiple is the answer since hi is known to pass
        let rounded = hi - hi % self.resolution;
        if rounded > 0 && passes(Phase::Round, rounded) {
            return Ok(rounded);
        }

        rounded
            .checked_add(self.resolution)
            .ok_or(Error::TargetUnreachable { steps, bf_size: rounded })
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    fn threshold_search(
        s: &MonotoneSearch,
        threshold: u64,
    ) -> (Result<u64, Error>, Vec<(Phase, u64)>) {
        let mut probes = vec![];
        let res = s.run(|phase, x| {
            probes.push((phase, x));
            x >= threshold
        });
        (res, probes)
    }

    fn expected(threshold: u64, resolution: u64) -> u64 {
        u64::max(threshold.div_ceil(resolution), 1) * resolution
    }

    #[test]
    fn test_threshold() {
        let s = MonotoneSearch::new();
        let (res, probes) = threshold_search(&s, 123_456);
        assert_eq!(res, Ok(123_456));

        // 1000, 4000, 16000, 64000 fail, 256000 passes
        let bracket: Vec<u64> = probes
            .iter()
            .filter(|(p, _)| *p == Phase::Bracket)
            .map(|(_, x)| *x)
            .collect();
        assert_eq!(bracket, vec![1000, 4000, 16000, 64000, 256000]);
    }

    #[test]
    fn test_resolution() {
        for resolution in [1, 7, 8, 64, 1000, 4096] {
            let s = MonotoneSearch::new().resolution(resolution);
            for threshold in [1, 7, 8, 9, 999, 1000, 1001, 65_537, 10_000_000] {
                let (res, _) = threshold_search(&s, threshold);
                let v = res.unwrap();
                assert_eq!(v % resolution, 0);
                assert_eq!(
                    v,
                    expected(threshold, resolution),
                    "t={threshold} r={resolution}"
                );
            }
        }
    }

    #[test]
    fn test_resolution_clamped() {
        assert_eq!(MonotoneSearch::new().resolution(0), MonotoneSearch::new());
        let (res, _) = threshold_search(&MonotoneSearch::new().resolution(0), 4321);
        assert_eq!(res, Ok(4321));
    }

    #[test]
    fn test_random_thresholds() {
        let mut rng: StdRng = SeedableRng::from_seed([42; 32]);

        for _ in 0..500 {
            let threshold = rng.gen_range(1..1_000_000_000_000u64);
            let resolution = rng.gen_range(1..10_000u64);
            let s = MonotoneSearch::new().resolution(resolution);
            let (res, probes) = threshold_search(&s, threshold);
            assert_eq!(res, Ok(expected(threshold, resolution)));
            assert!(probes.iter().all(|(_, x)| *x > 0));
        }
    }

    #[test]
    fn test_phase_order() {
        let s = MonotoneSearch::new().resolution(16);
        let (_, probes) = threshold_search(&s, 777_777);
        let phases: Vec<Phase> = probes.iter().map(|(p, _)| *p).collect();

        let first_refine = phases.iter().position(|p| *p == Phase::Refine).unwrap();
        assert!(phases[..first_refine].iter().all(|p| *p == Phase::Bracket));
        assert!(phases[first_refine..phases.len() - 1]
            .iter()
            .all(|p| *p == Phase::Refine));
        assert_eq!(phases.last(), Some(&Phase::Round));
    }

    #[test]
    fn test_seed_passing() {
        // the seed passes right away: the search still looks below it
        let s = MonotoneSearch::new();
        let (res, probes) = threshold_search(&s, 10);
        assert_eq!(res, Ok(10));
        assert_eq!(probes[0], (Phase::Bracket, 1000));
        assert_eq!(
            probes.iter().filter(|(p, _)| *p == Phase::Bracket).count(),
            1
        );

        let (res, _) = threshold_search(&s, 1);
        assert_eq!(res, Ok(1));

        // rounding down to zero is never probed
        let s = MonotoneSearch::new().resolution(600);
        let (res, probes) = threshold_search(&s, 1);
        assert_eq!(res, Ok(600));
        assert!(probes.iter().all(|(_, x)| *x > 0));
    }

    #[test]
    fn test_custom_seed_and_growth() {
        let s = MonotoneSearch::new().seed(1).growth(2).resolution(1);
        let (res, probes) = threshold_search(&s, 1 << 20);
        assert_eq!(res, Ok(1 << 20));
        assert_eq!(
            probes.iter().filter(|(p, _)| *p == Phase::Bracket).count(),
            21
        );
    }

    #[test]
    fn test_unreachable() {
        let s = MonotoneSearch::new().max_growth_steps(5);
        let mut calls = 0;
        let res = s.run(|_, _| {
            calls += 1;
            false
        });
        assert_eq!(
            res,
            Err(Error::TargetUnreachable {
                steps: 5,
                bf_size: 1000 * 4u64.pow(5)
            })
        );
        assert_eq!(calls, 6);
    }

    #[test]
    fn test_unreachable_overflow() {
        let s = MonotoneSearch::new()
            .seed(u64::MAX / 2)
            .max_growth_steps(u32::MAX);
        let res = s.run(|_, _| false);
        assert_eq!(
            res,
            Err(Error::TargetUnreachable {
                steps: 0,
                bf_size: u64::MAX / 2
            })
        );
    }
}
