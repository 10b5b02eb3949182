//! Sizing of a bloom filter against a target query false positive rate.

use std::fmt::Display;

use crate::{
    model::{self, FpRateInfo, Params},
    search::{MonotoneSearch, Phase},
    Error,
};

/// Header of the rows printed for [Row]
pub const TRACE_HEADER: &str = "#B\tH\tX\tQ\tT\tC\tbfFP\tqFP";

/// Evaluation of the model for one filter size, displayed as a tab
/// separated row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row {
    pub bf_size: u64,
    pub params: Params,
    pub info: FpRateInfo,
}

impl Row {
    pub fn new(bf_size: u64, params: &Params) -> Result<Self, Error> {
        Ok(Self {
            bf_size,
            params: *params,
            info: model::query_fp_rate(bf_size, params)?,
        })
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.9}\t{:.9}",
            self.bf_size,
            self.params.num_hash_funcs,
            self.params.experiment_size,
            self.params.query_size,
            self.params.theta,
            self.params.containment,
            self.info.bf_fp_rate,
            self.info.query_fp_rate
        )
    }
}

/// One evaluation of the model made during a search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    pub phase: Phase,
    pub row: Row,
}

impl Display for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.row.fmt(f)
    }
}

/// Result of a traced search
#[derive(Debug, Clone, PartialEq)]
pub struct Sizing {
    /// smallest acceptable filter size, in bits
    pub bf_size: u64,
    /// model evaluated at `bf_size`
    pub info: FpRateInfo,
    /// every probe made, in order
    pub probes: Vec<Probe>,
}

impl Sizing {
    /// Row describing the final size
    pub fn result_row(&self, params: &Params) -> Row {
        Row {
            bf_size: self.bf_size,
            params: *params,
            info: self.info,
        }
    }
}

fn search<F>(
    target_fp: f64,
    params: &Params,
    resolution_bits: u64,
    mut observe: F,
) -> Result<u64, Error>
where
    F: FnMut(&Probe),
{
    if !(target_fp > 0.0 && target_fp < 1.0) {
        return Err(Error::InvalidTarget(target_fp));
    }
    params.validate()?;

    MonotoneSearch::new()
        .resolution(resolution_bits)
        .run(|phase, bf_size| {
            let info = model::evaluate(bf_size, params);
            tracing::debug!(
                %phase,
                bf_size,
                bf_fp_rate = info.bf_fp_rate,
                query_fp_rate = info.query_fp_rate,
                "probe"
            );
            observe(&Probe {
                phase,
                row: Row {
                    bf_size,
                    params: *params,
                    info,
                },
            });
            info.query_fp_rate < target_fp
        })
}

/// Finds the smallest filter size, in bits and multiple of `resolution_bits`,
/// for which the query false positive rate is below `target_fp`.
///
/// The result is only guaranteed minimal if the query false positive rate
/// does not increase with the filter size for the given parameters.
pub fn find_minimum_size(
    target_fp: f64,
    params: &Params,
    resolution_bits: u64,
) -> Result<u64, Error> {
    search(target_fp, params, resolution_bits, |_| {})
}

/// Same as [find_minimum_size] but also returns every probe of the search
pub fn find_minimum_size_traced(
    target_fp: f64,
    params: &Params,
    resolution_bits: u64,
) -> Result<Sizing, Error> {
    let mut probes = vec![];
    let bf_size = search(target_fp, params, resolution_bits, |p| probes.push(*p))?;

    Ok(Sizing {
        bf_size,
        info: model::evaluate(bf_size, params),
        probes,
    })
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use crate::{query_fp_rate, Containment};

    use super::*;

    fn sbt_params() -> Params {
        Params::new(1_000_000, 1000, 0.9, 0.85)
    }

    fn count_phase(s: &Sizing, phase: Phase) -> usize {
        s.probes.iter().filter(|p| p.phase == phase).count()
    }

    #[test]
    fn test_reference_size() {
        let p = sbt_params();
        let s = find_minimum_size_traced(1e-4, &p, 8).unwrap();
        assert_eq!(s.bf_size, 4_457_808);
        assert_eq!(find_minimum_size(1e-4, &p, 8).unwrap(), 4_457_808);

        // the seed and 7 growth steps, up to 1000·4^7 bits
        assert_eq!(count_phase(&s, Phase::Bracket), 8);
        assert_eq!(s.probes[7].row.bf_size, 16_384_000);
        assert_eq!(count_phase(&s, Phase::Refine), 21);

        assert!(s.info.query_fp_rate < 1e-4);
        assert!(query_fp_rate(s.bf_size - 8, &p).unwrap().query_fp_rate >= 1e-4);
    }

    #[test]
    fn test_reference_sizes() {
        let p = sbt_params();
        assert_eq!(find_minimum_size(1e-9, &p, 1).unwrap(), 6_738_665);
        assert_eq!(find_minimum_size(1e-4, &p.hashes(3), 64).unwrap(), 3_404_416);
        assert_eq!(
            find_minimum_size(0.5, &Params::new(1000, 100, 0.8, 0.7), 4).unwrap(),
            2608
        );
    }

    #[test]
    fn test_seed_already_passing() {
        let p = Params::new(10, 100, 0.8, 0.5);
        let s = find_minimum_size_traced(1e-2, &p, 1).unwrap();
        assert_eq!(s.bf_size, 18);
        assert_eq!(count_phase(&s, Phase::Bracket), 1);
        assert_eq!(s.probes[0].row.bf_size, 1000);

        assert_eq!(find_minimum_size(1e-2, &p, 16).unwrap(), 32);
    }

    #[test]
    fn test_bracket_then_converge() {
        let p = sbt_params();
        let resolution = 8;
        let s = find_minimum_size_traced(1e-12, &p, resolution).unwrap();

        assert!(count_phase(&s, Phase::Bracket) > 2);

        // the largest failing refinement probe is within one resolution
        // unit of the smallest passing one
        let refine = s.probes.iter().filter(|p| p.phase != Phase::Round);
        let lo = refine
            .clone()
            .filter(|p| p.row.info.query_fp_rate >= 1e-12)
            .map(|p| p.row.bf_size)
            .max()
            .unwrap();
        let hi = refine
            .filter(|p| p.row.info.query_fp_rate < 1e-12)
            .map(|p| p.row.bf_size)
            .min()
            .unwrap();
        assert!(hi - lo <= resolution);
        assert!(s.bf_size <= hi + resolution);
    }

    #[test]
    fn test_resolution_clamped() {
        let p = sbt_params();
        assert_eq!(
            find_minimum_size(1e-9, &p, 0).unwrap(),
            find_minimum_size(1e-9, &p, 1).unwrap()
        );
    }

    #[test]
    fn test_result_contract() {
        let mut rng: StdRng = SeedableRng::from_seed([42; 32]);

        for _ in 0..100 {
            let theta = rng.gen_range(0.6..0.95);
            let delta = rng.gen_range(0.02..0.2);
            let p = Params::new(
                rng.gen_range(1_000..10_000_000),
                rng.gen_range(100..5_000),
                theta,
                theta - delta,
            )
            .hashes(rng.gen_range(1..=4));
            let target = 10f64.powi(-rng.gen_range(1..=8));
            let resolution = rng.gen_range(1..1_000);

            let v = find_minimum_size(target, &p, resolution).unwrap();
            assert_eq!(v % resolution, 0, "{p:?}");
            assert!(query_fp_rate(v, &p).unwrap().query_fp_rate < target, "{p:?}");
            if v > resolution {
                assert!(
                    query_fp_rate(v - resolution, &p).unwrap().query_fp_rate >= target,
                    "{p:?}"
                );
            }
        }
    }

    #[test]
    fn test_containment_relative_to_theta() {
        let theta = 0.9;
        let relative: Containment = "theta-0.05".parse().unwrap();
        let absolute = Containment::Absolute(theta - 0.05);

        let p1 = Params::new(1_000_000, 1000, theta, relative.resolve(theta).unwrap());
        let p2 = Params::new(1_000_000, 1000, theta, absolute.resolve(theta).unwrap());
        assert_eq!(p1, p2);
        assert_eq!(
            find_minimum_size(1e-4, &p1, 8).unwrap(),
            find_minimum_size(1e-4, &p2, 8).unwrap()
        );
    }

    #[test]
    fn test_degenerate_is_unreachable() {
        // containment above theta: every query is a match whatever the size
        let p = Params::new(1_000_000, 1000, 0.9, 0.95);
        assert_eq!(
            find_minimum_size(1e-4, &p, 8),
            Err(Error::TargetUnreachable {
                steps: 24,
                bf_size: 1000 * (1 << 48)
            })
        );
    }

    #[test]
    fn test_invalid_inputs_rejected_before_probing() {
        let p = sbt_params();
        for target in [0.0, 1.0, -0.5, 2.0, f64::NAN] {
            let mut probes = 0;
            let res = search(target, &p, 8, |_| probes += 1);
            assert!(matches!(res, Err(Error::InvalidTarget(_))));
            assert_eq!(probes, 0);
        }

        let mut probes = 0;
        let res = search(1e-4, &p.hashes(0), 8, |_| probes += 1);
        assert_eq!(res, Err(Error::InvalidHashCount(0)));
        assert_eq!(probes, 0);

        let res = find_minimum_size(1e-4, &Params::new(1000, 100, 0.9, 1.5), 8);
        assert_eq!(res, Err(Error::InvalidContainment(1.5)));
    }

    #[test]
    fn test_trace_rows() {
        let p = sbt_params();
        let s = find_minimum_size_traced(1e-4, &p, 8).unwrap();

        let first = s.probes[0];
        assert_eq!(first.phase, Phase::Bracket);
        assert_eq!(
            first.to_string(),
            format!(
                "1000\t1\t1000000\t1000\t0.9\t0.85\t{:.9}\t{:.9}",
                first.row.info.bf_fp_rate, first.row.info.query_fp_rate
            )
        );
        assert_eq!(first.to_string().split('\t').count(), 8);
        assert_eq!(TRACE_HEADER.split('\t').count(), 8);

        let last = s.result_row(&p);
        assert_eq!(last.bf_size, 4_457_808);
        assert!(last
            .to_string()
            .starts_with("4457808\t1\t1000000\t1000\t0.9\t0.85\t"));
        assert_eq!(last, Row::new(4_457_808, &p).unwrap());
        assert_eq!(Row::new(0, &p), Err(Error::InvalidBfSize(0)));
    }
}
