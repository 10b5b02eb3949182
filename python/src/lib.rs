use bfsize::{Containment, Params};
use pyo3::{exceptions::PyValueError, prelude::*};

struct Error(bfsize::Error);

impl From<bfsize::Error> for Error {
    fn from(value: bfsize::Error) -> Self {
        Self(value)
    }
}

impl From<bfsize::ParseError> for Error {
    fn from(value: bfsize::ParseError) -> Self {
        Self(value.into())
    }
}

impl From<Error> for PyErr {
    fn from(value: Error) -> Self {
        PyValueError::new_err(value.0.to_string())
    }
}

/// Builds parameters, containment can either be a float or a string such
/// as "theta-0.05"
fn params(
    experiment_size: u64,
    query_size: u64,
    theta: f64,
    containment: &Bound<'_, PyAny>,
    num_hash_funcs: u32,
) -> PyResult<Params> {
    let containment = match containment.extract::<f64>() {
        Ok(c) => Containment::Absolute(c),
        Err(_) => containment
            .extract::<String>()?
            .parse::<Containment>()
            .map_err(Error::from)?,
    };
    let c = containment.resolve(theta).map_err(Error::from)?;
    Ok(Params::new(experiment_size, query_size, theta, c).hashes(num_hash_funcs))
}

#[pyclass(frozen, get_all)]
#[derive(Clone)]
/// Outcome of evaluating the query false positive model for one filter size
pub struct FpRateInfo {
    bf_size: u64,
    bf_fp_rate: f64,
    query_positive_kmers: u64,
    kmers_needed_to_pass: u64,
    query_negative_kmers: u64,
    query_fp_rate: f64,
}

impl FpRateInfo {
    fn new(bf_size: u64, info: bfsize::FpRateInfo) -> Self {
        Self {
            bf_size,
            bf_fp_rate: info.bf_fp_rate,
            query_positive_kmers: info.query_positive_kmers,
            kmers_needed_to_pass: info.kmers_needed_to_pass,
            query_negative_kmers: info.query_negative_kmers,
            query_fp_rate: info.query_fp_rate,
        }
    }
}

#[pymethods]
impl FpRateInfo {
    fn __repr__(&self) -> String {
        format!(
            "FpRateInfo(bf_size={}, bf_fp_rate={}, query_fp_rate={})",
            self.bf_size, self.bf_fp_rate, self.query_fp_rate
        )
    }
}

#[pyfunction]
#[pyo3(signature = (bf_size, experiment_size, query_size, theta, containment, num_hash_funcs=1))]
/// Computes the probability that a query is wrongly reported as a match
pub fn query_fp_rate(
    bf_size: u64,
    experiment_size: u64,
    query_size: u64,
    theta: f64,
    containment: &Bound<'_, PyAny>,
    num_hash_funcs: u32,
) -> PyResult<FpRateInfo> {
    let p = params(experiment_size, query_size, theta, containment, num_hash_funcs)?;
    let info = bfsize::query_fp_rate(bf_size, &p).map_err(Error::from)?;
    Ok(FpRateInfo::new(bf_size, info))
}

#[pyfunction]
#[pyo3(signature = (bf_size, experiment_size, query_size, epsilon, num_hash_funcs=1))]
/// Upper bound of the query false positive rate for an epsilon-far query
pub fn query_fp_bound(
    bf_size: u64,
    experiment_size: u64,
    query_size: u64,
    epsilon: f64,
    num_hash_funcs: u32,
) -> PyResult<f64> {
    // theta and containment play no role in the bound
    let p = Params::new(experiment_size, query_size, 0.5, 0.5).hashes(num_hash_funcs);
    Ok(bfsize::query_fp_bound(bf_size, &p, epsilon).map_err(Error::from)?)
}

#[pyfunction]
#[pyo3(signature = (target_fp, experiment_size, query_size, theta, containment, num_hash_funcs=1, resolution=1))]
/// Finds the smallest bloom filter size, multiple of resolution, meeting
/// the target query false positive rate
pub fn find_minimum_size(
    target_fp: f64,
    experiment_size: u64,
    query_size: u64,
    theta: f64,
    containment: &Bound<'_, PyAny>,
    num_hash_funcs: u32,
    resolution: i64,
) -> PyResult<u64> {
    let p = params(experiment_size, query_size, theta, containment, num_hash_funcs)?;
    Ok(bfsize::find_minimum_size(target_fp, &p, resolution.max(1) as u64)
        .map_err(Error::from)?)
}

#[pyfunction]
#[pyo3(signature = (target_fp, experiment_size, query_size, theta, containment, num_hash_funcs=1, resolution=1))]
/// Same as find_minimum_size but returns the size along with every probe
/// made by the search
pub fn find_minimum_size_traced(
    target_fp: f64,
    experiment_size: u64,
    query_size: u64,
    theta: f64,
    containment: &Bound<'_, PyAny>,
    num_hash_funcs: u32,
    resolution: i64,
) -> PyResult<(u64, Vec<FpRateInfo>)> {
    let p = params(experiment_size, query_size, theta, containment, num_hash_funcs)?;
    let sizing = bfsize::find_minimum_size_traced(target_fp, &p, resolution.max(1) as u64)
        .map_err(Error::from)?;

    let probes = sizing
        .probes
        .iter()
        .map(|probe| FpRateInfo::new(probe.row.bf_size, probe.row.info))
        .collect();

    Ok((sizing.bf_size, probes))
}

#[pyfunction]
#[pyo3(signature = (num_items, fp_rate, num_hash_funcs=1))]
/// Estimates a bloom filter size from its own false positive rate
pub fn bloom_filter_size_estimate(
    num_items: u64,
    fp_rate: f64,
    num_hash_funcs: u32,
) -> PyResult<u64> {
    Ok(bfsize::bloom_filter_size_estimate(num_items, fp_rate, num_hash_funcs)
        .map_err(Error::from)?)
}

/// Python bindings to bfsize, bloom filter sizing library (written in Rust)
#[pymodule]
#[pyo3(name = "bfsize")]
fn bfsize_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<FpRateInfo>()?;
    m.add_function(wrap_pyfunction!(query_fp_rate, m)?)?;
    m.add_function(wrap_pyfunction!(query_fp_bound, m)?)?;
    m.add_function(wrap_pyfunction!(find_minimum_size, m)?)?;
    m.add_function(wrap_pyfunction!(find_minimum_size_traced, m)?)?;
    m.add_function(wrap_pyfunction!(bloom_filter_size_estimate, m)?)?;
    Ok(())
}
