//! Parsing of the human-entered quantities accepted by the command line and
//! the bindings.

use thiserror::Error;

const KILO: u64 = 1000;
const MEGA: u64 = 1000 * KILO;
const GIGA: u64 = 1000 * MEGA;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid count: {0}")]
    Count(String),
    #[error("invalid probability: {0}")]
    Probability(String),
    #[error("probability out of range [0,1]: {0}")]
    ProbabilityRange(String),
}

fn split_unit(s: &str) -> (&str, u64) {
    match s.as_bytes().last() {
        Some(b'K') => (&s[..s.len() - 1], KILO),
        Some(b'M') => (&s[..s.len() - 1], MEGA),
        Some(b'G') => (&s[..s.len() - 1], GIGA),
        _ => (s, 1),
    }
}

/// Parses an integer count, allowing a decimal unit suffix (`K`, `M` or `G`).
///
/// A fractional mantissa is scaled by the unit and rounded up, so `"1.5K"`
/// parses as `1500` and `"0.0015K"` as `2`.
pub fn parse_count(s: &str) -> Result<u64, ParseError> {
    let s = s.trim();
    let (num, multiplier) = split_unit(s);

    if let Ok(n) = num.parse::<u64>() {
        return n
            .checked_mul(multiplier)
            .ok_or_else(|| ParseError::Count(s.to_string()));
    }

    match num.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => {
            let v = f64::ceil(f * multiplier as f64);
            if v > u64::MAX as f64 {
                return Err(ParseError::Count(s.to_string()));
            }
            Ok(v as u64)
        }
        _ => Err(ParseError::Count(s.to_string())),
    }
}

/// Parses a probability given as a decimal (`0.05`), a percentage (`5%`)
/// or a fraction (`1/20`). The result must lie in `[0,1]`.
pub fn parse_probability(s: &str) -> Result<f64, ParseError> {
    let p = parse_ratio(s)?;
    if !(0.0..=1.0).contains(&p) {
        return Err(ParseError::ProbabilityRange(s.trim().to_string()));
    }
    Ok(p)
}

fn parse_ratio(s: &str) -> Result<f64, ParseError> {
    let s = s.trim();
    let (num, scale) = match s.strip_suffix('%') {
        Some(n) => (n, 0.01),
        None => (s, 1.0),
    };

    let p = match num.parse::<f64>() {
        Ok(p) => p,
        Err(_) => {
            let (numer, denom) = num
                .split_once('/')
                .ok_or_else(|| ParseError::Probability(s.to_string()))?;
            let numer = numer
                .trim()
                .parse::<f64>()
                .map_err(|_| ParseError::Probability(s.to_string()))?;
            let denom = denom
                .trim()
                .parse::<f64>()
                .map_err(|_| ParseError::Probability(s.to_string()))?;
            numer / denom
        }
    };

    if p.is_nan() {
        return Err(ParseError::Probability(s.to_string()));
    }

    Ok(p * scale)
}
