//! Checked ratios
//!
//! Every frequency and score in the pipeline is a count over a total. A zero
//! total is reported as [`RatioError::DivisionUndefined`] instead of leaking
//! `NaN` into downstream ranking.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RatioError {
    #[error("division undefined: {what} has a zero denominator")]
    DivisionUndefined { what: &'static str },
}

/// `numerator / denominator`, failing when the denominator is zero
///
/// # Example
/// ```
/// use faultline::ratio::ratio;
///
/// assert_eq!(ratio(1.0, 4.0, "share").unwrap(), 0.25);
/// assert!(ratio(1.0, 0.0, "share").is_err());
/// ```
pub fn ratio(numerator: f64, denominator: f64, what: &'static str) -> Result<f64, RatioError> {
    if denominator == 0.0 {
        return Err(RatioError::DivisionUndefined { what });
    }
    Ok(numerator / denominator)
}

/// Count-based variant of [`ratio`]
pub fn count_ratio(count: usize, total: usize, what: &'static str) -> Result<f64, RatioError> {
    ratio(count as f64, total as f64, what)
}
