use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NutsError {
    #[error("dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("step size search did not settle after {iterations} trials (last step size {step_size:e})")]
    StepSizeSearchExhausted { iterations: usize, step_size: f64 },
    #[error("initial position has non-finite log density {log_density}")]
    NonFiniteStart { log_density: f64 },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, NutsError>;

/// Fails with [`NutsError::DimensionMismatch`] unless `found == expected`.
pub(crate) fn check_dim(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(NutsError::DimensionMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}
