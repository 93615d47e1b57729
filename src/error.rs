use thiserror::Error;

use crate::control::model::SampleTime;

pub type Result<T> = std::result::Result<T, ControlError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// Matrix or polynomial shapes do not fit together
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The configuration is valid but this routine does not handle it
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Argument values are outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A solve or inversion hit a singular matrix
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    /// Riccati iteration failed to reach the requested accuracy
    #[error("Riccati solver did not converge in {iterations} iterations (residual {residual:e})")]
    RiccatiNonConvergence { iterations: usize, residual: f64 },

    /// Two systems with different sampling were combined
    #[error("Sample time mismatch: {left:?} and {right:?}")]
    SampleTimeMismatch { left: SampleTime, right: SampleTime },
}

pub(crate) fn dimension_mismatch(
    name: &str,
    expected: (usize, usize),
    actual: (usize, usize),
) -> ControlError {
    ControlError::DimensionMismatch(format!(
        "{} must be {}x{}, got {}x{}",
        name, expected.0, expected.1, actual.0, actual.1
    ))
}

pub(crate) fn check_shape(
    name: &str,
    mat: &nalgebra::DMatrix<f64>,
    expected: (usize, usize),
) -> Result<()> {
    if mat.shape() != expected {
        return Err(dimension_mismatch(name, expected, mat.shape()));
    }
    Ok(())
}
