//! Pole placement by Ackermann's formula.
//!
//! Single-input systems only. The formula inverts the controllability
//! matrix and evaluates the desired characteristic polynomial at `A`,
//! so it is ill-conditioned for large state dimension or clustered poles.
//! No refinement is attempted; use a robust placement method (e.g. KNV)
//! when that matters.

use nalgebra as na;
use na::Complex;
use num_traits::AsPrimitive;
use tracing::{debug, warn};

use crate::control::model::StateSpaceModel;
use crate::control::polynomial::Polynomial;
use crate::control::promote::widen;
use crate::error::{ControlError, Result};

/// Gain `K` (1 x n) such that `eig(A - B K)` equals `poles`.
///
/// `A` and `B` may have any primitive numeric element type; both are widened
/// to `f64` before any power or solve is formed. Complex poles must be given
/// together with their conjugates.
pub fn place<TA, TB>(
    mat_a: &na::DMatrix<TA>,
    mat_b: &na::DMatrix<TB>,
    poles: &[Complex<f64>],
) -> Result<na::DMatrix<f64>>
where
    TA: na::Scalar + AsPrimitive<f64>,
    TB: na::Scalar + AsPrimitive<f64>,
{
    let n = mat_a.nrows();
    if mat_a.ncols() != n {
        return Err(ControlError::DimensionMismatch(format!(
            "A must be square, got {}x{}",
            n,
            mat_a.ncols()
        )));
    }
    if poles.len() != n {
        return Err(ControlError::DimensionMismatch(format!(
            "expected {} poles for a {}-state system, got {}",
            n,
            n,
            poles.len()
        )));
    }
    if mat_b.nrows() != n {
        return Err(ControlError::DimensionMismatch(format!(
            "B has {} rows, A has {}",
            mat_b.nrows(),
            n
        )));
    }
    if mat_b.ncols() != 1 {
        return Err(ControlError::Unsupported(format!(
            "Ackermann pole placement requires a single-input system, B has {} columns; \
             MIMO placement is not supported, use lqr or place one input at a time",
            mat_b.ncols()
        )));
    }

    if n == 0 {
        return Ok(na::DMatrix::zeros(1, 0));
    }

    let mat_a = widen(mat_a);
    let mat_b = widen(mat_b);
    debug!(n, "ackermann pole placement");

    let phi = Polynomial::from_roots(poles)?;

    // phi(A) by Horner's scheme
    let mat_i = na::DMatrix::<f64>::identity(n, n);
    let mut phi_a = na::DMatrix::<f64>::zeros(n, n);
    for &c in phi.coeffs() {
        phi_a = &phi_a * &mat_a + mat_i.scale(c);
    }

    // Controllability matrix [B, AB, ..., A^(n-1)B]
    let mut mat_s = na::DMatrix::<f64>::zeros(n, n);
    let mut col = mat_b.clone();
    for j in 0..n {
        if j != 0 {
            col = &mat_a * col;
        }
        mat_s.view_mut((0, j), (n, 1)).copy_from(&col);
    }

    let svd = mat_s.clone().svd(false, false);
    let (s_max, s_min) = (svd.singular_values.max(), svd.singular_values.min());
    if s_max > 0.0 && s_min / s_max < 1e-10 {
        warn!(rcond = s_min / s_max, "controllability matrix is ill-conditioned");
    }

    let q = mat_s.lu().solve(&phi_a).ok_or_else(|| {
        ControlError::SingularMatrix("controllability matrix, system is not controllable".into())
    })?;

    Ok(q.rows(n - 1, 1).into_owned())
}

pub fn place_model(
    model: &impl StateSpaceModel,
    poles: &[Complex<f64>],
) -> Result<na::DMatrix<f64>> {
    place(model.get_mat_a(), model.get_mat_b(), poles)
}
