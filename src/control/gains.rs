use nalgebra as na;
use tracing::debug;

use crate::control::model::{SampleTime, StateSpaceModel};
use crate::control::riccati::{Riccati, RiccatiSolver};
use crate::error::{check_shape, ControlError, Result};

fn check_weights(
    mat_a: &na::DMatrix<f64>,
    mat_b: &na::DMatrix<f64>,
    mat_q: &na::DMatrix<f64>,
    mat_r: &na::DMatrix<f64>,
) -> Result<()> {
    let n = mat_a.nrows();
    check_shape("A", mat_a, (n, n))?;
    if mat_b.nrows() != n {
        return Err(ControlError::DimensionMismatch(format!(
            "B has {} rows, A has {}",
            mat_b.nrows(),
            n
        )));
    }
    check_shape("Q", mat_q, (n, n))?;
    check_shape("R", mat_r, (mat_b.ncols(), mat_b.ncols()))
}

/// Continuous-time LQR gain `K = R⁻¹B'S` with `S` the CARE solution.
pub fn lqr_continuous_with(
    solver: &impl Riccati,
    mat_a: &na::DMatrix<f64>,
    mat_b: &na::DMatrix<f64>,
    mat_q: &na::DMatrix<f64>,
    mat_r: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    check_weights(mat_a, mat_b, mat_q, mat_r)?;
    let mat_s = solver.care(mat_a, mat_b, mat_q, mat_r)?;
    let r_lu = mat_r.clone().lu();
    r_lu.solve(&(mat_b.transpose() * mat_s))
        .ok_or_else(|| ControlError::SingularMatrix("input weight R".into()))
}

/// Discrete-time LQR gain `K = (B'SB + R)⁻¹ B'SA` with `S` the DARE solution.
pub fn lqr_discrete_with(
    solver: &impl Riccati,
    mat_a: &na::DMatrix<f64>,
    mat_b: &na::DMatrix<f64>,
    mat_q: &na::DMatrix<f64>,
    mat_r: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    check_weights(mat_a, mat_b, mat_q, mat_r)?;
    let mat_s = solver.dare(mat_a, mat_b, mat_q, mat_r)?;
    let bts = mat_b.transpose() * &mat_s;
    (&bts * mat_b + mat_r)
        .lu()
        .solve(&(bts * mat_a))
        .ok_or_else(|| ControlError::SingularMatrix("B'SB + R".into()))
}

pub fn lqr_continuous(
    mat_a: &na::DMatrix<f64>,
    mat_b: &na::DMatrix<f64>,
    mat_q: &na::DMatrix<f64>,
    mat_r: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    lqr_continuous_with(&RiccatiSolver::default(), mat_a, mat_b, mat_q, mat_r)
}

pub fn lqr_discrete(
    mat_a: &na::DMatrix<f64>,
    mat_b: &na::DMatrix<f64>,
    mat_q: &na::DMatrix<f64>,
    mat_r: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    lqr_discrete_with(&RiccatiSolver::default(), mat_a, mat_b, mat_q, mat_r)
}

pub(crate) fn lqr_sampled(
    solver: &impl Riccati,
    sample_time: SampleTime,
    mat_a: &na::DMatrix<f64>,
    mat_b: &na::DMatrix<f64>,
    mat_q: &na::DMatrix<f64>,
    mat_r: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    match sample_time {
        SampleTime::Continuous => lqr_continuous_with(solver, mat_a, mat_b, mat_q, mat_r),
        SampleTime::Discrete(_) => lqr_discrete_with(solver, mat_a, mat_b, mat_q, mat_r),
    }
}

/// LQR gain for a system, continuous or discrete according to its sampling.
pub fn lqr(
    model: &impl StateSpaceModel,
    mat_q: &na::DMatrix<f64>,
    mat_r: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    debug!(
        nstates = model.get_mat_a().nrows(),
        ninputs = model.get_mat_b().ncols(),
        sample_time = ?model.get_sample_time(),
        "lqr"
    );
    lqr_sampled(
        &RiccatiSolver::default(),
        model.get_sample_time(),
        model.get_mat_a(),
        model.get_mat_b(),
        mat_q,
        mat_r,
    )
}

/// Observer gain by duality: the regulator problem for `(A', C')`, transposed.
pub fn kalman_continuous_with(
    solver: &impl Riccati,
    mat_a: &na::DMatrix<f64>,
    mat_c: &na::DMatrix<f64>,
    mat_r1: &na::DMatrix<f64>,
    mat_r2: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    let dual = lqr_continuous_with(
        solver,
        &mat_a.transpose(),
        &mat_c.transpose(),
        mat_r1,
        mat_r2,
    )?;
    Ok(dual.transpose())
}

pub fn kalman_discrete_with(
    solver: &impl Riccati,
    mat_a: &na::DMatrix<f64>,
    mat_c: &na::DMatrix<f64>,
    mat_r1: &na::DMatrix<f64>,
    mat_r2: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    let dual = lqr_discrete_with(
        solver,
        &mat_a.transpose(),
        &mat_c.transpose(),
        mat_r1,
        mat_r2,
    )?;
    Ok(dual.transpose())
}

/// Continuous-time Kalman gain for process noise covariance `R1` and
/// measurement noise covariance `R2`.
pub fn kalman_continuous(
    mat_a: &na::DMatrix<f64>,
    mat_c: &na::DMatrix<f64>,
    mat_r1: &na::DMatrix<f64>,
    mat_r2: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    kalman_continuous_with(&RiccatiSolver::default(), mat_a, mat_c, mat_r1, mat_r2)
}

pub fn kalman_discrete(
    mat_a: &na::DMatrix<f64>,
    mat_c: &na::DMatrix<f64>,
    mat_r1: &na::DMatrix<f64>,
    mat_r2: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    kalman_discrete_with(&RiccatiSolver::default(), mat_a, mat_c, mat_r1, mat_r2)
}

pub(crate) fn kalman_sampled(
    solver: &impl Riccati,
    sample_time: SampleTime,
    mat_a: &na::DMatrix<f64>,
    mat_c: &na::DMatrix<f64>,
    mat_r1: &na::DMatrix<f64>,
    mat_r2: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    match sample_time {
        SampleTime::Continuous => kalman_continuous_with(solver, mat_a, mat_c, mat_r1, mat_r2),
        SampleTime::Discrete(_) => kalman_discrete_with(solver, mat_a, mat_c, mat_r1, mat_r2),
    }
}

pub fn kalman(
    model: &impl StateSpaceModel,
    mat_r1: &na::DMatrix<f64>,
    mat_r2: &na::DMatrix<f64>,
) -> Result<na::DMatrix<f64>> {
    debug!(
        nstates = model.get_mat_a().nrows(),
        noutputs = model.get_mat_c().nrows(),
        sample_time = ?model.get_sample_time(),
        "kalman"
    );
    kalman_sampled(
        &RiccatiSolver::default(),
        model.get_sample_time(),
        model.get_mat_a(),
        model.get_mat_c(),
        mat_r1,
        mat_r2,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::model::{dc_motor, two_mass, StateSpace};
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, Normed};

    fn max_real_part(mat: &na::DMatrix<f64>) -> f64 {
        mat.complex_eigenvalues()
            .iter()
            .map(|e| e.re)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn spectral_radius(mat: &na::DMatrix<f64>) -> f64 {
        mat.complex_eigenvalues()
            .iter()
            .map(|e| e.norm())
            .fold(0.0, f64::max)
    }

    #[test]
    fn continuous_double_integrator_gain() {
        let a = dmatrix![0.0, 1.0; 0.0, 0.0];
        let b = dmatrix![0.0; 1.0];
        let k = lqr_continuous(&a, &b, &na::DMatrix::identity(2, 2), &dmatrix![1.0]).unwrap();
        assert_eq!(k.shape(), (1, 2));
        assert_relative_eq!(k, dmatrix![1.0, 3f64.sqrt()], epsilon = 1e-8);
    }

    #[test]
    fn discrete_scalar_gain() {
        let k = lqr_discrete(&dmatrix![1.0], &dmatrix![1.0], &dmatrix![1.0], &dmatrix![1.0])
            .unwrap();
        let phi = (1.0 + 5f64.sqrt()) / 2.0;
        assert_relative_eq!(k[(0, 0)], phi / (1.0 + phi), epsilon = 1e-10);
    }

    #[test]
    fn continuous_gain_stabilizes_two_mass() {
        let sys = two_mass::Model::new(two_mass::Parameters::default())
            .continuous()
            .unwrap();
        let k = lqr(&sys, &na::DMatrix::identity(4, 4), &dmatrix![0.1]).unwrap();
        let closed = sys.get_mat_a() - sys.get_mat_b() * &k;
        assert!(max_real_part(&closed) < 0.0);
    }

    #[test]
    fn discrete_gain_stabilizes_dc_motor() {
        let sys = dc_motor::Model::new(dc_motor::Parameters::default())
            .discretized(0.05)
            .unwrap();
        let k = lqr(&sys, &na::DMatrix::identity(2, 2), &dmatrix![1.0]).unwrap();
        let closed = sys.get_mat_a() - sys.get_mat_b() * &k;
        assert!(spectral_radius(&closed) < 1.0);
    }

    #[test]
    fn discrete_unstable_plant() {
        let a = dmatrix![1.2, 1.0; 0.0, 0.9];
        let b = dmatrix![0.0; 1.0];
        let k = lqr_discrete(&a, &b, &na::DMatrix::identity(2, 2), &dmatrix![1.0]).unwrap();
        assert!(spectral_radius(&(&a - &b * &k)) < 1.0);
    }

    #[test]
    fn kalman_is_transposed_dual_regulator() {
        let a = dmatrix![0.0, 1.0; -2.0, -0.5];
        let c = dmatrix![1.0, 0.0];
        let r1 = dmatrix![1.0, 0.2; 0.2, 2.0];
        let r2 = dmatrix![0.5];

        let l = kalman_continuous(&a, &c, &r1, &r2).unwrap();
        let dual = lqr_continuous(&a.transpose(), &c.transpose(), &r1, &r2).unwrap();
        assert_eq!(l, dual.transpose());
        assert_eq!(l.shape(), (2, 1));
        assert!(max_real_part(&(&a - &l * &c)) < 0.0);

        let ld = kalman_discrete(&a.scale(0.1), &c, &r1, &r2).unwrap();
        let duald = lqr_discrete(&a.scale(0.1).transpose(), &c.transpose(), &r1, &r2).unwrap();
        assert_eq!(ld, duald.transpose());
    }

    #[test]
    fn kalman_dispatches_on_sampling() {
        let a = dmatrix![0.9, 0.1; 0.0, 0.8];
        let b = dmatrix![0.0; 1.0];
        let c = dmatrix![1.0, 0.0];
        let d = dmatrix![0.0];
        let r1 = na::DMatrix::identity(2, 2);
        let r2 = dmatrix![1.0];

        let dt = SampleTime::Discrete(0.1);
        let disc = StateSpace::new(a.clone(), b.clone(), c.clone(), d.clone(), dt).unwrap();
        let cont = StateSpace::new(a.clone(), b, c.clone(), d, SampleTime::Continuous).unwrap();

        assert_eq!(kalman(&disc, &r1, &r2).unwrap(), kalman_discrete(&a, &c, &r1, &r2).unwrap());
        assert_eq!(kalman(&cont, &r1, &r2).unwrap(), kalman_continuous(&a, &c, &r1, &r2).unwrap());
    }

    #[test]
    fn weight_shape_checked_before_solving() {
        let a = dmatrix![0.0, 1.0; 0.0, 0.0];
        let b = dmatrix![0.0; 1.0];
        let res = lqr_continuous(&a, &b, &na::DMatrix::identity(3, 3), &dmatrix![1.0]);
        assert!(matches!(res, Err(ControlError::DimensionMismatch(_))));
        let res = lqr_discrete(&a, &b, &na::DMatrix::identity(2, 2), &na::DMatrix::identity(2, 2));
        assert!(matches!(res, Err(ControlError::DimensionMismatch(_))));
    }

    #[test]
    fn singular_input_weight_propagates() {
        let a = dmatrix![0.0, 1.0; 0.0, 0.0];
        let b = dmatrix![0.0; 1.0];
        let res = lqr_continuous(&a, &b, &na::DMatrix::identity(2, 2), &dmatrix![0.0]);
        assert!(matches!(res, Err(ControlError::SingularMatrix(_))));
    }
}
