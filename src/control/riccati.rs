//! Algebraic Riccati equation solvers.
//!
//! Continuous time, `A'X + XA - XBR⁻¹B'X + Q = 0`, is solved with the scaled
//! matrix sign function of the Hamiltonian. Discrete time,
//! `X = A'XA - A'XB(R + B'XB)⁻¹B'XA + Q`, is solved with the structure
//! preserving doubling algorithm. Both return the symmetric stabilising
//! solution and check the residual before returning.

use nalgebra as na;
use std::default::Default;
use tracing::{debug, trace};

use crate::error::{check_shape, ControlError, Result};

pub trait Riccati {
    fn care(
        &self,
        mat_a: &na::DMatrix<f64>,
        mat_b: &na::DMatrix<f64>,
        mat_q: &na::DMatrix<f64>,
        mat_r: &na::DMatrix<f64>,
    ) -> Result<na::DMatrix<f64>>;

    fn dare(
        &self,
        mat_a: &na::DMatrix<f64>,
        mat_b: &na::DMatrix<f64>,
        mat_q: &na::DMatrix<f64>,
        mat_r: &na::DMatrix<f64>,
    ) -> Result<na::DMatrix<f64>>;
}

#[derive(Debug, Clone)]
pub struct Parameters {
    pub max_iterations: usize,
    /// Relative step size at which the iteration is considered converged
    pub tolerance: f64,
    /// Largest accepted relative residual of the returned solution
    pub residual_tolerance: f64,
}

impl Default for Parameters {
    fn default() -> Parameters {
        Parameters {
            max_iterations: 100,
            tolerance: 1e-12,
            residual_tolerance: 1e-8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RiccatiSolver {
    params: Parameters,
}

impl RiccatiSolver {
    pub fn new(params: Parameters) -> RiccatiSolver {
        RiccatiSolver { params }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }
}

fn check_inputs(
    mat_a: &na::DMatrix<f64>,
    mat_b: &na::DMatrix<f64>,
    mat_q: &na::DMatrix<f64>,
    mat_r: &na::DMatrix<f64>,
) -> Result<(usize, usize)> {
    let n = mat_a.nrows();
    let m = mat_b.ncols();
    check_shape("A", mat_a, (n, n))?;
    check_shape("B", mat_b, (n, m))?;
    check_shape("Q", mat_q, (n, n))?;
    check_shape("R", mat_r, (m, m))?;
    Ok((n, m))
}

fn symmetrize(mat: &na::DMatrix<f64>) -> na::DMatrix<f64> {
    (mat + mat.transpose()).scale(0.5)
}

// ln |det(mat)| from the LU factors, avoids overflow of det for large n
fn log_abs_det(mat: &na::DMatrix<f64>) -> f64 {
    mat.clone().lu().u().diagonal().iter().map(|d| d.abs().ln()).sum()
}

impl Riccati for RiccatiSolver {
    fn care(
        &self,
        mat_a: &na::DMatrix<f64>,
        mat_b: &na::DMatrix<f64>,
        mat_q: &na::DMatrix<f64>,
        mat_r: &na::DMatrix<f64>,
    ) -> Result<na::DMatrix<f64>> {
        let (n, _) = check_inputs(mat_a, mat_b, mat_q, mat_r)?;
        debug!(n, "solving continuous algebraic Riccati equation");

        let r_inv = mat_r
            .clone()
            .try_inverse()
            .ok_or_else(|| ControlError::SingularMatrix("input weight R".into()))?;
        let mat_g = mat_b * &r_inv * mat_b.transpose();

        // Hamiltonian H = [A, -G; -Q, -A']
        let mut mat_z = na::DMatrix::<f64>::zeros(2 * n, 2 * n);
        mat_z.view_mut((0, 0), (n, n)).copy_from(mat_a);
        mat_z.view_mut((0, n), (n, n)).copy_from(&(-&mat_g));
        mat_z.view_mut((n, 0), (n, n)).copy_from(&(-mat_q));
        mat_z.view_mut((n, n), (n, n)).copy_from(&(-mat_a.transpose()));

        let dim = (2 * n) as f64;
        let mut converged = false;
        let mut step = f64::INFINITY;
        let mut iterations = 0;
        while iterations < self.params.max_iterations {
            iterations += 1;
            let z_inv = mat_z.clone().try_inverse().ok_or_else(|| {
                ControlError::SingularMatrix(
                    "Hamiltonian has eigenvalues on the imaginary axis".into(),
                )
            })?;

            // determinant scaling, dropped once the iterate is close to sign(H)
            let c = if step > 1e-2 {
                (-log_abs_det(&mat_z) / dim).exp()
            } else {
                1.0
            };
            let next = (mat_z.scale(c) + z_inv.scale(1.0 / c)).scale(0.5);
            step = (&next - &mat_z).norm() / next.norm();
            mat_z = next;
            trace!(iterations, step, "sign function iteration");

            if step <= self.params.tolerance.sqrt() {
                // one more unscaled step squares the error
                let z_inv = mat_z.clone().try_inverse().ok_or_else(|| {
                    ControlError::SingularMatrix("sign function iterate became singular".into())
                })?;
                mat_z = (&mat_z + z_inv).scale(0.5);
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(ControlError::RiccatiNonConvergence {
                iterations,
                residual: step,
            });
        }

        // (W + I) [I; X] = 0  =>  [W12; W22 + I] X = -[W11 + I; W21]
        let mat_i = na::DMatrix::<f64>::identity(n, n);
        let mut lhs = na::DMatrix::<f64>::zeros(2 * n, n);
        lhs.view_mut((0, 0), (n, n))
            .copy_from(&mat_z.view((0, n), (n, n)));
        lhs.view_mut((n, 0), (n, n))
            .copy_from(&(mat_z.view((n, n), (n, n)) + &mat_i));
        let mut rhs = na::DMatrix::<f64>::zeros(2 * n, n);
        rhs.view_mut((0, 0), (n, n))
            .copy_from(&(-(mat_z.view((0, 0), (n, n)) + &mat_i)));
        rhs.view_mut((n, 0), (n, n))
            .copy_from(&(-mat_z.view((n, 0), (n, n))));

        let mat_x = lhs
            .svd(true, true)
            .solve(&rhs, f64::EPSILON)
            .map_err(|e| ControlError::SingularMatrix(format!("sign function extraction: {}", e)))?;
        let mat_x = symmetrize(&mat_x);

        let residual_mat = mat_a.transpose() * &mat_x + &mat_x * mat_a
            - &mat_x * &mat_g * &mat_x
            + mat_q;
        let scale = 1.0
            + mat_q.norm()
            + 2.0 * mat_a.norm() * mat_x.norm()
            + mat_g.norm() * mat_x.norm_squared();
        let residual = residual_mat.norm() / scale;
        debug!(iterations, residual, "continuous Riccati solution");

        if !residual.is_finite() || residual > self.params.residual_tolerance {
            return Err(ControlError::RiccatiNonConvergence {
                iterations,
                residual,
            });
        }

        Ok(mat_x)
    }

    fn dare(
        &self,
        mat_a: &na::DMatrix<f64>,
        mat_b: &na::DMatrix<f64>,
        mat_q: &na::DMatrix<f64>,
        mat_r: &na::DMatrix<f64>,
    ) -> Result<na::DMatrix<f64>> {
        let (n, _) = check_inputs(mat_a, mat_b, mat_q, mat_r)?;
        debug!(n, "solving discrete algebraic Riccati equation");

        let r_inv = mat_r
            .clone()
            .try_inverse()
            .ok_or_else(|| ControlError::SingularMatrix("input weight R".into()))?;
        let mat_i = na::DMatrix::<f64>::identity(n, n);

        let mut a_k = mat_a.clone();
        let mut g_k = mat_b * &r_inv * mat_b.transpose();
        let mut h_k = mat_q.clone();

        let mut converged = false;
        let mut step = f64::INFINITY;
        let mut iterations = 0;
        while iterations < self.params.max_iterations {
            iterations += 1;
            let w_inv = (&mat_i + &g_k * &h_k).try_inverse().ok_or_else(|| {
                ControlError::SingularMatrix("I + G H in doubling iteration".into())
            })?;

            let a_next = &a_k * &w_inv * &a_k;
            let g_next = &g_k + &a_k * &w_inv * &g_k * a_k.transpose();
            let h_next = &h_k + a_k.transpose() * &h_k * &w_inv * &a_k;

            let h_norm = h_next.norm();
            step = if h_norm > 0.0 {
                (&h_next - &h_k).norm() / h_norm
            } else {
                0.0
            };
            a_k = a_next;
            g_k = symmetrize(&g_next);
            h_k = symmetrize(&h_next);
            trace!(iterations, step, "doubling iteration");

            if step <= self.params.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(ControlError::RiccatiNonConvergence {
                iterations,
                residual: step,
            });
        }

        let mat_x = h_k;
        let btx = mat_b.transpose() * &mat_x;
        let inner = (mat_r + &btx * mat_b)
            .try_inverse()
            .ok_or_else(|| ControlError::SingularMatrix("R + B'XB".into()))?;
        let residual_mat = mat_a.transpose() * &mat_x * mat_a
            - mat_a.transpose() * btx.transpose() * &inner * &btx * mat_a
            + mat_q
            - &mat_x;
        let scale = 1.0 + mat_q.norm() + mat_x.norm() * (1.0 + mat_a.norm_squared());
        let residual = residual_mat.norm() / scale;
        debug!(iterations, residual, "discrete Riccati solution");

        if !residual.is_finite() || residual > self.params.residual_tolerance {
            return Err(ControlError::RiccatiNonConvergence {
                iterations,
                residual,
            });
        }

        Ok(mat_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::dmatrix;

    #[test]
    fn care_double_integrator() {
        let a = dmatrix![0.0, 1.0; 0.0, 0.0];
        let b = dmatrix![0.0; 1.0];
        let q = na::DMatrix::identity(2, 2);
        let r = dmatrix![1.0];

        let x = RiccatiSolver::default().care(&a, &b, &q, &r).unwrap();
        let s3 = 3f64.sqrt();
        assert_relative_eq!(x, dmatrix![s3, 1.0; 1.0, s3], epsilon = 1e-8);
    }

    #[test]
    fn care_scalar_unstable() {
        // 2aX - X^2 b^2/r + q = 0 with a = 1, b = 1, q = 1, r = 1  =>  X = 1 + sqrt(2)
        let x = RiccatiSolver::default()
            .care(&dmatrix![1.0], &dmatrix![1.0], &dmatrix![1.0], &dmatrix![1.0])
            .unwrap();
        assert_relative_eq!(x[(0, 0)], 1.0 + 2f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn dare_scalar_golden_ratio() {
        let x = RiccatiSolver::default()
            .dare(&dmatrix![1.0], &dmatrix![1.0], &dmatrix![1.0], &dmatrix![1.0])
            .unwrap();
        assert_relative_eq!(x[(0, 0)], (1.0 + 5f64.sqrt()) / 2.0, epsilon = 1e-10);
    }

    #[test]
    fn dare_matches_fixed_point_iteration() {
        let a = dmatrix![1.0, 0.1; 0.0, 1.0];
        let b = dmatrix![0.005; 0.1];
        let q = na::DMatrix::identity(2, 2);
        let r = dmatrix![1.0];

        let x = RiccatiSolver::default().dare(&a, &b, &q, &r).unwrap();

        let mut p = q.clone();
        for _ in 0..20000 {
            let k = (&r + b.transpose() * &p * &b).try_inverse().unwrap() * b.transpose() * &p * &a;
            p = a.transpose() * &p * &a - a.transpose() * &p * &b * k + &q;
        }
        assert_relative_eq!(x, p, epsilon = 1e-6, max_relative = 1e-8);
    }

    #[test]
    fn singular_input_weight() {
        let a = dmatrix![0.0, 1.0; 0.0, 0.0];
        let b = dmatrix![0.0, 0.0; 1.0, 1.0];
        let q = na::DMatrix::identity(2, 2);
        let r = na::DMatrix::zeros(2, 2);
        let solver = RiccatiSolver::default();
        assert!(matches!(
            solver.care(&a, &b, &q, &r),
            Err(ControlError::SingularMatrix(_))
        ));
        assert!(matches!(
            solver.dare(&a, &b, &q, &r),
            Err(ControlError::SingularMatrix(_))
        ));
    }

    #[test]
    fn rejects_bad_weight_shape() {
        let res = RiccatiSolver::default().care(
            &dmatrix![0.0, 1.0; 0.0, 0.0],
            &dmatrix![0.0; 1.0],
            &dmatrix![1.0],
            &dmatrix![1.0],
        );
        assert!(matches!(res, Err(ControlError::DimensionMismatch(_))));
    }

    #[test]
    fn iteration_budget_exhausted() {
        let solver = RiccatiSolver::new(Parameters {
            max_iterations: 1,
            ..Parameters::default()
        });
        let res = solver.dare(
            &dmatrix![1.0, 0.1; 0.0, 1.0],
            &dmatrix![0.005; 0.1],
            &na::DMatrix::identity(2, 2),
            &dmatrix![1.0],
        );
        assert!(matches!(res, Err(ControlError::RiccatiNonConvergence { .. })));
    }
}
