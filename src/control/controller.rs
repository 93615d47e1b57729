pub mod lqg {
    use nalgebra as na;
    use tracing::debug;

    use crate::control::gains::{kalman_sampled, lqr_sampled};
    use crate::control::model::{SampleTime, StateSpace, StateSpaceModel};
    use crate::control::riccati::RiccatiSolver;
    use crate::error::{check_shape, Result};

    /// Weights of the LQG problem.
    ///
    /// `q1`, `q2` are the state and input costs, `r1`, `r2` the process and
    /// measurement noise covariances. `q_q` adds `q_q * C'C` to the state cost
    /// and `q_r` adds `q_r * BB'` to the process noise.
    #[derive(Debug, Clone, PartialEq)]
    pub struct LqgWeights {
        pub q1: na::DMatrix<f64>,
        pub q2: na::DMatrix<f64>,
        pub r1: na::DMatrix<f64>,
        pub r2: na::DMatrix<f64>,
        pub q_q: f64,
        pub q_r: f64,
    }

    impl LqgWeights {
        pub fn new(
            q1: na::DMatrix<f64>,
            q2: na::DMatrix<f64>,
            r1: na::DMatrix<f64>,
            r2: na::DMatrix<f64>,
        ) -> LqgWeights {
            LqgWeights {
                q1,
                q2,
                r1,
                r2,
                q_q: 0.0,
                q_r: 0.0,
            }
        }

        pub fn with_cross_weights(mut self, q_q: f64, q_r: f64) -> LqgWeights {
            self.q_q = q_q;
            self.q_r = q_r;
            self
        }
    }

    /// Observer-based compensator together with everything used to build it.
    ///
    /// The compensator maps measured plant output to the signal subtracted
    /// from the plant input, i.e. the plant input is `u = -controller(y)` and
    /// the loop is closed with `Feedback::feedback_with(plant, controller)`.
    #[derive(Debug, Clone, PartialEq)]
    pub struct LqgController {
        plant: StateSpace,
        weights: LqgWeights,
        controller: StateSpace,
        state_gain: na::DMatrix<f64>,
        observer_gain: na::DMatrix<f64>,
        integrator: bool,
    }

    impl LqgController {
        pub fn plant(&self) -> &StateSpace {
            &self.plant
        }

        pub fn weights(&self) -> &LqgWeights {
            &self.weights
        }

        pub fn controller(&self) -> &StateSpace {
            &self.controller
        }

        /// State feedback gain `L`; with integral action this is `[L, I]`.
        pub fn state_gain(&self) -> &na::DMatrix<f64> {
            &self.state_gain
        }

        pub fn observer_gain(&self) -> &na::DMatrix<f64> {
            &self.observer_gain
        }

        pub fn integrator(&self) -> bool {
            self.integrator
        }

        /// Same plant and structure, new weights.
        pub fn with_weights(&self, weights: LqgWeights) -> Result<LqgController> {
            synthesize(&self.plant, weights, self.integrator)
        }
    }

    fn synthesize(
        plant: &StateSpace,
        weights: LqgWeights,
        integrator: bool,
    ) -> Result<LqgController> {
        if integrator {
            lqgi(plant, weights)
        } else {
            lqg(plant, weights)
        }
    }

    /// Rebuilds a controller from its stored plant and weights.
    pub fn resynthesize(result: &LqgController) -> Result<LqgController> {
        synthesize(&result.plant, result.weights.clone(), result.integrator)
    }

    fn check_weights(
        plant: &StateSpace,
        weights: &LqgWeights,
        observer_states: usize,
    ) -> Result<()> {
        let n = plant.nstates();
        let m = plant.ninputs();
        let p = plant.noutputs();
        check_shape("Q1", &weights.q1, (n, n))?;
        check_shape("Q2", &weights.q2, (m, m))?;
        check_shape("R1", &weights.r1, (observer_states, observer_states))?;
        check_shape("R2", &weights.r2, (p, p))
    }

    // Ac = A - B L - K C + K D L, Bc = K, Cc = L, Dc = 0
    fn compensator(
        mat_a: &na::DMatrix<f64>,
        mat_b: &na::DMatrix<f64>,
        mat_c: &na::DMatrix<f64>,
        mat_d: &na::DMatrix<f64>,
        mat_l: &na::DMatrix<f64>,
        mat_k: &na::DMatrix<f64>,
        sample_time: SampleTime,
    ) -> Result<StateSpace> {
        let mat_ac = mat_a - mat_b * mat_l - mat_k * mat_c + mat_k * mat_d * mat_l;
        let mat_dc = na::DMatrix::zeros(mat_d.ncols(), mat_d.nrows());
        StateSpace::new(mat_ac, mat_k.clone(), mat_l.clone(), mat_dc, sample_time)
    }

    /// LQG compensator for `plant`.
    pub fn lqg(model: &impl StateSpaceModel, weights: LqgWeights) -> Result<LqgController> {
        let plant = StateSpace::from_model(model)?;
        let n = plant.nstates();
        check_weights(&plant, &weights, n)?;
        debug!(
            nstates = n,
            ninputs = plant.ninputs(),
            noutputs = plant.noutputs(),
            sample_time = ?plant.get_sample_time(),
            "lqg synthesis"
        );

        let mat_a = plant.get_mat_a();
        let mat_b = plant.get_mat_b();
        let mat_c = plant.get_mat_c();
        let mat_d = plant.get_mat_d();
        let sample_time = plant.get_sample_time();

        let solver = RiccatiSolver::default();
        let mat_q = &weights.q1 + (mat_c.transpose() * mat_c).scale(weights.q_q);
        let mat_r1 = &weights.r1 + (mat_b * mat_b.transpose()).scale(weights.q_r);

        let mat_l = lqr_sampled(&solver, sample_time, mat_a, mat_b, &mat_q, &weights.q2)?;
        let mat_k = kalman_sampled(&solver, sample_time, mat_a, mat_c, &mat_r1, &weights.r2)?;

        let controller = compensator(mat_a, mat_b, mat_c, mat_d, &mat_l, &mat_k, sample_time)?;

        Ok(LqgController {
            plant,
            weights,
            controller,
            state_gain: mat_l,
            observer_gain: mat_k,
            integrator: false,
        })
    }

    /// LQG compensator with integral action.
    ///
    /// The plant is augmented with one constant disturbance state per input,
    /// entering where the input does. `R1` must therefore be
    /// `(n + m) x (n + m)`. The regulator gain comes from the original
    /// `(A, B)` and is extended with an identity block that cancels the
    /// estimated disturbance; the observer runs on the augmented model.
    pub fn lqgi(model: &impl StateSpaceModel, weights: LqgWeights) -> Result<LqgController> {
        let plant = StateSpace::from_model(model)?;
        let n = plant.nstates();
        let m = plant.ninputs();
        let p = plant.noutputs();
        let ne = n + m;
        check_weights(&plant, &weights, ne)?;
        debug!(
            nstates = n,
            ninputs = m,
            noutputs = p,
            sample_time = ?plant.get_sample_time(),
            "lqg synthesis with integral action"
        );

        let mat_a = plant.get_mat_a();
        let mat_b = plant.get_mat_b();
        let mat_c = plant.get_mat_c();
        let mat_d = plant.get_mat_d();
        let sample_time = plant.get_sample_time();

        // Ae = [A, B; 0, 0], Be = [B; 0], Ce = [C, 0], De = D
        let mut mat_ae = na::DMatrix::<f64>::zeros(ne, ne);
        mat_ae.view_mut((0, 0), (n, n)).copy_from(mat_a);
        mat_ae.view_mut((0, n), (n, m)).copy_from(mat_b);
        let mut mat_be = na::DMatrix::<f64>::zeros(ne, m);
        mat_be.view_mut((0, 0), (n, m)).copy_from(mat_b);
        let mut mat_ce = na::DMatrix::<f64>::zeros(p, ne);
        mat_ce.view_mut((0, 0), (p, n)).copy_from(mat_c);
        // Constant input disturbance: d' = 0 in continuous time, d[k+1] = d[k]
        // in discrete time, so the discrete lower-right block is I
        if sample_time.is_discrete() {
            mat_ae
                .view_mut((n, n), (m, m))
                .copy_from(&na::DMatrix::<f64>::identity(m, m));
        }

        let solver = RiccatiSolver::default();
        let mat_q = &weights.q1 + (mat_c.transpose() * mat_c).scale(weights.q_q);
        let mat_r1 = &weights.r1 + (&mat_be * mat_be.transpose()).scale(weights.q_r);

        let mat_l = lqr_sampled(&solver, sample_time, mat_a, mat_b, &mat_q, &weights.q2)?;
        let mut mat_le = na::DMatrix::<f64>::zeros(m, ne);
        mat_le.view_mut((0, 0), (m, n)).copy_from(&mat_l);
        mat_le
            .view_mut((0, n), (m, m))
            .copy_from(&na::DMatrix::<f64>::identity(m, m));

        let mat_k = kalman_sampled(&solver, sample_time, &mat_ae, &mat_ce, &mat_r1, &weights.r2)?;

        let controller = compensator(
            &mat_ae,
            &mat_be,
            &mat_ce,
            mat_d,
            &mat_le,
            &mat_k,
            sample_time,
        )?;

        Ok(LqgController {
            plant,
            weights,
            controller,
            state_gain: mat_le,
            observer_gain: mat_k,
            integrator: true,
        })
    }

    pub fn lqg_matrices(
        mat_a: &na::DMatrix<f64>,
        mat_b: &na::DMatrix<f64>,
        mat_c: &na::DMatrix<f64>,
        mat_d: &na::DMatrix<f64>,
        sample_time: SampleTime,
        weights: LqgWeights,
    ) -> Result<LqgController> {
        let plant = StateSpace::new(
            mat_a.clone(),
            mat_b.clone(),
            mat_c.clone(),
            mat_d.clone(),
            sample_time,
        )?;
        lqg(&plant, weights)
    }

    pub fn lqgi_matrices(
        mat_a: &na::DMatrix<f64>,
        mat_b: &na::DMatrix<f64>,
        mat_c: &na::DMatrix<f64>,
        mat_d: &na::DMatrix<f64>,
        sample_time: SampleTime,
        weights: LqgWeights,
    ) -> Result<LqgController> {
        let plant = StateSpace::new(
            mat_a.clone(),
            mat_b.clone(),
            mat_c.clone(),
            mat_d.clone(),
            sample_time,
        )?;
        lqgi(&plant, weights)
    }

}

pub use lqg::{
    lqg, lqg_matrices, lqgi, lqgi_matrices, resynthesize, LqgController, LqgWeights,
};
