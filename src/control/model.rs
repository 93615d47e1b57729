use nalgebra as na;

use crate::error::{check_shape, ControlError, Result};

/// Sampling tag carried by every system value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleTime {
    Continuous,
    Discrete(f64),
}

impl SampleTime {
    pub fn is_discrete(&self) -> bool {
        matches!(self, SampleTime::Discrete(_))
    }

    pub fn period(&self) -> Option<f64> {
        match self {
            SampleTime::Continuous => None,
            SampleTime::Discrete(dt) => Some(*dt),
        }
    }

    /// Rejects a non-positive or non-finite sampling period.
    pub(crate) fn validate(&self) -> Result<()> {
        if let SampleTime::Discrete(dt) = *self {
            if !(dt > 0.0) || !dt.is_finite() {
                return Err(ControlError::InvalidArgument(format!(
                    "sampling period must be positive and finite, got {}",
                    dt
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn check_same(&self, other: &SampleTime) -> Result<()> {
        if self != other {
            return Err(ControlError::SampleTimeMismatch {
                left: *self,
                right: *other,
            });
        }
        Ok(())
    }
}

pub trait StateSpaceModel {
    fn get_mat_a(&self) -> &na::DMatrix<f64>;
    fn get_mat_b(&self) -> &na::DMatrix<f64>;
    fn get_mat_c(&self) -> &na::DMatrix<f64>;
    fn get_mat_d(&self) -> &na::DMatrix<f64>;
    fn get_sample_time(&self) -> SampleTime;
}

/// Linear time-invariant system `x' = Ax + Bu`, `y = Cx + Du`.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpace {
    mat_a: na::DMatrix<f64>,
    mat_b: na::DMatrix<f64>,
    mat_c: na::DMatrix<f64>,
    mat_d: na::DMatrix<f64>,
    sample_time: SampleTime,
}

impl StateSpace {
    pub fn new(
        mat_a: na::DMatrix<f64>,
        mat_b: na::DMatrix<f64>,
        mat_c: na::DMatrix<f64>,
        mat_d: na::DMatrix<f64>,
        sample_time: SampleTime,
    ) -> Result<StateSpace> {
        let n = mat_a.nrows();
        let m = mat_b.ncols();
        let p = mat_c.nrows();

        check_shape("A", &mat_a, (n, n))?;
        check_shape("B", &mat_b, (n, m))?;
        check_shape("C", &mat_c, (p, n))?;
        check_shape("D", &mat_d, (p, m))?;

        sample_time.validate()?;

        Ok(StateSpace {
            mat_a,
            mat_b,
            mat_c,
            mat_d,
            sample_time,
        })
    }

    /// Builds a system by copying the matrices of any model.
    pub fn from_model(model: &impl StateSpaceModel) -> Result<StateSpace> {
        StateSpace::new(
            model.get_mat_a().clone(),
            model.get_mat_b().clone(),
            model.get_mat_c().clone(),
            model.get_mat_d().clone(),
            model.get_sample_time(),
        )
    }

    pub fn nstates(&self) -> usize {
        self.mat_a.nrows()
    }

    pub fn ninputs(&self) -> usize {
        self.mat_b.ncols()
    }

    pub fn noutputs(&self) -> usize {
        self.mat_c.nrows()
    }

    pub fn has_feedthrough(&self) -> bool {
        self.mat_d.iter().any(|&v| v != 0.0)
    }

    pub fn into_matrices(
        self,
    ) -> (
        na::DMatrix<f64>,
        na::DMatrix<f64>,
        na::DMatrix<f64>,
        na::DMatrix<f64>,
    ) {
        (self.mat_a, self.mat_b, self.mat_c, self.mat_d)
    }
}

impl StateSpaceModel for StateSpace {
    fn get_mat_a(&self) -> &na::DMatrix<f64> {
        &self.mat_a
    }

    fn get_mat_b(&self) -> &na::DMatrix<f64> {
        &self.mat_b
    }

    fn get_mat_c(&self) -> &na::DMatrix<f64> {
        &self.mat_c
    }

    fn get_mat_d(&self) -> &na::DMatrix<f64> {
        &self.mat_d
    }

    fn get_sample_time(&self) -> SampleTime {
        self.sample_time
    }
}

// Backward-Euler discretization of a continuous model
fn discretize(
    mat_ac: &na::DMatrix<f64>,
    mat_bc: &na::DMatrix<f64>,
    mat_cc: &na::DMatrix<f64>,
    sampling_dt: f64,
) -> Result<StateSpace> {
    if !(sampling_dt > 0.0) {
        return Err(ControlError::InvalidArgument(format!(
            "sampling period must be positive, got {}",
            sampling_dt
        )));
    }

    let mat_i = na::DMatrix::<f64>::identity(mat_ac.nrows(), mat_ac.nrows());
    let mat_a = (mat_i - mat_ac.scale(sampling_dt))
        .try_inverse()
        .ok_or_else(|| ControlError::SingularMatrix("I - A*dt during discretization".into()))?;
    let mat_b = &mat_a * mat_bc.scale(sampling_dt);
    let mat_d = na::DMatrix::zeros(mat_cc.nrows(), mat_bc.ncols());

    StateSpace::new(
        mat_a,
        mat_b,
        mat_cc.clone(),
        mat_d,
        SampleTime::Discrete(sampling_dt),
    )
}

pub mod dc_motor {
    use nalgebra as na;
    use std::default::Default;

    use super::{discretize, SampleTime, StateSpace};
    use crate::error::Result;

    /// Armature-controlled DC motor; state is (speed, current), input is voltage.
    #[derive(Debug, Clone)]
    pub struct Parameters {
        pub b: f64,
        pub j: f64,
        pub k: f64,
        pub l: f64,
        pub r: f64,
    }

    impl Default for Parameters {
        fn default() -> Parameters {
            Parameters {
                b: 0.1,
                j: 0.01,
                k: 0.01,
                l: 0.5,
                r: 1.0,
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Model {
        mat_ac: na::DMatrix<f64>,
        mat_bc: na::DMatrix<f64>,
        mat_cc: na::DMatrix<f64>,
    }

    impl Model {
        pub fn new(params: Parameters) -> Model {
            let mat_ac = na::dmatrix![
                -params.b / params.j, params.k / params.j;
                -params.k / params.l, -params.r / params.l;
            ];
            let mat_bc = na::dmatrix![0.0; 1.0 / params.l];
            let mat_cc = na::dmatrix![1.0, 0.0];

            Model {
                mat_ac,
                mat_bc,
                mat_cc,
            }
        }

        pub fn continuous(&self) -> Result<StateSpace> {
            StateSpace::new(
                self.mat_ac.clone(),
                self.mat_bc.clone(),
                self.mat_cc.clone(),
                na::DMatrix::zeros(1, 1),
                SampleTime::Continuous,
            )
        }

        pub fn discretized(&self, sampling_dt: f64) -> Result<StateSpace> {
            discretize(&self.mat_ac, &self.mat_bc, &self.mat_cc, sampling_dt)
        }
    }
}

pub mod two_mass {
    use nalgebra as na;
    use std::default::Default;

    use super::{discretize, SampleTime, StateSpace};
    use crate::error::Result;

    /// Two masses joined by springs and dampers, force applied to the second
    /// mass and position of the first one measured.
    #[derive(Debug, Clone)]
    pub struct Parameters {
        pub m1: f64,
        pub m2: f64,
        pub k1: f64,
        pub k2: f64,
        pub d1: f64,
        pub d2: f64,
    }

    impl Default for Parameters {
        fn default() -> Parameters {
            Parameters {
                m1: 2.0,
                m2: 2.0,
                k1: 100.0,
                k2: 200.0,
                d1: 1.0,
                d2: 5.0,
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Model {
        mat_ac: na::DMatrix<f64>,
        mat_bc: na::DMatrix<f64>,
        mat_cc: na::DMatrix<f64>,
    }

    impl Model {
        pub fn new(params: Parameters) -> Model {
            let mat_ac = na::dmatrix![
                0.0, 1.0, 0.0, 0.0;
                -(params.k1 + params.k2) / params.m1, -(params.d1 + params.d2) / params.m1,
                    params.k2 / params.m1, params.d2 / params.m1;
                0.0, 0.0, 0.0, 1.0;
                params.k2 / params.m2, params.d2 / params.m2,
                    -params.k2 / params.m2, -params.d2 / params.m2
            ];
            let mat_bc = na::dmatrix![0.0; 0.0; 0.0; 1.0 / params.m2];
            let mat_cc = na::dmatrix![1.0, 0.0, 0.0, 0.0];

            Model {
                mat_ac,
                mat_bc,
                mat_cc,
            }
        }

        pub fn continuous(&self) -> Result<StateSpace> {
            StateSpace::new(
                self.mat_ac.clone(),
                self.mat_bc.clone(),
                self.mat_cc.clone(),
                na::DMatrix::zeros(1, 1),
                SampleTime::Continuous,
            )
        }

        pub fn discretized(&self, sampling_dt: f64) -> Result<StateSpace> {
            discretize(&self.mat_ac, &self.mat_bc, &self.mat_cc, sampling_dt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::dmatrix;

    #[test]
    fn rejects_inconsistent_shapes() {
        let res = StateSpace::new(
            dmatrix![0.0, 1.0; 0.0, 0.0],
            dmatrix![0.0; 1.0; 2.0],
            dmatrix![1.0, 0.0],
            dmatrix![0.0],
            SampleTime::Continuous,
        );
        assert!(matches!(res, Err(ControlError::DimensionMismatch(_))));

        let res = StateSpace::new(
            dmatrix![0.0, 1.0; 0.0, 0.0],
            dmatrix![0.0; 1.0],
            dmatrix![1.0, 0.0],
            dmatrix![0.0, 0.0],
            SampleTime::Continuous,
        );
        assert!(matches!(res, Err(ControlError::DimensionMismatch(_))));
    }

    #[test]
    fn rejects_non_positive_period() {
        let res = StateSpace::new(
            dmatrix![0.5],
            dmatrix![1.0],
            dmatrix![1.0],
            dmatrix![0.0],
            SampleTime::Discrete(0.0),
        );
        assert!(matches!(res, Err(ControlError::InvalidArgument(_))));
    }

    #[test]
    fn reports_dimensions_and_feedthrough() {
        let sys = StateSpace::new(
            dmatrix![0.0, 1.0; -2.0, -3.0],
            dmatrix![0.0; 1.0],
            dmatrix![1.0, 0.0; 0.0, 1.0],
            dmatrix![0.0; 0.5],
            SampleTime::Continuous,
        )
        .unwrap();
        assert_eq!(sys.nstates(), 2);
        assert_eq!(sys.ninputs(), 1);
        assert_eq!(sys.noutputs(), 2);
        assert!(sys.has_feedthrough());
    }

    #[test]
    fn dc_motor_discretization() {
        let model = dc_motor::Model::new(dc_motor::Parameters::default());
        let sys = model.discretized(0.05).unwrap();
        assert_eq!(sys.get_sample_time(), SampleTime::Discrete(0.05));

        // (I - Ac dt) A = I
        let cont = model.continuous().unwrap();
        let lhs = (na::DMatrix::identity(2, 2) - cont.get_mat_a().scale(0.05)) * sys.get_mat_a();
        assert_relative_eq!(lhs, na::DMatrix::identity(2, 2), epsilon = 1e-12);
        let expected_b = sys.get_mat_a() * cont.get_mat_b().scale(0.05);
        assert_relative_eq!(sys.get_mat_b().clone(), expected_b, epsilon = 1e-12);
    }

    #[test]
    fn two_mass_shapes() {
        let sys = two_mass::Model::new(two_mass::Parameters::default())
            .continuous()
            .unwrap();
        assert_eq!(sys.nstates(), 4);
        assert_eq!(sys.ninputs(), 1);
        assert_eq!(sys.noutputs(), 1);
        assert!(!sys.has_feedthrough());
    }
}
