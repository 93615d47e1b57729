use nalgebra as na;
use tracing::debug;

use crate::control::model::{SampleTime, StateSpace, StateSpaceModel};
use crate::control::polynomial::Polynomial;
use crate::control::transfer_function::{RationalTf, SisoElement, SisoRational, TransferFunction};
use crate::error::{ControlError, Result};

/// Negative feedback interconnection: `u1 = r - y2`, `u2 = y1`, mapping `r` to `y1`.
pub trait Feedback: Sized {
    /// Unity negative feedback around `self`.
    fn feedback(&self) -> Result<Self>;

    /// `self` in the forward path, `other` in the feedback path.
    fn feedback_with(&self, other: &Self) -> Result<Self>;
}

/// Generic closed loop `L (1 + L)⁻¹` built from element arithmetic only.
pub fn generic_feedback<T: SisoElement>(loop_gain: &T) -> Result<T> {
    let return_difference = loop_gain.add(&T::one());
    Ok(loop_gain.mul(&return_difference.inv()?))
}

impl<T: SisoElement> Feedback for TransferFunction<T> {
    fn feedback(&self) -> Result<Self> {
        let element = self.as_siso("feedback")?;
        debug!(
            representation = std::any::type_name::<T>(),
            "transfer function feedback"
        );
        TransferFunction::siso(element.feedback_loop()?, self.sample_time())
    }

    fn feedback_with(&self, other: &Self) -> Result<Self> {
        self.mul(other)?.feedback()
    }
}

impl Feedback for StateSpace {
    fn feedback(&self) -> Result<Self> {
        if self.noutputs() != self.ninputs() {
            return Err(ControlError::DimensionMismatch(format!(
                "unity feedback needs as many outputs as inputs, got {} outputs and {} inputs; \
                 use feedback_with and an explicit feedback system",
                self.noutputs(),
                self.ninputs()
            )));
        }
        if self.has_feedthrough() {
            return Err(ControlError::Unsupported(
                "unity feedback around a system with nonzero D forms an algebraic loop".into(),
            ));
        }

        // Second system is the static identity gain
        let mat_a = self.get_mat_a() - self.get_mat_b() * self.get_mat_c();
        StateSpace::new(
            mat_a,
            self.get_mat_b().clone(),
            self.get_mat_c().clone(),
            self.get_mat_d().clone(),
            self.get_sample_time(),
        )
    }

    fn feedback_with(&self, other: &Self) -> Result<Self> {
        self.get_sample_time().check_same(&other.get_sample_time())?;
        if other.ninputs() != self.noutputs() || other.noutputs() != self.ninputs() {
            return Err(ControlError::DimensionMismatch(format!(
                "feedback system must be {}x{} (outputs x inputs), got {}x{}",
                self.ninputs(),
                self.noutputs(),
                other.noutputs(),
                other.ninputs()
            )));
        }
        if self.has_feedthrough() && other.has_feedthrough() {
            return Err(ControlError::Unsupported(
                "both systems have nonzero feedthrough, the interconnection has an \
                 algebraic loop; remove D from one of them"
                    .into(),
            ));
        }

        let (n1, n2) = (self.nstates(), other.nstates());
        let m1 = self.ninputs();
        let p1 = self.noutputs();
        debug!(n1, n2, m1, p1, "state space feedback");

        let (a1, b1, c1, d1) = (
            self.get_mat_a(),
            self.get_mat_b(),
            self.get_mat_c(),
            self.get_mat_d(),
        );
        let (a2, b2, c2, d2) = (
            other.get_mat_a(),
            other.get_mat_b(),
            other.get_mat_c(),
            other.get_mat_d(),
        );

        let mut mat_a = na::DMatrix::<f64>::zeros(n1 + n2, n1 + n2);
        mat_a
            .view_mut((0, 0), (n1, n1))
            .copy_from(&(a1 - b1 * d2 * c1));
        mat_a.view_mut((0, n1), (n1, n2)).copy_from(&(-(b1 * c2)));
        mat_a.view_mut((n1, 0), (n2, n1)).copy_from(&(b2 * c1));
        mat_a
            .view_mut((n1, n1), (n2, n2))
            .copy_from(&(a2 - b2 * d1 * c2));

        let mut mat_b = na::DMatrix::<f64>::zeros(n1 + n2, m1);
        mat_b.view_mut((0, 0), (n1, m1)).copy_from(b1);
        mat_b.view_mut((n1, 0), (n2, m1)).copy_from(&(b2 * d1));

        let mut mat_c = na::DMatrix::<f64>::zeros(p1, n1 + n2);
        mat_c.view_mut((0, 0), (p1, n1)).copy_from(c1);
        mat_c.view_mut((0, n1), (p1, n2)).copy_from(&(-(d1 * c2)));

        StateSpace::new(mat_a, mat_b, mat_c, d1.clone(), self.get_sample_time())
    }
}

/// Reference-to-output map `BT / (AR + BS)` of a two-degree-of-freedom
/// controller `R u = T r - S y` around the plant `B / A`.
pub fn feedback2dof_poly(
    b: &Polynomial,
    a: &Polynomial,
    r: &Polynomial,
    s: &Polynomial,
    t: &Polynomial,
    sample_time: SampleTime,
) -> Result<RationalTf> {
    let num = b.mul(t);
    let den = a.mul(r).add(&b.mul(s));
    if den.is_zero() {
        return Err(ControlError::InvalidArgument(
            "closed loop characteristic polynomial AR + BS is zero".into(),
        ));
    }
    TransferFunction::siso(SisoRational::normalized(num, den), sample_time)
}

pub fn feedback2dof(
    plant: &RationalTf,
    r: &Polynomial,
    s: &Polynomial,
    t: &Polynomial,
) -> Result<RationalTf> {
    let element = plant.as_siso("feedback2dof")?;
    feedback2dof_poly(element.num(), element.den(), r, s, t, plant.sample_time())
}
