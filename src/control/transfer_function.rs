use std::fmt::Debug;

use nalgebra as na;
use na::Complex;

use crate::control::feedback::generic_feedback;
use crate::control::model::SampleTime;
use crate::control::polynomial::Polynomial;
use crate::error::{ControlError, Result};

pub trait SisoElement: Clone + Debug + Sized {
    fn zero() -> Self;
    fn one() -> Self;
    fn add(&self, other: &Self) -> Self;
    fn mul(&self, other: &Self) -> Self;
    fn inv(&self) -> Result<Self>;
    fn eval(&self, s: Complex<f64>) -> Complex<f64>;
    fn to_rational(&self) -> SisoRational;
    fn from_rational(rational: &SisoRational) -> Self;

    /// Closed loop `L / (1 + L)` of this element under unity negative feedback.
    fn feedback_loop(&self) -> Result<Self> {
        generic_feedback(self)
    }
}

/// `num(s) / den(s)` with a monic denominator.
#[derive(Debug, Clone, PartialEq)]
pub struct SisoRational {
    num: Polynomial,
    den: Polynomial,
}

impl SisoRational {
    pub fn new(num: Polynomial, den: Polynomial) -> Result<SisoRational> {
        if den.is_zero() {
            return Err(ControlError::InvalidArgument(
                "transfer function denominator is zero".into(),
            ));
        }
        Ok(SisoRational::normalized(num, den))
    }

    // den must be nonzero
    pub(crate) fn normalized(num: Polynomial, den: Polynomial) -> SisoRational {
        let lead = den.leading();
        SisoRational {
            num: num.scale(1.0 / lead),
            den: den.scale(1.0 / lead),
        }
    }

    pub fn num(&self) -> &Polynomial {
        &self.num
    }

    pub fn den(&self) -> &Polynomial {
        &self.den
    }
}

impl SisoElement for SisoRational {
    fn zero() -> Self {
        SisoRational::normalized(Polynomial::zero(), Polynomial::one())
    }

    fn one() -> Self {
        SisoRational::normalized(Polynomial::one(), Polynomial::one())
    }

    fn add(&self, other: &Self) -> Self {
        let num = self.num.mul(&other.den).add(&other.num.mul(&self.den));
        SisoRational::normalized(num, self.den.mul(&other.den))
    }

    fn mul(&self, other: &Self) -> Self {
        SisoRational::normalized(self.num.mul(&other.num), self.den.mul(&other.den))
    }

    fn inv(&self) -> Result<Self> {
        if self.num.is_zero() {
            return Err(ControlError::InvalidArgument(
                "cannot invert a zero transfer function".into(),
            ));
        }
        Ok(SisoRational::normalized(self.den.clone(), self.num.clone()))
    }

    fn eval(&self, s: Complex<f64>) -> Complex<f64> {
        self.num.eval(s) / self.den.eval(s)
    }

    fn to_rational(&self) -> SisoRational {
        self.clone()
    }

    fn from_rational(rational: &SisoRational) -> Self {
        rational.clone()
    }

    // P / (P + Q) directly, without the common factor Q that the generic
    // product introduces.
    fn feedback_loop(&self) -> Result<Self> {
        let den = self.num.add(&self.den);
        if den.is_zero() {
            return Err(ControlError::InvalidArgument(
                "closed loop denominator 1 + L vanishes identically".into(),
            ));
        }
        Ok(SisoRational::normalized(self.num.clone(), den))
    }
}

/// `gain * prod(s - z_i) / prod(s - p_j)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SisoZpk {
    zeros: Vec<Complex<f64>>,
    poles: Vec<Complex<f64>>,
    gain: f64,
}

impl SisoZpk {
    pub fn new(zeros: Vec<Complex<f64>>, poles: Vec<Complex<f64>>, gain: f64) -> Result<SisoZpk> {
        // both sets must give real polynomials
        Polynomial::from_roots(&zeros)?;
        Polynomial::from_roots(&poles)?;
        Ok(SisoZpk { zeros, poles, gain })
    }

    pub fn zeros(&self) -> &[Complex<f64>] {
        &self.zeros
    }

    pub fn poles(&self) -> &[Complex<f64>] {
        &self.poles
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    fn zero_poly(&self) -> Polynomial {
        Polynomial::from_roots_unchecked(&self.zeros)
    }

    fn pole_poly(&self) -> Polynomial {
        Polynomial::from_roots_unchecked(&self.poles)
    }
}

impl SisoElement for SisoZpk {
    fn zero() -> Self {
        SisoZpk {
            zeros: Vec::new(),
            poles: Vec::new(),
            gain: 0.0,
        }
    }

    fn one() -> Self {
        SisoZpk {
            zeros: Vec::new(),
            poles: Vec::new(),
            gain: 1.0,
        }
    }

    // Sums need the numerator polynomial rebuilt and factored again
    fn add(&self, other: &Self) -> Self {
        if self.gain == 0.0 {
            return other.clone();
        }
        if other.gain == 0.0 {
            return self.clone();
        }

        let num = self
            .zero_poly()
            .mul(&other.pole_poly())
            .scale(self.gain)
            .add(&other.zero_poly().mul(&self.pole_poly()).scale(other.gain));
        let mut poles = self.poles.clone();
        poles.extend_from_slice(&other.poles);

        if num.is_zero() {
            return SisoZpk {
                zeros: Vec::new(),
                poles,
                gain: 0.0,
            };
        }

        SisoZpk {
            zeros: num.roots(),
            poles,
            gain: num.leading(),
        }
    }

    fn mul(&self, other: &Self) -> Self {
        if self.gain == 0.0 || other.gain == 0.0 {
            return SisoZpk::zero();
        }
        let mut zeros = self.zeros.clone();
        zeros.extend_from_slice(&other.zeros);
        let mut poles = self.poles.clone();
        poles.extend_from_slice(&other.poles);
        SisoZpk {
            zeros,
            poles,
            gain: self.gain * other.gain,
        }
    }

    fn inv(&self) -> Result<Self> {
        if self.gain == 0.0 {
            return Err(ControlError::InvalidArgument(
                "cannot invert a zero transfer function".into(),
            ));
        }
        Ok(SisoZpk {
            zeros: self.poles.clone(),
            poles: self.zeros.clone(),
            gain: 1.0 / self.gain,
        })
    }

    fn eval(&self, s: Complex<f64>) -> Complex<f64> {
        let num = self
            .zeros
            .iter()
            .fold(Complex::new(self.gain, 0.0), |acc, z| acc * (s - z));
        let den = self
            .poles
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, p| acc * (s - p));
        num / den
    }

    fn to_rational(&self) -> SisoRational {
        SisoRational::normalized(self.zero_poly().scale(self.gain), self.pole_poly())
    }

    fn from_rational(rational: &SisoRational) -> Self {
        let (zeros, gain) = if rational.num.is_zero() {
            (Vec::new(), 0.0)
        } else {
            (
                rational.num.roots(),
                rational.num.leading() / rational.den.leading(),
            )
        };
        SisoZpk {
            zeros,
            poles: rational.den.roots(),
            gain,
        }
    }

    // k Z / (P + k Z), normalized by the leading coefficient and refactored
    fn feedback_loop(&self) -> Result<Self> {
        let den = self.pole_poly().add(&self.zero_poly().scale(self.gain));
        if den.is_zero() {
            return Err(ControlError::InvalidArgument(
                "closed loop denominator 1 + L vanishes identically".into(),
            ));
        }
        let lead = den.leading();
        Ok(SisoZpk {
            zeros: self.zeros.clone(),
            poles: den.roots(),
            gain: self.gain / lead,
        })
    }
}

/// `noutputs x ninputs` matrix of scalar transfer functions
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction<T> {
    elements: Vec<T>,
    noutputs: usize,
    ninputs: usize,
    sample_time: SampleTime,
}

pub type RationalTf = TransferFunction<SisoRational>;
pub type ZpkTf = TransferFunction<SisoZpk>;

impl<T: SisoElement> TransferFunction<T> {
    /// Builds a transfer-function matrix from its rows.
    pub fn new(rows: Vec<Vec<T>>, sample_time: SampleTime) -> Result<TransferFunction<T>> {
        let noutputs = rows.len();
        let ninputs = rows.first().map_or(0, |r| r.len());
        if noutputs == 0 || ninputs == 0 {
            return Err(ControlError::DimensionMismatch(
                "transfer function matrix must have at least one element".into(),
            ));
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != ninputs) {
            return Err(ControlError::DimensionMismatch(format!(
                "row {} has {} elements, expected {}",
                bad,
                rows[bad].len(),
                ninputs
            )));
        }
        sample_time.validate()?;

        Ok(TransferFunction {
            elements: rows.into_iter().flatten().collect(),
            noutputs,
            ninputs,
            sample_time,
        })
    }

    pub fn siso(element: T, sample_time: SampleTime) -> Result<TransferFunction<T>> {
        sample_time.validate()?;
        Ok(TransferFunction {
            elements: vec![element],
            noutputs: 1,
            ninputs: 1,
            sample_time,
        })
    }

    pub fn noutputs(&self) -> usize {
        self.noutputs
    }

    pub fn ninputs(&self) -> usize {
        self.ninputs
    }

    pub fn sample_time(&self) -> SampleTime {
        self.sample_time
    }

    pub fn is_siso(&self) -> bool {
        self.noutputs == 1 && self.ninputs == 1
    }

    pub fn element(&self, row: usize, col: usize) -> &T {
        &self.elements[row * self.ninputs + col]
    }

    /// The single element of a SISO model, `Unsupported` otherwise.
    pub fn as_siso(&self, operation: &str) -> Result<&T> {
        if !self.is_siso() {
            return Err(ControlError::Unsupported(format!(
                "{} requires a SISO transfer function, got {}x{}; \
                 MIMO transfer-function inversion is not supported, convert to \
                 state space and use Feedback::feedback_with",
                operation, self.noutputs, self.ninputs
            )));
        }
        Ok(&self.elements[0])
    }

    /// Series connection `self * other` (other acts first).
    pub fn mul(&self, other: &TransferFunction<T>) -> Result<TransferFunction<T>> {
        self.sample_time.check_same(&other.sample_time)?;
        if self.ninputs != other.noutputs {
            return Err(ControlError::DimensionMismatch(format!(
                "cannot multiply {}x{} by {}x{} transfer function",
                self.noutputs, self.ninputs, other.noutputs, other.ninputs
            )));
        }

        let mut elements = Vec::with_capacity(self.noutputs * other.ninputs);
        for i in 0..self.noutputs {
            for j in 0..other.ninputs {
                let mut acc = T::zero();
                for k in 0..self.ninputs {
                    acc = acc.add(&self.element(i, k).mul(other.element(k, j)));
                }
                elements.push(acc);
            }
        }

        Ok(TransferFunction {
            elements,
            noutputs: self.noutputs,
            ninputs: other.ninputs,
            sample_time: self.sample_time,
        })
    }

    pub fn map_elements<U: SisoElement>(&self, f: impl Fn(&T) -> U) -> TransferFunction<U> {
        TransferFunction {
            elements: self.elements.iter().map(f).collect(),
            noutputs: self.noutputs,
            ninputs: self.ninputs,
            sample_time: self.sample_time,
        }
    }

    pub fn to_rational(&self) -> RationalTf {
        self.map_elements(|e| e.to_rational())
    }

    pub fn to_zpk(&self) -> ZpkTf {
        self.map_elements(|e| SisoZpk::from_rational(&e.to_rational()))
    }

    /// Frequency-domain value of element `(row, col)` at `s`.
    pub fn eval(&self, row: usize, col: usize, s: Complex<f64>) -> Complex<f64> {
        self.element(row, col).eval(s)
    }
}

impl RationalTf {
    pub fn from_polynomials(
        num: Polynomial,
        den: Polynomial,
        sample_time: SampleTime,
    ) -> Result<RationalTf> {
        TransferFunction::siso(SisoRational::new(num, den)?, sample_time)
    }
}

impl ZpkTf {
    pub fn from_zpk(
        zeros: Vec<Complex<f64>>,
        poles: Vec<Complex<f64>>,
        gain: f64,
        sample_time: SampleTime,
    ) -> Result<ZpkTf> {
        TransferFunction::siso(SisoZpk::new(zeros, poles, gain)?, sample_time)
    }
}
