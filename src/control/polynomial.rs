use nalgebra as na;
use na::{Complex, Normed};

use crate::error::{ControlError, Result};

/// Real polynomial stored with coefficients in descending powers,
/// `p(s) = c[0] s^n + ... + c[n]`. Leading zeros are always trimmed and the
/// zero polynomial is `[0.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    pub fn new(coeffs: Vec<f64>) -> Polynomial {
        let first = coeffs.iter().position(|&c| c != 0.0);
        let coeffs = match first {
            Some(i) => coeffs[i..].to_vec(),
            None => vec![0.0],
        };
        Polynomial { coeffs }
    }

    pub fn constant(value: f64) -> Polynomial {
        Polynomial::new(vec![value])
    }

    pub fn zero() -> Polynomial {
        Polynomial::constant(0.0)
    }

    pub fn one() -> Polynomial {
        Polynomial::constant(1.0)
    }

    /// Monic polynomial with the given roots. Complex roots must come in
    /// conjugate pairs, otherwise the coefficients are not real.
    pub fn from_roots(roots: &[Complex<f64>]) -> Result<Polynomial> {
        let acc = complex_product(roots);

        let scale = acc.iter().fold(1.0f64, |m, c| m.max(c.norm()));
        if let Some(c) = acc.iter().find(|c| c.im.abs() > 1e-8 * scale) {
            return Err(ControlError::InvalidArgument(format!(
                "roots are not closed under conjugation (imaginary coefficient {:e})",
                c.im
            )));
        }

        Ok(Polynomial::new(acc.iter().map(|c| c.re).collect()))
    }

    /// Same as `from_roots` for roots already known to be conjugate closed;
    /// imaginary residue is discarded.
    pub(crate) fn from_roots_unchecked(roots: &[Complex<f64>]) -> Polynomial {
        Polynomial::new(complex_product(roots).iter().map(|c| c.re).collect())
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn leading(&self) -> f64 {
        self.coeffs[0]
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.len() == 1 && self.coeffs[0] == 0.0
    }

    pub fn scale(&self, factor: f64) -> Polynomial {
        Polynomial::new(self.coeffs.iter().map(|c| c * factor).collect())
    }

    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let len = self.coeffs.len().max(other.coeffs.len());
        let mut out = vec![0.0; len];
        for (i, c) in self.coeffs.iter().rev().enumerate() {
            out[len - 1 - i] += c;
        }
        for (i, c) in other.coeffs.iter().rev().enumerate() {
            out[len - 1 - i] += c;
        }
        Polynomial::new(out)
    }

    pub fn sub(&self, other: &Polynomial) -> Polynomial {
        self.add(&other.scale(-1.0))
    }

    /// Product by discrete convolution of the coefficient sequences.
    pub fn mul(&self, other: &Polynomial) -> Polynomial {
        let mut out = vec![0.0; self.coeffs.len() + other.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in other.coeffs.iter().enumerate() {
                out[i + j] += a * b;
            }
        }
        Polynomial::new(out)
    }

    pub fn monic(&self) -> Result<Polynomial> {
        if self.is_zero() {
            return Err(ControlError::InvalidArgument(
                "zero polynomial cannot be normalized".into(),
            ));
        }
        Ok(self.scale(1.0 / self.leading()))
    }

    pub fn eval(&self, s: Complex<f64>) -> Complex<f64> {
        self.coeffs
            .iter()
            .fold(Complex::new(0.0, 0.0), |acc, &c| acc * s + c)
    }

    /// Roots as eigenvalues of the companion matrix.
    pub fn roots(&self) -> Vec<Complex<f64>> {
        let n = self.degree();
        match n {
            0 => Vec::new(),
            1 => vec![Complex::new(-self.coeffs[1] / self.coeffs[0], 0.0)],
            _ => {
                let lead = self.leading();
                let mut companion = na::DMatrix::<f64>::zeros(n, n);
                for j in 0..n {
                    companion[(0, j)] = -self.coeffs[j + 1] / lead;
                }
                for i in 1..n {
                    companion[(i, i - 1)] = 1.0;
                }
                companion.complex_eigenvalues().iter().cloned().collect()
            }
        }
    }
}

// Coefficients of prod (s - r_i)
fn complex_product(roots: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut acc = vec![Complex::new(1.0, 0.0)];
    for root in roots {
        let mut next = vec![Complex::new(0.0, 0.0); acc.len() + 1];
        for (i, c) in acc.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * root;
        }
        acc = next;
    }
    acc
}
