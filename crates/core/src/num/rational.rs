//! Exact rational scalar.
//!
//! A thin wrapper over `num_rational::Ratio<i64>` that keeps the
//! canonicalization points of the search algorithms explicit. `Ratio` reduces
//! on construction, so [`Rational::canonicalized`] is cheap; it exists so the
//! cross-component boundaries that require canonical form read as such.

use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use num_rational::Ratio;
use num_traits::{One, Signed, ToPrimitive, Zero};

use super::scalar::Scalar;

/// Exact rational number with `i64` numerator and denominator.
///
/// Deep trees can overflow 64-bit components; the test states in this crate
/// keep payoffs and probabilities to small fractions so that exact runs stay
/// well inside range.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rational(Ratio<i64>);

impl Rational {
    /// `num / den` in lowest terms. `den` must be non-zero.
    #[must_use]
    pub fn new(num: i64, den: i64) -> Self {
        Self(Ratio::new(num, den))
    }

    #[must_use]
    pub fn numer(self) -> i64 {
        *self.0.numer()
    }

    #[must_use]
    pub fn denom(self) -> i64 {
        *self.0.denom()
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self(Ratio::zero())
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.numer(), self.0.denom())
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.numer(), self.0.denom())
    }
}

impl Add for Rational {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Rational {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul for Rational {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self(self.0 * rhs.0)
    }
}

impl Div for Rational {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self(self.0 / rhs.0)
    }
}

impl Neg for Rational {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl AddAssign for Rational {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Rational {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl MulAssign for Rational {
    fn mul_assign(&mut self, rhs: Self) {
        self.0 *= rhs.0;
    }
}

impl DivAssign for Rational {
    fn div_assign(&mut self, rhs: Self) {
        self.0 /= rhs.0;
    }
}

impl Scalar for Rational {
    const EXACT: bool = true;

    fn zero() -> Self {
        Self(Ratio::zero())
    }

    fn one() -> Self {
        Self(Ratio::one())
    }

    fn from_fraction(num: i64, den: i64) -> Self {
        Self::new(num, den)
    }

    fn from_f64(x: f64) -> Self {
        Ratio::approximate_float(x).map_or_else(Self::zero, Self)
    }

    fn to_f64(self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }

    fn abs(self) -> Self {
        Self(self.0.abs())
    }

    fn exp(self) -> Self {
        Self::from_f64(self.to_f64().exp())
    }

    fn canonicalized(self) -> Self {
        Self(self.0.reduced())
    }

    fn fuzzy_eq(self, other: Self) -> bool {
        self.canonicalized() == other.canonicalized()
    }
}
