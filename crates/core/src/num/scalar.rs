//! Scalar abstraction shared by every search algorithm.
//!
//! Algorithms are generic over a [`Scalar`]: `f64` for fast approximate
//! search, [`Rational`](crate::num::Rational) for exact arithmetic. Fuzzy
//! comparison is exact after canonicalization in rational mode and uses a
//! fixed `2⁻²⁴` epsilon in float mode.

use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Comparison epsilon for floating scalars: `2⁻²⁴`.
pub const FUZZY_EPSILON: f64 = 1.0 / (1u64 << 24) as f64;

/// Numeric scalar used for payoffs, probabilities and strategies.
pub trait Scalar:
    Copy
    + Clone
    + Debug
    + Display
    + Default
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// True when equality is exact (rational mode).
    const EXACT: bool;

    fn zero() -> Self;

    fn one() -> Self;

    /// Exact fraction constructor. `den` must be non-zero.
    fn from_fraction(num: i64, den: i64) -> Self;

    /// Closest representable scalar to `x`.
    fn from_f64(x: f64) -> Self;

    fn to_f64(self) -> f64;

    fn abs(self) -> Self;

    /// `e^self`, computed in the float domain.
    #[must_use]
    fn exp(self) -> Self;

    /// Reduce to lowest terms in rational mode; identity for floats.
    #[must_use]
    fn canonicalized(self) -> Self;

    /// Exact equality after canonicalization in rational mode,
    /// `|x − y| < 2⁻²⁴` in float mode.
    fn fuzzy_eq(self, other: Self) -> bool;

    #[must_use]
    fn max(self, other: Self) -> Self {
        if self > other {
            self
        } else {
            other
        }
    }

    #[must_use]
    fn min(self, other: Self) -> Self {
        if self < other {
            self
        } else {
            other
        }
    }
}

impl Scalar for f64 {
    const EXACT: bool = false;

    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_fraction(num: i64, den: i64) -> Self {
        debug_assert!(den != 0, "zero denominator");
        num as f64 / den as f64
    }

    fn from_f64(x: f64) -> Self {
        x
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn canonicalized(self) -> Self {
        self
    }

    fn fuzzy_eq(self, other: Self) -> bool {
        f64::abs(self - other) < FUZZY_EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_macros::timed_test;

    #[timed_test]
    fn fuzzy_eq_uses_fixed_epsilon() {
        assert!(0.5_f64.fuzzy_eq(0.5 + FUZZY_EPSILON / 2.0));
        assert!(!0.5_f64.fuzzy_eq(0.5 + FUZZY_EPSILON * 2.0));
    }

    #[timed_test]
    fn fraction_constructor_divides() {
        assert!((f64::from_fraction(7, 12) - 7.0 / 12.0).abs() < 1e-15);
    }

    #[timed_test]
    fn max_min_follow_ordering() {
        assert!((Scalar::max(0.25_f64, 0.75) - 0.75).abs() < 1e-15);
        assert!((Scalar::min(0.25_f64, 0.75) - 0.25).abs() < 1e-15);
    }
}
