//! Payoff and probability wrappers.

use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use super::scalar::Scalar;

/// Payoff of a joint outcome for the row player.
///
/// Games are scaled so the two payoffs sum to one; the column value is
/// derived rather than stored. Partial sums produced while accumulating
/// probability-weighted child payoffs are consistent because the weights at
/// a chance node sum to one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Value<R: Scalar> {
    row: R,
}

impl<R: Scalar> Value<R> {
    pub fn new(row: R) -> Self {
        Self { row }
    }

    pub fn row(self) -> R {
        self.row
    }

    pub fn col(self) -> R {
        R::one() - self.row
    }
}

impl<R: Scalar> Add for Value<R> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.row + rhs.row)
    }
}

impl<R: Scalar> AddAssign for Value<R> {
    fn add_assign(&mut self, rhs: Self) {
        self.row += rhs.row;
    }
}

impl<R: Scalar> Mul<R> for Value<R> {
    type Output = Self;
    fn mul(self, rhs: R) -> Self {
        Self::new(self.row * rhs)
    }
}

impl<R: Scalar> Mul<Prob<R>> for Value<R> {
    type Output = Self;
    fn mul(self, rhs: Prob<R>) -> Self {
        Self::new(self.row * rhs.get())
    }
}

/// Probability of a chance outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Prob<R: Scalar>(R);

impl<R: Scalar> Prob<R> {
    pub fn new(p: R) -> Self {
        Self(p)
    }

    pub fn zero() -> Self {
        Self(R::zero())
    }

    pub fn one() -> Self {
        Self(R::one())
    }

    pub fn get(self) -> R {
        self.0
    }

    #[must_use]
    pub fn canonicalized(self) -> Self {
        Self(self.0.canonicalized())
    }
}

impl<R: Scalar> Add for Prob<R> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl<R: Scalar> AddAssign for Prob<R> {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl<R: Scalar> Sub for Prob<R> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl<R: Scalar> SubAssign for Prob<R> {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

/// `prob · scalar`, yielding a plain scalar mass.
impl<R: Scalar> Mul<R> for Prob<R> {
    type Output = R;
    fn mul(self, rhs: R) -> R {
        self.0 * rhs
    }
}
