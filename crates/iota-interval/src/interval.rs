//! Closed real intervals with outward rounding.

use crate::rounding::{add_down, add_up, mul_down, mul_up, sub_down, sub_up};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg};

/// A closed interval `[inf, sup]` of finite reals.
///
/// Every arithmetic result encloses the exact real result of the same
/// operation on any members of the operands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    inf: f64,
    sup: f64,
}

impl Interval {
    /// Create an interval from explicit bounds.
    #[inline]
    pub fn new(inf: f64, sup: f64) -> Self {
        debug_assert!(inf <= sup, "Invalid interval: {inf} > {sup}");
        Self { inf, sup }
    }

    /// Create an interval, returning `None` if the bounds are out of order or NaN.
    #[inline]
    pub fn try_new(inf: f64, sup: f64) -> Option<Self> {
        if inf <= sup {
            Some(Self { inf, sup })
        } else {
            None
        }
    }

    /// Degenerate interval `[value, value]`.
    #[inline]
    pub fn point(value: f64) -> Self {
        Self {
            inf: value,
            sup: value,
        }
    }

    /// The interval `[0, 0]`.
    #[inline]
    pub fn zero() -> Self {
        Self::point(0.0)
    }

    /// Widen a point value by a tolerance: `[value - epsilon, value + epsilon]`.
    #[inline]
    pub fn from_point(value: f64, epsilon: f64) -> Self {
        debug_assert!(epsilon >= 0.0, "negative tolerance {epsilon}");
        Self {
            inf: sub_down(value, epsilon),
            sup: add_up(value, epsilon),
        }
    }

    #[inline]
    pub fn inf(&self) -> f64 {
        self.inf
    }

    #[inline]
    pub fn sup(&self) -> f64 {
        self.sup
    }

    /// Width `sup - inf`, rounded up.
    #[inline]
    pub fn width(&self) -> f64 {
        sub_up(self.sup, self.inf)
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.inf <= value && value <= self.sup
    }

    /// Smallest interval containing both operands.
    #[inline]
    pub fn hull(&self, other: &Interval) -> Interval {
        Interval {
            inf: self.inf.min(other.inf),
            sup: self.sup.max(other.sup),
        }
    }

    #[inline]
    pub fn is_nonnegative(&self) -> bool {
        self.inf >= 0.0
    }

    #[inline]
    pub fn is_nonpositive(&self) -> bool {
        self.sup <= 0.0
    }

    /// True if zero lies strictly inside the interval.
    #[inline]
    pub fn straddles_zero(&self) -> bool {
        self.sup > 0.0 && 0.0 > self.inf
    }
}

impl Add for Interval {
    type Output = Interval;

    #[inline]
    fn add(self, rhs: Interval) -> Interval {
        Interval {
            inf: add_down(self.inf, rhs.inf),
            sup: add_up(self.sup, rhs.sup),
        }
    }
}

impl Neg for Interval {
    type Output = Interval;

    #[inline]
    fn neg(self) -> Interval {
        Interval {
            inf: -self.sup,
            sup: -self.inf,
        }
    }
}

impl Mul for Interval {
    type Output = Interval;

    /// Interval product: the hull of the four corner products.
    #[inline]
    fn mul(self, rhs: Interval) -> Interval {
        let (a, b, c, d) = (self.inf, self.sup, rhs.inf, rhs.sup);
        let inf = mul_down(a, c)
            .min(mul_down(a, d))
            .min(mul_down(b, c))
            .min(mul_down(b, d));
        let sup = mul_up(a, c)
            .max(mul_up(a, d))
            .max(mul_up(b, c))
            .max(mul_up(b, d));
        Interval { inf, sup }
    }
}

impl Sum for Interval {
    fn sum<I: Iterator<Item = Interval>>(iter: I) -> Interval {
        iter.fold(Interval::zero(), |acc, x| acc + x)
    }
}

impl From<f64> for Interval {
    fn from(value: f64) -> Self {
        Interval::point(value)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.inf, self.sup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_point_exact() {
        let x = Interval::from_point(2.0, 0.5);
        assert_eq!(x.inf(), 1.5);
        assert_eq!(x.sup(), 2.5);

        let p = Interval::from_point(3.0, 0.0);
        assert_eq!(p, Interval::point(3.0));
    }

    #[test]
    fn test_from_point_inexact_rounds_outward() {
        let x = Interval::from_point(1.0, 1e-6);
        assert!(x.inf() <= 1.0 - 1e-6);
        assert!(x.sup() >= 1.0 + 1e-6);
        assert_relative_eq!(x.width(), 2e-6, epsilon = 1e-15);
    }

    #[test]
    fn test_try_new_rejects_reversed_and_nan() {
        assert!(Interval::try_new(0.0, 1.0).is_some());
        assert!(Interval::try_new(1.0, 1.0).is_some());
        assert!(Interval::try_new(1.0, 0.0).is_none());
        assert!(Interval::try_new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn test_add() {
        let a = Interval::new(1.0, 2.0);
        let b = Interval::new(-3.0, 0.5);
        let c = a + b;
        assert_eq!(c.inf(), -2.0);
        assert_eq!(c.sup(), 2.5);
    }

    #[test]
    fn test_neg() {
        let a = -Interval::new(-1.0, 3.0);
        assert_eq!(a, Interval::new(-3.0, 1.0));
    }

    #[test]
    fn test_mul_sign_cases() {
        let pos = Interval::new(1.0, 2.0);
        let neg = Interval::new(-3.0, -1.0);
        let mixed = Interval::new(-1.0, 4.0);

        assert_eq!(pos * pos, Interval::new(1.0, 4.0));
        assert_eq!(pos * neg, Interval::new(-6.0, -1.0));
        assert_eq!(neg * neg, Interval::new(1.0, 9.0));
        assert_eq!(pos * mixed, Interval::new(-2.0, 8.0));
        assert_eq!(mixed * mixed, Interval::new(-4.0, 16.0));
    }

    #[test]
    fn test_mul_by_zero_interval() {
        let z = Interval::zero();
        let x = Interval::new(-5.0, 7.0);
        let p = z * x;
        assert_eq!(p.inf(), 0.0);
        assert_eq!(p.sup(), 0.0);
    }

    #[test]
    fn test_sum() {
        let total: Interval = [
            Interval::new(0.0, 1.0),
            Interval::new(1.0, 2.0),
            Interval::new(-1.0, 0.0),
        ]
        .into_iter()
        .sum();
        assert_eq!(total, Interval::new(0.0, 3.0));

        let empty: Interval = std::iter::empty().sum();
        assert_eq!(empty, Interval::zero());
    }

    #[test]
    fn test_sign_predicates() {
        assert!(Interval::new(0.0, 1.0).is_nonnegative());
        assert!(!Interval::new(0.0, 1.0).straddles_zero());
        assert!(Interval::new(-1.0, 0.0).is_nonpositive());
        assert!(Interval::new(-1.0, 1.0).straddles_zero());
        assert!(!Interval::zero().straddles_zero());
    }

    #[test]
    fn test_contains_hull() {
        let a = Interval::new(0.0, 2.0);
        assert!(a.contains(0.0));
        assert!(a.contains(2.0));
        assert!(!a.contains(2.0001));
        assert_eq!(a.hull(&Interval::new(3.0, 4.0)), Interval::new(0.0, 4.0));
    }

    #[test]
    fn test_mul_zero_by_unbounded() {
        let unbounded = Interval::new(f64::NEG_INFINITY, f64::INFINITY);
        assert_eq!(Interval::zero() * unbounded, Interval::zero());
        let huge = Interval::point(-1e308) * Interval::point(2.0);
        assert_eq!(huge, Interval::new(f64::NEG_INFINITY, -f64::MAX));
    }

    #[test]
    fn test_display() {
        assert_eq!(Interval::new(-1.5, 2.0).to_string(), "[-1.5, 2]");
    }
}
