//! Rational numbers for time bases, frame rates and aspect ratios.
//!
//! Exact integer arithmetic avoids the drift a floating-point time base
//! would accumulate over long streams.

use std::cmp::Ordering;
use std::fmt;

/// A rational number with a positive denominator
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// Numerator
    pub num: i64,
    /// Denominator (always positive)
    pub den: i64,
}

impl Rational {
    /// Create a new rational number
    ///
    /// # Panics
    ///
    /// Panics if `den` is zero.
    pub fn new(num: i64, den: i64) -> Self {
        assert!(den != 0, "denominator cannot be zero");
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        Self { num, den }
    }

    /// The zero rational (0/1)
    pub const ZERO: Rational = Rational { num: 0, den: 1 };

    /// The unit rational (1/1)
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// Reduce to lowest terms
    pub fn reduce(self) -> Self {
        if self.num == 0 {
            return Self::ZERO;
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs()) as i64;
        Self {
            num: self.num / g,
            den: self.den / g,
        }
    }

    /// Multiplicative inverse
    ///
    /// # Panics
    ///
    /// Panics if the numerator is zero.
    pub fn invert(self) -> Self {
        Self::new(self.den, self.num)
    }

    /// Check if this rational is zero
    #[inline]
    pub fn is_zero(self) -> bool {
        self.num == 0
    }

    /// Convert to f64
    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Rescale an integer timestamp from this time base to another,
    /// rounding to nearest
    ///
    /// A zero target base carries no scale; the value is returned
    /// unchanged.
    pub fn rescale(self, value: i64, to: Rational) -> i64 {
        if to.is_zero() {
            return value;
        }
        // value * self / to, in i128 to avoid overflow on large timestamps
        let n = value as i128 * self.num as i128 * to.den as i128;
        let d = self.den as i128 * to.num as i128;
        let half = d.abs() / 2;
        let rounded = if n >= 0 { (n + half) / d } else { (n - half) / d };
        rounded as i64
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Self { num: n, den: 1 }
    }
}
