//! Fixed-point math utilities for deterministic simulation.
//!
//! All world-space math uses fixed-point arithmetic so that a battle
//! replayed from the same commands and tick deltas lands on exactly the
//! same state on every platform.
//!
//! The simulation is played on the ground plane only. [`Vec2Fixed::x`] is
//! world X and [`Vec2Fixed::y`] is world Z; height is tracked separately
//! where it matters (projectiles).

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Build a fixed-point value from an integer ratio, e.g. `ratio(7, 10)` for 0.7.
#[must_use]
pub fn ratio(numerator: i32, denominator: i32) -> Fixed {
    Fixed::from_num(numerator) / Fixed::from_num(denominator)
}

/// Fixed-point 2D vector on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// World X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// World Z coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for fixed-point numbers written as thousandths.
///
/// Used by the data files so that a speed of `0.05` reads as `50` rather
/// than as a raw 64-bit pattern.
pub mod milli_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as rounded thousandths.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let milli = (*value * Fixed::from_num(1000)).round().to_num::<i64>();
        milli.serialize(serializer)
    }

    /// Deserialize a fixed-point number from thousandths.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let milli = i64::deserialize(deserializer)?;
        Fixed::checked_from_num(milli)
            .map(|value| value / Fixed::from_num(1000))
            .ok_or_else(|| serde::de::Error::custom(format!("{milli} is out of range")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x.saturating_sub(other.x);
        let dy = self.y.saturating_sub(other.y);
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Normalize vector using fixed-point math.
    ///
    /// Returns the zero vector for a zero-length input.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Unit vector pointing from `self` towards `target`.
    #[must_use]
    pub fn direction_to(self, target: Self) -> Self {
        (target - self).normalize()
    }
}

/// Computes the square root of a fixed-point number using binary search.
///
/// Deterministic across platforms; returns zero for non-positive input.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::from_num(1) {
        value
    } else {
        Fixed::from_num(1)
    };

    // 64 halvings reach the last fractional bit for I32F32.
    for _ in 0..64 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2Fixed {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epsilon() -> Fixed {
        Fixed::from_num(1) / Fixed::from_num(10000)
    }

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::from_ints(3, 0);
        let b = Vec2Fixed::from_ints(0, 4);
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_distance_squared_saturates_far_apart() {
        let a = Vec2Fixed::from_ints(50_000, 0);
        let b = Vec2Fixed::from_ints(-50_000, 0);
        assert_eq!(a.distance_squared(b), Fixed::MAX);
        assert!(a.distance(b) > Fixed::from_num(46_000));
    }

    #[test]
    fn test_vec2_distance() {
        let a = Vec2Fixed::from_ints(3, 0);
        let b = Vec2Fixed::from_ints(0, 4);
        let dist = a.distance(b);
        assert!((dist - Fixed::from_num(5)).abs() < epsilon(), "got {dist}");
    }

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(1, 2), Fixed::from_num(0.5));
        assert_eq!(ratio(30, 10), Fixed::from_num(3));
    }

    #[test]
    fn test_vec2_normalize() {
        let norm = Vec2Fixed::from_ints(3, 4).normalize();

        let len_sq = norm.dot(norm);
        assert!(
            (len_sq - Fixed::from_num(1)).abs() < epsilon(),
            "normalized vector length² should be ~1, got {len_sq:?}"
        );

        // Direction preserved: x/y ratio matches original 3/4
        let ratio_diff = (norm.x * Fixed::from_num(4)) - (norm.y * Fixed::from_num(3));
        assert!(ratio_diff.abs() < epsilon(), "direction not preserved");
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(Vec2Fixed::ZERO.normalize(), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_sqrt_small_values() {
        let quarter = ratio(1, 4);
        let root = fixed_sqrt(quarter);
        assert!((root - ratio(1, 2)).abs() < epsilon());
        assert_eq!(fixed_sqrt(Fixed::from_num(-4)), Fixed::ZERO);
    }
}
