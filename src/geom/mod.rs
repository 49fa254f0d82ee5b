//! Geometric value types
//!
//! This module provides the basic types the extrema engine works with:
//! - `Pnt` - 3D point
//! - `Vec3` - 3D vector
//! - `Dir` - 3D unit vector (direction), normalized at construction
//! - `Ax3` - right-handed local coordinate system (location + Z/X/Y dirs)

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

use crate::precision;

/// A 3D cartesian point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pnt {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Pnt {
    /// Create a new point.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Origin point (0, 0, 0).
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Distance to another point.
    pub fn distance(&self, other: &Pnt) -> f64 {
        self.square_distance(other).sqrt()
    }

    /// Squared distance to another point (no sqrt).
    pub fn square_distance(&self, other: &Pnt) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Check coincidence within a tolerance.
    pub fn is_equal(&self, other: &Pnt, tolerance: f64) -> bool {
        self.square_distance(other) <= tolerance * tolerance
    }
}

impl Add<Vec3> for Pnt {
    type Output = Pnt;

    fn add(self, v: Vec3) -> Pnt {
        Pnt::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }
}

impl Sub<Pnt> for Pnt {
    type Output = Vec3;

    fn sub(self, other: Pnt) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

/// A 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Magnitude (length).
    pub fn magnitude(&self) -> f64 {
        self.square_magnitude().sqrt()
    }

    /// Squared magnitude (no sqrt).
    pub fn square_magnitude(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Dot product.
    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Unit direction, or None for a (near) zero vector.
    pub fn normalized(&self) -> Option<Dir> {
        Dir::try_new(self.x, self.y, self.z)
    }

    /// Vector scaled by a factor.
    pub fn scaled(&self, factor: f64) -> Vec3 {
        Vec3::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, scalar: f64) -> Vec3 {
        Vec3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;

    fn mul(self, v: Vec3) -> Vec3 {
        Vec3::new(v.x * self, v.y * self, v.z * self)
    }
}

/// A 3D unit vector / direction.
///
/// Unlike `Vec3`, a `Dir` is always normalized; this is enforced at
/// construction time, so fields are private.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dir {
    x: f64,
    y: f64,
    z: f64,
}

impl Default for Dir {
    fn default() -> Self {
        Self::z_axis()
    }
}

impl Dir {
    /// Create a direction by normalizing the components.
    ///
    /// # Panics
    /// Panics on a (near) zero input vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self::try_new(x, y, z).expect("Cannot create Dir from zero vector")
    }

    /// Try to create a direction. None if the input has (near) zero length.
    pub fn try_new(x: f64, y: f64, z: f64) -> Option<Self> {
        let mag = (x * x + y * y + z * z).sqrt();
        if mag > precision::CONFUSION {
            Some(Self {
                x: x / mag,
                y: y / mag,
                z: z / mag,
            })
        } else {
            None
        }
    }

    /// X component.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Y component.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Z component.
    pub fn z(&self) -> f64 {
        self.z
    }

    /// Unit +X direction.
    pub const fn x_axis() -> Self {
        Self { x: 1.0, y: 0.0, z: 0.0 }
    }

    /// Unit +Y direction.
    pub const fn y_axis() -> Self {
        Self { x: 0.0, y: 1.0, z: 0.0 }
    }

    /// Unit +Z direction.
    pub const fn z_axis() -> Self {
        Self { x: 0.0, y: 0.0, z: 1.0 }
    }

    /// As a plain vector.
    pub fn as_vec(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Dot product with a vector.
    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Dot product with another direction.
    pub fn dot_dir(&self, other: &Dir) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product with another direction (not normalized).
    pub fn cross_dir(&self, other: &Dir) -> Vec3 {
        self.as_vec().cross(&other.as_vec())
    }

    /// Check parallelism (same or opposite sense) within an angular tolerance.
    pub fn is_parallel(&self, other: &Dir, angular_tol: f64) -> bool {
        self.cross_dir(other).magnitude() <= angular_tol
    }
}

/// A right-handed local coordinate system: location plus main (Z) direction
/// with derived X and Y directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ax3 {
    location: Pnt,
    direction: Dir,
    x_direction: Dir,
    y_direction: Dir,
}

impl Default for Ax3 {
    fn default() -> Self {
        Self::standard()
    }
}

impl Ax3 {
    /// Standard frame at origin: Z main direction, X/Y world axes.
    pub const fn standard() -> Self {
        Self {
            location: Pnt::origin(),
            direction: Dir::z_axis(),
            x_direction: Dir::x_axis(),
            y_direction: Dir::y_axis(),
        }
    }

    /// Create a frame from a location and main direction.
    ///
    /// The X direction is derived by projecting the world axis least aligned
    /// with `direction` onto the perpendicular plane; Y completes the
    /// right-handed triad.
    pub fn new(location: Pnt, direction: Dir) -> Self {
        let n = direction.as_vec();
        // Pick the world axis with the smallest |component| along n
        let ax = n.x.abs();
        let ay = n.y.abs();
        let az = n.z.abs();
        let seed = if ax <= ay && ax <= az {
            Vec3::new(1.0, 0.0, 0.0)
        } else if ay <= az {
            Vec3::new(0.0, 1.0, 0.0)
        } else {
            Vec3::new(0.0, 0.0, 1.0)
        };
        let x_vec = seed - n.scaled(seed.dot(&n));
        let x_direction = x_vec
            .normalized()
            .expect("Ax3::new: degenerate frame seed");
        let y_direction = n
            .cross(&x_direction.as_vec())
            .normalized()
            .expect("Ax3::new: degenerate frame");
        Self {
            location,
            direction,
            x_direction,
            y_direction,
        }
    }

    /// Create a frame with an explicit X direction.
    ///
    /// The given X direction is re-orthogonalized against the main direction;
    /// returns None if the two are (near) parallel.
    pub fn try_new_with_x(location: Pnt, direction: Dir, x_hint: Dir) -> Option<Self> {
        let n = direction.as_vec();
        let x_vec = x_hint.as_vec() - n.scaled(x_hint.dot(&n));
        let x_direction = x_vec.normalized()?;
        let y_direction = n.cross(&x_direction.as_vec()).normalized()?;
        Some(Self {
            location,
            direction,
            x_direction,
            y_direction,
        })
    }

    /// The location (origin of the frame).
    pub fn location(&self) -> &Pnt {
        &self.location
    }

    /// The main (Z) direction.
    pub fn direction(&self) -> &Dir {
        &self.direction
    }

    /// The X direction.
    pub fn x_direction(&self) -> &Dir {
        &self.x_direction
    }

    /// The Y direction.
    pub fn y_direction(&self) -> &Dir {
        &self.y_direction
    }

    /// Frame with the location moved, axes unchanged.
    pub fn with_location(&self, location: Pnt) -> Ax3 {
        Ax3 { location, ..*self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pnt_distance() {
        let p1 = Pnt::new(0.0, 0.0, 0.0);
        let p2 = Pnt::new(3.0, 4.0, 0.0);
        assert!((p1.distance(&p2) - 5.0).abs() < 1e-12);
        assert!((p1.square_distance(&p2) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_vec_cross() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        let z = x.cross(&y);
        assert!((z.z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dir_rejects_zero() {
        assert!(Dir::try_new(0.0, 0.0, 0.0).is_none());
        assert!(Dir::try_new(1e-12, 0.0, 0.0).is_none());
    }

    #[test]
    fn test_dir_normalizes() {
        let d = Dir::new(3.0, 0.0, 4.0);
        let mag = d.x() * d.x() + d.y() * d.y() + d.z() * d.z();
        assert!((mag - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dir_is_parallel() {
        let d = Dir::z_axis();
        assert!(d.is_parallel(&Dir::new(0.0, 0.0, 2.0), 1e-12));
        assert!(d.is_parallel(&Dir::new(0.0, 0.0, -2.0), 1e-12));
        assert!(!d.is_parallel(&Dir::x_axis(), 1e-12));
    }

    #[test]
    fn test_ax3_orthonormal() {
        let frame = Ax3::new(Pnt::origin(), Dir::new(1.0, 2.0, 3.0));
        let n = frame.direction().as_vec();
        let x = frame.x_direction().as_vec();
        let y = frame.y_direction().as_vec();
        assert!(n.dot(&x).abs() < 1e-12);
        assert!(n.dot(&y).abs() < 1e-12);
        assert!(x.dot(&y).abs() < 1e-12);
        // Right-handed: x cross y == n
        let cross = x.cross(&y);
        assert!((cross - n).magnitude() < 1e-12);
    }

    #[test]
    fn test_ax3_standard() {
        let frame = Ax3::standard();
        assert_eq!(*frame.x_direction(), Dir::x_axis());
        assert_eq!(*frame.y_direction(), Dir::y_axis());
    }
}
