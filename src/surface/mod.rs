//! Analytic quadric surfaces and the evaluation trait the extrema engine
//! consumes.
//!
//! Parameterizations:
//! - Cylinder: `P(u,v) = C + R*(cos(u)*X + sin(u)*Y) + v*Z`
//! - Cone:     `P(u,v) = Apex + v*cos(a)*Z + v*sin(a)*(cos(u)*X + sin(u)*Y)`
//!   where `a` is the semi-angle and `v` is distance from the apex along a
//!   generator
//! - Torus:    `P(u,v) = C + (R + r*cos(v))*(cos(u)*X + sin(u)*Y) + r*sin(v)*Z`

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

use crate::geom::{Ax3, Dir, Pnt, Vec3};
use crate::precision;
use crate::{ExtremaError, Result};

/// Position and first derivatives at a surface parameter pair.
#[derive(Debug, Clone, Copy)]
pub struct SurfD1 {
    pub point: Pnt,
    pub du: Vec3,
    pub dv: Vec3,
}

/// Position, first and second derivatives at a surface parameter pair.
#[derive(Debug, Clone, Copy)]
pub struct SurfD2 {
    pub point: Pnt,
    pub du: Vec3,
    pub dv: Vec3,
    pub duu: Vec3,
    pub duv: Vec3,
    pub dvv: Vec3,
}

/// Surface evaluation contract consumed by the extrema engine.
pub trait Surface {
    /// Position at (u, v).
    fn value(&self, u: f64, v: f64) -> Pnt;

    /// Position and first derivatives at (u, v).
    fn d1(&self, u: f64, v: f64) -> SurfD1;

    /// Position, first and second derivatives at (u, v).
    fn d2(&self, u: f64, v: f64) -> SurfD2;
}

/// An infinite cylindrical surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    pos: Ax3,
    radius: f64,
}

impl Cylinder {
    /// Create a cylinder from a local frame and radius.
    pub fn new(pos: Ax3, radius: f64) -> Result<Self> {
        if radius < 0.0 {
            return Err(ExtremaError::InvalidGeometry(
                "cylinder radius must be non-negative".into(),
            ));
        }
        Ok(Self { pos, radius })
    }

    /// The radius.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// The local frame.
    pub fn position(&self) -> &Ax3 {
        &self.pos
    }

    /// The axis location.
    pub fn location(&self) -> &Pnt {
        self.pos.location()
    }

    /// The axis direction.
    pub fn axis(&self) -> &Dir {
        self.pos.direction()
    }
}

impl Surface for Cylinder {
    fn value(&self, u: f64, v: f64) -> Pnt {
        let (sin_u, cos_u) = u.sin_cos();
        let radial = radial_dir(&self.pos, cos_u, sin_u);
        *self.pos.location() + radial.scaled(self.radius) + self.pos.direction().as_vec().scaled(v)
    }

    fn d1(&self, u: f64, v: f64) -> SurfD1 {
        let (sin_u, cos_u) = u.sin_cos();
        let radial = radial_dir(&self.pos, cos_u, sin_u);
        let tangential = radial_dir(&self.pos, -sin_u, cos_u);
        SurfD1 {
            point: *self.pos.location()
                + radial.scaled(self.radius)
                + self.pos.direction().as_vec().scaled(v),
            du: tangential.scaled(self.radius),
            dv: self.pos.direction().as_vec(),
        }
    }

    fn d2(&self, u: f64, v: f64) -> SurfD2 {
        let d1 = self.d1(u, v);
        let (sin_u, cos_u) = u.sin_cos();
        let radial = radial_dir(&self.pos, cos_u, sin_u);
        SurfD2 {
            point: d1.point,
            du: d1.du,
            dv: d1.dv,
            duu: radial.scaled(-self.radius),
            duv: Vec3::zero(),
            dvv: Vec3::zero(),
        }
    }
}

/// An infinite conical surface.
///
/// `ref_radius` is the radius of the cross-section at the frame location;
/// the apex sits at `location - (ref_radius / tan(semi_angle)) * Z`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cone {
    pos: Ax3,
    semi_angle: f64,
    ref_radius: f64,
}

impl Cone {
    /// Create a cone from a local frame, semi-angle and reference radius.
    pub fn new(pos: Ax3, semi_angle: f64, ref_radius: f64) -> Result<Self> {
        if ref_radius < 0.0 {
            return Err(ExtremaError::InvalidGeometry(
                "cone reference radius must be non-negative".into(),
            ));
        }
        if semi_angle.abs() <= precision::ANGULAR
            || semi_angle.abs() >= FRAC_PI_2 - precision::ANGULAR
        {
            return Err(ExtremaError::InvalidGeometry(
                "cone semi-angle out of range".into(),
            ));
        }
        Ok(Self {
            pos,
            semi_angle,
            ref_radius,
        })
    }

    /// The semi-angle.
    pub fn semi_angle(&self) -> f64 {
        self.semi_angle
    }

    /// The reference radius (cross-section radius at the frame location).
    pub fn ref_radius(&self) -> f64 {
        self.ref_radius
    }

    /// The local frame.
    pub fn position(&self) -> &Ax3 {
        &self.pos
    }

    /// The axis direction.
    pub fn axis(&self) -> &Dir {
        self.pos.direction()
    }

    /// The apex point.
    pub fn apex(&self) -> Pnt {
        let dist = -self.ref_radius / self.semi_angle.tan();
        *self.pos.location() + self.pos.direction().as_vec().scaled(dist)
    }
}

impl Surface for Cone {
    fn value(&self, u: f64, v: f64) -> Pnt {
        let (sin_u, cos_u) = u.sin_cos();
        let radial = radial_dir(&self.pos, cos_u, sin_u);
        let radius = v * self.semi_angle.sin();
        let height = v * self.semi_angle.cos();
        self.apex() + self.pos.direction().as_vec().scaled(height) + radial.scaled(radius)
    }

    fn d1(&self, u: f64, v: f64) -> SurfD1 {
        let (sin_u, cos_u) = u.sin_cos();
        let radial = radial_dir(&self.pos, cos_u, sin_u);
        let tangential = radial_dir(&self.pos, -sin_u, cos_u);
        let sin_a = self.semi_angle.sin();
        let cos_a = self.semi_angle.cos();
        SurfD1 {
            point: self.apex()
                + self.pos.direction().as_vec().scaled(v * cos_a)
                + radial.scaled(v * sin_a),
            du: tangential.scaled(v * sin_a),
            dv: self.pos.direction().as_vec().scaled(cos_a) + radial.scaled(sin_a),
        }
    }

    fn d2(&self, u: f64, v: f64) -> SurfD2 {
        let d1 = self.d1(u, v);
        let (sin_u, cos_u) = u.sin_cos();
        let radial = radial_dir(&self.pos, cos_u, sin_u);
        let tangential = radial_dir(&self.pos, -sin_u, cos_u);
        let sin_a = self.semi_angle.sin();
        SurfD2 {
            point: d1.point,
            du: d1.du,
            dv: d1.dv,
            duu: radial.scaled(-v * sin_a),
            duv: tangential.scaled(sin_a),
            dvv: Vec3::zero(),
        }
    }
}

/// A toroidal surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Torus {
    pos: Ax3,
    major_radius: f64,
    minor_radius: f64,
}

impl Torus {
    /// Create a torus from a local frame and major/minor radii.
    pub fn new(pos: Ax3, major_radius: f64, minor_radius: f64) -> Result<Self> {
        if major_radius < 0.0 || minor_radius < 0.0 {
            return Err(ExtremaError::InvalidGeometry(
                "torus radii must be non-negative".into(),
            ));
        }
        Ok(Self {
            pos,
            major_radius,
            minor_radius,
        })
    }

    /// The major radius (axis to tube center).
    pub fn major_radius(&self) -> f64 {
        self.major_radius
    }

    /// The minor radius (tube radius).
    pub fn minor_radius(&self) -> f64 {
        self.minor_radius
    }

    /// The local frame.
    pub fn position(&self) -> &Ax3 {
        &self.pos
    }

    /// The center point.
    pub fn location(&self) -> &Pnt {
        self.pos.location()
    }

    /// The axis direction.
    pub fn axis(&self) -> &Dir {
        self.pos.direction()
    }

    /// Center of the tube circle at major-circle angle u.
    pub fn tube_center(&self, u: f64) -> Pnt {
        let (sin_u, cos_u) = u.sin_cos();
        *self.pos.location() + radial_dir(&self.pos, cos_u, sin_u).scaled(self.major_radius)
    }

    /// Radial direction from the axis toward the tube center at angle u.
    pub fn tube_radial(&self, u: f64) -> Vec3 {
        let (sin_u, cos_u) = u.sin_cos();
        radial_dir(&self.pos, cos_u, sin_u)
    }
}

impl Surface for Torus {
    fn value(&self, u: f64, v: f64) -> Pnt {
        let (sin_u, cos_u) = u.sin_cos();
        let (sin_v, cos_v) = v.sin_cos();
        let radial = radial_dir(&self.pos, cos_u, sin_u);
        *self.pos.location()
            + radial.scaled(self.major_radius + self.minor_radius * cos_v)
            + self.pos.direction().as_vec().scaled(self.minor_radius * sin_v)
    }

    fn d1(&self, u: f64, v: f64) -> SurfD1 {
        let (sin_u, cos_u) = u.sin_cos();
        let (sin_v, cos_v) = v.sin_cos();
        let radial = radial_dir(&self.pos, cos_u, sin_u);
        let tangential = radial_dir(&self.pos, -sin_u, cos_u);
        let axis = self.pos.direction().as_vec();
        let ring = self.major_radius + self.minor_radius * cos_v;
        SurfD1 {
            point: *self.pos.location()
                + radial.scaled(ring)
                + axis.scaled(self.minor_radius * sin_v),
            du: tangential.scaled(ring),
            dv: radial.scaled(-self.minor_radius * sin_v) + axis.scaled(self.minor_radius * cos_v),
        }
    }

    fn d2(&self, u: f64, v: f64) -> SurfD2 {
        let d1 = self.d1(u, v);
        let (sin_u, cos_u) = u.sin_cos();
        let (sin_v, cos_v) = v.sin_cos();
        let radial = radial_dir(&self.pos, cos_u, sin_u);
        let tangential = radial_dir(&self.pos, -sin_u, cos_u);
        let axis = self.pos.direction().as_vec();
        let ring = self.major_radius + self.minor_radius * cos_v;
        SurfD2 {
            point: d1.point,
            du: d1.du,
            dv: d1.dv,
            duu: radial.scaled(-ring),
            duv: tangential.scaled(-self.minor_radius * sin_v),
            dvv: radial.scaled(-self.minor_radius * cos_v)
                + axis.scaled(-self.minor_radius * sin_v),
        }
    }
}

/// `cos_u * X + sin_u * Y` in the frame's perpendicular plane.
#[inline]
fn radial_dir(pos: &Ax3, cos_u: f64, sin_u: f64) -> Vec3 {
    pos.x_direction().as_vec().scaled(cos_u) + pos.y_direction().as_vec().scaled(sin_u)
}
