use std::ops;

use serde::{Deserialize, Serialize};

fn float_equals(x: f64, y: f64) -> bool {
    (x - y).abs() < 1e-10
}

#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3 { x, y, z }
    }

    pub fn zero() -> Vec3 {
        Vec3::new(0.0, 0.0, 0.0)
    }

    pub fn dot(&self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length2(&self) -> f64 {
        self.dot(*self)
    }

    pub fn length(&self) -> f64 {
        self.length2().sqrt()
    }

    pub fn unit(&self) -> Vec3 {
        let len = self.length();
        if len > 0.0 {
            *self / len
        } else {
            Vec3::zero()
        }
    }

    pub fn distance(&self, other: Vec3) -> f64 {
        (*self - other).length()
    }

    pub fn distance2(&self, other: Vec3) -> f64 {
        (*self - other).length2()
    }
}

impl ops::Add for Vec3 {
    type Output = Self;

    fn add(self, other: Vec3) -> Self::Output {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Vec3) -> Self::Output {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl ops::Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl ops::Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Vec3::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl ops::Div<f64> for Vec3 {
    type Output = Self;

    fn div(self, scalar: f64) -> Self::Output {
        Vec3::new(self.x / scalar, self.y / scalar, self.z / scalar)
    }
}

impl PartialEq for Vec3 {
    fn eq(&self, other: &Self) -> bool {
        float_equals(self.x, other.x) && float_equals(self.y, other.y) && float_equals(self.z, other.z)
    }
}

/// Row-major 3x3 matrix, just enough for rigid-body frames.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat3 {
    pub rows: [Vec3; 3],
}

impl Mat3 {
    pub fn identity() -> Mat3 {
        Mat3 {
            rows: [
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
        }
    }

    pub fn from_rows(r0: Vec3, r1: Vec3, r2: Vec3) -> Mat3 {
        Mat3 { rows: [r0, r1, r2] }
    }

    pub fn transpose(&self) -> Mat3 {
        Mat3::from_rows(
            Vec3::new(self.rows[0].x, self.rows[1].x, self.rows[2].x),
            Vec3::new(self.rows[0].y, self.rows[1].y, self.rows[2].y),
            Vec3::new(self.rows[0].z, self.rows[1].z, self.rows[2].z),
        )
    }

    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        Vec3::new(self.rows[0].dot(v), self.rows[1].dot(v), self.rows[2].dot(v))
    }

    pub fn mul_mat(&self, other: &Mat3) -> Mat3 {
        let ot = other.transpose();
        Mat3::from_rows(
            Vec3::new(self.rows[0].dot(ot.rows[0]), self.rows[0].dot(ot.rows[1]), self.rows[0].dot(ot.rows[2])),
            Vec3::new(self.rows[1].dot(ot.rows[0]), self.rows[1].dot(ot.rows[1]), self.rows[1].dot(ot.rows[2])),
            Vec3::new(self.rows[2].dot(ot.rows[0]), self.rows[2].dot(ot.rows[1]), self.rows[2].dot(ot.rows[2])),
        )
    }
}

/// Plane through three points, stored as unit normal + offset.
#[derive(Debug, Copy, Clone)]
pub struct Plane {
    normal: Vec3,
    d: f64,
}

impl Plane {
    pub fn from_points(p0: Vec3, p1: Vec3, p2: Vec3) -> Plane {
        let normal = (p1 - p0).cross(p2 - p0).unit();
        Plane {
            normal,
            d: -normal.dot(p0),
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }
}

/// Signed distance from a point to a plane.
pub fn distance_from_point_to_plane(p: Vec3, plane: &Plane) -> f64 {
    plane.normal.dot(p) + plane.d
}

/// Angle in degrees at vertex b of the triangle a-b-c.
pub fn angle_deg(a: Vec3, b: Vec3, c: Vec3) -> f64 {
    let v1 = (a - b).unit();
    let v2 = (c - b).unit();
    v1.dot(v2).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Dihedral angle in degrees for the chain a-b-c-d, in [-180, 180).
pub fn dihedral_deg(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> f64 {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;
    let n1 = b1.cross(b2);
    let n2 = b2.cross(b3);
    let m1 = n1.cross(b2.unit());
    let x = n1.dot(n2);
    let y = m1.dot(n2);
    standardise_angle(y.atan2(x).to_degrees())
}

/// Wraps an angle in degrees into [-180, 180).
pub fn standardise_angle(mut angle: f64) -> f64 {
    while angle >= 180.0 {
        angle -= 360.0;
    }
    while angle < -180.0 {
        angle += 360.0;
    }
    angle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_ops() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-1.0, 0.5, 2.0);
        assert_eq!(a + b, Vec3::new(0.0, 2.5, 5.0));
        assert_eq!(a - b, Vec3::new(2.0, 1.5, 1.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(a.dot(b), 6.5);
    }

    #[test]
    fn cross_product_is_orthogonal() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-4.0, 1.0, 0.5);
        let c = a.cross(b);
        assert!(c.dot(a).abs() < 1e-12);
        assert!(c.dot(b).abs() < 1e-12);
    }

    #[test]
    fn unit_length() {
        let v = Vec3::new(3.0, 4.0, 0.0).unit();
        assert!((v.length() - 1.0).abs() < 1e-12);
        assert_eq!(v, Vec3::new(0.6, 0.8, 0.0));
    }

    #[test]
    fn right_angle() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::zero();
        let c = Vec3::new(0.0, 1.0, 0.0);
        assert!((angle_deg(a, b, c) - 90.0).abs() < 1e-10);
    }

    #[test]
    fn straight_angle() {
        let a = Vec3::new(-1.0, 0.0, 0.0);
        let b = Vec3::zero();
        let c = Vec3::new(2.0, 0.0, 0.0);
        assert!((angle_deg(a, b, c) - 180.0).abs() < 1e-10);
    }

    #[test]
    fn dihedral_of_planar_cis_chain_is_zero() {
        let a = Vec3::new(1.0, 1.0, 0.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(2.0, 0.0, 0.0);
        let d = Vec3::new(2.0, 1.0, 0.0);
        assert!(dihedral_deg(a, b, c, d).abs() < 1e-10);
    }

    #[test]
    fn dihedral_perpendicular() {
        let a = Vec3::new(1.0, 1.0, 0.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(2.0, 0.0, 0.0);
        let d = Vec3::new(2.0, 0.0, 1.0);
        assert!((dihedral_deg(a, b, c, d).abs() - 90.0).abs() < 1e-10);
    }

    #[test]
    fn plane_distance() {
        let plane = Plane::from_points(
            Vec3::zero(),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let d = distance_from_point_to_plane(Vec3::new(0.3, -0.2, 2.5), &plane);
        assert!((d.abs() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn standardise_wraps() {
        assert_eq!(standardise_angle(270.0), -90.0);
        assert_eq!(standardise_angle(-190.0), 170.0);
        assert_eq!(standardise_angle(180.0), -180.0);
    }
}
