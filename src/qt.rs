use std::f64::consts::PI;
use std::ops;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::LINEAR_THRESHOLD;
use crate::geometry::{Mat3, Vec3};

fn float_equals(x: f64, y: f64) -> bool {
    (x - y).abs() < f64::EPSILON
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Quaternion {
        Quaternion { w, x, y, z }
    }

    pub fn from_axis_angle(axis: Vec3, angle_rad: f64) -> Quaternion {
        let u = axis.unit();
        let half = 0.5 * angle_rad;
        let s = half.sin();
        Quaternion::new(half.cos(), u.x * s, u.y * s, u.z * s)
    }

    pub fn conjugate(&self) -> Quaternion {
        Quaternion::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn dot(&self, other: Quaternion) -> f64 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn norm2(&self) -> f64 {
        self.dot(*self)
    }

    pub fn norm(&self) -> f64 {
        self.norm2().sqrt()
    }

    pub fn normalize(&mut self) {
        let norm = self.norm();
        self.w /= norm;
        self.x /= norm;
        self.y /= norm;
        self.z /= norm;
    }

    pub fn inverse(&self) -> Quaternion {
        self.conjugate() / self.norm2()
    }

    /// Rotation distance metric in [0, 1]; 0 for equivalent rotations.
    pub fn distance(&self, other: Quaternion) -> f64 {
        let dot = self.dot(other);
        1.0 - dot * dot
    }

    /// Rotation angle in radians between the two orientations.
    pub fn angle_to(&self, other: Quaternion) -> f64 {
        let dot = self.dot(other).abs().clamp(0.0, 1.0);
        2.0 * dot.acos()
    }

    pub fn rotate(&self, v: Vec3) -> Vec3 {
        let q = Quaternion::new(0.0, v.x, v.y, v.z);
        let r = *self * q * self.inverse();
        Vec3::new(r.x, r.y, r.z)
    }

    pub fn slerp(&self, other: &Quaternion, t: f64) -> Quaternion {
        let mut q1 = *self;
        let mut q2 = *other;
        q1.normalize();
        q2.normalize();
        let mut q_dot = q1.dot(q2);

        // Take the short path
        if q_dot < 0.0 {
            q1 = -q1;
            q_dot *= -1.0;
        }

        if q_dot > LINEAR_THRESHOLD {
            // Linear interpolation if quaternions are too close
            let mut result = q1 + (q2 - q1) * t;
            result.normalize();
            result
        } else {
            q_dot = q_dot.clamp(-1.0, 1.0);
            let omega = q_dot.acos();
            let so = omega.sin();
            q1 * (((1.0 - t) * omega).sin() / so) + q2 * ((t * omega).sin() / so)
        }
    }

    /// Uniform random rotation (Shoemake).
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Quaternion {
        let u1 = rng.gen::<f64>();
        let u2 = rng.gen::<f64>();
        let u3 = rng.gen::<f64>();
        Quaternion::new(
            (1.0 - u1).sqrt() * (2.0 * PI * u2).sin(),
            (1.0 - u1).sqrt() * (2.0 * PI * u2).cos(),
            u1.sqrt() * (2.0 * PI * u3).sin(),
            u1.sqrt() * (2.0 * PI * u3).cos(),
        )
    }

    pub fn to_matrix(&self) -> Mat3 {
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);
        Mat3::from_rows(
            Vec3::new(1.0 - 2.0 * (y * y + z * z), 2.0 * (x * y - w * z), 2.0 * (x * z + w * y)),
            Vec3::new(2.0 * (x * y + w * z), 1.0 - 2.0 * (x * x + z * z), 2.0 * (y * z - w * x)),
            Vec3::new(2.0 * (x * z - w * y), 2.0 * (y * z + w * x), 1.0 - 2.0 * (x * x + y * y)),
        )
    }

    /// Unit quaternion from a rotation matrix (Shepperd's method).
    pub fn from_matrix(m: &Mat3) -> Quaternion {
        let [r0, r1, r2] = m.rows;
        let trace = r0.x + r1.y + r2.z;
        let mut q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Quaternion::new(0.25 * s, (r2.y - r1.z) / s, (r0.z - r2.x) / s, (r1.x - r0.y) / s)
        } else if r0.x > r1.y && r0.x > r2.z {
            let s = (1.0 + r0.x - r1.y - r2.z).sqrt() * 2.0;
            Quaternion::new((r2.y - r1.z) / s, 0.25 * s, (r0.y + r1.x) / s, (r0.z + r2.x) / s)
        } else if r1.y > r2.z {
            let s = (1.0 + r1.y - r0.x - r2.z).sqrt() * 2.0;
            Quaternion::new((r0.z - r2.x) / s, (r0.y + r1.x) / s, 0.25 * s, (r1.z + r2.y) / s)
        } else {
            let s = (1.0 + r2.z - r0.x - r1.y).sqrt() * 2.0;
            Quaternion::new((r1.x - r0.y) / s, (r0.z + r2.x) / s, (r1.z + r2.y) / s, 0.25 * s)
        };
        // Canonical sign: w >= 0
        if q.w < 0.0 {
            q = -q;
        }
        q.normalize();
        q
    }
}

impl Default for Quaternion {
    fn default() -> Quaternion {
        Quaternion::new(1.0, 0.0, 0.0, 0.0)
    }
}

impl ops::Sub for Quaternion {
    type Output = Self;

    fn sub(self, other: Quaternion) -> Self::Output {
        Quaternion::new(self.w - other.w, self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl ops::Add for Quaternion {
    type Output = Self;

    fn add(self, other: Quaternion) -> Self::Output {
        Quaternion::new(self.w + other.w, self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl PartialEq for Quaternion {
    fn eq(&self, other: &Self) -> bool {
        float_equals(self.w, other.w)
            && float_equals(self.x, other.x)
            && float_equals(self.y, other.y)
            && float_equals(self.z, other.z)
    }
}

impl ops::Neg for Quaternion {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Quaternion::new(-self.w, -self.x, -self.y, -self.z)
    }
}

impl ops::Mul<f64> for Quaternion {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Quaternion::new(scalar * self.w, scalar * self.x, scalar * self.y, scalar * self.z)
    }
}

impl ops::Mul for Quaternion {
    type Output = Self;

    fn mul(self, other: Quaternion) -> Self::Output {
        Quaternion::new(
            self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        )
    }
}

impl ops::Div<f64> for Quaternion {
    type Output = Self;

    fn div(self, scalar: f64) -> Self::Output {
        Quaternion::new(self.w / scalar, self.x / scalar, self.y / scalar, self.z / scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn quaternion_default() {
        let q: Quaternion = Default::default();
        assert_eq!(q.w, 1.0);
        assert_eq!(q.x, 0.0);
        assert_eq!(q.y, 0.0);
        assert_eq!(q.z, 0.0);
    }

    #[test]
    fn quaternion_mul() {
        let q1 = Quaternion::new(1.0, 0.0, 0.0, 2.0);
        let q2 = Quaternion::new(3.0, -1.0, 4.0, 3.0);
        let expected = Quaternion::new(-3.0, -9.0, 2.0, 9.0);
        assert!(expected == q1 * q2);
    }

    #[test]
    fn conjugate_and_multiplication() {
        let q1 = Quaternion::new(1.0, 0.0, 0.0, 2.0);
        let q2 = Quaternion::new(3.0, -1.0, 4.0, 3.0);
        assert!((q1 * q2).conjugate() == q2.conjugate() * q1.conjugate());
    }

    #[test]
    fn norm_is_multiplicative() {
        let q1 = Quaternion::new(1.0, -3.0, 4.0, 3.0);
        let q2 = Quaternion::new(3.0, -1.0, 4.0, 3.0);
        assert!(((q1 * q2).norm() - q1.norm() * q2.norm()).abs() < 1e-12);
    }

    #[test]
    fn rotation_about_y() {
        let q = Quaternion::new(0.707106781, 0.0, 0.707106781, 0.0);
        let v = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(v.x.abs() < 1e-8);
        assert!(v.y.abs() < 1e-8);
        assert!((v.z + 1.0).abs() < 1e-8);
    }

    #[test]
    fn axis_angle_quarter_turn() {
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), std::f64::consts::FRAC_PI_2);
        let v = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!((v.x).abs() < 1e-12);
        assert!((v.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn matrix_round_trip() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(20_220_114);
        for _ in 0..20 {
            let q = Quaternion::random(&mut rng);
            let q2 = Quaternion::from_matrix(&q.to_matrix());
            // q and -q are the same rotation
            assert!(q.distance(q2) < 1e-10);
        }
    }

    #[test]
    fn slerp_half_way() {
        let q1 = Quaternion::new(1.0, 0.0, 0.0, 0.0);
        let q2 = Quaternion::new(0.0, 0.0, 1.0, 0.0);
        let s = q1.slerp(&q2, 0.5);
        let expected = Quaternion::new(0.7071067811865475, 0.0, 0.7071067811865475, 0.0);
        assert!(expected == s);
    }

    #[test]
    fn random_quaternion_is_unit() {
        let mut rng: StdRng = SeedableRng::seed_from_u64(324_324_324);
        let q = Quaternion::random(&mut rng);
        assert!((q.norm() - 1.0).abs() < 1e-12);
    }
}
