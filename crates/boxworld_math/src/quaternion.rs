//! Quaternion rotations
//!
//! Rotations are stored as unit quaternions `(x, y, z, w)` and composed with
//! the Hamilton product. Composition reads right-to-left: `a * b` applies `b`
//! first, then `a`.
//!
//! Euler angles follow the roll/pitch/yaw convention: `x` is roll about X,
//! `y` is pitch about Y, `z` is yaw about Z, applied in Z-Y-X order.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::mat3::{self, Mat3};
use crate::Vec3;

/// Magnitude below which a quaternion is treated as degenerate
const DEGENERATE_EPSILON: f32 = 1e-8;

/// A rotation quaternion
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    /// The identity rotation
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Create a quaternion from raw components
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// The vector part `(x, y, z)`
    #[inline]
    pub fn vector(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Build a rotation from Euler angles in radians (roll, pitch, yaw)
    pub fn from_euler_radians(angles: Vec3) -> Self {
        let (sr, cr) = (angles.x * 0.5).sin_cos();
        let (sp, cp) = (angles.y * 0.5).sin_cos();
        let (sy, cy) = (angles.z * 0.5).sin_cos();

        Self {
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
            w: cr * cp * cy + sr * sp * sy,
        }
    }

    /// Build a rotation from Euler angles in degrees (roll, pitch, yaw)
    pub fn from_euler(degrees: Vec3) -> Self {
        Self::from_euler_radians(Vec3::new(
            degrees.x.to_radians(),
            degrees.y.to_radians(),
            degrees.z.to_radians(),
        ))
    }

    /// Decompose into Euler angles in radians (roll, pitch, yaw)
    ///
    /// The pitch argument is clamped to [-1, 1] before `asin`. At the gimbal
    /// lock boundary pitch saturates at ±90° and roll/yaw become coupled.
    pub fn to_euler_radians(&self) -> Vec3 {
        let q = self.normalize();

        let sinr_cosp = 2.0 * (q.w * q.x + q.y * q.z);
        let cosr_cosp = 1.0 - 2.0 * (q.x * q.x + q.y * q.y);
        let roll = sinr_cosp.atan2(cosr_cosp);

        let sinp = (2.0 * (q.w * q.y - q.z * q.x)).clamp(-1.0, 1.0);
        let pitch = sinp.asin();

        let siny_cosp = 2.0 * (q.w * q.z + q.x * q.y);
        let cosy_cosp = 1.0 - 2.0 * (q.y * q.y + q.z * q.z);
        let yaw = siny_cosp.atan2(cosy_cosp);

        Vec3::new(roll, pitch, yaw)
    }

    /// Decompose into Euler angles in degrees (roll, pitch, yaw)
    pub fn to_euler(&self) -> Vec3 {
        let r = self.to_euler_radians();
        Vec3::new(r.x.to_degrees(), r.y.to_degrees(), r.z.to_degrees())
    }

    /// Rotation of `angle` radians about `axis`
    ///
    /// A zero axis yields the identity.
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let axis = axis.normalized();
        if axis == Vec3::ZERO {
            return Self::IDENTITY;
        }
        let (s, c) = (angle * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Axis and angle (radians) of this rotation
    ///
    /// For rotations indistinguishable from identity the axis is +X.
    pub fn to_axis_angle(&self) -> (Vec3, f32) {
        let q = self.normalize();
        let w = q.w.clamp(-1.0, 1.0);
        let angle = 2.0 * w.acos();
        let s = (1.0 - w * w).sqrt();
        if s < 1e-6 {
            (Vec3::X, angle)
        } else {
            (q.vector() / s, angle)
        }
    }

    /// Rotation that maps +Z onto `forward`, keeping +Y as close to `up` as possible
    pub fn look_rotation(forward: Vec3, up: Vec3) -> Self {
        let f = forward.normalized();
        if f == Vec3::ZERO {
            return Self::IDENTITY;
        }
        let mut right = up.cross(f).normalized();
        if right == Vec3::ZERO {
            // up is parallel to forward, pick any perpendicular
            let fallback = if f.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
            right = fallback.cross(f).normalized();
        }
        let new_up = f.cross(right);
        Self::from_matrix3(&mat3::from_columns(right, new_up, f))
    }

    /// Build a quaternion from an orthonormal rotation matrix
    pub fn from_matrix3(m: &Mat3) -> Self {
        // m[col][row]
        let m00 = m[0][0];
        let m11 = m[1][1];
        let m22 = m[2][2];
        let trace = m00 + m11 + m22;

        let q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Self::new(
                (m[1][2] - m[2][1]) / s,
                (m[2][0] - m[0][2]) / s,
                (m[0][1] - m[1][0]) / s,
                0.25 * s,
            )
        } else if m00 > m11 && m00 > m22 {
            let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
            Self::new(
                0.25 * s,
                (m[1][0] + m[0][1]) / s,
                (m[2][0] + m[0][2]) / s,
                (m[1][2] - m[2][1]) / s,
            )
        } else if m11 > m22 {
            let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
            Self::new(
                (m[1][0] + m[0][1]) / s,
                0.25 * s,
                (m[2][1] + m[1][2]) / s,
                (m[2][0] - m[0][2]) / s,
            )
        } else {
            let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
            Self::new(
                (m[2][0] + m[0][2]) / s,
                (m[2][1] + m[1][2]) / s,
                0.25 * s,
                (m[0][1] - m[1][0]) / s,
            )
        };
        q.normalize()
    }

    /// Squared magnitude
    #[inline]
    pub fn magnitude_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    /// Magnitude
    #[inline]
    pub fn magnitude(&self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    /// Normalize to unit length
    ///
    /// Repeated composition drifts away from unit length; callers that
    /// accumulate rotations every tick should renormalize. A degenerate
    /// quaternion normalizes to the identity.
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag < DEGENERATE_EPSILON {
            return Self::IDENTITY;
        }
        let inv = 1.0 / mag;
        Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    /// Conjugate (negated vector part)
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Multiplicative inverse
    pub fn inverse(&self) -> Self {
        let mag_sq = self.magnitude_squared();
        if mag_sq < DEGENERATE_EPSILON {
            return Self::IDENTITY;
        }
        self.conjugate() / mag_sq
    }

    /// Four-component dot product
    #[inline]
    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Rotate a vector by this quaternion
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        let u = self.vector();
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(t)
    }

    /// 3x3 rotation matrix (column-major, columns are the rotated basis axes)
    pub fn to_matrix3(&self) -> Mat3 {
        let q = self.normalize();
        let (x, y, z, w) = (q.x, q.y, q.z, q.w);

        let xx = x * x;
        let yy = y * y;
        let zz = z * z;
        let xy = x * y;
        let xz = x * z;
        let yz = y * z;
        let wx = w * x;
        let wy = w * y;
        let wz = w * z;

        [
            [1.0 - 2.0 * (yy + zz), 2.0 * (xy + wz), 2.0 * (xz - wy)],
            [2.0 * (xy - wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz + wx)],
            [2.0 * (xz + wy), 2.0 * (yz - wx), 1.0 - 2.0 * (xx + yy)],
        ]
    }

    /// World-space directions of the local X, Y and Z axes
    pub fn axes(&self) -> [Vec3; 3] {
        let m = self.to_matrix3();
        [Vec3::from(m[0]), Vec3::from(m[1]), Vec3::from(m[2])]
    }

    /// Check whether two quaternions describe the same rotation within `epsilon`
    ///
    /// `q` and `-q` are the same rotation.
    pub fn approx_eq_rotation(&self, other: &Self, epsilon: f32) -> bool {
        (self.normalize().dot(&other.normalize()).abs() - 1.0).abs() <= epsilon
    }
}

impl std::ops::Mul for Quaternion {
    type Output = Self;

    /// Hamilton product
    fn mul(self, o: Self) -> Self {
        Self::new(
            self.w * o.x + self.x * o.w + self.y * o.z - self.z * o.y,
            self.w * o.y - self.x * o.z + self.y * o.w + self.z * o.x,
            self.w * o.z + self.x * o.y - self.y * o.x + self.z * o.w,
            self.w * o.w - self.x * o.x - self.y * o.y - self.z * o.z,
        )
    }
}

impl std::ops::MulAssign for Quaternion {
    fn mul_assign(&mut self, o: Self) {
        *self = *self * o;
    }
}

impl std::ops::Mul<Vec3> for Quaternion {
    type Output = Vec3;
    fn mul(self, v: Vec3) -> Vec3 {
        self.rotate(v)
    }
}

impl std::ops::Mul<f32> for Quaternion {
    type Output = Self;
    fn mul(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s, self.w * s)
    }
}

impl std::ops::Div<f32> for Quaternion {
    type Output = Self;
    fn div(self, s: f32) -> Self {
        Self::new(self.x / s, self.y / s, self.z / s, self.w / s)
    }
}

impl std::ops::Add for Quaternion {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z, self.w + o.w)
    }
}

impl std::ops::Sub for Quaternion {
    type Output = Self;
    fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z, self.w - o.w)
    }
}

impl std::ops::Neg for Quaternion {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}
