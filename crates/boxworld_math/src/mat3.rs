//! 3x3 matrix utilities
//!
//! Matrices are stored column-major as `[[f32; 3]; 3]`, so `m[c]` is column `c`
//! and `m[c][r]` is the element in row `r`. A rotation matrix's columns are the
//! rotated X, Y and Z axes.

use crate::Vec3;

/// 3x3 matrix type (column-major)
pub type Mat3 = [[f32; 3]; 3];

/// Identity matrix
pub const IDENTITY: Mat3 = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

/// Build a matrix from three column vectors
pub fn from_columns(c0: Vec3, c1: Vec3, c2: Vec3) -> Mat3 {
    [c0.to_array(), c1.to_array(), c2.to_array()]
}

/// Diagonal matrix with `d` on the diagonal
pub fn from_diagonal(d: Vec3) -> Mat3 {
    [
        [d.x, 0.0, 0.0],
        [0.0, d.y, 0.0],
        [0.0, 0.0, d.z],
    ]
}

/// Multiply two matrices: result = a * b
pub fn mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut result = [[0.0f32; 3]; 3];
    for (c, column) in result.iter_mut().enumerate() {
        for (r, value) in column.iter_mut().enumerate() {
            *value = (0..3).map(|k| a[k][r] * b[c][k]).sum();
        }
    }
    result
}

/// Transpose
pub fn transpose(m: &Mat3) -> Mat3 {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// Transform a vector: result = m * v
pub fn transform(m: &Mat3, v: Vec3) -> Vec3 {
    Vec3::new(
        m[0][0] * v.x + m[1][0] * v.y + m[2][0] * v.z,
        m[0][1] * v.x + m[1][1] * v.y + m[2][1] * v.z,
        m[0][2] * v.x + m[1][2] * v.y + m[2][2] * v.z,
    )
}

/// Express a body-space tensor in world space: `R * T * Rᵀ`
pub fn rotate_tensor(rotation: &Mat3, tensor: &Mat3) -> Mat3 {
    mul(&mul(rotation, tensor), &transpose(rotation))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn mat_approx_eq(a: &Mat3, b: &Mat3) -> bool {
        a.iter()
            .flatten()
            .zip(b.iter().flatten())
            .all(|(x, y)| (x - y).abs() < EPSILON)
    }

    #[test]
    fn test_identity_transform() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(transform(&IDENTITY, v), v);
    }

    #[test]
    fn test_mul_identity() {
        let m = from_columns(Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0), Vec3::new(7.0, 8.0, 9.0));
        assert_eq!(mul(&m, &IDENTITY), m);
        assert_eq!(mul(&IDENTITY, &m), m);
    }

    #[test]
    fn test_mul_matches_sequential_transform() {
        let a = from_columns(Vec3::Y, -Vec3::X, Vec3::Z); // 90 deg about Z
        let b = from_columns(Vec3::X, Vec3::Z, -Vec3::Y); // 90 deg about X
        let v = Vec3::new(0.5, 1.0, -2.0);
        let ab = mul(&a, &b);
        assert!(transform(&ab, v).approx_eq(transform(&a, transform(&b, v)), EPSILON));
    }

    #[test]
    fn test_transpose_of_rotation_is_inverse() {
        let r = from_columns(Vec3::Y, -Vec3::X, Vec3::Z);
        assert!(mat_approx_eq(&mul(&r, &transpose(&r)), &IDENTITY));
    }

    #[test]
    fn test_rotate_diagonal_tensor() {
        // Rotating 90 deg about Z swaps the X and Y diagonal entries
        let r = from_columns(Vec3::Y, -Vec3::X, Vec3::Z);
        let t = from_diagonal(Vec3::new(1.0, 2.0, 3.0));
        let world = rotate_tensor(&r, &t);
        assert!(mat_approx_eq(&world, &from_diagonal(Vec3::new(2.0, 1.0, 3.0))));
    }
}
