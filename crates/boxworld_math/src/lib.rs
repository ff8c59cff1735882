//! 3D Mathematics Library
//!
//! This crate provides the vector and rotation types used by the Boxworld physics core.
//!
//! ## Core Types
//!
//! - [`Vec3`] - 3D vector with x, y, z components
//! - [`Quaternion`] - unit quaternion rotation, composed with the Hamilton product
//! - [`Mat3`] - 3x3 column-major matrix helpers
//! - [`MathError`] - error for fallible vector operations

pub mod mat3;
mod quaternion;
mod vec3;

pub use mat3::Mat3;
pub use quaternion::Quaternion;
pub use vec3::{MathError, Vec3};
