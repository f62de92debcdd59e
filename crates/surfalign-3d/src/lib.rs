#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Point cloud and surface geometry containers.
pub mod geometry;

/// Linear algebra utilities.
pub mod linalg;

/// Closest-point queries over triangulated surfaces.
pub mod locator;

/// Rigid transform type.
pub mod transform;

/// Rotation matrix constructors.
pub mod transforms;
