use crate::linalg::matmul33;

/// A rigid transform: a rotation in SO(3) plus a translation.
///
/// The rotation block stays orthonormal because every producer in this
/// workspace builds it either from a closed-form rotation constructor or
/// from an SVD-based fit; there is no post-hoc renormalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// Row-major rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Create a transform from a rotation matrix and a translation vector.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0, 0.0, 0.0],
        }
    }

    /// Apply the transform to a single point.
    pub fn apply(&self, point: &[f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            r[0][0] * point[0] + r[0][1] * point[1] + r[0][2] * point[2] + t[0],
            r[1][0] * point[0] + r[1][1] * point[1] + r[1][2] * point[2] + t[1],
            r[2][0] * point[0] + r[2][1] * point[1] + r[2][2] * point[2] + t[2],
        ]
    }

    /// Compose two transforms: the result applies `rhs` first, then `self`.
    ///
    /// This is the accumulation step of the ICP loop, where each iteration's
    /// delta is composed onto the running total as `total = delta * total`.
    pub fn compose(&self, rhs: &Self) -> Self {
        let mut rotation = [[0.0; 3]; 3];
        matmul33(&self.rotation, &rhs.rotation, &mut rotation);

        let mut translation = [0.0; 3];
        for (i, row) in self.rotation.iter().enumerate() {
            translation[i] = row[0] * rhs.translation[0]
                + row[1] * rhs.translation[1]
                + row[2] * rhs.translation[2]
                + self.translation[i];
        }

        Self {
            rotation,
            translation,
        }
    }

    /// Invert the transform: R' = R^T, t' = -R^T * t.
    pub fn inverse(&self) -> Self {
        let mut rotation = [[0.0; 3]; 3];
        for (i, row) in self.rotation.iter().enumerate() {
            for (j, val) in row.iter().enumerate() {
                rotation[j][i] = *val;
            }
        }

        let mut translation = [0.0; 3];
        for (i, row) in rotation.iter().enumerate() {
            translation[i] = -(row[0] * self.translation[0]
                + row[1] * self.translation[1]
                + row[2] * self.translation[2]);
        }

        Self {
            rotation,
            translation,
        }
    }

    /// Export as a row-major 4x4 homogeneous matrix.
    ///
    /// The bottom row is always `[0, 0, 0, 1]`; there are no perspective
    /// terms.
    pub fn to_matrix(&self) -> [[f64; 4]; 4] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            [r[0][0], r[0][1], r[0][2], t[0]],
            [r[1][0], r[1][1], r[1][2], t[1]],
            [r[2][0], r[2][1], r[2][2], t[2]],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}
