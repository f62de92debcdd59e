/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation, any non-zero length.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The row-major rotation matrix.
///
/// Example:
///
/// ```
/// use surfalign_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let rotation = axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 0.0).unwrap();
/// assert_eq!(rotation, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], &'static str> {
    let magnitude = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
    if magnitude < 1e-10 {
        return Err("cannot compute rotation matrix from a zero vector");
    }
    let (x, y, z) = (axis[0] / magnitude, axis[1] / magnitude, axis[2] / magnitude);

    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;

    // Rodrigues: R = c*I + s*[axis]_x + t*(axis axis^T)
    Ok([
        [
            c + t * x * x,
            t * x * y - s * z,
            t * x * z + s * y,
        ],
        [
            t * x * y + s * z,
            c + t * y * y,
            t * y * z - s * x,
        ],
        [
            t * x * z - s * y,
            t * y * z + s * x,
            c + t * z * z,
        ],
    ])
}

/// Compute the rotation matrix for rotations about X, then Y, then Z.
///
/// # Arguments
///
/// * `rx` - Rotation about the X axis, in radians.
/// * `ry` - Rotation about the Y axis, in radians.
/// * `rz` - Rotation about the Z axis, in radians.
///
/// # Returns
///
/// The row-major rotation matrix `Rz * Ry * Rx`.
pub fn euler_xyz_to_rotation_matrix(rx: f64, ry: f64, rz: f64) -> [[f64; 3]; 3] {
    let (sx, cx) = rx.sin_cos();
    let (sy, cy) = ry.sin_cos();
    let (sz, cz) = rz.sin_cos();

    [
        [
            cz * cy,
            cz * sy * sx - sz * cx,
            cz * sy * cx + sz * sx,
        ],
        [
            sz * cy,
            sz * sy * sx + cz * cx,
            sz * sy * cx - cz * sx,
        ],
        [-sy, cy * sx, cy * cx],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_axis_angle_quarter_turn_x() -> Result<(), &'static str> {
        let rotation = axis_angle_to_rotation_matrix(&[1.0, 0.0, 0.0], std::f64::consts::PI / 2.0)?;
        let expected = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rotation[i][j], expected[i][j], epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_axis_angle_zero_axis() {
        assert!(axis_angle_to_rotation_matrix(&[0.0, 0.0, 0.0], 1.0).is_err());
    }

    #[test]
    fn test_euler_matches_axis_angle_per_axis() -> Result<(), &'static str> {
        let angle = 0.3;
        let from_euler = euler_xyz_to_rotation_matrix(angle, 0.0, 0.0);
        let from_axis = axis_angle_to_rotation_matrix(&[1.0, 0.0, 0.0], angle)?;
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(from_euler[i][j], from_axis[i][j], epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_euler_is_proper_rotation() {
        let r = euler_xyz_to_rotation_matrix(0.1, -0.2, 0.3);
        // det(R) == +1 for a proper rotation
        let det = r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1])
            - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
            + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0]);
        assert_relative_eq!(det, 1.0, epsilon = 1e-12);
    }
}
