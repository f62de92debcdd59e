use nalgebra::{Matrix3, Vector3, SVD};

use surfalign_3d::transform::RigidTransform;

use crate::registration::RegistrationError;

/// Compute the rigid transform best mapping `src` onto `dst` in the
/// least-squares sense (orthogonal Procrustes).
///
/// Centroid removal followed by an SVD of the cross-covariance matrix gives
/// the closed-form rotation `U * V^T`, with the reflection case corrected
/// through `diag(1, 1, det)` so the result is always a proper rotation
/// (determinant +1, no scaling or shear). The translation maps the rotated
/// source centroid onto the destination centroid.
///
/// # Arguments
///
/// * `src` - Source points.
/// * `dst` - Corresponding destination points, same length as `src`.
///
/// # Returns
///
/// The rigid transform, or an error if the inputs are unusable.
pub fn fit_rigid_transform(
    src: &[[f64; 3]],
    dst: &[[f64; 3]],
) -> Result<RigidTransform, RegistrationError> {
    if src.len() != dst.len() {
        return Err(RegistrationError::InvalidInput(
            "correspondence sets differ in length",
        ));
    }
    if src.len() < 3 {
        return Err(RegistrationError::InvalidInput(
            "need at least 3 correspondences to fit a rigid transform",
        ));
    }

    // identical sets fit exactly with the identity
    if src == dst {
        return Ok(RigidTransform::identity());
    }

    let n = src.len() as f64;
    let mut src_centroid = Vector3::zeros();
    let mut dst_centroid = Vector3::zeros();
    for (s, d) in src.iter().zip(dst.iter()) {
        src_centroid += Vector3::from(*s);
        dst_centroid += Vector3::from(*d);
    }
    src_centroid /= n;
    dst_centroid /= n;

    // cross-covariance H = sum[(dst - dst_mean) * (src - src_mean)^T]
    let mut h = Matrix3::zeros();
    for (s, d) in src.iter().zip(dst.iter()) {
        let sc = Vector3::from(*s) - src_centroid;
        let dc = Vector3::from(*d) - dst_centroid;
        h += dc * sc.transpose();
    }

    let svd = SVD::new(h, true, true);
    let u = svd.u.ok_or(RegistrationError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(RegistrationError::SvdFailed)?;

    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let correction = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0));
        r = u * correction * v_t;
    }

    let t = dst_centroid - r * src_centroid;

    let mut rotation = [[0.0; 3]; 3];
    for (i, row) in rotation.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = r[(i, j)];
        }
    }

    Ok(RigidTransform::new(rotation, [t.x, t.y, t.z]))
}
