use log::debug;

use surfalign_3d::geometry::Geometry;
use surfalign_3d::linalg::transform_points;
use surfalign_3d::locator::{LocatorError, SurfaceLocator};
use surfalign_3d::transform::RigidTransform;

use crate::fit::fit_rigid_transform;

/// Errors produced by a registration run.
///
/// Every variant is fatal and raised synchronously; nothing is retried
/// internally. Reaching the iteration cap without meeting the tolerance is
/// not an error and is indistinguishable from convergence in the return
/// value; [`IcpRegistration::iterations`] exposes the count actually used so
/// callers can compare it against the cap.
#[derive(thiserror::Error, Debug)]
pub enum RegistrationError {
    /// A precondition on the inputs was violated.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Neither source nor target carries faces, so point-to-surface
    /// correspondence is impossible.
    #[error("neither source nor target has any faces, cannot run ICP")]
    DegenerateGeometry,

    /// The singular value decomposition in the rigid fit did not produce
    /// factors.
    #[error("singular value decomposition failed")]
    SvdFailed,
}

impl From<LocatorError> for RegistrationError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::TooFewPoints => {
                Self::InvalidInput("surface has fewer than 3 points")
            }
            LocatorError::NoFaces => Self::DegenerateGeometry,
            LocatorError::FaceOutOfBounds { .. } => {
                Self::InvalidInput("face references an out-of-bounds point index")
            }
        }
    }
}

/// Parameters of the ICP loop.
#[derive(Debug, Clone)]
pub struct IcpConfig {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Maximum number of landmark points sampled per iteration. Dense
    /// clouds are subsampled by a fixed stride down to this count, never
    /// randomly, so runs stay deterministic. Must be at least 1.
    pub max_landmarks: usize,
    /// Convergence tolerance: the loop stops once the RMS displacement of
    /// the landmark set in one iteration falls below this value.
    pub tolerance: f64,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_landmarks: 50,
            tolerance: 0.01,
        }
    }
}

/// Rigid point-to-surface registration with iterative closest point.
///
/// The object borrows its source and target geometries for the duration of
/// a run and owns the accumulated transform and the closest-point locator.
/// [`run`](Self::run) blocks until completion; afterwards
/// [`transform`](Self::transform), [`rms_residual`](Self::rms_residual) and
/// [`apply_transform`](Self::apply_transform) are read-only queries that can
/// be called any number of times. Single-owner, single-thread use per
/// instance; independent instances share nothing.
///
/// Matching is point-to-surface: the source only needs points, but the
/// target needs faces. When only the source carries faces the roles swap
/// internally and the accumulated transform is inverted before it is
/// stored, so the public transform always maps source space to target
/// space.
pub struct IcpRegistration<'a> {
    source: Option<&'a Geometry>,
    target: Option<&'a Geometry>,
    target_locator: Option<SurfaceLocator>,
    // built during run() when the roles are swapped; serves the residual
    source_locator: Option<SurfaceLocator>,
    config: IcpConfig,
    transform: RigidTransform,
    iterations: usize,
}

impl Default for IcpRegistration<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IcpRegistration<'a> {
    /// Create a registration with the default configuration
    /// (100 iterations, 50 landmarks, tolerance 0.01).
    pub fn new() -> Self {
        Self::with_config(IcpConfig::default())
    }

    /// Create a registration with an explicit configuration.
    pub fn with_config(config: IcpConfig) -> Self {
        Self {
            source: None,
            target: None,
            target_locator: None,
            source_locator: None,
            config,
            transform: RigidTransform::identity(),
            iterations: 0,
        }
    }

    /// Set the maximum number of iterations.
    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.config.max_iterations = max_iterations;
    }

    /// Set the landmark cap for per-iteration subsampling.
    ///
    /// A cap of zero is rejected when the registration runs or the
    /// residual is queried.
    pub fn set_max_landmarks(&mut self, max_landmarks: usize) {
        self.config.max_landmarks = max_landmarks;
    }

    /// Set the convergence tolerance.
    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.config.tolerance = tolerance;
    }

    /// Set the source geometry.
    pub fn set_source(&mut self, source: &'a Geometry) {
        self.source = Some(source);
        self.source_locator = None;
    }

    /// Set the target geometry, rebuilding the closest-point locator when
    /// the target carries faces.
    ///
    /// A target without faces is accepted here; whether the role swap can
    /// make up for it is decided by [`run`](Self::run).
    pub fn set_target(&mut self, target: &'a Geometry) -> Result<(), RegistrationError> {
        self.target_locator = if target.has_faces() {
            Some(SurfaceLocator::build(target)?)
        } else {
            None
        };
        self.target = Some(target);
        self.source_locator = None;
        Ok(())
    }

    /// Run the registration to completion.
    ///
    /// Alternates closest-point correspondence search and rigid Procrustes
    /// fitting until the per-iteration landmark displacement falls below the
    /// tolerance or the iteration cap is reached; both outcomes are `Ok`.
    /// On error the accumulated transform is left untouched.
    pub fn run(&mut self) -> Result<(), RegistrationError> {
        let source = self
            .source
            .ok_or(RegistrationError::InvalidInput("source is not set"))?;
        let target = self
            .target
            .ok_or(RegistrationError::InvalidInput("target is not set"))?;
        if source.len() < 3 {
            return Err(RegistrationError::InvalidInput(
                "source has fewer than 3 points",
            ));
        }
        if target.len() < 3 {
            return Err(RegistrationError::InvalidInput(
                "target has fewer than 3 points",
            ));
        }
        if self.config.max_landmarks == 0 {
            return Err(RegistrationError::InvalidInput(
                "landmark cap must be at least 1",
            ));
        }

        let (transform, iterations) = if let Some(locator) = &self.target_locator {
            icp_align(source.points(), locator, &self.config)?
        } else if source.has_faces() {
            // the target has no surface but the source does: align the
            // target onto the source and invert the result
            let locator = SurfaceLocator::build(source)?;
            let (swapped, iterations) = icp_align(target.points(), &locator, &self.config)?;
            self.source_locator = Some(locator);
            (swapped.inverse(), iterations)
        } else {
            return Err(RegistrationError::DegenerateGeometry);
        };

        self.transform = transform;
        self.iterations = iterations;
        Ok(())
    }

    /// The accumulated transform mapping source space to target space.
    pub fn transform(&self) -> &RigidTransform {
        &self.transform
    }

    /// Number of iterations the last run actually performed.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// RMS of closest-point distances between the transformed source and
    /// the target surface, over a strided subsample capped at the landmark
    /// count.
    ///
    /// Independent of the optimizer's internal convergence state. When the
    /// roles were swapped the locator lives on the source side, so the
    /// target is mapped through the inverse transform instead; under a
    /// rigid motion this measures the same set-to-surface distance.
    pub fn rms_residual(&self) -> Result<f64, RegistrationError> {
        let source = self
            .source
            .ok_or(RegistrationError::InvalidInput("source is not set"))?;
        if self.config.max_landmarks == 0 {
            return Err(RegistrationError::InvalidInput(
                "landmark cap must be at least 1",
            ));
        }

        if let Some(locator) = &self.target_locator {
            Ok(rms_closest_point_distance(
                locator,
                source.points(),
                &self.transform,
                self.config.max_landmarks,
            ))
        } else if let Some(locator) = &self.source_locator {
            let target = self
                .target
                .ok_or(RegistrationError::InvalidInput("target is not set"))?;
            Ok(rms_closest_point_distance(
                locator,
                target.points(),
                &self.transform.inverse(),
                self.config.max_landmarks,
            ))
        } else {
            Err(RegistrationError::DegenerateGeometry)
        }
    }

    /// Produce a copy of the source transformed by the accumulated matrix.
    ///
    /// The source itself is never mutated; faces are carried over
    /// unchanged.
    pub fn apply_transform(&self) -> Result<Geometry, RegistrationError> {
        let source = self
            .source
            .ok_or(RegistrationError::InvalidInput("source is not set"))?;

        let mut points = vec![[0.0; 3]; source.len()];
        transform_points(
            source.points(),
            &self.transform.rotation,
            &self.transform.translation,
            &mut points,
        );

        Ok(match source {
            Geometry::Points(_) => Geometry::Points(points),
            Geometry::Surface { faces, .. } => Geometry::Surface {
                points,
                faces: faces.clone(),
            },
        })
    }
}

/// The ICP loop proper: strided landmarks, correspondence search, rigid fit,
/// convergence check on the RMS landmark displacement.
fn icp_align(
    points: &[[f64; 3]],
    locator: &SurfaceLocator,
    config: &IcpConfig,
) -> Result<(RigidTransform, usize), RegistrationError> {
    let stride = if points.len() > config.max_landmarks {
        points.len() / config.max_landmarks
    } else {
        1
    };
    let mut landmarks: Vec<[f64; 3]> = points.iter().step_by(stride).copied().collect();
    if landmarks.len() < 3 {
        return Err(RegistrationError::InvalidInput(
            "landmark cap leaves fewer than 3 sample points",
        ));
    }

    let mut closest = vec![[0.0; 3]; landmarks.len()];
    let mut total = RigidTransform::identity();
    let mut iterations = 0;

    for iteration in 0..config.max_iterations {
        iterations = iteration + 1;

        for (landmark, correspondence) in landmarks.iter().zip(closest.iter_mut()) {
            *correspondence = locator.find_closest_point(landmark).point;
        }

        let delta = fit_rigid_transform(&landmarks, &closest)?;
        total = delta.compose(&total);

        // move the landmarks and measure how far this iteration shifted them
        let mut shift_sq = 0.0;
        for landmark in landmarks.iter_mut() {
            let moved = delta.apply(landmark);
            let dx = moved[0] - landmark[0];
            let dy = moved[1] - landmark[1];
            let dz = moved[2] - landmark[2];
            shift_sq += dx * dx + dy * dy + dz * dz;
            *landmark = moved;
        }
        let mean_shift = (shift_sq / landmarks.len() as f64).sqrt();

        debug!(
            "iteration {}: {} landmarks, mean shift {:.3e}",
            iteration,
            landmarks.len(),
            mean_shift
        );

        if mean_shift <= config.tolerance {
            break;
        }
    }

    Ok((total, iterations))
}

fn rms_closest_point_distance(
    locator: &SurfaceLocator,
    points: &[[f64; 3]],
    transform: &RigidTransform,
    max_landmarks: usize,
) -> f64 {
    let stride = if points.len() > max_landmarks {
        points.len() / max_landmarks
    } else {
        1
    };

    let mut sum_sq = 0.0;
    let mut used = 0usize;
    for point in points.iter().step_by(stride) {
        let moved = transform.apply(point);
        sum_sq += locator.find_closest_point(&moved).dist_sq;
        used += 1;
    }
    // an empty sample reads as a zero residual rather than NaN
    if used == 0 {
        return 0.0;
    }
    (sum_sq / used as f64).sqrt()
}
