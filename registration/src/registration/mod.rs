//! 3D Landmark Registration Module
//!
//! Implements closed-form fiducial registration:
//! - Rigid (Kabsch) and similarity (Umeyama) landmark fits
//! - Thin-plate spline warping
//! - PCA-based collinearity check for input validation
//! - RMS registration error evaluation

pub mod collinear;
pub mod landmark;
pub mod options;
pub mod solver;
pub mod thin_plate;
pub mod transform;

pub use collinear::{
    is_collinear, principal_variances, CollinearityChecker, DEFAULT_EIGENVALUE_THRESHOLD,
};
pub use landmark::{fit_landmark_transform, LandmarkFit, LandmarkMode};
pub use options::{RegistrationOptions, UpdateMode};
pub use solver::{
    solve, solve_named, solve_with_diagnostics, SolvedTransform, MIN_CORRESPONDENCES,
};
pub use thin_plate::ThinPlateSpline;
pub use transform::{OutputRepresentation, Transform, TransformFamily};
pub use fiducial_core::{Error, Result};

use nalgebra::Point3;

/// Root-mean-square registration error.
///
/// Maps every `from` point through `transform` and returns
/// `sqrt(mean(|T(from_i) - to_i|²))`.
///
/// # Errors
///
/// * `InvalidInput` - the sets have different lengths
/// * `DivideByZero` - the sets are empty
pub fn compute_rms_error(
    from: &[Point3<f64>],
    to: &[Point3<f64>],
    transform: &Transform,
) -> Result<f64> {
    if from.len() != to.len() {
        return Err(Error::InvalidInput(format!(
            "Cannot compare {} transformed points with {} target points",
            from.len(),
            to.len()
        )));
    }
    if from.is_empty() {
        return Err(Error::DivideByZero(
            "RMS error of an empty point set is undefined".to_string(),
        ));
    }

    let mapped = transform.transform_points(from);
    let sum_squared: f64 = mapped
        .iter()
        .zip(to)
        .map(|(m, t)| (m - t).norm_squared())
        .sum();

    Ok((sum_squared / from.len() as f64).sqrt())
}

#[cfg(test)]
mod mod_test;
