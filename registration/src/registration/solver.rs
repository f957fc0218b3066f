//! Transform solver front-end.

use fiducial_core::{Error, Result};
use nalgebra::Point3;

use super::landmark::{fit_landmark_transform, LandmarkMode};
use super::thin_plate::ThinPlateSpline;
use super::transform::{OutputRepresentation, Transform, TransformFamily};

/// Minimum number of corresponding points for any registration.
pub const MIN_CORRESPONDENCES: usize = 3;

/// A solved transform plus the numerical health of the fit.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedTransform {
    pub transform: Transform,
    /// Rigid/similarity fit was numerically degenerate.
    pub degenerate: bool,
}

/// Compute the transform of `family` that maps `from` onto `to`.
///
/// `target` is the representation the caller can store; asking for a warp
/// into a linear-only target fails with
/// [`Error::IncompatibleOutputRepresentation`] before anything is computed.
pub fn solve(
    from: &[Point3<f64>],
    to: &[Point3<f64>],
    family: TransformFamily,
    target: OutputRepresentation,
) -> Result<Transform> {
    solve_with_diagnostics(from, to, family, target).map(|solved| solved.transform)
}

/// Like [`solve`], with the family given by name.
pub fn solve_named(
    from: &[Point3<f64>],
    to: &[Point3<f64>],
    family: &str,
    target: OutputRepresentation,
) -> Result<Transform> {
    solve(from, to, family.parse()?, target)
}

pub fn solve_with_diagnostics(
    from: &[Point3<f64>],
    to: &[Point3<f64>],
    family: TransformFamily,
    target: OutputRepresentation,
) -> Result<SolvedTransform> {
    if !target.accepts(family) {
        return Err(Error::IncompatibleOutputRepresentation(format!(
            "{family} transform cannot be stored in a linear transform"
        )));
    }
    if from.len() != to.len() {
        return Err(Error::InvalidInput(format!(
            "Point sets have unequal length (from: {}, to: {})",
            from.len(),
            to.len()
        )));
    }
    if from.len() < MIN_CORRESPONDENCES {
        return Err(Error::InvalidInput(format!(
            "At least {MIN_CORRESPONDENCES} correspondences required, got {}",
            from.len()
        )));
    }

    tracing::debug!("Solving {} registration on {} points", family, from.len());

    match family {
        TransformFamily::Rigid | TransformFamily::Similarity => {
            let mode = if family == TransformFamily::Rigid {
                LandmarkMode::RigidBody
            } else {
                LandmarkMode::Similarity
            };
            let fit = fit_landmark_transform(from, to, mode)?;
            Ok(SolvedTransform {
                transform: Transform::Linear(fit.matrix()),
                degenerate: fit.degenerate,
            })
        }
        TransformFamily::Warping => {
            let tps = ThinPlateSpline::fit(from, to)?;
            Ok(SolvedTransform {
                transform: Transform::ThinPlateSpline(tps),
                degenerate: false,
            })
        }
    }
}
