//! Closed-form landmark registration (Kabsch / Umeyama).

use fiducial_core::{Error, Result, SimilarityPose};
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Relative singular value below which the cross-covariance is rank deficient.
const RANK_TOLERANCE: f64 = 1e-10;

/// Degrees of freedom of a landmark fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkMode {
    RigidBody,
    Similarity,
}

/// Result of a landmark fit.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFit {
    pub pose: SimilarityPose,
    /// Singular values of the cross-covariance, largest first.
    pub singular_values: Vector3<f64>,
    /// The correspondences did not determine the rotation (rank ≤ 1) or the
    /// source had no spread to derive a scale from.
    pub degenerate: bool,
}

impl LandmarkFit {
    pub fn matrix(&self) -> Matrix4<f64> {
        self.pose.matrix()
    }
}

/// Least-squares rigid or similarity transform mapping `source` onto `target`.
///
/// # Algorithm
///
/// 1. Center both sets on their centroids
/// 2. Cross-covariance `H = Σ tgt_c · src_cᵀ`
/// 3. SVD `H = U S Vᵀ`, rotation `R = U D Vᵀ` where `D` flips the axis of the
///    smallest singular value when `det(U Vᵀ) < 0`
/// 4. Similarity only: scale `s = tr(S D) / Σ |src_c|²`
/// 5. Translation `t = μ_tgt - s R μ_src`
///
/// Near-singular configurations still produce a best-effort transform with
/// [`LandmarkFit::degenerate`] set.
pub fn fit_landmark_transform(
    source: &[Point3<f64>],
    target: &[Point3<f64>],
    mode: LandmarkMode,
) -> Result<LandmarkFit> {
    if source.len() != target.len() {
        return Err(Error::InvalidInput(format!(
            "Landmark count mismatch: source has {}, target has {}",
            source.len(),
            target.len()
        )));
    }
    let source_centroid = fiducial_core::centroid(source)
        .ok_or_else(|| Error::invalid_input("Landmark sets are empty"))?;
    let target_centroid = fiducial_core::centroid(target)
        .ok_or_else(|| Error::invalid_input("Landmark sets are empty"))?;

    let mut covariance = Matrix3::<f64>::zeros();
    let mut source_spread = 0.0;
    for (src, tgt) in source.iter().zip(target) {
        let src = src - source_centroid;
        let tgt = tgt - target_centroid;
        covariance += tgt * src.transpose();
        source_spread += src.norm_squared();
    }

    let svd = covariance.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| Error::numerical("SVD U missing in fit_landmark_transform"))?;
    let vt = svd
        .v_t
        .ok_or_else(|| Error::numerical("SVD V^T missing in fit_landmark_transform"))?;
    let sigma = svd.singular_values;

    // Ensure proper rotation (det = 1)
    let mut correction = Vector3::new(1.0, 1.0, 1.0);
    if (u * vt).determinant() < 0.0 {
        correction[sigma.imin()] = -1.0;
    }
    let rotation = u * Matrix3::from_diagonal(&correction) * vt;

    let mut sorted = [sigma[0], sigma[1], sigma[2]];
    sorted.sort_by(|a, b| b.total_cmp(a));
    let singular_values = Vector3::from(sorted);
    let mut degenerate = singular_values[0] <= f64::EPSILON
        || singular_values[1] <= singular_values[0] * RANK_TOLERANCE;

    let scale = match mode {
        LandmarkMode::RigidBody => 1.0,
        LandmarkMode::Similarity => {
            if source_spread > f64::EPSILON {
                sigma.component_mul(&correction).sum() / source_spread
            } else {
                degenerate = true;
                1.0
            }
        }
    };

    let translation: Vector3<f64> =
        target_centroid.coords - rotation * source_centroid.coords * scale;

    if degenerate {
        tracing::warn!(
            "Landmark fit is numerically degenerate (singular values {:?})",
            singular_values.as_slice()
        );
    }

    Ok(LandmarkFit {
        pose: SimilarityPose::new(rotation, translation, scale),
        singular_values,
        degenerate,
    })
}
