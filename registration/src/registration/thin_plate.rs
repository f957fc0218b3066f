//! Thin-plate spline warp in three dimensions.
//!
//! The warp is `f(p) = A p + b + Σ wᵢ U(|p - sᵢ|)` with the 3D kernel
//! `U(r) = r`. Weights and the affine part are found jointly from the
//! bordered system
//!
//! ```text
//! | K  P | | W |   | Y |
//! | Pᵀ 0 | | a | = | 0 |
//! ```
//!
//! so the warp reproduces every target landmark exactly.

use fiducial_core::{Error, Result};
use nalgebra::{DMatrix, Matrix3, Point3, SymmetricEigen, Vector3};

use super::landmark::{fit_landmark_transform, LandmarkMode};

/// Singular values below `max * SOLVE_EPS` are dropped when solving.
const SOLVE_EPS: f64 = 1e-12;
/// Allowed residual at the control points, relative to the landmark extent.
const INTERPOLATION_TOLERANCE: f64 = 1e-6;
/// Landmarks closer than `extent * FLATNESS_EPS` to a principal plane or
/// axis do not span that direction.
const FLATNESS_EPS: f64 = 1e-10;

/// Exact-interpolating thin-plate spline transform.
#[derive(Debug, Clone, PartialEq)]
pub struct ThinPlateSpline {
    source_landmarks: Vec<Point3<f64>>,
    target_landmarks: Vec<Point3<f64>>,
    weights: Vec<Vector3<f64>>,
    linear: Matrix3<f64>,
    offset: Vector3<f64>,
}

#[inline]
fn kernel(r: f64) -> f64 {
    r
}

impl ThinPlateSpline {
    /// Fit the spline mapping each `source` landmark onto its `target`.
    ///
    /// Coplanar landmarks leave the affine part undetermined along the plane
    /// normal; that direction is completed with the rotation and scale of the
    /// best similarity fit. Collinear landmarks and inconsistent duplicates
    /// are rejected.
    pub fn fit(source: &[Point3<f64>], target: &[Point3<f64>]) -> Result<Self> {
        if source.len() != target.len() {
            return Err(Error::InvalidInput(format!(
                "Landmark count mismatch: source has {}, target has {}",
                source.len(),
                target.len()
            )));
        }
        let n = source.len();
        let source_centroid = fiducial_core::centroid(source)
            .ok_or_else(|| Error::invalid_input("Thin-plate spline needs landmarks"))?;

        let (rank, normal) = landmark_rank(source, &source_centroid);
        if rank < 2 {
            return Err(Error::numerical(
                "Thin-plate spline landmarks are collinear",
            ));
        }

        let size = n + 4;
        let mut system = DMatrix::<f64>::zeros(size, size);
        let mut rhs = DMatrix::<f64>::zeros(size, 3);
        for (i, si) in source.iter().enumerate() {
            for (j, sj) in source.iter().enumerate().skip(i + 1) {
                let u = kernel((si - sj).norm());
                system[(i, j)] = u;
                system[(j, i)] = u;
            }
            let row = [1.0, si.x, si.y, si.z];
            for (k, value) in row.iter().enumerate() {
                system[(i, n + k)] = *value;
                system[(n + k, i)] = *value;
            }
            for k in 0..3 {
                rhs[(i, k)] = target[i][k];
            }
        }

        let svd = system.svd(true, true);
        let eps = svd.singular_values.max() * SOLVE_EPS;
        let solution = svd.solve(&rhs, eps).map_err(Error::numerical)?;

        let weights: Vec<Vector3<f64>> = (0..n)
            .map(|i| Vector3::new(solution[(i, 0)], solution[(i, 1)], solution[(i, 2)]))
            .collect();
        let mut offset = Vector3::new(solution[(n, 0)], solution[(n, 1)], solution[(n, 2)]);
        let mut linear = Matrix3::from_fn(|k, j| solution[(n + 1 + j, k)]);

        if rank == 2 {
            // Replace the undetermined normal component of the affine part.
            let fit = fit_landmark_transform(source, target, LandmarkMode::Similarity)?;
            let mapped_normal = fit.pose.rotation * normal * fit.pose.scale;
            let beta = mapped_normal - linear * normal;
            linear += beta * normal.transpose();
            offset -= beta * normal.dot(&source_centroid.coords);
        }

        let spline = Self {
            source_landmarks: source.to_vec(),
            target_landmarks: target.to_vec(),
            weights,
            linear,
            offset,
        };
        spline.check_interpolation()?;
        tracing::debug!("Fitted thin-plate spline on {} landmarks (rank {})", n, rank);
        Ok(spline)
    }

    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        let mut out = self.linear * point.coords + self.offset;
        for (s, w) in self.source_landmarks.iter().zip(&self.weights) {
            out += w * kernel((point - s).norm());
        }
        Point3::from(out)
    }

    pub fn source_landmarks(&self) -> &[Point3<f64>] {
        &self.source_landmarks
    }

    pub fn target_landmarks(&self) -> &[Point3<f64>] {
        &self.target_landmarks
    }

    pub fn num_landmarks(&self) -> usize {
        self.source_landmarks.len()
    }

    /// Affine part as `(linear, offset)`.
    pub fn affine(&self) -> (Matrix3<f64>, Vector3<f64>) {
        (self.linear, self.offset)
    }

    fn check_interpolation(&self) -> Result<()> {
        let extent = self
            .target_landmarks
            .iter()
            .map(|p| p.coords.amax())
            .fold(1.0_f64, f64::max);
        let worst = self
            .source_landmarks
            .iter()
            .zip(&self.target_landmarks)
            .map(|(s, t)| (self.transform_point(s) - t).norm())
            .fold(0.0_f64, f64::max);
        if worst > INTERPOLATION_TOLERANCE * extent {
            return Err(Error::Numerical(format!(
                "Thin-plate spline system is singular (control point residual {worst:e}); \
                 check for duplicated landmarks"
            )));
        }
        Ok(())
    }
}

/// Rank of the landmark spread and the direction of least spread.
///
/// A principal direction counts when some landmark lies measurably far from
/// the centroid along it. Distances are compared rather than scatter
/// eigenvalues, whose rounding error is relative to the squared extent.
fn landmark_rank(points: &[Point3<f64>], centroid: &Point3<f64>) -> (usize, Vector3<f64>) {
    let mut scatter = Matrix3::<f64>::zeros();
    for p in points {
        let d = p - centroid;
        scatter += d * d.transpose();
    }
    let extent = points
        .iter()
        .map(|p| (p - centroid).norm())
        .fold(0.0_f64, f64::max);
    if extent <= f64::EPSILON {
        return (0, Vector3::z());
    }
    let eigen = SymmetricEigen::new(scatter);
    let mut order = [0, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let rank = order
        .iter()
        .take_while(|&&k| {
            let axis = eigen.eigenvectors.column(k);
            points
                .iter()
                .map(|p| (p - centroid).dot(&axis).abs())
                .fold(0.0_f64, f64::max)
                > extent * FLATNESS_EPS
        })
        .count();
    let normal = eigen.eigenvectors.column(order[2]).into_owned();
    (rank, normal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolates_control_points() {
        let source = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
            Point3::new(0.0, 0.0, 10.0),
            Point3::new(5.0, 5.0, 5.0),
            Point3::new(2.0, 8.0, 1.0),
        ];
        let target = vec![
            Point3::new(0.5, 0.0, -0.2),
            Point3::new(10.0, 1.0, 0.0),
            Point3::new(-1.0, 10.5, 0.3),
            Point3::new(0.0, 0.4, 9.0),
            Point3::new(6.0, 5.0, 4.0),
            Point3::new(2.0, 7.5, 1.5),
        ];

        let tps = ThinPlateSpline::fit(&source, &target).unwrap();

        for (s, t) in source.iter().zip(&target) {
            assert!((tps.transform_point(s) - t).norm() < 1e-8);
        }
        assert_eq!(tps.num_landmarks(), 6);
    }

    #[test]
    fn test_affine_motion_has_zero_bending() {
        let source = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(0.0, 4.0, 0.0),
            Point3::new(0.0, 0.0, 4.0),
            Point3::new(1.0, 2.0, 3.0),
        ];
        let shift = Vector3::new(10.0, -2.0, 3.0);
        let target: Vec<_> = source.iter().map(|p| p + shift).collect();

        let tps = ThinPlateSpline::fit(&source, &target).unwrap();

        let probe = Point3::new(7.0, -3.0, 2.5);
        assert!((tps.transform_point(&probe) - (probe + shift)).norm() < 1e-8);
    }

    #[test]
    fn test_coplanar_landmarks_keep_normal_direction() {
        let source = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let target: Vec<_> = source.iter().map(|p| p + Vector3::new(10.0, 0.0, 0.0)).collect();

        let tps = ThinPlateSpline::fit(&source, &target).unwrap();

        let lifted = tps.transform_point(&Point3::new(0.0, 0.0, 5.0));
        assert!((lifted - Point3::new(10.0, 0.0, 5.0)).norm() < 1e-8);
    }

    #[test]
    fn test_nearly_coplanar_landmarks_still_interpolate() {
        let source = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
            Point3::new(10.0, 10.0, 1e-5),
        ];
        let target = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(11.0, 0.5, 0.0),
            Point3::new(1.0, 10.0, 0.2),
            Point3::new(11.5, 10.0, 0.0),
        ];

        let tps = ThinPlateSpline::fit(&source, &target).unwrap();

        for (s, t) in source.iter().zip(&target) {
            assert!((tps.transform_point(s) - t).norm() < 1e-7);
        }
    }

    #[test]
    fn test_rotated_plane_is_detected_as_coplanar() {
        let rotation = nalgebra::Rotation3::from_euler_angles(0.7, -0.4, 1.3);
        let source: Vec<_> = [[0.0, 0.0], [3.0, 0.0], [0.0, 2.0], [2.0, 2.5]]
            .iter()
            .map(|[x, y]| Point3::from(rotation * Vector3::new(*x, *y, 0.0)))
            .collect();
        let centroid = fiducial_core::centroid(&source).unwrap();

        let (rank, normal) = landmark_rank(&source, &centroid);

        assert_eq!(rank, 2);
        assert!((normal.dot(&(rotation * Vector3::z())).abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_landmarks_are_rejected() {
        let source: Vec<_> = (0..4).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let err = ThinPlateSpline::fit(&source, &source).unwrap_err();
        assert!(err.to_string().contains("collinear"));
    }

    #[test]
    fn test_conflicting_duplicates_are_rejected() {
        let source = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let target = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 3.0, 0.0),
        ];
        assert!(ThinPlateSpline::fit(&source, &target).is_err());
    }
}
