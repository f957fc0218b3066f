//! Degeneracy check for fiducial sets.
//!
//! A point set is collinear when the principal component analysis of its
//! coordinates finds at most one direction with significant variance.

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

use super::options::RegistrationOptions;

/// Default cutoff below which a covariance eigenvalue is treated as zero.
pub const DEFAULT_EIGENVALUE_THRESHOLD: f64 = 1e-4;

/// PCA-based collinearity test with an explicit threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollinearityChecker {
    enabled: bool,
    eigenvalue_threshold: f64,
}

impl Default for CollinearityChecker {
    fn default() -> Self {
        Self::new(DEFAULT_EIGENVALUE_THRESHOLD)
    }
}

impl CollinearityChecker {
    pub fn new(eigenvalue_threshold: f64) -> Self {
        Self {
            enabled: true,
            eigenvalue_threshold,
        }
    }

    /// A checker that reports every input as non-collinear.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            eigenvalue_threshold: DEFAULT_EIGENVALUE_THRESHOLD,
        }
    }

    pub fn from_options(options: &RegistrationOptions) -> Self {
        Self {
            enabled: options.check_collinearity,
            eigenvalue_threshold: options.eigenvalue_threshold,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn eigenvalue_threshold(&self) -> f64 {
        self.eigenvalue_threshold
    }

    /// Number of covariance eigenvalues whose magnitude exceeds the threshold.
    pub fn significant_directions(&self, points: &[Point3<f64>]) -> usize {
        principal_variances(points)
            .map(|ev| {
                ev.iter()
                    .filter(|v| v.abs() > self.eigenvalue_threshold)
                    .count()
            })
            .unwrap_or(0)
    }

    /// `true` when the points spread along at most one direction.
    ///
    /// Fewer than two points are always degenerate. A disabled checker
    /// returns `false` unconditionally.
    pub fn is_collinear(&self, points: &[Point3<f64>]) -> bool {
        if !self.enabled {
            return false;
        }
        if points.len() < 2 {
            return true;
        }
        self.significant_directions(points) <= 1
    }
}

/// Collinearity with the default threshold.
pub fn is_collinear(points: &[Point3<f64>]) -> bool {
    CollinearityChecker::default().is_collinear(points)
}

/// Eigenvalues of the sample covariance of `points`, largest first.
///
/// Returns `None` for fewer than two points.
pub fn principal_variances(points: &[Point3<f64>]) -> Option<Vector3<f64>> {
    let cov = sample_covariance(points)?;
    let eigen = SymmetricEigen::new(cov);
    let mut values = [
        eigen.eigenvalues[0],
        eigen.eigenvalues[1],
        eigen.eigenvalues[2],
    ];
    values.sort_by(|a, b| b.total_cmp(a));
    Some(Vector3::from(values))
}

fn sample_covariance(points: &[Point3<f64>]) -> Option<Matrix3<f64>> {
    if points.len() < 2 {
        return None;
    }
    let mean = fiducial_core::centroid(points)?;
    let mut cov = Matrix3::<f64>::zeros();
    for p in points {
        let d = p - mean;
        cov += d * d.transpose();
    }
    Some(cov / (points.len() - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_on_a_line_are_collinear() {
        let points: Vec<_> = (0..5)
            .map(|i| Point3::new(1.0 + i as f64, 2.0 + 2.0 * i as f64, -3.0 * i as f64))
            .collect();
        assert!(is_collinear(&points));
        assert_eq!(CollinearityChecker::default().significant_directions(&points), 1);
    }

    #[test]
    fn test_tetrahedron_is_not_collinear() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
            Point3::new(0.0, 0.0, 10.0),
        ];
        assert!(!is_collinear(&points));
        assert_eq!(CollinearityChecker::default().significant_directions(&points), 3);
    }

    #[test]
    fn test_planar_triangle_is_not_collinear() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert!(!is_collinear(&points));
    }

    #[test]
    fn test_coincident_and_tiny_sets_are_degenerate() {
        let same = vec![Point3::new(3.0, 3.0, 3.0); 4];
        assert!(is_collinear(&same));
        assert!(is_collinear(&[Point3::origin()]));
        assert!(is_collinear(&[]));
    }

    #[test]
    fn test_threshold_is_respected() {
        // Off-line spread of 1e-3 gives a covariance eigenvalue around 1e-7.
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.001, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        assert!(CollinearityChecker::new(1e-4).is_collinear(&points));
        assert!(!CollinearityChecker::new(1e-10).is_collinear(&points));
    }

    #[test]
    fn test_disabled_checker_never_reports_collinear() {
        let points: Vec<_> = (0..4).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let checker = CollinearityChecker::disabled();
        assert!(!checker.is_enabled());
        assert!(!checker.is_collinear(&points));

        let from_options = CollinearityChecker::from_options(
            &RegistrationOptions::default().with_collinearity_check(false),
        );
        assert!(!from_options.is_collinear(&points));
    }
}
