use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Rotation, uniform scale and translation: `p' = scale * R * p + t`.
///
/// A rigid pose is the special case `scale == 1`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimilarityPose {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
    pub scale: f64,
}

impl SimilarityPose {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>, scale: f64) -> Self {
        Self {
            rotation,
            translation,
            scale,
        }
    }

    pub fn rigid(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self::new(rotation, translation, 1.0)
    }

    pub fn identity() -> Self {
        Self::rigid(Matrix3::identity(), Vector3::zeros())
    }

    /// Split a homogeneous similarity matrix into its parts.
    ///
    /// The scale is recovered as the cube root of the determinant of the
    /// upper-left block, so the input is assumed to contain no reflection.
    pub fn from_matrix(transform: &Matrix4<f64>) -> Self {
        let linear = Matrix3::from(transform.fixed_view::<3, 3>(0, 0));
        let translation = Vector3::from(transform.fixed_view::<3, 1>(0, 3));
        let scale = linear.determinant().cbrt();
        let rotation = if scale.abs() > f64::EPSILON {
            linear / scale
        } else {
            Matrix3::identity()
        };
        Self {
            rotation,
            translation,
            scale,
        }
    }

    pub fn matrix(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(self.rotation * self.scale));
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }

    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * point.coords * self.scale + self.translation)
    }
}

impl Default for SimilarityPose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Translation part of a homogeneous transform.
pub fn translation_of(transform: &Matrix4<f64>) -> Point3<f64> {
    Point3::new(transform[(0, 3)], transform[(1, 3)], transform[(2, 3)])
}
