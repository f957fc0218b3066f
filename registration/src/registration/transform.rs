//! Transform families and the computed transform representation.

use std::fmt;
use std::str::FromStr;

use fiducial_core::{Error, Result};
use nalgebra::{Matrix4, Point3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::thin_plate::ThinPlateSpline;

/// Point count above which point-set transforms run on the rayon pool.
const PARALLEL_MIN_POINTS: usize = 1024;

/// Transform family selected for a registration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformFamily {
    /// Rotation and translation only.
    Rigid,
    /// Rotation, uniform scale and translation.
    Similarity,
    /// Thin-plate spline warp, exact at the control points.
    Warping,
}

impl TransformFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformFamily::Rigid => "Rigid",
            TransformFamily::Similarity => "Similarity",
            TransformFamily::Warping => "Warping",
        }
    }

    /// Whether the family produces a 4×4 homogeneous matrix.
    pub fn is_linear(&self) -> bool {
        !matches!(self, TransformFamily::Warping)
    }
}

impl FromStr for TransformFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Rigid" => Ok(TransformFamily::Rigid),
            "Similarity" => Ok(TransformFamily::Similarity),
            "Warping" => Ok(TransformFamily::Warping),
            other => Err(Error::InvalidFamily(format!(
                "'{other}' (expected Rigid, Similarity or Warping)"
            ))),
        }
    }
}

impl fmt::Display for TransformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of transform the receiver of a solve can store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRepresentation {
    /// Only a 4×4 homogeneous matrix.
    LinearOnly,
    /// Linear or non-linear transforms.
    Any,
}

impl OutputRepresentation {
    pub fn accepts(&self, family: TransformFamily) -> bool {
        match self {
            OutputRepresentation::LinearOnly => family.is_linear(),
            OutputRepresentation::Any => true,
        }
    }
}

/// Computed registration transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Homogeneous 4×4 matrix (rigid or similarity).
    Linear(Matrix4<f64>),
    /// Control-point parameterized warp.
    ThinPlateSpline(ThinPlateSpline),
}

impl Transform {
    pub fn identity() -> Self {
        Transform::Linear(Matrix4::identity())
    }

    pub fn is_linear(&self) -> bool {
        matches!(self, Transform::Linear(_))
    }

    pub fn as_matrix(&self) -> Option<&Matrix4<f64>> {
        match self {
            Transform::Linear(m) => Some(m),
            Transform::ThinPlateSpline(_) => None,
        }
    }

    pub fn as_thin_plate_spline(&self) -> Option<&ThinPlateSpline> {
        match self {
            Transform::Linear(_) => None,
            Transform::ThinPlateSpline(tps) => Some(tps),
        }
    }

    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        match self {
            Transform::Linear(m) => m.transform_point(point),
            Transform::ThinPlateSpline(tps) => tps.transform_point(point),
        }
    }

    pub fn transform_points(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        if points.len() >= PARALLEL_MIN_POINTS {
            points.par_iter().map(|p| self.transform_point(p)).collect()
        } else {
            points.iter().map(|p| self.transform_point(p)).collect()
        }
    }
}

impl From<Matrix4<f64>> for Transform {
    fn from(matrix: Matrix4<f64>) -> Self {
        Transform::Linear(matrix)
    }
}

impl From<ThinPlateSpline> for Transform {
    fn from(tps: ThinPlateSpline) -> Self {
        Transform::ThinPlateSpline(tps)
    }
}
