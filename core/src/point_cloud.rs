use nalgebra::{Point3, Vector3};

/// Ordered set of fiducial positions.
///
/// The order of the points defines the correspondence with a peer set: the
/// `i`-th point of a "from" set is registered onto the `i`-th point of the
/// matching "to" set.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointSet {
    pub points: Vec<Point3<f64>>,
    pub labels: Option<Vec<String>>,
}

impl PointSet {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self {
            points,
            labels: None,
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> crate::Result<Self> {
        if labels.len() == self.points.len() {
            self.labels = Some(labels);
            Ok(self)
        } else {
            Err(crate::Error::InvalidInput(format!(
                "Label count {} does not match point count {}",
                labels.len(),
                self.points.len()
            )))
        }
    }

    pub fn push(&mut self, point: Point3<f64>) {
        self.points.push(point);
        if let Some(labels) = self.labels.as_mut() {
            labels.push(format!("F-{}", labels.len() + 1));
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3<f64>> {
        self.points.iter()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels
            .as_ref()
            .and_then(|labels| labels.get(index))
            .map(String::as_str)
    }

    /// Mean position, `None` for an empty set.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        centroid(&self.points)
    }
}

impl From<Vec<Point3<f64>>> for PointSet {
    fn from(points: Vec<Point3<f64>>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<Point3<f64>> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point3<f64>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl AsRef<[Point3<f64>]> for PointSet {
    fn as_ref(&self) -> &[Point3<f64>] {
        &self.points
    }
}

/// Mean of a slice of points, `None` when the slice is empty.
pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}
