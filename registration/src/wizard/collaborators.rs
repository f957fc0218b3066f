//! Boundary traits for the wizard's external collaborators and in-memory
//! implementations of them.

use std::cell::RefCell;
use std::rc::Weak;

use fiducial_core::{translation_of, Error, PointSet, Result};
use nalgebra::{Matrix4, Point3};

use crate::registration::{OutputRepresentation, ThinPlateSpline, Transform};

/// Notified after the contents of an observed [`PointSource`] changed.
pub trait PointSourceObserver {
    fn on_points_modified(&mut self);
}

pub type WeakPointSourceObserver = Weak<RefCell<dyn PointSourceObserver>>;

/// Ordered source of fiducial positions.
pub trait PointSource {
    fn count(&self) -> usize;

    /// Position of the `index`-th fiducial; `index < count()`.
    fn point_at(&self, index: usize) -> Point3<f64>;

    fn points(&self) -> Vec<Point3<f64>> {
        (0..self.count()).map(|i| self.point_at(i)).collect()
    }

    /// Append a fiducial. Read-only sources refuse.
    fn add_point(&self, _point: Point3<f64>) -> Result<()> {
        Err(Error::invalid_input("Point source is read-only"))
    }

    /// Sources whose contents never change may ignore observers.
    fn add_observer(&self, _observer: WeakPointSourceObserver) {}

    fn remove_observer(&self, _observer: &WeakPointSourceObserver) {}
}

/// Receiver of a computed registration transform.
pub trait TransformSink {
    fn accept_linear(&mut self, matrix: Matrix4<f64>);

    /// Whether [`TransformSink::accept_non_linear`] may be called.
    fn supports_non_linear(&self) -> bool {
        false
    }

    fn accept_non_linear(&mut self, _transform: ThinPlateSpline) -> Result<()> {
        Err(Error::IncompatibleOutputRepresentation(
            "sink only stores linear transforms".to_string(),
        ))
    }

    fn representation(&self) -> OutputRepresentation {
        if self.supports_non_linear() {
            OutputRepresentation::Any
        } else {
            OutputRepresentation::LinearOnly
        }
    }
}

fn same_observer(a: &WeakPointSourceObserver, b: &WeakPointSourceObserver) -> bool {
    Weak::as_ptr(a) as *const () == Weak::as_ptr(b) as *const ()
}

/// Named, editable list of fiducials.
///
/// Edits take `&self` so a list stays readable by the registration that its
/// own change notification triggers.
#[derive(Debug, Default)]
pub struct FiducialList {
    name: String,
    points: RefCell<PointSet>,
    observers: RefCell<Vec<WeakPointSourceObserver>>,
}

impl FiducialList {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_points(name, Vec::new())
    }

    pub fn with_points(name: impl Into<String>, points: Vec<Point3<f64>>) -> Self {
        Self {
            name: name.into(),
            points: RefCell::new(PointSet::new(points)),
            observers: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn point_set(&self) -> PointSet {
        self.points.borrow().clone()
    }

    pub fn add_fiducial(&self, point: Point3<f64>) {
        self.points.borrow_mut().push(point);
        self.notify_modified();
    }

    /// Move the `index`-th fiducial.
    pub fn set_fiducial(&self, index: usize, point: Point3<f64>) -> Result<()> {
        {
            let mut points = self.points.borrow_mut();
            let count = points.len();
            let slot = points.points.get_mut(index).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Fiducial index {index} out of range for list '{}' with {count} points",
                    self.name
                ))
            })?;
            *slot = point;
        }
        self.notify_modified();
        Ok(())
    }

    /// Replace all fiducials with a single notification.
    pub fn set_points(&self, points: Vec<Point3<f64>>) {
        *self.points.borrow_mut() = PointSet::new(points);
        self.notify_modified();
    }

    pub fn len(&self) -> usize {
        self.points.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.borrow().is_empty()
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .borrow()
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    fn notify_modified(&self) {
        let observers: Vec<_> = {
            let mut observers = self.observers.borrow_mut();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            match observer.try_borrow_mut() {
                Ok(mut observer) => observer.on_points_modified(),
                Err(_) => tracing::trace!("Observer of list '{}' is busy", self.name),
            }
        }
    }
}

impl PointSource for FiducialList {
    fn count(&self) -> usize {
        self.len()
    }

    fn point_at(&self, index: usize) -> Point3<f64> {
        self.points.borrow().points[index]
    }

    fn points(&self) -> Vec<Point3<f64>> {
        self.points.borrow().points.clone()
    }

    fn add_point(&self, point: Point3<f64>) -> Result<()> {
        self.add_fiducial(point);
        Ok(())
    }

    fn add_observer(&self, observer: WeakPointSourceObserver) {
        let mut observers = self.observers.borrow_mut();
        if !observers.iter().any(|o| same_observer(o, &observer)) {
            observers.push(observer);
        }
    }

    fn remove_observer(&self, observer: &WeakPointSourceObserver) {
        self.observers
            .borrow_mut()
            .retain(|o| !same_observer(o, observer));
    }
}

/// Transform holder that only stores a 4×4 matrix.
///
/// Also serves as a tracked probe: its matrix is the probe's pose in world
/// coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTransformNode {
    pub name: String,
    matrix: Matrix4<f64>,
}

impl LinearTransformNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_matrix(name, Matrix4::identity())
    }

    pub fn with_matrix(name: impl Into<String>, matrix: Matrix4<f64>) -> Self {
        Self {
            name: name.into(),
            matrix,
        }
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn set_matrix(&mut self, matrix: Matrix4<f64>) {
        self.matrix = matrix;
    }

    /// Position of the node's origin in world coordinates.
    pub fn origin_in_world(&self) -> Point3<f64> {
        translation_of(&self.matrix)
    }
}

impl TransformSink for LinearTransformNode {
    fn accept_linear(&mut self, matrix: Matrix4<f64>) {
        self.matrix = matrix;
    }
}

/// Transform holder for linear and non-linear transforms.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformNode {
    pub name: String,
    transform: Option<Transform>,
}

impl TransformNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: None,
        }
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }
}

impl TransformSink for TransformNode {
    fn accept_linear(&mut self, matrix: Matrix4<f64>) {
        self.transform = Some(Transform::Linear(matrix));
    }

    fn supports_non_linear(&self) -> bool {
        true
    }

    fn accept_non_linear(&mut self, transform: ThinPlateSpline) -> Result<()> {
        self.transform = Some(Transform::ThinPlateSpline(transform));
        Ok(())
    }
}
