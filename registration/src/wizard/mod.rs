//! Fiducial registration wizard logic.
//!
//! Validates the inputs bound to a [`RegistrationWizardNode`], runs the
//! collinearity check, the transform solver and the error evaluator, writes
//! the transform to the node's output and reports a status message. Nodes in
//! `Automatic` update mode are recomputed whenever their input data changes.

pub mod collaborators;
pub mod node;

pub use collaborators::{
    FiducialList, LinearTransformNode, PointSource, PointSourceObserver, TransformNode,
    TransformSink, WeakPointSourceObserver,
};
pub use node::{
    ListSide, NodeEvent, NodeObserver, RegistrationWizardNode, SharedPointSource, SharedProbe,
    SharedTransformSink,
};

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use fiducial_core::{Error, Result};
use nalgebra::Point3;

use crate::registration::{
    compute_rms_error, solve_with_diagnostics, CollinearityChecker, RegistrationOptions,
    Transform, MIN_CORRESPONDENCES,
};

pub const MSG_FROM_UNDEFINED: &str = "'From' fiducial list is not defined.";
pub const MSG_TO_UNDEFINED: &str = "'To' fiducial list is not defined.";
pub const MSG_OUTPUT_UNDEFINED: &str = "Output transform is not defined.";
pub const MSG_FROM_TOO_FEW: &str =
    "'From' fiducial list has too few fiducials (minimum 3 required).";
pub const MSG_TO_TOO_FEW: &str = "'To' fiducial list has too few fiducials (minimum 3 required).";
pub const MSG_FROM_COLLINEAR: &str = "'From' fiducial list has strictly collinear points.";
pub const MSG_TO_COLLINEAR: &str = "'To' fiducial list has strictly collinear points.";
pub const MSG_WARPING_INTO_LINEAR: &str =
    "Warping transform cannot be stored\nin linear transform node";
pub const MSG_INVALID_TRANSFORM_TYPE: &str = "Invalid transform type.";
pub const MSG_DEGENERATE_WARNING: &str =
    "Warning: fiducial configuration is nearly degenerate, the result may be unreliable.";

/// Progress of the most recent calibration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Idle,
    Validating,
    Computing,
    Done { success: bool },
}

/// Result of one calibration attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    /// Present only on success.
    pub transform: Option<Transform>,
    /// Present only on success.
    pub rms_error: Option<f64>,
    pub status_message: String,
    /// The fit succeeded but the configuration was numerically degenerate.
    pub degenerate: bool,
}

impl CalibrationOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            transform: None,
            rms_error: None,
            status_message: message.into(),
            degenerate: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.transform.is_some()
    }
}

/// Orchestrates validation, solving and error evaluation for wizard nodes.
#[derive(Debug)]
pub struct FiducialRegistrationWizardLogic {
    options: RegistrationOptions,
    state: CalibrationState,
    observed_nodes: Vec<(String, Weak<RefCell<RegistrationWizardNode>>)>,
}

impl Default for FiducialRegistrationWizardLogic {
    fn default() -> Self {
        Self::new(RegistrationOptions::default())
    }
}

impl FiducialRegistrationWizardLogic {
    pub fn new(options: RegistrationOptions) -> Self {
        Self {
            options,
            state: CalibrationState::Idle,
            observed_nodes: Vec::new(),
        }
    }

    pub fn options(&self) -> &RegistrationOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: RegistrationOptions) -> Result<()> {
        options.validate()?;
        self.options = options;
        Ok(())
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Recompute the registration of `node` and store the status message on it.
    ///
    /// The output transform is written only when every step succeeds; on any
    /// failure the previous output is left untouched.
    pub fn update_calibration(&mut self, node: &mut RegistrationWizardNode) -> CalibrationOutcome {
        self.state = CalibrationState::Validating;
        let outcome = self.compute(node);
        self.state = CalibrationState::Done {
            success: outcome.is_success(),
        };
        if !outcome.is_success() {
            tracing::debug!(
                "Calibration of node {} not updated: {}",
                node.id(),
                outcome.status_message
            );
        }
        node.set_calibration_status_message(outcome.status_message.clone());
        outcome
    }

    fn compute(&mut self, node: &RegistrationWizardNode) -> CalibrationOutcome {
        let Some(from_list) = node.from_list() else {
            return CalibrationOutcome::failure(MSG_FROM_UNDEFINED);
        };
        let Some(to_list) = node.to_list() else {
            return CalibrationOutcome::failure(MSG_TO_UNDEFINED);
        };
        let Some(output) = node.output_transform() else {
            return CalibrationOutcome::failure(MSG_OUTPUT_UNDEFINED);
        };

        let from_points = match read_points(&from_list, ListSide::From) {
            Ok(points) => points,
            Err(outcome) => return outcome,
        };
        let to_points = match read_points(&to_list, ListSide::To) {
            Ok(points) => points,
            Err(outcome) => return outcome,
        };

        let from_count = from_points.len();
        let to_count = to_points.len();
        if from_count < MIN_CORRESPONDENCES {
            return CalibrationOutcome::failure(MSG_FROM_TOO_FEW);
        }
        if to_count < MIN_CORRESPONDENCES {
            return CalibrationOutcome::failure(MSG_TO_TOO_FEW);
        }
        if from_count != to_count {
            return CalibrationOutcome::failure(format!(
                "Fiducial lists have unequal number of fiducials \
                 ('From' has {from_count}, 'To' has {to_count})."
            ));
        }

        let checker = CollinearityChecker::from_options(&self.options);
        if checker.is_collinear(&from_points) {
            return CalibrationOutcome::failure(MSG_FROM_COLLINEAR);
        }
        if checker.is_collinear(&to_points) {
            return CalibrationOutcome::failure(MSG_TO_COLLINEAR);
        }

        let family = match node.transform_family() {
            Ok(family) => family,
            Err(e) => {
                tracing::error!("Failed to set transform type for node {}: {}", node.id(), e);
                return CalibrationOutcome::failure(MSG_INVALID_TRANSFORM_TYPE);
            }
        };

        self.state = CalibrationState::Computing;
        let representation = output.borrow().representation();
        let solved = match solve_with_diagnostics(&from_points, &to_points, family, representation)
        {
            Ok(solved) => solved,
            Err(Error::IncompatibleOutputRepresentation(reason)) => {
                tracing::error!("Cannot store result of node {}: {}", node.id(), reason);
                return CalibrationOutcome::failure(MSG_WARPING_INTO_LINEAR);
            }
            Err(e) => {
                tracing::warn!("Registration of node {} failed: {}", node.id(), e);
                return CalibrationOutcome::failure(format!("Registration failed: {e}"));
            }
        };

        let rms_error = match compute_rms_error(&from_points, &to_points, &solved.transform) {
            Ok(rms) => rms,
            Err(e) => return CalibrationOutcome::failure(format!("Registration failed: {e}")),
        };

        if let Err(e) = write_output(&output, &solved.transform) {
            tracing::error!("Cannot store result of node {}: {}", node.id(), e);
            return CalibrationOutcome::failure(MSG_WARPING_INTO_LINEAR);
        }

        let mut status_message = format!("Success! RMS Error: {}", format_general(rms_error));
        if solved.degenerate {
            status_message.push('\n');
            status_message.push_str(MSG_DEGENERATE_WARNING);
        }
        tracing::debug!("Node {} registered ({}), RMS error {}", node.id(), family, rms_error);

        CalibrationOutcome {
            transform: Some(solved.transform),
            rms_error: Some(rms_error),
            status_message,
            degenerate: solved.degenerate,
        }
    }

    /// Start reacting to input changes of `node`.
    ///
    /// A node in `Automatic` update mode is calibrated right away.
    pub fn observe_node(logic: &Rc<RefCell<Self>>, node: &Rc<RefCell<RegistrationWizardNode>>) {
        let observer: Rc<RefCell<dyn NodeObserver>> = logic.clone();
        let weak_observer = Rc::downgrade(&observer);

        let mut node_ref = node.borrow_mut();
        node_ref.add_observer(weak_observer);

        let mut this = logic.borrow_mut();
        let id = node_ref.id().to_string();
        this.observed_nodes.retain(|(known, n)| known != &id && n.strong_count() > 0);
        this.observed_nodes.push((id, Rc::downgrade(node)));

        if node_ref.is_automatic() {
            this.update_calibration(&mut node_ref);
        }
    }

    pub fn unobserve_node(logic: &Rc<RefCell<Self>>, node: &Rc<RefCell<RegistrationWizardNode>>) {
        let observer: Rc<RefCell<dyn NodeObserver>> = logic.clone();
        let mut node_ref = node.borrow_mut();
        node_ref.remove_observer(&Rc::downgrade(&observer));
        let id = node_ref.id().to_string();
        logic.borrow_mut().observed_nodes.retain(|(known, _)| known != &id);
    }

    /// Status message of an observed node, or an empty string for an unknown id.
    pub fn output_message(&self, node_id: &str) -> String {
        let node = self
            .observed_nodes
            .iter()
            .find(|(id, _)| id == node_id)
            .and_then(|(_, node)| node.upgrade());
        match node {
            Some(node) => match node.try_borrow() {
                Ok(node) => node.calibration_status_message().to_string(),
                Err(_) => {
                    tracing::warn!("output_message: node {} is being modified", node_id);
                    String::new()
                }
            },
            None => {
                tracing::warn!(
                    "output_message failed: wizard node with the specified ID ({}) not found",
                    node_id
                );
                String::new()
            }
        }
    }

    /// Append the probe's world position to `list`.
    ///
    /// Nodes observing `list` are notified of the change.
    pub fn add_fiducial(probe: &LinearTransformNode, list: &dyn PointSource) -> Result<()> {
        list.add_point(probe.origin_in_world())
    }

    /// Record the current probe position of `side` into the matching list
    /// and mark the node's input as modified.
    pub fn add_fiducial_from_probe(
        node: &mut RegistrationWizardNode,
        side: ListSide,
    ) -> Result<()> {
        let probe = node.probe_transform(side).ok_or_else(|| {
            Error::InvalidInput(format!("'{}' probe transform is not defined", side.label()))
        })?;
        let list = node.list(side).ok_or_else(|| {
            Error::InvalidInput(format!("'{}' fiducial list is not defined", side.label()))
        })?;
        Self::add_fiducial(&probe.borrow(), &*list.borrow())?;
        // The list cannot reach a node that is borrowed by the caller.
        node.notify_input_points_modified();
        Ok(())
    }
}

impl NodeObserver for FiducialRegistrationWizardLogic {
    fn on_node_event(&mut self, node: &mut RegistrationWizardNode, event: NodeEvent) {
        // Status updates fire Modified only, so this never recurses.
        if event == NodeEvent::InputDataModified && node.is_automatic() {
            self.update_calibration(node);
        }
    }
}

fn read_points(
    list: &SharedPointSource,
    side: ListSide,
) -> std::result::Result<Vec<Point3<f64>>, CalibrationOutcome> {
    match list.try_borrow() {
        Ok(list) => Ok(list.points()),
        Err(_) => {
            tracing::warn!("'{}' fiducial list is locked for writing", side.label());
            Err(CalibrationOutcome::failure(format!(
                "'{}' fiducial list is being modified.",
                side.label()
            )))
        }
    }
}

fn write_output(output: &SharedTransformSink, transform: &Transform) -> Result<()> {
    let mut sink = output.borrow_mut();
    match transform {
        Transform::Linear(matrix) => {
            sink.accept_linear(*matrix);
            Ok(())
        }
        Transform::ThinPlateSpline(tps) => {
            if !sink.supports_non_linear() {
                return Err(Error::IncompatibleOutputRepresentation(
                    "sink only stores linear transforms".to_string(),
                ));
            }
            sink.accept_non_linear(tps.clone())
        }
    }
}

/// Format like C's `%g`: six significant digits, trailing zeros removed,
/// scientific notation for very small or large magnitudes.
pub fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let scientific = format!("{:.5e}", value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };
    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (5 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
