//! Parameter node of the registration wizard.
//!
//! The node holds the wizard's inputs (fiducial lists, output transform,
//! probes, registration and update mode) and its single output, the status
//! message. Observers are notified with [`NodeEvent::Modified`] on every
//! change and additionally with [`NodeEvent::InputDataModified`] when an
//! input changes. A node created with [`RegistrationWizardNode::new_shared`]
//! also observes its bound fiducial lists, so editing a list counts as an
//! input change.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use fiducial_core::Result;

use super::collaborators::{
    LinearTransformNode, PointSource, PointSourceObserver, TransformSink, WeakPointSourceObserver,
};
use crate::registration::{TransformFamily, UpdateMode};

pub type SharedPointSource = Rc<RefCell<dyn PointSource>>;
pub type SharedTransformSink = Rc<RefCell<dyn TransformSink>>;
pub type SharedProbe = Rc<RefCell<LinearTransformNode>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeEvent {
    /// Any input or output changed.
    Modified,
    /// An input changed; the registration result is stale.
    InputDataModified,
}

/// Which of the two fiducial lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSide {
    From,
    To,
}

impl ListSide {
    pub fn other(&self) -> ListSide {
        match self {
            ListSide::From => ListSide::To,
            ListSide::To => ListSide::From,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ListSide::From => "From",
            ListSide::To => "To",
        }
    }
}

pub trait NodeObserver {
    fn on_node_event(&mut self, node: &mut RegistrationWizardNode, event: NodeEvent);
}

pub struct RegistrationWizardNode {
    id: String,
    from_list: Option<SharedPointSource>,
    to_list: Option<SharedPointSource>,
    output_transform: Option<SharedTransformSink>,
    probe_transform_from: Option<SharedProbe>,
    probe_transform_to: Option<SharedProbe>,
    registration_mode: String,
    update_mode: String,
    calibration_status_message: String,
    observers: Vec<Weak<RefCell<dyn NodeObserver>>>,
    self_ref: Weak<RefCell<RegistrationWizardNode>>,
    pending_events: VecDeque<NodeEvent>,
    dispatching: bool,
}

impl std::fmt::Debug for RegistrationWizardNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationWizardNode")
            .field("id", &self.id)
            .field("has_from_list", &self.from_list.is_some())
            .field("has_to_list", &self.to_list.is_some())
            .field("has_output_transform", &self.output_transform.is_some())
            .field("registration_mode", &self.registration_mode)
            .field("update_mode", &self.update_mode)
            .field("calibration_status_message", &self.calibration_status_message)
            .finish()
    }
}

fn same_binding<T: ?Sized>(a: &Option<Rc<T>>, b: &Option<Rc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const (),
        (None, None) => true,
        _ => false,
    }
}

fn same_observer(
    a: &Weak<RefCell<dyn NodeObserver>>,
    b: &Weak<RefCell<dyn NodeObserver>>,
) -> bool {
    Weak::as_ptr(a) as *const () == Weak::as_ptr(b) as *const ()
}

impl RegistrationWizardNode {
    /// New node in `Rigid` registration mode with `Automatic` updates.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from_list: None,
            to_list: None,
            output_transform: None,
            probe_transform_from: None,
            probe_transform_to: None,
            registration_mode: TransformFamily::Rigid.as_str().to_string(),
            update_mode: UpdateMode::Automatic.as_str().to_string(),
            calibration_status_message: String::new(),
            observers: Vec::new(),
            self_ref: Weak::new(),
            pending_events: VecDeque::new(),
            dispatching: false,
        }
    }

    /// Shared node that observes the contents of the lists bound to it.
    pub fn new_shared(id: impl Into<String>) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|self_ref| {
            let mut node = Self::new(id);
            node.self_ref = self_ref.clone();
            RefCell::new(node)
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn from_list(&self) -> Option<SharedPointSource> {
        self.from_list.clone()
    }

    pub fn to_list(&self) -> Option<SharedPointSource> {
        self.to_list.clone()
    }

    pub fn list(&self, side: ListSide) -> Option<SharedPointSource> {
        match side {
            ListSide::From => self.from_list(),
            ListSide::To => self.to_list(),
        }
    }

    pub fn output_transform(&self) -> Option<SharedTransformSink> {
        self.output_transform.clone()
    }

    pub fn probe_transform(&self, side: ListSide) -> Option<SharedProbe> {
        match side {
            ListSide::From => self.probe_transform_from.clone(),
            ListSide::To => self.probe_transform_to.clone(),
        }
    }

    pub fn registration_mode(&self) -> &str {
        &self.registration_mode
    }

    /// Registration mode parsed as a transform family.
    pub fn transform_family(&self) -> Result<TransformFamily> {
        self.registration_mode.parse()
    }

    pub fn update_mode(&self) -> UpdateMode {
        UpdateMode::parse_lenient(&self.update_mode)
    }

    pub fn is_automatic(&self) -> bool {
        self.update_mode() == UpdateMode::Automatic
    }

    pub fn calibration_status_message(&self) -> &str {
        &self.calibration_status_message
    }

    pub fn set_from_list(&mut self, list: Option<SharedPointSource>) {
        self.set_list(ListSide::From, list);
    }

    pub fn set_to_list(&mut self, list: Option<SharedPointSource>) {
        self.set_list(ListSide::To, list);
    }

    pub fn set_list(&mut self, side: ListSide, list: Option<SharedPointSource>) {
        let slot = match side {
            ListSide::From => &mut self.from_list,
            ListSide::To => &mut self.to_list,
        };
        if same_binding(slot, &list) {
            return;
        }
        let previous = std::mem::replace(slot, list.clone());
        if let Some(observer) = self.list_observer() {
            if let Some(previous) = previous {
                // A list bound on both sides stays observed.
                if !same_binding(&Some(previous.clone()), &self.list(side.other())) {
                    match previous.try_borrow() {
                        Ok(previous) => previous.remove_observer(&observer),
                        Err(_) => tracing::warn!(
                            "Node {} could not stop observing its previous '{}' list",
                            self.id,
                            side.label()
                        ),
                    }
                }
            }
            if let Some(list) = &list {
                match list.try_borrow() {
                    Ok(list) => list.add_observer(observer),
                    Err(_) => tracing::warn!(
                        "Node {} could not observe its '{}' list",
                        self.id,
                        side.label()
                    ),
                }
            }
        }
        self.input_data_modified();
    }

    pub fn set_output_transform(&mut self, sink: Option<SharedTransformSink>) {
        if !same_binding(&self.output_transform, &sink) {
            self.output_transform = sink;
            self.input_data_modified();
        }
    }

    /// Probes only feed fiducial collection, so changing them does not
    /// invalidate the registration.
    pub fn set_probe_transform(&mut self, side: ListSide, probe: Option<SharedProbe>) {
        let slot = match side {
            ListSide::From => &mut self.probe_transform_from,
            ListSide::To => &mut self.probe_transform_to,
        };
        if !same_binding(slot, &probe) {
            *slot = probe;
            self.invoke_event(NodeEvent::Modified);
        }
    }

    pub fn set_registration_mode(&mut self, mode: impl Into<String>) {
        let mode = mode.into();
        if self.registration_mode != mode {
            self.registration_mode = mode;
            self.input_data_modified();
        }
    }

    pub fn set_registration_mode_to_rigid(&mut self) {
        self.set_registration_mode(TransformFamily::Rigid.as_str());
    }

    pub fn set_registration_mode_to_similarity(&mut self) {
        self.set_registration_mode(TransformFamily::Similarity.as_str());
    }

    pub fn set_registration_mode_to_warping(&mut self) {
        self.set_registration_mode(TransformFamily::Warping.as_str());
    }

    pub fn set_update_mode(&mut self, mode: impl Into<String>) {
        let mode = mode.into();
        if self.update_mode != mode {
            self.update_mode = mode;
            self.input_data_modified();
        }
    }

    /// Output of the wizard; only fires [`NodeEvent::Modified`].
    pub fn set_calibration_status_message(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.calibration_status_message != message {
            self.calibration_status_message = message;
            self.invoke_event(NodeEvent::Modified);
        }
    }

    /// Signal that the contents of a bound fiducial list changed.
    pub fn notify_input_points_modified(&mut self) {
        self.input_data_modified();
    }

    pub fn add_observer(&mut self, observer: Weak<RefCell<dyn NodeObserver>>) {
        if !self.observers.iter().any(|o| same_observer(o, &observer)) {
            self.observers.push(observer);
        }
    }

    pub fn remove_observer(&mut self, observer: &Weak<RefCell<dyn NodeObserver>>) {
        self.observers.retain(|o| !same_observer(o, observer));
    }

    pub fn observer_count(&self) -> usize {
        self.observers.iter().filter(|o| o.strong_count() > 0).count()
    }

    fn list_observer(&self) -> Option<WeakPointSourceObserver> {
        if self.self_ref.strong_count() == 0 {
            return None;
        }
        let observer: WeakPointSourceObserver = self.self_ref.clone();
        Some(observer)
    }

    fn input_data_modified(&mut self) {
        self.invoke_event(NodeEvent::InputDataModified);
        self.invoke_event(NodeEvent::Modified);
    }

    /// Deliver `event` to all live observers.
    ///
    /// Events raised by an observer while a dispatch is running are queued
    /// and delivered once the current event has reached every observer.
    fn invoke_event(&mut self, event: NodeEvent) {
        self.pending_events.push_back(event);
        if self.dispatching {
            return;
        }
        self.dispatching = true;
        while let Some(event) = self.pending_events.pop_front() {
            self.observers.retain(|o| o.strong_count() > 0);
            let observers: Vec<_> = self.observers.iter().filter_map(Weak::upgrade).collect();
            for observer in observers {
                match observer.try_borrow_mut() {
                    Ok(mut observer) => observer.on_node_event(self, event),
                    Err(_) => tracing::trace!(
                        "Observer of node {} is busy, skipping {:?}",
                        self.id,
                        event
                    ),
                }
            }
        }
        self.dispatching = false;
    }
}

impl PointSourceObserver for RegistrationWizardNode {
    fn on_points_modified(&mut self) {
        self.notify_input_points_modified();
    }
}
