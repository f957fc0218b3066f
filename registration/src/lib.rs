//! Fiducial registration algorithms
//!
//! This crate provides closed-form landmark registration and the wizard
//! logic that drives it:
//! - Rigid (Kabsch) and similarity (Umeyama) fits
//! - Thin-plate spline warping
//! - PCA collinearity check
//! - RMS registration error
//! - Registration wizard with automatic recomputation on input changes

pub mod registration;
pub mod wizard;

pub use registration::{
    compute_rms_error, is_collinear, solve, solve_named, solve_with_diagnostics,
    CollinearityChecker, OutputRepresentation, RegistrationOptions, SolvedTransform,
    ThinPlateSpline, Transform, TransformFamily, UpdateMode,
};
pub use registration::landmark::{fit_landmark_transform, LandmarkFit, LandmarkMode};

pub use wizard::{
    CalibrationOutcome, CalibrationState, FiducialList, FiducialRegistrationWizardLogic,
    LinearTransformNode, ListSide, NodeEvent, NodeObserver, PointSource, PointSourceObserver,
    RegistrationWizardNode, TransformNode, TransformSink,
};

pub use fiducial_core::{Error, Result};
