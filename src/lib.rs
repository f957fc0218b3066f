pub use fiducial_core as core;
pub use fiducial_registration as registration;

pub use fiducial_registration::{
    compute_rms_error, is_collinear, solve, CalibrationOutcome, FiducialList,
    FiducialRegistrationWizardLogic, LinearTransformNode, OutputRepresentation,
    RegistrationOptions, RegistrationWizardNode, Transform, TransformFamily, TransformNode,
};
pub use fiducial_core::{Error, PointSet, Result};

/// Initialize a single global Rayon thread pool for all CPU-parallel routines.
///
/// Call this once at application startup before registering large point
/// sets. Repeated calls are idempotent and return the first initialization
/// result.
///
/// Priority order:
/// 1. explicit `num_threads`
/// 2. `FIDUCIAL_CPU_THREADS` env var
/// 3. Rayon default
pub fn init_thread_pool(num_threads: Option<usize>) -> std::result::Result<(), String> {
    fiducial_core::init_global_thread_pool(num_threads)
}
