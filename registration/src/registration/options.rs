//! Registration configuration.

use fiducial_core::{read_env_var, Error, Result};
use serde::{Deserialize, Serialize};

use super::collinear::DEFAULT_EIGENVALUE_THRESHOLD;

/// Tunables for input validation.
///
/// Loaded from JSON (all fields optional) or from the environment:
/// - `FIDUCIAL_CHECK_COLLINEARITY` (`true`/`false`)
/// - `FIDUCIAL_EIGENVALUE_THRESHOLD` (positive float)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationOptions {
    /// Reject point sets whose spread has rank ≤ 1.
    pub check_collinearity: bool,
    /// Eigenvalues of the coordinate covariance at or below this value are
    /// treated as zero.
    pub eigenvalue_threshold: f64,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            check_collinearity: true,
            eigenvalue_threshold: DEFAULT_EIGENVALUE_THRESHOLD,
        }
    }
}

impl RegistrationOptions {
    pub fn with_collinearity_check(mut self, enabled: bool) -> Self {
        self.check_collinearity = enabled;
        self
    }

    pub fn with_eigenvalue_threshold(mut self, threshold: f64) -> Self {
        self.eigenvalue_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.eigenvalue_threshold.is_finite() || self.eigenvalue_threshold < 0.0 {
            return Err(Error::InvalidParameters(format!(
                "eigenvalue_threshold must be a finite, non-negative number, got {}",
                self.eigenvalue_threshold
            )));
        }
        Ok(())
    }

    /// Defaults overridden by any `FIDUCIAL_*` environment variables that are set.
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();
        if let Some(enabled) = read_env_var::<bool>("FIDUCIAL_CHECK_COLLINEARITY")? {
            options.check_collinearity = enabled;
        }
        if let Some(threshold) = read_env_var::<f64>("FIDUCIAL_EIGENVALUE_THRESHOLD")? {
            options.eigenvalue_threshold = threshold;
        }
        options.validate()?;
        tracing::debug!("Registration options from environment: {:?}", options);
        Ok(options)
    }
}

/// When the wizard recomputes the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Recompute whenever the input data changes.
    Automatic,
    /// Recompute only on explicit request.
    Manual,
}

impl UpdateMode {
    /// Only the exact text `Automatic` enables automatic updates; anything
    /// else is treated as manual.
    pub fn parse_lenient(s: &str) -> Self {
        if s == "Automatic" {
            UpdateMode::Automatic
        } else {
            UpdateMode::Manual
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMode::Automatic => "Automatic",
            UpdateMode::Manual => "Manual",
        }
    }
}
