pub mod geometry;
pub mod point_cloud;
pub mod runtime;

pub use geometry::*;
pub use point_cloud::*;
pub use runtime::{current_cpu_threads, init_global_thread_pool, read_env_var};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid transform family: {0}")]
    InvalidFamily(String),

    #[error("Incompatible output representation: {0}")]
    IncompatibleOutputRepresentation(String),

    #[error("Division by zero: {0}")]
    DivideByZero(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn numerical(msg: impl Into<String>) -> Self {
        Self::Numerical(msg.into())
    }
}
