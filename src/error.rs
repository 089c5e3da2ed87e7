//! Error taxonomy shared by the network store, the solver and the scheduler.

use thiserror::Error;

/// Numeric failures raised by the Newton-Raphson solver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PowerFlowError {
    #[error("power flow did not converge after {iterations} iterations (max mismatch {max_mismatch:.3e})")]
    NonConvergence { iterations: usize, max_mismatch: f64 },

    #[error("singular Jacobian at iteration {iteration} (max mismatch {max_mismatch:.3e})")]
    SingularJacobian { iteration: usize, max_mismatch: f64 },
}

/// Structural problems found while assembling the admittance matrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("bus {0} has no in-service branch or transformer")]
    IsolatedBus(String),

    #[error("island containing buses [{}] has no slack bus", .0.join(", "))]
    NoSlack(Vec<String>),

    #[error("island containing buses [{}] has more than one slack bus", .0.join(", "))]
    MultipleSlack(Vec<String>),

    #[error("network has no buses")]
    Empty,
}

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or physically implausible parameters.
    #[error("validation error in {entity}: {reason}")]
    Validation { entity: String, reason: String },

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("numeric error: {0}")]
    Numeric(#[from] PowerFlowError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("component {0} has not been evaluated yet")]
    NotEvaluated(String),

    #[error("component {id} failed to update: {source}")]
    Component {
        id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn validation(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
