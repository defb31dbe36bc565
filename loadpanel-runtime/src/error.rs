use std::fmt;

/// Errors returned by load-panel operations.
#[derive(Debug)]
pub enum PanelError {
    /// Malformed or missing input (empty target list, zero volume).
    Validation(String),
    /// An operation required the sandbox but none is provisioned.
    Environment(String),
    /// Sandbox creation or prerequisite installation failed; carries the
    /// underlying tool's diagnostic output.
    Provisioning(String),
    /// Docker/container runtime failure.
    Docker(String),
}

impl fmt::Display for PanelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelError::Validation(msg) => write!(f, "validation error: {msg}"),
            PanelError::Environment(msg) => write!(f, "environment error: {msg}"),
            PanelError::Provisioning(msg) => write!(f, "provisioning failed: {msg}"),
            PanelError::Docker(msg) => write!(f, "docker error: {msg}"),
        }
    }
}

impl std::error::Error for PanelError {}

pub type Result<T> = std::result::Result<T, PanelError>;
