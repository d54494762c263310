//! # Error Handling Module
//!
//! Error types for zone-aware selection, built on `thiserror`.
//!
//! Most failures in this crate never reach a caller. Zone lookups that fail
//! because a collaborator (pod registry, endpoint topology source) could not
//! be queried degrade to "zone absent" and the selector falls back to the
//! full instance list. The error type still carries those failures so the
//! degradation point can log and count them.

use thiserror::Error;

/// Result alias used throughout the crate
pub type ZoneAffinityResult<T> = Result<T, ZoneAffinityError>;

/// Names of the collaborators a zone strategy talks to
pub mod collaborator {
    pub const POD_REGISTRY: &str = "pod_registry";
    pub const ENDPOINT_TOPOLOGY: &str = "endpoint_topology";
    pub const INSTANCE_DISCOVERY: &str = "instance_discovery";
}

#[derive(Debug, Error, Clone)]
pub enum ZoneAffinityError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A zone-data collaborator call failed (pod list, endpoint-group list)
    #[error("Collaborator {collaborator} failed: {message}")]
    Collaborator { collaborator: String, message: String },

    /// The raw instance list could not be produced
    #[error("Service discovery error: {message}")]
    Discovery { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("YAML error: {message}")]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    Json { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ZoneAffinityError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a collaborator failure
    pub fn collaborator<C: Into<String>, S: Into<String>>(collaborator: C, message: S) -> Self {
        Self::Collaborator {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }

    /// Create a discovery error with a custom message
    pub fn discovery<S: Into<String>>(message: S) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Failures the selection core swallows and degrades on
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, Self::Collaborator { .. })
    }

    /// Collaborator name for metrics labels
    pub fn collaborator_name(&self) -> &str {
        match self {
            Self::Collaborator { collaborator, .. } => collaborator.as_str(),
            Self::Discovery { .. } => collaborator::INSTANCE_DISCOVERY,
            _ => "none",
        }
    }

    /// Short error category for logs and metrics
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::Collaborator { .. } => "collaborator_error",
            Self::Discovery { .. } => "discovery_error",
            Self::Io { .. } => "io_error",
            Self::Yaml { .. } => "yaml_error",
            Self::Json { .. } => "json_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl From<std::io::Error> for ZoneAffinityError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ZoneAffinityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ZoneAffinityError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_failures_are_classified() {
        let err = ZoneAffinityError::collaborator(collaborator::POD_REGISTRY, "forbidden");
        assert!(err.is_collaborator_failure());
        assert_eq!(err.collaborator_name(), "pod_registry");
        assert_eq!(err.to_string(), "Collaborator pod_registry failed: forbidden");

        assert!(!ZoneAffinityError::config("bad").is_collaborator_failure());
        assert!(!ZoneAffinityError::discovery("down").is_collaborator_failure());
    }

    #[test]
    fn test_error_types() {
        assert_eq!(ZoneAffinityError::config("x").error_type(), "configuration_error");
        assert_eq!(ZoneAffinityError::internal("x").error_type(), "internal_error");
        assert_eq!(
            ZoneAffinityError::discovery("x").collaborator_name(),
            collaborator::INSTANCE_DISCOVERY
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ZoneAffinityError = io.into();
        assert!(matches!(err, ZoneAffinityError::Io { .. }));
    }
}
