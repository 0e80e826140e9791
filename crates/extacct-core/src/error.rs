//! Error types for external account tooling

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtacctError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Directory error: {message}")]
    DirectoryError { message: String },

    #[error("Authentication error: {message}")]
    AuthError { message: String },

    #[error("Username namespace exhausted after {attempts} attempts")]
    ExhaustedNamespace { attempts: u32 },

    #[error("Input error: {message}")]
    InputError { message: String },

    #[error("Report error: {message}")]
    ReportError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl ExtacctError {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn directory_error(message: impl Into<String>) -> Self {
        Self::DirectoryError {
            message: message.into(),
        }
    }

    pub fn auth_error(message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
        }
    }

    pub fn input_error(message: impl Into<String>) -> Self {
        Self::InputError {
            message: message.into(),
        }
    }

    pub fn report_error(message: impl Into<String>) -> Self {
        Self::ReportError {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtacctError>;

/// Reasons a record is rejected before any directory mutation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Organizational unit not found: '{path}'")]
    OuNotFound { path: String },

    #[error("Security group not found: '{name}'")]
    GroupNotFound { name: String },

    #[error("Required field is blank: {field}")]
    MissingField { field: &'static str },

    #[error("Directory lookup failed: {0}")]
    Lookup(#[from] ExtacctError),
}

impl ValidationError {
    /// Short machine-readable code used in the skip report
    pub fn code(&self) -> &'static str {
        match self {
            Self::OuNotFound { .. } => "ou_not_found",
            Self::GroupNotFound { .. } => "group_not_found",
            Self::MissingField { .. } => "missing_field",
            Self::Lookup(_) => "lookup_failed",
        }
    }
}
