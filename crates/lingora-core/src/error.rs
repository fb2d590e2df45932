// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for lingora-core.
//!
//! Provides a unified error type that maps to stable error codes surfaced on
//! failed workflow instances and HTTP error responses.

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur during storage operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// Version was not found in the database.
    VersionNotFound {
        /// The version id that was not found.
        version_id: i64,
    },

    /// Workflow instance was not found in the database.
    InstanceNotFound {
        /// The instance ID that was not found.
        instance_id: String,
    },

    /// Workflow instance already exists (duplicate registration).
    InstanceAlreadyExists {
        /// The instance ID that already exists.
        instance_id: String,
    },

    /// Database operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// Artifact store operation failed.
    ArtifactError {
        /// The artifact path the operation targeted.
        path: String,
        /// Error details.
        details: String,
    },

    /// Serializing or deserializing stored state failed.
    SerializationError {
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::VersionNotFound { .. } => "VERSION_NOT_FOUND",
            Self::InstanceNotFound { .. } => "INSTANCE_NOT_FOUND",
            Self::InstanceAlreadyExists { .. } => "INSTANCE_ALREADY_EXISTS",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
            Self::ArtifactError { .. } => "ARTIFACT_ERROR",
            Self::SerializationError { .. } => "SERIALIZATION_ERROR",
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionNotFound { version_id } => {
                write!(f, "Version {} not found", version_id)
            }
            Self::InstanceNotFound { instance_id } => {
                write!(f, "Instance '{}' not found", instance_id)
            }
            Self::InstanceAlreadyExists { instance_id } => {
                write!(f, "Instance '{}' already exists", instance_id)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
            Self::ArtifactError { path, details } => {
                write!(f, "Artifact error for '{}': {}", path, details)
            }
            Self::SerializationError { details } => {
                write!(f, "Serialization error: {}", details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_display() {
        let err = CoreError::VersionNotFound { version_id: 7 };
        assert_eq!(err.to_string(), "Version 7 not found");

        let err = CoreError::InstanceNotFound {
            instance_id: "release-abc".to_string(),
        };
        assert_eq!(err.to_string(), "Instance 'release-abc' not found");

        let err = CoreError::DatabaseError {
            operation: "insert".to_string(),
            details: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Database error during 'insert': connection refused"
        );

        let err = CoreError::ArtifactError {
            path: "3/en.json".to_string(),
            details: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Artifact error for '3/en.json': permission denied"
        );
    }

    #[test]
    fn test_error_code_method() {
        assert_eq!(
            CoreError::VersionNotFound { version_id: 1 }.error_code(),
            "VERSION_NOT_FOUND"
        );
        assert_eq!(
            CoreError::InstanceAlreadyExists {
                instance_id: "x".to_string()
            }
            .error_code(),
            "INSTANCE_ALREADY_EXISTS"
        );
        assert_eq!(
            CoreError::SerializationError {
                details: "y".to_string()
            }
            .error_code(),
            "SERIALIZATION_ERROR"
        );
    }
}
