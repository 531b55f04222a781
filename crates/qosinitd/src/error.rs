//! Error types for QoS provisioning.

use std::fmt;

use sonic_qos_codec::CodecError;
use thiserror::Error;

/// Result type alias for provisioning operations.
pub type QosInitResult<T> = Result<T, QosInitError>;

/// Which name-to-id table a lookup went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Map,
    SchedulerProfile,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKind::Map => f.write_str("map"),
            LookupKind::SchedulerProfile => f.write_str("scheduler profile"),
        }
    }
}

/// Errors that can occur while provisioning QoS objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QosInitError {
    /// Attribute encode/decode failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A create/set/delete batch was rejected by the store.
    #[error("Transaction failed for {object}: {reason}")]
    TransactionFailed {
        /// Name of the object the transaction targeted.
        object: String,
        /// Failure reported by the store.
        reason: String,
    },

    /// A read against the store failed.
    #[error("Query failed for {object}: {reason}")]
    QueryFailed {
        /// Name of the queried object.
        object: String,
        /// Failure reported by the store.
        reason: String,
    },

    /// A referenced map or profile name was never created.
    #[error("No {kind} named '{name}' was created")]
    LookupMiss {
        /// Lookup table consulted.
        kind: LookupKind,
        /// The unresolved name.
        name: String,
    },

    /// No port index could be resolved for an interface name.
    #[error("Port {name} not available")]
    PortUnavailable {
        /// Interface name.
        name: String,
    },

    /// The store reported fewer scheduler groups at a level than the
    /// declared tree addresses.
    #[error(
        "Port {port}: no scheduler group at level {level} ordinal {ordinal} ({discovered} discovered)"
    )]
    SchedulerGroupShortfall {
        /// Interface name.
        port: String,
        /// Tree level.
        level: u32,
        /// Declared ordinal.
        ordinal: usize,
        /// Number of groups discovered at that level.
        discovered: usize,
    },

    /// The configuration file could not be read or is invalid.
    #[error("Invalid configuration {path}: {message}")]
    Config {
        /// Path of the configuration file.
        path: String,
        /// What was wrong.
        message: String,
    },

    /// A store response lacked an attribute the caller relies on.
    #[error("Malformed response for {object}: {reason}")]
    MalformedResponse {
        /// Object the response belongs to.
        object: String,
        /// What was missing.
        reason: String,
    },
}

impl QosInitError {
    /// Creates a transaction failure error.
    pub fn transaction(object: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::TransactionFailed {
            object: object.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a query failure error.
    pub fn query(object: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::QueryFailed {
            object: object.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a lookup miss error.
    pub fn lookup_miss(kind: LookupKind, name: impl Into<String>) -> Self {
        Self::LookupMiss {
            kind,
            name: name.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed response error.
    pub fn malformed(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            object: object.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for programmer or configuration errors that fail the
    /// same way on every retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            QosInitError::Codec(_) | QosInitError::Config { .. } | QosInitError::PortUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QosInitError::lookup_miss(LookupKind::SchedulerProfile, "strict");
        assert_eq!(err.to_string(), "No scheduler profile named 'strict' was created");

        let err = QosInitError::transaction("dot1p-to-tc-map/default", "rejected");
        assert!(err.to_string().contains("dot1p-to-tc-map/default"));
    }

    #[test]
    fn test_codec_errors_are_fatal() {
        let err: QosInitError = CodecError::UnknownEnumSymbol {
            key: "base-qos:queue-type:X".to_string(),
        }
        .into();
        assert!(err.is_fatal());
        assert!(!QosInitError::transaction("x", "y").is_fatal());
        assert!(!QosInitError::lookup_miss(LookupKind::Map, "m").is_fatal());
    }
}
