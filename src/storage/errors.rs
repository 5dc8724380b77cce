use std::fmt;
use std::io;

/// Storage-related errors
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Key not found in storage
    NotFound {
        key: String
    },

    /// Write to a data type that has been locked read-only
    ReadOnly {
        key: String
    },

    /// Error serializing or deserializing data
    SerializationError {
        details: String
    },

    /// Error accessing underlying storage medium (IO error)
    IOError {
        operation: String,
        details: String
    },

    /// Key that cannot be stored
    InvalidKey {
        key: String,
        details: String
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound { key } =>
                write!(f, "Key not found: {}", key),

            StorageError::ReadOnly { key } =>
                write!(f, "Key is read-only: {}", key),

            StorageError::SerializationError { details } =>
                write!(f, "Serialization error: {}", details),

            StorageError::IOError { operation, details } =>
                write!(f, "I/O error during {}: {}", operation, details),

            StorageError::InvalidKey { key, details } =>
                write!(f, "Invalid key '{}': {}", key, details),
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::IOError {
            operation: "unknown".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError {
            details: err.to_string(),
        }
    }
}

impl std::error::Error for StorageError {}

/// Maps an IO error to a StorageError
pub fn io_to_storage_error(operation: &str, error: std::io::Error) -> StorageError {
    StorageError::IOError {
        operation: operation.to_string(),
        details: error.to_string(),
    }
}

/// Define a standard Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
