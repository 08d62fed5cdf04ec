use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Unified error type for reqtree operations
#[derive(Debug, Error)]
pub enum ReqtreeError {
    // Store errors
    #[error("Unknown dispatcher '{0}'")]
    UnknownDispatcher(String),

    #[error("Invalid payload for dispatcher '{dispatcher}': {source}")]
    InvalidPayload {
        dispatcher: String,
        source: serde_json::Error,
    },

    // Path errors
    #[error("Invalid reorder: source and destination are both {0}")]
    InvalidReorder(usize),

    // Serialization errors
    #[error("JSON error: {0}")]
    Serialize(#[from] serde_json::Error),

    // Config errors
    #[error("Failed to read config '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config '{path}': {source}")]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias for reqtree operations
pub type Result<T> = std::result::Result<T, ReqtreeError>;

/// A serializable representation of ReqtreeError for surfacing to a UI layer
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Associated config path (if applicable)
    pub path: Option<PathBuf>,
}

impl From<&ReqtreeError> for SerializableError {
    fn from(err: &ReqtreeError) -> Self {
        let kind = match err {
            ReqtreeError::UnknownDispatcher(_) => "UnknownDispatcher",
            ReqtreeError::InvalidPayload { .. } => "InvalidPayload",
            ReqtreeError::InvalidReorder(_) => "InvalidReorder",
            ReqtreeError::Serialize(_) => "Serialize",
            ReqtreeError::ConfigRead { .. } => "ConfigRead",
            ReqtreeError::ConfigWrite { .. } => "ConfigWrite",
            ReqtreeError::ConfigParse(_) => "ConfigParse",
            ReqtreeError::ConfigSerialize(_) => "ConfigSerialize",
            ReqtreeError::NoConfigDir => "NoConfigDir",
        }
        .to_string();

        let path = match err {
            ReqtreeError::ConfigRead { path, .. } => Some(path.clone()),
            ReqtreeError::ConfigWrite { path, .. } => Some(path.clone()),
            _ => None,
        };

        Self {
            kind,
            message: err.to_string(),
            path,
        }
    }
}

impl From<ReqtreeError> for SerializableError {
    fn from(err: ReqtreeError) -> Self {
        SerializableError::from(&err)
    }
}

impl ReqtreeError {
    /// Convert to a serializable representation for a UI notification
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }

    /// Whether this error came from a caller passing a no-op reorder
    pub fn is_invalid_reorder(&self) -> bool {
        matches!(self, ReqtreeError::InvalidReorder(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializable_error_kind_and_message() {
        let err = ReqtreeError::UnknownDispatcher("renameEverything".to_string());
        let serialized = err.to_serializable();
        assert_eq!(serialized.kind, "UnknownDispatcher");
        assert_eq!(serialized.message, "Unknown dispatcher 'renameEverything'");
        assert!(serialized.path.is_none());
    }

    #[test]
    fn test_serializable_error_keeps_config_path() {
        let err = ReqtreeError::ConfigRead {
            path: PathBuf::from("/tmp/reqtree/config.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let serialized = SerializableError::from(err);
        assert_eq!(serialized.kind, "ConfigRead");
        assert_eq!(
            serialized.path,
            Some(PathBuf::from("/tmp/reqtree/config.toml"))
        );
    }

    #[test]
    fn test_is_invalid_reorder() {
        assert!(ReqtreeError::InvalidReorder(3).is_invalid_reorder());
        assert!(!ReqtreeError::NoConfigDir.is_invalid_reorder());
    }
}
