//! Error handling for Rampdeck
//!
//! Every member of the taxonomy is locally recoverable except engine faults,
//! which are handed back to the caller unchanged.

use thiserror::Error;

use crate::engine::NodeId;
use crate::session::SessionState;

/// Result type alias for Rampdeck operations
pub type Result<T> = std::result::Result<T, RampdeckError>;

/// Main error type for Rampdeck operations
#[derive(Error, Debug)]
pub enum RampdeckError {
    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Decoding Errors
    #[error("Failed to decode audio: {reason}")]
    DecodeFailure {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // Session Errors
    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Invalid value for {param}: {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Capture Errors
    #[error("Capture unavailable: {reason}")]
    CaptureUnavailable { reason: String },

    #[error("Capture failed: {reason}")]
    CaptureFailed { reason: String },

    // Engine Errors
    #[error("Unknown engine node: {node}")]
    UnknownNode { node: NodeId },

    #[error("Audio engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RampdeckError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            RampdeckError::FileNotFound { .. } => "FILE_NOT_FOUND",
            RampdeckError::DecodeFailure { .. } => "DECODE_FAILURE",
            RampdeckError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            RampdeckError::EmptyAudio => "EMPTY_AUDIO",
            RampdeckError::InvalidTransition { .. } => "INVALID_TRANSITION",
            RampdeckError::InvalidParameter { .. } => "INVALID_PARAMETER",
            RampdeckError::InvalidConfig { .. } => "INVALID_CONFIG",
            RampdeckError::CaptureUnavailable { .. } => "CAPTURE_UNAVAILABLE",
            RampdeckError::CaptureFailed { .. } => "CAPTURE_FAILED",
            RampdeckError::UnknownNode { .. } => "UNKNOWN_NODE",
            RampdeckError::EngineUnavailable { .. } => "ENGINE_UNAVAILABLE",
            RampdeckError::Io(_) => "IO_ERROR",
            RampdeckError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable without tearing down the controller
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            RampdeckError::UnknownNode { .. } | RampdeckError::EngineUnavailable { .. }
        )
    }

    /// Check if this error belongs to the decoding family
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            RampdeckError::DecodeFailure { .. }
                | RampdeckError::UnsupportedFormat { .. }
                | RampdeckError::EmptyAudio
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RampdeckError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            RampdeckError::DecodeFailure { .. } | RampdeckError::UnsupportedFormat { .. } => vec![
                "Try converting the file to WAV format first",
                "The file may be corrupted - try re-exporting from source",
            ],
            RampdeckError::EmptyAudio => vec!["Load a file that contains at least one frame"],
            RampdeckError::InvalidTransition { .. } => {
                vec!["Load an audio file before starting playback"]
            }
            RampdeckError::InvalidParameter { .. } => {
                vec!["Enter a finite number inside the documented range"]
            }
            RampdeckError::CaptureUnavailable { .. } => vec![
                "Playback continues without recording",
                "Enable capture in the session configuration",
            ],
            RampdeckError::CaptureFailed { .. } => vec![
                "Check there is free disk space for the export",
                "Restart playback to record again",
            ],
            _ => vec![],
        }
    }
}
