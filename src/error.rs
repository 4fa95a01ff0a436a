//! Error types for dtln-stream.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DenoiseError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Model / inference errors
    #[error("Model file not found at {path}")]
    ModelNotFound { path: String },

    #[error("Inference engine not initialized")]
    NotInitialized,

    #[error("Inference failed: {message}")]
    InferenceFailed { message: String },

    #[cfg(feature = "onnx")]
    #[error("ONNX runtime error: {0}")]
    Onnx(#[from] ort::Error),

    // Pipeline errors
    #[error("Queue is empty")]
    QueueEmpty,

    #[error("Malformed audio frame: {message}")]
    MalformedFrame { message: String },

    #[error("Pipeline channel closed: {message}")]
    ChannelClosed { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, DenoiseError>;
