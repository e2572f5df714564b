//! Error types for Persona3D

use thiserror::Error;

/// Main error type for Persona3D
#[derive(Error, Debug)]
pub enum Persona3dError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Emotion error: {0}")]
    Emotion(#[from] EmotionError),

    #[error("Animation error: {0}")]
    Animation(#[from] AnimationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Caller contract violations on the emotion command surface.
///
/// These are never produced for a missing mesh; a blender without a channel
/// table silently ignores well-formed commands.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmotionError {
    #[error("Unknown emotion profile: {0}")]
    UnknownProfile(String),

    #[error("Intensity out of range [0, 1]: {0}")]
    IntensityOutOfRange(f32),

    #[error("Transition rate out of range (0, 1]: {0}")]
    RateOutOfRange(f32),

    #[error("Emotion command queue closed")]
    QueueClosed,
}

/// Animation clip and mixer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    #[error("Clip load failed: {0}")]
    ClipLoad(String),

    #[error("Invalid clip {name}: {message}")]
    InvalidClip { name: String, message: String },
}

/// Result type alias for Persona3D operations
pub type Result<T> = std::result::Result<T, Persona3dError>;
