//! Configuration parsing and management for Persona3D

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::avatar::EmotionProfile;
use crate::error::{ConfigError, Persona3dError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub expression: ExpressionConfig,
    pub sequencer: SequencerConfig,
    pub scene: SceneConfig,
    pub clips: ClipsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Persona3dError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self, Persona3dError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, Persona3dError> {
        let paths = [
            PathBuf::from("persona3d.toml"),
            PathBuf::from("config/persona3d.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Persona3dError> {
        let e = &self.expression;
        if !(e.rate > 0.0 && e.rate <= 1.0) {
            return Err(invalid("expression.rate", "Rate must be in (0, 1]"));
        }
        if !(e.epsilon > 0.0) {
            return Err(invalid("expression.epsilon", "Epsilon must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&e.initial_intensity) {
            return Err(invalid(
                "expression.initial_intensity",
                "Intensity must be between 0.0 and 1.0",
            ));
        }

        let s = &self.sequencer;
        if !(s.crossfade_secs > 0.0) {
            return Err(invalid(
                "sequencer.crossfade_secs",
                "Crossfade window must be greater than 0",
            ));
        }
        if !(s.thinking_period > 0.0) {
            return Err(invalid(
                "sequencer.thinking_period",
                "Period must be greater than 0",
            ));
        }
        if !(s.thinking_dwell >= 0.0) {
            return Err(invalid(
                "sequencer.thinking_dwell",
                "Dwell must not be negative",
            ));
        }
        if !(0.0..=1.0).contains(&s.thinking_threshold) {
            return Err(invalid(
                "sequencer.thinking_threshold",
                "Threshold must be between 0.0 and 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&s.thinking_intensity) {
            return Err(invalid(
                "sequencer.thinking_intensity",
                "Intensity must be between 0.0 and 1.0",
            ));
        }

        if self.scene.mesh_hint.trim().is_empty() {
            return Err(invalid("scene.mesh_hint", "Mesh hint must not be empty"));
        }

        for (field, clip) in [
            ("clips.greeting", &self.clips.greeting),
            ("clips.idle", &self.clips.idle),
        ] {
            if !(clip.duration > 0.0) {
                return Err(invalid(field, "Clip duration must be greater than 0"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> Persona3dError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Expression blender tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionConfig {
    /// Fraction of the remaining distance closed per frame
    pub rate: f32,
    /// Distance below which a channel snaps to its limit
    pub epsilon: f32,
    /// Emotion applied as soon as the mesh is discovered
    pub initial_emotion: Option<EmotionProfile>,
    /// Intensity of the initial emotion
    pub initial_intensity: f32,
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            rate: 0.05,
            epsilon: 0.001,
            initial_emotion: None,
            initial_intensity: 1.0,
        }
    }
}

/// Animation sequencer timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Crossfade window between clips, in seconds
    pub crossfade_secs: f32,
    /// Interval between thinking rolls while looping idle
    pub thinking_period: f32,
    /// A roll strictly above this value triggers the thinking cue
    pub thinking_threshold: f32,
    /// Time the thinking expression is held before returning to neutral
    pub thinking_dwell: f32,
    /// Intensity of the thinking expression
    pub thinking_intensity: f32,
    /// Enable the idle thinking interjection
    pub thinking_enabled: bool,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            crossfade_secs: 0.5,
            thinking_period: 10.0,
            thinking_threshold: 0.7,
            thinking_dwell: 3.0,
            thinking_intensity: 0.6,
            thinking_enabled: true,
        }
    }
}

/// Scene discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Case-insensitive substring a mesh name must contain
    pub mesh_hint: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            mesh_hint: "head".to_string(),
        }
    }
}

/// A named clip and its length in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    pub name: String,
    pub duration: f32,
}

impl ClipSpec {
    pub fn new(name: &str, duration: f32) -> Self {
        Self {
            name: name.to_string(),
            duration,
        }
    }
}

/// Clips driven by the sequencer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipsConfig {
    /// One-shot clip played on start
    pub greeting: ClipSpec,
    /// Looping clip played after the greeting
    pub idle: ClipSpec,
    /// Simulated load latency for the headless host, in milliseconds
    pub load_latency_ms: u64,
}

impl Default for ClipsConfig {
    fn default() -> Self {
        Self {
            greeting: ClipSpec::new("greeting", 2.0),
            idle: ClipSpec::new("idle", 4.0),
            load_latency_ms: 50,
        }
    }
}
