//! Emotion profiles and commands
//!
//! A profile is a fixed table of ARKit blendshape names to base weights.
//! Commands scale a profile by an intensity before it is handed to the
//! blender.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::EmotionError;

/// A logical emotion with a fixed morph target mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionProfile {
    /// Drives every channel back to zero
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Thinking,
}

impl Default for EmotionProfile {
    fn default() -> Self {
        Self::Neutral
    }
}

const HAPPY: &[(&str, f32)] = &[
    ("browInnerUp", 0.17),
    ("eyeSquintLeft", 0.4),
    ("eyeSquintRight", 0.44),
    ("noseSneerLeft", 0.17),
    ("noseSneerRight", 0.14),
    ("mouthPressLeft", 0.61),
    ("mouthPressRight", 0.41),
];

const SAD: &[(&str, f32)] = &[
    ("mouthFrownLeft", 1.0),
    ("mouthFrownRight", 1.0),
    ("mouthShrugLower", 0.78341),
    ("browInnerUp", 0.452),
    ("eyeSquintLeft", 0.72),
    ("eyeSquintRight", 0.75),
    ("eyeLookDownLeft", 0.5),
    ("eyeLookDownRight", 0.5),
    ("jawForward", 1.0),
];

const ANGRY: &[(&str, f32)] = &[
    ("browDownLeft", 1.0),
    ("browDownRight", 1.0),
    ("eyeSquintLeft", 1.0),
    ("eyeSquintRight", 1.0),
    ("jawForward", 1.0),
    ("jawLeft", 1.0),
    ("mouthShrugLower", 1.0),
    ("noseSneerLeft", 1.0),
    ("noseSneerRight", 0.42),
    ("eyeLookDownLeft", 0.16),
    ("eyeLookDownRight", 0.16),
    ("cheekSquintLeft", 1.0),
    ("cheekSquintRight", 1.0),
    ("mouthClose", 0.23),
    ("mouthFunnel", 0.63),
    ("mouthDimpleRight", 1.0),
];

const SURPRISED: &[(&str, f32)] = &[
    ("eyeWideLeft", 0.5),
    ("eyeWideRight", 0.5),
    ("jawOpen", 0.351),
    ("mouthFunnel", 1.0),
    ("browInnerUp", 1.0),
];

const THINKING: &[(&str, f32)] = &[
    ("browInnerUp", 1.0),
    ("browOuterUpRight", 0.7),
    ("eyeSquintRight", 0.3),
    ("mouthPressLeft", 0.4),
];

impl EmotionProfile {
    pub const ALL: [EmotionProfile; 6] = [
        Self::Neutral,
        Self::Happy,
        Self::Sad,
        Self::Angry,
        Self::Surprised,
        Self::Thinking,
    ];

    /// Channel name to base weight pairs for this profile
    pub fn base_weights(&self) -> &'static [(&'static str, f32)] {
        match self {
            Self::Neutral => &[],
            Self::Happy => HAPPY,
            Self::Sad => SAD,
            Self::Angry => ANGRY,
            Self::Surprised => SURPRISED,
            Self::Thinking => THINKING,
        }
    }

    /// Base weight for a single channel, if the profile drives it
    pub fn base_weight(&self, channel: &str) -> Option<f32> {
        self.base_weights()
            .iter()
            .find(|(name, _)| *name == channel)
            .map(|&(_, weight)| weight)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Surprised => "surprised",
            Self::Thinking => "thinking",
        }
    }
}

impl std::fmt::Display for EmotionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EmotionProfile {
    type Err = EmotionError;

    /// Unknown names are rejected rather than mapped to neutral.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| EmotionError::UnknownProfile(s.to_string()))
    }
}

/// A request to drive the face toward a profile at some intensity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionCommand {
    pub profile: EmotionProfile,
    /// Scale applied to every base weight, in [0, 1]
    pub intensity: f32,
    /// New global interpolation rate, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f32>,
}

impl EmotionCommand {
    pub fn new(profile: EmotionProfile, intensity: f32) -> Self {
        Self {
            profile,
            intensity,
            rate: None,
        }
    }

    /// Set the transition rate carried by this command
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Parse a profile name and build a command from it
    pub fn parse(profile_name: &str, intensity: f32) -> Result<Self, EmotionError> {
        let command = Self::new(profile_name.parse()?, intensity);
        command.validate()?;
        Ok(command)
    }

    /// Reject out-of-range intensities and rates instead of clamping them.
    pub fn validate(&self) -> Result<(), EmotionError> {
        if !(0.0..=1.0).contains(&self.intensity) {
            return Err(EmotionError::IntensityOutOfRange(self.intensity));
        }
        if let Some(rate) = self.rate {
            if !(rate > 0.0 && rate <= 1.0) {
                return Err(EmotionError::RateOutOfRange(rate));
            }
        }
        Ok(())
    }

    /// Scaled (channel, weight) contributions of this command
    pub fn contributions(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        self.profile
            .base_weights()
            .iter()
            .map(move |&(name, base)| (name, base * self.intensity))
    }
}
