//! Persona3D - Facial expression and body animation engine for a 3D assistant avatar
//!
//! A frame-driven engine that:
//! - Blends emotion profiles into per-channel morph target weights
//! - Decays untargeted channels smoothly back to rest
//! - Sequences a one-shot greeting into a looping idle with crossfades
//! - Interjects occasional "thinking" expressions while idling

pub mod animation;
pub mod avatar;
pub mod config;
pub mod engine;
pub mod error;

pub use animation::{AnimationSequencer, Clip, ClipRole, Phase, RandomRolls, RollSource};
pub use avatar::{
    ChannelTable, EmotionCommand, EmotionProfile, ExpressionBlender, HeadMeshResolver, SceneNode,
    SceneResolver,
};
pub use config::Config;
pub use engine::{AvatarEngine, EmotionController, FrameReport};
pub use error::{Persona3dError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
