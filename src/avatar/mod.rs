//! Avatar face module
//!
//! Handles emotion profiles, morph target channel discovery and expression
//! blending.

pub mod blender;
pub mod channels;
pub mod profile;

pub use blender::ExpressionBlender;
pub use channels::{ChannelTable, HeadMeshResolver, SceneNode, SceneResolver, StaticResolver};
pub use profile::{EmotionCommand, EmotionProfile};
