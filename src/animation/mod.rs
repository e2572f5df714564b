//! Body animation module
//!
//! Clip mixer and the greeting → idle sequencer that drives it.

pub mod mixer;
pub mod rolls;
pub mod sequencer;

pub use mixer::{ActionId, Clip, ClipMixer, LoopMode, MixerEvent};
pub use rolls::{RandomRolls, RollSource};
pub use sequencer::{AnimationSequencer, ClipLoad, ClipRole, ClipState, Phase};
