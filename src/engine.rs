//! Avatar engine: expression blender and animation sequencer driven by one
//! frame tick.
//!
//! The engine is the only writer of blend state. Commands coming from
//! [`EmotionController`] handles are validated at the call site, queued, and
//! applied at the start of the next [`AvatarEngine::advance`].

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::animation::{AnimationSequencer, Clip, ClipRole, Phase, RollSource};
use crate::avatar::{ChannelTable, EmotionCommand, ExpressionBlender, SceneResolver};
use crate::config::Config;
use crate::error::{AnimationError, EmotionError};

/// What happened during one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
    /// Any morph weight was written this frame
    pub weights_changed: bool,
    /// Sequencer phase after the frame; `None` until both clips are loaded
    pub phase: Option<Phase>,
    /// Expression cues raised by the sequencer
    pub cues: Vec<EmotionCommand>,
    /// Controller commands applied at the start of the frame
    pub commands_applied: usize,
}

/// Capability handle exposing only `set_emotion` to UI callers.
#[derive(Debug, Clone)]
pub struct EmotionController {
    tx: Sender<EmotionCommand>,
}

impl EmotionController {
    /// Queue an emotion change for the next frame.
    ///
    /// Unknown profile names and intensities outside [0, 1] are rejected
    /// immediately.
    pub fn set_emotion(&self, profile_name: &str, intensity: f32) -> Result<(), EmotionError> {
        let command = EmotionCommand::parse(profile_name, intensity)?;
        self.tx
            .send(command)
            .map_err(|_| EmotionError::QueueClosed)
    }
}

/// Facade over the expression blender and the animation sequencer
#[derive(Debug)]
pub struct AvatarEngine {
    blender: ExpressionBlender,
    sequencer: AnimationSequencer,
    command_tx: Sender<EmotionCommand>,
    command_rx: Receiver<EmotionCommand>,
    initial: Option<EmotionCommand>,
    frames: u64,
    disposed: bool,
}

impl AvatarEngine {
    pub fn new(config: &Config, rolls: Box<dyn RollSource>) -> Self {
        let (command_tx, command_rx) = unbounded();
        let initial = config
            .expression
            .initial_emotion
            .map(|p| EmotionCommand::new(p, config.expression.initial_intensity));

        Self {
            blender: ExpressionBlender::new(&config.expression),
            sequencer: AnimationSequencer::new(&config.sequencer, rolls),
            command_tx,
            command_rx,
            initial,
            frames: 0,
            disposed: false,
        }
    }

    /// Discover the head mesh. Returns whether expressions are available.
    pub fn attach_scene(&mut self, resolver: &dyn SceneResolver) -> bool {
        if self.disposed {
            return false;
        }
        let ready = self.blender.attach(resolver);
        if ready {
            if let Some(command) = self.initial.take() {
                if let Err(e) = self.blender.set_emotion(command) {
                    tracing::warn!("Initial emotion rejected: {}", e);
                }
            }
        }
        ready
    }

    /// Register an asynchronous clip load
    pub fn expect_clip(
        &mut self,
        role: ClipRole,
        load: oneshot::Receiver<Result<Clip, AnimationError>>,
    ) {
        self.sequencer.expect_clip(role, load);
    }

    /// Provide an already loaded clip
    pub fn attach_clip(&mut self, role: ClipRole, clip: Clip) {
        self.sequencer.attach_clip(role, clip);
    }

    /// Handle for UI callers
    pub fn controller(&self) -> EmotionController {
        EmotionController {
            tx: self.command_tx.clone(),
        }
    }

    pub fn set_emotion(&mut self, command: EmotionCommand) -> Result<(), EmotionError> {
        if self.disposed {
            return command.validate();
        }
        self.blender.set_emotion(command)
    }

    /// `set_emotion` by profile name
    pub fn set_emotion_by_name(
        &mut self,
        profile_name: &str,
        intensity: f32,
    ) -> Result<(), EmotionError> {
        let command = EmotionCommand::parse(profile_name, intensity)?;
        self.set_emotion(command)
    }

    pub fn blend_emotions(&mut self, commands: &[EmotionCommand]) -> Result<(), EmotionError> {
        if self.disposed {
            return commands.iter().try_for_each(|c| c.validate());
        }
        self.blender.blend_emotions(commands)
    }

    /// `blend_emotions` by (profile name, intensity) pairs
    pub fn blend_emotions_by_name(&mut self, entries: &[(&str, f32)]) -> Result<(), EmotionError> {
        let commands = entries
            .iter()
            .map(|&(name, intensity)| EmotionCommand::parse(name, intensity))
            .collect::<Result<Vec<_>, _>>()?;
        self.blend_emotions(&commands)
    }

    /// Advance one frame by `dt` seconds.
    pub fn advance(&mut self, dt: f32) -> FrameReport {
        let mut report = FrameReport::default();
        if self.disposed {
            while self.command_rx.try_recv().is_ok() {}
            return report;
        }

        for command in self.command_rx.try_iter() {
            match self.blender.set_emotion(command) {
                Ok(()) => report.commands_applied += 1,
                Err(e) => tracing::warn!("Queued emotion rejected: {}", e),
            }
        }

        let previous = self.sequencer.phase();
        report.cues = self.sequencer.advance(dt);
        report.phase = self.sequencer.phase();
        if report.phase != previous {
            tracing::debug!("Sequencer phase {:?} -> {:?}", previous, report.phase);
        }

        for cue in &report.cues {
            if let Err(e) = self.blender.set_emotion(*cue) {
                tracing::warn!("Sequencer cue rejected: {}", e);
            }
        }

        report.weights_changed = self.blender.advance(dt);
        self.frames += 1;
        report
    }

    /// Stop all animation and release expression state. Further frames and
    /// commands are ignored.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.sequencer.dispose();
        self.blender.reset();
        self.disposed = true;
        tracing::info!("Avatar engine disposed after {} frames", self.frames);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn blender(&self) -> &ExpressionBlender {
        &self.blender
    }

    pub fn sequencer(&self) -> &AnimationSequencer {
        &self.sequencer
    }

    pub fn channels(&self) -> Option<&ChannelTable> {
        self.blender.channels()
    }

    /// Frames advanced so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}
