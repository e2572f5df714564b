//! Animation sequencer.
//!
//! Plays the greeting once, crossfades into the looping idle clip when the
//! greeting finishes, and while idling occasionally raises a thinking
//! expression cue for the blender.

use serde::Serialize;
use tokio::sync::oneshot;

use crate::avatar::{EmotionCommand, EmotionProfile};
use crate::config::SequencerConfig;
use crate::error::AnimationError;

use super::mixer::{ActionId, Clip, ClipMixer, LoopMode, MixerEvent};
use super::rolls::RollSource;

/// Which slot a clip fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipRole {
    /// One-shot clip played on start
    Greeting,
    /// Looping clip played afterwards
    Idle,
}

impl std::fmt::Display for ClipRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClipRole::Greeting => write!(f, "greeting"),
            ClipRole::Idle => write!(f, "idle"),
        }
    }
}

/// Playback phase of the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Only the active clip contributes
    SoloPlaying,
    /// Outgoing and incoming clips both contribute
    Crossfading,
    /// The looping clip runs alone
    SteadyLoop,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::SoloPlaying => write!(f, "solo_playing"),
            Phase::Crossfading => write!(f, "crossfading"),
            Phase::SteadyLoop => write!(f, "steady_loop"),
        }
    }
}

/// Which clips are driving the skeleton
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipState {
    pub active: ActionId,
    /// Clip to crossfade into when the active one-shot finishes
    pub pending: Option<ActionId>,
    pub phase: Phase,
}

/// Receiving end of an asynchronous clip load
pub type ClipLoad = oneshot::Receiver<Result<Clip, AnimationError>>;

#[derive(Debug, Default)]
struct ThinkingSchedule {
    /// Time accumulated toward the next roll
    since_roll: f32,
    /// Remaining hold time of an active thinking cue
    dwell_left: Option<f32>,
}

/// Greeting → idle state machine over a [`ClipMixer`]
pub struct AnimationSequencer {
    config: SequencerConfig,
    mixer: ClipMixer,
    greeting: Option<Clip>,
    idle: Option<Clip>,
    loads: Vec<(ClipRole, ClipLoad)>,
    actions: Vec<(ClipRole, ActionId)>,
    state: Option<ClipState>,
    /// Outgoing action of the running crossfade
    fading_out: Option<ActionId>,
    thinking: ThinkingSchedule,
    rolls: Box<dyn RollSource>,
    disposed: bool,
}

impl AnimationSequencer {
    pub fn new(config: &SequencerConfig, rolls: Box<dyn RollSource>) -> Self {
        Self {
            config: config.clone(),
            mixer: ClipMixer::new(),
            greeting: None,
            idle: None,
            loads: Vec::new(),
            actions: Vec::new(),
            state: None,
            fading_out: None,
            thinking: ThinkingSchedule::default(),
            rolls,
            disposed: false,
        }
    }

    /// Register an in-flight clip load; it is polled on every `advance`.
    pub fn expect_clip(&mut self, role: ClipRole, load: ClipLoad) {
        if self.disposed {
            return;
        }
        self.loads.push((role, load));
    }

    /// Provide a loaded clip. Playback starts once both clips are present.
    pub fn attach_clip(&mut self, role: ClipRole, clip: Clip) {
        if self.disposed {
            return;
        }
        if self.state.is_some() {
            tracing::warn!("Sequencer already started, ignoring {} clip '{}'", role, clip.name());
            return;
        }

        tracing::debug!("{} clip '{}' ready ({:.2}s)", role, clip.name(), clip.duration());
        match role {
            ClipRole::Greeting => self.greeting = Some(clip),
            ClipRole::Idle => self.idle = Some(clip),
        }
        self.try_start();
    }

    fn try_start(&mut self) {
        let (Some(greeting), Some(idle)) = (self.greeting.clone(), self.idle.clone()) else {
            return;
        };

        let greeting_id = self.mixer.clip_action(greeting);
        self.mixer.set_loop(greeting_id, LoopMode::Once);
        self.mixer.set_clamp_when_finished(greeting_id, true);

        let idle_id = self.mixer.clip_action(idle);
        self.mixer.set_loop(idle_id, LoopMode::Repeat);

        self.mixer.play(greeting_id);
        self.actions = vec![(ClipRole::Greeting, greeting_id), (ClipRole::Idle, idle_id)];
        self.state = Some(ClipState {
            active: greeting_id,
            pending: Some(idle_id),
            phase: Phase::SoloPlaying,
        });
        tracing::info!("Animations loaded, playing greeting");
    }

    fn poll_loads(&mut self) {
        if self.loads.is_empty() {
            return;
        }

        let mut ready = Vec::new();
        self.loads.retain_mut(|(role, rx)| match rx.try_recv() {
            Ok(Ok(clip)) => {
                ready.push((*role, clip));
                false
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to load {} clip: {}", role, e);
                false
            }
            Err(oneshot::error::TryRecvError::Empty) => true,
            Err(oneshot::error::TryRecvError::Closed) => {
                tracing::warn!("{} clip loader dropped without a result", role);
                false
            }
        });

        for (role, clip) in ready {
            self.attach_clip(role, clip);
        }
    }

    /// Advance playback by `dt` seconds and return the expression cues raised
    /// during this frame. A no-op until both clips are loaded.
    pub fn advance(&mut self, dt: f32) -> Vec<EmotionCommand> {
        let mut cues = Vec::new();
        if self.disposed {
            return cues;
        }

        self.poll_loads();
        if self.state.is_none() {
            return cues;
        }

        // the frame that completes a crossfade does not count toward the
        // thinking period
        let was_steady = self.phase() == Some(Phase::SteadyLoop);

        for event in self.mixer.update(dt) {
            match event {
                MixerEvent::Finished { action, clip } => self.on_finished(action, &clip),
            }
        }

        if let Some(outgoing) = self.fading_out {
            if !self.mixer.is_running(outgoing) {
                self.fading_out = None;
                self.thinking = ThinkingSchedule::default();
                if let Some(state) = self.state.as_mut() {
                    state.phase = Phase::SteadyLoop;
                }
                tracing::info!("Crossfade complete, looping idle");
            }
        }

        if was_steady && self.config.thinking_enabled {
            self.advance_thinking(dt, &mut cues);
        }

        cues
    }

    fn on_finished(&mut self, action: ActionId, clip: &str) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if state.active != action {
            tracing::debug!("Ignoring finish of inactive clip '{}'", clip);
            return;
        }
        let Some(next) = state.pending.take() else {
            tracing::debug!("Clip '{}' finished with nothing pending", clip);
            return;
        };

        let window = self.config.crossfade_secs;
        self.mixer.fade_out(action, window);
        self.mixer.reset(next);
        self.mixer.fade_in(next, window);
        self.mixer.play(next);

        state.active = next;
        state.phase = Phase::Crossfading;
        self.fading_out = Some(action);

        let next_name = self.mixer.clip(next).map(|c| c.name()).unwrap_or_default();
        tracing::info!("Clip '{}' finished, crossfading to '{}'", clip, next_name);
    }

    fn advance_thinking(&mut self, dt: f32, cues: &mut Vec<EmotionCommand>) {
        let cfg = &self.config;

        // the period clock is paused while a cue is held and restarts with
        // the neutral cue
        if let Some(left) = self.thinking.dwell_left.as_mut() {
            *left -= dt;
            if *left <= 0.0 {
                self.thinking = ThinkingSchedule::default();
                cues.push(EmotionCommand::new(EmotionProfile::Neutral, 1.0));
                tracing::debug!("Thinking dwell over, back to neutral");
            }
            return;
        }

        self.thinking.since_roll += dt;
        while self.thinking.since_roll >= cfg.thinking_period {
            self.thinking.since_roll -= cfg.thinking_period;

            let roll = self.rolls.roll();
            if roll > cfg.thinking_threshold {
                cues.push(EmotionCommand::new(
                    EmotionProfile::Thinking,
                    cfg.thinking_intensity,
                ));
                self.thinking = ThinkingSchedule {
                    since_roll: 0.0,
                    dwell_left: Some(cfg.thinking_dwell),
                };
                tracing::debug!("Thinking cue (roll {:.3})", roll);
                break;
            }
        }
    }

    /// Stop every action and drop all clip state. The sequencer stays idle
    /// afterwards.
    pub fn dispose(&mut self) {
        self.mixer.stop_all();
        self.state = None;
        self.fading_out = None;
        self.greeting = None;
        self.idle = None;
        self.loads.clear();
        self.actions.clear();
        self.thinking = ThinkingSchedule::default();
        self.disposed = true;
        tracing::debug!("Animation sequencer disposed");
    }

    pub fn phase(&self) -> Option<Phase> {
        self.state.map(|s| s.phase)
    }

    pub fn clip_state(&self) -> Option<ClipState> {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state.is_some()
    }

    /// True while a thinking cue is being held
    pub fn is_thinking(&self) -> bool {
        self.thinking.dwell_left.is_some()
    }

    /// Current mixer weight of a role's clip
    pub fn clip_weight(&self, role: ClipRole) -> f32 {
        self.action_for(role)
            .map(|id| self.mixer.weight(id))
            .unwrap_or(0.0)
    }

    pub fn action_for(&self, role: ClipRole) -> Option<ActionId> {
        self.actions
            .iter()
            .find(|(r, _)| *r == role)
            .map(|&(_, id)| id)
    }

    pub fn mixer(&self) -> &ClipMixer {
        &self.mixer
    }
}

impl std::fmt::Debug for AnimationSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationSequencer")
            .field("state", &self.state)
            .field("pending_loads", &self.loads.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}
