//! Clip mixer.
//!
//! Owns one action per bound clip, advances play cursors and weight fades on
//! every update, and reports one-shot clips that reached their end.

use crate::error::AnimationError;

/// A playable animation resource
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    name: String,
    /// Length in seconds
    duration: f32,
}

impl Clip {
    pub fn new(name: &str, duration: f32) -> Result<Self, AnimationError> {
        if !(duration > 0.0) || !duration.is_finite() {
            return Err(AnimationError::InvalidClip {
                name: name.to_string(),
                message: format!("duration must be positive, got {}", duration),
            });
        }
        Ok(Self {
            name: name.to_string(),
            duration,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }
}

/// How an action behaves when its cursor reaches the clip end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Play once and emit a finished event
    Once,
    /// Wrap around forever; never finishes
    Repeat,
}

/// Handle to an action owned by a [`ClipMixer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(usize);

/// Emitted by [`ClipMixer::update`]
#[derive(Debug, Clone, PartialEq)]
pub enum MixerEvent {
    /// A `LoopMode::Once` action reached the end of its clip
    Finished { action: ActionId, clip: String },
}

#[derive(Debug, Clone, Copy)]
struct Fade {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

impl Fade {
    fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        }
    }

    fn weight(&self) -> f32 {
        self.from + (self.to - self.from) * self.progress()
    }
}

#[derive(Debug, Clone)]
struct ClipAction {
    clip: Clip,
    loop_mode: LoopMode,
    clamp_when_finished: bool,
    /// Play cursor in seconds
    time: f32,
    weight: f32,
    fade: Option<Fade>,
    running: bool,
    finished: bool,
}

/// Time-driven playback of bound clips
#[derive(Debug, Clone, Default)]
pub struct ClipMixer {
    actions: Vec<ClipAction>,
    /// Total time advanced so far
    time: f32,
}

impl ClipMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a clip and return a new action for it. Every bind gets its own
    /// action, even for clips sharing a name.
    pub fn clip_action(&mut self, clip: Clip) -> ActionId {
        self.actions.push(ClipAction {
            clip,
            loop_mode: LoopMode::Repeat,
            clamp_when_finished: false,
            time: 0.0,
            weight: 1.0,
            fade: None,
            running: false,
            finished: false,
        });
        ActionId(self.actions.len() - 1)
    }

    pub fn set_loop(&mut self, id: ActionId, mode: LoopMode) {
        if let Some(a) = self.action_mut(id) {
            a.loop_mode = mode;
        }
    }

    /// Hold the last frame after a one-shot finishes instead of disabling
    pub fn set_clamp_when_finished(&mut self, id: ActionId, clamp: bool) {
        if let Some(a) = self.action_mut(id) {
            a.clamp_when_finished = clamp;
        }
    }

    pub fn play(&mut self, id: ActionId) {
        if let Some(a) = self.action_mut(id) {
            a.running = true;
        }
    }

    /// Rewind the cursor and cancel any fade. The weight is left as is.
    pub fn reset(&mut self, id: ActionId) {
        if let Some(a) = self.action_mut(id) {
            a.time = 0.0;
            a.finished = false;
            a.fade = None;
        }
    }

    /// Ramp the weight from 0 to 1 over `duration` seconds
    pub fn fade_in(&mut self, id: ActionId, duration: f32) {
        if let Some(a) = self.action_mut(id) {
            a.weight = 0.0;
            a.fade = Some(Fade {
                from: 0.0,
                to: 1.0,
                elapsed: 0.0,
                duration,
            });
        }
    }

    /// Ramp the weight from its current value to 0 over `duration` seconds.
    /// The action stops when the fade completes.
    pub fn fade_out(&mut self, id: ActionId, duration: f32) {
        if let Some(a) = self.action_mut(id) {
            a.fade = Some(Fade {
                from: a.weight,
                to: 0.0,
                elapsed: 0.0,
                duration,
            });
        }
    }

    pub fn stop(&mut self, id: ActionId) {
        if let Some(a) = self.action_mut(id) {
            Self::stop_action(a);
        }
    }

    pub fn stop_all(&mut self) {
        for a in &mut self.actions {
            Self::stop_action(a);
        }
    }

    fn stop_action(a: &mut ClipAction) {
        a.running = false;
        a.finished = false;
        a.fade = None;
        a.time = 0.0;
    }

    /// Advance every running action by `dt` seconds.
    pub fn update(&mut self, dt: f32) -> Vec<MixerEvent> {
        let mut events = Vec::new();
        self.time += dt;

        for (i, a) in self.actions.iter_mut().enumerate() {
            if !a.running {
                continue;
            }

            if let Some(mut fade) = a.fade {
                fade.elapsed += dt;
                a.weight = fade.weight();
                if fade.progress() >= 1.0 {
                    a.fade = None;
                    if fade.to == 0.0 {
                        Self::stop_action(a);
                        continue;
                    }
                } else {
                    a.fade = Some(fade);
                }
            }

            if a.finished {
                continue;
            }

            a.time += dt;
            let duration = a.clip.duration;
            match a.loop_mode {
                LoopMode::Repeat => {
                    if a.time >= duration {
                        a.time = a.time.rem_euclid(duration);
                    }
                }
                LoopMode::Once => {
                    if a.time >= duration {
                        a.time = duration;
                        a.finished = true;
                        if !a.clamp_when_finished {
                            a.running = false;
                        }
                        events.push(MixerEvent::Finished {
                            action: ActionId(i),
                            clip: a.clip.name.clone(),
                        });
                    }
                }
            }
        }

        events
    }

    /// Effective weight; 0 for actions that are not running
    pub fn weight(&self, id: ActionId) -> f32 {
        match self.action(id) {
            Some(a) if a.running => a.weight,
            _ => 0.0,
        }
    }

    /// Play cursor of an action
    pub fn action_time(&self, id: ActionId) -> f32 {
        self.action(id).map(|a| a.time).unwrap_or(0.0)
    }

    pub fn is_running(&self, id: ActionId) -> bool {
        self.action(id).map(|a| a.running).unwrap_or(false)
    }

    pub fn is_fading(&self, id: ActionId) -> bool {
        self.action(id).map(|a| a.fade.is_some()).unwrap_or(false)
    }

    pub fn clip(&self, id: ActionId) -> Option<&Clip> {
        self.action(id).map(|a| &a.clip)
    }

    pub fn loop_mode(&self, id: ActionId) -> Option<LoopMode> {
        self.action(id).map(|a| a.loop_mode)
    }

    /// Total time advanced
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    fn action(&self, id: ActionId) -> Option<&ClipAction> {
        self.actions.get(id.0)
    }

    fn action_mut(&mut self, id: ActionId) -> Option<&mut ClipAction> {
        self.actions.get_mut(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(name: &str, duration: f32) -> Clip {
        Clip::new(name, duration).unwrap()
    }

    #[test]
    fn test_clip_rejects_bad_duration() {
        assert!(Clip::new("x", 0.0).is_err());
        assert!(Clip::new("x", -1.0).is_err());
        assert!(Clip::new("x", f32::NAN).is_err());
        assert!(Clip::new("x", f32::INFINITY).is_err());
    }

    #[test]
    fn test_each_bind_gets_own_action() {
        let mut mixer = ClipMixer::new();
        let a = mixer.clip_action(clip("wave", 1.0));
        let b = mixer.clip_action(clip("wave", 1.0));
        assert_ne!(a, b);
        assert_eq!(mixer.action_count(), 2);

        mixer.set_loop(a, LoopMode::Once);
        mixer.set_loop(b, LoopMode::Repeat);
        assert_eq!(mixer.loop_mode(a), Some(LoopMode::Once));
        assert_eq!(mixer.loop_mode(b), Some(LoopMode::Repeat));
    }

    #[test]
    fn test_once_finishes_exactly_once() {
        let mut mixer = ClipMixer::new();
        let id = mixer.clip_action(clip("wave", 1.0));
        mixer.set_loop(id, LoopMode::Once);
        mixer.set_clamp_when_finished(id, true);
        mixer.play(id);

        assert!(mixer.update(0.5).is_empty());
        let events = mixer.update(0.5);
        assert_eq!(
            events,
            vec![MixerEvent::Finished {
                action: id,
                clip: "wave".to_string()
            }]
        );
        // clamped: holds the last frame at full weight
        assert_eq!(mixer.action_time(id), 1.0);
        assert_eq!(mixer.weight(id), 1.0);
        assert!(mixer.update(0.5).is_empty());
        assert!(mixer.update(5.0).is_empty());
    }

    #[test]
    fn test_once_without_clamp_disables() {
        let mut mixer = ClipMixer::new();
        let id = mixer.clip_action(clip("wave", 1.0));
        mixer.set_loop(id, LoopMode::Once);
        mixer.play(id);

        assert_eq!(mixer.update(1.5).len(), 1);
        assert!(!mixer.is_running(id));
        assert_eq!(mixer.weight(id), 0.0);
    }

    #[test]
    fn test_repeat_never_finishes() {
        let mut mixer = ClipMixer::new();
        let id = mixer.clip_action(clip("idle", 1.0));
        mixer.set_loop(id, LoopMode::Repeat);
        mixer.play(id);

        for _ in 0..20 {
            assert!(mixer.update(0.25).is_empty());
        }
        assert!(mixer.update(0.75).is_empty());
        assert!((mixer.action_time(id) - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_unplayed_action_does_not_advance() {
        let mut mixer = ClipMixer::new();
        let id = mixer.clip_action(clip("idle", 1.0));
        mixer.update(0.5);
        assert_eq!(mixer.action_time(id), 0.0);
        assert_eq!(mixer.weight(id), 0.0);
        assert_eq!(mixer.time(), 0.5);
    }

    #[test]
    fn test_fades_are_linear_and_complementary() {
        let mut mixer = ClipMixer::new();
        let out = mixer.clip_action(clip("a", 10.0));
        let inc = mixer.clip_action(clip("b", 10.0));
        mixer.play(out);

        mixer.fade_out(out, 1.0);
        mixer.reset(inc);
        mixer.fade_in(inc, 1.0);
        mixer.play(inc);

        mixer.update(0.25);
        assert!((mixer.weight(out) - 0.75).abs() < 1e-6);
        assert!((mixer.weight(inc) - 0.25).abs() < 1e-6);
        assert!(mixer.weight(out) + mixer.weight(inc) <= 1.0 + 1e-6);

        mixer.update(0.75);
        assert_eq!(mixer.weight(out), 0.0);
        assert_eq!(mixer.weight(inc), 1.0);
        assert!(!mixer.is_running(out));
        assert!(!mixer.is_fading(inc));
    }

    #[test]
    fn test_reset_rewinds_and_cancels_fade() {
        let mut mixer = ClipMixer::new();
        let id = mixer.clip_action(clip("a", 2.0));
        mixer.play(id);
        mixer.update(1.0);
        mixer.fade_out(id, 1.0);
        mixer.reset(id);
        assert_eq!(mixer.action_time(id), 0.0);
        assert!(!mixer.is_fading(id));
    }

    #[test]
    fn test_stop_all() {
        let mut mixer = ClipMixer::new();
        let a = mixer.clip_action(clip("a", 2.0));
        let b = mixer.clip_action(clip("b", 2.0));
        mixer.play(a);
        mixer.play(b);
        mixer.stop_all();
        assert!(!mixer.is_running(a));
        assert!(!mixer.is_running(b));
        assert!(mixer.update(5.0).is_empty());
    }
}
