//! Expression blender.
//!
//! Turns emotion commands into per-channel targets and eases the mesh's
//! morph weights toward them one frame at a time. Channels without a target
//! decay back to zero at the same rate.

use crate::config::ExpressionConfig;
use crate::error::EmotionError;

use super::channels::{ChannelTable, SceneResolver};
use super::profile::EmotionCommand;

/// Per-frame morph weight interpolator bound to one channel table.
#[derive(Debug, Clone)]
pub struct ExpressionBlender {
    /// Discovered channel table; `None` keeps every operation a no-op
    channels: Option<ChannelTable>,
    /// Target weight per slot, `None` for channels decaying to zero
    targets: Vec<Option<f32>>,
    /// Fraction of the remaining distance closed per frame
    rate: f32,
    /// Snap threshold
    epsilon: f32,
    /// Set once discovery ran, successful or not
    discovery_done: bool,
}

impl ExpressionBlender {
    pub fn new(config: &ExpressionConfig) -> Self {
        Self {
            channels: None,
            targets: Vec::new(),
            rate: config.rate,
            epsilon: config.epsilon,
            discovery_done: false,
        }
    }

    /// Run scene discovery. Only the first call has any effect.
    ///
    /// Returns whether a channel table is available afterwards.
    pub fn attach(&mut self, resolver: &dyn SceneResolver) -> bool {
        if self.discovery_done {
            tracing::warn!("Channel discovery already ran, ignoring attach");
            return self.is_ready();
        }
        self.discovery_done = true;

        match resolver.resolve() {
            Some(table) => {
                tracing::info!("Avatar head mesh found with {} morph targets", table.len());
                self.targets = vec![None; table.len()];
                self.channels = Some(table);
                true
            }
            None => {
                tracing::warn!("Could not find head mesh with morph targets, expressions disabled");
                false
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.channels.is_some()
    }

    /// Replace the whole target set with one profile scaled by intensity.
    pub fn set_emotion(&mut self, command: EmotionCommand) -> Result<(), EmotionError> {
        command.validate()?;

        let Some(table) = self.channels.as_ref() else {
            return Ok(());
        };

        let mut targets = vec![None; table.len()];
        for (name, weight) in command.contributions() {
            match table.index_of(name) {
                Some(slot) => targets[slot] = Some(weight.clamp(0.0, 1.0)),
                None => tracing::trace!("Mesh has no channel '{}', dropped", name),
            }
        }
        self.targets = targets;

        if let Some(rate) = command.rate {
            self.rate = rate;
        }

        tracing::debug!(
            "Expression set to {} at {:.2} (rate {:.3})",
            command.profile,
            command.intensity,
            self.rate
        );
        Ok(())
    }

    /// Superimpose several profiles: per-channel sums, clamped to [0, 1].
    ///
    /// Every command is validated before any target changes. Rates carried by
    /// the commands are ignored.
    pub fn blend_emotions(&mut self, commands: &[EmotionCommand]) -> Result<(), EmotionError> {
        for command in commands {
            command.validate()?;
        }

        let Some(table) = self.channels.as_ref() else {
            return Ok(());
        };

        let mut sums: Vec<Option<f32>> = vec![None; table.len()];
        for command in commands {
            for (name, weight) in command.contributions() {
                if let Some(slot) = table.index_of(name) {
                    *sums[slot].get_or_insert(0.0) += weight;
                }
            }
        }
        self.targets = sums
            .into_iter()
            .map(|sum| sum.map(|w| w.clamp(0.0, 1.0)))
            .collect();

        tracing::debug!("Blended {} expressions", commands.len());
        Ok(())
    }

    /// Advance the interpolation by one frame and write into the channel table.
    ///
    /// The step is per frame, so `_dt` is not used. Returns whether any
    /// channel weight changed.
    pub fn advance(&mut self, _dt: f32) -> bool {
        let Some(table) = self.channels.as_mut() else {
            return false;
        };

        let rate = self.rate;
        let epsilon = self.epsilon;
        let mut changed = false;

        for (slot, current) in table.weights_mut().iter_mut().enumerate() {
            let limit = self.targets[slot].unwrap_or(0.0);
            if *current == limit {
                continue;
            }

            let mut next = *current + (limit - *current) * rate;
            if (limit - next).abs() < epsilon {
                next = limit;
            }
            *current = next.clamp(0.0, 1.0);
            changed = true;
        }

        changed
    }

    /// Drop all targets and zero every weight immediately.
    pub fn reset(&mut self) {
        if let Some(table) = self.channels.as_mut() {
            table.weights_mut().fill(0.0);
            self.targets.fill(None);
        }
    }

    /// True once every channel sits exactly on its limit
    pub fn is_converged(&self) -> bool {
        match &self.channels {
            Some(table) => table
                .weights()
                .iter()
                .zip(&self.targets)
                .all(|(&w, t)| w == t.unwrap_or(0.0)),
            None => true,
        }
    }

    /// Current weight of a channel
    pub fn weight(&self, name: &str) -> Option<f32> {
        self.channels.as_ref()?.weight(name)
    }

    /// Target of a channel; `None` when the channel is decaying or unknown
    pub fn target(&self, name: &str) -> Option<f32> {
        let slot = self.channels.as_ref()?.index_of(name)?;
        self.targets[slot]
    }

    pub fn weights(&self) -> &[f32] {
        self.channels.as_ref().map(|t| t.weights()).unwrap_or(&[])
    }

    pub fn channels(&self) -> Option<&ChannelTable> {
        self.channels.as_ref()
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::channels::StaticResolver;
    use crate::avatar::EmotionProfile;

    const ARKIT: &[&str] = &[
        "browDownLeft",
        "browDownRight",
        "browInnerUp",
        "browOuterUpRight",
        "cheekSquintLeft",
        "cheekSquintRight",
        "eyeLookDownLeft",
        "eyeLookDownRight",
        "eyeSquintLeft",
        "eyeSquintRight",
        "eyeWideLeft",
        "eyeWideRight",
        "jawForward",
        "jawLeft",
        "jawOpen",
        "mouthClose",
        "mouthDimpleRight",
        "mouthFrownLeft",
        "mouthFrownRight",
        "mouthFunnel",
        "mouthPressLeft",
        "mouthPressRight",
        "mouthShrugLower",
        "noseSneerLeft",
        "noseSneerRight",
    ];

    fn blender_with(names: &[&str]) -> ExpressionBlender {
        let mut blender = ExpressionBlender::new(&ExpressionConfig::default());
        assert!(blender.attach(&StaticResolver(ChannelTable::from_names(names))));
        blender
    }

    fn settle(blender: &mut ExpressionBlender) {
        for _ in 0..1000 {
            if !blender.advance(1.0 / 60.0) {
                break;
            }
        }
        assert!(blender.is_converged());
    }

    fn cmd(profile: EmotionProfile, intensity: f32) -> EmotionCommand {
        EmotionCommand::new(profile, intensity)
    }

    #[test]
    fn test_profiles_settle_to_scaled_weights() {
        for profile in EmotionProfile::ALL {
            for intensity in [0.0, 0.3, 0.8, 1.0] {
                let mut blender = blender_with(ARKIT);
                // start from a different expression so stale channels must decay
                blender.set_emotion(cmd(EmotionProfile::Angry, 1.0)).unwrap();
                settle(&mut blender);

                blender.set_emotion(cmd(profile, intensity)).unwrap();
                settle(&mut blender);

                for name in ARKIT {
                    let expected = profile.base_weight(name).unwrap_or(0.0) * intensity;
                    let actual = blender.weight(name).unwrap();
                    assert!(
                        (actual - expected).abs() < 0.001,
                        "{} {} at {}: expected {}, got {}",
                        profile,
                        name,
                        intensity,
                        expected,
                        actual
                    );
                }
            }
        }
    }

    #[test]
    fn test_neutral_converges_to_zero() {
        let mut blender = blender_with(ARKIT);
        blender
            .blend_emotions(&[cmd(EmotionProfile::Sad, 1.0), cmd(EmotionProfile::Surprised, 0.7)])
            .unwrap();
        for _ in 0..20 {
            blender.advance(0.016);
        }

        blender.set_emotion(cmd(EmotionProfile::Neutral, 1.0)).unwrap();
        settle(&mut blender);
        assert!(blender.weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_blend_sums_shared_channels() {
        let mut blender = blender_with(ARKIT);
        blender
            .blend_emotions(&[cmd(EmotionProfile::Happy, 1.0), cmd(EmotionProfile::Sad, 1.0)])
            .unwrap();

        // 0.4 + 0.72 clamps to 1.0
        assert_eq!(blender.target("eyeSquintLeft"), Some(1.0));
        // 0.17 + 0.452
        let brow = blender.target("browInnerUp").unwrap();
        assert!((brow - 0.622).abs() < 1e-5, "browInnerUp target {}", brow);
        // only in SAD
        assert_eq!(blender.target("jawForward"), Some(1.0));
        // in neither
        assert_eq!(blender.target("jawOpen"), None);
    }

    #[test]
    fn test_blend_partial_intensities() {
        let mut blender = blender_with(ARKIT);
        blender
            .blend_emotions(&[cmd(EmotionProfile::Happy, 0.5), cmd(EmotionProfile::Thinking, 0.25)])
            .unwrap();
        // 0.17 * 0.5 + 1.0 * 0.25
        let brow = blender.target("browInnerUp").unwrap();
        assert!((brow - 0.335).abs() < 1e-5);
    }

    #[test]
    fn test_empty_blend_decays_everything() {
        let mut blender = blender_with(ARKIT);
        blender.set_emotion(cmd(EmotionProfile::Happy, 1.0)).unwrap();
        settle(&mut blender);

        blender.blend_emotions(&[]).unwrap();
        settle(&mut blender);
        assert!(blender.weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_distance_is_monotonic() {
        let mut blender = blender_with(ARKIT);
        blender.set_emotion(cmd(EmotionProfile::Angry, 0.9)).unwrap();

        let distance = |b: &ExpressionBlender| -> Vec<f32> {
            ARKIT
                .iter()
                .map(|n| (b.target(n).unwrap_or(0.0) - b.weight(n).unwrap()).abs())
                .collect()
        };

        let mut previous = distance(&blender);
        for _ in 0..300 {
            blender.advance(0.016);
            let now = distance(&blender);
            for (p, n) in previous.iter().zip(&now) {
                assert!(n <= p, "distance grew from {} to {}", p, n);
            }
            previous = now;
        }
    }

    #[test]
    fn test_first_step_uses_rate() {
        let mut blender = blender_with(&["jawOpen"]);
        blender
            .set_emotion(cmd(EmotionProfile::Surprised, 1.0).with_rate(0.5))
            .unwrap();
        assert!(blender.advance(0.016));
        let w = blender.weight("jawOpen").unwrap();
        assert!((w - 0.1755).abs() < 1e-6, "got {}", w);
        assert_eq!(blender.rate(), 0.5);
    }

    #[test]
    fn test_rate_persists_across_commands() {
        let mut blender = blender_with(ARKIT);
        blender
            .set_emotion(cmd(EmotionProfile::Happy, 1.0).with_rate(0.2))
            .unwrap();
        blender.set_emotion(cmd(EmotionProfile::Sad, 1.0)).unwrap();
        assert_eq!(blender.rate(), 0.2);
    }

    #[test]
    fn test_snaps_exactly_to_limit() {
        let mut blender = blender_with(&["browInnerUp"]);
        blender.set_emotion(cmd(EmotionProfile::Happy, 1.0)).unwrap();
        settle(&mut blender);
        assert_eq!(blender.weight("browInnerUp"), Some(0.17));
        // converged channels are not rewritten
        assert!(!blender.advance(0.016));
    }

    #[test]
    fn test_mesh_missing_channels() {
        let mut blender = blender_with(&["browInnerUp", "eyeSquintLeft"]);
        blender.set_emotion(cmd(EmotionProfile::Happy, 1.0)).unwrap();
        settle(&mut blender);

        assert!((blender.weight("browInnerUp").unwrap() - 0.17).abs() < 0.001);
        assert!((blender.weight("eyeSquintLeft").unwrap() - 0.4).abs() < 0.001);
        assert_eq!(blender.weight("mouthPressLeft"), None);
        assert_eq!(blender.target("mouthPressLeft"), None);
    }

    #[test]
    fn test_not_ready_is_noop() {
        let mut blender = ExpressionBlender::new(&ExpressionConfig::default());
        assert!(!blender.attach(&|| -> Option<ChannelTable> { None }));

        assert!(blender.set_emotion(cmd(EmotionProfile::Happy, 0.5)).is_ok());
        assert!(blender.blend_emotions(&[cmd(EmotionProfile::Sad, 0.5)]).is_ok());
        for _ in 0..10 {
            assert!(!blender.advance(0.016));
        }
        assert!(blender.weights().is_empty());
        assert_eq!(blender.weight("browInnerUp"), None);
        assert!(blender.is_converged());
    }

    #[test]
    fn test_attach_runs_once() {
        let mut blender = ExpressionBlender::new(&ExpressionConfig::default());
        assert!(!blender.attach(&|| -> Option<ChannelTable> { None }));
        // a later resolver is not consulted
        assert!(!blender.attach(&StaticResolver(ChannelTable::from_names(&["a"]))));
        assert!(!blender.is_ready());
    }

    #[test]
    fn test_invalid_input_rejected_without_side_effects() {
        let mut blender = blender_with(ARKIT);
        blender.set_emotion(cmd(EmotionProfile::Happy, 1.0)).unwrap();

        assert_eq!(
            blender.set_emotion(cmd(EmotionProfile::Sad, 1.5)),
            Err(EmotionError::IntensityOutOfRange(1.5))
        );
        assert!(blender
            .blend_emotions(&[cmd(EmotionProfile::Sad, 0.5), cmd(EmotionProfile::Angry, -1.0)])
            .is_err());

        // still targeting HAPPY
        assert_eq!(blender.target("mouthPressLeft"), Some(0.61));
        assert_eq!(blender.target("mouthFrownLeft"), None);
    }

    #[test]
    fn test_invalid_input_rejected_before_discovery() {
        let mut blender = ExpressionBlender::new(&ExpressionConfig::default());
        assert!(blender.set_emotion(cmd(EmotionProfile::Happy, 2.0)).is_err());
    }

    #[test]
    fn test_reset_zeroes_weights() {
        let mut blender = blender_with(ARKIT);
        blender.set_emotion(cmd(EmotionProfile::Angry, 1.0)).unwrap();
        blender.advance(0.016);
        blender.reset();
        assert!(blender.weights().iter().all(|&w| w == 0.0));
        assert!(blender.is_converged());
    }
}
