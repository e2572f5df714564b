//! Persona3D - headless avatar engine host
//!
//! Runs the expression blender and animation sequencer against a built-in
//! demo head mesh, loading clips asynchronously and pacing frames in real
//! time.

use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use persona3d::{
    animation::{Clip, ClipRole, RandomRolls},
    avatar::{HeadMeshResolver, SceneNode},
    config::{ClipSpec, Config},
    AvatarEngine,
};

/// ARKit blendshape set exposed by the demo head mesh
const ARKIT_CHANNELS: &[&str] = &[
    "browDownLeft", "browDownRight", "browInnerUp", "browOuterUpLeft", "browOuterUpRight",
    "cheekPuff", "cheekSquintLeft", "cheekSquintRight",
    "eyeBlinkLeft", "eyeBlinkRight", "eyeLookDownLeft", "eyeLookDownRight",
    "eyeLookInLeft", "eyeLookInRight", "eyeLookOutLeft", "eyeLookOutRight",
    "eyeLookUpLeft", "eyeLookUpRight", "eyeSquintLeft", "eyeSquintRight",
    "eyeWideLeft", "eyeWideRight",
    "jawForward", "jawLeft", "jawOpen", "jawRight",
    "mouthClose", "mouthDimpleLeft", "mouthDimpleRight", "mouthFrownLeft", "mouthFrownRight",
    "mouthFunnel", "mouthLeft", "mouthLowerDownLeft", "mouthLowerDownRight",
    "mouthPressLeft", "mouthPressRight", "mouthPucker", "mouthRight",
    "mouthRollLower", "mouthRollUpper", "mouthShrugLower", "mouthShrugUpper",
    "mouthSmileLeft", "mouthSmileRight", "mouthStretchLeft", "mouthStretchRight",
    "mouthUpperUpLeft", "mouthUpperUpRight", "noseSneerLeft", "noseSneerRight", "tongueOut",
];

/// Persona3D - facial expression and animation engine host
#[derive(Parser, Debug)]
#[command(name = "persona3d", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 900)]
    frames: u64,

    /// Frame rate in Hz
    #[arg(long, default_value_t = 60.0)]
    fps: f32,

    /// Emotion to apply, as NAME or NAME:INTENSITY (repeat to blend)
    #[arg(short, long)]
    emotion: Vec<String>,

    /// Seed for the thinking interjection rolls
    #[arg(long)]
    seed: Option<u64>,

    /// Print final channel weights as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", persona3d::NAME, persona3d::VERSION);

    let config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };
    config.validate()?;

    let period = frame_period(args.fps)?;
    let emotions = args
        .emotion
        .iter()
        .map(|s| parse_emotion_arg(s))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let rolls = match args.seed {
        Some(seed) => RandomRolls::seeded(seed),
        None => RandomRolls::from_entropy(),
    };
    let mut engine = AvatarEngine::new(&config, Box::new(rolls));

    let scene = demo_scene();
    if !engine.attach_scene(&HeadMeshResolver::new(&scene, &config.scene.mesh_hint)) {
        warn!("Running without facial expressions");
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let latency = Duration::from_millis(config.clips.load_latency_ms);
    for (role, entry) in [
        (ClipRole::Greeting, config.clips.greeting.clone()),
        (ClipRole::Idle, config.clips.idle.clone()),
    ] {
        let (tx, rx) = oneshot::channel();
        engine.expect_clip(role, rx);
        runtime.spawn(load_clip(entry, latency, tx));
    }

    match emotions.as_slice() {
        [] => {}
        [(name, intensity)] => engine.controller().set_emotion(name, *intensity)?,
        many => {
            let entries: Vec<(&str, f32)> =
                many.iter().map(|(n, i)| (n.as_str(), *i)).collect();
            engine.blend_emotions_by_name(&entries)?;
        }
    }

    let dt = 1.0 / args.fps;
    runtime.block_on(async {
        let mut ticker = tokio::time::interval(period);
        let mut last_phase = None;

        for frame in 0..args.frames {
            ticker.tick().await;
            let report = engine.advance(dt);

            if report.phase != last_phase {
                if let Some(phase) = report.phase {
                    info!("Frame {}: phase {}", frame, phase);
                }
                last_phase = report.phase;
            }
            for cue in &report.cues {
                info!(
                    "Frame {}: sequencer cue {} ({:.2})",
                    frame, cue.profile, cue.intensity
                );
            }
            if report.weights_changed && frame % args.fps.max(1.0) as u64 == 0 {
                debug!("Frame {}: weights updated", frame);
            }
        }
    });

    let weights: BTreeMap<String, f32> = engine
        .channels()
        .map(|table| {
            table
                .iter()
                .filter(|&(_, w)| w > 0.0)
                .map(|(n, w)| (n.to_string(), w))
                .collect()
        })
        .unwrap_or_default();

    engine.dispose();
    runtime.shutdown_timeout(Duration::from_millis(500));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&weights)?);
    } else {
        info!("{} active channels at exit", weights.len());
    }

    info!("Persona3D stopped");
    Ok(())
}

/// Wall-clock length of one frame at `fps`
fn frame_period(fps: f32) -> anyhow::Result<Duration> {
    if !(fps > 0.0) {
        anyhow::bail!("--fps must be greater than 0");
    }
    let period = Duration::try_from_secs_f32(1.0 / fps)
        .map_err(|e| anyhow::anyhow!("--fps {} gives an unusable frame period: {}", fps, e))?;
    if period.is_zero() {
        anyhow::bail!("--fps {} is too high", fps);
    }
    Ok(period)
}

/// Parse `NAME` or `NAME:INTENSITY`
fn parse_emotion_arg(s: &str) -> anyhow::Result<(String, f32)> {
    match s.split_once(':') {
        Some((name, intensity)) => {
            let intensity: f32 = intensity
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid intensity in '{}': {}", s, e))?;
            Ok((name.trim().to_string(), intensity))
        }
        None => Ok((s.trim().to_string(), 1.0)),
    }
}

/// Resolve a clip after a simulated load delay
async fn load_clip(
    entry: ClipSpec,
    latency: Duration,
    tx: oneshot::Sender<Result<Clip, persona3d::error::AnimationError>>,
) {
    tokio::time::sleep(latency).await;
    let clip = Clip::new(&entry.name, entry.duration);
    if tx.send(clip).is_err() {
        debug!("Clip '{}' loaded after the engine went away", entry.name);
    }
}

/// Armature with a body mesh and a head mesh carrying the ARKit channels
fn demo_scene() -> SceneNode {
    SceneNode::group("Armature")
        .with_child(SceneNode::mesh("Wolf3D_Body", &["bodyMorph"]))
        .with_child(SceneNode::group("Hips").with_child(
            SceneNode::group("Neck").with_child(SceneNode::mesh("Wolf3D_Head", ARKIT_CHANNELS)),
        ))
}
