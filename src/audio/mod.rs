//! Audio output abstraction and the effect graph built on top of it.
//!
//! An [`AudioOutput`] owns processing nodes on behalf of the caller and plays
//! the session's asset through them. Node handles are plain ids; the
//! [`graph::EffectGraph`] wrapper is what guarantees they are released.

pub mod command;
pub mod graph;
pub mod silent;

use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

/// Handle to a node owned by an [`AudioOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

/// Waveform of an oscillator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Sawtooth,
}

/// Everything the effect graph can ask an output to create.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSpec {
    /// The session's media, optionally from a file.
    Source { asset: Option<PathBuf> },
    /// Wave shaper with an atan-style curve.
    Distortion { amount: f32, oversample: u8 },
    Bandpass { frequency: f32, q: f32 },
    Highpass { frequency: f32, q: f32 },
    /// Convolution reverb with a decaying noise impulse.
    Reverb { seconds: f32 },
    StereoPanner,
    Oscillator { waveform: Waveform, frequency: f32 },
    /// Colored noise generator.
    Noise,
    Gain { value: f32 },
    Destination,
}

impl NodeSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeSpec::Source { .. } => "source",
            NodeSpec::Distortion { .. } => "distortion",
            NodeSpec::Bandpass { .. } => "bandpass",
            NodeSpec::Highpass { .. } => "highpass",
            NodeSpec::Reverb { .. } => "reverb",
            NodeSpec::StereoPanner => "panner",
            NodeSpec::Oscillator { .. } => "oscillator",
            NodeSpec::Noise => "noise",
            NodeSpec::Gain { .. } => "gain",
            NodeSpec::Destination => "destination",
        }
    }
}

/// Where a connection lands on the receiving node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// The node's audio input.
    Signal,
    /// Modulates one of the node's parameters.
    Param(Param),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Gain,
    Frequency,
    Pan,
}

/// Linear ramp target: reach `value` at `offset` after the automation starts.
/// A point with a zero offset sets the value immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampPoint {
    pub value: f32,
    pub offset: Duration,
}

impl RampPoint {
    pub fn at(value: f32, offset_secs: f32) -> Self {
        Self {
            value,
            offset: Duration::from_secs_f32(offset_secs),
        }
    }
}

/// Called exactly once when playback ends, with the failure reason if any.
pub type Completion = Box<dyn FnOnce(Result<(), String>) + Send + 'static>;

/// What to play and for how long.
pub struct PlaybackRequest {
    pub source: NodeId,
    pub started: DateTime<Local>,
    pub length: Duration,
    pub completion: Completion,
}

/// A sound backend able to host the effect graph.
///
/// All methods take `&self`; implementations keep their own interior state so
/// a single output can be shared between the scheduler and worker threads.
pub trait AudioOutput: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether playback can start at all (asset present, player available).
    fn is_ready(&self) -> bool;

    fn create_node(&self, spec: NodeSpec) -> Result<NodeId>;

    fn connect(&self, from: NodeId, to: NodeId, input: Input) -> Result<()>;

    fn automate(&self, node: NodeId, param: Param, points: &[RampPoint]) -> Result<()>;

    /// Disconnect and free a node. Unknown ids are ignored.
    fn release(&self, node: NodeId);

    /// Nodes created and not yet released.
    fn live_nodes(&self) -> usize;

    /// Start playing. On `Err` the completion is never called.
    fn begin_playback(&self, request: PlaybackRequest) -> Result<()>;

    /// Stop whatever is playing. The pending completion may still fire.
    fn stop_playback(&self);

    /// Give time-driven outputs a chance to notice that playback ended.
    fn poll(&self, _now: DateTime<Local>) {}
}

/// Build the output named by `audio_output`.
pub fn from_config(config: &Config, debug_enabled: bool) -> Arc<dyn AudioOutput> {
    match config.audio_output() {
        "silent" => Arc::new(silent::SilentOutput::new()),
        _ => Arc::new(command::CommandOutput::new(
            config.player(),
            config.asset(),
            debug_enabled,
        )),
    }
}
