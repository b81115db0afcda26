//! The layered "radio transmission" effect graph.
//!
//! ```text
//! source → distortion → bandpass → highpass → reverb → panner → master → destination
//!                                              lfo → lfo gain ┘ (pan)     ↑
//!                              static oscillator + noise → static gain ──┘
//! ```
//!
//! Every node is owned by the graph and released when it is dropped. Building
//! goes through a partial graph that releases what it already created if a
//! later step fails, so no error path leaves nodes behind.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{
    AudioOutput, Completion, Input, NodeId, NodeSpec, Param, PlaybackRequest, RampPoint, Waveform,
};
use crate::common::constants::*;

/// Nodes created so far, released on drop unless handed to an [`EffectGraph`].
struct PartialGraph {
    output: Arc<dyn AudioOutput>,
    nodes: Vec<NodeId>,
}

impl PartialGraph {
    fn add(&mut self, spec: NodeSpec) -> Result<NodeId> {
        let kind = spec.kind();
        let id = self
            .output
            .create_node(spec)
            .with_context(|| format!("Failed to create {kind} node"))?;
        self.nodes.push(id);
        Ok(id)
    }

    fn chain(&self, nodes: &[NodeId]) -> Result<()> {
        for pair in nodes.windows(2) {
            self.output.connect(pair[0], pair[1], Input::Signal)?;
        }
        Ok(())
    }
}

impl Drop for PartialGraph {
    fn drop(&mut self) {
        for node in self.nodes.drain(..).rev() {
            self.output.release(node);
        }
    }
}

/// A fully wired effect graph bound to one session.
pub struct EffectGraph {
    output: Arc<dyn AudioOutput>,
    nodes: Vec<NodeId>,
    source: NodeId,
    bandpass: NodeId,
    master: NodeId,
    playing: bool,
}

impl EffectGraph {
    /// Create and wire every node. The master gain starts silent and fades in.
    pub fn build(output: Arc<dyn AudioOutput>, asset: Option<PathBuf>) -> Result<Self> {
        let mut partial = PartialGraph {
            output: Arc::clone(&output),
            nodes: Vec::with_capacity(13),
        };

        let source = partial.add(NodeSpec::Source { asset })?;
        let distortion = partial.add(NodeSpec::Distortion {
            amount: DISTORTION_AMOUNT,
            oversample: 4,
        })?;
        let bandpass = partial.add(NodeSpec::Bandpass {
            frequency: BANDPASS_FREQUENCY,
            q: BANDPASS_Q,
        })?;
        let highpass = partial.add(NodeSpec::Highpass {
            frequency: HIGHPASS_FREQUENCY,
            q: HIGHPASS_Q,
        })?;
        let reverb = partial.add(NodeSpec::Reverb {
            seconds: REVERB_SECONDS,
        })?;
        let panner = partial.add(NodeSpec::StereoPanner)?;
        let master = partial.add(NodeSpec::Gain { value: 0.0 })?;
        let destination = partial.add(NodeSpec::Destination)?;

        partial
            .chain(&[source, distortion, bandpass, highpass, reverb, panner, master, destination])
            .context("Failed to wire the main effect chain")?;

        // Slow auto-pan
        let lfo = partial.add(NodeSpec::Oscillator {
            waveform: Waveform::Sine,
            frequency: PANNING_LFO_HZ,
        })?;
        let lfo_depth = partial.add(NodeSpec::Gain {
            value: PANNING_DEPTH,
        })?;
        output.connect(lfo, lfo_depth, Input::Signal)?;
        output.connect(lfo_depth, panner, Input::Param(Param::Pan))?;

        // Background static
        let static_oscillator = partial.add(NodeSpec::Oscillator {
            waveform: Waveform::Sawtooth,
            frequency: STATIC_OSCILLATOR_HZ,
        })?;
        let noise = partial.add(NodeSpec::Noise)?;
        let static_gain = partial.add(NodeSpec::Gain { value: STATIC_GAIN })?;
        output.connect(static_oscillator, static_gain, Input::Signal)?;
        output.connect(noise, static_gain, Input::Signal)?;
        output.connect(static_gain, master, Input::Signal)?;

        output
            .automate(
                master,
                Param::Gain,
                &[
                    RampPoint::at(0.0, 0.0),
                    RampPoint::at(MASTER_GAIN, MASTER_FADE_IN_SECS),
                ],
            )
            .context("Failed to schedule the fade-in")?;

        let nodes = std::mem::take(&mut partial.nodes);
        Ok(Self {
            output,
            nodes,
            source,
            bandpass,
            master,
            playing: false,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Start playback of the source. `completion` fires once when it ends.
    pub fn start(
        &mut self,
        started: DateTime<Local>,
        length: Duration,
        completion: Completion,
    ) -> Result<()> {
        self.output.begin_playback(PlaybackRequest {
            source: self.source,
            started,
            length,
            completion,
        })?;
        self.playing = true;
        Ok(())
    }

    /// Brief frequency sweep and volume dip, like a link dropping out.
    pub fn glitch(&self) -> Result<()> {
        self.output.automate(
            self.bandpass,
            Param::Frequency,
            &[
                RampPoint::at(BANDPASS_FREQUENCY * 1.5, 0.1),
                RampPoint::at(BANDPASS_FREQUENCY, 0.3),
            ],
        )?;
        self.output.automate(
            self.master,
            Param::Gain,
            &[
                RampPoint::at(GLITCH_DIP_GAIN, 0.05),
                RampPoint::at(MASTER_GAIN, 0.2),
            ],
        )
    }

    /// Ramp the master gain to silence over `duration`.
    pub fn fade_out(&self, duration: Duration) -> Result<()> {
        self.output.automate(
            self.master,
            Param::Gain,
            &[RampPoint {
                value: 0.0,
                offset: duration,
            }],
        )
    }
}

impl Drop for EffectGraph {
    fn drop(&mut self) {
        if self.playing {
            self.output.stop_playback();
        }
        for node in self.nodes.drain(..).rev() {
            self.output.release(node);
        }
    }
}
