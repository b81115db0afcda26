//! Playback through an external player process.
//!
//! The graph is rendered into an ffmpeg filter chain and handed to the player
//! (mpv by default) as an `--af` lavfi filter. Parameter automation during
//! playback is streamed to the player over its JSON IPC socket as
//! `af-command` messages addressed to the individual filter instances.

use anyhow::{Context, Result, bail};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::audio::{
    AudioOutput, Input, NodeId, NodeSpec, Param, PlaybackRequest, RampPoint, Waveform,
};
use crate::common::utils::find_executable;

const FILTER_LABEL: &str = "fx";
const RAMP_STEP: Duration = Duration::from_millis(25);
const WAIT_POLL: Duration = Duration::from_millis(100);

struct Playback {
    child: Arc<Mutex<Child>>,
    socket: PathBuf,
}

#[derive(Default)]
struct GraphState {
    next_id: u64,
    nodes: BTreeMap<NodeId, NodeSpec>,
    edges: Vec<(NodeId, NodeId, Input)>,
    values: HashMap<(NodeId, Param), f32>,
    fade_in: HashMap<NodeId, Duration>,
}

pub struct CommandOutput {
    player: Vec<String>,
    asset: Option<PathBuf>,
    debug_enabled: bool,
    graph: Mutex<GraphState>,
    playback: Mutex<Option<Playback>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CommandOutput {
    pub fn new(player: Vec<String>, asset: Option<PathBuf>, debug_enabled: bool) -> Self {
        Self {
            player,
            asset,
            debug_enabled,
            graph: Mutex::new(GraphState::default()),
            playback: Mutex::new(None),
        }
    }

    /// Why playback cannot start, if it cannot.
    pub fn readiness_problem(&self) -> Option<String> {
        let Some(program) = self.player.first() else {
            return Some("no player command configured".to_string());
        };
        if find_executable(program).is_none() {
            return Some(format!("player '{program}' not found on PATH"));
        }
        match &self.asset {
            None => Some("no audio asset configured".to_string()),
            Some(asset) if !asset.is_file() => {
                Some(format!("audio asset {} does not exist", asset.display()))
            }
            Some(_) => None,
        }
    }

    /// Render the live graph as a single lavfi chain, following the signal
    /// path from the source node.
    pub fn render_filter_chain(&self) -> Result<String> {
        let graph = lock(&self.graph);
        let Some(source) = graph
            .nodes
            .iter()
            .find(|(_, spec)| matches!(spec, NodeSpec::Source { .. }))
            .map(|(id, _)| *id)
        else {
            bail!("Effect graph has no source node");
        };

        let mut filters = Vec::new();
        let mut current = source;
        let mut visited = 0;
        loop {
            visited += 1;
            if visited > graph.nodes.len() {
                bail!("Effect graph signal path contains a cycle");
            }
            if let Some(spec) = graph.nodes.get(&current) {
                filters.extend(render_node(&graph, current, spec));
            }
            let next = graph.edges.iter().find_map(|(from, to, input)| {
                (*from == current && *input == Input::Signal).then_some(*to)
            });
            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        Ok(filters.join(","))
    }

    fn socket_path() -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!("duskbell-player-{}.sock", std::process::id()))
    }

    fn spawn_ramp(&self, node: NodeId, param: Param, from: f32, points: Vec<RampPoint>) {
        let (Some(socket), Some(target)) = (self.active_socket(), self.filter_name(node)) else {
            return;
        };
        let command = match param {
            Param::Gain => "volume",
            Param::Frequency => "f",
            Param::Pan => return,
        };
        let debug_enabled = self.debug_enabled;

        thread::spawn(move || {
            let mut value = from;
            let mut elapsed = Duration::ZERO;
            for point in points {
                let span = point.offset.saturating_sub(elapsed);
                let steps = (span.as_millis() / RAMP_STEP.as_millis()).max(1) as u32;
                for step in 1..=steps {
                    let stepped = value + (point.value - value) * step as f32 / steps as f32;
                    if let Err(e) = send_filter_command(&socket, command, stepped, &target) {
                        if debug_enabled {
                            log_debug!("Player IPC command failed: {e}");
                        }
                        return;
                    }
                    thread::sleep(span / steps);
                }
                value = point.value;
                elapsed = elapsed.max(point.offset);
            }
        });
    }

    fn active_socket(&self) -> Option<PathBuf> {
        lock(&self.playback).as_ref().map(|p| p.socket.clone())
    }

    fn filter_name(&self, node: NodeId) -> Option<String> {
        let graph = lock(&self.graph);
        graph.nodes.get(&node).and_then(|spec| match spec {
            NodeSpec::Bandpass { .. } => Some(format!("bandpass@n{}", node.0)),
            NodeSpec::Gain { .. } => Some(format!("volume@n{}", node.0)),
            _ => None,
        })
    }
}

fn send_filter_command(socket: &Path, command: &str, value: f32, target: &str) -> Result<()> {
    let message = json!({
        "command": ["af-command", FILTER_LABEL, command, format!("{value:.3}"), target]
    });
    let mut stream = UnixStream::connect(socket)
        .with_context(|| format!("Failed to connect to {}", socket.display()))?;
    stream.write_all(format!("{message}\n").as_bytes())?;
    Ok(())
}

/// Nodes feeding `node` through `input`.
fn feeders(graph: &GraphState, node: NodeId, input: Input) -> Vec<NodeId> {
    graph
        .edges
        .iter()
        .filter(|(_, to, via)| *to == node && *via == input)
        .map(|(from, _, _)| *from)
        .collect()
}

fn gain_value(graph: &GraphState, node: NodeId) -> Option<f32> {
    match graph.nodes.get(&node)? {
        NodeSpec::Gain { value } => Some(
            graph
                .values
                .get(&(node, Param::Gain))
                .copied()
                .unwrap_or(*value),
        ),
        _ => None,
    }
}

fn render_node(graph: &GraphState, id: NodeId, spec: &NodeSpec) -> Vec<String> {
    let n = id.0;
    match spec {
        NodeSpec::Source { .. } => vec!["aformat=channel_layouts=stereo".to_string()],
        NodeSpec::Distortion { amount, oversample } => vec![format!(
            "asoftclip@n{n}=type=atan:param={:.2}:oversample={oversample}",
            (amount / 10.0).clamp(0.01, 3.0)
        )],
        NodeSpec::Bandpass { frequency, q } => {
            vec![format!("bandpass@n{n}=f={frequency}:width_type=q:w={q}")]
        }
        NodeSpec::Highpass { frequency, q } => {
            vec![format!("highpass@n{n}=f={frequency}:width_type=q:w={q}")]
        }
        NodeSpec::Reverb { seconds } => {
            let base = (seconds * 40.0).round() as u32;
            vec![format!(
                "aecho@n{n}=in_gain=0.8:out_gain=0.7:delays={}|{}|{}:decays=0.5|0.35|0.2",
                base,
                base * 2,
                base * 4
            )]
        }
        NodeSpec::StereoPanner => {
            // A gain-scaled sine feeding the pan parameter is an auto-panner
            let modulation = feeders(graph, id, Input::Param(Param::Pan))
                .into_iter()
                .find_map(|depth_node| {
                    let depth = gain_value(graph, depth_node)?;
                    feeders(graph, depth_node, Input::Signal)
                        .into_iter()
                        .find_map(|osc| match graph.nodes.get(&osc) {
                            Some(NodeSpec::Oscillator {
                                waveform: Waveform::Sine,
                                frequency,
                            }) => Some((*frequency, depth)),
                            _ => None,
                        })
                });
            match modulation {
                Some((hz, depth)) => vec![format!("apulsator@n{n}=hz={hz}:amount={depth}")],
                None => Vec::new(),
            }
        }
        NodeSpec::Gain { value } => {
            let mut filters = Vec::new();
            // Side branches mixed into this gain become additive noise
            for branch in feeders(graph, id, Input::Signal) {
                let has_noise = feeders(graph, branch, Input::Signal)
                    .iter()
                    .any(|from| matches!(graph.nodes.get(from), Some(NodeSpec::Noise)));
                if let (true, Some(level)) = (has_noise, gain_value(graph, branch)) {
                    filters.push(format!(
                        "aeval=exprs=val(0)+{level}*(2*random(0)-1)|val(1)+{level}*(2*random(1)-1):c=same"
                    ));
                }
            }
            if let Some(fade) = graph.fade_in.get(&id) {
                filters.push(format!("afade=t=in:d={:.2}", fade.as_secs_f32()));
            }
            let level = graph
                .values
                .get(&(id, Param::Gain))
                .copied()
                .unwrap_or(*value);
            filters.push(format!("volume@n{n}=volume={level}"));
            filters
        }
        NodeSpec::Oscillator { .. } | NodeSpec::Noise | NodeSpec::Destination => Vec::new(),
    }
}

impl AudioOutput for CommandOutput {
    fn name(&self) -> &'static str {
        "command"
    }

    fn is_ready(&self) -> bool {
        self.readiness_problem().is_none()
    }

    fn create_node(&self, spec: NodeSpec) -> Result<NodeId> {
        let mut graph = lock(&self.graph);
        graph.next_id += 1;
        let id = NodeId(graph.next_id);
        graph.nodes.insert(id, spec);
        Ok(id)
    }

    fn connect(&self, from: NodeId, to: NodeId, input: Input) -> Result<()> {
        let mut graph = lock(&self.graph);
        if !graph.nodes.contains_key(&from) || !graph.nodes.contains_key(&to) {
            bail!("Cannot connect {from:?} to {to:?}: node not live");
        }
        graph.edges.push((from, to, input));
        Ok(())
    }

    fn automate(&self, node: NodeId, param: Param, points: &[RampPoint]) -> Result<()> {
        let Some(last) = points.last() else {
            return Ok(());
        };

        let from = {
            let mut graph = lock(&self.graph);
            let Some(spec) = graph.nodes.get(&node) else {
                bail!("Cannot automate {node:?}: node not live");
            };
            let initial = match (spec, param) {
                (NodeSpec::Gain { value }, Param::Gain) => *value,
                (NodeSpec::Bandpass { frequency, .. }, Param::Frequency)
                | (NodeSpec::Highpass { frequency, .. }, Param::Frequency) => *frequency,
                _ => 0.0,
            };
            let from = graph.values.get(&(node, param)).copied().unwrap_or(initial);

            let playing = lock(&self.playback).is_some();
            if !playing
                && param == Param::Gain
                && points.len() > 1
                && points[0].value == 0.0
                && points[0].offset.is_zero()
            {
                graph.fade_in.insert(node, last.offset);
            }
            graph.values.insert((node, param), last.value);
            from
        };

        if lock(&self.playback).is_some() {
            self.spawn_ramp(node, param, from, points.to_vec());
        }
        Ok(())
    }

    fn release(&self, node: NodeId) {
        let mut graph = lock(&self.graph);
        graph.nodes.remove(&node);
        graph.edges.retain(|(from, to, _)| *from != node && *to != node);
        graph.values.retain(|(id, _), _| *id != node);
        graph.fade_in.remove(&node);
    }

    fn live_nodes(&self) -> usize {
        lock(&self.graph).nodes.len()
    }

    fn begin_playback(&self, request: PlaybackRequest) -> Result<()> {
        if let Some(problem) = self.readiness_problem() {
            bail!("Audio output not ready: {problem}");
        }
        if lock(&self.playback).is_some() {
            bail!("Playback already running");
        }

        let chain = self.render_filter_chain()?;
        let socket = Self::socket_path();
        let _ = std::fs::remove_file(&socket);

        let asset = match lock(&self.graph).nodes.get(&request.source) {
            Some(NodeSpec::Source { asset: Some(asset) }) => asset.clone(),
            _ => self.asset.clone().context("No audio asset to play")?,
        };

        let (program, args) = self
            .player
            .split_first()
            .context("No player command configured")?;
        let mut command = Command::new(program);
        command
            .args(args)
            .arg(format!("--input-ipc-server={}", socket.display()))
            .arg(format!("--length={:.1}", request.length.as_secs_f64()))
            .arg(format!("--af=@{FILTER_LABEL}:lavfi=[{chain}]"))
            .arg(&asset)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if self.debug_enabled {
            log_pipe!();
            log_debug!("Starting player: {program} {}", args.join(" "));
            log_indented!("Filter chain: {chain}");
        }

        let child = command
            .spawn()
            .with_context(|| format!("Failed to start player '{program}'"))?;
        let child = Arc::new(Mutex::new(child));

        *lock(&self.playback) = Some(Playback {
            child: Arc::clone(&child),
            socket,
        });

        let completion = request.completion;
        thread::spawn(move || {
            let outcome = loop {
                match lock(&child).try_wait() {
                    Ok(Some(status)) if status.success() => break Ok(()),
                    Ok(Some(status)) => break Err(format!("player exited with {status}")),
                    Ok(None) => thread::sleep(WAIT_POLL),
                    Err(e) => break Err(format!("failed to wait for player: {e}")),
                }
            };
            completion(outcome);
        });

        Ok(())
    }

    fn stop_playback(&self) {
        if let Some(playback) = lock(&self.playback).take() {
            let _ = lock(&playback.child).kill();
            let _ = std::fs::remove_file(&playback.socket);
        }
    }
}
