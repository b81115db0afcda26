//! An output that keeps the graph bookkeeping but makes no sound.
//!
//! Playback "ends" once the session length has elapsed on the clock passed to
//! [`AudioOutput::poll`], which makes it usable under a simulated clock.

use anyhow::{Result, bail};
use chrono::{DateTime, Duration as ChronoDuration, Local};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::audio::{AudioOutput, Completion, Input, NodeId, NodeSpec, Param, PlaybackRequest, RampPoint};

#[derive(Default)]
struct SilentState {
    next_id: u64,
    nodes: BTreeMap<NodeId, NodeSpec>,
    playback: Option<(DateTime<Local>, Completion)>,
}

#[derive(Default)]
pub struct SilentOutput {
    state: Mutex<SilentState>,
}

impl SilentOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SilentState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_playing(&self) -> bool {
        self.state().playback.is_some()
    }
}

impl AudioOutput for SilentOutput {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn create_node(&self, spec: NodeSpec) -> Result<NodeId> {
        let mut state = self.state();
        state.next_id += 1;
        let id = NodeId(state.next_id);
        state.nodes.insert(id, spec);
        Ok(id)
    }

    fn connect(&self, from: NodeId, to: NodeId, _input: Input) -> Result<()> {
        let state = self.state();
        if !state.nodes.contains_key(&from) || !state.nodes.contains_key(&to) {
            bail!("Cannot connect {from:?} to {to:?}: node not live");
        }
        Ok(())
    }

    fn automate(&self, node: NodeId, _param: Param, _points: &[RampPoint]) -> Result<()> {
        if !self.state().nodes.contains_key(&node) {
            bail!("Cannot automate {node:?}: node not live");
        }
        Ok(())
    }

    fn release(&self, node: NodeId) {
        self.state().nodes.remove(&node);
    }

    fn live_nodes(&self) -> usize {
        self.state().nodes.len()
    }

    fn begin_playback(&self, request: PlaybackRequest) -> Result<()> {
        let mut state = self.state();
        if state.playback.is_some() {
            bail!("Playback already running");
        }
        let length = ChronoDuration::from_std(request.length)?;
        state.playback = Some((request.started + length, request.completion));
        Ok(())
    }

    fn stop_playback(&self) {
        self.state().playback = None;
    }

    fn poll(&self, now: DateTime<Local>) {
        let finished = {
            let mut state = self.state();
            match &state.playback {
                Some((ends, _)) if *ends <= now => state.playback.take(),
                _ => None,
            }
        };
        if let Some((_, completion)) = finished {
            completion(Ok(()));
        }
    }
}
