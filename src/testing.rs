//! Test doubles for the audio and display collaborators.
//!
//! Both are cheap handles over shared state: give a clone to the scheduler and
//! keep one to drive and inspect it.

use anyhow::{Result, bail};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::audio::{
    AudioOutput, Completion, Input, NodeId, NodeSpec, Param, PlaybackRequest, RampPoint,
};
use crate::core::evaluator::{Classification, EvaluationResult};
use crate::display::{CountdownText, Display, StatusLevel, ViewChange};

#[derive(Default)]
struct FakeState {
    not_ready: bool,
    fail_playback: Option<String>,
    next_id: u64,
    nodes: BTreeMap<NodeId, NodeSpec>,
    created: usize,
    automations: Vec<(NodeId, Param, Vec<RampPoint>)>,
    playback: Option<Completion>,
    playbacks_started: usize,
    stops: usize,
}

/// An audio output whose playback ends only when the test says so.
#[derive(Clone, Default)]
pub struct FakeOutput {
    state: Arc<Mutex<FakeState>>,
}

impl FakeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_ready(&self, ready: bool) {
        self.state().not_ready = !ready;
    }

    /// Make the next `begin_playback` fail with `reason`.
    pub fn fail_next_playback(&self, reason: &str) {
        self.state().fail_playback = Some(reason.to_string());
    }

    /// End the current playback with `result`. Returns false if nothing was
    /// playing.
    pub fn finish_playback(&self, result: Result<(), String>) -> bool {
        let completion = self.state().playback.take();
        match completion {
            Some(completion) => {
                completion(result);
                true
            }
            None => false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state().playback.is_some()
    }

    /// Nodes ever created.
    pub fn created_nodes(&self) -> usize {
        self.state().created
    }

    pub fn playbacks_started(&self) -> usize {
        self.state().playbacks_started
    }

    pub fn stop_count(&self) -> usize {
        self.state().stops
    }

    /// Automation calls recorded for `param`.
    pub fn automations_of(&self, param: Param) -> usize {
        self.state()
            .automations
            .iter()
            .filter(|(_, p, _)| *p == param)
            .count()
    }
}

impl AudioOutput for FakeOutput {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_ready(&self) -> bool {
        !self.state().not_ready
    }

    fn create_node(&self, spec: NodeSpec) -> Result<NodeId> {
        let mut state = self.state();
        state.next_id += 1;
        state.created += 1;
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

    fn automate(&self, node: NodeId, param: Param, points: &[RampPoint]) -> Result<()> {
        let mut state = self.state();
        if !state.nodes.contains_key(&node) {
            bail!("Cannot automate {node:?}: node not live");
        }
        state.automations.push((node, param, points.to_vec()));
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
        if let Some(reason) = state.fail_playback.take() {
            bail!("{reason}");
        }
        if state.playback.is_some() {
            bail!("Playback already running");
        }
        state.playbacks_started += 1;
        state.playback = Some(request.completion);
        Ok(())
    }

    fn stop_playback(&self) {
        let mut state = self.state();
        state.stops += 1;
        state.playback = None;
    }

    fn poll(&self, _now: DateTime<Local>) {}
}

/// One call received by a [`RecordingDisplay`].
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Classification(EvaluationResult),
    Visibility(bool),
    Countdown(CountdownText),
    Status(StatusLevel, String),
    View(ViewChange),
    Label(String),
}

/// A display that records every call.
#[derive(Clone, Default)]
pub struct RecordingDisplay {
    events: Arc<Mutex<Vec<DisplayEvent>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: DisplayEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    pub fn events(&self) -> Vec<DisplayEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn classifications(&self) -> Vec<Classification> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::Classification(result) => Some(result.classification),
                _ => None,
            })
            .collect()
    }

    pub fn visibility_changes(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::Visibility(visible) => Some(visible),
                _ => None,
            })
            .collect()
    }

    pub fn countdowns(&self) -> Vec<CountdownText> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::Countdown(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<(StatusLevel, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::Status(level, message) => Some((level, message)),
                _ => None,
            })
            .collect()
    }

    pub fn view_changes(&self) -> Vec<ViewChange> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DisplayEvent::View(change) => Some(change),
                _ => None,
            })
            .collect()
    }
}

impl Display for RecordingDisplay {
    fn classification_changed(&mut self, result: &EvaluationResult) {
        self.push(DisplayEvent::Classification(*result));
    }

    fn notification_visibility(&mut self, visible: bool) {
        self.push(DisplayEvent::Visibility(visible));
    }

    fn countdown(&mut self, text: &CountdownText) {
        self.push(DisplayEvent::Countdown(text.clone()));
    }

    fn status(&mut self, level: StatusLevel, message: &str) {
        self.push(DisplayEvent::Status(level, message.to_string()));
    }

    fn view_changed(&mut self, change: ViewChange) {
        self.push(DisplayEvent::View(change));
    }

    fn label_changed(&mut self, label: &str) {
        self.push(DisplayEvent::Label(label.to_string()));
    }
}
