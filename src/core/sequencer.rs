//! The one-shot effect session.
//!
//! At most one [`EffectSession`] exists at a time. It is represented by the
//! session slot itself, so "is something playing" and "which graph is live"
//! cannot disagree. Every way out of a session (natural end, forced stop,
//! playback failure) ends in [`EffectSequencer::release`], which drops the
//! graph and with it every node the session created.

use anyhow::Result;
use chrono::{DateTime, Duration, Local};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;

use crate::audio::graph::EffectGraph;
use crate::audio::{AudioOutput, Completion};
use crate::common::constants::{GLITCH_INTERVAL_SECS, GLITCH_PROBABILITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Result of asking for a session. Only a playback failure is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    /// A session is already running; nothing was done.
    AlreadyActive,
    /// The audio output cannot play yet.
    NotReady,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub duration: u64,
    pub fade_out: Duration,
    pub asset: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Playing,
    FadingOut { until: DateTime<Local> },
}

pub struct EffectSession {
    id: SessionId,
    graph: EffectGraph,
    phase: Phase,
    next_glitch: DateTime<Local>,
}

pub enum SessionSlot {
    Idle,
    Active(EffectSession),
}

/// What a playback-finished report means for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishStep {
    /// Stale or duplicate report.
    Ignored,
    /// Natural end: the fade-out is running.
    FadingOut,
    /// Playback failed: tear down right away.
    Failed(String),
}

pub struct EffectSequencer {
    output: Arc<dyn AudioOutput>,
    settings: SessionSettings,
    slot: SessionSlot,
    next_id: u64,
    rng: StdRng,
}

impl EffectSequencer {
    pub fn new(output: Arc<dyn AudioOutput>, settings: SessionSettings) -> Self {
        Self {
            output,
            settings,
            slot: SessionSlot::Idle,
            next_id: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn output(&self) -> &Arc<dyn AudioOutput> {
        &self.output
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// New settings apply from the next session on.
    pub fn set_settings(&mut self, settings: SessionSettings) {
        self.settings = settings;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.slot, SessionSlot::Active(_))
    }

    pub fn active_session(&self) -> Option<SessionId> {
        match &self.slot {
            SessionSlot::Active(session) => Some(session.id),
            SessionSlot::Idle => None,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        match &self.slot {
            SessionSlot::Active(session) => Some(session.phase),
            SessionSlot::Idle => None,
        }
    }

    /// Start a session unless one is running or the output is not ready.
    ///
    /// `on_end` builds the completion for the new session id. On `Err` the
    /// partially built graph has already been released and the slot is idle.
    pub fn trigger(
        &mut self,
        now: DateTime<Local>,
        on_end: impl FnOnce(SessionId) -> Completion,
    ) -> Result<TriggerOutcome> {
        if self.is_active() {
            return Ok(TriggerOutcome::AlreadyActive);
        }
        if !self.output.is_ready() {
            return Ok(TriggerOutcome::NotReady);
        }

        self.next_id += 1;
        let id = SessionId(self.next_id);

        let mut graph = EffectGraph::build(Arc::clone(&self.output), self.settings.asset.clone())?;
        graph.start(
            now,
            std::time::Duration::from_secs(self.settings.duration),
            on_end(id),
        )?;

        self.slot = SessionSlot::Active(EffectSession {
            id,
            graph,
            phase: Phase::Playing,
            next_glitch: now + Duration::seconds(GLITCH_INTERVAL_SECS),
        });
        Ok(TriggerOutcome::Started)
    }

    /// Playback reported its end.
    pub fn playback_finished(
        &mut self,
        id: SessionId,
        result: Result<(), String>,
        now: DateTime<Local>,
    ) -> FinishStep {
        match &self.slot {
            SessionSlot::Active(session) if session.id == id => {}
            _ => return FinishStep::Ignored,
        }
        match result {
            Ok(()) => {
                if self.begin_fade(now) {
                    FinishStep::FadingOut
                } else {
                    FinishStep::Ignored
                }
            }
            Err(reason) => FinishStep::Failed(reason),
        }
    }

    /// End the running session early. It still fades and tears down exactly
    /// like a natural end. Returns false when there was nothing to stop.
    pub fn force_stop(&mut self, now: DateTime<Local>) -> bool {
        self.begin_fade(now)
    }

    fn begin_fade(&mut self, now: DateTime<Local>) -> bool {
        let fade = self.settings.fade_out;
        let SessionSlot::Active(session) = &mut self.slot else {
            return false;
        };
        if session.phase != Phase::Playing {
            return false;
        }
        // A failed ramp only makes the end abrupt
        let _ = session.graph.fade_out(fade.to_std().unwrap_or_default());
        session.phase = Phase::FadingOut { until: now + fade };
        true
    }

    /// When the running fade-out completes.
    pub fn fade_deadline(&self) -> Option<DateTime<Local>> {
        match self.phase() {
            Some(Phase::FadingOut { until }) => Some(until),
            _ => None,
        }
    }

    /// Drop the session and every node it owns.
    pub fn release(&mut self) -> Option<SessionId> {
        match std::mem::replace(&mut self.slot, SessionSlot::Idle) {
            SessionSlot::Active(session) => Some(session.id),
            SessionSlot::Idle => None,
        }
    }

    pub fn next_glitch(&self) -> Option<DateTime<Local>> {
        match &self.slot {
            SessionSlot::Active(session) if session.phase == Phase::Playing => {
                Some(session.next_glitch)
            }
            _ => None,
        }
    }

    /// Take the glitch turn if due. Returns true when a glitch was applied.
    pub fn on_glitch_timer(&mut self, now: DateTime<Local>) -> bool {
        let SessionSlot::Active(session) = &mut self.slot else {
            return false;
        };
        if session.phase != Phase::Playing || session.next_glitch > now {
            return false;
        }
        while session.next_glitch <= now {
            session.next_glitch += Duration::seconds(GLITCH_INTERVAL_SECS);
        }
        self.rng.gen_bool(GLITCH_PROBABILITY) && session.graph.glitch().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::silent::SilentOutput;
    use crate::time::source::parse_datetime;

    fn at(s: &str) -> DateTime<Local> {
        parse_datetime(&format!("2026-03-01 {s}")).unwrap()
    }

    fn sequencer() -> (EffectSequencer, Arc<SilentOutput>) {
        let output = Arc::new(SilentOutput::new());
        let sequencer = EffectSequencer::new(
            output.clone(),
            SessionSettings {
                duration: 90,
                fade_out: Duration::milliseconds(500),
                asset: None,
            },
        );
        (sequencer, output)
    }

    fn ignore(_: SessionId) -> Completion {
        Box::new(|_| {})
    }

    #[test]
    fn test_second_trigger_is_a_no_op() {
        let (mut sequencer, output) = sequencer();
        assert_eq!(sequencer.trigger(at("17:55:00"), ignore).unwrap(), TriggerOutcome::Started);
        let nodes = output.live_nodes();
        assert_eq!(
            sequencer.trigger(at("17:56:00"), ignore).unwrap(),
            TriggerOutcome::AlreadyActive
        );
        assert_eq!(output.live_nodes(), nodes);
    }

    #[test]
    fn test_natural_end_fades_then_releases() {
        let (mut sequencer, output) = sequencer();
        sequencer.trigger(at("17:55:00"), ignore).unwrap();
        let id = sequencer.active_session().unwrap();

        let step = sequencer.playback_finished(id, Ok(()), at("17:56:30"));
        assert_eq!(step, FinishStep::FadingOut);
        assert!(sequencer.is_active());
        assert_eq!(
            sequencer.fade_deadline(),
            Some(at("17:56:30") + Duration::milliseconds(500))
        );

        assert_eq!(sequencer.release(), Some(id));
        assert_eq!(output.live_nodes(), 0);
        assert!(!sequencer.is_active());
    }

    #[test]
    fn test_stale_report_is_ignored() {
        let (mut sequencer, _output) = sequencer();
        sequencer.trigger(at("17:55:00"), ignore).unwrap();
        let step = sequencer.playback_finished(SessionId(99), Ok(()), at("17:56:30"));
        assert_eq!(step, FinishStep::Ignored);
        assert_eq!(sequencer.phase(), Some(Phase::Playing));
    }

    #[test]
    fn test_force_stop_only_once() {
        let (mut sequencer, _output) = sequencer();
        assert!(!sequencer.force_stop(at("17:55:00")));
        sequencer.trigger(at("17:55:00"), ignore).unwrap();
        assert!(sequencer.force_stop(at("17:55:10")));
        assert!(!sequencer.force_stop(at("17:55:10")));
        assert_eq!(sequencer.next_glitch(), None);
    }

    #[test]
    fn test_glitch_timer_advances() {
        let (mut sequencer, _output) = sequencer();
        sequencer.trigger(at("17:55:00"), ignore).unwrap();
        assert_eq!(sequencer.next_glitch(), Some(at("17:55:03")));
        sequencer.on_glitch_timer(at("17:55:07"));
        assert_eq!(sequencer.next_glitch(), Some(at("17:55:09")));
    }
}
