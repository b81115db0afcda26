//! The daily deadline state machine.
//!
//! [`Scheduler`] owns every piece of mutable state (the deadline store, the
//! poll cadence, the banner, the effect session and the view cycle) and is
//! only ever driven from one thread. Time is passed in explicitly, so the same
//! code runs against the wall clock, a simulated clock or a test's hand-picked
//! instants.
//!
//! Each check runs in a fixed order: evaluate, update the presenter, then
//! (only on an automatic `Triggerable`) start the session. A session fires at
//! most once per calendar day; the date it fired on is latched so the rest of
//! the trigger window after a short session does not re-fire it.

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate};
use std::sync::Arc;
use std::sync::mpsc::Sender;

use crate::audio::AudioOutput;
use crate::config::Config;
use crate::core::deadline::{Deadline, DeadlineStore, Lookup};
use crate::core::evaluator::{Classification, EvaluationResult, Windows, evaluate};
use crate::core::events::Event;
use crate::core::guard::TransitionGuard;
use crate::core::poll::PollScheduler;
use crate::core::presenter::NotificationPresenter;
use crate::core::sequencer::{
    EffectSequencer, FinishStep, SessionId, SessionSettings, TriggerOutcome,
};
use crate::core::view::{ViewController, ViewSettings};
use crate::display::{Display, StatusLevel};
use crate::source::{DeadlineSource, Location};

/// Everything the scheduler reads from the configuration.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub label: String,
    pub windows: Windows,
    pub poll_interval: Duration,
    pub startup_delay: Duration,
    pub recheck_delay: Duration,
    pub grace_period: Duration,
    pub session: SessionSettings,
    pub view: ViewSettings,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            label: config.label().to_string(),
            windows: Windows {
                approach: config.approach_window(),
                trigger: config.trigger_window(),
            },
            poll_interval: config.poll_interval(),
            startup_delay: config.startup_delay(),
            recheck_delay: config.recheck_delay(),
            grace_period: config.grace_period(),
            session: SessionSettings {
                duration: config.session_duration(),
                fade_out: config.fade_out(),
                asset: config.asset(),
            },
            view: ViewSettings {
                cinematic: config.cinematic(),
                cinematic_interval: config.cinematic_interval(),
                focus_duration: config.focus_duration(),
            },
        }
    }
}

pub struct Scheduler {
    settings: SchedulerSettings,
    store: DeadlineStore,
    poll: PollScheduler,
    presenter: NotificationPresenter,
    sequencer: EffectSequencer,
    view: ViewController,
    source: Arc<dyn DeadlineSource>,
    display: Box<dyn Display>,
    events: Sender<Event>,
    location: Option<Location>,
    last_result: Option<EvaluationResult>,
    fired_on: Option<NaiveDate>,
    grace_until: Option<DateTime<Local>>,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerSettings,
        source: Arc<dyn DeadlineSource>,
        output: Arc<dyn AudioOutput>,
        display: Box<dyn Display>,
        location: Option<Location>,
        events: Sender<Event>,
    ) -> Self {
        Self {
            poll: PollScheduler::new(settings.poll_interval),
            sequencer: EffectSequencer::new(output, settings.session.clone()),
            view: ViewController::new(settings.view, TransitionGuard::new()),
            settings,
            store: DeadlineStore::default(),
            presenter: NotificationPresenter::new(),
            source,
            display,
            events,
            location,
            last_result: None,
            fired_on: None,
            grace_until: None,
        }
    }

    // Read-only views for the runtime loop and for tests.

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.store.get()
    }

    pub fn presenter(&self) -> &NotificationPresenter {
        &self.presenter
    }

    pub fn sequencer(&self) -> &EffectSequencer {
        &self.sequencer
    }

    pub fn view(&self) -> &ViewController {
        &self.view
    }

    pub fn last_result(&self) -> Option<EvaluationResult> {
        self.last_result
    }

    /// The date the automatic trigger last fired on.
    pub fn fired_on(&self) -> Option<NaiveDate> {
        self.fired_on
    }

    /// Arm the first check and the view cycle.
    pub fn start(&mut self, now: DateTime<Local>) {
        log_block_start!(
            "Watching for {} (source: {})",
            self.settings.label,
            self.source.name()
        );
        self.poll.start(now, self.settings.startup_delay);
        self.view.start(now);
    }

    /// Store a deadline looked up for `date`. A changed value schedules an
    /// early re-check.
    pub fn set_deadline(&mut self, deadline: Deadline, date: NaiveDate, now: DateTime<Local>) {
        if self.store.set(deadline, date) {
            log_block_start!("{} deadline for {date}: {deadline}", self.settings.label);
            self.poll.request_check(now, self.settings.recheck_delay);
        }
    }

    pub fn handle_event(&mut self, event: Event, now: DateTime<Local>) {
        match event {
            Event::DeadlineFetched { lookup, result } => {
                self.deadline_fetched(lookup, result, now)
            }
            Event::PlaybackFinished { session, result } => {
                self.playback_finished(session, result, now)
            }
            Event::ManualTrigger => {
                // Outcome is already reported to the display
                let _ = self.trigger_manually(now);
            }
            Event::ForceStop => {
                if !self.force_stop(now) {
                    self.display
                        .status(StatusLevel::Info, "No session is running");
                }
            }
            Event::TransitionStarted => self.view.external_started(),
            Event::TransitionEnded => self.view.external_ended(),
            Event::LocationChanged(location) => self.location_changed(location, now),
            // Handled by the runtime loop
            Event::Reload | Event::Shutdown => {}
        }
    }

    /// Run every timer that is due at `now`.
    pub fn on_timers(&mut self, now: DateTime<Local>) {
        self.sequencer.output().poll(now);

        if let Some(until) = self.sequencer.fade_deadline()
            && until <= now
        {
            self.finish_session(now);
        }

        self.sequencer.on_glitch_timer(now);

        self.presenter.tick(now, self.display.as_mut());

        if let Some(until) = self.grace_until
            && until <= now
        {
            self.grace_until = None;
            self.presenter.release_banner(self.display.as_mut());
            self.refresh(now);
        }

        self.view.on_timers(now, self.display.as_mut());

        if self.poll.take_due(now) {
            self.check(now);
        }
    }

    /// The earliest instant at which [`Self::on_timers`] has work to do.
    pub fn next_wake(&self) -> Option<DateTime<Local>> {
        [
            self.poll.next_due(),
            self.presenter.next_tick(),
            self.sequencer.fade_deadline(),
            self.sequencer.next_glitch(),
            self.grace_until,
            self.view.next_due(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// One poll: evaluate, present, and fire if the trigger window is open.
    pub fn check(&mut self, now: DateTime<Local>) {
        let today = now.date_naive();
        if self.store.needs_fetch(today) {
            self.spawn_fetch(today);
        }

        let result = self.refresh(now);

        if result.classification == Classification::Triggerable && self.fired_on != Some(today) {
            self.fired_on = Some(today);
            match self.start_session(now) {
                Ok(TriggerOutcome::NotReady) => {
                    log_warning!("Audio output not ready; skipping today's session");
                    self.display.status(
                        StatusLevel::Warning,
                        "Audio output is not ready, today's session was skipped",
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    log_error!("Could not start the session: {e}");
                    self.display
                        .status(StatusLevel::Error, &format!("Playback failed: {e}"));
                }
            }
        }
    }

    /// Evaluate and push the result to the display and the presenter.
    fn refresh(&mut self, now: DateTime<Local>) -> EvaluationResult {
        let mut result = evaluate(&now, self.store.get(), &self.settings.windows);
        if self.sequencer.is_active() {
            result = result.reclassified(Classification::Active);
        }

        if self.last_result.map(|r| r.classification) != Some(result.classification) {
            self.display.classification_changed(&result);
        }
        self.last_result = Some(result);

        self.presenter
            .on_evaluation(&result, now, self.display.as_mut());
        result
    }

    fn spawn_fetch(&mut self, date: NaiveDate) {
        let lookup = self.store.mark_in_flight(date);
        let source = Arc::clone(&self.source);
        let location = self.location;
        let events = self.events.clone();

        let spawned = std::thread::Builder::new()
            .name("deadline-fetch".to_string())
            .spawn(move || {
                let result = source.fetch(location, date);
                let _ = events.send(Event::DeadlineFetched { lookup, result });
            });

        if let Err(e) = spawned {
            self.store.finish_fetch(lookup);
            log_warning!("Could not start deadline lookup: {e}");
        }
    }

    fn deadline_fetched(
        &mut self,
        lookup: Lookup,
        result: Result<Deadline>,
        now: DateTime<Local>,
    ) {
        if !self.store.finish_fetch(lookup) {
            log_decorated!("Ignoring superseded deadline lookup for {}", lookup.date);
            return;
        }
        match result {
            Ok(deadline) => self.set_deadline(deadline, lookup.date, now),
            Err(e) => {
                log_pipe!();
                log_warning!("Deadline source unavailable: {e}");
                self.display.status(
                    StatusLevel::Warning,
                    &format!("Could not look up the {} time", self.settings.label),
                );
            }
        }
    }

    fn location_changed(&mut self, location: Location, now: DateTime<Local>) {
        log_block_start!(
            "Location changed to {:.4}°, {:.4}°",
            location.latitude,
            location.longitude
        );
        self.location = Some(location);
        self.store.invalidate();
        self.poll.request_check(now, self.settings.recheck_delay);
        self.view.focus_on(
            location.latitude,
            location.longitude,
            now,
            self.display.as_mut(),
        );
    }

    fn start_session(&mut self, now: DateTime<Local>) -> Result<TriggerOutcome> {
        let events = self.events.clone();
        let outcome = self.sequencer.trigger(now, move |session| {
            Box::new(move |result| {
                let _ = events.send(Event::PlaybackFinished { session, result });
            })
        })?;

        if outcome == TriggerOutcome::Started {
            log_block_start!(
                "{} session started ({}s via {})",
                self.settings.label,
                self.settings.session.duration,
                self.sequencer.output().name()
            );
            self.grace_until = None;
            self.presenter.session_started(
                self.settings.session.duration,
                now,
                self.display.as_mut(),
            );
            self.refresh(now);
        }
        Ok(outcome)
    }

    /// Start a session on request, outside the daily schedule.
    ///
    /// This does not consume the day's automatic trigger.
    pub fn trigger_manually(&mut self, now: DateTime<Local>) -> Result<TriggerOutcome> {
        let outcome = self.start_session(now);
        match &outcome {
            Ok(TriggerOutcome::Started) => {
                self.display.status(StatusLevel::Success, "Test session started");
            }
            Ok(TriggerOutcome::AlreadyActive) => {
                self.display
                    .status(StatusLevel::Info, "A session is already running");
            }
            Ok(TriggerOutcome::NotReady) => {
                self.display
                    .status(StatusLevel::Warning, "Audio output is not ready");
            }
            Err(e) => {
                self.display
                    .status(StatusLevel::Error, &format!("Playback failed: {e}"));
            }
        }
        outcome
    }

    /// End the running session early through the normal fade and teardown.
    pub fn force_stop(&mut self, now: DateTime<Local>) -> bool {
        let stopped = self.sequencer.force_stop(now);
        if stopped {
            log_decorated!("Session stopped early, fading out");
        }
        stopped
    }

    fn playback_finished(
        &mut self,
        session: SessionId,
        result: std::result::Result<(), String>,
        now: DateTime<Local>,
    ) {
        match self.sequencer.playback_finished(session, result, now) {
            FinishStep::Ignored => {}
            FinishStep::FadingOut => log_decorated!("Playback ended, fading out"),
            FinishStep::Failed(reason) => {
                log_error!("Playback failed: {reason}");
                self.display
                    .status(StatusLevel::Error, &format!("Playback failed: {reason}"));
                self.finish_session(now);
            }
        }
    }

    /// The one teardown path: release the graph, stop the session countdown,
    /// show the final message and start the grace period.
    fn finish_session(&mut self, now: DateTime<Local>) {
        let Some(session) = self.sequencer.release() else {
            return;
        };
        log_decorated!(
            "Session {} finished, {} audio nodes live",
            session.0,
            self.sequencer.output().live_nodes()
        );
        self.presenter.session_finished(
            format!("{} time!", self.settings.label),
            self.display.as_mut(),
        );
        self.grace_until = Some(now + self.settings.grace_period);
        self.refresh(now);
    }

    /// Apply a reloaded configuration.
    ///
    /// A running session keeps the settings it started with. When the
    /// deadline inputs changed, `source` replaces the current source and the
    /// stored deadline is dropped.
    pub fn apply_config(
        &mut self,
        settings: SchedulerSettings,
        source: Option<Arc<dyn DeadlineSource>>,
        location: Option<Location>,
        now: DateTime<Local>,
    ) {
        if settings.label != self.settings.label {
            self.display.label_changed(&settings.label);
        }
        if settings.poll_interval != self.settings.poll_interval {
            self.poll.set_interval(settings.poll_interval, now);
        }
        self.sequencer.set_settings(settings.session.clone());
        self.view.apply_settings(settings.view, now);

        if let Some(source) = source {
            self.source = source;
            self.store.clear();
        }

        let moved = location.is_some() && location != self.location;
        self.settings = settings;
        match location {
            Some(location) if moved => self.location_changed(location, now),
            _ => {
                self.location = location;
                self.poll.request_check(now, self.settings.recheck_delay);
            }
        }
    }

    /// Tear everything down at once, skipping the fade and the grace period.
    pub fn shutdown(&mut self, now: DateTime<Local>) {
        if self.sequencer.is_active() {
            self.sequencer.force_stop(now);
            self.finish_session(now);
        }
        self.grace_until = None;
        self.presenter.release_banner(self.display.as_mut());
        self.poll.stop();
        self.view.stop();
    }
}
