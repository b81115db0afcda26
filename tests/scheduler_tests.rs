//! End-to-end behavior of the scheduler against fake audio and display.
//!
//! Time is stepped by hand one second at a time; the fake output ends
//! playback after the configured session length.

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Local, NaiveDate};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, channel};

use duskbell::audio::{AudioOutput, Param};
use duskbell::common::logger::Log;
use duskbell::core::deadline::Deadline;
use duskbell::core::evaluator::{Classification, Windows};
use duskbell::core::events::Event;
use duskbell::core::scheduler::{Scheduler, SchedulerSettings};
use duskbell::core::sequencer::{SessionSettings, TriggerOutcome};
use duskbell::core::view::ViewSettings;
use duskbell::display::{CountdownText, StatusLevel, ViewChange};
use duskbell::source::{DeadlineSource, FixedSource, Location};
use duskbell::testing::{DisplayEvent, FakeOutput, RecordingDisplay};
use duskbell::time::source::parse_datetime;

const SESSION_SECS: u64 = 90;

fn at(s: &str) -> DateTime<Local> {
    parse_datetime(s).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

fn six_pm() -> Deadline {
    Deadline::new(18, 0).unwrap()
}

fn settings() -> SchedulerSettings {
    SchedulerSettings {
        label: "Sunset".to_string(),
        windows: Windows {
            approach: 900,
            trigger: 300,
        },
        poll_interval: Duration::seconds(60),
        startup_delay: Duration::seconds(3),
        recheck_delay: Duration::seconds(1),
        grace_period: Duration::seconds(10),
        session: SessionSettings {
            duration: SESSION_SECS,
            fade_out: Duration::milliseconds(500),
            asset: None,
        },
        view: ViewSettings {
            cinematic: false,
            cinematic_interval: Duration::seconds(45),
            focus_duration: Duration::milliseconds(6500),
        },
    }
}

struct FailingSource;

impl DeadlineSource for FailingSource {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn fetch(&self, _location: Option<Location>, _date: NaiveDate) -> Result<Deadline> {
        bail!("service unavailable")
    }
}

/// 18:00 without a location, 19:30 once placed north of 30°.
struct LocationSource;

impl DeadlineSource for LocationSource {
    fn name(&self) -> &'static str {
        "location"
    }

    fn fetch(&self, location: Option<Location>, _date: NaiveDate) -> Result<Deadline> {
        match location {
            Some(location) if location.latitude > 30.0 => Deadline::new(19, 30),
            _ => Ok(six_pm()),
        }
    }
}

fn wait_for_event(events: &Receiver<Event>) -> Event {
    events
        .recv_timeout(std::time::Duration::from_secs(5))
        .unwrap()
}

struct Harness {
    scheduler: Scheduler,
    events: Receiver<Event>,
    output: FakeOutput,
    display: RecordingDisplay,
    seen_playbacks: usize,
    finish_at: Option<DateTime<Local>>,
}

impl Harness {
    fn with(settings: SchedulerSettings, source: Arc<dyn DeadlineSource>) -> Self {
        Log::set_enabled(false);
        let (tx, events) = channel();
        let output = FakeOutput::new();
        let display = RecordingDisplay::new();
        let scheduler = Scheduler::new(
            settings,
            source,
            Arc::new(output.clone()),
            Box::new(display.clone()),
            None,
            tx,
        );
        Self {
            scheduler,
            events,
            output,
            display,
            seen_playbacks: 0,
            finish_at: None,
        }
    }

    fn new() -> Self {
        Self::with(settings(), Arc::new(FixedSource::new(six_pm())))
    }

    /// Start at `now` with today's deadline already known.
    fn started(now: DateTime<Local>) -> Self {
        let mut harness = Self::new();
        harness
            .scheduler
            .set_deadline(six_pm(), now.date_naive(), now);
        harness.scheduler.start(now);
        harness
    }

    fn pump(&mut self, now: DateTime<Local>) {
        while let Ok(event) = self.events.try_recv() {
            self.scheduler.handle_event(event, now);
        }
    }

    fn step(&mut self, now: DateTime<Local>) {
        self.scheduler.on_timers(now);

        if self.output.playbacks_started() > self.seen_playbacks {
            self.seen_playbacks = self.output.playbacks_started();
            self.finish_at = Some(now + Duration::seconds(SESSION_SECS as i64));
        }
        if let Some(finish_at) = self.finish_at
            && finish_at <= now
        {
            self.finish_at = None;
            self.output.finish_playback(Ok(()));
        }

        self.pump(now);
    }

    fn sweep(&mut self, from: DateTime<Local>, to: DateTime<Local>) {
        let mut now = from;
        while now <= to {
            self.step(now);
            now += Duration::seconds(1);
        }
    }

    fn sessions(&self) -> usize {
        self.output.playbacks_started()
    }
}

#[test]
fn test_manual_trigger_is_idempotent_while_active() {
    let mut h = Harness::started(at("2026-03-01 12:00:00"));
    let now = at("2026-03-01 12:00:05");

    let outcomes: Vec<TriggerOutcome> = (0..5)
        .map(|_| h.scheduler.trigger_manually(now).unwrap())
        .collect();

    assert_eq!(outcomes[0], TriggerOutcome::Started);
    assert!(
        outcomes[1..]
            .iter()
            .all(|outcome| *outcome == TriggerOutcome::AlreadyActive)
    );
    assert_eq!(h.sessions(), 1);
}

#[test]
fn test_repeated_triggerable_polls_start_one_session() {
    let mut h = Harness::started(at("2026-03-01 17:54:00"));
    h.sweep(at("2026-03-01 17:54:00"), at("2026-03-01 17:59:59"));

    assert_eq!(h.sessions(), 1);
    assert_eq!(h.scheduler.fired_on(), Some(day(1)));
}

#[test]
fn test_daily_single_fire() {
    let mut h = Harness::started(at("2026-03-01 17:50:00"));
    h.sweep(at("2026-03-01 17:50:00"), at("2026-03-01 18:10:00"));

    assert_eq!(h.sessions(), 1);
    assert!(!h.scheduler.sequencer().is_active());
    assert_eq!(
        h.scheduler.last_result().map(|r| r.classification),
        Some(Classification::Past)
    );

    // Next day: the collaborator supplies the same deadline again
    let next = at("2026-03-02 17:50:00");
    h.scheduler.set_deadline(six_pm(), day(2), next);
    h.sweep(next, at("2026-03-02 17:54:59"));
    assert_eq!(h.sessions(), 1);

    h.sweep(at("2026-03-02 17:55:00"), at("2026-03-02 17:56:00"));
    assert_eq!(h.sessions(), 2);
    assert_eq!(h.scheduler.fired_on(), Some(day(2)));
}

#[test]
fn test_no_fire_when_starting_in_the_past_region() {
    let mut h = Harness::started(at("2026-03-01 18:05:00"));
    h.sweep(at("2026-03-01 18:05:00"), at("2026-03-01 23:59:00"));
    assert_eq!(h.sessions(), 0);
}

#[test]
fn test_window_boundaries_drive_the_banner() {
    let mut h = Harness::started(at("2026-03-01 17:44:00"));
    h.sweep(at("2026-03-01 17:44:00"), at("2026-03-01 17:44:59"));
    assert!(!h.scheduler.presenter().is_visible());
    assert_eq!(h.display.classifications(), vec![Classification::Dormant]);

    // 17:45:00 is exactly the approach window and a regular poll
    h.step(at("2026-03-01 17:45:00"));
    assert!(h.scheduler.presenter().is_visible());
    assert_eq!(
        h.scheduler.last_result().unwrap().seconds_until_deadline,
        Some(900)
    );
    assert_eq!(
        h.display.countdowns().last(),
        Some(&CountdownText::Remaining(900))
    );

    h.sweep(at("2026-03-01 17:45:01"), at("2026-03-01 17:55:00"));
    assert_eq!(
        h.display.classifications(),
        vec![
            Classification::Dormant,
            Classification::Approaching,
            Classification::Triggerable,
            Classification::Active,
        ]
    );
    assert_eq!(h.sessions(), 1);
}

#[test]
fn test_session_teardown_keeps_message_through_grace() {
    let mut h = Harness::started(at("2026-03-01 17:54:00"));
    h.sweep(at("2026-03-01 17:54:00"), at("2026-03-01 17:56:31"));

    // Fired at 17:55:00, ended at 17:56:30, faded out by 17:56:31
    assert!(!h.scheduler.sequencer().is_active());
    assert_eq!(h.output.live_nodes(), 0);
    assert_eq!(
        h.scheduler.presenter().text(),
        Some(&CountdownText::Message("Sunset time!".to_string()))
    );
    assert!(h.scheduler.presenter().is_visible());

    // Grace over; still in the trigger window so the deadline countdown returns
    h.sweep(at("2026-03-01 17:56:32"), at("2026-03-01 17:56:41"));
    assert!(!h.scheduler.presenter().session_owns_banner());
    assert!(h.scheduler.presenter().is_visible());
    assert!(matches!(
        h.scheduler.presenter().text(),
        Some(CountdownText::Remaining(secs)) if *secs < 300
    ));

    h.sweep(at("2026-03-01 17:56:42"), at("2026-03-01 18:00:30"));
    assert!(!h.scheduler.presenter().is_visible());
    assert_eq!(h.display.visibility_changes(), vec![true, false]);
}

#[test]
fn test_force_stop_releases_every_node() {
    let mut h = Harness::started(at("2026-03-01 12:00:00"));
    let baseline = h.output.live_nodes();

    let now = at("2026-03-01 12:00:10");
    assert_eq!(
        h.scheduler.trigger_manually(now).unwrap(),
        TriggerOutcome::Started
    );
    assert!(h.output.live_nodes() > baseline);
    let gain_ramps = h.output.automations_of(Param::Gain);

    h.scheduler.handle_event(Event::ForceStop, at("2026-03-01 12:00:20"));
    assert!(h.scheduler.sequencer().is_active(), "still fading out");
    assert_eq!(h.output.automations_of(Param::Gain), gain_ramps + 1);

    h.step(at("2026-03-01 12:00:21"));
    assert_eq!(h.output.live_nodes(), baseline);
    assert!(!h.scheduler.sequencer().is_active());
    assert_eq!(h.output.stop_count(), 1);

    assert_eq!(
        h.scheduler
            .trigger_manually(at("2026-03-01 12:00:22"))
            .unwrap(),
        TriggerOutcome::Started
    );
}

#[test]
fn test_stale_playback_report_after_force_stop() {
    let mut h = Harness::started(at("2026-03-01 12:00:00"));
    h.scheduler
        .trigger_manually(at("2026-03-01 12:00:01"))
        .unwrap();
    h.scheduler.force_stop(at("2026-03-01 12:00:02"));
    h.step(at("2026-03-01 12:00:03"));

    let second = at("2026-03-01 12:00:04");
    h.scheduler.trigger_manually(second).unwrap();
    // Late report for the first session must not end the second
    h.scheduler.handle_event(
        Event::PlaybackFinished {
            session: duskbell::core::sequencer::SessionId(1),
            result: Ok(()),
        },
        second,
    );
    assert_eq!(
        h.scheduler.sequencer().phase(),
        Some(duskbell::core::sequencer::Phase::Playing)
    );
}

#[test]
fn test_playback_failure_leaves_nothing_behind() {
    let mut h = Harness::started(at("2026-03-01 12:00:00"));
    h.output.fail_next_playback("no audio device");

    let result = h.scheduler.trigger_manually(at("2026-03-01 12:00:01"));
    assert!(result.is_err());
    assert_eq!(h.output.live_nodes(), 0);
    assert!(h.output.created_nodes() > 0);
    assert!(!h.scheduler.sequencer().is_active());
    assert!(
        h.display
            .statuses()
            .iter()
            .any(|(level, message)| *level == StatusLevel::Error
                && message.contains("no audio device"))
    );

    assert_eq!(
        h.scheduler
            .trigger_manually(at("2026-03-01 12:00:02"))
            .unwrap(),
        TriggerOutcome::Started
    );
}

#[test]
fn test_playback_error_after_start_tears_down_immediately() {
    let mut h = Harness::started(at("2026-03-01 12:00:00"));
    h.scheduler
        .trigger_manually(at("2026-03-01 12:00:01"))
        .unwrap();

    h.output.finish_playback(Err("device unplugged".to_string()));
    h.pump(at("2026-03-01 12:00:05"));

    assert!(!h.scheduler.sequencer().is_active());
    assert_eq!(h.output.live_nodes(), 0);
}

#[test]
fn test_not_ready_is_reported_and_not_retried() {
    let mut h = Harness::started(at("2026-03-01 17:54:00"));
    h.output.set_ready(false);

    assert_eq!(
        h.scheduler
            .trigger_manually(at("2026-03-01 17:54:01"))
            .unwrap(),
        TriggerOutcome::NotReady
    );

    h.sweep(at("2026-03-01 17:54:02"), at("2026-03-01 17:56:00"));
    assert_eq!(h.output.created_nodes(), 0);

    // Becoming ready later the same day does not bring the session back
    h.output.set_ready(true);
    h.sweep(at("2026-03-01 17:56:01"), at("2026-03-01 17:59:00"));
    assert_eq!(h.sessions(), 0);
    assert!(
        h.display
            .statuses()
            .iter()
            .any(|(level, _)| *level == StatusLevel::Warning)
    );
}

#[test]
fn test_session_countdown_is_not_stomped_by_evaluations() {
    let mut h = Harness::started(at("2026-03-01 17:48:00"));
    h.sweep(at("2026-03-01 17:48:00"), at("2026-03-01 17:50:00"));
    assert_eq!(
        h.display.countdowns().last(),
        Some(&CountdownText::Remaining(600))
    );

    h.scheduler
        .trigger_manually(at("2026-03-01 17:50:00"))
        .unwrap();
    h.display.clear();

    // Several Approaching polls while the session counts down
    h.sweep(at("2026-03-01 17:50:01"), at("2026-03-01 17:53:00"));

    let remaining: Vec<u64> = h
        .display
        .countdowns()
        .into_iter()
        .filter_map(|text| match text {
            CountdownText::Remaining(secs) => Some(secs),
            CountdownText::Message(_) => None,
        })
        .collect();

    // Until the grace release only session values (<= 90) appear, strictly falling
    let during_session: Vec<u64> = remaining.iter().copied().take_while(|s| *s <= 90).collect();
    assert_eq!(during_session.first(), Some(&89));
    assert!(during_session.windows(2).all(|pair| pair[0] > pair[1]));
}

#[test]
fn test_redundant_evaluations_are_silent() {
    let mut h = Harness::started(at("2026-03-01 17:49:00"));
    h.sweep(at("2026-03-01 17:49:00"), at("2026-03-01 17:49:03"));
    let shows = h.display.visibility_changes().len();

    h.scheduler.check(at("2026-03-01 17:49:03"));
    h.scheduler.check(at("2026-03-01 17:49:03"));
    assert_eq!(h.display.visibility_changes().len(), shows);
    assert_eq!(
        h.display
            .classifications()
            .iter()
            .filter(|c| **c == Classification::Approaching)
            .count(),
        1
    );
}

#[test]
fn test_transition_guard_skips_cinematic_turn() {
    let mut settings = settings();
    settings.view.cinematic = true;
    let mut h = Harness::with(settings, Arc::new(FixedSource::new(six_pm())));
    let start = at("2026-03-01 12:00:00");
    h.scheduler.set_deadline(six_pm(), day(1), start);
    h.scheduler.start(start);

    h.scheduler.handle_event(Event::TransitionStarted, start);
    h.sweep(at("2026-03-01 12:00:01"), at("2026-03-01 12:01:00"));
    assert_eq!(h.scheduler.view().switches(), 0);
    assert_eq!(h.scheduler.view().skipped(), 1);

    h.scheduler
        .handle_event(Event::TransitionEnded, at("2026-03-01 12:01:00"));
    h.sweep(at("2026-03-01 12:01:01"), at("2026-03-01 12:01:30"));
    assert_eq!(h.scheduler.view().switches(), 1);
    assert_eq!(
        h.display
            .view_changes()
            .into_iter()
            .filter(|change| matches!(change, ViewChange::Mode(_)))
            .count(),
        1
    );
}

#[test]
fn test_location_change_refetches_and_focuses() {
    let mut h = Harness::started(at("2026-03-01 12:00:00"));
    let now = at("2026-03-01 12:00:10");
    h.scheduler.handle_event(
        Event::LocationChanged(Location {
            latitude: 21.4225,
            longitude: 39.8262,
        }),
        now,
    );

    assert!(h.scheduler.view().guard().is_transitioning());
    assert!(matches!(
        h.display.view_changes().first(),
        Some(ViewChange::FocusStarted { .. })
    ));

    // The recheck spawns a lookup on a worker thread
    h.scheduler.on_timers(at("2026-03-01 12:00:11"));
    let event = h
        .events
        .recv_timeout(std::time::Duration::from_secs(5))
        .unwrap();
    assert!(matches!(event, Event::DeadlineFetched { .. }));
    h.scheduler.handle_event(event, at("2026-03-01 12:00:12"));
    assert_eq!(h.scheduler.deadline(), Some(six_pm()));

    h.sweep(at("2026-03-01 12:00:12"), at("2026-03-01 12:00:20"));
    assert!(!h.scheduler.view().guard().is_transitioning());
}

#[test]
fn test_first_check_fetches_the_deadline() {
    let mut h = Harness::new();
    let start = at("2026-03-01 17:00:00");
    h.scheduler.start(start);
    assert_eq!(h.scheduler.deadline(), None);

    h.sweep(start, at("2026-03-01 17:00:02"));
    h.scheduler.on_timers(at("2026-03-01 17:00:03"));
    let event = h
        .events
        .recv_timeout(std::time::Duration::from_secs(5))
        .unwrap();
    h.scheduler.handle_event(event, at("2026-03-01 17:00:03"));
    assert_eq!(h.scheduler.deadline(), Some(six_pm()));

    h.sweep(at("2026-03-01 17:00:04"), at("2026-03-01 17:00:05"));
    assert_eq!(
        h.scheduler.last_result().map(|r| r.seconds_until_deadline),
        Some(Some(3596))
    );
}

#[test]
fn test_failed_lookup_stays_dormant_and_retries() {
    let mut h = Harness::with(settings(), Arc::new(FailingSource));
    let start = at("2026-03-01 17:58:00");
    h.scheduler.start(start);

    h.sweep(start, at("2026-03-01 17:58:02"));
    h.scheduler.on_timers(at("2026-03-01 17:58:03"));
    let event = h
        .events
        .recv_timeout(std::time::Duration::from_secs(5))
        .unwrap();
    h.scheduler.handle_event(event, at("2026-03-01 17:58:03"));

    assert_eq!(h.scheduler.deadline(), None);
    assert_eq!(h.display.classifications(), vec![Classification::Dormant]);
    assert!(
        h.display
            .statuses()
            .iter()
            .any(|(level, _)| *level == StatusLevel::Warning)
    );

    // Next poll asks again
    h.sweep(at("2026-03-01 17:58:04"), at("2026-03-01 17:58:59"));
    h.scheduler.on_timers(at("2026-03-01 17:59:00"));
    assert!(
        h.events
            .recv_timeout(std::time::Duration::from_secs(5))
            .is_ok()
    );
    assert_eq!(h.sessions(), 0);
}

#[test]
fn test_shutdown_during_session_releases_everything() {
    let mut h = Harness::started(at("2026-03-01 12:00:00"));
    h.scheduler
        .trigger_manually(at("2026-03-01 12:00:01"))
        .unwrap();

    h.scheduler.shutdown(at("2026-03-01 12:00:02"));
    assert_eq!(h.output.live_nodes(), 0);
    assert!(!h.scheduler.sequencer().is_active());
    assert!(!h.scheduler.presenter().is_visible());
    assert_eq!(h.scheduler.next_wake(), None);
}

#[test]
fn test_lookup_from_before_relocation_is_discarded() {
    let mut h = Harness::with(settings(), Arc::new(LocationSource));
    let start = at("2026-03-01 12:00:00");
    h.scheduler.start(start);

    h.scheduler.on_timers(at("2026-03-01 12:00:03"));
    let old_lookup = wait_for_event(&h.events);

    let moved = at("2026-03-01 12:00:04");
    h.scheduler.handle_event(
        Event::LocationChanged(Location {
            latitude: 41.0,
            longitude: 29.0,
        }),
        moved,
    );
    h.scheduler.on_timers(at("2026-03-01 12:00:05"));
    let new_lookup = wait_for_event(&h.events);

    // The answer for the old location arrives late, after the relocation
    h.scheduler.handle_event(old_lookup, at("2026-03-01 12:00:06"));
    assert_eq!(h.scheduler.deadline(), None);

    h.scheduler.handle_event(new_lookup, at("2026-03-01 12:00:06"));
    assert_eq!(h.scheduler.deadline(), Some(Deadline::new(19, 30).unwrap()));
}

#[test]
fn test_reload_swaps_source_and_ignores_old_lookup() {
    let mut h = Harness::new();
    h.scheduler.start(at("2026-03-01 12:00:00"));
    h.scheduler.on_timers(at("2026-03-01 12:00:03"));
    let old_lookup = wait_for_event(&h.events);

    let seven_pm = Deadline::new(19, 0).unwrap();
    h.scheduler.apply_config(
        settings(),
        Some(Arc::new(FixedSource::new(seven_pm))),
        None,
        at("2026-03-01 12:00:04"),
    );
    assert_eq!(h.scheduler.deadline(), None);

    h.scheduler.on_timers(at("2026-03-01 12:00:05"));
    let new_lookup = wait_for_event(&h.events);

    h.scheduler.handle_event(old_lookup, at("2026-03-01 12:00:06"));
    h.scheduler.handle_event(new_lookup, at("2026-03-01 12:00:06"));
    assert_eq!(h.scheduler.deadline(), Some(seven_pm));
}

#[test]
fn test_reload_rearms_poll_and_renames_label() {
    let mut h = Harness::started(at("2026-03-01 12:00:00"));
    h.sweep(at("2026-03-01 12:00:00"), at("2026-03-01 12:00:10"));

    let mut reloaded = settings();
    reloaded.label = "Iftar".to_string();
    reloaded.poll_interval = Duration::seconds(120);
    h.scheduler
        .apply_config(reloaded, None, None, at("2026-03-01 12:00:10"));

    // Only a recheck: the stored deadline survives
    assert_eq!(h.scheduler.deadline(), Some(six_pm()));
    assert_eq!(
        h.scheduler.next_wake(),
        Some(at("2026-03-01 12:00:11"))
    );
    h.step(at("2026-03-01 12:00:11"));
    assert_eq!(
        h.scheduler.next_wake(),
        Some(at("2026-03-01 12:02:10"))
    );
    assert!(
        h.display
            .events()
            .contains(&DisplayEvent::Label("Iftar".to_string()))
    );
}

#[test]
fn test_reload_with_moved_location_behaves_like_relocation() {
    let mut h = Harness::with(settings(), Arc::new(LocationSource));
    let start = at("2026-03-01 12:00:00");
    h.scheduler.set_deadline(six_pm(), day(1), start);
    h.scheduler.start(start);
    h.sweep(start, at("2026-03-01 12:00:05"));

    let istanbul = Location {
        latitude: 41.0,
        longitude: 29.0,
    };
    h.scheduler
        .apply_config(settings(), None, Some(istanbul), at("2026-03-01 12:00:05"));

    assert!(h.scheduler.view().guard().is_transitioning());
    assert_eq!(
        h.display.view_changes().first(),
        Some(&ViewChange::FocusStarted {
            latitude: 41.0,
            longitude: 29.0,
        })
    );

    h.scheduler.on_timers(at("2026-03-01 12:00:06"));
    let lookup = wait_for_event(&h.events);
    h.scheduler.handle_event(lookup, at("2026-03-01 12:00:06"));
    assert_eq!(h.scheduler.deadline(), Some(Deadline::new(19, 30).unwrap()));

    // Same location again: no new focus transition
    h.sweep(at("2026-03-01 12:00:07"), at("2026-03-01 12:00:20"));
    h.scheduler
        .apply_config(settings(), None, Some(istanbul), at("2026-03-01 12:00:20"));
    let focus_count = h
        .display
        .view_changes()
        .into_iter()
        .filter(|change| matches!(change, ViewChange::FocusStarted { .. }))
        .count();
    assert_eq!(focus_count, 1);
}
