//! Focus transitions and the cinematic view cycle.

use chrono::{DateTime, Duration, Local};

use crate::core::guard::{TransitionGuard, TransitionTicket};
use crate::display::{Display, ViewChange, ViewMode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSettings {
    pub cinematic: bool,
    pub cinematic_interval: Duration,
    pub focus_duration: Duration,
}

/// Drives automatic view switching and keeps it out of the way of running
/// transitions.
pub struct ViewController {
    settings: ViewSettings,
    guard: TransitionGuard,
    mode: ViewMode,
    next_switch: Option<DateTime<Local>>,
    focus: Option<(TransitionTicket, DateTime<Local>)>,
    external: Option<TransitionTicket>,
    switches: u64,
    skipped: u64,
}

impl ViewController {
    pub fn new(settings: ViewSettings, guard: TransitionGuard) -> Self {
        Self {
            settings,
            guard,
            mode: ViewMode::Globe,
            next_switch: None,
            focus: None,
            external: None,
            switches: 0,
            skipped: 0,
        }
    }

    pub fn guard(&self) -> &TransitionGuard {
        &self.guard
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Automatic switches performed so far.
    pub fn switches(&self) -> u64 {
        self.switches
    }

    /// Cinematic turns given up because a transition was in flight.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn start(&mut self, now: DateTime<Local>) {
        self.next_switch = self
            .settings
            .cinematic
            .then(|| now + self.settings.cinematic_interval);
    }

    pub fn apply_settings(&mut self, settings: ViewSettings, now: DateTime<Local>) {
        let rearm = settings != self.settings;
        self.settings = settings;
        if rearm {
            self.start(now);
        }
    }

    /// Fly to a new location. A focus transition already running is replaced.
    pub fn focus_on(
        &mut self,
        latitude: f64,
        longitude: f64,
        now: DateTime<Local>,
        display: &mut dyn Display,
    ) {
        let ticket = self.guard.begin();
        self.focus = Some((ticket, now + self.settings.focus_duration));
        display.view_changed(ViewChange::FocusStarted {
            latitude,
            longitude,
        });
    }

    /// A transition driven by somebody else began.
    pub fn external_started(&mut self) {
        self.external = Some(self.guard.begin());
    }

    pub fn external_ended(&mut self) {
        self.external = None;
    }

    /// Run whatever is due: finish an expired focus transition, then take
    /// the cinematic turn unless a transition is still in flight.
    pub fn on_timers(&mut self, now: DateTime<Local>, display: &mut dyn Display) {
        if let Some((_, until)) = &self.focus
            && *until <= now
        {
            self.focus = None;
            display.view_changed(ViewChange::FocusEnded);
        }

        let Some(due) = self.next_switch else {
            return;
        };
        if due > now {
            return;
        }

        let mut next = due;
        while next <= now {
            next += self.settings.cinematic_interval;
        }
        self.next_switch = Some(next);

        if self.guard.is_transitioning() {
            self.skipped += 1;
            return;
        }

        self.mode = self.mode.toggled();
        self.switches += 1;
        display.view_changed(ViewChange::Mode(self.mode));
    }

    pub fn next_due(&self) -> Option<DateTime<Local>> {
        let focus_end = self.focus.as_ref().map(|(_, until)| *until);
        match (focus_end, self.next_switch) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Abandon every transition this controller holds.
    pub fn stop(&mut self) {
        self.focus = None;
        self.external = None;
        self.next_switch = None;
    }
}
