//! Banner visibility and the countdown slot.
//!
//! Two independent reasons can keep the banner up: the evaluator saying the
//! deadline is near, and a live (or just finished) effect session. The banner
//! is visible while either holds, and the display only hears about changes.

use chrono::{DateTime, Local};

use crate::core::countdown::{CountdownPurpose, CountdownTimer};
use crate::core::evaluator::EvaluationResult;
use crate::display::{CountdownText, Display};

#[derive(Debug, Default)]
pub struct NotificationPresenter {
    approach_visible: bool,
    session_visible: bool,
    shown: bool,
    countdown: Option<CountdownTimer>,
    text: Option<CountdownText>,
}

impl NotificationPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.shown
    }

    pub fn countdown(&self) -> Option<&CountdownTimer> {
        self.countdown.as_ref()
    }

    pub fn text(&self) -> Option<&CountdownText> {
        self.text.as_ref()
    }

    /// True while the session owns the banner and the countdown slot.
    pub fn session_owns_banner(&self) -> bool {
        self.session_visible
    }

    /// React to one poll's evaluation. Safe to call repeatedly with the same
    /// result: no restart and no display traffic unless something changed.
    pub fn on_evaluation(
        &mut self,
        result: &EvaluationResult,
        now: DateTime<Local>,
        display: &mut dyn Display,
    ) {
        self.approach_visible = result.classification.shows_banner();

        if !self.session_visible {
            match (self.approach_visible, result.seconds_until_deadline) {
                (true, Some(secs)) if secs > 0 => self.follow_deadline(secs as u64, now, display),
                _ => {
                    if self.holds(CountdownPurpose::PreApproach) {
                        self.countdown = None;
                    }
                }
            }
        }

        self.sync_visibility(display);
    }

    fn holds(&self, purpose: CountdownPurpose) -> bool {
        self.countdown
            .as_ref()
            .is_some_and(|countdown| countdown.purpose() == purpose)
    }

    fn follow_deadline(&mut self, secs: u64, now: DateTime<Local>, display: &mut dyn Display) {
        match self.countdown.as_ref().map(CountdownTimer::purpose) {
            Some(CountdownPurpose::Session) => return,
            Some(CountdownPurpose::PreApproach) => {
                self.tick(now, display);
                if self.countdown.as_ref().is_some_and(|c| c.remaining() == secs) {
                    return;
                }
            }
            None => {}
        }
        self.countdown = Some(CountdownTimer::start(CountdownPurpose::PreApproach, secs, now));
        self.push_text(CountdownText::Remaining(secs), display);
    }

    /// The effect session started: it takes the banner and the countdown slot.
    pub fn session_started(&mut self, total: u64, now: DateTime<Local>, display: &mut dyn Display) {
        self.session_visible = true;
        self.countdown = Some(CountdownTimer::start(CountdownPurpose::Session, total, now));
        self.push_text(CountdownText::Remaining(total), display);
        self.sync_visibility(display);
    }

    /// The session was torn down: stop its countdown and leave `message`
    /// showing. The banner stays up until [`Self::release_banner`].
    pub fn session_finished(&mut self, message: String, display: &mut dyn Display) {
        self.countdown = None;
        self.push_text(CountdownText::Message(message), display);
    }

    /// The grace period after a session is over.
    pub fn release_banner(&mut self, display: &mut dyn Display) {
        self.session_visible = false;
        self.sync_visibility(display);
    }

    pub fn tick(&mut self, now: DateTime<Local>, display: &mut dyn Display) {
        if let Some(remaining) = self.countdown.as_mut().and_then(|countdown| countdown.tick(now)) {
            self.push_text(CountdownText::Remaining(remaining), display);
        }
    }

    pub fn next_tick(&self) -> Option<DateTime<Local>> {
        self.countdown.as_ref().and_then(CountdownTimer::next_tick)
    }

    fn push_text(&mut self, text: CountdownText, display: &mut dyn Display) {
        if self.text.as_ref() != Some(&text) {
            display.countdown(&text);
            self.text = Some(text);
        }
    }

    fn sync_visibility(&mut self, display: &mut dyn Display) {
        let visible = self.approach_visible || self.session_visible;
        if visible != self.shown {
            self.shown = visible;
            display.notification_visibility(visible);
        }
    }
}
