//! Output surface for classification, banner and countdown state.
//!
//! The scheduler only ever talks to a [`Display`]; the terminal implementation
//! writes through the logging macros, tests substitute a recorder.

use std::fmt;

use crate::common::utils::format_countdown;
use crate::core::evaluator::EvaluationResult;

/// Camera framing used by cinematic mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Globe,
    Orbit,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Globe => ViewMode::Orbit,
            ViewMode::Orbit => ViewMode::Globe,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewChange {
    Mode(ViewMode),
    FocusStarted { latitude: f64, longitude: f64 },
    FocusEnded,
}

/// What the countdown slot currently reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownText {
    Remaining(u64),
    Message(String),
}

impl fmt::Display for CountdownText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountdownText::Remaining(secs) => f.write_str(&format_countdown(*secs)),
            CountdownText::Message(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Consumer of everything the scheduler wants a user to see.
///
/// Callers only invoke these on actual changes, so implementations need no
/// de-duplication of their own.
pub trait Display: Send {
    fn classification_changed(&mut self, result: &EvaluationResult);
    fn notification_visibility(&mut self, visible: bool);
    fn countdown(&mut self, text: &CountdownText);
    fn status(&mut self, level: StatusLevel, message: &str);
    fn view_changed(&mut self, change: ViewChange);
    /// The configured label changed on reload.
    fn label_changed(&mut self, _label: &str) {}
}

/// Renders display updates into the log pipe.
pub struct TerminalDisplay {
    label: String,
    debug_enabled: bool,
}

impl TerminalDisplay {
    pub fn new(label: impl Into<String>, debug_enabled: bool) -> Self {
        Self {
            label: label.into(),
            debug_enabled,
        }
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    // Whole minutes and the final ten seconds; every second only in debug mode.
    fn worth_logging(&self, remaining: u64) -> bool {
        self.debug_enabled || remaining % 60 == 0 || remaining <= 10
    }
}

impl Display for TerminalDisplay {
    fn label_changed(&mut self, label: &str) {
        self.set_label(label);
    }

    fn classification_changed(&mut self, result: &EvaluationResult) {
        match result.seconds_until_deadline {
            Some(secs) if secs > 0 => log_block_start!(
                "{} is {} ({} remaining)",
                self.label,
                result.classification,
                crate::common::utils::format_minutes_seconds(secs)
            ),
            _ => log_block_start!("{} is {}", self.label, result.classification),
        }
    }

    fn notification_visibility(&mut self, visible: bool) {
        if visible {
            log_decorated!("Notification shown");
        } else {
            log_decorated!("Notification hidden");
        }
    }

    fn countdown(&mut self, text: &CountdownText) {
        match text {
            CountdownText::Remaining(secs) if !self.worth_logging(*secs) => {}
            _ => log_indented!("{text}"),
        }
    }

    fn status(&mut self, level: StatusLevel, message: &str) {
        match level {
            StatusLevel::Info => log_decorated!("{message}"),
            StatusLevel::Success => {
                log_pipe!();
                log_info!("{message}");
            }
            StatusLevel::Warning => {
                log_pipe!();
                log_warning!("{message}");
            }
            StatusLevel::Error => {
                log_pipe!();
                log_error!("{message}");
            }
        }
    }

    fn view_changed(&mut self, change: ViewChange) {
        if !self.debug_enabled {
            return;
        }
        match change {
            ViewChange::Mode(mode) => log_decorated!("View switched to {mode:?}"),
            ViewChange::FocusStarted {
                latitude,
                longitude,
            } => log_decorated!("Focusing view on {latitude:.4}°, {longitude:.4}°"),
            ViewChange::FocusEnded => log_decorated!("Focus transition finished"),
        }
    }
}
