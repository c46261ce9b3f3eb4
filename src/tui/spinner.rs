//! Spinner shown until the first token arrives

use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

const TICKS: &[&str] = &[
    "\u{2800}", "\u{2801}", "\u{2803}", "\u{2807}", "\u{280f}", "\u{281f}", "\u{283f}",
    "\u{287f}", "\u{28ff}", "\u{28fe}", "\u{28fc}", "\u{28f8}", "\u{28f0}", "\u{28e0}",
    "\u{28c0}", "\u{2880}", "\u{2800}",
];

const TICK_INTERVAL: Duration = Duration::from_millis(80);

/// Spinner drawn on stderr while a prediction warms up.
///
/// Remembers when it was started so the caller can report how long the
/// model took to produce its first fragment.
pub struct ThinkingSpinner {
    bar: ProgressBar,
    started: Option<Instant>,
}

impl ThinkingSpinner {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template("  {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        Self { bar, started: None }
    }

    /// A spinner that never draws, for piped output
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            started: None,
        }
    }

    pub fn start(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
        self.bar.enable_steady_tick(TICK_INTERVAL);
        self.started = Some(Instant::now());
    }

    /// Clear the spinner and return how long it ran.
    ///
    /// Only the first call after `start` returns a duration.
    pub fn stop(&mut self) -> Option<Duration> {
        let started = self.started.take()?;
        self.bar.finish_and_clear();
        Some(started.elapsed())
    }
}

impl Default for ThinkingSpinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThinkingSpinner {
    fn drop(&mut self) {
        self.stop();
    }
}
