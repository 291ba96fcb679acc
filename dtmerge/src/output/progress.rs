//! Page progress indicator.
//!
//! Draws a single self-overwriting line on stderr while a merge runs. The
//! indicator disables itself when stderr is not a terminal.
//!
//! # Examples
//!
//! ```
//! use dtmerge::output::progress::{ProgressBar, ProgressStyle};
//!
//! let mut progress = ProgressBar::new(3, ProgressStyle::Bar);
//! for page in 1..=3 {
//!     progress.set_message(format!("scan.tif-p{page:03}"));
//!     progress.update(page);
//! }
//! progress.finish();
//! ```

use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};

const BAR_WIDTH: usize = 30;

/// Style of progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStyle {
    /// `[=====>     ] 50% 5/10`
    Bar,
    /// `5/10`
    Counter,
}

/// Progress indicator for page-by-page work.
#[derive(Debug)]
pub struct ProgressBar {
    total: usize,
    current: usize,
    style: ProgressStyle,
    message: Option<String>,
    started: Instant,
    last_draw: Option<Instant>,
    interval: Duration,
    enabled: bool,
}

impl ProgressBar {
    /// Create a progress indicator for `total` items.
    pub fn new(total: usize, style: ProgressStyle) -> Self {
        Self {
            total,
            current: 0,
            style,
            message: None,
            started: Instant::now(),
            last_draw: None,
            interval: Duration::from_millis(80),
            enabled: io::stderr().is_terminal(),
        }
    }

    /// Indicator that never draws anything.
    pub fn disabled() -> Self {
        let mut bar = Self::new(0, ProgressStyle::Counter);
        bar.enabled = false;
        bar
    }

    /// Whether the indicator draws to the terminal.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Text shown after the bar, typically the current page label.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Set the completed count and redraw if enough time has passed.
    ///
    /// The final item always draws.
    pub fn update(&mut self, current: usize) {
        self.current = current.min(self.total);

        let due = self
            .last_draw
            .is_none_or(|last| last.elapsed() >= self.interval);
        if due || self.current == self.total {
            self.draw();
        }
    }

    /// Complete the indicator and move to a fresh line.
    pub fn finish(&mut self) {
        self.current = self.total;
        if self.enabled {
            self.draw();
            eprintln!();
        }
    }

    /// Erase the indicator line.
    pub fn clear(&self) {
        if self.enabled {
            eprint!("\r\x1b[K");
            io::stderr().flush().ok();
        }
    }

    /// Current line contents.
    pub fn line(&self) -> String {
        let counter = format!("{}/{}", self.current, self.total);
        let mut line = match self.style {
            ProgressStyle::Counter => counter,
            ProgressStyle::Bar => {
                let filled = BAR_WIDTH * self.current / self.total.max(1);
                let head = if filled > 0 && filled < BAR_WIDTH { ">" } else { "" };
                let body = "=".repeat(filled.saturating_sub(head.len()));
                let percent = 100 * self.current / self.total.max(1);
                format!(
                    "[{body}{head}{}] {percent:>3}% {counter}",
                    " ".repeat(BAR_WIDTH - filled)
                )
            }
        };

        line.push(' ');
        line.push_str(&format_duration(self.started.elapsed()));
        if let Some(message) = &self.message {
            line.push(' ');
            line.push_str(message);
        }
        line
    }

    fn draw(&mut self) {
        self.last_draw = Some(Instant::now());
        if self.enabled {
            eprint!("\r\x1b[K{}", self.line());
            io::stderr().flush().ok();
        }
    }
}

/// Format a duration as `1.2s`, `3m 04s` or `1h 02m`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}
