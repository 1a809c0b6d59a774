//! What the dashboard card shows.

use chrono::Local;
use std::fmt;
use std::io::{self, Write};
use tracing::info;

/// Display text while no rate is available.
pub const CALCULATING_TEXT: &str = "Calculating...";

/// Display text once failed polls reach the threshold.
pub const NETWORK_ERROR_TEXT: &str = "Network error";

/// State of the block rate card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayState {
    /// A rate in blocks per second.
    Rate(f64),
    /// Not enough data yet, or the window was just reset.
    Calculating,
    /// Too many consecutive failed polls.
    NetworkError,
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayState::Rate(rate) => write!(f, "{rate:.1} bps"),
            DisplayState::Calculating => f.write_str(CALCULATING_TEXT),
            DisplayState::NetworkError => f.write_str(NETWORK_ERROR_TEXT),
        }
    }
}

/// Receives the display text after every poll.
pub trait DisplaySink: Send {
    /// Shows `text`.
    fn show(&mut self, text: &str);
}

impl<T: DisplaySink + ?Sized> DisplaySink for Box<T> {
    fn show(&mut self, text: &str) {
        (**self).show(text);
    }
}

/// Prints every update to stdout with a local timestamp.
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl DisplaySink for ConsoleDisplay {
    fn show(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{} Avg Blocks: {text}", Local::now().format("%H:%M:%S"));
    }
}

/// Emits updates as log events only when the text changes.
#[derive(Debug, Default)]
pub struct LogDisplay {
    last: Option<String>,
}

impl DisplaySink for LogDisplay {
    fn show(&mut self, text: &str) {
        if self.last.as_deref() == Some(text) {
            return;
        }
        info!(target: "blockrate::display", display = text, "display updated");
        self.last = Some(text.to_string());
    }
}
