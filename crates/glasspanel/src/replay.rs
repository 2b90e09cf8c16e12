//! Recorded property logs and the loop that plays them into a panel.
//!
//! A log is JSON lines, one event per line, with timestamps in milliseconds
//! from the start of the recording:
//!
//! ```text
//! {"at_ms": 0, "event": "open"}
//! {"at_ms": 16, "event": "set", "path": "/engines/engine/rpm", "value": 2400}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::panel::Panel;
use crate::property::{PropertyPath, PropertyValue};
use crate::render::Renderer;
use crate::transport::PropertyTransport;

/// One line of a replay log, as written on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogLine {
    /// The connection opened.
    Open {
        /// Milliseconds from the start of the recording.
        at_ms: u64,
    },
    /// A property changed.
    Set {
        /// Milliseconds from the start of the recording.
        at_ms: u64,
        /// Property path.
        path: String,
        /// New value. A missing value is skipped; `null` counts as `0`.
        #[serde(
            default,
            deserialize_with = "present",
            skip_serializing_if = "Option::is_none"
        )]
        value: Option<Option<PropertyValue>>,
    },
}

// Distinguishes `"value": null` (Some(None)) from a missing field (None)
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<PropertyValue>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<PropertyValue>::deserialize(deserializer).map(Some)
}

/// What happens at a replay event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// The connection opened.
    Open,
    /// A property changed.
    Set(PropertyPath, PropertyValue),
}

/// A parsed replay event.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEvent {
    /// Offset from the start of the recording.
    pub at: Duration,
    /// What happened.
    pub kind: EventKind,
}

/// Read and parse a replay log file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line is malformed.
pub fn load(path: &Path) -> Result<Vec<ReplayEvent>> {
    let file = File::open(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse(BufReader::new(file))
}

/// Parse a replay log.
///
/// # Errors
///
/// Returns [`Error::Replay`] with the 1-based line number if a line is not a
/// valid event, names an empty path, or goes back in time.
pub fn parse(reader: impl BufRead) -> Result<Vec<ReplayEvent>> {
    let mut events = Vec::new();
    let mut last = Duration::ZERO;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let raw: LogLine =
            serde_json::from_str(trimmed).map_err(|e| Error::replay(line_no, e.to_string()))?;
        let (at_ms, kind) = match raw {
            LogLine::Open { at_ms } => (at_ms, EventKind::Open),
            LogLine::Set {
                at_ms,
                path,
                value: Some(value),
            } => {
                let path =
                    PropertyPath::new(&path).map_err(|e| Error::replay(line_no, e.to_string()))?;
                let value = value.unwrap_or(PropertyValue::Number(0.0));
                (at_ms, EventKind::Set(path, value))
            }
            LogLine::Set {
                path, value: None, ..
            } => {
                trace!(line = line_no, %path, "skipping set without a value");
                continue;
            }
        };

        let at = Duration::from_millis(at_ms);
        if at < last {
            return Err(Error::replay(
                line_no,
                format!("timestamp {at_ms}ms is earlier than the previous event"),
            ));
        }
        last = at;
        events.push(ReplayEvent { at, kind });
    }

    debug!(events = events.len(), "parsed replay log");
    Ok(events)
}

/// Summary of a finished replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReplayStats {
    /// Events applied to the panel.
    pub events: usize,
    /// Frames ticked.
    pub ticks: u64,
    /// Frames the dashboard actually rendered.
    pub rendered: u64,
    /// Virtual time at the end.
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Plays events into a panel one frame period at a time.
#[derive(Debug)]
pub struct Replayer<P, R> {
    panel: Panel<P, R>,
    events: VecDeque<ReplayEvent>,
    period: Duration,
    stats: ReplayStats,
    started: bool,
}

impl<P, R> Replayer<P, R>
where
    P: PropertyTransport,
    R: Renderer + 'static,
{
    /// Create a replayer ticking every `period`.
    #[must_use]
    pub fn new(panel: Panel<P, R>, events: Vec<ReplayEvent>, period: Duration) -> Self {
        Self {
            panel,
            events: events.into(),
            period: period.max(Duration::from_micros(1)),
            stats: ReplayStats::default(),
            started: false,
        }
    }

    /// Run one frame: move time forward by one period (except on the first
    /// tick), apply events that are due, then tick the panel's frame.
    ///
    /// Returns `false` once every event was applied and the panel is idle.
    pub fn tick(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        if self.started {
            self.panel.advance(self.period);
        }
        self.started = true;

        let now = self.panel.now();
        while self.events.front().is_some_and(|e| e.at <= now) {
            if let Some(event) = self.events.pop_front() {
                self.apply(event);
            }
        }

        self.stats.ticks += 1;
        if self.panel.frame() {
            self.stats.rendered += 1;
        }
        self.stats.elapsed = now;
        !self.is_finished()
    }

    /// Replay everything on virtual time.
    pub fn run(&mut self) -> ReplayStats {
        while self.tick() {}
        info!(
            events = self.stats.events,
            rendered = self.stats.rendered,
            "replay finished"
        );
        self.stats
    }

    /// Replay everything, pacing ticks in wall-clock time.
    pub async fn run_realtime(&mut self) -> ReplayStats {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !self.tick() {
                break;
            }
        }
        info!(
            events = self.stats.events,
            rendered = self.stats.rendered,
            "realtime replay finished"
        );
        self.stats
    }

    /// Whether all events were applied and nothing is left to run.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.started && self.events.is_empty() && self.panel.is_idle()
    }

    /// Statistics so far.
    #[must_use]
    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    /// The panel being driven.
    #[must_use]
    pub fn panel(&self) -> &Panel<P, R> {
        &self.panel
    }

    /// Consume the replayer and return the panel.
    pub fn into_panel(self) -> Panel<P, R> {
        self.panel
    }

    fn apply(&mut self, event: ReplayEvent) {
        self.stats.events += 1;
        match event.kind {
            EventKind::Open => self.panel.open(),
            EventKind::Set(path, value) => self.panel.property_changed(&path, value),
        }
    }
}
