//! Periodic progress reporting
//!
//! The reporter is a separate task that samples [`RunState`](super::RunState) on its
//! own cadence and broadcasts a [`ProgressEvent`]. It never writes run state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::trace;
use uuid::Uuid;

use super::controller::{Phase, RunController, RunSnapshot};
use crate::config::ReportingConfig;

/// Structured status event delivered to whoever presents progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: Uuid,
    pub phase: Phase,
    pub message: String,
    pub percentage: f64,
    pub processed: u64,
    pub total: Option<u64>,
    pub kept: u64,
    pub removed: u64,
    pub paused: bool,
    /// Final event for the run (completion, cancellation or failure)
    pub terminal: bool,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn from_snapshot(run_id: Uuid, snapshot: &RunSnapshot) -> Self {
        Self {
            run_id,
            phase: snapshot.phase,
            message: describe(snapshot),
            percentage: snapshot.percentage(),
            processed: snapshot.processed,
            total: (snapshot.total > 0).then_some(snapshot.total),
            kept: snapshot.kept,
            removed: snapshot.removed,
            paused: snapshot.paused,
            terminal: false,
            timestamp: Utc::now(),
        }
    }

    /// Event carrying a caller supplied message, e.g. input-missing or a step failure
    pub fn status(run_id: Uuid, snapshot: &RunSnapshot, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::from_snapshot(run_id, snapshot)
        }
    }

    pub fn terminal(run_id: Uuid, snapshot: &RunSnapshot, message: impl Into<String>) -> Self {
        Self {
            terminal: true,
            ..Self::status(run_id, snapshot, message)
        }
    }
}

fn describe(snapshot: &RunSnapshot) -> String {
    let prefix = if snapshot.paused { "Paused - " } else { "" };
    match snapshot.phase {
        Phase::Counting => format!("{prefix}Counting guide entries: {} channels found", snapshot.processed),
        Phase::Playlist => format!(
            "{prefix}Filtering playlist: {} entries ({} kept, {} removed)",
            snapshot.processed, snapshot.kept, snapshot.removed
        ),
        Phase::Guide if snapshot.total > 0 => format!(
            "{prefix}Filtering guide: {}/{} channels ({} kept, {} removed)",
            snapshot.processed, snapshot.total, snapshot.kept, snapshot.removed
        ),
        Phase::Guide => format!(
            "{prefix}Filtering guide: {} channels ({} kept, {} removed)",
            snapshot.processed, snapshot.kept, snapshot.removed
        ),
        Phase::Exporting => format!("{prefix}Exporting filtered files"),
        other => format!("{prefix}{}", capitalize(other.as_str())),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Samples run state and broadcasts progress until the run finishes
pub struct ProgressReporter {
    run_id: Uuid,
    controller: RunController,
    intervals: ReportingConfig,
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressReporter {
    pub fn new(
        run_id: Uuid,
        controller: RunController,
        intervals: ReportingConfig,
        sender: broadcast::Sender<ProgressEvent>,
    ) -> Self {
        Self {
            run_id,
            controller,
            intervals,
            sender,
        }
    }

    fn interval_for(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Counting => self.intervals.counting_interval,
            Phase::Guide => self.intervals.guide_interval,
            _ => self.intervals.playlist_interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        loop {
            let interval = self.interval_for(self.controller.state().phase());
            tokio::select! {
                _ = self.controller.finished() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            if !self.controller.is_processing() {
                break;
            }

            let snapshot = self.controller.snapshot();
            if snapshot.phase.is_terminal() || snapshot.phase == Phase::Idle {
                continue;
            }

            let event = ProgressEvent::from_snapshot(self.run_id, &snapshot);
            trace!(
                "Progress phase={} processed={} percentage={:.1}",
                event.phase,
                event.processed,
                event.percentage
            );
            // No subscribers is not an error for a progress indicator
            let _ = self.sender.send(event);
        }
    }
}
