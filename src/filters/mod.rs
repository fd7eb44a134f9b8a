//! Streaming filters for playlists and guide documents
//!
//! Both filters read their input incrementally and route each finalized unit
//! (a playlist entry, a guide channel or programme) to either the kept or the
//! removed output. Neither input is ever held in memory as a whole.

pub mod counting;
pub mod duplicates;
pub mod guide;
pub mod playlist;

use serde::Serialize;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

pub use counting::{count_guide_units, GuideCounts};
pub use duplicates::DuplicateTracker;
pub use guide::filter_guide;
pub use playlist::filter_playlist;

/// The pair of sinks a filter writes to
#[derive(Debug)]
pub struct FilterOutputs<W> {
    pub kept: W,
    pub removed: W,
}

impl<W: AsyncWrite + Unpin> FilterOutputs<W> {
    pub fn new(kept: W, removed: W) -> Self {
        Self { kept, removed }
    }

    /// Write to the sink selected by the keep decision
    pub async fn write(&mut self, keep: bool, bytes: &[u8]) -> std::io::Result<()> {
        if keep {
            self.kept.write_all(bytes).await
        } else {
            self.removed.write_all(bytes).await
        }
    }

    pub async fn write_both(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.kept.write_all(bytes).await?;
        self.removed.write_all(bytes).await
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        self.kept.flush().await?;
        self.removed.flush().await
    }

    /// Flush on an error path; a failure here is logged and not reported
    pub(crate) async fn flush_best_effort(&mut self) {
        if let Err(e) = self.flush().await {
            warn!("Failed to flush partial filter output: {}", e);
        }
    }

    pub fn into_inner(self) -> (W, W) {
        (self.kept, self.removed)
    }
}

/// How a filter pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOutcome {
    Completed,
    Cancelled,
}

/// Unit tallies of one filter pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub processed: u64,
    pub kept: u64,
    pub removed: u64,
    pub duplicates: u64,
    pub outcome: FilterOutcome,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl Default for FilterStats {
    fn default() -> Self {
        Self {
            processed: 0,
            kept: 0,
            removed: 0,
            duplicates: 0,
            outcome: FilterOutcome::Completed,
            elapsed: Duration::ZERO,
        }
    }
}

impl FilterStats {
    pub(crate) fn record(&mut self, keep: bool) {
        self.processed += 1;
        if keep {
            self.kept += 1;
        } else {
            self.removed += 1;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == FilterOutcome::Cancelled
    }
}

/// Guide pass tallies: channels drive the run counters, programmes only follow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GuideStats {
    pub channels: FilterStats,
    pub programmes_kept: u64,
    pub programmes_removed: u64,
}

impl GuideStats {
    pub fn programmes(&self) -> u64 {
        self.programmes_kept + self.programmes_removed
    }
}
