//! Shared run state and the pause/cancel protocol
//!
//! The worker is the only writer of the counters; the progress reporter reads
//! them concurrently. Counters are relaxed atomics, so a reader may observe a
//! slightly stale snapshot, which is fine for progress display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::throttle::RunMode;

/// Pipeline phase currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Counting = 1,
    Playlist = 2,
    Guide = 3,
    Exporting = 4,
    Completed = 5,
    Cancelled = 6,
    Failed = 7,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Counting,
            2 => Phase::Playlist,
            3 => Phase::Guide,
            4 => Phase::Exporting,
            5 => Phase::Completed,
            6 => Phase::Cancelled,
            7 => Phase::Failed,
            _ => Phase::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Counting => "counting",
            Phase::Playlist => "playlist",
            Phase::Guide => "guide",
            Phase::Exporting => "exporting",
            Phase::Completed => "completed",
            Phase::Cancelled => "cancelled",
            Phase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a pause/cancel checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Cancelled,
}

impl Checkpoint {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Checkpoint::Cancelled)
    }
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSnapshot {
    pub phase: Phase,
    pub processing: bool,
    pub paused: bool,
    pub cancelled: bool,
    pub processed: u64,
    pub kept: u64,
    pub removed: u64,
    pub total: u64,
    pub bytes_read: u64,
    pub bytes_total: u64,
}

impl RunSnapshot {
    /// Progress through the current phase, 0-100
    pub fn percentage(&self) -> f64 {
        let ratio = match self.phase {
            Phase::Completed => return 100.0,
            Phase::Guide if self.total > 0 => self.processed as f64 / self.total as f64,
            Phase::Playlist | Phase::Counting | Phase::Guide if self.bytes_total > 0 => {
                self.bytes_read as f64 / self.bytes_total as f64
            }
            _ => 0.0,
        };
        (ratio * 100.0).clamp(0.0, 100.0)
    }
}

/// Counters and flags for one run
#[derive(Debug, Default)]
pub struct RunState {
    processing: AtomicBool,
    phase: AtomicU8,
    processed: AtomicU64,
    kept: AtomicU64,
    removed: AtomicU64,
    total: AtomicU64,
    bytes_read: AtomicU64,
    bytes_total: AtomicU64,
}

impl RunState {
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Relaxed))
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn kept(&self) -> u64 {
        self.kept.load(Ordering::Relaxed)
    }

    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::Relaxed)
    }

    /// Switch phase and reset the per-phase counters
    pub fn begin_phase(&self, phase: Phase, total: u64, bytes_total: u64) {
        self.processed.store(0, Ordering::Relaxed);
        self.kept.store(0, Ordering::Relaxed);
        self.removed.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
        self.bytes_total.store(bytes_total, Ordering::Relaxed);
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    /// Change the phase label without touching counters
    pub fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decision(&self, kept: bool) {
        if kept {
            self.kept.fetch_add(1, Ordering::Relaxed);
        } else {
            self.removed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_bytes(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn set_bytes_read(&self, bytes: u64) {
        self.bytes_read.store(bytes, Ordering::Relaxed);
    }

    fn snapshot(&self, paused: bool, cancelled: bool) -> RunSnapshot {
        RunSnapshot {
            phase: self.phase(),
            processing: self.processing.load(Ordering::Relaxed),
            paused,
            cancelled,
            processed: self.processed(),
            kept: self.kept(),
            removed: self.removed(),
            total: self.total.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_total: self.bytes_total.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    mode: RunMode,
    state: RunState,
    cancel: CancellationToken,
    finished: CancellationToken,
    paused: watch::Sender<bool>,
}

/// Handle shared by the worker, the reporter and whoever drives the run
#[derive(Clone)]
pub struct RunController {
    inner: Arc<Inner>,
}

impl fmt::Debug for RunController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunController")
            .field("mode", &self.inner.mode)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl RunController {
    pub fn new(mode: RunMode) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                mode,
                state: RunState::default(),
                cancel: CancellationToken::new(),
                finished: CancellationToken::new(),
                paused,
            }),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.inner.mode
    }

    pub fn state(&self) -> &RunState {
        &self.inner.state
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.inner.state.snapshot(self.is_paused(), self.is_cancelled())
    }

    /// Request cancellation. One-way; also clears the processing flag.
    pub fn cancel(&self) {
        if !self.inner.cancel.is_cancelled() {
            debug!("Cancellation requested");
        }
        self.inner.cancel.cancel();
        self.inner.state.processing.store(false, Ordering::Relaxed);
    }

    pub fn pause(&self) {
        self.inner.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.inner.paused.send_replace(false);
    }

    /// Flip the pause flag, returning the new state
    pub fn toggle_pause(&self) -> bool {
        let was_paused = self.inner.paused.send_replace(!self.is_paused());
        !was_paused
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.state.processing.load(Ordering::Relaxed)
    }

    pub(crate) fn start_processing(&self) {
        self.inner.state.processing.store(true, Ordering::Relaxed);
    }

    /// Mark the run as no longer processing and wake anything awaiting it
    pub(crate) fn finish(&self) {
        self.inner.state.processing.store(false, Ordering::Relaxed);
        self.inner.finished.cancel();
    }

    /// Resolves once the run has finished
    pub async fn finished(&self) {
        self.inner.finished.cancelled().await;
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await;
    }

    /// Observe cancel, and block while paused without consuming input
    pub async fn checkpoint(&self) -> Checkpoint {
        if self.is_cancelled() {
            return Checkpoint::Cancelled;
        }

        if self.is_paused() {
            debug!("Run paused, waiting for resume");
            let mut paused = self.inner.paused.subscribe();
            tokio::select! {
                _ = self.inner.cancel.cancelled() => return Checkpoint::Cancelled,
                _ = wait_resumed(&mut paused) => {}
            }
            debug!("Run resumed");
        }

        if self.is_cancelled() {
            Checkpoint::Cancelled
        } else {
            Checkpoint::Continue
        }
    }

    /// Throttle delay followed by a checkpoint; the sleep is cut short by cancel
    pub async fn after_unit(&self, delay: Duration) -> Checkpoint {
        if !delay.is_zero() {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => return Checkpoint::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.checkpoint().await
    }
}

async fn wait_resumed(paused: &mut watch::Receiver<bool>) {
    // The sender lives as long as the controller, so this only errors on teardown
    let _ = paused.wait_for(|is_paused| !*is_paused).await.map(|_| ());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_checkpoint_continues_when_idle() {
        let controller = RunController::new(RunMode::Manual);
        assert_eq!(controller.checkpoint().await, Checkpoint::Continue);
    }

    #[tokio::test]
    async fn test_cancel_is_one_way() {
        let controller = RunController::new(RunMode::Manual);
        controller.start_processing();
        controller.cancel();
        assert!(controller.is_cancelled());
        assert!(!controller.is_processing());
        controller.resume();
        assert_eq!(controller.checkpoint().await, Checkpoint::Cancelled);
    }

    #[tokio::test]
    async fn test_checkpoint_blocks_while_paused() {
        let controller = RunController::new(RunMode::Manual);
        controller.pause();

        let worker = controller.clone();
        let handle = tokio::spawn(async move { worker.checkpoint().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        controller.resume();
        assert_eq!(handle.await.unwrap(), Checkpoint::Continue);
    }

    #[tokio::test]
    async fn test_cancel_wakes_paused_checkpoint() {
        let controller = RunController::new(RunMode::Manual);
        controller.pause();

        let worker = controller.clone();
        let handle = tokio::spawn(async move { worker.checkpoint().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        controller.cancel();
        assert_eq!(handle.await.unwrap(), Checkpoint::Cancelled);
    }

    #[tokio::test]
    async fn test_toggle_pause() {
        let controller = RunController::new(RunMode::Automatic);
        assert!(controller.toggle_pause());
        assert!(controller.is_paused());
        assert!(!controller.toggle_pause());
        assert!(!controller.is_paused());
    }

    #[tokio::test]
    async fn test_after_unit_cut_short_by_cancel() {
        let controller = RunController::new(RunMode::Manual);
        let worker = controller.clone();
        let handle =
            tokio::spawn(async move { worker.after_unit(Duration::from_secs(30)).await });
        controller.cancel();
        assert_eq!(handle.await.unwrap(), Checkpoint::Cancelled);
    }

    #[test]
    fn test_counters_and_percentage() {
        let controller = RunController::new(RunMode::Manual);
        let state = controller.state();
        state.begin_phase(Phase::Guide, 4, 0);
        for kept in [true, false, true] {
            state.record_processed();
            state.record_decision(kept);
        }
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.kept, 2);
        assert_eq!(snapshot.removed, 1);
        assert_eq!(snapshot.percentage(), 75.0);

        state.begin_phase(Phase::Playlist, 0, 200);
        state.add_bytes(50);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.processed, 0);
        assert_eq!(snapshot.percentage(), 25.0);
    }
}
