//! Filter job orchestration
//!
//! A [`FilterJob`] owns one [`RunController`] and one compiled [`RuleEngine`] and
//! runs the guide counting pass, the playlist filter and the guide filter in
//! sequence, then exports the kept outputs. Every step reports its own outcome;
//! no error escapes [`FilterJob::run`].

pub mod output;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{BufReader, BufWriter};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, PathsConfig, ReportingConfig};
use crate::errors::{AppError, AppResult};
use crate::filters::{
    count_guide_units, filter_guide, filter_playlist, FilterOutputs, FilterStats, GuideCounts,
    GuideStats,
};
use crate::rules::RuleEngine;
use crate::run::{Phase, ProgressEvent, ProgressReporter, RunController};
use crate::utils::decompression::{DecompressionService, PreparedInput};
use crate::utils::{format_bytes, format_duration, CrashLog};

pub use output::{export_files, OutputPaths};

/// Result of one pipeline step
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome<S> {
    Completed { stats: S, outputs: OutputPaths },
    Cancelled { stats: S, outputs: OutputPaths },
    Skipped { reason: String },
    Failed { error: String },
}

impl<S> StepOutcome<S> {
    pub fn stats(&self) -> Option<&S> {
        match self {
            Self::Completed { stats, .. } | Self::Cancelled { stats, .. } => Some(stats),
            _ => None,
        }
    }

    pub fn outputs(&self) -> Option<&OutputPaths> {
        match self {
            Self::Completed { outputs, .. } | Self::Cancelled { outputs, .. } => Some(outputs),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Per-step outcomes of one run
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub run_id: Uuid,
    pub phase: Phase,
    pub playlist: StepOutcome<FilterStats>,
    pub guide: StepOutcome<GuideStats>,
    pub guide_counts: Option<GuideCounts>,
    /// Counting failed and the fixed estimate was used instead
    pub counts_estimated: bool,
    pub exported: Vec<PathBuf>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl JobSummary {
    pub fn is_cancelled(&self) -> bool {
        self.phase == Phase::Cancelled
    }

    /// One-line summary of kept/removed per file
    pub fn describe(&self) -> String {
        let playlist = match &self.playlist {
            StepOutcome::Completed { stats, .. } | StepOutcome::Cancelled { stats, .. } => {
                format!("{} kept, {} removed", stats.kept, stats.removed)
            }
            StepOutcome::Skipped { reason } => format!("skipped ({reason})"),
            StepOutcome::Failed { error } => format!("failed ({error})"),
        };
        let guide = match &self.guide {
            StepOutcome::Completed { stats, .. } | StepOutcome::Cancelled { stats, .. } => format!(
                "{} channels kept, {} removed, {} programmes kept, {} removed",
                stats.channels.kept,
                stats.channels.removed,
                stats.programmes_kept,
                stats.programmes_removed
            ),
            StepOutcome::Skipped { reason } => format!("skipped ({reason})"),
            StepOutcome::Failed { error } => format!("failed ({error})"),
        };
        let status = match self.phase {
            Phase::Cancelled => "Filtering cancelled",
            Phase::Failed => "Filtering finished with errors",
            _ => "Filtering complete",
        };
        format!("{status}. Playlist: {playlist}. Guide: {guide}.")
    }
}

enum GuideInput {
    Missing(String),
    Failed(String),
    Ready(PreparedInput),
}

pub struct FilterJob {
    run_id: Uuid,
    paths: PathsConfig,
    reporting: ReportingConfig,
    engine: RuleEngine,
    controller: RunController,
    events: broadcast::Sender<ProgressEvent>,
    crash_log: Option<CrashLog>,
}

impl FilterJob {
    /// Compile the rule set and prepare a run; nothing is read until [`run`](Self::run)
    pub fn new(config: &Config) -> AppResult<Self> {
        let engine = config.rules.compile()?;
        let (events, _) = broadcast::channel(config.run.progress_channel_capacity.max(1));
        let run_id = Uuid::new_v4();

        debug!(
            "Filter job prepared: run_id={} mode={} active_rules={}",
            run_id,
            config.run.mode,
            config.rules.active_toggle_count()
        );

        Ok(Self {
            run_id,
            paths: config.paths.clone(),
            reporting: config.reporting,
            engine,
            controller: RunController::new(config.run.mode),
            events,
            crash_log: config.diagnostics.crash_log.clone().map(CrashLog::new),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Handle for pausing, resuming or cancelling the run from outside
    pub fn controller(&self) -> RunController {
        self.controller.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    pub async fn run(self) -> JobSummary {
        let started = Instant::now();
        self.controller.start_processing();
        let reporter = ProgressReporter::new(
            self.run_id,
            self.controller.clone(),
            self.reporting,
            self.events.clone(),
        )
        .spawn();

        info!(
            "Filter run started: run_id={} mode={}",
            self.run_id,
            self.controller.mode()
        );
        self.emit(format!("Filter run started in {} mode", self.controller.mode()));

        let guide_input = self.prepare_guide().await;
        let (guide_counts, counts_estimated) = match &guide_input {
            GuideInput::Ready(prepared) => {
                let (counts, estimated) = self.count_guide(prepared.path()).await;
                (Some(counts), estimated)
            }
            _ => (None, false),
        };

        let playlist = self.run_playlist().await;
        let guide = self
            .run_guide(guide_input, guide_counts.unwrap_or(GuideCounts::ESTIMATE))
            .await;

        let cancelled = self.controller.is_cancelled();
        let exported = if cancelled {
            Vec::new()
        } else {
            self.export(&playlist, &guide).await
        };

        let phase = if cancelled {
            Phase::Cancelled
        } else if playlist.is_failed() || guide.is_failed() {
            Phase::Failed
        } else {
            Phase::Completed
        };
        self.controller.state().set_phase(phase);

        let summary = JobSummary {
            run_id: self.run_id,
            phase,
            playlist,
            guide,
            guide_counts,
            counts_estimated,
            exported,
            elapsed: started.elapsed(),
        };

        let message = summary.describe();
        info!(
            "Filter run finished: run_id={} phase={} duration={}",
            self.run_id,
            phase,
            format_duration(summary.elapsed)
        );
        // No subscribers is fine; the summary is also returned
        let _ = self.events.send(ProgressEvent::terminal(
            self.run_id,
            &self.controller.snapshot(),
            message,
        ));

        self.controller.finish();
        if let Err(e) = reporter.await {
            warn!("Progress reporter task ended abnormally: {}", e);
        }

        summary
    }

    fn emit(&self, message: impl Into<String>) {
        let event = ProgressEvent::status(self.run_id, &self.controller.snapshot(), message);
        debug!("Status: {}", event.message);
        let _ = self.events.send(event);
    }

    async fn prepare_guide(&self) -> GuideInput {
        let Some(path) = &self.paths.guide else {
            return GuideInput::Missing("no guide configured".to_string());
        };
        if !path.exists() {
            return GuideInput::Missing(format!("guide not found: {}", path.display()));
        }

        match DecompressionService::prepare(path).await {
            Ok(prepared) => GuideInput::Ready(prepared),
            Err(e) => {
                error!("Failed to prepare guide {}: {}", path.display(), e);
                GuideInput::Failed(e.to_string())
            }
        }
    }

    /// Counting failures substitute the fixed estimate and never fail the run
    async fn count_guide(&self, path: &Path) -> (GuideCounts, bool) {
        self.controller
            .state()
            .begin_phase(Phase::Counting, 0, file_size(path).await);

        let result = async {
            let input = BufReader::new(File::open(path).await?);
            Ok::<_, AppError>(count_guide_units(input, &self.controller).await?)
        }
        .await;

        match result {
            Ok(counts) => {
                info!(
                    "Guide counted: channels={} programmes={}",
                    counts.channels, counts.programmes
                );
                (counts, false)
            }
            Err(e) => {
                warn!("Guide counting failed, using estimates: {}", e);
                (GuideCounts::ESTIMATE, true)
            }
        }
    }

    async fn run_playlist(&self) -> StepOutcome<FilterStats> {
        let Some(path) = self.paths.playlist.clone() else {
            return self.skip("no playlist configured");
        };
        if !path.exists() {
            return self.skip(format!("playlist not found: {}", path.display()));
        }
        if self.controller.is_cancelled() {
            return self.skip("run cancelled");
        }

        let size = file_size(&path).await;
        info!("Filtering playlist {} ({})", path.display(), format_bytes(size));
        self.controller.state().begin_phase(Phase::Playlist, 0, size);
        let outputs = OutputPaths::for_input(&path, &self.paths.output_dir, false);

        let result = async {
            let input = BufReader::new(File::open(&path).await?);
            let mut sinks = create_outputs(&outputs).await?;
            Ok::<_, AppError>(
                filter_playlist(input, &mut sinks, &self.engine, &self.controller).await?,
            )
        }
        .await;

        match result {
            Ok(stats) => {
                self.emit(format!(
                    "Playlist filtered: {} kept, {} removed",
                    stats.kept, stats.removed
                ));
                if stats.is_cancelled() {
                    StepOutcome::Cancelled { stats, outputs }
                } else {
                    StepOutcome::Completed { stats, outputs }
                }
            }
            Err(e) => self.fail("playlist", &path, e),
        }
    }

    async fn run_guide(&self, input: GuideInput, counts: GuideCounts) -> StepOutcome<GuideStats> {
        let prepared = match input {
            GuideInput::Missing(reason) => return self.skip(reason),
            GuideInput::Failed(error) => {
                self.emit(format!("Guide filtering failed: {error}"));
                return StepOutcome::Failed { error };
            }
            GuideInput::Ready(prepared) => prepared,
        };
        let Some(source) = self.paths.guide.clone() else {
            return self.skip("no guide configured");
        };
        if self.controller.is_cancelled() {
            return self.skip("run cancelled");
        }

        let path = prepared.path();
        let size = file_size(path).await;
        info!("Filtering guide {} ({})", path.display(), format_bytes(size));
        self.controller
            .state()
            .begin_phase(Phase::Guide, counts.channels, size);
        let outputs =
            OutputPaths::for_input(&source, &self.paths.output_dir, prepared.is_decompressed());

        let result = async {
            let input = BufReader::new(File::open(path).await?);
            let mut sinks = create_outputs(&outputs).await?;
            Ok::<_, AppError>(filter_guide(input, &mut sinks, &self.engine, &self.controller).await?)
        }
        .await;

        match result {
            Ok(stats) => {
                self.emit(format!(
                    "Guide filtered: {} channels kept, {} removed",
                    stats.channels.kept, stats.channels.removed
                ));
                if stats.channels.is_cancelled() {
                    StepOutcome::Cancelled { stats, outputs }
                } else {
                    StepOutcome::Completed { stats, outputs }
                }
            }
            Err(e) => self.fail("guide", &source, e),
        }
    }

    async fn export(
        &self,
        playlist: &StepOutcome<FilterStats>,
        guide: &StepOutcome<GuideStats>,
    ) -> Vec<PathBuf> {
        let Some(export_dir) = &self.paths.export_dir else {
            return Vec::new();
        };

        let files: Vec<PathBuf> = [
            playlist.outputs().filter(|_| playlist.is_completed()),
            guide.outputs().filter(|_| guide.is_completed()),
        ]
        .into_iter()
        .flatten()
        .map(|outputs| outputs.kept.clone())
        .collect();

        if files.is_empty() {
            return Vec::new();
        }

        self.controller.state().set_phase(Phase::Exporting);
        self.emit(format!("Exporting to {}", export_dir.display()));
        export_files(&files, export_dir).await
    }

    fn skip<S>(&self, reason: impl Into<String>) -> StepOutcome<S> {
        let reason = reason.into();
        info!("Skipping step: {}", reason);
        self.emit(format!("Skipped: {reason}"));
        StepOutcome::Skipped { reason }
    }

    fn fail<S>(&self, step: &str, input: &Path, error: AppError) -> StepOutcome<S> {
        error!("{} filtering failed for {}: {}", step, input.display(), error);
        if let (Some(crash_log), AppError::Filter(_)) = (&self.crash_log, &error) {
            crash_log.record(step, input, &error);
        }
        self.emit(format!("Error filtering {step}: {error}"));
        StepOutcome::Failed {
            error: error.to_string(),
        }
    }
}

async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}

async fn create_outputs(paths: &OutputPaths) -> AppResult<FilterOutputs<BufWriter<File>>> {
    if let Some(parent) = paths.kept.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let kept = File::create(&paths.kept).await?;
    let removed = File::create(&paths.removed).await?;
    Ok(FilterOutputs::new(BufWriter::new(kept), BufWriter::new(removed)))
}
