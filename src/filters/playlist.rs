//! Streaming M3U playlist filter
//!
//! Lines are read one at a time. An entry is a `#EXTINF` metadata line plus the
//! reference line that follows it; the entry is finalized when the next metadata
//! line arrives or the input ends.

use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tracing::{debug, info, trace};

use super::{DuplicateTracker, FilterOutcome, FilterOutputs, FilterStats};
use crate::errors::{FilterError, FilterResult};
use crate::rules::RuleEngine;
use crate::run::{Checkpoint, RunController};
use crate::utils::format_duration;

const HEADER_MARKER: &str = "#EXTM3U";
const GROUP_MARKER: &str = "#EXTGRP";
const METADATA_MARKER: &str = "#EXTINF";
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Attributes that carry URLs rather than descriptive text
const NON_DESCRIPTIVE_ATTRIBUTES: &[&str] = &["tvg-logo"];

/// One `#EXTINF` line and its reference line, while being assembled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    metadata: String,
    reference: Option<String>,
    attributes: Vec<(String, String)>,
    name: String,
}

impl PlaylistEntry {
    pub fn from_metadata_line(line: &str) -> Self {
        let metadata = line.to_string();
        let trimmed = metadata.trim();
        let content = trimmed
            .strip_prefix(METADATA_MARKER)
            .map(|rest| rest.strip_prefix(':').unwrap_or(rest))
            .unwrap_or(trimmed);

        let (attrs_part, name) = match find_title_separator(content) {
            Some(pos) => (&content[..pos], content[pos + 1..].trim()),
            None => (content, ""),
        };

        Self {
            attributes: parse_extinf_attributes(attrs_part),
            name: name.to_string(),
            metadata,
            reference: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Stable identifier; absent or empty means the entry is never a duplicate
    pub fn tvg_id(&self) -> Option<&str> {
        self.attribute("tvg-id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Text the rules are evaluated against: attribute values then the display name
    pub fn filter_text(&self) -> String {
        let mut text = String::new();
        for (key, value) in &self.attributes {
            if NON_DESCRIPTIVE_ATTRIBUTES
                .iter()
                .any(|skip| key.eq_ignore_ascii_case(skip))
            {
                continue;
            }
            text.push_str(value);
            text.push(' ');
        }
        text.push_str(&self.name);
        text
    }

    fn set_reference(&mut self, line: &str) {
        if self.reference.is_none() {
            self.reference = Some(line.trim_end().to_string());
        }
    }

    fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.metadata.len() + 128);
        out.push_str(&self.metadata);
        out.push('\n');
        if let Some(reference) = &self.reference {
            out.push_str(reference);
            out.push('\n');
        }
        out
    }
}

/// Position of the comma separating attributes from the display name: the
/// first one outside a quoted attribute value
fn find_title_separator(content: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (pos, ch) in content.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(pos),
            _ => {}
        }
    }
    None
}

/// Parse `key="value"` pairs (and unquoted `key=value`) in order of appearance.
/// The leading duration token has no `=` and is dropped.
fn parse_extinf_attributes(attrs_part: &str) -> Vec<(String, String)> {
    let mut attributes = Vec::new();

    let mut chars = attrs_part.chars().peekable();
    let mut current_key = String::new();
    let mut current_value = String::new();
    let mut in_quotes = false;
    let mut in_key = true;
    let mut in_value = false;

    while let Some(ch) = chars.next() {
        match ch {
            ' ' | '\t' if !in_quotes => {
                if in_value && !current_key.is_empty() && !current_value.is_empty() {
                    attributes.push((current_key.clone(), current_value.clone()));
                }
                current_key.clear();
                current_value.clear();
                in_key = true;
                in_value = false;
            }
            '=' if !in_quotes && in_key => {
                in_key = false;
                in_value = true;
                if chars.peek() == Some(&'"') {
                    chars.next();
                    in_quotes = true;
                }
            }
            '"' if in_quotes => {
                in_quotes = false;
                if !current_key.is_empty() {
                    attributes.push((current_key.clone(), current_value.clone()));
                }
                current_key.clear();
                current_value.clear();
                in_value = false;
            }
            _ => {
                if in_key {
                    current_key.push(ch);
                } else if in_value {
                    current_value.push(ch);
                }
            }
        }
    }

    if in_value && !current_key.is_empty() && !current_value.is_empty() {
        attributes.push((current_key, current_value));
    }

    attributes
}

#[derive(Debug)]
enum ParserState {
    /// Nothing but (possibly) blank lines seen yet
    BeforeHeader,
    /// Header written, no entry started yet
    InHeader,
    /// Assembling an entry; finalizing it moves straight into the next one
    InEntry(PlaylistEntry),
    /// Cancelled while finalizing
    Done,
}

/// Filter a playlist stream into kept and removed outputs.
///
/// A later entry repeating an earlier `tvg-id` is always removed as a duplicate
/// without rule evaluation. Marker and metadata lines are copied verbatim, minus
/// line terminators and a leading byte order mark; reference lines are trimmed.
pub async fn filter_playlist<R, W>(
    reader: R,
    outputs: &mut FilterOutputs<W>,
    engine: &RuleEngine,
    controller: &RunController,
) -> FilterResult<FilterStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let started = Instant::now();
    let result = PlaylistFilter::new(outputs, engine, controller).run(reader).await;

    match result {
        Ok(mut stats) => {
            outputs.flush().await?;
            stats.elapsed = started.elapsed();
            info!(
                "Playlist filtering {}: processed={} kept={} removed={} duplicates={} duration={}",
                if stats.is_cancelled() { "cancelled" } else { "completed" },
                stats.processed,
                stats.kept,
                stats.removed,
                stats.duplicates,
                format_duration(stats.elapsed)
            );
            Ok(stats)
        }
        Err(e) => {
            outputs.flush_best_effort().await;
            Err(e)
        }
    }
}

struct PlaylistFilter<'a, W> {
    outputs: &'a mut FilterOutputs<W>,
    engine: &'a RuleEngine,
    controller: &'a RunController,
    duplicates: DuplicateTracker,
    stats: FilterStats,
}

impl<'a, W: AsyncWrite + Unpin> PlaylistFilter<'a, W> {
    fn new(
        outputs: &'a mut FilterOutputs<W>,
        engine: &'a RuleEngine,
        controller: &'a RunController,
    ) -> Self {
        Self {
            outputs,
            engine,
            controller,
            duplicates: DuplicateTracker::new(),
            stats: FilterStats::default(),
        }
    }

    async fn run<R: AsyncBufRead + Unpin>(mut self, mut reader: R) -> FilterResult<FilterStats> {
        let mut state = ParserState::BeforeHeader;
        let mut raw = Vec::with_capacity(1024);
        let mut line_number = 0usize;

        loop {
            raw.clear();
            let read = reader.read_until(b'\n', &mut raw).await?;
            if read == 0 {
                break;
            }
            line_number += 1;
            self.controller.state().add_bytes(read as u64);

            let line = std::str::from_utf8(&raw).map_err(|e| FilterError::Encoding {
                line: line_number,
                message: e.to_string(),
            })?;
            let mut line = line.trim_end_matches(['\n', '\r']);
            if line_number == 1 {
                line = line.strip_prefix(BYTE_ORDER_MARK).unwrap_or(line);
            }

            state = self.step(state, line).await?;
            if matches!(state, ParserState::Done) {
                self.stats.outcome = FilterOutcome::Cancelled;
                return Ok(self.stats);
            }
        }

        if let ParserState::InEntry(entry) = state {
            if self.finalize(entry).await? == Checkpoint::Cancelled {
                self.stats.outcome = FilterOutcome::Cancelled;
            }
        }

        Ok(self.stats)
    }

    async fn step(&mut self, state: ParserState, line: &str) -> FilterResult<ParserState> {
        let trimmed = line.trim_start();

        if trimmed.starts_with(HEADER_MARKER) {
            if matches!(state, ParserState::BeforeHeader) {
                self.outputs.write_both(format!("{line}\n").as_bytes()).await?;
                return Ok(ParserState::InHeader);
            }
            trace!("Ignoring repeated playlist header");
            return Ok(state);
        }

        if trimmed.starts_with(GROUP_MARKER) {
            self.outputs.write_both(format!("{line}\n").as_bytes()).await?;
            return Ok(state);
        }

        if trimmed.starts_with(METADATA_MARKER) {
            if let ParserState::InEntry(pending) = state {
                if self.finalize(pending).await? == Checkpoint::Cancelled {
                    return Ok(ParserState::Done);
                }
            }
            return Ok(ParserState::InEntry(PlaylistEntry::from_metadata_line(line)));
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(state);
        }

        match state {
            ParserState::InEntry(mut entry) => {
                entry.set_reference(trimmed);
                Ok(ParserState::InEntry(entry))
            }
            other => {
                trace!("Skipping reference line outside an entry");
                Ok(other)
            }
        }
    }

    async fn finalize(&mut self, entry: PlaylistEntry) -> FilterResult<Checkpoint> {
        let duplicate = entry
            .tvg_id()
            .map(|id| self.duplicates.observe(id))
            .unwrap_or(false);
        if duplicate {
            self.stats.duplicates += 1;
        }

        let keep = if duplicate {
            debug!("Removing duplicate playlist entry: {}", entry.name());
            false
        } else {
            match self.engine.evaluate(&entry.filter_text()) {
                Some(rejection) => {
                    trace!("Removing playlist entry '{}': {}", entry.name(), rejection);
                    false
                }
                None => true,
            }
        };

        self.outputs.write(keep, entry.serialize().as_bytes()).await?;

        self.stats.record(keep);
        let state = self.controller.state();
        state.record_processed();
        state.record_decision(keep);

        let delay = self.engine.throttle_delay(self.controller.mode());
        Ok(self.controller.after_unit(delay).await)
    }
}
