//! Streaming XMLTV guide filter
//!
//! Events are pulled from a quick-xml reader; no document tree is built. Each
//! `<channel>` and `<programme>` element is buffered while open and written to
//! the kept or removed output when it closes. Channel decisions are recorded in
//! a [`ChannelDecisionTable`] which the programmes that follow consult.

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info, trace};

use super::{DuplicateTracker, FilterOutcome, FilterOutputs, GuideStats};
use crate::errors::{FilterError, FilterResult};
use crate::rules::RuleEngine;
use crate::run::{Checkpoint, RunController};
use crate::utils::format_duration;

const ROOT_TAG: &[u8] = b"tv";
const CHANNEL_TAG: &[u8] = b"channel";
const PROGRAMME_TAG: &[u8] = b"programme";
const UNKNOWN_CHANNEL_ID: &str = "unknown";

/// Channel id to keep decision for one guide pass. Unknown ids are kept.
#[derive(Debug, Default)]
pub struct ChannelDecisionTable {
    decisions: HashMap<String, bool>,
}

impl ChannelDecisionTable {
    /// Record a decision. A later definition never flips an earlier kept channel to removed.
    pub fn record(&mut self, id: &str, keep: bool) {
        let slot = self.decisions.entry(id.to_string()).or_insert(keep);
        *slot = *slot || keep;
    }

    pub fn is_kept(&self, id: &str) -> bool {
        self.decisions.get(id).copied().unwrap_or(true)
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootState {
    Unopened,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Active {
    None,
    Channel,
    Programme,
}

enum Flow {
    Continue,
    Cancelled,
    Eof,
}

/// Filter a guide document into kept and removed outputs.
///
/// Channels are evaluated against the rules on their text content; programmes
/// follow the decision of the channel they reference.
pub async fn filter_guide<R, W>(
    reader: R,
    outputs: &mut FilterOutputs<W>,
    engine: &RuleEngine,
    controller: &RunController,
) -> FilterResult<GuideStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let started = Instant::now();
    let result = GuideFilter::new(outputs, engine, controller).run(reader).await;

    match result {
        Ok(mut stats) => {
            outputs.flush().await?;
            stats.channels.elapsed = started.elapsed();
            info!(
                "XMLTV filtering {}: channels={} channels_kept={} channels_removed={} duplicates={} programmes_kept={} programmes_removed={} duration={}",
                if stats.channels.is_cancelled() { "cancelled" } else { "completed" },
                stats.channels.processed,
                stats.channels.kept,
                stats.channels.removed,
                stats.channels.duplicates,
                stats.programmes_kept,
                stats.programmes_removed,
                format_duration(stats.channels.elapsed)
            );
            Ok(stats)
        }
        Err(e) => {
            outputs.flush_best_effort().await;
            Err(e)
        }
    }
}

struct GuideFilter<'a, W> {
    outputs: &'a mut FilterOutputs<W>,
    engine: &'a RuleEngine,
    controller: &'a RunController,
    root: RootState,
    ignored_roots: usize,
    active: Active,
    depth: usize,
    channel_buf: Vec<u8>,
    channel_text: String,
    channel_id: String,
    channel_duplicate: bool,
    programme_buf: Vec<u8>,
    programme_keep: bool,
    scratch: Vec<u8>,
    decisions: ChannelDecisionTable,
    duplicates: DuplicateTracker,
    stats: GuideStats,
}

impl<'a, W: AsyncWrite + Unpin> GuideFilter<'a, W> {
    fn new(
        outputs: &'a mut FilterOutputs<W>,
        engine: &'a RuleEngine,
        controller: &'a RunController,
    ) -> Self {
        Self {
            outputs,
            engine,
            controller,
            root: RootState::Unopened,
            ignored_roots: 0,
            active: Active::None,
            depth: 0,
            channel_buf: Vec::with_capacity(4 * 1024),
            channel_text: String::new(),
            channel_id: String::new(),
            channel_duplicate: false,
            programme_buf: Vec::with_capacity(4 * 1024),
            programme_keep: true,
            scratch: Vec::with_capacity(1024),
            decisions: ChannelDecisionTable::default(),
            duplicates: DuplicateTracker::new(),
            stats: GuideStats::default(),
        }
    }

    async fn run<R: AsyncBufRead + Unpin>(mut self, reader: R) -> FilterResult<GuideStats> {
        let mut reader = Reader::from_reader(reader);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::with_capacity(8 * 1024);

        loop {
            let event = reader
                .read_event_into_async(&mut buf)
                .await
                .map_err(|e| FilterError::xml(reader.buffer_position() as u64, e))?;
            let position = reader.buffer_position() as u64;

            let flow = self.handle(event, position).await?;
            self.controller.state().set_bytes_read(position);
            buf.clear();

            match flow {
                Flow::Continue => {}
                Flow::Eof => break,
                Flow::Cancelled => {
                    self.stats.channels.outcome = FilterOutcome::Cancelled;
                    break;
                }
            }
        }

        self.close_root().await?;
        debug!(
            "Guide decision table: {} channel ids, {} duplicated",
            self.decisions.len(),
            self.duplicates.duplicate_count()
        );
        Ok(self.stats)
    }

    async fn handle(&mut self, event: Event<'_>, position: u64) -> FilterResult<Flow> {
        match event {
            Event::Start(e) => {
                if self.active != Active::None {
                    self.depth += 1;
                    write_start(self.active_buf(), &e, position, false)?;
                    return Ok(Flow::Continue);
                }
                match e.name().as_ref() {
                    ROOT_TAG => self.open_root(&e, position).await?,
                    CHANNEL_TAG => self.begin_channel(&e, position)?,
                    PROGRAMME_TAG => self.begin_programme(&e, position)?,
                    _ => {
                        self.scratch.clear();
                        write_start(&mut self.scratch, &e, position, false)?;
                        self.outputs.write(true, &self.scratch).await?;
                    }
                }
            }
            Event::Empty(e) => {
                if self.active != Active::None {
                    write_start(self.active_buf(), &e, position, true)?;
                    return Ok(Flow::Continue);
                }
                match e.name().as_ref() {
                    ROOT_TAG if self.root == RootState::Unopened => {
                        self.open_root(&e, position).await?;
                        self.close_root().await?;
                    }
                    // No end event follows, so it must not count as an ignored root
                    ROOT_TAG => {
                        trace!("Ignoring repeated empty root element at byte {}", position);
                    }
                    CHANNEL_TAG => {
                        self.begin_channel(&e, position)?;
                        self.channel_buf.extend_from_slice(b"</channel>");
                        return self.finish_channel().await;
                    }
                    PROGRAMME_TAG => {
                        self.begin_programme(&e, position)?;
                        self.programme_buf.extend_from_slice(b"</programme>");
                        return self.finish_programme().await;
                    }
                    _ => {
                        self.scratch.clear();
                        write_start(&mut self.scratch, &e, position, true)?;
                        self.scratch.push(b'\n');
                        self.outputs.write(true, &self.scratch).await?;
                    }
                }
            }
            Event::End(e) => {
                if self.active != Active::None {
                    if self.depth == 0 {
                        self.active_buf().extend_from_slice(b"</");
                        self.active_buf().extend_from_slice(e.name().as_ref());
                        self.active_buf().push(b'>');
                        return match self.active {
                            Active::Channel => self.finish_channel().await,
                            _ => self.finish_programme().await,
                        };
                    }
                    self.depth -= 1;
                    let buf = self.active_buf();
                    buf.extend_from_slice(b"</");
                    buf.extend_from_slice(e.name().as_ref());
                    buf.push(b'>');
                    return Ok(Flow::Continue);
                }
                if e.name().as_ref() == ROOT_TAG {
                    if self.ignored_roots > 0 {
                        self.ignored_roots -= 1;
                    } else {
                        self.close_root().await?;
                    }
                } else {
                    self.scratch.clear();
                    self.scratch.extend_from_slice(b"</");
                    self.scratch.extend_from_slice(e.name().as_ref());
                    self.scratch.extend_from_slice(b">\n");
                    self.outputs.write(true, &self.scratch).await?;
                }
            }
            Event::Text(e) => {
                let (escaped, text) = match e.unescape() {
                    Ok(text) => (partial_escape(&*text).into_owned(), text.into_owned()),
                    Err(_) => {
                        let raw = String::from_utf8_lossy(&e).into_owned();
                        (raw.clone(), raw)
                    }
                };
                self.write_content(escaped.as_bytes(), &text).await?;
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                let mut markup = Vec::with_capacity(e.len() + 12);
                markup.extend_from_slice(b"<![CDATA[");
                markup.extend_from_slice(&e);
                markup.extend_from_slice(b"]]>");
                self.write_content(&markup, &text).await?;
            }
            Event::Comment(e) => {
                self.write_markup(b"<!--", &e, b"-->").await?;
            }
            Event::PI(e) => {
                self.write_markup(b"<?", &e, b"?>").await?;
            }
            Event::Decl(e) => {
                if self.root == RootState::Unopened {
                    self.write_prologue(b"<?", &e, b"?>\n").await?;
                }
            }
            Event::DocType(e) => {
                if self.root == RootState::Unopened {
                    let start = e.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(e.len());
                    self.write_prologue(b"<!DOCTYPE ", &e[start..], b">\n").await?;
                }
            }
            Event::Eof => return Ok(Flow::Eof),
        }
        Ok(Flow::Continue)
    }

    fn active_buf(&mut self) -> &mut Vec<u8> {
        match self.active {
            Active::Programme => &mut self.programme_buf,
            _ => &mut self.channel_buf,
        }
    }

    async fn open_root(&mut self, e: &BytesStart<'_>, position: u64) -> FilterResult<()> {
        if self.root != RootState::Unopened {
            trace!("Ignoring repeated root element at byte {}", position);
            self.ignored_roots += 1;
            return Ok(());
        }
        self.scratch.clear();
        write_start(&mut self.scratch, e, position, false)?;
        self.scratch.push(b'\n');
        self.outputs.write_both(&self.scratch).await?;
        self.root = RootState::Open;
        Ok(())
    }

    async fn close_root(&mut self) -> FilterResult<()> {
        if self.root == RootState::Open {
            self.outputs.write_both(b"</tv>\n").await?;
            self.root = RootState::Closed;
        }
        Ok(())
    }

    fn begin_channel(&mut self, e: &BytesStart<'_>, position: u64) -> FilterResult<()> {
        self.active = Active::Channel;
        self.depth = 0;
        self.channel_buf.clear();
        self.channel_text.clear();
        write_start(&mut self.channel_buf, e, position, false)?;

        self.channel_id = attribute(e, b"id").unwrap_or_else(|| UNKNOWN_CHANNEL_ID.to_string());
        self.channel_duplicate = self.duplicates.observe(&self.channel_id);
        self.controller.state().record_processed();
        Ok(())
    }

    fn begin_programme(&mut self, e: &BytesStart<'_>, position: u64) -> FilterResult<()> {
        self.active = Active::Programme;
        self.depth = 0;
        self.programme_buf.clear();
        write_start(&mut self.programme_buf, e, position, false)?;

        self.programme_keep = attribute(e, b"channel")
            .map(|channel| self.decisions.is_kept(&channel))
            .unwrap_or(true);
        Ok(())
    }

    async fn finish_channel(&mut self) -> FilterResult<Flow> {
        self.active = Active::None;

        if self.channel_duplicate {
            self.stats.channels.duplicates += 1;
        }

        let keep = if self.channel_duplicate && self.engine.remove_duplicates() {
            debug!("Removing duplicate guide channel: {}", self.channel_id);
            false
        } else {
            let text = collapse_text(&self.channel_text);
            match self.engine.evaluate(&text) {
                Some(rejection) => {
                    trace!("Removing guide channel '{}': {}", self.channel_id, rejection);
                    false
                }
                None => true,
            }
        };

        self.decisions.record(&self.channel_id, keep);
        self.channel_buf.push(b'\n');
        self.outputs.write(keep, &self.channel_buf).await?;

        self.stats.channels.record(keep);
        self.controller.state().record_decision(keep);

        let delay = self.engine.throttle_delay(self.controller.mode());
        Ok(flow_from(self.controller.after_unit(delay).await))
    }

    async fn finish_programme(&mut self) -> FilterResult<Flow> {
        self.active = Active::None;

        let keep = self.programme_keep;
        self.programme_buf.push(b'\n');
        self.outputs.write(keep, &self.programme_buf).await?;
        if keep {
            self.stats.programmes_kept += 1;
        } else {
            self.stats.programmes_removed += 1;
        }

        Ok(flow_from(self.controller.checkpoint().await))
    }

    /// Escaped character data; also collected as channel text while inside a channel
    async fn write_content(&mut self, escaped: &[u8], text: &str) -> FilterResult<()> {
        match self.active {
            Active::None => {
                self.outputs.write(true, escaped).await?;
            }
            Active::Channel => {
                self.channel_buf.extend_from_slice(escaped);
                self.channel_text.push_str(text);
                self.channel_text.push(' ');
            }
            Active::Programme => self.programme_buf.extend_from_slice(escaped),
        }
        Ok(())
    }

    async fn write_markup(&mut self, open: &[u8], content: &[u8], close: &[u8]) -> FilterResult<()> {
        if self.active != Active::None {
            let buf = self.active_buf();
            buf.extend_from_slice(open);
            buf.extend_from_slice(content);
            buf.extend_from_slice(close);
            return Ok(());
        }
        self.scratch.clear();
        self.scratch.extend_from_slice(open);
        self.scratch.extend_from_slice(content);
        self.scratch.extend_from_slice(close);
        self.scratch.push(b'\n');
        self.outputs.write(true, &self.scratch).await?;
        Ok(())
    }

    /// Declaration and doctype go to both outputs so each is a standalone document
    async fn write_prologue(&mut self, open: &[u8], content: &[u8], close: &[u8]) -> FilterResult<()> {
        self.scratch.clear();
        self.scratch.extend_from_slice(open);
        self.scratch.extend_from_slice(content);
        self.scratch.extend_from_slice(close);
        self.outputs.write_both(&self.scratch).await?;
        Ok(())
    }
}

fn flow_from(checkpoint: Checkpoint) -> Flow {
    match checkpoint {
        Checkpoint::Continue => Flow::Continue,
        Checkpoint::Cancelled => Flow::Cancelled,
    }
}

/// Serialize a start (or empty) tag, re-escaping attribute values
fn write_start(buf: &mut Vec<u8>, e: &BytesStart<'_>, position: u64, empty: bool) -> FilterResult<()> {
    buf.push(b'<');
    buf.extend_from_slice(e.name().as_ref());
    for attr in e.attributes() {
        let attr = attr.map_err(|err| FilterError::xml(position, err))?;
        buf.push(b' ');
        buf.extend_from_slice(attr.key.as_ref());
        buf.extend_from_slice(b"=\"");
        match attr.unescape_value() {
            Ok(value) => buf.extend_from_slice(escape(&*value).as_bytes()),
            // Unknown entity references are passed through untouched
            Err(_) => buf.extend_from_slice(&attr.value),
        }
        buf.push(b'"');
    }
    if empty {
        buf.extend_from_slice(b"/>");
    } else {
        buf.push(b'>');
    }
    Ok(())
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .map(|attr| match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        })
}

/// Whitespace collapsed and lower-cased text content
fn collapse_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{CategorySelection, RuleSet};
    use crate::run::RunMode;
    use std::time::Duration;

    const GUIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE tv SYSTEM "xmltv.dtd">
<tv generator-info-name="test">
  <programme start="20240101000000 +0000" channel="early"><title>Before Definition</title></programme>
  <channel id="bbc1"><display-name>BBC One</display-name></channel>
  <channel id="x"><display-name>ESPN</display-name><icon src="http://logo/espn.png"/></channel>
  <programme start="20240101000000 +0000" channel="bbc1"><title>News &amp; Weather</title></programme>
  <programme start="20240101010000 +0000" channel="x"><title>SportsCenter</title></programme>
  <programme start="20240101020000 +0000" channel="x"><title>NFL Live</title></programme>
  <programme start="20240101030000 +0000" channel="nowhere"><title>Orphan</title></programme>
</tv>
"#;

    async fn run(input: &str, rules: RuleSet) -> (GuideStats, String, String) {
        let controller = RunController::new(RunMode::Manual);
        let mut outputs = FilterOutputs::new(Vec::new(), Vec::new());
        let engine = rules.compile().unwrap();
        let stats = filter_guide(input.as_bytes(), &mut outputs, &engine, &controller)
            .await
            .unwrap();
        let (kept, removed) = outputs.into_inner();
        (
            stats,
            String::from_utf8(kept).unwrap(),
            String::from_utf8(removed).unwrap(),
        )
    }

    fn sports_master() -> RuleSet {
        RuleSet {
            sports: CategorySelection::all(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_espn_channel_and_programmes_removed() {
        let (stats, kept, removed) = run(GUIDE, sports_master()).await;

        assert_eq!(stats.channels.processed, 2);
        assert_eq!(stats.channels.kept, 1);
        assert_eq!(stats.channels.removed, 1);
        assert_eq!(stats.programmes_kept, 3);
        assert_eq!(stats.programmes_removed, 2);

        assert!(removed.contains(r#"<channel id="x"><display-name>ESPN</display-name><icon src="http://logo/espn.png"/></channel>"#));
        assert!(removed.contains("SportsCenter"));
        assert!(removed.contains("NFL Live"));
        assert!(!kept.contains("ESPN"));
        assert!(!kept.contains("SportsCenter"));

        assert!(kept.contains("Before Definition"));
        assert!(kept.contains("Orphan"));
        assert!(kept.contains("<title>News &amp; Weather</title>"));
    }

    #[tokio::test]
    async fn test_both_outputs_are_complete_documents() {
        let (_, kept, removed) = run(GUIDE, sports_master()).await;

        for doc in [&kept, &removed] {
            assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n<tv generator-info-name=\"test\">\n"));
            assert!(doc.ends_with("</tv>\n"));
            assert_eq!(doc.matches("<tv").count(), 1);
            assert_eq!(doc.matches("</tv>").count(), 1);
        }
    }

    #[tokio::test]
    async fn test_outputs_parse_back() {
        let (_, kept, removed) = run(GUIDE, sports_master()).await;
        for doc in [kept, removed] {
            let mut reader = Reader::from_str(&doc);
            loop {
                match reader.read_event() {
                    Ok(Event::Eof) => break,
                    Ok(_) => {}
                    Err(e) => panic!("output is not well-formed: {e}"),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_no_rules_keeps_everything() {
        let (stats, kept, removed) = run(GUIDE, RuleSet::default()).await;
        assert_eq!(stats.channels.kept, 2);
        assert_eq!(stats.channels.removed, 0);
        assert_eq!(stats.programmes(), 5);
        assert_eq!(stats.programmes_removed, 0);
        assert!(!removed.contains("<channel"));
        assert!(!removed.contains("<programme"));
        assert_eq!(kept.matches("<programme").count(), 5);
    }

    #[tokio::test]
    async fn test_duplicate_channel_handling() {
        let guide = r#"<tv>
<channel id="a"><display-name>Alpha</display-name></channel>
<channel id="a"><display-name>Alpha Again</display-name></channel>
<programme channel="a"><title>Show</title></programme>
</tv>"#;

        let (stats, kept, removed) = run(guide, RuleSet::default()).await;
        assert_eq!((stats.channels.kept, stats.channels.removed), (2, 0));
        assert_eq!(stats.channels.duplicates, 1);

        let rules = RuleSet {
            remove_duplicates: true,
            ..Default::default()
        };
        let (stats, kept_dedup, removed_dedup) = run(guide, rules).await;
        assert_eq!((stats.channels.kept, stats.channels.removed), (1, 1));
        assert!(removed_dedup.contains("Alpha Again"));
        // The first definition was kept, so its programmes still are
        assert!(kept_dedup.contains("<title>Show</title>"));
        assert_eq!(stats.programmes_kept, 1);

        assert!(kept.contains("Alpha Again"));
        assert!(!removed.contains("<channel"));
    }

    #[tokio::test]
    async fn test_channel_text_is_collapsed_and_unescaped() {
        let guide = "<tv><channel id=\"f\"><display-name>\n   Fox\n   News   &amp; More</display-name></channel></tv>";
        let rules = RuleSet {
            news: CategorySelection::with_items(["fox_news"]),
            ..Default::default()
        };
        let (stats, _, removed) = run(guide, rules).await;
        assert_eq!(stats.channels.removed, 1);
        assert!(removed.contains("&amp; More"));
    }

    #[tokio::test]
    async fn test_missing_channel_id_defaults_to_unknown() {
        let guide = r#"<tv><channel><display-name>ESPN</display-name></channel><programme channel="unknown"><title>Game</title></programme></tv>"#;
        let (stats, _, removed) = run(guide, sports_master()).await;
        assert_eq!(stats.channels.removed, 1);
        assert_eq!(stats.programmes_removed, 1);
        assert!(removed.contains("Game"));
    }

    #[tokio::test]
    async fn test_unterminated_root_is_closed() {
        let guide = r#"<tv><channel id="a"><display-name>Alpha</display-name></channel>"#;
        let controller = RunController::new(RunMode::Manual);
        let mut outputs = FilterOutputs::new(Vec::new(), Vec::new());
        let engine = RuleSet::default().compile().unwrap();
        let stats = filter_guide(guide.as_bytes(), &mut outputs, &engine, &controller)
            .await
            .unwrap();
        assert_eq!(stats.channels.kept, 1);
        let kept = String::from_utf8(outputs.kept).unwrap();
        assert!(kept.ends_with("</tv>\n"));
    }

    #[tokio::test]
    async fn test_malformed_document_is_an_error() {
        let guide = "<tv><channel id=\"a\"><display-name>Alpha</channel></tv>";
        let controller = RunController::new(RunMode::Manual);
        let mut outputs = FilterOutputs::new(Vec::new(), Vec::new());
        let engine = RuleSet::default().compile().unwrap();
        let result = filter_guide(guide.as_bytes(), &mut outputs, &engine, &controller).await;
        assert!(matches!(result, Err(FilterError::Xml { .. })));
        // Root already written before the failure
        assert!(String::from_utf8(outputs.kept).unwrap().starts_with("<tv>"));
    }

    #[tokio::test]
    async fn test_run_state_counts_channels_only() {
        let controller = RunController::new(RunMode::Manual);
        let mut outputs = FilterOutputs::new(Vec::new(), Vec::new());
        let engine = sports_master().compile().unwrap();
        filter_guide(GUIDE.as_bytes(), &mut outputs, &engine, &controller)
            .await
            .unwrap();

        let state = controller.state();
        assert_eq!(state.processed(), 2);
        assert_eq!(state.kept() + state.removed(), state.processed());
        assert_eq!(state.removed(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_after_first_channel() {
        let controller = RunController::new(RunMode::Manual);
        controller.cancel();
        let mut outputs = FilterOutputs::new(Vec::new(), Vec::new());
        let engine = RuleSet::default().compile().unwrap();
        let stats = filter_guide(GUIDE.as_bytes(), &mut outputs, &engine, &controller)
            .await
            .unwrap();

        assert_eq!(stats.channels.outcome, FilterOutcome::Cancelled);
        // The leading programme hits its checkpoint first
        assert_eq!(stats.channels.processed, 0);
        assert_eq!(stats.programmes_kept, 1);
    }

    #[tokio::test]
    async fn test_pause_then_resume_preserves_output() {
        let (expected, expected_kept, expected_removed) = run(GUIDE, sports_master()).await;

        let controller = RunController::new(RunMode::Manual);
        controller.pause();
        let engine = sports_master().compile().unwrap();
        let worker = controller.clone();
        let handle = tokio::spawn(async move {
            let mut outputs = FilterOutputs::new(Vec::new(), Vec::new());
            let stats = filter_guide(GUIDE.as_bytes(), &mut outputs, &engine, &worker)
                .await
                .unwrap();
            (stats, outputs.into_inner())
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert_eq!(controller.state().processed(), 0);

        controller.resume();
        let (stats, (kept, removed)) = handle.await.unwrap();
        assert_eq!(stats.channels.processed, expected.channels.processed);
        assert_eq!(stats.channels.kept, expected.channels.kept);
        assert_eq!(stats.programmes_removed, expected.programmes_removed);
        assert_eq!(String::from_utf8(kept).unwrap(), expected_kept);
        assert_eq!(String::from_utf8(removed).unwrap(), expected_removed);
    }

    #[tokio::test]
    async fn test_repeated_root_elements_close_once() {
        for input in [
            "<tv><tv/><channel id=\"a\"><display-name>A</display-name></channel></tv>",
            "<tv><tv></tv><channel id=\"a\"><display-name>A</display-name></channel></tv>",
        ] {
            let (stats, kept, removed) = run(input, RuleSet::default()).await;

            assert_eq!(stats.channels.kept, 1, "{input}");
            assert_eq!(kept.matches("</tv>").count(), 1, "{input}");
            assert!(kept.trim_end().ends_with("</channel>\n</tv>"), "{kept}");
            assert_eq!(removed, "<tv>\n</tv>\n", "{input}");
        }
    }

    #[test]
    fn test_decision_table() {
        let mut table = ChannelDecisionTable::default();
        assert!(table.is_kept("missing"));
        table.record("a", false);
        assert!(!table.is_kept("a"));
        table.record("a", true);
        assert!(table.is_kept("a"));
        table.record("b", true);
        table.record("b", false);
        assert!(table.is_kept("b"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_collapse_text() {
        assert_eq!(collapse_text("  ESPN \n\t HD  "), "espn hd");
    }
}
