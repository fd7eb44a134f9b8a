//! Counting pre-pass over a guide document
//!
//! Gives the guide phase a denominator for its percentage. The pass uses the
//! same event model as the filter but buffers nothing.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use tokio::io::AsyncBufRead;
use tracing::debug;

use crate::errors::{FilterError, FilterResult};
use crate::run::RunController;

/// Units between two pause/cancel checkpoints while counting
const CHECKPOINT_EVERY: u64 = 512;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GuideCounts {
    pub channels: u64,
    pub programmes: u64,
}

impl GuideCounts {
    /// Substituted when counting fails
    pub const ESTIMATE: GuideCounts = GuideCounts {
        channels: 2_000,
        programmes: 100_000,
    };

    pub fn total(&self) -> u64 {
        self.channels + self.programmes
    }
}

/// Count channel and programme elements. A cancelled pass returns the partial counts.
pub async fn count_guide_units<R>(reader: R, controller: &RunController) -> FilterResult<GuideCounts>
where
    R: AsyncBufRead + Unpin,
{
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::with_capacity(8 * 1024);
    let mut counts = GuideCounts::default();

    loop {
        let event = reader
            .read_event_into_async(&mut buf)
            .await
            .map_err(|e| FilterError::xml(reader.buffer_position() as u64, e))?;

        let counted = match &event {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"channel" => {
                    counts.channels += 1;
                    controller.state().record_processed();
                    true
                }
                b"programme" => {
                    counts.programmes += 1;
                    true
                }
                _ => false,
            },
            Event::Eof => break,
            _ => false,
        };
        buf.clear();
        controller
            .state()
            .set_bytes_read(reader.buffer_position() as u64);

        if counted
            && counts.total() % CHECKPOINT_EVERY == 0
            && controller.checkpoint().await.is_cancelled()
        {
            debug!("Guide counting cancelled: channels={} programmes={}", counts.channels, counts.programmes);
            return Ok(counts);
        }
    }

    debug!(
        "Guide counting completed: channels={} programmes={}",
        counts.channels, counts.programmes
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunMode;

    #[tokio::test]
    async fn test_counts_channels_and_programmes() {
        let guide = r#"<?xml version="1.0"?>
<tv>
  <channel id="a"><display-name>A</display-name></channel>
  <channel id="b"/>
  <programme channel="a"><title>One</title></programme>
  <programme channel="b"><title>Two</title></programme>
  <programme channel="b"><title>Three</title></programme>
</tv>"#;
        let controller = RunController::new(RunMode::Manual);
        let counts = count_guide_units(guide.as_bytes(), &controller).await.unwrap();

        assert_eq!(counts, GuideCounts { channels: 2, programmes: 3 });
        assert_eq!(counts.total(), 5);
        assert_eq!(controller.state().processed(), 2);
    }

    #[tokio::test]
    async fn test_empty_document() {
        let controller = RunController::new(RunMode::Manual);
        let counts = count_guide_units(&b""[..], &controller).await.unwrap();
        assert_eq!(counts, GuideCounts::default());
    }

    #[tokio::test]
    async fn test_malformed_document_fails() {
        let controller = RunController::new(RunMode::Manual);
        let result = count_guide_units(&b"<tv><channel></tv>"[..], &controller).await;
        assert!(matches!(result, Err(FilterError::Xml { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_count_returns_partial() {
        let mut guide = String::from("<tv>");
        for i in 0..2_000 {
            guide.push_str(&format!("<channel id=\"c{i}\"/>"));
        }
        guide.push_str("</tv>");

        let controller = RunController::new(RunMode::Manual);
        controller.cancel();
        let counts = count_guide_units(guide.as_bytes(), &controller).await.unwrap();
        assert_eq!(counts.channels, CHECKPOINT_EVERY);
    }

    #[test]
    fn test_estimate() {
        assert_eq!(GuideCounts::ESTIMATE.channels, 2_000);
        assert_eq!(GuideCounts::ESTIMATE.programmes, 100_000);
    }
}
