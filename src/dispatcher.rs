use tracing::{debug, error, info, warn};

use crate::bigchat::{Event, EventKind};
use crate::translator::{EventTranslator, Outcome};

/// Per-batch tally, logged once per non-empty batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub unrecognized: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.applied + self.skipped + self.failed + self.unrecognized
    }
}

/// Routes each event of a batch to its handler, in the order received.
pub struct Dispatcher {
    translator: EventTranslator,
}

impl Dispatcher {
    pub fn new(translator: EventTranslator) -> Self {
        Self { translator }
    }

    /// Process every event. Failures are logged and counted; nothing escapes.
    pub async fn dispatch(&self, events: &[serde_json::Value]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for raw in events {
            let event: Event = match serde_json::from_value(raw.clone()) {
                Ok(event) => event,
                Err(e) => {
                    error!("Skipping malformed event {}: {}", raw, e);
                    summary.failed += 1;
                    continue;
                }
            };

            if let Some(event_at) = &event.event_at {
                debug!(
                    "Handling {} for conversation {} (event_at {:?})",
                    event.event_name, event.conversation_id, event_at
                );
            }

            let result = match event.event_name {
                EventKind::Start => self.translator.start(&event).await,
                EventKind::End => self.translator.end(&event).await,
                EventKind::Message => self.translator.message(&event).await,
                EventKind::Transfer => self.translator.transfer(&event).await,
                EventKind::Unknown(_) => {
                    warn!("Unknown event type: {}", event.event_name);
                    summary.unrecognized += 1;
                    continue;
                }
            };

            match result {
                Ok(Outcome::Skipped(reason)) => {
                    debug!(
                        "Skipped {} for conversation {}: {}",
                        event.event_name, event.conversation_id, reason
                    );
                    summary.skipped += 1;
                }
                Ok(_) => summary.applied += 1,
                Err(e) => {
                    error!(
                        "{} event for conversation {} failed: {:#}",
                        event.event_name, event.conversation_id, e
                    );
                    summary.failed += 1;
                }
            }
        }

        if summary.total() > 0 {
            info!(
                "Processed {} event(s): {} applied, {} skipped, {} failed, {} unrecognized",
                summary.total(),
                summary.applied,
                summary.skipped,
                summary.failed,
                summary.unrecognized
            );
        }

        summary
    }
}
