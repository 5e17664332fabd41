use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::bigchat::BigChatClient;
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::dispatcher::{BatchSummary, Dispatcher};

/// Polls BigChat on a fixed interval and feeds each batch to the dispatcher.
///
/// `last_checked` only ever moves to the instant sampled before the fetch,
/// so a failed fetch still advances it and a slow one never leaves a gap.
pub struct Poller {
    source: BigChatClient,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    interval: Duration,
    last_checked: DateTime<Utc>,
}

impl Poller {
    pub fn new(
        source: BigChatClient,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
        config: &SyncConfig,
    ) -> Result<Self> {
        let last_checked = config.initial_checkpoint(clock.now())?;
        Ok(Self {
            source,
            dispatcher,
            clock,
            interval: config.poll_interval(),
            last_checked,
        })
    }

    pub fn last_checked(&self) -> DateTime<Utc> {
        self.last_checked
    }

    /// One fetch/dispatch cycle. Always advances the checkpoint.
    pub async fn poll_once(&mut self) -> BatchSummary {
        let now = self.clock.now();

        let summary = match self.source.fetch_events(self.last_checked).await {
            Ok(batch) => match batch.events {
                Some(events) => self.dispatcher.dispatch(&events).await,
                None => BatchSummary::default(),
            },
            Err(e) => {
                error!("Error fetching events: {:#}", e);
                BatchSummary::default()
            }
        };

        self.last_checked = now;
        summary
    }

    /// Poll until `shutdown` flips to true. The sleep between cycles is
    /// interrupted by shutdown; a cycle in progress is not.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Polling BigChat every {}s starting from {}",
            self.interval.as_secs(),
            self.last_checked
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.poll_once().await;

            tokio::select! {
                _ = self.clock.sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    // Sender dropped: treat as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Sync loop stopped at checkpoint {}", self.last_checked());
    }
}
