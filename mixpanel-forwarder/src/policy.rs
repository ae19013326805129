use tracing::{debug, info};

use crate::client::TrackingClient;
use crate::config::Config;
use crate::error::DeliveryError;
use crate::event::OutboundEvent;
use crate::router::{deliver, operation_for, DeliveryMode};

/// What to do with a chunk's events once they are mapped.
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    pub mode: DeliveryMode,
    /// Drop (and log) events the backend rejects instead of failing the chunk.
    pub discard_event_on_send_error: bool,
    /// Whether the client queues messages that must be flushed once all events are attempted.
    pub batching: bool,
}

impl From<&Config> for DeliveryPolicy {
    fn from(config: &Config) -> Self {
        let mode = if config.use_import {
            DeliveryMode::Import {
                api_key: config.api_key.clone(),
            }
        } else {
            DeliveryMode::Standard
        };

        Self {
            mode,
            discard_event_on_send_error: config.discard_event_on_send_error,
            batching: config.batch_to_mixpanel,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySummary {
    pub delivered: usize,
    pub discarded: usize,
}

impl DeliveryPolicy {
    /// Deliver `events` in order.
    ///
    /// Unless failures are discarded, the first rejected event aborts the run and is returned
    /// in the error; events after it are never attempted and events before it stay delivered.
    /// When batching, the client is flushed once after every event was attempted.
    pub async fn run<C: TrackingClient + ?Sized>(
        &self,
        events: Vec<OutboundEvent>,
        client: &mut C,
    ) -> Result<DeliverySummary, DeliveryError> {
        debug!("sending {} events to mixpanel", events.len());

        let mut summary = DeliverySummary::default();

        for event in events {
            if deliver(&event, &mut *client, &self.mode).await {
                summary.delivered += 1;
                metrics::counter!("mixpanel_events_delivered").increment(1);
                continue;
            }

            metrics::counter!("mixpanel_delivery_failures").increment(1);

            if !self.discard_event_on_send_error {
                return Err(DeliveryError::Rejected {
                    operation: operation_for(&event, &self.mode),
                    event: Box::new(event),
                });
            }

            info!(
                "Failed to track event to mixpanel:\n\tRecord: {}",
                serde_json::to_string(&event).unwrap_or_default()
            );
            metrics::counter!("mixpanel_events_discarded").increment(1);
            summary.discarded += 1;
        }

        if self.batching {
            client.flush_batch().await.map_err(DeliveryError::Flush)?;
            metrics::counter!("mixpanel_batch_flushes").increment(1);
        }

        Ok(summary)
    }
}
