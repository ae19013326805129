use chrono::Utc;
use tracing::info;

use crate::chunk::decode_chunk;
use crate::client::TrackerFactory;
use crate::config::Config;
use crate::error::{DeliveryError, PipelineError};
use crate::event::{InboundRecord, OutboundEvent};
use crate::mapper::{EventMapper, Mapped};
use crate::policy::DeliveryPolicy;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSummary {
    pub records: usize,
    pub skipped: usize,
    pub delivered: usize,
    pub discarded: usize,
}

/// Maps and delivers chunks. Holds no per-chunk state, so different chunks can be processed
/// concurrently through a shared reference.
pub struct Pipeline<F> {
    mapper: EventMapper,
    policy: DeliveryPolicy,
    factory: F,
}

impl<F: TrackerFactory> Pipeline<F> {
    pub fn new(config: &Config, factory: F) -> Self {
        Self::from_parts(EventMapper::from(config), DeliveryPolicy::from(config), factory)
    }

    pub fn from_parts(mapper: EventMapper, policy: DeliveryPolicy, factory: F) -> Self {
        Self {
            mapper,
            policy,
            factory,
        }
    }

    /// Decode a msgpack chunk and deliver its events.
    pub async fn process_chunk(&self, bytes: &[u8]) -> Result<ChunkSummary, PipelineError> {
        let records = decode_chunk(bytes)?;
        Ok(self.process_records(&records).await?)
    }

    /// Deliver already decoded records with a fresh client.
    pub async fn process_records(
        &self,
        records: &[InboundRecord],
    ) -> Result<ChunkSummary, DeliveryError> {
        let events = self.map_records(records);
        let skipped = records.len() - events.len();

        let mut client = self.factory.build();
        let delivery = self.policy.run(events, &mut client).await?;

        let summary = ChunkSummary {
            records: records.len(),
            skipped,
            delivered: delivery.delivered,
            discarded: delivery.discarded,
        };
        info!(
            "processed chunk of {} records: {} delivered, {} skipped, {} discarded",
            summary.records, summary.delivered, summary.skipped, summary.discarded
        );
        Ok(summary)
    }

    /// Map records in order, dropping the ones that produce no event.
    pub fn map_records(&self, records: &[InboundRecord]) -> Vec<OutboundEvent> {
        records
            .iter()
            .filter_map(|record| {
                match self.mapper.map(record, Utc::now().timestamp_micros()) {
                    Mapped::Event(event) => Some(event),
                    Mapped::Skip(reason) => {
                        metrics::counter!("mixpanel_records_skipped", "reason" => reason.as_str())
                            .increment(1);
                        None
                    }
                }
            })
            .collect()
    }
}
