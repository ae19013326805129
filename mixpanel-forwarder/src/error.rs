use thiserror::Error;

use crate::client::{ClientError, Operation};
use crate::event::OutboundEvent;

/// Enumeration of configuration errors, all fatal at load time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration from the environment: {0}")]
    Env(#[from] envconfig::Error),
    #[error("'event_key' must be specified when event_map_tag is false")]
    MissingEventKey,
    #[error("'api_key' must be specified when use_import is true")]
    MissingApiKey,
    #[error("'max_batch_size' must be greater than 0")]
    InvalidBatchSize,
}

/// Errors raised while delivering a chunk's events. Any of these means the chunk
/// has to be retried as a whole by whoever handed it to us.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("failed to {operation} event {:?} for distinct_id {:?} to mixpanel", .event.event_name, .event.distinct_id)]
    Rejected {
        operation: Operation,
        event: Box<OutboundEvent>,
    },
    #[error("failed to flush batched messages to mixpanel: {0}")]
    Flush(#[source] ClientError),
}

/// Errors raised while decoding a chunk.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("failed to decode chunk entry {index}: {source}")]
    Decode {
        index: usize,
        source: rmp_serde::decode::Error,
    },
    #[error("failed to encode chunk entry: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

/// Errors that escape a chunk-processing entry point.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] ChunkError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
