//! The remote operations the forwarder needs from an analytics backend.
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::event::Properties;

pub mod consumer;
pub mod message;
pub mod tracker;

pub use tracker::{MixpanelTracker, MixpanelTrackerFactory};

/// Remote operations exposed by an analytics backend. Every operation reports success as a
/// plain bool; transport details are the implementation's business.
///
/// A client is built for a single chunk delivery and must not be shared across chunks, as
/// batching implementations keep queued messages until [`TrackingClient::flush_batch`].
#[async_trait]
pub trait TrackingClient: Send {
    async fn track(&mut self, distinct_id: &str, event_name: &str, properties: &Properties)
        -> bool;

    async fn profile_set(
        &mut self,
        distinct_id: &str,
        properties: &Properties,
        ip: Option<&Value>,
    ) -> bool;

    async fn profile_increment(
        &mut self,
        distinct_id: &str,
        properties: &Properties,
        ip: Option<&Value>,
        ignore_time: bool,
    ) -> bool;

    async fn import(
        &mut self,
        api_key: &str,
        distinct_id: &str,
        event_name: &str,
        properties: &Properties,
    ) -> bool;

    /// Send everything queued so far. Clients that send immediately have nothing to do.
    async fn flush_batch(&mut self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Builds a fresh [`TrackingClient`] for every chunk delivery.
pub trait TrackerFactory: Send + Sync {
    type Client: TrackingClient;

    fn build(&self) -> Self::Client;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Track,
    ProfileSet,
    ProfileIncrement,
    Import,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Track => "track",
            Operation::ProfileSet => "set profile for",
            Operation::ProfileIncrement => "increment profile for",
            Operation::Import => "import",
        };
        write!(f, "{name}")
    }
}

/// Transport level failures of the Mixpanel client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request to mixpanel failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("mixpanel responded with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("mixpanel rejected the message: {0}")]
    Rejected(String),
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}
