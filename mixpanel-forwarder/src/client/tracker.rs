use async_trait::async_trait;
use chrono::Utc;
use reqwest::header;
use serde_json::Value;
use tracing::error;

use super::consumer::{BufferedConsumer, Consumer, HttpSender};
use super::message::Message;
use super::{ClientError, Operation, TrackerFactory, TrackingClient};
use crate::config::Config;
use crate::event::Properties;

/// A [`TrackingClient`] talking to Mixpanel. Transport errors are logged and reported as a
/// failed operation, so callers only ever see the bool.
#[derive(Debug)]
pub struct MixpanelTracker {
    token: String,
    consumer: Consumer,
}

impl MixpanelTracker {
    pub fn new(token: &str, consumer: Consumer) -> Self {
        Self {
            token: token.to_owned(),
            consumer,
        }
    }

    pub fn is_batched(&self) -> bool {
        self.consumer.is_buffered()
    }

    async fn send(&mut self, operation: Operation, message: Message) -> bool {
        match self.consumer.send(message).await {
            Ok(()) => true,
            Err(e) => {
                error!("failed to {operation} to mixpanel: {e}");
                false
            }
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl TrackingClient for MixpanelTracker {
    async fn track(
        &mut self,
        distinct_id: &str,
        event_name: &str,
        properties: &Properties,
    ) -> bool {
        let message = Message::track(&self.token, distinct_id, event_name, properties, now_ms());
        self.send(Operation::Track, message).await
    }

    async fn profile_set(
        &mut self,
        distinct_id: &str,
        properties: &Properties,
        ip: Option<&Value>,
    ) -> bool {
        let message = Message::profile_set(&self.token, distinct_id, properties, ip, now_ms());
        self.send(Operation::ProfileSet, message).await
    }

    async fn profile_increment(
        &mut self,
        distinct_id: &str,
        properties: &Properties,
        ip: Option<&Value>,
        ignore_time: bool,
    ) -> bool {
        let message = Message::profile_increment(
            &self.token,
            distinct_id,
            properties,
            ip,
            ignore_time,
            now_ms(),
        );
        self.send(Operation::ProfileIncrement, message).await
    }

    async fn import(
        &mut self,
        api_key: &str,
        distinct_id: &str,
        event_name: &str,
        properties: &Properties,
    ) -> bool {
        let message = Message::import(
            &self.token,
            api_key,
            distinct_id,
            event_name,
            properties,
            now_ms(),
        );
        self.send(Operation::Import, message).await
    }

    async fn flush_batch(&mut self) -> Result<(), ClientError> {
        self.consumer.flush().await
    }
}

/// Builds a [`MixpanelTracker`] per chunk. The HTTP connection pool is shared, queued
/// messages never are.
#[derive(Debug, Clone)]
pub struct MixpanelTrackerFactory {
    sender: HttpSender,
    token: String,
    batched: bool,
    max_batch_size: usize,
}

impl MixpanelTrackerFactory {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(config.request_timeout.0)
            .build()?;

        Ok(Self {
            sender: HttpSender::new(client, &config.api_host),
            token: config.project_token.as_str().to_owned(),
            batched: config.batch_to_mixpanel,
            max_batch_size: config.max_batch_size,
        })
    }
}

impl TrackerFactory for MixpanelTrackerFactory {
    type Client = MixpanelTracker;

    fn build(&self) -> MixpanelTracker {
        let consumer = if self.batched {
            Consumer::Buffered(BufferedConsumer::new(
                self.sender.clone(),
                self.max_batch_size,
            ))
        } else {
            Consumer::Direct(self.sender.clone())
        };
        MixpanelTracker::new(&self.token, consumer)
    }
}
