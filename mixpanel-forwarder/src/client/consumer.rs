use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::message::{Endpoint, Message};
use super::ClientError;

/// Body returned by Mixpanel when `verbose=1` is requested.
#[derive(Debug, Deserialize)]
struct VerboseResponse {
    status: i64,
    error: Option<String>,
}

/// Posts form-encoded, base64 wrapped JSON to Mixpanel's ingestion API.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: reqwest::Client,
    api_host: String,
}

impl HttpSender {
    pub fn new(client: reqwest::Client, api_host: &str) -> Self {
        Self {
            client,
            api_host: api_host.trim_end_matches('/').to_owned(),
        }
    }

    pub async fn send(
        &self,
        endpoint: Endpoint,
        data: &Value,
        api_key: Option<&str>,
    ) -> Result<(), ClientError> {
        let encoded = STANDARD.encode(serde_json::to_vec(data)?);

        let mut form = vec![("data", encoded.as_str()), ("verbose", "1")];
        if let Some(api_key) = api_key {
            form.push(("api_key", api_key));
        }

        let url = format!("{}{}", self.api_host, endpoint.path());
        let response = self.client.post(url).form(&form).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status { status, body });
        }

        match serde_json::from_str::<VerboseResponse>(&body) {
            Ok(VerboseResponse { status: 1, .. }) => Ok(()),
            Ok(VerboseResponse { error, .. }) => Err(ClientError::Rejected(error.unwrap_or(body))),
            Err(_) => Err(ClientError::Rejected(body)),
        }
    }
}

/// How messages reach Mixpanel, chosen when a tracker is built.
#[derive(Debug)]
pub enum Consumer {
    /// Every message is its own request.
    Direct(HttpSender),
    /// Messages are queued and sent in batches.
    Buffered(BufferedConsumer),
}

impl Consumer {
    pub async fn send(&mut self, message: Message) -> Result<(), ClientError> {
        match self {
            Consumer::Direct(sender) => {
                sender
                    .send(message.endpoint, &message.data, message.api_key.as_deref())
                    .await
            }
            Consumer::Buffered(buffered) => buffered.send(message).await,
        }
    }

    pub async fn flush(&mut self) -> Result<(), ClientError> {
        match self {
            Consumer::Direct(_) => Ok(()),
            Consumer::Buffered(buffered) => buffered.flush().await,
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, Consumer::Buffered(_))
    }
}

type QueueKey = (Endpoint, Option<String>);

/// Queues messages per endpoint (and per api key for imports), sending a queue as a single
/// JSON array request once it holds `max_batch_size` messages or on [`BufferedConsumer::flush`].
#[derive(Debug)]
pub struct BufferedConsumer {
    sender: HttpSender,
    max_batch_size: usize,
    queues: BTreeMap<QueueKey, Vec<Value>>,
}

impl BufferedConsumer {
    pub fn new(sender: HttpSender, max_batch_size: usize) -> Self {
        Self {
            sender,
            max_batch_size: max_batch_size.max(1),
            queues: BTreeMap::new(),
        }
    }

    pub async fn send(&mut self, message: Message) -> Result<(), ClientError> {
        let key = (message.endpoint, message.api_key);
        let queue = self.queues.entry(key.clone()).or_default();
        queue.push(message.data);

        if queue.len() >= self.max_batch_size {
            self.flush_queue(&key).await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), ClientError> {
        let keys: Vec<QueueKey> = self.queues.keys().cloned().collect();
        for key in keys {
            self.flush_queue(&key).await?;
        }
        Ok(())
    }

    pub fn queued(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }

    async fn flush_queue(&mut self, key: &QueueKey) -> Result<(), ClientError> {
        let Some(queue) = self.queues.get_mut(key) else {
            return Ok(());
        };
        let messages = std::mem::take(queue);

        let mut sent = 0;
        for batch in messages.chunks(self.max_batch_size) {
            let data = Value::Array(batch.to_vec());
            if let Err(e) = self.sender.send(key.0, &data, key.1.as_deref()).await {
                // Unsent messages stay queued for the next flush
                if let Some(queue) = self.queues.get_mut(key) {
                    let mut restored = messages[sent..].to_vec();
                    restored.append(queue);
                    *queue = restored;
                }
                return Err(e);
            }
            sent += batch.len();
        }

        debug!("flushed {} messages to {}", sent, key.0.path());
        Ok(())
    }
}
