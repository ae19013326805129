//! An in-memory [`TrackingClient`] that records every call, for tests.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{ClientError, TrackerFactory, TrackingClient};
use crate::event::Properties;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Track {
        distinct_id: String,
        event_name: String,
        properties: Properties,
    },
    ProfileSet {
        distinct_id: String,
        properties: Properties,
        ip: Option<Value>,
    },
    ProfileIncrement {
        distinct_id: String,
        properties: Properties,
        ip: Option<Value>,
        ignore_time: bool,
    },
    Import {
        api_key: String,
        distinct_id: String,
        event_name: String,
        properties: Properties,
    },
    Flush,
}

impl RecordedCall {
    pub fn distinct_id(&self) -> Option<&str> {
        match self {
            RecordedCall::Track { distinct_id, .. }
            | RecordedCall::ProfileSet { distinct_id, .. }
            | RecordedCall::ProfileIncrement { distinct_id, .. }
            | RecordedCall::Import { distinct_id, .. } => Some(distinct_id),
            RecordedCall::Flush => None,
        }
    }
}

/// Calls shared between a client and the test inspecting it.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<RecordedCall>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn push(&self, call: RecordedCall) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

/// Records calls and fails the remote operations whose (zero based) position is listed in
/// `fail_on`.
#[derive(Debug, Default)]
pub struct RecordingClient {
    log: CallLog,
    fail_on: Vec<usize>,
    fail_flush: bool,
    attempts: usize,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, attempts: &[usize]) -> Self {
        self.fail_on = attempts.to_vec();
        self
    }

    pub fn failing_flush(mut self) -> Self {
        self.fail_flush = true;
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.log.calls()
    }

    fn record(&mut self, call: RecordedCall) -> bool {
        self.log.push(call);
        let ok = !self.fail_on.contains(&self.attempts);
        self.attempts += 1;
        ok
    }
}

#[async_trait]
impl TrackingClient for RecordingClient {
    async fn track(
        &mut self,
        distinct_id: &str,
        event_name: &str,
        properties: &Properties,
    ) -> bool {
        self.record(RecordedCall::Track {
            distinct_id: distinct_id.to_owned(),
            event_name: event_name.to_owned(),
            properties: properties.clone(),
        })
    }

    async fn profile_set(
        &mut self,
        distinct_id: &str,
        properties: &Properties,
        ip: Option<&Value>,
    ) -> bool {
        self.record(RecordedCall::ProfileSet {
            distinct_id: distinct_id.to_owned(),
            properties: properties.clone(),
            ip: ip.cloned(),
        })
    }

    async fn profile_increment(
        &mut self,
        distinct_id: &str,
        properties: &Properties,
        ip: Option<&Value>,
        ignore_time: bool,
    ) -> bool {
        self.record(RecordedCall::ProfileIncrement {
            distinct_id: distinct_id.to_owned(),
            properties: properties.clone(),
            ip: ip.cloned(),
            ignore_time,
        })
    }

    async fn import(
        &mut self,
        api_key: &str,
        distinct_id: &str,
        event_name: &str,
        properties: &Properties,
    ) -> bool {
        self.record(RecordedCall::Import {
            api_key: api_key.to_owned(),
            distinct_id: distinct_id.to_owned(),
            event_name: event_name.to_owned(),
            properties: properties.clone(),
        })
    }

    async fn flush_batch(&mut self) -> Result<(), ClientError> {
        self.log.push(RecordedCall::Flush);
        if self.fail_flush {
            return Err(ClientError::Rejected("flush failed".to_owned()));
        }
        Ok(())
    }
}

/// Hands out [`RecordingClient`]s that all write to the same [`CallLog`].
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    pub log: CallLog,
    fail_on: Vec<usize>,
    built: Arc<AtomicUsize>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, attempts: &[usize]) -> Self {
        self.fail_on = attempts.to_vec();
        self
    }

    /// How many clients were built so far.
    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

impl TrackerFactory for RecordingFactory {
    type Client = RecordingClient;

    fn build(&self) -> RecordingClient {
        self.built.fetch_add(1, Ordering::SeqCst);
        RecordingClient {
            log: self.log.clone(),
            fail_on: self.fail_on.clone(),
            fail_flush: false,
            attempts: 0,
        }
    }
}
