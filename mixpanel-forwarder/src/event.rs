use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Properties = Map<String, Value>;

pub const PROFILE_UPDATE: &str = "profile_update";
pub const PROFILE_INCREMENT: &str = "profile_inc";

/// One `(tag, time, record)` entry of a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundRecord {
    pub tag: String,
    pub time: i64,
    pub record: Properties,
}

impl InboundRecord {
    pub fn new(tag: impl Into<String>, time: i64, record: Properties) -> Self {
        Self {
            tag: tag.into(),
            time,
            record,
        }
    }

    /// Returns the value at `key` if it is truthy.
    pub fn truthy(&self, key: &str) -> Option<&Value> {
        self.record.get(key).filter(|v| is_truthy(v))
    }
}

/// Anything other than a missing value, `null` or `false` counts as set.
pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// The result of mapping a single record, consumed once by the delivery router.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEvent {
    #[serde(rename = "event")]
    pub event_name: String,
    pub distinct_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    pub properties: Properties,
    #[serde(skip)]
    pub effective_time: Value,
    #[serde(skip)]
    pub received_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Track,
    ProfileUpdate,
    ProfileIncrement,
}

impl OutboundEvent {
    pub fn kind(&self) -> EventKind {
        match self.event_type.as_deref() {
            Some(PROFILE_UPDATE) => EventKind::ProfileUpdate,
            Some(PROFILE_INCREMENT) => EventKind::ProfileIncrement,
            _ => EventKind::Track,
        }
    }

    pub fn ip(&self) -> Option<&Value> {
        self.properties.get("ip")
    }
}
