use serde_json::{json, Value};

use crate::event::Properties;

const LIB_NAME: &str = env!("CARGO_PKG_NAME");
const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    Track,
    Engage,
    Import,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Track => "/track",
            Endpoint::Engage => "/engage",
            Endpoint::Import => "/import",
        }
    }
}

/// A single message destined to one of Mixpanel's ingestion endpoints. `data` is the JSON
/// document that ends up base64 encoded in the request.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub endpoint: Endpoint,
    pub data: Value,
    pub api_key: Option<String>,
}

impl Message {
    pub fn track(
        token: &str,
        distinct_id: &str,
        event_name: &str,
        properties: &Properties,
        now_ms: i64,
    ) -> Self {
        Self {
            endpoint: Endpoint::Track,
            data: event_data(token, distinct_id, event_name, properties, now_ms),
            api_key: None,
        }
    }

    pub fn import(
        token: &str,
        api_key: &str,
        distinct_id: &str,
        event_name: &str,
        properties: &Properties,
        now_ms: i64,
    ) -> Self {
        Self {
            endpoint: Endpoint::Import,
            data: event_data(token, distinct_id, event_name, properties, now_ms),
            api_key: Some(api_key.to_owned()),
        }
    }

    pub fn profile_set(
        token: &str,
        distinct_id: &str,
        properties: &Properties,
        ip: Option<&Value>,
        now_ms: i64,
    ) -> Self {
        Self {
            endpoint: Endpoint::Engage,
            data: profile_data(token, distinct_id, "$set", properties, ip, false, now_ms),
            api_key: None,
        }
    }

    pub fn profile_increment(
        token: &str,
        distinct_id: &str,
        properties: &Properties,
        ip: Option<&Value>,
        ignore_time: bool,
        now_ms: i64,
    ) -> Self {
        Self {
            endpoint: Endpoint::Engage,
            data: profile_data(token, distinct_id, "$add", properties, ip, ignore_time, now_ms),
            api_key: None,
        }
    }
}

fn event_data(
    token: &str,
    distinct_id: &str,
    event_name: &str,
    properties: &Properties,
    now_ms: i64,
) -> Value {
    let mut merged = Properties::new();
    merged.insert("token".to_owned(), Value::from(token));
    merged.insert("distinct_id".to_owned(), Value::from(distinct_id));
    merged.insert("time".to_owned(), Value::from(now_ms));
    merged.insert("mp_lib".to_owned(), Value::from(LIB_NAME));
    merged.insert("$lib_version".to_owned(), Value::from(LIB_VERSION));
    // Caller supplied properties win, in particular "time"
    merged.extend(properties.clone());

    json!({
        "event": event_name,
        "properties": merged,
    })
}

fn profile_data(
    token: &str,
    distinct_id: &str,
    operation: &str,
    properties: &Properties,
    ip: Option<&Value>,
    ignore_time: bool,
    now_ms: i64,
) -> Value {
    let mut data = Properties::new();
    data.insert("$token".to_owned(), Value::from(token));
    data.insert("$distinct_id".to_owned(), Value::from(distinct_id));
    data.insert("$time".to_owned(), Value::from(now_ms));
    data.insert(operation.to_owned(), Value::Object(properties.clone()));
    if let Some(ip) = ip {
        data.insert("$ip".to_owned(), ip.clone());
    }
    if ignore_time {
        data.insert("$ignore_time".to_owned(), Value::from("true"));
    }
    Value::Object(data)
}
