use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::event::{InboundRecord, OutboundEvent};
use crate::sanitize::{sanitize_excluding, RESERVED_PREFIX};

const IP_PROPERTY: &str = "ip";
const TIME_PROPERTY: &str = "time";
const RECEIVED_AT_PROPERTY: &str = "fl_fluent_ts";

/// Why a record produced no event. Skips are expected and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingEvent,
    ReservedEvent,
    MissingDistinctId,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingEvent => "missing_event",
            SkipReason::ReservedEvent => "reserved_event",
            SkipReason::MissingDistinctId => "missing_distinct_id",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mapped {
    Event(OutboundEvent),
    Skip(SkipReason),
}

/// Turns raw log records into [`OutboundEvent`]s.
#[derive(Debug, Clone)]
pub struct EventMapper {
    pub distinct_id_key: String,
    pub event_key: Option<String>,
    pub event_type_key: Option<String>,
    pub ip_key: Option<String>,
    pub event_map_tag: bool,
    pub use_legacy_prefix_behavior: bool,
}

impl From<&Config> for EventMapper {
    fn from(config: &Config) -> Self {
        Self {
            distinct_id_key: config.distinct_id_key.as_str().to_owned(),
            event_key: config.event_key.clone(),
            event_type_key: config.event_type_key.clone(),
            ip_key: config.ip_key.clone(),
            event_map_tag: config.event_map_tag,
            use_legacy_prefix_behavior: config.use_legacy_prefix_behavior,
        }
    }
}

impl EventMapper {
    /// Map one record. `received_at` is the processing time in microseconds and
    /// is stamped into the properties as `fl_fluent_ts`.
    pub fn map(&self, record: &InboundRecord, received_at: i64) -> Mapped {
        let Some(event_name) = self.event_name(record) else {
            warn!(
                "no event, tag: {}, time: {}, record: {}",
                record.tag,
                record.time,
                record_json(record)
            );
            return Mapped::Skip(SkipReason::MissingEvent);
        };

        // Browser-only special events
        if event_name.starts_with(RESERVED_PREFIX) {
            debug!("skipping reserved event {event_name}");
            return Mapped::Skip(SkipReason::ReservedEvent);
        }

        let Some(distinct_id) = record
            .truthy(&self.distinct_id_key)
            .and_then(as_identifier)
        else {
            warn!(
                "no distinct_id, tag: {}, time: {}, record: {}",
                record.tag,
                record.time,
                record_json(record)
            );
            return Mapped::Skip(SkipReason::MissingDistinctId);
        };

        let event_type = self
            .event_type_key
            .as_deref()
            .and_then(|key| record.truthy(key))
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });

        let ip = self
            .ip_key
            .as_deref()
            .and_then(|key| record.truthy(key))
            .cloned();

        let consumed: Vec<&str> = [
            Some(self.distinct_id_key.as_str()),
            self.event_key.as_deref(),
            self.event_type_key.as_deref(),
            ip.as_ref().and(self.ip_key.as_deref()),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut properties = sanitize_excluding(record.record.clone(), &consumed);

        if let Some(ip) = ip {
            properties.insert(IP_PROPERTY.to_owned(), ip);
        }

        let effective_time = record
            .truthy(TIME_PROPERTY)
            .cloned()
            .unwrap_or_else(|| Value::from(record.time));

        properties.insert(TIME_PROPERTY.to_owned(), effective_time.clone());
        properties.insert(RECEIVED_AT_PROPERTY.to_owned(), Value::from(received_at));

        Mapped::Event(OutboundEvent {
            event_name,
            distinct_id,
            event_type,
            properties,
            effective_time,
            received_at,
        })
    }

    fn event_name(&self, record: &InboundRecord) -> Option<String> {
        if self.event_map_tag {
            let tag = if self.use_legacy_prefix_behavior {
                record.tag.strip_prefix('.').unwrap_or(&record.tag)
            } else {
                &record.tag
            };
            return Some(tag.to_owned()).filter(|t| !t.is_empty());
        }

        self.event_key
            .as_deref()
            .and_then(|key| record.truthy(key))
            .and_then(as_identifier)
    }
}

/// Names and ids must be scalars; numbers are accepted in their JSON form.
fn as_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_owned()),
        _ => None,
    }
}

fn record_json(record: &InboundRecord) -> String {
    serde_json::to_string(&record.record).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event::Properties;

    const RECEIVED_AT: i64 = 1_700_000_000_000_000;

    fn mapper() -> EventMapper {
        EventMapper {
            distinct_id_key: "distinct_id".to_string(),
            event_key: Some("ev".to_string()),
            event_type_key: None,
            ip_key: None,
            event_map_tag: false,
            use_legacy_prefix_behavior: true,
        }
    }

    fn record(tag: &str, time: i64, value: Value) -> InboundRecord {
        let Value::Object(map) = value else {
            panic!("expected an object")
        };
        InboundRecord::new(tag, time, map)
    }

    fn expect_event(mapped: Mapped) -> OutboundEvent {
        match mapped {
            Mapped::Event(event) => event,
            Mapped::Skip(reason) => panic!("unexpected skip: {reason:?}"),
        }
    }

    #[test]
    fn test_maps_event_key_record() {
        let input = record(
            "app.signup",
            200,
            json!({"time": 100, "distinct_id": "u1", "ev": "signup", "foo": "bar", "token": "t"}),
        );

        let event = expect_event(mapper().map(&input, RECEIVED_AT));

        assert_eq!(event.event_name, "signup");
        assert_eq!(event.distinct_id, "u1");
        assert_eq!(event.event_type, None);
        assert_eq!(event.effective_time, json!(100));
        assert_eq!(event.received_at, RECEIVED_AT);
        assert_eq!(
            Value::Object(event.properties),
            json!({"foo": "bar", "time": 100, "fl_fluent_ts": RECEIVED_AT})
        );
    }

    #[test]
    fn test_chunk_time_used_when_record_has_no_time() {
        let input = record("t", 200, json!({"distinct_id": "u1", "ev": "x", "time": null}));

        let event = expect_event(mapper().map(&input, RECEIVED_AT));

        assert_eq!(event.effective_time, json!(200));
        assert_eq!(event.properties["time"], json!(200));
    }

    #[test]
    fn test_stamps_overwrite_existing_keys() {
        let input = record(
            "t",
            200,
            json!({"distinct_id": "u1", "ev": "x", "fl_fluent_ts": "old"}),
        );

        let event = expect_event(mapper().map(&input, RECEIVED_AT));

        assert_eq!(event.properties["fl_fluent_ts"], json!(RECEIVED_AT));
    }

    #[test]
    fn test_missing_event_is_skipped() {
        let mapper = mapper();

        for value in [
            json!({"distinct_id": "u1"}),
            json!({"distinct_id": "u1", "ev": null}),
            json!({"distinct_id": "u1", "ev": false}),
            json!({"distinct_id": "u1", "ev": ""}),
            json!({"distinct_id": "u1", "ev": {"nested": true}}),
        ] {
            let input = record("app.signup", 1, value);
            assert_eq!(
                mapper.map(&input, RECEIVED_AT),
                Mapped::Skip(SkipReason::MissingEvent)
            );
        }
    }

    #[test]
    fn test_event_map_tag_with_legacy_prefix() {
        let mut mapper = mapper();
        mapper.event_map_tag = true;
        let input = record(".app.signup", 1, json!({"distinct_id": "u1"}));

        let event = expect_event(mapper.map(&input, RECEIVED_AT));
        assert_eq!(event.event_name, "app.signup");

        mapper.use_legacy_prefix_behavior = false;
        let event = expect_event(mapper.map(&input, RECEIVED_AT));
        assert_eq!(event.event_name, ".app.signup");
    }

    #[test]
    fn test_legacy_prefix_strips_only_one_dot() {
        let mut mapper = mapper();
        mapper.event_map_tag = true;
        let input = record("..app", 1, json!({"distinct_id": "u1"}));

        let event = expect_event(mapper.map(&input, RECEIVED_AT));
        assert_eq!(event.event_name, ".app");
    }

    #[test]
    fn test_event_map_tag_wins_over_event_key() {
        let mut mapper = mapper();
        mapper.event_map_tag = true;
        let input = record("app.signup", 1, json!({"distinct_id": "u1", "ev": "other"}));

        let event = expect_event(mapper.map(&input, RECEIVED_AT));
        assert_eq!(event.event_name, "app.signup");
        assert!(!event.properties.contains_key("ev"));
    }

    #[test]
    fn test_reserved_events_are_skipped() {
        let input = record("t", 1, json!({"distinct_id": "u1", "ev": "mp_page_view"}));
        assert_eq!(
            mapper().map(&input, RECEIVED_AT),
            Mapped::Skip(SkipReason::ReservedEvent)
        );

        // even when the distinct id is missing too
        let input = record("t", 1, json!({"ev": "mp_page_view"}));
        assert_eq!(
            mapper().map(&input, RECEIVED_AT),
            Mapped::Skip(SkipReason::ReservedEvent)
        );

        let mut mapper = mapper();
        mapper.event_map_tag = true;
        let input = record(".mp_thing", 1, json!({"distinct_id": "u1"}));
        assert_eq!(
            mapper.map(&input, RECEIVED_AT),
            Mapped::Skip(SkipReason::ReservedEvent)
        );
    }

    #[test]
    fn test_missing_distinct_id_is_skipped() {
        for value in [
            json!({"ev": "signup"}),
            json!({"ev": "signup", "distinct_id": null}),
            json!({"ev": "signup", "distinct_id": ""}),
        ] {
            let input = record("t", 1, value);
            assert_eq!(
                mapper().map(&input, RECEIVED_AT),
                Mapped::Skip(SkipReason::MissingDistinctId)
            );
        }
    }

    #[test]
    fn test_numeric_distinct_id_is_stringified() {
        let input = record("t", 1, json!({"ev": "signup", "distinct_id": 42}));

        let event = expect_event(mapper().map(&input, RECEIVED_AT));
        assert_eq!(event.distinct_id, "42");
    }

    #[test]
    fn test_event_type_is_promoted() {
        let mut mapper = mapper();
        mapper.event_type_key = Some("kind".to_string());

        let input = record(
            "t",
            1,
            json!({"ev": "x", "distinct_id": "u1", "kind": "profile_inc", "count": 1}),
        );
        let event = expect_event(mapper.map(&input, RECEIVED_AT));
        assert_eq!(event.event_type.as_deref(), Some("profile_inc"));
        assert!(!event.properties.contains_key("kind"));

        // a falsy type is dropped from the properties but not promoted
        let input = record("t", 1, json!({"ev": "x", "distinct_id": "u1", "kind": false}));
        let event = expect_event(mapper.map(&input, RECEIVED_AT));
        assert_eq!(event.event_type, None);
        assert!(!event.properties.contains_key("kind"));
    }

    #[test]
    fn test_ip_key_is_renamed() {
        let mut mapper = mapper();
        mapper.ip_key = Some("remote_addr".to_string());

        let input = record(
            "t",
            1,
            json!({"ev": "x", "distinct_id": "u1", "remote_addr": "10.0.0.1"}),
        );
        let event = expect_event(mapper.map(&input, RECEIVED_AT));
        assert_eq!(event.properties["ip"], json!("10.0.0.1"));
        assert!(!event.properties.contains_key("remote_addr"));

        // absent ip key leaves everything alone
        let input = record("t", 1, json!({"ev": "x", "distinct_id": "u1"}));
        let event = expect_event(mapper.map(&input, RECEIVED_AT));
        assert!(!event.properties.contains_key("ip"));
    }

    #[test]
    fn test_ip_key_named_ip_is_kept() {
        let mut mapper = mapper();
        mapper.ip_key = Some("ip".to_string());

        let input = record("t", 1, json!({"ev": "x", "distinct_id": "u1", "ip": "10.0.0.1"}));
        let event = expect_event(mapper.map(&input, RECEIVED_AT));
        assert_eq!(event.properties["ip"], json!("10.0.0.1"));
    }

    #[test]
    fn test_properties_never_contain_reserved_or_consumed_keys() {
        let mut mapper = mapper();
        mapper.event_type_key = Some("kind".to_string());
        mapper.ip_key = Some("addr".to_string());

        let input = record(
            "t",
            1,
            json!({
                "ev": "x",
                "distinct_id": "u1",
                "kind": "profile_update",
                "addr": "1.2.3.4",
                "token": "t",
                "mp_lib": "web",
                "mp_keyword": "k",
                "keep": true,
            }),
        );
        let event = expect_event(mapper.map(&input, RECEIVED_AT));

        let keys: Vec<&String> = event.properties.keys().collect();
        for key in &keys {
            assert!(!key.starts_with("mp_"));
            assert!(!["token", "ev", "distinct_id", "kind", "addr"].contains(&key.as_str()));
        }
        let mut keys: Vec<&str> = keys.into_iter().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["fl_fluent_ts", "ip", "keep", "time"]);
    }

    #[test]
    fn test_mapping_does_not_touch_the_record() {
        let input = record("t", 1, json!({"ev": "x", "distinct_id": "u1", "token": "t"}));
        let before: Properties = input.record.clone();

        mapper().map(&input, RECEIVED_AT);

        assert_eq!(input.record, before);
    }
}
