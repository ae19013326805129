use crate::client::{Operation, TrackingClient};
use crate::event::{EventKind, OutboundEvent, Properties};

/// Which remote operations events are delivered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Back-dated ingestion through the import endpoint, authorized with an api key.
    Import { api_key: String },
    /// Track events and profile updates, dispatched on the event type.
    Standard,
}

/// Properties that are not valid in a profile increment payload.
const NON_INCREMENT_KEYS: [&str; 2] = ["ip", "time"];

/// The remote operation `event` will be delivered with in `mode`.
pub fn operation_for(event: &OutboundEvent, mode: &DeliveryMode) -> Operation {
    match mode {
        DeliveryMode::Import { .. } => Operation::Import,
        DeliveryMode::Standard => match event.kind() {
            EventKind::ProfileUpdate => Operation::ProfileSet,
            EventKind::ProfileIncrement => Operation::ProfileIncrement,
            EventKind::Track => Operation::Track,
        },
    }
}

/// Deliver a single event, returning the client's success signal unchanged.
pub async fn deliver<C: TrackingClient + ?Sized>(
    event: &OutboundEvent,
    client: &mut C,
    mode: &DeliveryMode,
) -> bool {
    let distinct_id = event.distinct_id.as_str();
    let properties = &event.properties;

    match (mode, operation_for(event, mode)) {
        (DeliveryMode::Import { api_key }, _) => {
            client
                .import(api_key, distinct_id, &event.event_name, properties)
                .await
        }
        (DeliveryMode::Standard, Operation::ProfileSet) => {
            client
                .profile_set(distinct_id, properties, event.ip())
                .await
        }
        (DeliveryMode::Standard, Operation::ProfileIncrement) => {
            let increments: Properties = properties
                .iter()
                .filter(|(key, _)| !NON_INCREMENT_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            client
                .profile_increment(distinct_id, &increments, event.ip(), true)
                .await
        }
        (DeliveryMode::Standard, _) => {
            client
                .track(distinct_id, &event.event_name, properties)
                .await
        }
    }
}
