//! Decoding registry logs into typed events

use crate::error::DecodeError;
use crate::reader::RawLog;
use serde::de::DeserializeOwned;
use serde::Serialize;
use wfsync_types::{Event, EventPayload, EventType};

/// Decode a raw registry log.
///
/// Unknown log names fail with [`DecodeError::UnknownEventType`] so the
/// caller can report them instead of dropping them silently.
pub fn decode_log(log: &RawLog) -> Result<Event, DecodeError> {
    let event_type: EventType =
        log.event_type
            .parse()
            .map_err(|event_type| DecodeError::UnknownEventType {
                event_type,
                position: log.position,
            })?;

    let payload = match event_type {
        EventType::WorkflowRegistered => EventPayload::Registered(parse(log)?),
        EventType::WorkflowActivated => EventPayload::Activated(parse(log)?),
        EventType::WorkflowPaused => EventPayload::Paused(parse(log)?),
        EventType::WorkflowUpdated => EventPayload::Updated(parse(log)?),
        EventType::WorkflowDeleted => EventPayload::Deleted(parse(log)?),
        EventType::ForceUpdateSecrets => EventPayload::ForceUpdateSecrets(parse(log)?),
    };

    Ok(Event::new(log.position, payload))
}

/// Encode an event as the log the registry would emit for it.
pub fn encode_event(event: &Event) -> RawLog {
    let data = match &event.payload {
        EventPayload::Registered(p) => to_value(p),
        EventPayload::Activated(p) => to_value(p),
        EventPayload::Paused(p) => to_value(p),
        EventPayload::Updated(p) => to_value(p),
        EventPayload::Deleted(p) => to_value(p),
        EventPayload::ForceUpdateSecrets(p) => to_value(p),
    };

    RawLog {
        position: event.position,
        event_type: event.event_type().as_str().to_string(),
        data,
    }
}

fn parse<T: DeserializeOwned>(log: &RawLog) -> Result<T, DecodeError> {
    T::deserialize(&log.data).map_err(|e| DecodeError::MalformedPayload {
        event_type: log.event_type.clone(),
        position: log.position,
        reason: e.to_string(),
    })
}

// Payloads are plain structs of strings and numbers.
fn to_value<T: Serialize>(payload: &T) -> serde_json::Value {
    serde_json::to_value(payload).unwrap_or(serde_json::Value::Null)
}
