use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::bail;
use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::types::{Cell, Record};

/// Name of the field gating persistence of a record.
pub const STATUS_FIELD: &str = "status";

/// One element of an inbound batch.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub payload: SinkEvent,
}

/// A change event as delivered by the upstream topic consumer.
///
/// Only the topic position and `value.data` are interpreted. `key`, `headers` and `timestamp`
/// are carried as raw JSON since producers disagree on their shapes.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkEvent {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    #[serde(default)]
    pub key: Option<Value>,
    pub value: EventValue,
    #[serde(default)]
    pub headers: Value,
    #[serde(default)]
    pub timestamp: Value,
}

/// The value part of a [`SinkEvent`], holding the record fields.
#[derive(Debug, Clone, Deserialize)]
pub struct EventValue {
    pub data: Map<String, Value>,
}

/// Position of the event a record was produced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOrigin {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl fmt::Display for RecordOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.topic, self.partition, self.offset)
    }
}

/// A record together with the status flag that decides whether it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    /// Where the record came from, when it was built from an event.
    pub origin: Option<RecordOrigin>,
    /// Whether the record should be persisted.
    pub active: bool,
    pub record: Record,
}

impl StatusRecord {
    pub fn new(active: bool, record: Record) -> Self {
        Self {
            origin: None,
            active,
            record,
        }
    }

    /// Builds a status record from a bare record, reading the flag from its `status` field.
    ///
    /// An absent or null `status` marks the record inactive. Any value other than a boolean
    /// is malformed input.
    pub fn from_record(record: Record) -> SinkResult<Self> {
        let active = match record.get(STATUS_FIELD) {
            None | Some(Cell::Null) => false,
            Some(Cell::Bool(active)) => *active,
            Some(other) => bail!(
                ErrorKind::InvalidData,
                "Status field is not a boolean",
                format!("`{STATUS_FIELD}` holds {other}")
            ),
        };

        Ok(Self::new(active, record))
    }

    pub fn with_origin(mut self, origin: RecordOrigin) -> Self {
        self.origin = Some(origin);
        self
    }
}

impl TryFrom<SinkEvent> for StatusRecord {
    type Error = SinkError;

    fn try_from(event: SinkEvent) -> Result<Self, Self::Error> {
        let origin = RecordOrigin {
            topic: event.topic,
            partition: event.partition,
            offset: event.offset,
        };

        let record = Record::try_from(event.value.data)?;
        Ok(StatusRecord::from_record(record)?.with_origin(origin))
    }
}

/// Parses an inbound batch, a JSON array of [`EventEnvelope`]s, into status records.
///
/// Records keep the order of the batch.
pub fn parse_event_batch(payload: &[u8]) -> SinkResult<Vec<StatusRecord>> {
    let envelopes: Vec<EventEnvelope> = serde_json::from_slice(payload)?;

    envelopes
        .into_iter()
        .map(|envelope| StatusRecord::try_from(envelope.payload))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH: &str = r#"[
        {
            "payload": {
                "topic": "records",
                "partition": 0,
                "offset": 41,
                "key": null,
                "value": {"data": {"id": 20, "field1": "value1", "status": true}},
                "headers": {},
                "timestamp": "2024-05-01T10:00:00Z"
            }
        },
        {
            "payload": {
                "topic": "records",
                "partition": 0,
                "offset": 42,
                "key": "21",
                "value": {"data": {"id": 21, "status": false}},
                "timestamp": "2024-05-01T10:00:01+02:00"
            }
        },
        {
            "payload": {
                "topic": "records",
                "partition": 1,
                "offset": 7,
                "value": {"data": {"id": 22}},
                "timestamp": "2024-05-01T10:00:02Z"
            }
        }
    ]"#;

    #[test]
    fn parses_batch_in_order() {
        let records = parse_event_batch(BATCH.as_bytes()).unwrap();

        assert_eq!(records.len(), 3);
        assert!(records[0].active);
        assert!(!records[1].active);
        assert!(!records[2].active);

        assert_eq!(records[0].record.get("id"), Some(&Cell::I64(20)));
        assert_eq!(records[0].record.get(STATUS_FIELD), Some(&Cell::Bool(true)));
        assert_eq!(
            records[2].origin.as_ref().map(ToString::to_string),
            Some("records/1@7".to_string())
        );
    }

    #[test]
    fn non_boolean_status_is_malformed() {
        let record = Record::new().with("id", 1).with(STATUS_FIELD, "yes");

        let err = StatusRecord::from_record(record).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn null_status_is_inactive() {
        let record = Record::new().with("id", 1).with(STATUS_FIELD, None::<bool>);

        assert!(!StatusRecord::from_record(record).unwrap().active);
    }

    #[test]
    fn malformed_envelope_is_a_deserialization_error() {
        let err = parse_event_batch(br#"[{"payload": {"topic": "records"}}]"#).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }

    #[test]
    fn nested_field_values_are_rejected() {
        let batch = r#"[{"payload": {
            "topic": "records", "partition": 0, "offset": 1,
            "value": {"data": {"id": 1, "status": true, "tags": ["a", "b"]}},
            "timestamp": "2024-05-01T10:00:00Z"
        }}]"#;

        let err = parse_event_batch(batch.as_bytes()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    fn single_event(headers: &str, timestamp: &str) -> String {
        format!(
            r#"[{{"payload": {{
                "topic": "records", "partition": 3, "offset": 9, "key": null,
                "value": {{"data": {{"id": 30, "status": true}}}},
                "headers": {headers},
                "timestamp": {timestamp}
            }}}}]"#
        )
    }

    #[test]
    fn epoch_millis_timestamp_is_accepted() {
        let batch = single_event("{}", "1545084650987");

        let records = parse_event_batch(batch.as_bytes()).unwrap();

        assert_eq!(records.len(), 1);
        assert!(records[0].active);
        assert_eq!(records[0].record.get("id"), Some(&Cell::I64(30)));
    }

    #[test]
    fn list_shaped_headers_are_accepted() {
        let batch = single_event(r#"[{"h": [104, 105]}]"#, r#""2024-05-01T10:00:00Z""#);

        let records = parse_event_batch(batch.as_bytes()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].origin.as_ref().map(ToString::to_string),
            Some("records/3@9".to_string())
        );
    }

    #[test]
    fn missing_headers_and_timestamp_are_accepted() {
        let batch = r#"[{"payload": {
            "topic": "records", "partition": 0, "offset": 1,
            "value": {"data": {"id": 1, "status": true}}
        }}]"#;

        let records = parse_event_batch(batch.as_bytes()).unwrap();

        assert!(records[0].active);
    }
}
