// Wire (JSON) representation of records
//
// 64-bit integers travel as decimal strings and timestamps as RFC 3339 so that
// JavaScript clients never lose precision. Payload structs use
// `#[serde(deny_unknown_fields)]` to surface client/schema drift early.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::MappingError;

/// Convert a record into its JSON wire form
pub fn record_to_wire<R: Serialize>(record: &R) -> Result<serde_json::Value, MappingError> {
    serde_json::to_value(record).map_err(|e| MappingError::Wire(e.to_string()))
}

/// Parse a JSON wire payload into a record (strict: unknown fields are rejected)
pub fn wire_to_record<R: DeserializeOwned>(payload: &serde_json::Value) -> Result<R, MappingError> {
    R::deserialize(payload).map_err(|e| MappingError::Wire(e.to_string()))
}

/// Storage format: fixed microsecond precision so lexical order is chronological
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc))
}

/// `i64` <-> canonical decimal string
pub mod int_string {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let value: i64 = raw.parse().map_err(D::Error::custom)?;
        // Reject "+1", "007" and friends: one value, one spelling
        if value.to_string() != raw {
            return Err(D::Error::custom(format!("non-canonical integer '{}'", raw)));
        }
        Ok(value)
    }
}

/// `Option<i64>` <-> optional canonical decimal string
pub mod opt_int_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super::int_string")] i64);

        Option::<Wrapped>::deserialize(deserializer).map(|w| w.map(|Wrapped(v)| v))
    }
}

/// `DateTime<Utc>` <-> RFC 3339 (lossless, sub-second digits as needed)
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields, rename_all = "camelCase")]
    struct Sample {
        #[serde(with = "int_string")]
        id: i64,
        #[serde(with = "opt_int_string", default)]
        parent_id: Option<i64>,
        #[serde(with = "timestamp")]
        created_at: DateTime<Utc>,
    }

    fn sample() -> Sample {
        Sample {
            id: i64::MAX,
            parent_id: Some(-3),
            created_at: Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
                + chrono::Duration::nanoseconds(123_456_789),
        }
    }

    #[test]
    fn test_wire_shape() {
        let value = record_to_wire(&sample()).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "9223372036854775807",
                "parentId": "-3",
                "createdAt": "2024-05-06T07:08:09.123456789Z"
            })
        );
    }

    #[test]
    fn test_wire_round_trip_preserves_precision() {
        let record = sample();
        let back: Sample = wire_to_record(&record_to_wire(&record).unwrap()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let payload = json!({
            "id": "1",
            "createdAt": "2024-05-06T07:08:09Z",
            "surprise": true
        });
        let err = wire_to_record::<Sample>(&payload).unwrap_err();
        assert!(matches!(err, MappingError::Wire(ref msg) if msg.contains("surprise")));
    }

    #[test]
    fn test_non_canonical_integer_rejected() {
        for raw in ["+1", "01", " 1", "1.0"] {
            let payload = json!({ "id": raw, "createdAt": "2024-05-06T07:08:09Z" });
            assert!(wire_to_record::<Sample>(&payload).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_numeric_json_integer_rejected() {
        let payload = json!({ "id": 1, "createdAt": "2024-05-06T07:08:09Z" });
        assert!(wire_to_record::<Sample>(&payload).is_err());
    }

    #[test]
    fn test_storage_timestamp_is_fixed_width() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-02T03:04:05.000000Z");
        assert_eq!(parse_timestamp("2024-01-02T03:04:05.000000Z").unwrap(), ts);
    }
}
