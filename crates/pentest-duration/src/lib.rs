//! Shared serde adapters for `std::time::Duration`.
//!
//! Every crate with a `timeouts`/`idle_timeout`/`max_duration`-shaped field
//! (§3's `constraints.timeouts`, §4.2's pool idle timeout) uses these so the
//! wire format is consistently "milliseconds as an integer" rather than each
//! crate inventing its own.
#![deny(unsafe_code)]

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Serde helpers for encoding `Duration` values as integer milliseconds.
pub mod duration_millis {
    use super::*;

    /// Serialize a duration as whole milliseconds (`u64`).
    pub fn serialize<S: Serializer>(val: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        val.as_millis().serialize(ser)
    }

    /// Deserialize a duration from whole milliseconds (`u64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let ms: u64 = u64::deserialize(de)?;
        Ok(Duration::from_millis(ms))
    }
}

/// Serde helpers for encoding `Option<Duration>` values as integer milliseconds.
pub mod option_duration_millis {
    use super::*;

    /// Serialize an optional duration as `Option<u64>`.
    pub fn serialize<S: Serializer>(val: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        match val {
            Some(d) => d.as_millis().serialize(ser),
            None => ser.serialize_none(),
        }
    }

    /// Deserialize an optional duration from `Option<u64>`.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Duration>, D::Error> {
        let opt: Option<u64> = Option::deserialize(de)?;
        Ok(opt.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct WithDuration {
        #[serde(with = "crate::duration_millis")]
        value: Duration,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct WithOptionDuration {
        #[serde(with = "crate::option_duration_millis")]
        value: Option<Duration>,
    }

    #[test]
    fn duration_roundtrip_uses_milliseconds() {
        let original = WithDuration {
            value: Duration::from_millis(1500),
        };
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, r#"{"value":1500}"#);
        let back: WithDuration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn option_duration_some_roundtrips() {
        let original = WithOptionDuration {
            value: Some(Duration::from_millis(250)),
        };
        let json = serde_json::to_string(&original).unwrap();
        let back: WithOptionDuration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn option_duration_none_roundtrips() {
        let original = WithOptionDuration { value: None };
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, r#"{"value":null}"#);
        let back: WithOptionDuration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
