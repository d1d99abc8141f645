//! # Wire format.
//!
//! One JSON text frame per position, in either direction:
//!
//! ```text
//! { "type": "location_update", "latitude": 12.6392, "longitude": -8.0029, "captured_at": 1700000000000 }
//! ```
//!
//! `captured_at` (epoch milliseconds) is written by this crate and optional on
//! read. Extra fields are ignored. Unknown `type`, missing or non-numeric
//! coordinates, and out-of-range values are rejected by [`decode`].

use std::time::SystemTime;

use serde::Deserialize;
use serde_json::json;

use crate::error::MessageError;
use crate::geo::{Position, system_time_from_millis};

/// The only message type this crate produces and accepts.
pub const LOCATION_UPDATE: &str = "location_update";

/// A decoded inbound position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InboundUpdate {
    /// The validated position.
    pub position: Position,
    /// Whether `captured_at` came from the producer (otherwise it is the receipt time).
    pub producer_timestamp: bool,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    captured_at: Option<i64>,
}

/// Encodes a position as a `location_update` frame.
pub fn encode(position: &Position) -> String {
    json!({
        "type": LOCATION_UPDATE,
        "latitude": position.latitude(),
        "longitude": position.longitude(),
        "captured_at": position.captured_at_millis(),
    })
    .to_string()
}

/// Decodes an inbound frame.
///
/// Without a producer `captured_at` the position is stamped `received_at`.
pub fn decode(text: &str, received_at: SystemTime) -> Result<InboundUpdate, MessageError> {
    let env: Envelope = serde_json::from_str(text).map_err(|e| MessageError::Malformed {
        reason: e.to_string(),
    })?;

    if env.kind != LOCATION_UPDATE {
        return Err(MessageError::UnknownType { kind: env.kind });
    }
    let (Some(latitude), Some(longitude)) = (env.latitude, env.longitude) else {
        return Err(MessageError::Malformed {
            reason: "missing latitude or longitude".to_string(),
        });
    };

    let captured_at = env
        .captured_at
        .map(system_time_from_millis)
        .unwrap_or(received_at);
    let position = Position::new(latitude, longitude, captured_at)?;

    Ok(InboundUpdate {
        position,
        producer_timestamp: env.captured_at.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_frame_carries_type_and_coordinates() {
        let p = Position::new(12.6392, -8.0029, system_time_from_millis(1_000)).unwrap();
        let v: serde_json::Value = serde_json::from_str(&encode(&p)).unwrap();
        assert_eq!(v["type"], "location_update");
        assert_eq!(v["latitude"], 12.6392);
        assert_eq!(v["longitude"], -8.0029);
        assert_eq!(v["captured_at"], 1_000);
    }

    #[test]
    fn decodes_minimal_frame_with_receipt_time() {
        let now = system_time_from_millis(5_000);
        let up = decode(r#"{"type":"location_update","latitude":1.5,"longitude":2.5}"#, now).unwrap();
        assert_eq!(up.position.coords(), (1.5, 2.5));
        assert_eq!(up.position.captured_at(), now);
        assert!(!up.producer_timestamp);
    }

    #[test]
    fn ignores_extra_fields() {
        let up = decode(
            r#"{"type":"location_update","latitude":0,"longitude":0,"technician_id":9,"captured_at":42}"#,
            SystemTime::now(),
        )
        .unwrap();
        assert!(up.producer_timestamp);
        assert_eq!(up.position.captured_at_millis(), 42);
    }

    #[test]
    fn rejects_bad_frames() {
        let now = SystemTime::now();
        assert!(matches!(decode("not json", now), Err(MessageError::Malformed { .. })));
        assert!(matches!(
            decode(r#"{"type":"chat","latitude":0,"longitude":0}"#, now),
            Err(MessageError::UnknownType { .. })
        ));
        assert!(matches!(
            decode(r#"{"type":"location_update","latitude":1}"#, now),
            Err(MessageError::Malformed { .. })
        ));
        assert!(matches!(
            decode(r#"{"type":"location_update","latitude":"1","longitude":2}"#, now),
            Err(MessageError::Malformed { .. })
        ));
        assert!(matches!(
            decode(r#"{"type":"location_update","latitude":95,"longitude":2}"#, now),
            Err(MessageError::OutOfRange(_))
        ));
    }
}
