//! # Location record from the REST polling fallback.
//!
//! `GET /locations?technician=<id>` returns a record shaped like
//! `{"latitude": .., "longitude": .., "timestamp": ..}`. Backends serialize
//! decimal columns either as JSON numbers or as numeric strings, so both are
//! accepted. The HTTP call itself belongs to the caller; this type only turns
//! the body into a validated [`Position`] for [`estimate`](crate::eta::estimate).

use std::time::SystemTime;

use serde::{Deserialize, Deserializer};

use crate::error::MessageError;
use crate::geo::Position;
use crate::geo::system_time_from_millis;

/// A single position-shaped record from the REST fallback.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationRecord {
    /// Latitude in degrees.
    #[serde(deserialize_with = "number_or_string")]
    pub latitude: f64,
    /// Longitude in degrees.
    #[serde(deserialize_with = "number_or_string")]
    pub longitude: f64,
    /// Capture time in epoch milliseconds, when the backend provides one.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl LocationRecord {
    /// Parses a record from a JSON body.
    pub fn from_json(body: &str) -> Result<Self, MessageError> {
        serde_json::from_str(body).map_err(|e| MessageError::Malformed {
            reason: e.to_string(),
        })
    }

    /// Validates the record into a [`Position`].
    ///
    /// Without a backend timestamp the position is stamped with the local time.
    pub fn to_position(&self) -> Result<Position, MessageError> {
        let at = self
            .timestamp
            .map(system_time_from_millis)
            .unwrap_or_else(SystemTime::now);
        Ok(Position::new(self.latitude, self.longitude, at)?)
    }
}

fn number_or_string<'de, D>(de: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }

    match Raw::deserialize(de)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}
