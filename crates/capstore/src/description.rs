//! Index metadata for stored captures.
//!
//! A description is kept apart from the capture blob so a sync process can
//! list captures (and when/how fast they were recorded) without reading
//! whole documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureDescription {
    /// Key under which the capture blob is stored.
    pub location: Uuid,

    /// When recording started.
    pub created_time: DateTime<Utc>,

    /// Sampling frequency in Hz.
    pub frequency: f64,
}

impl CaptureDescription {
    pub fn new(location: Uuid, created_time: DateTime<Utc>, frequency: f64) -> Self {
        Self {
            location,
            created_time,
            frequency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_description_serde() {
        let desc = CaptureDescription::new(
            Uuid::new_v4(),
            Utc.with_ymd_and_hms(2017, 6, 1, 12, 0, 0).unwrap(),
            29.97,
        );

        let json = serde_json::to_string(&desc).unwrap();
        assert!(json.contains("\"created_time\":\"2017-06-01T12:00:00Z\""));

        let restored: CaptureDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(desc, restored);
    }
}
