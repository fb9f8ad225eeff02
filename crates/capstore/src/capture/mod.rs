//! Capture: one recording session and its samples.

pub mod document;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::description::CaptureDescription;
use crate::error::CaptureError;
use crate::store::CaptureStore;
use document::{Header, SampleElement, SensorEntry};

/// One reading of every sensor at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    index: usize,
    timestamp: DateTime<Utc>,
    values: BTreeMap<String, String>,
}

impl Sample {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Sensor name to raw reading.
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

#[derive(Debug, Clone)]
pub struct Capture {
    id: Uuid,
    frequency: f64,
    created_time: DateTime<Utc>,
    sensor_types: BTreeMap<String, Uuid>,
    samples: Vec<Sample>,
    finalized: bool,
}

impl Capture {
    /// Start a new capture with a fresh id.
    pub fn new(frequency: f64, sensor_types: BTreeMap<String, Uuid>) -> Result<Self, CaptureError> {
        Self::with_id(Uuid::new_v4(), frequency, Utc::now(), sensor_types)
    }

    pub fn with_id(
        id: Uuid,
        frequency: f64,
        created_time: DateTime<Utc>,
        sensor_types: BTreeMap<String, Uuid>,
    ) -> Result<Self, CaptureError> {
        if interval_nanos(frequency).is_none() {
            return Err(CaptureError::InvalidFrequency(frequency));
        }
        Ok(Self {
            id,
            frequency,
            created_time,
            sensor_types,
            samples: Vec::new(),
            finalized: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn created_time(&self) -> DateTime<Utc> {
        self.created_time
    }

    pub fn sensor_names(&self) -> BTreeSet<&str> {
        self.sensor_types.keys().map(String::as_str).collect()
    }

    pub fn sensor_types(&self) -> &BTreeMap<String, Uuid> {
        &self.sensor_types
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Time between consecutive samples, truncated to whole nanoseconds.
    pub fn sample_interval(&self) -> Duration {
        // Frequency was checked in with_id
        Duration::nanoseconds(interval_nanos(self.frequency).unwrap_or(i64::MAX))
    }

    /// Scheduled time of the sample at `index`: `created_time + index * interval`.
    pub fn slot_time(&self, index: usize) -> Result<DateTime<Utc>, CaptureError> {
        self.sample_interval()
            .num_nanoseconds()
            .and_then(|nanos| i64::try_from(index).ok().and_then(|i| nanos.checked_mul(i)))
            .and_then(|offset| {
                self.created_time
                    .checked_add_signed(Duration::nanoseconds(offset))
            })
            .ok_or(CaptureError::TimestampOutOfRange { id: self.id, index })
    }

    /// Append a sample stamped with the current time.
    pub fn add_sample(&mut self, values: HashMap<String, String>) -> Result<&Sample, CaptureError> {
        self.add_sample_at(values, Utc::now())
    }

    /// Append a sample with an explicit timestamp.
    pub fn add_sample_at(
        &mut self,
        values: HashMap<String, String>,
        timestamp: DateTime<Utc>,
    ) -> Result<&Sample, CaptureError> {
        if self.finalized {
            return Err(CaptureError::Finalized(self.id));
        }
        let index = self.samples.len();
        self.samples.push(Sample {
            index,
            timestamp,
            values: values.into_iter().collect(),
        });
        Ok(&self.samples[index])
    }

    /// Serialize to the capture document format.
    pub fn to_document(&self) -> Result<String, CaptureError> {
        let header = Header {
            frequency: self.frequency,
            created_time: self.created_time,
            sensors: self
                .sensor_types
                .iter()
                .map(|(name, type_id)| SensorEntry {
                    name: name.clone(),
                    type_id: *type_id,
                })
                .collect(),
        };

        let last = self.samples.len().checked_sub(1);
        let elements: Vec<SampleElement> = self
            .samples
            .iter()
            .map(|sample| SampleElement {
                values: sample.values.clone(),
                time: (Some(sample.index) == last).then_some(sample.timestamp),
            })
            .collect();

        document::write_document(&header, &elements)
    }

    /// Rebuild a capture stored under `id` from its document.
    pub fn from_document(id: Uuid, text: &str) -> Result<Self, CaptureError> {
        let (header, reader) = document::read_document(text)?;
        let sensor_types = header
            .sensors
            .into_iter()
            .map(|s| (s.name, s.type_id))
            .collect();

        let mut capture = Self::with_id(id, header.frequency, header.created_time, sensor_types)?;
        for element in reader {
            let element = element?;
            let index = capture.samples.len();
            let timestamp = match element.time {
                Some(time) => time,
                None => capture.slot_time(index)?,
            };
            capture.samples.push(Sample {
                index,
                timestamp,
                values: element.values,
            });
        }
        capture.finalized = true;
        Ok(capture)
    }

    /// Finalize, write the document under the capture id, then index it.
    ///
    /// The blob and index writes are separate; if the second fails the blob is
    /// stored but unlisted until re-indexed.
    pub fn save<S: CaptureStore + ?Sized>(&mut self, store: &S) -> Result<(), CaptureError> {
        self.finalized = true;
        let document = self.to_document()?;

        store.write(&self.id, &document)?;
        debug!("wrote capture {} ({} bytes)", self.id, document.len());

        store.add_capture_description(&self.description())?;
        info!("saved capture {} with {} samples", self.id, self.samples.len());
        Ok(())
    }

    /// Read a stored capture.
    pub fn load<S: CaptureStore + ?Sized>(store: &S, id: Uuid) -> Result<Self, CaptureError> {
        let text = store.read(&id)?.ok_or(CaptureError::NotFound(id))?;
        Self::from_document(id, &text)
    }

    pub fn description(&self) -> CaptureDescription {
        CaptureDescription::new(self.id, self.created_time, self.frequency)
    }
}

/// Whole nanoseconds between samples, if `frequency` yields at least one
/// nanosecond and fits in an `i64`.
fn interval_nanos(frequency: f64) -> Option<i64> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return None;
    }
    let nanos = 1e9 / frequency;
    (nanos >= 1.0 && nanos < i64::MAX as f64).then_some(nanos as i64)
}
