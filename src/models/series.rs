//! Volume series models

use chrono::{DateTime, TimeZone, Utc};

/// A single (timestamp, volume) observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub volume: f64,
}

/// Trading volume history as two index-aligned sequences.
///
/// `timestamps[i]` belongs to `volumes[i]`. Order is whatever the upstream
/// API returned, which is non-decreasing by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeSeries {
    timestamps: Vec<i64>,
    volumes: Vec<f64>,
}

impl VolumeSeries {
    /// Build a series from points, projecting each into the parallel sequences
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = SeriesPoint>,
    {
        let (timestamps, volumes) = points
            .into_iter()
            .map(|p| (p.timestamp, p.volume))
            .unzip();
        Self { timestamps, volumes }
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The most recent observation, if any
    pub fn latest(&self) -> Option<SeriesPoint> {
        let timestamp = *self.timestamps.last()?;
        let volume = *self.volumes.last()?;
        Some(SeriesPoint { timestamp, volume })
    }

    /// Timestamps converted to UTC datetimes for plotting.
    /// Values chrono cannot represent are skipped.
    pub fn datetimes(&self) -> Vec<DateTime<Utc>> {
        self.timestamps
            .iter()
            .filter_map(|&ms| Utc.timestamp_millis_opt(ms).single())
            .collect()
    }
}
