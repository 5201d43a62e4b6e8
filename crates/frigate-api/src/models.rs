//! Response models for the Frigate HTTP API.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Binary media downloaded from Frigate (snapshot, latest frame or clip).
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Raw file contents.
    pub data: Bytes,
    /// Suggested filename for uploads.
    pub filename: String,
    /// `Content-Type` reported by Frigate (may be empty).
    pub content_type: String,
}

impl MediaFile {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of a liveness probe against the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthProbe {
    pub ok: bool,
    pub message: String,
}

/// Query options for `/api/<camera>/latest.jpg`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatestFrameOptions {
    /// Draw bounding boxes.
    pub bbox: Option<bool>,
    /// Draw the timestamp overlay.
    pub timestamp: Option<bool>,
    /// Output height in pixels.
    pub height: Option<u32>,
}

impl LatestFrameOptions {
    /// Bounding boxes and timestamp enabled, as shown to operators.
    pub fn annotated() -> Self {
        Self {
            bbox: Some(true),
            timestamp: Some(true),
            height: None,
        }
    }
}

/// Condensed view of the most recent review item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub id: String,
    pub camera: String,
    pub start_time: Option<f64>,
    pub severity: Option<String>,
    /// Event ids attached to the review, oldest first.
    pub detections: Vec<String>,
}

impl ReviewSummary {
    /// The most recent detection event id, if any.
    pub fn latest_detection(&self) -> Option<&str> {
        self.detections.last().map(String::as_str)
    }
}

/// Raw review item as returned by `/api/review`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReviewItem {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub camera: Option<String>,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub data: Option<ReviewData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ReviewData {
    #[serde(default)]
    pub detections: Vec<String>,
}

impl ReviewItem {
    pub(crate) fn sort_time(&self) -> f64 {
        self.start_time.or(self.start).unwrap_or(0.0)
    }

    pub(crate) fn id_string(&self) -> String {
        match &self.id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    pub(crate) fn into_summary(self) -> ReviewSummary {
        let id = self.id_string();
        ReviewSummary {
            id,
            camera: self.camera.unwrap_or_default(),
            start_time: self.start_time.or(self.start),
            severity: self.severity,
            detections: self.data.map(|d| d.detections).unwrap_or_default(),
        }
    }
}
