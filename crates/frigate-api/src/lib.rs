//! Client for the Frigate NVR HTTP API.
//!
//! Covers what a notification relay needs: camera listing, a liveness probe,
//! the latest frame of a camera, event snapshots and clips, and the most
//! recent review item.
//!
//! ```ignore
//! use frigate_api::{FrigateClient, DEFAULT_MEDIA_TIMEOUT};
//!
//! let client = FrigateClient::new("http://nvr.local:5000", DEFAULT_MEDIA_TIMEOUT)?;
//! let snapshot = client.event_snapshot("1718.5-abc").await?;
//! ```

pub mod client;
pub mod error;
pub mod models;

pub use client::{DEFAULT_MEDIA_TIMEOUT, FrigateClient, install_rustls_provider, normalize_base_url};
pub use error::{ApiError, Result};
pub use models::{HealthProbe, LatestFrameOptions, MediaFile, ReviewSummary};
