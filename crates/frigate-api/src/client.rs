//! HTTP client for the Frigate NVR API.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{ApiError, Result};
use crate::models::{HealthProbe, LatestFrameOptions, MediaFile, ReviewItem, ReviewSummary};

/// Timeout for the small JSON endpoints (`/api/stats`, `/api/review`).
const JSON_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for binary downloads.
pub const DEFAULT_MEDIA_TIMEOUT: Duration = Duration::from_secs(10);

/// Install the aws-lc-rs rustls provider once per process.
///
/// reqwest is built without a default provider, so this must run before any
/// `reqwest::Client` is constructed.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Normalize a configured base URL.
///
/// Trailing slashes are trimmed and `http://` is prepended when no scheme is given.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ApiError::InvalidBaseUrl(raw.to_string()));
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(trimmed.to_string())
    } else if trimmed.contains("://") {
        Err(ApiError::InvalidBaseUrl(raw.to_string()))
    } else {
        Ok(format!("http://{trimmed}"))
    }
}

fn image_extension(content_type: &str) -> &'static str {
    if content_type.contains("webp") {
        "webp"
    } else {
        "jpg"
    }
}

/// Client for the subset of the Frigate API used for notifications.
#[derive(Debug, Clone)]
pub struct FrigateClient {
    base_url: String,
    client: Client,
}

impl FrigateClient {
    /// Create a client with its own connection pool and request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        install_rustls_provider();
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, client)
    }

    /// Create a client reusing an existing `reqwest::Client`.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn latest_frame_url(&self, camera: &str, opts: &LatestFrameOptions) -> String {
        let mut params = Vec::new();
        if let Some(bbox) = opts.bbox {
            params.push(format!("bbox={}", u8::from(bbox)));
        }
        if let Some(timestamp) = opts.timestamp {
            params.push(format!("timestamp={}", u8::from(timestamp)));
        }
        if let Some(h) = opts.height {
            params.push(format!("h={h}"));
        }

        let path = format!(
            "{}/api/{}/latest.jpg",
            self.base_url,
            urlencoding::encode(camera)
        );
        if params.is_empty() {
            path
        } else {
            format!("{}?{}", path, params.join("&"))
        }
    }

    pub fn event_snapshot_url(&self, event_id: &str) -> String {
        format!(
            "{}/api/events/{}/snapshot.jpg?bbox=1&timestamp=1",
            self.base_url,
            urlencoding::encode(event_id)
        )
    }

    pub fn event_clip_url(&self, event_id: &str) -> String {
        format!(
            "{}/api/events/{}/clip.mp4",
            self.base_url,
            urlencoding::encode(event_id)
        )
    }

    fn stats_url(&self) -> String {
        format!("{}/api/stats", self.base_url)
    }

    fn review_url(&self) -> String {
        format!("{}/api/review", self.base_url)
    }

    async fn get_checked(&self, url: &str, timeout: Option<Duration>) -> Result<Response> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.get_checked(url, Some(JSON_TIMEOUT)).await?;
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_binary(&self, url: &str) -> Result<(bytes::Bytes, String)> {
        trace!(url = %url, "Fetching binary");
        let response = self.get_checked(url, None).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let data = response.bytes().await?;
        if data.is_empty() {
            return Err(ApiError::EmptyBody(url.to_string()));
        }
        Ok((data, content_type))
    }

    /// Names of all cameras known to Frigate, sorted.
    pub async fn camera_names(&self) -> Result<Vec<String>> {
        let stats = self.get_json(&self.stats_url()).await?;
        Ok(camera_names_from_stats(&stats))
    }

    /// Liveness probe. Never fails; errors are reported in the result.
    pub async fn check_health(&self) -> HealthProbe {
        match self.get_checked(&self.stats_url(), Some(JSON_TIMEOUT)).await {
            Ok(_) => HealthProbe {
                ok: true,
                message: "Frigate HTTP API reachable".to_string(),
            },
            Err(e) => HealthProbe {
                ok: false,
                message: format!("Frigate HTTP API request failed: {e}"),
            },
        }
    }

    /// Current frame of a camera.
    pub async fn latest_frame(
        &self,
        camera: &str,
        opts: &LatestFrameOptions,
    ) -> Result<MediaFile> {
        let (data, content_type) = self.fetch_binary(&self.latest_frame_url(camera, opts)).await?;
        let filename = format!("{}-latest.{}", camera, image_extension(&content_type));
        Ok(MediaFile {
            data,
            filename,
            content_type,
        })
    }

    /// Snapshot image of an event, with bounding box and timestamp drawn.
    pub async fn event_snapshot(&self, event_id: &str) -> Result<MediaFile> {
        let (data, content_type) = self.fetch_binary(&self.event_snapshot_url(event_id)).await?;
        let filename = format!("{}-snapshot.{}", event_id, image_extension(&content_type));
        Ok(MediaFile {
            data,
            filename,
            content_type,
        })
    }

    /// Recorded clip of an event.
    pub async fn event_clip(&self, event_id: &str) -> Result<MediaFile> {
        let (data, content_type) = self.fetch_binary(&self.event_clip_url(event_id)).await?;
        Ok(MediaFile {
            data,
            filename: format!("{event_id}-clip.mp4"),
            content_type,
        })
    }

    /// Most recent review item, optionally restricted to one camera.
    pub async fn latest_review(&self, camera: Option<&str>) -> Result<Option<ReviewSummary>> {
        let body = self.get_json(&self.review_url()).await?;
        let summary = latest_review_from_body(body, camera)?;
        if let Some(review) = &summary {
            debug!(review_id = %review.id, camera = %review.camera, "Found latest review");
        }
        Ok(summary)
    }
}

fn camera_names_from_stats(stats: &Value) -> Vec<String> {
    let cameras = stats
        .get("cameras")
        .and_then(Value::as_object)
        .or_else(|| stats.get("camera_stats").and_then(Value::as_object));

    let mut names: Vec<String> = cameras
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();
    names.sort();
    names
}

fn latest_review_from_body(body: Value, camera: Option<&str>) -> Result<Option<ReviewSummary>> {
    let list = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };

    let mut items = list
        .into_iter()
        .map(serde_json::from_value::<ReviewItem>)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if let Some(camera) = camera {
        items.retain(|item| item.camera.as_deref() == Some(camera));
    }

    let latest = items.into_iter().max_by(|a, b| {
        a.sort_time()
            .total_cmp(&b.sort_time())
            .then_with(|| a.id_string().cmp(&b.id_string()))
    });

    Ok(latest.map(ReviewItem::into_summary))
}
