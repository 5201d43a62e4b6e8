//! The event relay pipeline.
//!
//! Every inbound event runs through a chain of gates, each of which may end
//! processing:
//!
//! 1. filter (label, zone, lifecycle)
//! 2. mute window
//! 3. dedup check-and-mark, before any I/O so a slow or failing send never
//!    produces a second notification for the same id
//! 4. text formatting
//! 5. snapshot enrichment, best effort
//! 6. dispatch, with the on-demand clip button attached
//!
//! Enrichment and dispatch are each bounded by a timeout. A failed or timed
//! out snapshot only drops the photo; a failed dispatch is logged and the
//! event stays spent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use frigate_api::{FrigateClient, MediaFile};
use tracing::{debug, info, warn};

use crate::bus::EventHandler;
use crate::event::{FilterConfig, FilterDecision, RawEvent, RejectReason, decide, format_notification};
use crate::notification::{Dispatcher, InlineButton, ReplyMarkup};
use crate::state::{DedupGate, MuteGate};
use crate::{Error, Result};

/// Callback prefix of the "send the clip of this event" button.
pub const EVENT_CLIP_CALLBACK_PREFIX: &str = "event_clip:";

/// Callback data of the "open the menu" button.
pub const SEND_MENU_CALLBACK: &str = "send_menu";

const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(8);

/// Media lookups used to enrich notifications.
#[async_trait]
pub trait EnrichmentFetcher: Send + Sync {
    /// Still image of the event.
    async fn snapshot(&self, event_id: &str) -> Result<MediaFile>;

    /// Short video clip of the event.
    async fn clip(&self, event_id: &str) -> Result<MediaFile>;
}

#[async_trait]
impl EnrichmentFetcher for FrigateClient {
    async fn snapshot(&self, event_id: &str) -> Result<MediaFile> {
        Ok(self.event_snapshot(event_id).await?)
    }

    async fn clip(&self, event_id: &str) -> Result<MediaFile> {
        Ok(self.event_clip(event_id).await?)
    }
}

/// How the pipeline finished with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Rejected by the filter.
    Filtered(RejectReason),
    /// Dropped while muted. Not recorded as notified.
    Muted,
    /// Already notified for this id.
    Duplicate,
    /// Sent, with or without the snapshot.
    Delivered { with_photo: bool },
    /// Send failed or timed out. The id stays recorded.
    DispatchFailed,
}

impl RelayOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Inline keyboard attached to every event notification.
pub fn event_markup(event_id: &str) -> ReplyMarkup {
    ReplyMarkup::inline(vec![vec![
        InlineButton::callback(
            "▶️ Видео события",
            format!("{EVENT_CLIP_CALLBACK_PREFIX}{event_id}"),
        ),
        InlineButton::callback("Меню", SEND_MENU_CALLBACK),
    ]])
}

/// Filter → mute → dedup → format → enrich → dispatch.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct RelayPipeline {
    filters: Arc<FilterConfig>,
    mute: Arc<dyn MuteGate>,
    dedup: Arc<dyn DedupGate>,
    enricher: Arc<dyn EnrichmentFetcher>,
    dispatcher: Arc<dyn Dispatcher>,
    enrichment_timeout: Duration,
    dispatch_timeout: Duration,
}

impl RelayPipeline {
    pub fn new(
        filters: FilterConfig,
        mute: Arc<dyn MuteGate>,
        dedup: Arc<dyn DedupGate>,
        enricher: Arc<dyn EnrichmentFetcher>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            filters: Arc::new(filters),
            mute,
            dedup,
            enricher,
            dispatcher,
            enrichment_timeout: DEFAULT_STEP_TIMEOUT,
            dispatch_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    /// Override the per-step timeouts.
    pub fn with_timeouts(mut self, enrichment: Duration, dispatch: Duration) -> Self {
        self.enrichment_timeout = enrichment;
        self.dispatch_timeout = dispatch;
        self
    }

    pub fn filters(&self) -> &FilterConfig {
        &self.filters
    }

    /// Process one inbound event.
    pub async fn handle(&self, event: &RawEvent) -> RelayOutcome {
        let payload = event.payload();
        debug!(
            kind = ?payload.kind,
            event_id = ?payload.id,
            label = ?payload.label,
            camera = ?payload.camera,
            zones = ?payload.zones,
            "Event received"
        );

        let decision = decide(event, &self.filters);
        let event_id = match (decision, payload.id) {
            (FilterDecision::Reject(reason), id) => {
                debug!(event_id = ?id, reason = %reason, "Skip: filtered");
                return RelayOutcome::Filtered(reason);
            }
            (FilterDecision::Notify, Some(id)) => id,
            (FilterDecision::Notify, None) => {
                return RelayOutcome::Filtered(RejectReason::NoPayload);
            }
        };

        if self.mute.is_muted() {
            info!(event_id = %event_id, "Skip: notifications muted");
            return RelayOutcome::Muted;
        }

        if !self.dedup.claim(&event_id) {
            debug!(event_id = %event_id, "Skip: already notified");
            return RelayOutcome::Duplicate;
        }

        let text = format_notification(event);
        let photo = self.fetch_snapshot(&event_id).await;
        let with_photo = photo.is_some();
        let markup = event_markup(&event_id);

        info!(event_id = %event_id, with_photo, "Sending notification");
        let send = async {
            match photo {
                Some(photo) => {
                    self.dispatcher
                        .send_photo(photo, &text, Some(&markup))
                        .await
                }
                None => self.dispatcher.send_text(&text, Some(&markup)).await,
            }
        };

        match with_timeout("dispatch", self.dispatch_timeout, send).await {
            Ok(()) => RelayOutcome::Delivered { with_photo },
            Err(e) => {
                warn!(event_id = %event_id, error = %e, "Failed to send notification");
                RelayOutcome::DispatchFailed
            }
        }
    }

    async fn fetch_snapshot(&self, event_id: &str) -> Option<MediaFile> {
        let fetch = self.enricher.snapshot(event_id);
        match with_timeout("snapshot fetch", self.enrichment_timeout, fetch).await {
            Ok(photo) => Some(photo),
            Err(e) => {
                warn!(event_id = %event_id, error = %e, "Failed to fetch snapshot image");
                None
            }
        }
    }
}

#[async_trait]
impl EventHandler for RelayPipeline {
    async fn handle_event(&self, event: RawEvent) {
        let outcome = self.handle(&event).await;
        debug!(outcome = ?outcome, "Event handled");
    }
}

/// Run `fut`, turning an elapsed `limit` into [`Error::Timeout`].
pub async fn with_timeout<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation,
            secs: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DedupStore, MuteTracker};
    use bytes::Bytes;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: Mutex<Vec<(String, bool, Option<ReplyMarkup>)>>,
        fail: bool,
    }

    #[async_trait]
    impl Dispatcher for RecordingDispatcher {
        async fn send_text(&self, text: &str, markup: Option<&ReplyMarkup>) -> Result<()> {
            if self.fail {
                return Err(Error::telegram("sendMessage", "Bad Request: chat not found"));
            }
            self.sent
                .lock()
                .push((text.to_string(), false, markup.cloned()));
            Ok(())
        }

        async fn send_photo(
            &self,
            _photo: MediaFile,
            caption: &str,
            markup: Option<&ReplyMarkup>,
        ) -> Result<()> {
            if self.fail {
                return Err(Error::telegram("sendPhoto", "Bad Request"));
            }
            self.sent
                .lock()
                .push((caption.to_string(), true, markup.cloned()));
            Ok(())
        }

        async fn send_video(
            &self,
            _video: MediaFile,
            _caption: &str,
            _markup: Option<&ReplyMarkup>,
        ) -> Result<()> {
            Ok(())
        }
    }

    enum Snapshot {
        Ok,
        Fail,
        Hang,
    }

    struct FakeEnricher(Snapshot);

    #[async_trait]
    impl EnrichmentFetcher for FakeEnricher {
        async fn snapshot(&self, event_id: &str) -> Result<MediaFile> {
            match self.0 {
                Snapshot::Ok => Ok(MediaFile {
                    data: Bytes::from_static(b"jpeg"),
                    filename: format!("{event_id}-snapshot.jpg"),
                    content_type: "image/jpeg".into(),
                }),
                Snapshot::Fail => Err(Error::Other("connection refused".into())),
                Snapshot::Hang => {
                    std::future::pending::<()>().await;
                    Err(Error::Other("unreachable".into()))
                }
            }
        }

        async fn clip(&self, _event_id: &str) -> Result<MediaFile> {
            Err(Error::Other("not used".into()))
        }
    }

    fn pipeline(
        snapshot: Snapshot,
        dispatcher: Arc<RecordingDispatcher>,
    ) -> (RelayPipeline, Arc<MuteTracker>, Arc<DedupStore>) {
        let mute = Arc::new(MuteTracker::new());
        let dedup = Arc::new(DedupStore::new());
        let pipeline = RelayPipeline::new(
            FilterConfig::default(),
            mute.clone(),
            dedup.clone(),
            Arc::new(FakeEnricher(snapshot)),
            dispatcher,
        )
        .with_timeouts(Duration::from_secs(8), Duration::from_secs(8));
        (pipeline, mute, dedup)
    }

    fn person_event(id: &str) -> RawEvent {
        RawEvent::from_slice(
            format!(
                r#"{{"type": "new", "after": {{"id": "{id}", "camera": "yard",
                    "label": "person", "current_zones": ["Zone"]}}}}"#
            )
            .as_bytes(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_delivers_with_photo_and_buttons() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (pipeline, _, dedup) = pipeline(Snapshot::Ok, dispatcher.clone());

        let outcome = pipeline.handle(&person_event("e1")).await;

        assert_eq!(outcome, RelayOutcome::Delivered { with_photo: true });
        assert!(dedup.was_notified("e1"));
        let sent = dispatcher.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.contains("Человек"));
        assert_eq!(sent[0].2, Some(event_markup("e1")));
    }

    #[tokio::test]
    async fn test_snapshot_failure_falls_back_to_text() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (pipeline, _, _) = pipeline(Snapshot::Fail, dispatcher.clone());

        let outcome = pipeline.handle(&person_event("e1")).await;

        assert_eq!(outcome, RelayOutcome::Delivered { with_photo: false });
        assert!(!dispatcher.sent.lock()[0].1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_timeout_falls_back_to_text() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (pipeline, _, _) = pipeline(Snapshot::Hang, dispatcher.clone());

        let outcome = pipeline.handle(&person_event("e1")).await;

        assert_eq!(outcome, RelayOutcome::Delivered { with_photo: false });
        assert_eq!(dispatcher.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_failure_keeps_event_spent() {
        let dispatcher = Arc::new(RecordingDispatcher {
            fail: true,
            ..Default::default()
        });
        let (pipeline, _, dedup) = pipeline(Snapshot::Ok, dispatcher);

        assert_eq!(
            pipeline.handle(&person_event("e1")).await,
            RelayOutcome::DispatchFailed
        );
        assert!(dedup.was_notified("e1"));
        assert_eq!(
            pipeline.handle(&person_event("e1")).await,
            RelayOutcome::Duplicate
        );
    }

    #[tokio::test]
    async fn test_update_after_dispatch_is_dropped() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (pipeline, _, _) = pipeline(Snapshot::Fail, dispatcher.clone());

        pipeline.handle(&person_event("e1")).await;
        let update = RawEvent::from_slice(
            br#"{"type": "update", "after": {"id": "e1", "camera": "yard",
                "label": "car", "current_zones": ["Zone"]}}"#,
        )
        .unwrap();

        assert_eq!(pipeline.handle(&update).await, RelayOutcome::Duplicate);
        assert_eq!(dispatcher.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_muted_event_not_recorded() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (pipeline, mute, dedup) = pipeline(Snapshot::Ok, dispatcher.clone());

        mute.mute(30.0);
        assert_eq!(pipeline.handle(&person_event("e1")).await, RelayOutcome::Muted);
        assert!(!dedup.was_notified("e1"));

        mute.unmute();
        assert!(pipeline.handle(&person_event("e1")).await.is_delivered());
    }

    #[tokio::test]
    async fn test_filtered_reason_reported() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (pipeline, _, dedup) = pipeline(Snapshot::Ok, dispatcher.clone());

        let end = RawEvent::from_slice(
            br#"{"type": "end", "after": {"id": "e2", "label": "person", "current_zones": ["Zone"]}}"#,
        )
        .unwrap();

        assert_eq!(
            pipeline.handle(&end).await,
            RelayOutcome::Filtered(RejectReason::EventEnded)
        );
        assert!(dedup.is_empty());
        assert!(dispatcher.sent.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout() {
        let slow = with_timeout("probe", Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            slow,
            Err(Error::Timeout {
                operation: "probe",
                secs: 2
            })
        ));

        let fast = with_timeout("probe", Duration::from_secs(2), async { Ok(1) }).await;
        assert_eq!(fast.unwrap(), 1);
    }
}
