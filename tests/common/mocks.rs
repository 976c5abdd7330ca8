use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::channel::mpsc as feed;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thelden::downloads::{FetchResponse, MediaFetcher};
use thelden::player::{FullscreenHost, MediaElement, MediaEvent};
use thelden::utils::DownloadError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Fetcher whose response bodies are fed chunk by chunk from the test
#[derive(Default)]
pub struct FeedFetcher {
    bodies: Mutex<HashMap<String, (Option<u64>, feed::UnboundedReceiver<Result<Bytes>>)>>,
    requests: Mutex<Vec<String>>,
}

/// Sending side of a fed response body. Dropping it ends the body.
pub struct BodyFeed {
    sender: feed::UnboundedSender<Result<Bytes>>,
}

impl BodyFeed {
    pub fn send(&self, chunk: &[u8]) {
        let _ = self.sender.unbounded_send(Ok(Bytes::copy_from_slice(chunk)));
    }

    pub fn fail(&self, message: &str) {
        let _ = self.sender.unbounded_send(Err(anyhow!(message.to_string())));
    }

    pub fn finish(self) {}
}

impl FeedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `url` with a body fed through the returned handle
    pub fn open(&self, url: &str, content_length: Option<u64>) -> BodyFeed {
        let (sender, receiver) = feed::unbounded();
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), (content_length, receiver));
        BodyFeed { sender }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for FeedFetcher {
    async fn fetch(
        &self,
        url: &str,
        _cancel: &CancellationToken,
    ) -> Result<FetchResponse, DownloadError> {
        self.requests.lock().unwrap().push(url.to_string());
        match self.bodies.lock().unwrap().remove(url) {
            Some((content_length, body)) => Ok(FetchResponse::new(
                content_length,
                Some("video/mp4".to_string()),
                body.boxed(),
            )),
            None => Err(DownloadError::HttpStatus(404, "Not Found".to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementCall {
    Load(String, Option<String>),
    Play,
    Pause,
    Seek(Duration),
    Volume(f64),
    Muted(bool),
    SubtitlesVisible(bool),
    Unload,
}

/// Media element that behaves like a browser video element: every load
/// reports metadata and then data for a clip of fixed length.
pub struct FakeElement {
    calls: Mutex<Vec<ElementCall>>,
    events: mpsc::UnboundedSender<MediaEvent>,
    duration: Duration,
    text_tracks: usize,
}

impl FakeElement {
    pub fn new(duration: Duration) -> (Self, mpsc::UnboundedReceiver<MediaEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let element = Self {
            calls: Mutex::new(Vec::new()),
            events,
            duration,
            text_tracks: 0,
        };
        (element, receiver)
    }

    pub fn with_text_tracks(mut self, count: usize) -> Self {
        self.text_tracks = count;
        self
    }

    /// Report an event as if the element produced it
    pub fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event);
    }

    pub fn calls(&self) -> Vec<ElementCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: ElementCall) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl MediaElement for FakeElement {
    async fn load(&self, url: &str, subtitles: Option<&str>) -> Result<()> {
        self.record(ElementCall::Load(url.to_string(), subtitles.map(str::to_string)))?;
        self.emit(MediaEvent::MetadataLoaded {
            duration: self.duration,
        });
        self.emit(MediaEvent::DataLoaded);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record(ElementCall::Play)
    }

    async fn pause(&self) -> Result<()> {
        self.record(ElementCall::Pause)
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        self.record(ElementCall::Seek(position))
    }

    async fn set_volume(&self, volume: f64) -> Result<()> {
        self.record(ElementCall::Volume(volume))
    }

    async fn set_muted(&self, muted: bool) -> Result<()> {
        self.record(ElementCall::Muted(muted))
    }

    async fn set_subtitles_visible(&self, visible: bool) -> Result<()> {
        self.record(ElementCall::SubtitlesVisible(visible))
    }

    async fn text_track_count(&self) -> usize {
        self.text_tracks
    }

    async fn unload(&self) -> Result<()> {
        self.record(ElementCall::Unload)
    }
}

#[derive(Default)]
pub struct FakeFullscreen {
    active: AtomicBool,
}

impl FakeFullscreen {
    /// Change the host state without going through the player
    pub fn set_external(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

#[async_trait]
impl FullscreenHost for FakeFullscreen {
    async fn is_fullscreen(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn request_fullscreen(&self) -> Result<()> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn exit_fullscreen(&self) -> Result<()> {
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}
