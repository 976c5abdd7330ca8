#![cfg(test)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::downloads::{FetchResponse, MediaFetcher};
use crate::events::{DownloadEvent, EventSubscriber};
use crate::models::ItemId;
use crate::player::{FullscreenHost, MediaElement};
use crate::storage::{DownloadStore, MemoryDownloadStore, StoredDownload};
use crate::utils::DownloadError;

/// Calls recorded by [`MockElement`]
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

/// Media element that records every call
#[derive(Debug, Default)]
pub struct MockElement {
    calls: Mutex<Vec<ElementCall>>,
    text_tracks: usize,
}

impl MockElement {
    pub fn with_text_tracks(text_tracks: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            text_tracks,
        }
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
impl MediaElement for MockElement {
    async fn load(&self, url: &str, subtitles: Option<&str>) -> Result<()> {
        self.record(ElementCall::Load(
            url.to_string(),
            subtitles.map(str::to_string),
        ))
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

/// Fullscreen host whose state can also change behind the player's back
#[derive(Debug, Default)]
pub struct MockFullscreen {
    active: AtomicBool,
    refuse: AtomicBool,
}

impl MockFullscreen {
    pub fn set_external(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Ignore future requests to enter fullscreen
    pub fn refuse_requests(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl FullscreenHost for MockFullscreen {
    async fn is_fullscreen(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn request_fullscreen(&self) -> Result<()> {
        if !self.refuse.load(Ordering::SeqCst) {
            self.active.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn exit_fullscreen(&self) -> Result<()> {
        self.active.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted response body for [`ScriptedFetcher`]
#[derive(Debug, Clone)]
pub struct Script {
    chunks: Vec<Bytes>,
    content_length: Option<u64>,
    fail_at: Option<usize>,
    gate: Option<Arc<Semaphore>>,
}

impl Script {
    pub fn new<C: AsRef<[u8]>>(chunks: Vec<C>) -> Self {
        let chunks: Vec<Bytes> = chunks
            .iter()
            .map(|chunk| Bytes::copy_from_slice(chunk.as_ref()))
            .collect();
        let total = chunks.iter().map(|c| c.len() as u64).sum();
        Self {
            chunks,
            content_length: Some(total),
            fail_at: None,
            gate: None,
        }
    }

    /// Yield a connection error instead of chunk `index`
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Every chunk waits for one permit
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn into_body(self) -> stream::BoxStream<'static, Result<Bytes>> {
        stream::unfold((self, 0usize), |(script, index)| async move {
            let failing = script.fail_at == Some(index);
            if index >= script.chunks.len() && !failing {
                return None;
            }
            if let Some(gate) = &script.gate {
                gate.acquire().await.ok()?.forget();
            }
            if failing {
                return Some((Err(anyhow!("connection reset")), (script, usize::MAX)));
            }
            let chunk = script.chunks[index].clone();
            Some((Ok(chunk), (script, index + 1)))
        })
        .boxed()
    }
}

/// Fetcher serving scripted bodies by URL
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: &str, script: Script) {
        self.scripts.lock().unwrap().insert(url.to_string(), script);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, DownloadError> {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        self.requests.lock().unwrap().push(url.to_string());

        let script = self.scripts.lock().unwrap().get(url).cloned();
        match script {
            Some(script) => Ok(FetchResponse::new(
                script.content_length,
                None,
                script.into_body(),
            )),
            None => Err(DownloadError::HttpStatus(404, "Not Found".to_string())),
        }
    }
}

/// Store whose writes block until the test lets them through
#[derive(Debug)]
pub struct GatedStore {
    inner: Arc<MemoryDownloadStore>,
    /// One permit per write to let through
    gate: Semaphore,
    /// One permit per write that has reached the gate
    entered: Semaphore,
}

impl GatedStore {
    pub fn new(inner: Arc<MemoryDownloadStore>) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            entered: Semaphore::new(0),
        }
    }

    /// Wait until a write is parked at the gate
    pub async fn wait_for_put(&self) {
        tokio::time::timeout(Duration::from_secs(30), self.entered.acquire())
            .await
            .expect("timed out waiting for a store write")
            .unwrap()
            .forget();
    }

    pub fn release(&self, writes: usize) {
        self.gate.add_permits(writes);
    }
}

#[async_trait]
impl DownloadStore for GatedStore {
    async fn put(&self, record: StoredDownload) -> Result<()> {
        self.entered.add_permits(1);
        self.gate.acquire().await?.forget();
        self.inner.put(record).await
    }

    async fn get(&self, id: ItemId) -> Result<Option<StoredDownload>> {
        self.inner.get(id).await
    }

    async fn get_all(&self) -> Result<Vec<StoredDownload>> {
        self.inner.get_all().await
    }

    async fn delete(&self, id: ItemId) -> Result<bool> {
        self.inner.delete(id).await
    }
}

/// Wait until an event matching `predicate` arrives
pub async fn wait_for_event<F>(
    subscriber: &mut EventSubscriber<DownloadEvent>,
    predicate: F,
) -> DownloadEvent
where
    F: Fn(&DownloadEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            match subscriber.recv().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for download event")
}
