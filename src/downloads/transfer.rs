use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::fetcher::FetchResponse;
use crate::utils::DownloadError;

/// Fully received body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub data: Bytes,
    pub content_type: String,
}

/// Integer percentage tracker that only reports increases
#[derive(Debug)]
struct ProgressTracker {
    total: Option<u64>,
    loaded: u64,
    reported: u8,
}

impl ProgressTracker {
    fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|&t| t > 0),
            loaded: 0,
            reported: 0,
        }
    }

    /// Record a chunk; returns the new percent when it went up
    fn advance(&mut self, bytes: usize) -> Option<u8> {
        self.loaded += bytes as u64;
        let total = self.total?;
        let percent = ((self.loaded as f64 / total as f64) * 100.0).round().min(100.0) as u8;
        if percent > self.reported {
            self.reported = percent;
            Some(percent)
        } else {
            None
        }
    }
}

/// Drain `response` into memory, reporting progress after each chunk.
/// Cancellation is observed between chunks and while waiting for the next
/// one; whatever arrived so far is dropped.
pub async fn stream_to_payload<F>(
    response: FetchResponse,
    cancel: &CancellationToken,
    fallback_content_type: &str,
    mut on_progress: F,
) -> Result<Payload, DownloadError>
where
    F: FnMut(u8) + Send,
{
    let FetchResponse {
        content_length,
        content_type,
        mut body,
    } = response;

    let mut tracker = ProgressTracker::new(content_length);
    let mut chunks: Vec<Bytes> = Vec::new();

    loop {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            chunk = body.next() => chunk,
        };

        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk.map_err(|e| DownloadError::Transfer(format!("{:#}", e)))?;
        trace!("Received chunk of {} bytes", chunk.len());

        if let Some(percent) = tracker.advance(chunk.len()) {
            on_progress(percent);
        }
        chunks.push(chunk);
    }

    let data = match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.swap_remove(0),
        _ => {
            let mut buffer = BytesMut::with_capacity(tracker.loaded as usize);
            for chunk in &chunks {
                buffer.extend_from_slice(chunk);
            }
            buffer.freeze()
        }
    };

    Ok(Payload {
        data,
        content_type: content_type.unwrap_or_else(|| fallback_content_type.to_string()),
    })
}
