//! Fake upstreams for exercising sessions and the HTTP surface without a
//! generation server.

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::{CoreResult, RelayError};
use crate::http_client::ByteStream;
use crate::model::GenerationRequest;
use crate::provider::GenerationProvider;

/// Plays back a fixed list of chunk results, then closes cleanly.
#[derive(Default)]
pub struct ScriptedProvider {
    open_error: Mutex<Option<RelayError>>,
    items: Mutex<Vec<CoreResult<Bytes>>>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn chunks(chunks: &[&[u8]]) -> Self {
        Self::with_items(
            chunks
                .iter()
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect(),
        )
    }

    pub fn with_items(items: Vec<CoreResult<Bytes>>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Default::default()
        }
    }

    /// Fails at open time, before any chunk.
    pub fn failing(err: RelayError) -> Self {
        Self {
            open_error: Mutex::new(Some(err)),
            ..Default::default()
        }
    }

    /// Requests received so far.
    pub fn seen(&self) -> Vec<GenerationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_stream(&self, req: &GenerationRequest) -> CoreResult<ByteStream> {
        self.seen.lock().unwrap().push(req.clone());
        if let Some(err) = self.open_error.lock().unwrap().take() {
            return Err(err);
        }
        let items = std::mem::take(&mut *self.items.lock().unwrap());
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Upstream fed by the test through a channel. The sender observes
/// `is_closed()` once the session drops its upstream handle.
pub struct ChannelProvider {
    rx: Mutex<Option<UnboundedReceiver<CoreResult<Bytes>>>>,
}

impl ChannelProvider {
    pub fn new() -> (Self, UnboundedSender<CoreResult<Bytes>>) {
        let (tx, rx) = mpsc::unbounded();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait]
impl GenerationProvider for ChannelProvider {
    fn name(&self) -> &str {
        "channel"
    }

    async fn generate_stream(&self, _req: &GenerationRequest) -> CoreResult<ByteStream> {
        match self.rx.lock().unwrap().take() {
            Some(rx) => Ok(Box::pin(rx)),
            None => Err(RelayError::UpstreamUnavailable {
                reason: "channel already consumed".into(),
            }),
        }
    }
}

/// Accepts the request but never produces response headers.
pub struct StalledProvider;

#[async_trait]
impl GenerationProvider for StalledProvider {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn generate_stream(&self, _req: &GenerationRequest) -> CoreResult<ByteStream> {
        futures::future::pending().await
    }
}
