use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::{stream::Stream, FutureExt};
use log::{debug, error, info};
use std::{
    collections::HashMap,
    convert::Infallible,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::{
    error::StreamClosed,
    state::AppState,
    types::{done_record, StreamFrame, DONE_SENTINEL},
};

const CHANNEL_CAPACITY: usize = 100;

/// One encoded record on its way to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseRecord {
    /// A JSON-encoded [`StreamFrame`].
    Data(String),
    Done,
}

impl SseRecord {
    pub fn to_wire(&self) -> String {
        match self {
            SseRecord::Data(json) => format!("data: {json}\n\n"),
            SseRecord::Done => done_record(),
        }
    }

    fn into_event(self) -> Event {
        match self {
            SseRecord::Data(json) => Event::default().data(json),
            SseRecord::Done => Event::default().data(DONE_SENTINEL),
        }
    }
}

/// Response body of one stream. Ends as soon as its token is cancelled, even
/// while the generator is still busy.
pub struct CancellableSseStream {
    receiver: mpsc::Receiver<SseRecord>,
    cancel_token: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl CancellableSseStream {
    pub fn new(receiver: mpsc::Receiver<SseRecord>, cancel_token: CancellationToken) -> Self {
        let cancelled = Box::pin(cancel_token.clone().cancelled_owned());
        Self {
            receiver,
            cancel_token,
            cancelled,
        }
    }
}

impl Stream for CancellableSseStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel_token.is_cancelled() || self.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(None);
        }
        self.receiver
            .poll_recv(cx)
            .map(|record| record.map(|r| Ok(r.into_event())))
    }
}

/// Write half handed to a generator.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<SseRecord>,
    cancel_token: CancellationToken,
}

impl FrameSender {
    pub fn new(tx: mpsc::Sender<SseRecord>, cancel_token: CancellationToken) -> Self {
        Self { tx, cancel_token }
    }

    /// Encodes and queues a frame. Fails once the client is gone or the
    /// stream was cancelled, which is the generator's cue to stop.
    pub async fn send(&self, frame: StreamFrame) -> Result<(), StreamClosed> {
        if self.cancel_token.is_cancelled() {
            return Err(StreamClosed);
        }
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                error!("Dropping frame that failed to encode: {e}");
                return Ok(());
            }
        };
        self.tx.send(SseRecord::Data(json)).await.map_err(|_| StreamClosed)
    }

    pub async fn status(&self, content: impl Into<String>) -> Result<(), StreamClosed> {
        self.send(StreamFrame::status(content)).await
    }

    pub async fn thought(&self, content: impl Into<String>) -> Result<(), StreamClosed> {
        self.send(StreamFrame::thought(content)).await
    }

    pub async fn text(&self, content: impl Into<String>) -> Result<(), StreamClosed> {
        self.send(StreamFrame::text(content)).await
    }

    pub async fn reset(&self) -> Result<(), StreamClosed> {
        self.send(StreamFrame::reset()).await
    }

    pub async fn profile<T: serde::Serialize>(&self, payload: &T) -> Result<(), StreamClosed> {
        match StreamFrame::profile(payload) {
            Ok(frame) => self.send(frame).await,
            Err(e) => {
                error!("Dropping profile payload that failed to encode: {e}");
                Ok(())
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// The response body has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn finish(&self) -> Result<(), StreamClosed> {
        self.tx.send(SseRecord::Done).await.map_err(|_| StreamClosed)
    }
}

struct Registration {
    generation: u64,
    token: CancellationToken,
}

#[derive(Clone)]
pub struct SseState {
    cancel_tokens: Arc<dashmap::DashMap<String, Registration>>,
    generation: Arc<AtomicU64>,
}

impl Default for SseState {
    fn default() -> Self {
        Self {
            cancel_tokens: Arc::new(dashmap::DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl SseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id`, cancelling any stream still live under the same id.
    /// Returns the token plus a ticket for [`SseState::release`].
    pub fn register_stream(&self, id: String) -> (CancellationToken, u64) {
        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let previous = self.cancel_tokens.insert(
            id.clone(),
            Registration {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            info!("Stream {id} restarted, cancelling the previous one");
            previous.token.cancel();
        }
        (token, generation)
    }

    pub fn cancel_stream(&self, id: &str) -> bool {
        if let Some((_, registration)) = self.cancel_tokens.remove(id) {
            registration.token.cancel();
            true
        } else {
            false
        }
    }

    /// Forgets `id` if it still belongs to the registration `generation`.
    pub fn release(&self, id: &str, generation: u64) {
        self.cancel_tokens
            .remove_if(id, |_, registration| registration.generation == generation);
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.cancel_tokens.contains_key(id)
    }
}

/// Runs a generator against `sender` and guarantees the framing contract:
/// a failure (or panic) becomes a best-effort status frame, and `[DONE]` is
/// always the last record unless the stream was cancelled. Cancellation drops
/// the generator future at its current await point.
pub async fn run_framed<F, Fut>(sender: FrameSender, process_fn: F)
where
    F: FnOnce(FrameSender) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let generator = AssertUnwindSafe(async {
        let tx = sender.clone();
        process_fn(tx).await
    })
    .catch_unwind();

    let result = tokio::select! {
        biased;
        _ = sender.cancel_token.cancelled() => {
            info!("Generator dropped after cancellation");
            return;
        }
        outcome = generator => match outcome {
            Ok(result) => result,
            Err(_) => {
                error!("Generator panicked");
                Err(anyhow::anyhow!("internal error"))
            }
        },
    };

    if sender.is_cancelled() {
        debug!("Generator stopped after cancellation");
        return;
    }

    if let Err(e) = result {
        if sender.is_closed() {
            info!("Client went away mid-stream");
            return;
        }
        error!("Error in SSE stream: {e:#}");
        let _ = sender.status(format!("Generation failed: {e}")).await;
    }

    if sender.finish().await.is_err() {
        debug!("Client went away before [DONE]");
    }
}

pub async fn create_cancellable_sse_stream<F, Fut>(
    state: SseState,
    stream_id: String,
    process_fn: F,
) -> Response
where
    F: FnOnce(FrameSender) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (cancel_token, generation) = state.register_stream(stream_id.clone());

    let sender = FrameSender::new(tx, cancel_token.clone());

    tokio::spawn(async move {
        run_framed(sender, process_fn).await;
        state.release(&stream_id, generation);
        debug!("Stream {stream_id} finished");
    });

    Sse::new(CancellableSseStream::new(rx, cancel_token))
        .keep_alive(KeepAlive::default())
        .into_response()
}

pub async fn cancel_stream(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> &'static str {
    if let Some(stream_id) = params.get("stream_id") {
        info!("Cancelling stream: {stream_id}");
        state.sse_state.cancel_stream(stream_id);
        "Stream cancelled"
    } else {
        "No stream ID provided"
    }
}
