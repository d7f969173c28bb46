//! Client-side state and lifecycle of one streamed generation run.

use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::stream_parser::{FrameParser, ParsedRecord};
use crate::types::{FrameKind, StreamFrame, RESTART_MARKER};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    #[default]
    Idle,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunPhase::Completed | RunPhase::Cancelled | RunPhase::Failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything the presentation layer sees of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationState {
    pub thoughts: Vec<Thought>,
    pub text: String,
    pub status: String,
    pub profile: Option<serde_json::Value>,
    pub error: Option<String>,
    pub in_progress: bool,
    pub phase: RunPhase,
}

impl GenerationState {
    /// Folds one frame into the state. Frames must be applied in arrival order.
    pub fn apply(&mut self, frame: StreamFrame) {
        match frame.kind {
            FrameKind::Thought => self.thoughts.push(Thought {
                content: frame.content,
                timestamp: Utc::now(),
            }),
            FrameKind::Status => self.status = frame.content,
            FrameKind::Text => match frame.content.rfind(RESTART_MARKER) {
                Some(at) => {
                    self.text.clear();
                    self.text.push_str(&frame.content[at + RESTART_MARKER.len()..]);
                }
                None => self.text.push_str(&frame.content),
            },
            FrameKind::Reset => {
                self.text.clear();
                self.text.push_str(&frame.content);
            }
            FrameKind::Profile => match serde_json::from_str(&frame.content) {
                Ok(profile) => self.profile = Some(profile),
                Err(e) => debug!("Ignoring unparseable profile frame: {e}"),
            },
        }
    }
}

pub type RunId = u64;

struct ActiveRun {
    id: RunId,
    token: CancellationToken,
}

#[derive(Default)]
struct SessionInner {
    next_id: RunId,
    active: Option<ActiveRun>,
}

/// One UI surface's generation slot. At most one run is in flight per session.
#[derive(Clone, Default)]
pub struct GenerationSession {
    inner: Arc<Mutex<SessionInner>>,
}

/// Caller-side view of a run: cancel it or watch its state.
#[derive(Clone)]
pub struct GenerationHandle {
    id: RunId,
    token: CancellationToken,
    updates: watch::Receiver<GenerationState>,
}

impl GenerationHandle {
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Stops the run. No effect once the run has finished.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.updates.clone()
    }

    pub fn state(&self) -> GenerationState {
        self.updates.borrow().clone()
    }
}

impl GenerationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a run. Any active run of this session is cancelled first.
    ///
    /// `open` performs the request and resolves to the response body stream.
    /// The returned future drives the run to a terminal phase; spawn it or
    /// await it.
    pub fn start<F, S, B>(
        &self,
        open: F,
    ) -> (GenerationHandle, impl Future<Output = GenerationState>)
    where
        F: Future<Output = Result<S, TransportError>>,
        S: Stream<Item = Result<B, TransportError>>,
        B: AsRef<[u8]>,
    {
        let token = CancellationToken::new();
        let id = {
            let mut inner = self.lock();
            if let Some(previous) = inner.active.take() {
                info!("Cancelling generation run {} before starting a new one", previous.id);
                previous.token.cancel();
            }
            inner.next_id += 1;
            let id = inner.next_id;
            inner.active = Some(ActiveRun {
                id,
                token: token.clone(),
            });
            id
        };

        let initial = GenerationState {
            in_progress: true,
            phase: RunPhase::Requesting,
            ..GenerationState::default()
        };
        let (tx, rx) = watch::channel(initial.clone());

        let handle = GenerationHandle {
            id,
            token: token.clone(),
            updates: rx,
        };

        let run = Run {
            id,
            state: initial,
            updates: tx,
        };
        let session = self.clone();
        let fut = async move {
            let state = run.drive(open, token).await;
            session.release(id);
            state
        };

        (handle, fut)
    }

    /// Whether `id` is still the session's active run.
    pub fn is_current(&self, id: RunId) -> bool {
        self.lock().active.as_ref().is_some_and(|run| run.id == id)
    }

    pub fn is_running(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Cancels the active run, if any.
    pub fn cancel(&self) {
        if let Some(run) = self.lock().active.take() {
            run.token.cancel();
        }
    }

    fn release(&self, id: RunId) {
        let mut inner = self.lock();
        if inner.active.as_ref().is_some_and(|run| run.id == id) {
            inner.active = None;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        // state is plain bookkeeping; a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct Run {
    id: RunId,
    state: GenerationState,
    updates: watch::Sender<GenerationState>,
}

impl Run {
    async fn drive<F, S, B>(mut self, open: F, token: CancellationToken) -> GenerationState
    where
        F: Future<Output = Result<S, TransportError>>,
        S: Stream<Item = Result<B, TransportError>>,
        B: AsRef<[u8]>,
    {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return self.finish(RunPhase::Cancelled),
            opened = open => opened,
        };

        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Generation run {} failed before streaming: {e}", self.id);
                // nothing received yet, nothing to keep
                self.state = GenerationState::default();
                self.state.error = Some(e.user_message());
                return self.finish(RunPhase::Failed);
            }
        };
        futures::pin_mut!(stream);

        self.state.phase = RunPhase::Streaming;
        self.publish();

        let mut parser = FrameParser::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("Generation run {} cancelled", self.id);
                    return self.finish(RunPhase::Cancelled);
                }
                next = stream.next() => next,
            };

            match next {
                None => return self.finish(RunPhase::Completed),
                Some(Err(e)) => {
                    warn!("Generation run {} failed mid-stream: {e}", self.id);
                    self.state.error = Some(e.user_message());
                    return self.finish(RunPhase::Failed);
                }
                Some(Ok(chunk)) => {
                    let mut done = false;
                    for record in parser.push(chunk.as_ref()) {
                        match record {
                            ParsedRecord::Frame(frame) => self.state.apply(frame),
                            ParsedRecord::Done => {
                                done = true;
                                break;
                            }
                        }
                    }
                    if done {
                        return self.finish(RunPhase::Completed);
                    }
                    self.publish();
                }
            }
        }
    }

    fn finish(mut self, phase: RunPhase) -> GenerationState {
        debug!("Generation run {} finished: {phase:?}", self.id);
        self.state.phase = phase;
        self.state.in_progress = false;
        self.publish();
        self.state
    }

    fn publish(&self) {
        // send_replace keeps the latest value even with no receivers left
        self.updates.send_replace(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::done_record;
    use futures::stream;

    type Chunk = Result<Vec<u8>, TransportError>;

    fn chunks(parts: &[&[u8]]) -> Vec<Chunk> {
        parts.iter().map(|p| Ok(p.to_vec())).collect()
    }

    async fn opened(items: Vec<Chunk>) -> Result<impl Stream<Item = Chunk>, TransportError> {
        Ok(stream::iter(items))
    }

    fn record(frame: StreamFrame) -> String {
        frame.to_record().unwrap()
    }

    #[tokio::test]
    async fn worked_example_split_mid_json() {
        let wire = format!(
            "{}{}{}{}",
            record(StreamFrame::status("Fetching")),
            record(StreamFrame::text("Hello ")),
            record(StreamFrame::text("world")),
            done_record()
        );
        let split = wire.find("Hello").unwrap() + 2;
        let (first, second) = wire.as_bytes().split_at(split);

        let session = GenerationSession::new();
        let (handle, run) = session.start(opened(chunks(&[first, second])));
        let state = run.await;

        assert_eq!(state.status, "Fetching");
        assert_eq!(state.text, "Hello world");
        assert!(state.thoughts.is_empty());
        assert!(!state.in_progress);
        assert_eq!(state.phase, RunPhase::Completed);
        assert_eq!(handle.state(), state);
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn eof_without_done_completes() {
        let wire = record(StreamFrame::thought("Reading repos"));
        let session = GenerationSession::new();
        let (_handle, run) = session.start(opened(chunks(&[wire.as_bytes()])));
        let state = run.await;
        assert_eq!(state.phase, RunPhase::Completed);
        assert_eq!(state.thoughts.len(), 1);
        assert_eq!(state.thoughts[0].content, "Reading repos");
    }

    #[tokio::test]
    async fn frames_after_done_are_not_applied() {
        let wire = format!("{}{}", done_record(), record(StreamFrame::text("late")));
        let session = GenerationSession::new();
        let (_handle, run) = session.start(opened(chunks(&[wire.as_bytes()])));
        let state = run.await;
        assert_eq!(state.text, "");
        assert_eq!(state.phase, RunPhase::Completed);
    }

    #[tokio::test]
    async fn malformed_frame_between_valid_frames() {
        let wire = format!(
            "{}data: {{\"type\":\"text\",\"content\":\n\n{}{}",
            record(StreamFrame::text("a")),
            record(StreamFrame::text("b")),
            done_record()
        );
        let session = GenerationSession::new();
        let (_handle, run) = session.start(opened(chunks(&[wire.as_bytes()])));
        let state = run.await;
        assert_eq!(state.text, "ab");
        assert!(state.error.is_none());
    }

    #[test]
    fn restart_marker_discards_previous_text() {
        let mut state = GenerationState::default();
        state.apply(StreamFrame::text("draft one "));
        state.apply(StreamFrame::text("draft two"));
        state.apply(StreamFrame::text(format!("{RESTART_MARKER}Final")));
        state.apply(StreamFrame::text(" answer"));
        assert_eq!(state.text, "Final answer");
    }

    #[test]
    fn reset_frame_discards_previous_text() {
        let mut state = GenerationState::default();
        state.apply(StreamFrame::text("draft"));
        state.apply(StreamFrame::reset());
        state.apply(StreamFrame::text("refined"));
        assert_eq!(state.text, "refined");
    }

    #[test]
    fn status_overwrites_and_profile_is_parsed() {
        let mut state = GenerationState::default();
        state.apply(StreamFrame::status("one"));
        state.apply(StreamFrame::status("two"));
        state.apply(StreamFrame::new(FrameKind::Profile, r#"{"login":"octocat"}"#));
        state.apply(StreamFrame::new(FrameKind::Profile, "{broken"));
        assert_eq!(state.status, "two");
        assert_eq!(state.profile, Some(serde_json::json!({ "login": "octocat" })));
        assert_eq!(state.text, "");
    }

    #[tokio::test]
    async fn failed_response_surfaces_server_message() {
        let session = GenerationSession::new();
        let open = async {
            Err::<stream::Iter<std::vec::IntoIter<Chunk>>, _>(TransportError::Status {
                status: 400,
                message: Some("Invalid GitHub username".into()),
            })
        };
        let (_handle, run) = session.start(open);
        let state = run.await;
        assert_eq!(state.phase, RunPhase::Failed);
        assert_eq!(state.error.as_deref(), Some("Invalid GitHub username"));
        assert!(!state.in_progress);
    }

    #[tokio::test]
    async fn mid_stream_error_keeps_partial_text() {
        let mut items = chunks(&[record(StreamFrame::text("partial")).as_bytes()]);
        items.push(Err(TransportError::Network("connection reset".into())));
        let session = GenerationSession::new();
        let (_handle, run) = session.start(opened(items));
        let state = run.await;
        assert_eq!(state.phase, RunPhase::Failed);
        assert_eq!(state.text, "partial");
        assert_eq!(state.error.as_deref(), Some("Network error: connection reset"));
    }

    #[tokio::test]
    async fn cancel_mid_stream_keeps_partial_state() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Chunk>();
        let session = GenerationSession::new();
        let (handle, run) = session.start(async move { Ok(rx) });

        tx.unbounded_send(Ok(record(StreamFrame::thought("thinking")).into_bytes()))
            .unwrap();
        tx.unbounded_send(Ok(record(StreamFrame::text("half")).into_bytes()))
            .unwrap();

        let mut updates = handle.subscribe();
        let driver = tokio::spawn(run);
        updates
            .wait_for(|s| s.text == "half")
            .await
            .unwrap();
        handle.cancel();
        let state = driver.await.unwrap();

        assert_eq!(state.phase, RunPhase::Cancelled);
        assert!(state.error.is_none());
        assert_eq!(state.text, "half");
        assert_eq!(state.thoughts.len(), 1);
        assert!(!state.in_progress);
        drop(tx);
    }

    #[tokio::test]
    async fn cancel_while_requesting() {
        let session = GenerationSession::new();
        let open = futures::future::pending::<Result<stream::Iter<std::vec::IntoIter<Chunk>>, TransportError>>();
        let (handle, run) = session.start(open);
        handle.cancel();
        let state = run.await;
        assert_eq!(state.phase, RunPhase::Cancelled);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn cancel_after_completion_has_no_effect() {
        let wire = format!("{}{}", record(StreamFrame::text("done")), done_record());
        let session = GenerationSession::new();
        let (handle, run) = session.start(opened(chunks(&[wire.as_bytes()])));
        let finished = run.await;

        handle.cancel();
        session.cancel();

        assert_eq!(handle.state(), finished);
        assert_eq!(handle.state().phase, RunPhase::Completed);
        assert!(handle.state().error.is_none());
    }

    #[tokio::test]
    async fn new_run_cancels_and_isolates_the_previous_one() {
        let session = GenerationSession::new();

        let (tx1, rx1) = futures::channel::mpsc::unbounded::<Chunk>();
        let (first, run1) = session.start(async move { Ok(rx1) });
        tx1.unbounded_send(Ok(record(StreamFrame::text("first ")).into_bytes()))
            .unwrap();
        let run1 = tokio::spawn(run1);
        first
            .subscribe()
            .wait_for(|s| s.text == "first ")
            .await
            .unwrap();

        let wire = format!("{}{}", record(StreamFrame::text("second")), done_record());
        let (second, run2) = session.start(opened(chunks(&[wire.as_bytes()])));
        assert!(!session.is_current(first.id()));
        assert!(session.is_current(second.id()));

        // racily delivered frame for the superseded run
        let _ = tx1.unbounded_send(Ok(record(StreamFrame::text("late")).into_bytes()));

        let state1 = run1.await.unwrap();
        let state2 = run2.await;

        assert_eq!(state1.phase, RunPhase::Cancelled);
        assert_eq!(state1.text, "first ");
        assert_eq!(state2.phase, RunPhase::Completed);
        assert_eq!(state2.text, "second");
        assert_ne!(first.id(), second.id());
        assert!(!session.is_running());
    }
}
