//! One client connection's relay: upstream chunks in, SSE events out.
//!
//! The session is a pull-based stream. The HTTP layer polls it only when the
//! client socket can take more data, so a slow reader holds back upstream
//! reads instead of growing a buffer. Dropping the stream (client gone) drops
//! the upstream body with it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_stream::stream;
use futures_util::StreamExt;
use tracing::{debug, field, info, info_span, warn, Span};
use tracing_futures::Instrument;

use crate::decoder::FrameDecoder;
use crate::error::RelayError;
use crate::model::{DecodedRecord, GenerationRequest};
use crate::provider::GenerationProvider;
use crate::stream::{BoxEventStream, OutboundEvent};
use crate::telemetry::{self, KEY_FINISH_REASON, SessionLog, SessionOutcome};
use crate::translator::EventTranslator;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Headers sent, accepting upstream data.
    Open,
    /// Terminal event sent or client gone. Every further input is a no-op.
    Terminated,
}

/// Synchronous part of a session: framing, translation, and the state machine.
/// Emits the session summary when dropped, whatever the exit path.
pub struct RelayState {
    state: SessionState,
    decoder: FrameDecoder,
    translator: EventTranslator,
    log: SessionLog,
    started: Instant,
    span: Span,
}

impl RelayState {
    pub fn new(provider: &str, model: &str, session_id: u64, span: Span) -> Self {
        Self {
            state: SessionState::Open,
            decoder: FrameDecoder::new(),
            translator: EventTranslator::new(),
            log: SessionLog::new(provider, model, session_id),
            started: Instant::now(),
            span,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn on_chunk(&mut self, chunk: &[u8]) -> Vec<OutboundEvent> {
        if !self.is_open() {
            return Vec::new();
        }
        self.log.chunks += 1;
        let records: Vec<DecodedRecord> = self.decoder.feed(chunk).collect();
        let mut out = Vec::new();
        for record in records {
            if !self.is_open() {
                break;
            }
            self.absorb(&record, &mut out);
        }
        out
    }

    /// Upstream closed cleanly. Any unterminated tail gets one last parse.
    pub fn on_end(&mut self) -> Vec<OutboundEvent> {
        if !self.is_open() {
            return Vec::new();
        }
        let mut out = Vec::new();
        if let Some(record) = self.decoder.finish() {
            self.absorb(&record, &mut out);
        }
        if let Some(ev) = self.translator.on_end() {
            self.terminate(SessionOutcome::Done);
            out.push(ev);
        }
        out
    }

    pub fn on_error(&mut self, err: &RelayError) -> Vec<OutboundEvent> {
        if !self.is_open() {
            return Vec::new();
        }
        match self.translator.on_error(err) {
            Some(ev) => {
                self.log = self.log.clone().error(err.kind(), &err.to_string());
                self.terminate(SessionOutcome::Error);
                vec![ev]
            }
            None => Vec::new(),
        }
    }

    fn absorb(&mut self, record: &DecodedRecord, out: &mut Vec<OutboundEvent>) {
        self.log.records += 1;
        if record.done {
            self.log = self
                .log
                .clone()
                .tokens(record.prompt_eval_count, record.eval_count);
        }
        for ev in self.translator.translate(record) {
            match &ev {
                OutboundEvent::Text(_) => self.log.text_events += 1,
                OutboundEvent::Done => self.terminate(SessionOutcome::Done),
                OutboundEvent::Error(_) => {
                    let detail = record.error.as_deref().unwrap_or_default();
                    warn!(error = %detail, "upstream reported an error record");
                    self.log = self.log.clone().error("upstream_record", detail);
                    self.terminate(SessionOutcome::Error);
                }
            }
            out.push(ev);
        }
    }

    fn terminate(&mut self, outcome: SessionOutcome) {
        self.state = SessionState::Terminated;
        self.log.outcome = outcome;
        self.span.record(KEY_FINISH_REASON, outcome.as_str());
    }
}

impl Drop for RelayState {
    fn drop(&mut self) {
        if self.state == SessionState::Open {
            self.terminate(SessionOutcome::Disconnected);
            info!(
                session.id = self.log.session_id,
                "client disconnected before terminal event, releasing upstream"
            );
        }
        self.log.malformed_lines = self.decoder.malformed() as u64;
        self.log.latency_ms = self.started.elapsed().as_millis() as u64;
        info!(
            session.id = self.log.session_id,
            outcome = self.log.outcome.as_str(),
            chunks = self.log.chunks,
            text_events = self.log.text_events,
            malformed = self.log.malformed_lines,
            latency_ms = self.log.latency_ms,
            "relay session finished"
        );
        telemetry::emit_session(self.log.clone());
    }
}

/// Owns the lifecycle of one client connection.
pub struct RelaySession {
    provider: Arc<dyn GenerationProvider>,
    request: GenerationRequest,
    idle_timeout: Duration,
    id: u64,
}

impl RelaySession {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        request: GenerationRequest,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            request,
            idle_timeout,
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Run the session as a stream of outbound events ending in exactly one
    /// terminal event. The upstream request is only sent once the stream is polled.
    pub fn into_events(self) -> BoxEventStream {
        let RelaySession {
            provider,
            request,
            idle_timeout,
            id,
        } = self;

        let span = info_span!(
            "relay_session",
            llm.provider = %provider.name(),
            llm.model = %request.model,
            session.id = id,
            finish.reason = field::Empty,
        );
        let mut relay = RelayState::new(provider.name(), &request.model, id, span.clone());
        let after_ms = idle_timeout.as_millis() as u64;

        let events = stream! {
            // The wait for response headers counts as a read.
            let opened = tokio::time::timeout(idle_timeout, provider.generate_stream(&request))
                .await
                .unwrap_or_else(|_| Err(RelayError::IdleTimeout { after_ms }));
            let mut upstream = match opened {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "could not open upstream stream");
                    for ev in relay.on_error(&e) {
                        yield ev;
                    }
                    return;
                }
            };
            debug!("upstream stream opened");

            while relay.is_open() {
                let batch = match tokio::time::timeout(idle_timeout, upstream.next()).await {
                    Ok(Some(Ok(chunk))) => relay.on_chunk(&chunk),
                    Ok(Some(Err(e))) => {
                        warn!(error = %e, "upstream failed mid-stream");
                        relay.on_error(&e)
                    }
                    Ok(None) => relay.on_end(),
                    Err(_) => {
                        let e = RelayError::IdleTimeout { after_ms };
                        warn!(error = %e, "upstream stalled");
                        relay.on_error(&e)
                    }
                };
                for ev in batch {
                    yield ev;
                }
            }
        };

        Box::pin(events.instrument(span))
    }
}
