use crate::error::{MSG_UPSTREAM_UNAVAILABLE, RelayError};
use crate::model::DecodedRecord;
use crate::stream::OutboundEvent;

/// Maps decoded upstream records to outbound events and guarantees that at
/// most one terminal event is ever produced.
#[derive(Debug, Default)]
pub struct EventTranslator {
    terminated: bool,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Precedence within one record: text, then error, then done.
    pub fn translate(&mut self, record: &DecodedRecord) -> Vec<OutboundEvent> {
        if self.terminated {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(2);
        if let Some(text) = record.text() {
            out.push(OutboundEvent::Text(text.to_string()));
        }
        if record.error.is_some() {
            out.extend(self.terminal(OutboundEvent::Error(MSG_UPSTREAM_UNAVAILABLE.into())));
        } else if record.done {
            out.extend(self.terminal(OutboundEvent::Done));
        }
        out
    }

    /// Upstream closed cleanly. Synthesizes `done` unless already terminated.
    pub fn on_end(&mut self) -> Option<OutboundEvent> {
        self.terminal(OutboundEvent::Done)
    }

    /// Upstream failed. Synthesizes the matching error unless already terminated.
    pub fn on_error(&mut self, err: &RelayError) -> Option<OutboundEvent> {
        self.terminal(OutboundEvent::Error(err.client_message().into()))
    }

    fn terminal(&mut self, ev: OutboundEvent) -> Option<OutboundEvent> {
        if self.terminated {
            return None;
        }
        self.terminated = true;
        Some(ev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(response: Option<&str>, done: bool) -> DecodedRecord {
        DecodedRecord {
            response: response.map(String::from),
            done,
            ..Default::default()
        }
    }

    #[test]
    fn text_record_emits_text() {
        let mut t = EventTranslator::new();
        assert_eq!(
            t.translate(&rec(Some("Hi"), false)),
            vec![OutboundEvent::Text("Hi".into())]
        );
        assert!(!t.is_terminated());
    }

    #[test]
    fn empty_or_missing_response_emits_nothing() {
        let mut t = EventTranslator::new();
        assert!(t.translate(&rec(Some(""), false)).is_empty());
        assert!(t.translate(&rec(None, false)).is_empty());
    }

    #[test]
    fn text_and_done_in_one_record_keep_order() {
        let mut t = EventTranslator::new();
        assert_eq!(
            t.translate(&rec(Some("bye"), true)),
            vec![OutboundEvent::Text("bye".into()), OutboundEvent::Done]
        );
        assert!(t.is_terminated());
    }

    #[test]
    fn nothing_after_terminal() {
        let mut t = EventTranslator::new();
        let _ = t.translate(&rec(None, true));
        assert!(t.translate(&rec(Some("late"), false)).is_empty());
        assert_eq!(t.on_end(), None);
        assert_eq!(t.on_error(&RelayError::StreamInterrupted), None);
    }

    #[test]
    fn end_without_done_synthesizes_done() {
        let mut t = EventTranslator::new();
        let _ = t.translate(&rec(Some("partial"), false));
        assert_eq!(t.on_end(), Some(OutboundEvent::Done));
        assert_eq!(t.on_end(), None);
    }

    #[test]
    fn errors_map_to_client_messages() {
        let mut t = EventTranslator::new();
        assert_eq!(
            t.on_error(&RelayError::StreamInterrupted),
            Some(OutboundEvent::Error("Stream interrupted".into()))
        );

        let mut t = EventTranslator::new();
        let refused = RelayError::UpstreamUnavailable {
            reason: "connection refused".into(),
        };
        assert_eq!(
            t.on_error(&refused),
            Some(OutboundEvent::Error("Ollama unavailable".into()))
        );
    }

    #[test]
    fn upstream_error_record_is_terminal() {
        let mut t = EventTranslator::new();
        let r = DecodedRecord {
            error: Some("model 'x' not found".into()),
            ..Default::default()
        };
        assert_eq!(
            t.translate(&r),
            vec![OutboundEvent::Error("Ollama unavailable".into())]
        );
        assert!(t.is_terminated());
    }
}
