use crate::error::{CoreResult, RelayError};
use crate::model::ChatStreamRequest;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

fn clean_text(s: &str) -> String {
    // Unicode NFC normalization + BOM strip + CRLF -> LF + trim
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    if t.contains("\r\n") {
        t = t.replace("\r\n", "\n");
    }
    t.trim().to_string()
}

/// Clean prompt and context. Fails only when nothing is left of the prompt.
pub fn normalize_chat(mut req: ChatStreamRequest) -> CoreResult<ChatStreamRequest> {
    req.prompt = clean_text(&req.prompt);
    if req.prompt.is_empty() {
        return Err(RelayError::Validation("prompt must not be empty".into()));
    }
    if let Some(items) = req.context.take() {
        let mut seen = HashSet::new();
        let items: Vec<String> = items
            .iter()
            .map(|s| clean_text(s))
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.clone()))
            .collect();
        req.context = Some(items);
    }
    Ok(req)
}
