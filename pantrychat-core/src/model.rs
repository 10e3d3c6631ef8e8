use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat-stream`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatStreamRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: Option<Vec<String>>,
}

/// What is sent upstream to `/api/generate`. Built once per session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

impl GenerationRequest {
    pub fn streaming(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: true,
        }
    }
}

/// One NDJSON line from the upstream. Unknown fields are ignored.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct DecodedRecord {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    #[serde(default)]
    pub eval_count: Option<u32>,
}

impl DecodedRecord {
    /// Incremental text, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.response.as_deref().filter(|s| !s.is_empty())
    }
}
