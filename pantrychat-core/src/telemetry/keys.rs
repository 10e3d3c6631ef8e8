/// Span/Log attribute keys for relay sessions.
/// Keep these stable; changing them is a breaking change for dashboards.
pub const KEY_PROVIDER: &str = "llm.provider";
pub const KEY_MODEL: &str = "llm.model";
pub const KEY_SESSION_ID: &str = "session.id";
pub const KEY_FINISH_REASON: &str = "finish.reason";
