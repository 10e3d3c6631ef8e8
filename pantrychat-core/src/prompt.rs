use crate::config::PromptCfg;

/// Builds the final upstream prompt from user text and optional context items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptComposer {
    preamble: String,
    context_label: String,
}

impl PromptComposer {
    pub fn new(preamble: impl Into<String>, context_label: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
            context_label: context_label.into(),
        }
    }

    pub fn from_cfg(cfg: &PromptCfg) -> Self {
        Self::new(cfg.preamble.clone(), cfg.context_label.clone())
    }

    /// Layout:
    ///
    /// ```text
    /// <preamble>
    /// <label>: a, b, c        (only when context is non-empty)
    ///
    /// User: <user text>
    /// Assistant:
    /// ```
    pub fn compose(&self, user: &str, context: &[String]) -> String {
        let mut out = String::with_capacity(self.preamble.len() + user.len() + 64);
        out.push_str(&self.preamble);
        out.push('\n');
        if !context.is_empty() {
            out.push_str(&self.context_label);
            out.push_str(": ");
            out.push_str(&context.join(", "));
            out.push('\n');
        }
        out.push_str("\nUser: ");
        out.push_str(user);
        out.push_str("\nAssistant:");
        out
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::from_cfg(&PromptCfg::default())
    }
}
