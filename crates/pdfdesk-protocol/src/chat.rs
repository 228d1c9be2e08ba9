//! Chat transcript entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a question was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ChatOutcome {
    /// The service returned an answer.
    Answered,
    /// The service responded with a non-2xx status.
    Rejected { status: u16 },
    /// The request failed locally (transport or undecodable body).
    Failed { reason: String },
}

/// One question and its answer. Failed questions carry a sentinel answer so
/// the transcript stays complete and ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub question: String,
    pub answer: String,
    pub outcome: ChatOutcome,
}

impl ChatMessage {
    /// Message for a successful answer, rendering structured answers as JSON.
    pub fn answered(question: impl Into<String>, answer: &Value) -> Self {
        Self {
            question: question.into(),
            answer: render_answer(answer),
            outcome: ChatOutcome::Answered,
        }
    }

    /// True when the answer is an error sentinel.
    pub fn is_error(&self) -> bool {
        !matches!(self.outcome, ChatOutcome::Answered)
    }
}

/// Render an opaque answer value for display.
pub fn render_answer(answer: &Value) -> String {
    match answer {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
