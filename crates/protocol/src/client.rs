//! Client → Server messages

use serde::{Deserialize, Serialize};

/// Messages sent on the onboarding socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OnboardingRequest {
    /// Resume upload; `file_content` is base64 without a data-URL prefix.
    StartWithResume {
        file_content: String,
        file_name: String,
    },
    Answer {
        variable: String,
        answer_text: String,
    },
}

/// Messages sent on the reasoning socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningRequest {
    Query {
        session_id: String,
        query: String,
        context: String,
    },
    Close {
        session_id: Option<String>,
    },
}
