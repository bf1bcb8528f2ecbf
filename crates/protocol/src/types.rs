//! Core types shared across the protocol

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who authored a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
    System,
}

/// A message in the onboarding transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub timestamp: String,
}

/// One preference question returned by resume analysis.
///
/// `response` starts empty, holds the raw answer optimistically after the
/// user replies and is overwritten by the server's interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub variable: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

/// Profile returned once every question has been answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedProfile {
    /// Usually a UUID string; other JSON values are kept as sent.
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub job_field: Option<String>,
    #[serde(default)]
    pub preferences: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tool invocation chosen during a reasoning iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningAction {
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

/// One thought/action/observation iteration of the reasoner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub iteration: u32,
    pub thought: String,
    pub action: ReasoningAction,
    #[serde(default)]
    pub observation: String,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final outcome of a reasoning query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningResult {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub iterations: u32,
    #[serde(default)]
    pub stopping_reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_keeps_unknown_fields() {
        let profile: CreatedProfile = serde_json::from_value(serde_json::json!({
            "user_id": "u-1",
            "job_field": "Software Engineering",
            "preferences": {"min_salary": 90000},
            "created_at": "2024-01-01"
        }))
        .unwrap();

        assert_eq!(profile.user_id, Some(Value::String("u-1".into())));
        assert_eq!(
            profile.extra.get("created_at"),
            Some(&Value::String("2024-01-01".into()))
        );
    }

    #[test]
    fn profile_accepts_non_string_user_id() {
        let profile: CreatedProfile = serde_json::from_value(serde_json::json!({
            "user_id": 42,
            "job_field": "Design"
        }))
        .unwrap();
        assert_eq!(profile.user_id, Some(serde_json::json!(42)));

        let profile: CreatedProfile =
            serde_json::from_value(serde_json::json!({"user_id": null})).unwrap();
        assert_eq!(profile.user_id, None);
    }

    #[test]
    fn reasoning_step_tolerates_missing_optional_fields() {
        let step: ReasoningStep = serde_json::from_value(serde_json::json!({
            "iteration": 1,
            "thought": "look up salaries",
            "action": {"name": "search"}
        }))
        .unwrap();

        assert!(!step.is_final);
        assert_eq!(step.action.input, Value::Null);
        assert!(step.observation.is_empty());
    }
}
