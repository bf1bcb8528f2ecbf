//! Server → Client messages

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::types::*;

/// Messages pushed by the onboarding socket.
///
/// Payload fields are optional on the wire: a message missing a field it
/// needs is a protocol error the state machine logs and skips, not a decode
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OnboardingEvent {
    Status {
        message: Option<String>,
    },
    AnalysisComplete {
        job_field: Option<String>,
        questions: Option<Vec<Question>>,
    },
    NextQuestion {
        variable: Option<String>,
        question_text: Option<String>,
        question: Option<String>,
    },
    FollowupQuestion {
        variable: Option<String>,
        question_text: Option<String>,
        question: Option<String>,
    },
    InterpretationResult {
        variable: Option<String>,
        /// `Some(Value::Null)` when the server sent an explicit null.
        #[serde(default, deserialize_with = "present_value")]
        interpreted_value: Option<Value>,
        confidence: Option<f64>,
        reasoning: Option<String>,
    },
    ProfileCreated {
        profile: Option<CreatedProfile>,
    },
    Error {
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl OnboardingEvent {
    /// Wire name of the message type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            OnboardingEvent::Status { .. } => "status",
            OnboardingEvent::AnalysisComplete { .. } => "analysis_complete",
            OnboardingEvent::NextQuestion { .. } => "next_question",
            OnboardingEvent::FollowupQuestion { .. } => "followup_question",
            OnboardingEvent::InterpretationResult { .. } => "interpretation_result",
            OnboardingEvent::ProfileCreated { .. } => "profile_created",
            OnboardingEvent::Error { .. } => "error",
            OnboardingEvent::Unknown => "unknown",
        }
    }
}

/// Messages pushed by the reasoning socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningEvent {
    SessionCreated {
        session_id: Option<String>,
    },
    Processing {
        message: Option<String>,
    },
    ReasoningStep {
        step: Option<ReasoningStep>,
    },
    ReasoningComplete {
        result: Option<ReasoningResult>,
    },
    Error {
        error: Option<String>,
    },
    SessionClosed {
        session_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Question prompt carried by `next_question` / `followup_question`;
/// servers send either `question_text` or `question`.
pub fn question_prompt<'a>(
    question_text: &'a Option<String>,
    question: &'a Option<String>,
) -> Option<&'a str> {
    question_text
        .as_deref()
        .filter(|text| !text.is_empty())
        .or_else(|| question.as_deref().filter(|text| !text.is_empty()))
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_analysis_complete() {
        let event: OnboardingEvent = serde_json::from_value(json!({
            "type": "analysis_complete",
            "job_field": "Software Engineering",
            "questions": [
                {"variable": "min_salary", "question": "What is your minimum salary?"}
            ]
        }))
        .unwrap();

        match event {
            OnboardingEvent::AnalysisComplete {
                job_field,
                questions,
            } => {
                assert_eq!(job_field.as_deref(), Some("Software Engineering"));
                let questions = questions.unwrap();
                assert_eq!(questions.len(), 1);
                assert_eq!(questions[0].variable, "min_salary");
                assert!(questions[0].response.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_decodes_to_unknown() {
        let event: OnboardingEvent =
            serde_json::from_value(json!({"type": "heartbeat", "seq": 4})).unwrap();
        assert_eq!(event, OnboardingEvent::Unknown);
    }

    #[test]
    fn missing_type_is_a_decode_error() {
        let result = serde_json::from_value::<OnboardingEvent>(json!({"message": "hi"}));
        assert!(result.is_err());
    }

    #[test]
    fn explicit_null_interpretation_is_present() {
        let event: OnboardingEvent = serde_json::from_value(json!({
            "type": "interpretation_result",
            "variable": "remote",
            "interpreted_value": null
        }))
        .unwrap();
        assert!(matches!(
            event,
            OnboardingEvent::InterpretationResult {
                interpreted_value: Some(Value::Null),
                ..
            }
        ));

        let missing: OnboardingEvent = serde_json::from_value(json!({
            "type": "interpretation_result",
            "variable": "remote"
        }))
        .unwrap();
        assert!(matches!(
            missing,
            OnboardingEvent::InterpretationResult {
                interpreted_value: None,
                ..
            }
        ));
    }

    #[test]
    fn question_prompt_prefers_question_text() {
        let text = Some("Preferred text".to_string());
        let fallback = Some("Fallback".to_string());
        assert_eq!(question_prompt(&text, &fallback), Some("Preferred text"));
        assert_eq!(question_prompt(&None, &fallback), Some("Fallback"));
        assert_eq!(question_prompt(&Some(String::new()), &None), None);
    }

    #[test]
    fn decodes_reasoning_step() {
        let event: ReasoningEvent = serde_json::from_value(json!({
            "type": "reasoning_step",
            "step": {
                "iteration": 2,
                "thought": "compare offers",
                "action": {"name": "calculator", "input": {"expr": "1+1"}},
                "observation": "2",
                "is_final": false
            }
        }))
        .unwrap();

        match event {
            ReasoningEvent::ReasoningStep { step: Some(step) } => {
                assert_eq!(step.iteration, 2);
                assert_eq!(step.action.name, "calculator");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
