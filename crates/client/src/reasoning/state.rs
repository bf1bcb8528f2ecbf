//! Reasoning slice of the onboarding view: what the free-form Q&A
//! sub-session has produced and how it shows up in the shared transcript.

use jobtrack_protocol::{ReasoningResult, ReasoningStep, Sender};

use super::client::ReasoningUpdate;
use crate::transcript::Transcript;

pub const THINKING_PLACEHOLDER: &str = "I'm thinking about this step by step...";
const NO_ANSWER_MESSAGE: &str = "I'm sorry, I couldn't find a clear answer to your question.";
const CONNECT_FAILED_MESSAGE: &str = "Failed to connect to reasoning service";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReasoningState {
    pub active: bool,
    pub steps: Vec<ReasoningStep>,
    pub result: Option<ReasoningResult>,
    pub error: Option<String>,
    /// Transcript entry rewritten by intermediate steps.
    placeholder_id: Option<String>,
}

impl ReasoningState {
    /// Start a new query: clear previous results and mark active.
    pub fn begin(&mut self) {
        *self = Self {
            active: true,
            ..Self::default()
        };
    }

    /// Session is ready: echo the query and add the thinking placeholder.
    pub fn query_sent(&mut self, transcript: &mut Transcript, query: &str, now: &str) {
        transcript.push(Sender::User, query, now);
        self.placeholder_id = Some(transcript.push(Sender::System, THINKING_PLACEHOLDER, now));
    }

    pub fn connect_failed(&mut self, transcript: &mut Transcript, now: &str) {
        self.active = false;
        self.error = Some(CONNECT_FAILED_MESSAGE.to_string());
        transcript.push(
            Sender::System,
            format!("Error: {CONNECT_FAILED_MESSAGE}"),
            now,
        );
    }

    pub fn apply(&mut self, update: ReasoningUpdate, transcript: &mut Transcript, now: &str) {
        match update {
            ReasoningUpdate::Step(step) => {
                if !step.is_final {
                    if let Some(id) = &self.placeholder_id {
                        transcript.update_last_where(|m| &m.id == id, step_summary(&step));
                    }
                }
                self.steps.push(step);
            }
            ReasoningUpdate::Complete(result) => {
                self.active = false;
                self.placeholder_id = None;
                let text = if result.answer.trim().is_empty() {
                    NO_ANSWER_MESSAGE.to_string()
                } else {
                    result.answer.clone()
                };
                transcript.push(Sender::Ai, text, now);
                self.result = Some(result);
            }
            ReasoningUpdate::Error(error) => {
                self.active = false;
                transcript.push(
                    Sender::System,
                    format!("Error during reasoning: {error}"),
                    now,
                );
                self.error = Some(error);
            }
            ReasoningUpdate::SessionCreated(_)
            | ReasoningUpdate::Processing(_)
            | ReasoningUpdate::Closed => {}
        }
    }

    pub fn stop(&mut self) {
        *self = Self::default();
    }
}

/// Placeholder text for an intermediate step.
pub fn step_summary(step: &ReasoningStep) -> String {
    format!(
        "Thought: {}\n\nAction: {}\nObservation: {}",
        step.thought, step.action.name, step.observation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobtrack_protocol::ReasoningAction;

    fn step(iteration: u32, is_final: bool) -> ReasoningStep {
        ReasoningStep {
            iteration,
            thought: format!("thought {iteration}"),
            action: ReasoningAction {
                name: "search".into(),
                input: serde_json::Value::Null,
            },
            observation: format!("observation {iteration}"),
            is_final,
            error: None,
        }
    }

    #[test]
    fn steps_rewrite_a_single_placeholder() {
        let mut transcript = Transcript::new();
        let mut state = ReasoningState::default();
        state.begin();
        state.query_sent(&mut transcript, "Is 90k fair?", "1Z");

        state.apply(ReasoningUpdate::Step(step(1, false)), &mut transcript, "2Z");
        state.apply(ReasoningUpdate::Step(step(2, false)), &mut transcript, "3Z");

        assert_eq!(transcript.len(), 2);
        assert_eq!(state.steps.len(), 2);
        assert_eq!(
            transcript.last().unwrap().text,
            "Thought: thought 2\n\nAction: search\nObservation: observation 2"
        );
    }

    #[test]
    fn final_step_leaves_placeholder_alone() {
        let mut transcript = Transcript::new();
        let mut state = ReasoningState::default();
        state.begin();
        state.query_sent(&mut transcript, "q", "1Z");

        state.apply(ReasoningUpdate::Step(step(1, true)), &mut transcript, "2Z");
        assert_eq!(transcript.last().unwrap().text, THINKING_PLACEHOLDER);
    }

    #[test]
    fn completion_appends_answer_or_apology() {
        let mut transcript = Transcript::new();
        let mut state = ReasoningState::default();
        state.begin();

        state.apply(
            ReasoningUpdate::Complete(ReasoningResult {
                answer: "Yes, 90k is market rate.".into(),
                iterations: 2,
                stopping_reason: "answer".into(),
            }),
            &mut transcript,
            "1Z",
        );
        assert!(!state.active);
        assert_eq!(transcript.last().unwrap().sender, Sender::Ai);
        assert_eq!(transcript.last().unwrap().text, "Yes, 90k is market rate.");

        state.apply(
            ReasoningUpdate::Complete(ReasoningResult {
                answer: String::new(),
                iterations: 5,
                stopping_reason: "max_iterations".into(),
            }),
            &mut transcript,
            "2Z",
        );
        assert_eq!(transcript.last().unwrap().text, NO_ANSWER_MESSAGE);
    }

    #[test]
    fn errors_are_recorded_and_shown() {
        let mut transcript = Transcript::new();
        let mut state = ReasoningState::default();
        state.begin();

        state.apply(
            ReasoningUpdate::Error("tool crashed".into()),
            &mut transcript,
            "1Z",
        );
        assert!(!state.active);
        assert_eq!(state.error.as_deref(), Some("tool crashed"));
        assert_eq!(
            transcript.last().unwrap().text,
            "Error during reasoning: tool crashed"
        );

        state.connect_failed(&mut transcript, "2Z");
        assert_eq!(
            transcript.last().unwrap().text,
            "Error: Failed to connect to reasoning service"
        );
    }
}
