//! Pure state transition function
//!
//! All onboarding business logic lives here as a pure, synchronous
//! function: `transition(state, input, now) -> (state, effects)`.
//! Socket IO is described by the returned effects and executed by the
//! actor, so every rule below is unit-testable without a network.

use base64::Engine;
use jobtrack_protocol::{
    server::question_prompt, CreatedProfile, OnboardingEvent, OnboardingRequest, Question, Sender,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::present::{display_value, interpretation_message, preferences_summary};
use super::state::{OnboardingState, ResumeFile, Step};

pub const WELCOME_MESSAGE: &str =
    "Welcome! To help optimize your job search, please upload your resume (PDF).";
const INVALID_FILE_MESSAGE: &str = "Please select a valid PDF file.";
const ANALYSIS_FAILED_MESSAGE: &str = "Resume analysis failed. Please try again.";
const SOCKET_ERROR_MESSAGE: &str = "WebSocket connection error.";
const SOCKET_CLOSED_MESSAGE: &str = "Connection closed unexpectedly.";
const DEFAULT_SERVER_ERROR: &str = "An error occurred during processing";

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Why a socket went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportLoss {
    Error(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    OpenModal,
    CloseModal,
    /// `session_id` is generated by the caller so the function stays pure.
    ResumeSelected {
        file: ResumeFile,
        session_id: String,
    },
    /// Socket handshake finished (first connect or a reconnect).
    TransportOpened,
    /// The pending resume upload reached the socket.
    UploadDelivered,
    Server(OnboardingEvent),
    /// Inbound frame that could not be decoded as an event.
    Malformed {
        reason: String,
    },
    SubmitAnswer {
        text: String,
    },
    /// Socket dropped but a reconnect is scheduled.
    TransportInterrupted,
    /// Socket dropped and will not be retried.
    TransportLost(TransportLoss),
    SendFailed {
        request: OnboardingRequest,
    },
    /// Reading the resume failed before anything was sent.
    ResumeReadFailed {
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Effect
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open (or replace) the onboarding socket for this session.
    Connect { session_id: String },
    Send(OnboardingRequest),
    /// Drop the onboarding socket. Idempotent.
    Disconnect,
    /// Close the reasoning sub-session and clear its state slice.
    StopReasoning,
}

// ---------------------------------------------------------------------------
// transition() — the pure core
// ---------------------------------------------------------------------------

/// Pure, synchronous state transition.
///
/// Given the current state and an input, returns the new state and the
/// socket effects the caller must execute.
pub fn transition(
    mut state: OnboardingState,
    input: Input,
    now: &str,
) -> (OnboardingState, Vec<Effect>) {
    let mut effects: Vec<Effect> = Vec::new();

    match input {
        // -- Modal lifecycle -------------------------------------------------
        Input::OpenModal => {
            state.is_modal_open = true;
            state = state.reset();
            effects.push(Effect::Disconnect);
            state.transcript.push(Sender::Ai, WELCOME_MESSAGE, now);
        }

        Input::CloseModal => {
            state.is_modal_open = false;
            state = state.reset();
            effects.push(Effect::Disconnect);
            effects.push(Effect::StopReasoning);
        }

        // -- Upload ------------------------------------------------------------
        Input::ResumeSelected { file, session_id } => {
            if state.step != Step::Idle {
                debug!(
                    component = "onboarding",
                    event = "onboarding.resume.ignored",
                    step = ?state.step,
                    "Resume selection ignored outside idle"
                );
                return (state, effects);
            }

            if !file.is_pdf() {
                state.resume_file_name = None;
                state.error_message = Some(INVALID_FILE_MESSAGE.to_string());
                state.transcript.push(
                    Sender::System,
                    "Invalid file type. Please upload a PDF.",
                    now,
                );
                return (state, effects);
            }

            state.resume_file_name = Some(file.name.clone());
            state.error_message = None;
            state
                .transcript
                .push(Sender::System, format!("Selected resume: {}", file.name), now);

            state.step = Step::Uploading;
            state
                .transcript
                .push(Sender::Ai, "Connecting to analysis service...", now);

            state.pending_upload = Some(OnboardingRequest::StartWithResume {
                file_content: base64::engine::general_purpose::STANDARD.encode(&file.content),
                file_name: file.name,
            });
            state.session_id = Some(session_id.clone());
            state.connected = false;

            effects.push(Effect::Disconnect);
            effects.push(Effect::Connect { session_id });
        }

        Input::TransportOpened => {
            if state.session_id.is_none() || state.step.is_terminal() {
                effects.push(Effect::Disconnect);
                return (state, effects);
            }
            state.connected = true;
            if let Some(upload) = state.pending_upload.clone() {
                effects.push(Effect::Send(upload));
            }
        }

        Input::UploadDelivered => {
            if state.pending_upload.take().is_some() {
                state.step = Step::Analyzing;
                state
                    .transcript
                    .push(Sender::System, "Resume sent for analysis.", now);
            }
        }

        Input::ResumeReadFailed { reason } => {
            error!(
                component = "onboarding",
                event = "onboarding.resume.read_failed",
                error = %reason,
                "Error reading resume file"
            );
            fail(&mut state, &mut effects, "Error reading resume file.", now);
        }

        // -- Server events ------------------------------------------------------
        Input::Server(event) => apply_server_event(&mut state, &mut effects, event, now),

        Input::Malformed { reason } => {
            error!(
                component = "onboarding",
                event = "onboarding.message.malformed",
                error = %reason,
                "Received message that could not be decoded"
            );
        }

        // -- Answers ------------------------------------------------------------
        Input::SubmitAnswer { text } => {
            let variable = match state.current_variable.clone() {
                Some(variable) if state.connected && state.is_awaiting_answer => variable,
                _ => {
                    warn!(
                        component = "onboarding",
                        event = "onboarding.answer.rejected",
                        connected = state.connected,
                        awaiting = state.is_awaiting_answer,
                        "Cannot submit answer: either WebSocket is not connected or not awaiting an answer"
                    );
                    return (state, effects);
                }
            };

            state.transcript.push(Sender::User, text.clone(), now);
            info!(
                component = "onboarding",
                event = "onboarding.answer.submitted",
                variable = %variable,
                "Submitting answer"
            );

            effects.push(Effect::Send(OnboardingRequest::Answer {
                variable,
                answer_text: text.clone(),
            }));
            state.is_awaiting_answer = false;

            if let Some(question) = state
                .current_question_index
                .and_then(|index| state.questions.get_mut(index))
            {
                question.response = Some(Value::String(text));
            }
        }

        Input::SendFailed { request } => {
            let message = match request {
                OnboardingRequest::StartWithResume { .. } => {
                    "Failed to establish analysis connection."
                }
                OnboardingRequest::Answer { .. } => "Failed to send your answer. Please try again.",
            };
            fail(&mut state, &mut effects, message, now);
        }

        // -- Transport ----------------------------------------------------------
        Input::TransportInterrupted => {
            state.connected = false;
        }

        Input::TransportLost(loss) => {
            state.connected = false;
            if !state.is_modal_open || state.step.is_terminal() {
                return (state, effects);
            }
            let message = match loss {
                TransportLoss::Error(reason) => {
                    error!(
                        component = "onboarding",
                        event = "onboarding.transport.error",
                        error = %reason,
                        "WebSocket error"
                    );
                    SOCKET_ERROR_MESSAGE
                }
                TransportLoss::Closed => SOCKET_CLOSED_MESSAGE,
            };
            fail(&mut state, &mut effects, message, now);
        }
    }

    (state, effects)
}

fn apply_server_event(
    state: &mut OnboardingState,
    effects: &mut Vec<Effect>,
    event: OnboardingEvent,
    now: &str,
) {
    debug!(
        component = "onboarding",
        event = "onboarding.message.received",
        kind = event.kind(),
        "Received WebSocket message"
    );

    match event {
        OnboardingEvent::Status { message } => {
            state.is_awaiting_answer = false;
            if let Some(message) = message {
                info!(
                    component = "onboarding",
                    event = "onboarding.status",
                    status = %message,
                    "Status update"
                );
                state.processing_updates.push(message);
            }
        }

        OnboardingEvent::AnalysisComplete {
            job_field: Some(job_field),
            questions: Some(questions),
        } if !job_field.is_empty() && !questions.is_empty() => {
            store_questions(state, &job_field, questions);
            state.step = Step::Questioning;
            state.transcript.push(
                Sender::Ai,
                format!(
                    "I see you're interested in {job_field}. Let me ask you a few questions to complete your profile."
                ),
                now,
            );
        }

        OnboardingEvent::AnalysisComplete { .. } => {
            error!(
                component = "onboarding",
                event = "onboarding.analysis.incomplete",
                "Received analysis_complete without job_field or questions"
            );
            fail(state, effects, ANALYSIS_FAILED_MESSAGE, now);
        }

        OnboardingEvent::NextQuestion {
            variable,
            question_text,
            question,
        } => match (variable, question_prompt(&question_text, &question)) {
            (Some(variable), Some(prompt)) => {
                let prompt = prompt.to_string();
                next_question(state, variable, prompt, now);
            }
            _ => error!(
                component = "onboarding",
                event = "onboarding.question.incomplete",
                "Received next_question without variable or question text"
            ),
        },

        OnboardingEvent::FollowupQuestion {
            variable,
            question_text,
            question,
        } => match (variable, question_prompt(&question_text, &question)) {
            (Some(variable), Some(prompt)) => {
                let prompt = prompt.to_string();
                followup_question(state, variable, prompt, now);
            }
            _ => error!(
                component = "onboarding",
                event = "onboarding.followup.incomplete",
                "Received followup_question without variable or question text"
            ),
        },

        OnboardingEvent::InterpretationResult {
            variable: Some(variable),
            interpreted_value: Some(value),
            confidence,
            reasoning,
        } => {
            if let Some(index) = state.question_index(&variable) {
                state.questions[index].response = Some(value.clone());
            }

            info!(
                component = "onboarding",
                event = "onboarding.interpretation",
                variable = %variable,
                confidence = ?confidence,
                "Interpreted answer"
            );

            if let Some(text) =
                interpretation_message(&variable, &value, confidence, reasoning.as_deref())
            {
                state.transcript.push(Sender::System, text, now);
            }
        }

        OnboardingEvent::InterpretationResult { .. } => error!(
            component = "onboarding",
            event = "onboarding.interpretation.incomplete",
            "Received interpretation_result without variable or interpreted_value"
        ),

        OnboardingEvent::ProfileCreated {
            profile: Some(profile),
        } => profile_created(state, effects, profile, now),

        OnboardingEvent::ProfileCreated { profile: None } => error!(
            component = "onboarding",
            event = "onboarding.profile.incomplete",
            "Received profile_created without profile data"
        ),

        OnboardingEvent::Error { message } => {
            let message = message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_SERVER_ERROR.to_string());
            fail(state, effects, &message, now);
        }

        OnboardingEvent::Unknown => warn!(
            component = "onboarding",
            event = "onboarding.message.unknown",
            "Unknown message type"
        ),
    }
}

fn store_questions(state: &mut OnboardingState, job_field: &str, questions: Vec<Question>) {
    state.job_field = Some(job_field.to_string());
    state.variable_questions = questions
        .iter()
        .map(|q| (q.variable.clone(), q.question.clone()))
        .collect();
    state.questions = questions
        .into_iter()
        .map(|q| Question {
            response: None,
            ..q
        })
        .collect();
    state.current_question_index = Some(0);
    state.processing_updates.clear();

    info!(
        component = "onboarding",
        event = "onboarding.analysis.complete",
        job_field = %job_field,
        questions = state.questions.len(),
        "Resume analysis complete"
    );
}

fn next_question(state: &mut OnboardingState, variable: String, prompt: String, now: &str) {
    state.step = Step::Questioning;

    match state.question_index(&variable) {
        Some(index) => state.current_question_index = Some(index),
        None => warn!(
            component = "onboarding",
            event = "onboarding.question.unknown_variable",
            variable = %variable,
            "Question for variable not found in questions list"
        ),
    }

    state.current_variable = Some(variable);
    state.transcript.push(Sender::Ai, prompt, now);
    state.is_awaiting_answer = true;
}

fn followup_question(state: &mut OnboardingState, variable: String, prompt: String, now: &str) {
    state.step = Step::Questioning;

    if state.current_variable.as_deref() != Some(variable.as_str()) {
        warn!(
            component = "onboarding",
            event = "onboarding.followup.variable_mismatch",
            followup_variable = %variable,
            current_variable = ?state.current_variable,
            "Follow-up question variable doesn't match current variable"
        );
        if let Some(index) = state.question_index(&variable) {
            state.current_question_index = Some(index);
        }
        state.current_variable = Some(variable);
    }

    state
        .transcript
        .push(Sender::Ai, format!("(Follow-up) {prompt}"), now);
    state.is_awaiting_answer = true;
}

fn profile_created(
    state: &mut OnboardingState,
    effects: &mut Vec<Effect>,
    profile: CreatedProfile,
    now: &str,
) {
    state.step = Step::Completed;

    let user_id = profile
        .user_id
        .as_ref()
        .map(display_value)
        .unwrap_or_else(|| "unknown".to_string());
    state.transcript.push(
        Sender::Ai,
        format!("✅ Profile created successfully! Your User ID is: {user_id}"),
        now,
    );
    state.transcript.push(
        Sender::Ai,
        "You can use this ID for job evaluations in the future.",
        now,
    );
    if let Some(summary) = preferences_summary(&profile) {
        state.transcript.push(Sender::System, summary, now);
    }

    info!(
        component = "onboarding",
        event = "onboarding.profile.created",
        user_id = %user_id,
        job_field = ?profile.job_field,
        "Profile created"
    );

    state.created_profile = Some(profile);
    state.is_awaiting_answer = false;
    state.connected = false;
    state.pending_upload = None;
    effects.push(Effect::Disconnect);
}

/// Move to `error`, surface the message and drop the socket.
fn fail(state: &mut OnboardingState, effects: &mut Vec<Effect>, message: &str, now: &str) {
    state.step = Step::Error;
    state.error_message = Some(message.to_string());
    state
        .transcript
        .push(Sender::System, format!("Error: {message}"), now);
    state.is_awaiting_answer = false;
    state.connected = false;
    state.pending_upload = None;
    effects.push(Effect::Disconnect);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
