//! Onboarding flow state

use std::collections::HashMap;

use jobtrack_protocol::{CreatedProfile, OnboardingRequest, Question};
use serde::{Deserialize, Serialize};

use crate::transcript::Transcript;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Phase of the onboarding conversation.
///
/// Followups are `Questioning` with `is_awaiting_answer` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Idle,
    Uploading,
    Analyzing,
    Questioning,
    Submitting,
    Completed,
    Error,
}

impl Step {
    pub fn is_terminal(self) -> bool {
        matches!(self, Step::Completed | Step::Error)
    }
}

/// A resume picked by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeFile {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl ResumeFile {
    /// Build from a path-like name, deriving the MIME type from its extension.
    pub fn from_name_and_bytes(name: impl Into<String>, content: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = if name.to_ascii_lowercase().ends_with(".pdf") {
            PDF_MIME_TYPE
        } else {
            "application/octet-stream"
        };
        Self {
            mime_type: mime_type.to_string(),
            name,
            content,
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME_TYPE
    }
}

/// Everything the onboarding flow owns. Only the transition function
/// mutates it; readers get clones through the actor snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct OnboardingState {
    pub step: Step,
    pub is_modal_open: bool,
    pub resume_file_name: Option<String>,
    pub job_field: Option<String>,
    pub questions: Vec<Question>,
    /// `None` until questions arrive.
    pub current_question_index: Option<usize>,
    pub processing_updates: Vec<String>,
    pub error_message: Option<String>,
    pub created_profile: Option<CreatedProfile>,
    pub is_awaiting_answer: bool,
    pub transcript: Transcript,

    pub session_id: Option<String>,
    /// A transport is expected to be live for this flow.
    pub connected: bool,
    pub current_variable: Option<String>,
    pub variable_questions: HashMap<String, String>,
    /// Resume request waiting for the socket to open.
    pub pending_upload: Option<OnboardingRequest>,
}

impl Default for OnboardingState {
    fn default() -> Self {
        Self {
            step: Step::Idle,
            is_modal_open: false,
            resume_file_name: None,
            job_field: None,
            questions: Vec::new(),
            current_question_index: None,
            processing_updates: Vec::new(),
            error_message: None,
            created_profile: None,
            is_awaiting_answer: false,
            transcript: Transcript::new(),
            session_id: None,
            connected: false,
            current_variable: None,
            variable_questions: HashMap::new(),
            pending_upload: None,
        }
    }
}

impl OnboardingState {
    /// Fresh state that keeps only the modal flag.
    pub fn reset(&self) -> Self {
        Self {
            is_modal_open: self.is_modal_open,
            ..Self::default()
        }
    }

    /// The question being asked, while questioning.
    pub fn current_question(&self) -> Option<&Question> {
        if self.step != Step::Questioning {
            return None;
        }
        self.current_question_index
            .and_then(|index| self.questions.get(index))
    }

    pub fn question_index(&self, variable: &str) -> Option<usize> {
        self.questions.iter().position(|q| q.variable == variable)
    }

    /// Flow has a socket and is not finished.
    pub fn expects_connection(&self) -> bool {
        self.is_modal_open && self.session_id.is_some() && !self.step.is_terminal()
    }
}
