//! Commands sent to the onboarding actor by its handle.

use std::sync::Arc;

use tokio::sync::oneshot;

use super::actor::OnboardingSnapshot;
use super::state::ResumeFile;

pub enum OnboardingCommand {
    // -- Modal lifecycle --
    OpenModal,
    CloseModal,

    // -- Conversation --
    SetResumeFile {
        file: ResumeFile,
    },
    /// Reading the resume from disk failed on the caller's side.
    ResumeReadFailed {
        reason: String,
    },
    SubmitAnswer {
        text: String,
    },

    // -- Reasoning sub-session --
    StartReasoning {
        query: String,
    },
    StopReasoning,

    // -- Queries (use oneshot reply channels) --
    /// Snapshot taken after every earlier command was applied.
    GetSnapshot {
        reply: oneshot::Sender<Arc<OnboardingSnapshot>>,
    },
}
