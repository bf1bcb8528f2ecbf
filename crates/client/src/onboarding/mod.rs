//! Resume onboarding flow: pure state machine plus the actor that drives it.

mod actor;
mod command;
pub mod present;
mod state;
pub mod transition;

pub use actor::{OnboardingHandle, OnboardingSnapshot};
pub use command::OnboardingCommand;
pub use state::{OnboardingState, ResumeFile, Step, PDF_MIME_TYPE};
pub use transition::{transition, Effect, Input, TransportLoss, WELCOME_MESSAGE};
