//! Free-form Q&A over the reasoning service.

mod client;
mod state;

pub use client::{ReasoningClient, ReasoningUpdate};
pub use state::{step_summary, ReasoningState, THINKING_PLACEHOLDER};
