//! Jobtrack Protocol
//!
//! Shared types for the resume-onboarding and reasoning WebSocket sessions.
//! These types are serialized as JSON over WebSocket.

use uuid::Uuid;

// Re-exports
pub mod client;
pub mod server;
pub mod types;

pub use client::{OnboardingRequest, ReasoningRequest};
pub use server::{OnboardingEvent, ReasoningEvent};
pub use types::*;

/// Generate a new unique ID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
