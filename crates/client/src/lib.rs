//! Jobtrack client
//!
//! Drives the resume-onboarding conversation and the reasoning Q&A
//! sub-session over WebSocket. Front ends hold an `OnboardingHandle`, read
//! lock-free snapshots and subscribe to revision changes.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod reasoning;
pub mod reconnect;
pub mod transcript;
pub mod transport;

pub use config::ClientConfig;
pub use error::ClientError;
pub use onboarding::{OnboardingHandle, OnboardingSnapshot, OnboardingState, ResumeFile, Step};
pub use reasoning::{ReasoningClient, ReasoningState, ReasoningUpdate};
pub use transcript::Transcript;
pub use transport::{Connector, WsConnector};
