//! Outbound adapters for reactmail
//!
//! This crate provides the Slack Web API client used to resolve messages,
//! post outcome reactions, and list channels, plus the mail dispatcher that
//! shells out to an external mail command.

pub mod email;
pub mod slack;

// Re-export main types
pub use email::CommandMailer;
pub use slack::SlackClient;
