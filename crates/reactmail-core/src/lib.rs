//! reactmail-core - Turns emoji reactions into outbound email
//!
//! This crate provides:
//! - Webhook event parsing and the per-request event pipeline
//! - Link-preview and raw-text content extraction plus template rendering
//! - The process-wide channel cache that gates which channels are watched
//! - The `ChatApi` and `MailDispatcher` seams implemented by `reactmail-channels`

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod template;
pub mod types;

// Re-export main types for convenience
pub use api::{ChatApi, MailDispatcher};
pub use cache::ChannelCache;
pub use config::{ForwarderConfig, MailSettings};
pub use error::{ForwardError, MailError, UpstreamError};
pub use extract::{Extracted, extract};
pub use pipeline::{EventPipeline, PipelineOutcome, SkipReason};
pub use types::{
    ChannelInfo, EventKind, LinkPreview, MailJob, ReactionEvent, ReactionOutcome,
    ResolvedMessage, WebhookEvent,
};
