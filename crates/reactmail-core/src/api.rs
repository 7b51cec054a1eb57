//! Seams between the pipeline and the outside world

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::{MailError, UpstreamError};
use crate::types::{ChannelInfo, MailJob, ResolvedMessage};

/// The three chat platform operations the pipeline depends on
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Fetch exactly the message at `ts` in `channel`
    async fn fetch_message(&self, channel: &str, ts: &str)
    -> Result<ResolvedMessage, UpstreamError>;

    /// Add `emoji` as a reaction on the message at `ts` in `channel`
    async fn post_reaction(&self, emoji: &str, channel: &str, ts: &str)
    -> Result<(), UpstreamError>;

    /// List every channel whose name is in `names`, across all pages
    async fn list_channels(&self, names: &HashSet<String>)
    -> Result<Vec<ChannelInfo>, UpstreamError>;
}

/// Hands a composed mail to whatever actually delivers it
#[async_trait]
pub trait MailDispatcher: Send + Sync {
    /// Deliver `job`, returning the delivery program's exit code
    async fn send(&self, job: MailJob) -> Result<i32, MailError>;
}
