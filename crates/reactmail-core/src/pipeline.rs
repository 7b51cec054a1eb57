//! Event pipeline: one pass per inbound webhook
//!
//! validate → dispatch → filter → resolve → extract → compose → send → feedback.
//! Every step waits on the one before it; concurrency only exists across
//! requests.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::api::{ChatApi, MailDispatcher};
use crate::auth;
use crate::cache::ChannelCache;
use crate::config::ForwarderConfig;
use crate::error::ForwardError;
use crate::extract::extract;
use crate::types::{EventKind, ReactionEvent, ReactionOutcome, WebhookEvent};

/// How a request ended when it did not end in an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Echo this challenge back verbatim
    Challenge(String),
    /// A mail send was attempted; the outcome reaction was posted (or tried)
    Completed(ReactionOutcome),
    /// The channel cache was rebuilt and now watches this many channels
    ChannelsRefreshed(usize),
    /// Nothing to do
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UntargetedReaction,
    UnwatchedChannel,
    IgnoredEvent,
    RefreshFailed,
}

pub struct EventPipeline {
    config: Arc<ForwarderConfig>,
    api: Arc<dyn ChatApi>,
    mailer: Arc<dyn MailDispatcher>,
    cache: Arc<ChannelCache>,
}

impl EventPipeline {
    pub fn new(
        config: Arc<ForwarderConfig>,
        api: Arc<dyn ChatApi>,
        mailer: Arc<dyn MailDispatcher>,
        cache: Arc<ChannelCache>,
    ) -> Self {
        Self {
            config,
            api,
            mailer,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<ChannelCache> {
        &self.cache
    }

    /// Run one webhook body through the pipeline
    pub async fn handle(&self, body: &[u8]) -> Result<PipelineOutcome, ForwardError> {
        let event = match WebhookEvent::parse(body) {
            Ok(event) => event,
            Err(e) => {
                warn!("{}: {}", e, String::from_utf8_lossy(body));
                return Err(e);
            }
        };

        if !auth::verify_webhook(
            &self.config.verify_token,
            &self.config.app_id,
            event.token.as_deref(),
            event.app_id.as_deref(),
        ) {
            return Err(ForwardError::Unauthorized);
        }

        match event.kind {
            EventKind::UrlVerification { challenge } => Ok(PipelineOutcome::Challenge(challenge)),
            EventKind::ReactionAdded(reaction) => self.handle_reaction(reaction).await,
            EventKind::ChannelCreated | EventKind::ChannelRename => Ok(self.refresh_channels().await),
            EventKind::Other(event_type) => {
                debug!("received event: event_type={:?}", event_type);
                Ok(PipelineOutcome::Skipped(SkipReason::IgnoredEvent))
            }
        }
    }

    async fn refresh_channels(&self) -> PipelineOutcome {
        match self.cache.refresh().await {
            Ok(count) => PipelineOutcome::ChannelsRefreshed(count),
            // Already logged by the cache; the webhook caller can't fix it
            Err(_) => PipelineOutcome::Skipped(SkipReason::RefreshFailed),
        }
    }

    async fn handle_reaction(&self, reaction: ReactionEvent) -> Result<PipelineOutcome, ForwardError> {
        let emoji = reaction.emoji.as_deref().unwrap_or("");
        if !self.config.is_target_reaction(emoji) {
            debug!("received reaction event: emoji='{}'", emoji);
            return Ok(PipelineOutcome::Skipped(SkipReason::UntargetedReaction));
        }

        let Some((channel, ts)) = reaction.target() else {
            info!(
                "Insufficient parameters: item={}, channel={:?}, ts={:?}",
                reaction.has_item, reaction.channel, reaction.ts
            );
            return Err(ForwardError::BadRequest(
                "reaction event without item channel/ts".to_string(),
            ));
        };

        if !self.cache.is_allowed(channel) {
            debug!(
                "received reaction event: emoji='{}', channel='{}', ts='{}'",
                emoji, channel, ts
            );
            return Ok(PipelineOutcome::Skipped(SkipReason::UnwatchedChannel));
        }

        let outcome = self.forward(channel, ts).await?;
        Ok(PipelineOutcome::Completed(outcome))
    }

    /// Resolve, mail, and react on one message in a watched channel
    pub async fn forward(&self, channel: &str, ts: &str) -> Result<ReactionOutcome, ForwardError> {
        let msg = self.api.fetch_message(channel, ts).await.map_err(|e| {
            error!("{}: channel='{}', ts='{}'", e, channel, ts);
            ForwardError::from(e)
        })?;

        let job = extract(&msg).compose(&self.config.mail);

        let outcome = match self.mailer.send(job).await {
            Ok(code) => ReactionOutcome::from_exit_code(code),
            Err(e) => {
                error!("{}", e);
                ReactionOutcome::Failure
            }
        };

        let emoji = match outcome {
            ReactionOutcome::Success => &self.config.success_reaction,
            ReactionOutcome::Failure => &self.config.failure_reaction,
        };
        match outcome {
            ReactionOutcome::Success => info!(
                "succeeded in sending mail: emoji='{}', channel='{}', ts='{}'",
                emoji, channel, ts
            ),
            ReactionOutcome::Failure => error!(
                "failed to send mail: emoji='{}', channel='{}', ts='{}'",
                emoji, channel, ts
            ),
        }

        // The mail outcome stands whether or not the reaction lands
        if let Err(e) = self.api.post_reaction(emoji, channel, ts).await {
            error!(
                "{}: emoji='{}', channel='{}', ts='{}'",
                e, emoji, channel, ts
            );
        }

        Ok(outcome)
    }
}
