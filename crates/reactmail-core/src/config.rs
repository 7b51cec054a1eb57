//! Runtime configuration consumed by the pipeline
//!
//! Built once at startup (see `reactmail-cli`) and shared by `Arc`.

use std::collections::HashSet;

/// Everything the event pipeline needs to decide and compose a forward
#[derive(Clone)]
pub struct ForwarderConfig {
    pub verify_token: String,
    pub app_id: String,
    /// Channel names whose ids end up in the channel cache
    pub target_channel_names: HashSet<String>,
    /// Reactions that trigger a forward
    pub target_reactions: HashSet<String>,
    pub success_reaction: String,
    pub failure_reaction: String,
    pub mail: MailSettings,
}

/// Templates and addresses used to build a `MailJob`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub subject_template: String,
    pub body_template: String,
    pub sender: String,
    pub recipient: String,
}

impl ForwarderConfig {
    pub fn is_target_reaction(&self, emoji: &str) -> bool {
        self.target_reactions.contains(emoji)
    }
}

impl std::fmt::Debug for ForwarderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwarderConfig")
            .field("verify_token", &"***")
            .field("app_id", &self.app_id)
            .field("target_channel_names", &self.target_channel_names)
            .field("target_reactions", &self.target_reactions)
            .field("success_reaction", &self.success_reaction)
            .field("failure_reaction", &self.failure_reaction)
            .field("mail", &self.mail)
            .finish()
    }
}
