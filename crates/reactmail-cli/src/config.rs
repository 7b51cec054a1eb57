use anyhow::{Context, Result};
use reactmail_core::{ForwarderConfig, MailSettings};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Prefix marking a path as relative to the config file's directory
const CONFIG_RELATIVE_PREFIX: &str = ":/";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactmailConfig {
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub forward: ForwardConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default = "default_verify_token")]
    pub verify_token: String,
    #[serde(default = "default_access_token")]
    pub access_token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            verify_token: default_verify_token(),
            access_token: default_access_token(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("app_id", &self.app_id)
            .field("verify_token", &mask_secret(&self.verify_token))
            .field("access_token", &mask_secret(&self.access_token))
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

fn default_app_id() -> String {
    "xxx".to_string()
}
fn default_verify_token() -> String {
    "xxxxxx".to_string()
}
fn default_access_token() -> String {
    "xxxx-xxx-xxx-xxx-xxxxxx".to_string()
}
fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    #[serde(default = "default_target_channel_names")]
    pub target_channel_names: Vec<String>,
    #[serde(default = "default_target_reactions")]
    pub target_reactions: Vec<String>,
    #[serde(default = "default_success_reaction")]
    pub success_reaction: String,
    #[serde(default = "default_failure_reaction")]
    pub failure_reaction: String,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            target_channel_names: default_target_channel_names(),
            target_reactions: default_target_reactions(),
            success_reaction: default_success_reaction(),
            failure_reaction: default_failure_reaction(),
        }
    }
}

fn default_target_channel_names() -> Vec<String> {
    vec!["random".to_string()]
}
fn default_target_reactions() -> Vec<String> {
    vec!["eyes".to_string()]
}
fn default_success_reaction() -> String {
    "email".to_string()
}
fn default_failure_reaction() -> String {
    "x".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_mail_command")]
    pub command: String,
    #[serde(default)]
    pub command_options: Vec<String>,
    #[serde(default = "default_mail_subject")]
    pub subject: String,
    #[serde(default = "default_mail_body")]
    pub body: String,
    /// When this file exists its contents replace `body`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_file: Option<String>,
    #[serde(default = "default_mail_from")]
    pub from: String,
    #[serde(default = "default_mail_to")]
    pub to: String,
    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            command: default_mail_command(),
            command_options: Vec::new(),
            subject: default_mail_subject(),
            body: default_mail_body(),
            body_file: None,
            from: default_mail_from(),
            to: default_mail_to(),
            timeout_secs: default_mail_timeout(),
        }
    }
}

fn default_mail_command() -> String {
    ":/bin/send_feed".to_string()
}
fn default_mail_subject() -> String {
    "{title} - {sitename}".to_string()
}
fn default_mail_body() -> String {
    "{url}\n\n{description}".to_string()
}
fn default_mail_from() -> String {
    "sender@example.com".to_string()
}
fn default_mail_to() -> String {
    "recipient@example.com".to_string()
}
fn default_mail_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            endpoint: default_endpoint(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_endpoint() -> String {
    "/slack_api/".to_string()
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".reactmail")
}

/// `--config` when given, otherwise `~/.reactmail/config.toml`
pub fn config_path(custom_path: &Option<PathBuf>) -> PathBuf {
    custom_path
        .clone()
        .unwrap_or_else(|| config_dir().join("config.toml"))
}

/// Write the bundled config, the mail body template and an empty `bin/`
/// next to `config_path`. Existing files are left alone. Returns whether
/// the config file was created.
pub async fn write_default_files(config_path: &Path) -> Result<bool> {
    let dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    tokio::fs::create_dir_all(dir.join("bin"))
        .await
        .with_context(|| format!("Failed to create config dir: {}", dir.display()))?;

    let created = if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
        false
    } else {
        tokio::fs::write(config_path, include_str!("../../../config/default.toml")).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(config_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        info!("Created default config at {}", config_path.display());
        true
    };

    let body_path = dir.join("mail.txt");
    if !body_path.exists() {
        tokio::fs::write(&body_path, include_str!("../../../config/mail.txt")).await?;
        info!("Created mail body template at {}", body_path.display());
    }
    Ok(created)
}

impl ReactmailConfig {
    /// Load the config file, falling back to built-in defaults when the
    /// default location has no file yet.
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = config_path(custom_path);

        if custom_path.is_none() && !path.exists() {
            warn!(
                "No config at {}; using built-in defaults. Run `reactmail init` to create one.",
                path.display()
            );
            let mut config = Self::default();
            config.finish(&config_dir());
            return Ok(config);
        }

        // The file holds Slack tokens
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    return Err(anyhow::anyhow!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    ));
                }
            }
        }

        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "Failed to read config at {}. Run `reactmail init` first.",
                path.display()
            )
        })?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let config = Self::from_toml_str(&content, &base_dir)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        info!("load conf from '{}'.", path.display());
        Ok(config)
    }

    /// Parse config text. `base_dir` anchors `:/` paths.
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let mut config: Self = toml::from_str(&expanded)?;
        config.finish(base_dir);
        Ok(config)
    }

    /// Resolve relative paths and pull in the mail body file
    fn finish(&mut self, base_dir: &Path) {
        self.mail.command = resolve_path(&self.mail.command, base_dir);
        self.mail.body_file = self
            .mail
            .body_file
            .as_deref()
            .map(|f| resolve_path(f, base_dir));

        if let Some(file) = &self.mail.body_file {
            match std::fs::read_to_string(file) {
                Ok(body) => {
                    self.mail.body = body;
                    info!("load mail body from '{}'.", file);
                }
                Err(e) => warn!(
                    "mail body file '{}' not readable ({}); using the inline template",
                    file, e
                ),
            }
        }
    }

    /// Command-line values win over the file
    pub fn apply_overrides(&mut self, port: Option<u16>, endpoint: Option<String>) {
        if let Some(port) = port {
            self.server.port = port;
        }
        if let Some(endpoint) = endpoint {
            self.server.endpoint = endpoint;
        }
    }

    /// Build the value object the pipeline runs on
    pub fn forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig {
            verify_token: self.slack.verify_token.clone(),
            app_id: self.slack.app_id.clone(),
            target_channel_names: self.forward.target_channel_names.iter().cloned().collect(),
            target_reactions: self.forward.target_reactions.iter().cloned().collect(),
            success_reaction: self.forward.success_reaction.clone(),
            failure_reaction: self.forward.failure_reaction.clone(),
            mail: MailSettings {
                subject_template: self.mail.subject.clone(),
                body_template: self.mail.body.clone(),
                sender: self.mail.from.clone(),
                recipient: self.mail.to.clone(),
            },
        }
    }

    /// Webhooks can't be authenticated against empty credentials
    pub fn validate(&self) -> Result<()> {
        if self.slack.verify_token.is_empty() {
            anyhow::bail!(
                "slack.verify_token is empty. Set it in the config or export SLACK_VERIFY_TOKEN"
            );
        }
        if self.slack.app_id.is_empty() {
            anyhow::bail!("slack.app_id is empty. Set it in the config or export SLACK_APP_ID");
        }
        Ok(())
    }

    /// Copy with secrets masked, for display
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        copy.slack.verify_token = mask_secret(&copy.slack.verify_token);
        copy.slack.access_token = mask_secret(&copy.slack.access_token);
        copy
    }
}

fn resolve_path(path: &str, base_dir: &Path) -> String {
    match path.strip_prefix(CONFIG_RELATIVE_PREFIX) {
        Some(rest) => base_dir.join(rest).display().to_string(),
        None => path.to_string(),
    }
}

/// Allowlist of environment variable names that may be expanded in config files.
/// This prevents an attacker who can modify the config from reading arbitrary env vars.
const ALLOWED_ENV_VARS: &[&str] = &[
    "SLACK_APP_ID",
    "SLACK_VERIFY_TOKEN",
    "SLACK_ACCESS_TOKEN",
    "REACTMAIL_MAIL_FROM",
    "REACTMAIL_MAIL_TO",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(start) = result[pos..].find("${") else {
            break;
        };
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = result[abs_start + 2..abs_start + end].to_string();

        if !ALLOWED_ENV_VARS.contains(&var_name.as_str()) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            // Leave the ${VAR} unexpanded so it's obvious
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(&var_name).unwrap_or_default();
        let value_len = value.len();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value_len;
    }
    result
}
