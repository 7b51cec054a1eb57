//! Mail dispatcher that shells out to an external mail command
//!
//! The command is invoked as `command <subject> <sender> <recipient> [options...]`
//! with the body on stdin. Exit status 0 means the mail went out.

use async_trait::async_trait;
use reactmail_core::api::MailDispatcher;
use reactmail_core::error::MailError;
use reactmail_core::types::MailJob;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

pub struct CommandMailer {
    command: PathBuf,
    options: Vec<String>,
    timeout: Duration,
}

impl CommandMailer {
    pub fn new(command: impl Into<PathBuf>, options: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            options,
            timeout,
        }
    }

    pub fn command(&self) -> &PathBuf {
        &self.command
    }
}

#[async_trait]
impl MailDispatcher for CommandMailer {
    async fn send(&self, job: MailJob) -> Result<i32, MailError> {
        debug!(
            "Running mail command {} for '{}' ({} -> {})",
            self.command.display(),
            job.subject,
            job.sender,
            job.recipient
        );

        let mut child = Command::new(&self.command)
            .arg(&job.subject)
            .arg(&job.sender)
            .arg(&job.recipient)
            .args(&self.options)
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MailError::Spawn {
                command: self.command.display().to_string(),
                source,
            })?;

        let run = async {
            if let Some(mut stdin) = child.stdin.take() {
                match stdin.write_all(job.body.as_bytes()).await {
                    Ok(()) => {}
                    // The command is free to ignore its input
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                        debug!("Mail command closed stdin early");
                    }
                    Err(e) => return Err(MailError::Io(e)),
                }
                // Dropping stdin sends EOF
            }
            Ok::<_, MailError>(child.wait().await?)
        };

        let status = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| MailError::Timeout(self.timeout))??;

        let code = status.code().ok_or(MailError::Terminated)?;
        info!("Mail command exited with {}", code);
        Ok(code)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn job() -> MailJob {
        MailJob {
            subject: "T - U".to_string(),
            body: "https://x\n\nD".to_string(),
            sender: "sender@example.com".to_string(),
            recipient: "recipient@example.com".to_string(),
        }
    }

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("send_feed");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_send_passes_arguments_and_body() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let cmd = script(
            dir.path(),
            &format!(
                "printf '%s|' \"$1\" \"$2\" \"$3\" \"$4\" > {out}.args\ncat > {out}.body",
                out = out.display()
            ),
        );

        let mailer = CommandMailer::new(cmd, vec!["--html".to_string()], Duration::from_secs(10));
        assert_eq!(mailer.send(job()).await.unwrap(), 0);

        let args = std::fs::read_to_string(format!("{}.args", out.display())).unwrap();
        assert_eq!(args, "T - U|sender@example.com|recipient@example.com|--html|");
        let body = std::fs::read_to_string(format!("{}.body", out.display())).unwrap();
        assert_eq!(body, "https://x\n\nD");
    }

    #[tokio::test]
    async fn test_send_returns_nonzero_exit_code() {
        let dir = TempDir::new().unwrap();
        let cmd = script(dir.path(), "exit 3");
        let mailer = CommandMailer::new(cmd, Vec::new(), Duration::from_secs(10));
        assert_eq!(mailer.send(job()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_send_missing_command() {
        let dir = TempDir::new().unwrap();
        let mailer = CommandMailer::new(
            dir.path().join("does-not-exist"),
            Vec::new(),
            Duration::from_secs(10),
        );
        assert!(matches!(
            mailer.send(job()).await,
            Err(MailError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_times_out() {
        let dir = TempDir::new().unwrap();
        let cmd = script(dir.path(), "sleep 5");
        let mailer = CommandMailer::new(cmd, Vec::new(), Duration::from_millis(200));
        assert!(matches!(
            mailer.send(job()).await,
            Err(MailError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_send_killed_by_signal() {
        let dir = TempDir::new().unwrap();
        let cmd = script(dir.path(), "kill -9 $$");
        let mailer = CommandMailer::new(cmd, Vec::new(), Duration::from_secs(10));
        assert!(matches!(
            mailer.send(job()).await,
            Err(MailError::Terminated)
        ));
    }
}
