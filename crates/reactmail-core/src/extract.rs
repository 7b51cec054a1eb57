//! Pull title, URL, and description out of a resolved message

use crate::config::MailSettings;
use crate::template;
use crate::types::{MailJob, ResolvedMessage};

pub const DEFAULT_TITLE: &str = "untitled";
pub const DEFAULT_URL: &str = "https://example.com/";
pub const DEFAULT_DESCRIPTION: &str = "description";
pub const DEFAULT_SITENAME: &str = "untitled";

/// Fields extracted from a message, ready for templating
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub title: String,
    pub url: String,
    pub description: String,
    pub sitename: String,
}

/// Extract mail fields from `msg`.
///
/// A link preview, when present, wins outright. Otherwise the first line of
/// the raw text is read as `<url>` or `<url|title>` and the remaining lines
/// become the description.
pub fn extract(msg: &ResolvedMessage) -> Extracted {
    let sitename = msg
        .username
        .clone()
        .unwrap_or_else(|| DEFAULT_SITENAME.to_string());

    if let Some(preview) = msg.attachments.first() {
        return Extracted {
            title: preview
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            url: preview
                .title_link
                .clone()
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            description: preview
                .text
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            sitename,
        };
    }

    let text = msg.text.as_deref().unwrap_or("");
    let (header, description) = match text.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (text, ""),
    };
    let (url, title) = parse_link_header(header);

    Extracted {
        title,
        url,
        description: description.to_string(),
        sitename,
    }
}

/// Parse `<url|title>` link syntax. Every segment after the first `|` is
/// concatenated into the title.
fn parse_link_header(header: &str) -> (String, String) {
    let inner = header.trim_matches(|c| c == '<' || c == '>');
    let mut segments = inner.split('|');
    let url = segments.next().unwrap_or("");
    let title: String = segments.collect();

    let url = if url.is_empty() { DEFAULT_URL } else { url };
    let title = if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    };
    (url.to_string(), title)
}

impl Extracted {
    fn vars(&self) -> [(&str, &str); 4] {
        [
            ("title", self.title.as_str()),
            ("url", self.url.as_str()),
            ("description", self.description.as_str()),
            ("sitename", self.sitename.as_str()),
        ]
    }

    /// Render subject and body templates into a mail job
    pub fn compose(&self, settings: &MailSettings) -> MailJob {
        let vars = self.vars();
        MailJob {
            subject: template::render(&settings.subject_template, &vars),
            body: template::render(&settings.body_template, &vars),
            sender: settings.sender.clone(),
            recipient: settings.recipient.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LinkPreview;

    fn settings() -> MailSettings {
        MailSettings {
            subject_template: "{title} - {sitename}".to_string(),
            body_template: "{url}\n\n{description}".to_string(),
            sender: "sender@example.com".to_string(),
            recipient: "recipient@example.com".to_string(),
        }
    }

    fn raw(text: &str) -> ResolvedMessage {
        ResolvedMessage {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_from_link_preview() {
        let msg = ResolvedMessage {
            text: Some("<https://ignored|Ignored>".to_string()),
            username: Some("U".to_string()),
            attachments: vec![LinkPreview {
                title: Some("T".to_string()),
                title_link: Some("https://x".to_string()),
                text: Some("D".to_string()),
            }],
        };
        let extracted = extract(&msg);
        assert_eq!(
            extracted,
            Extracted {
                title: "T".to_string(),
                url: "https://x".to_string(),
                description: "D".to_string(),
                sitename: "U".to_string(),
            }
        );

        let job = extracted.compose(&settings());
        assert_eq!(job.subject, "T - U");
        assert_eq!(job.body, "https://x\n\nD");
        assert_eq!(job.sender, "sender@example.com");
        assert_eq!(job.recipient, "recipient@example.com");
    }

    #[test]
    fn test_extract_preview_defaults() {
        let msg = ResolvedMessage {
            attachments: vec![LinkPreview::default()],
            ..Default::default()
        };
        let extracted = extract(&msg);
        assert_eq!(extracted.title, DEFAULT_TITLE);
        assert_eq!(extracted.url, DEFAULT_URL);
        assert_eq!(extracted.description, DEFAULT_DESCRIPTION);
        assert_eq!(extracted.sitename, DEFAULT_SITENAME);
    }

    #[test]
    fn test_extract_raw_with_title() {
        let extracted = extract(&raw("<https://y|Z>\nhello"));
        assert_eq!(extracted.title, "Z");
        assert_eq!(extracted.url, "https://y");
        assert_eq!(extracted.description, "hello");
    }

    #[test]
    fn test_extract_raw_without_title() {
        let extracted = extract(&raw("<https://y>\nhello"));
        assert_eq!(extracted.title, "untitled");
        assert_eq!(extracted.url, "https://y");
        assert_eq!(extracted.description, "hello");
    }

    #[test]
    fn test_extract_raw_multiple_pipes_concatenates_title() {
        let extracted = extract(&raw("<https://y|a|b>\nl1\nl2"));
        assert_eq!(extracted.url, "https://y");
        assert_eq!(extracted.title, "ab");
        assert_eq!(extracted.description, "l1\nl2");
    }

    #[test]
    fn test_extract_empty_message() {
        let extracted = extract(&ResolvedMessage::default());
        assert_eq!(extracted.title, DEFAULT_TITLE);
        assert_eq!(extracted.url, DEFAULT_URL);
        assert_eq!(extracted.description, "");
    }

    #[test]
    fn test_compose_is_idempotent() {
        let msg = raw("<https://y|Z>\nhello");
        let first = extract(&msg).compose(&settings());
        let second = extract(&msg).compose(&settings());
        assert_eq!(first, second);
    }
}
