//! Slack Web API client

use async_trait::async_trait;
use reactmail_core::api::ChatApi;
use reactmail_core::error::UpstreamError;
use reactmail_core::types::{ChannelInfo, ResolvedMessage};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

const SLACK_API_BASE: &str = "https://slack.com/api";
const HISTORY_METHOD: &str = "channels.history";
const REACTIONS_ADD_METHOD: &str = "reactions.add";
const CHANNELS_LIST_METHOD: &str = "channels.list";

/// Slack Web API client authenticated with a workspace access token
pub struct SlackClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<ResolvedMessage>,
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channels: Vec<ChannelEntry>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ChannelEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

impl SlackClient {
    /// Create a client talking to the public Slack API
    pub fn new(access_token: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: SLACK_API_BASE.to_string(),
            access_token,
        })
    }

    /// Point the client at a different API root (e.g. a test server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Decode a Web API response body, treating non-2xx as an error
    async fn read_body<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, UpstreamError> {
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

fn transport(e: reqwest::Error) -> UpstreamError {
    UpstreamError::Transport(e.to_string())
}

fn check_ok(ok: Option<bool>, error: Option<String>) -> Result<(), UpstreamError> {
    if ok != Some(true) {
        return Err(UpstreamError::Api(
            error.unwrap_or_else(|| "unknown".to_string()),
        ));
    }
    Ok(())
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn fetch_message(
        &self,
        channel: &str,
        ts: &str,
    ) -> Result<ResolvedMessage, UpstreamError> {
        debug!("Fetching message channel='{}', ts='{}'", channel, ts);
        let response = self
            .client
            .get(self.url(HISTORY_METHOD))
            .query(&[
                ("token", self.access_token.as_str()),
                ("channel", channel),
                ("latest", ts),
                ("inclusive", "true"),
                ("count", "1"),
            ])
            .send()
            .await
            .map_err(transport)?;

        let body: HistoryResponse = Self::read_body(response).await?;
        check_ok(body.ok, body.error)?;

        let mut messages = body.messages;
        if messages.len() != 1 {
            return Err(UpstreamError::UnexpectedMessageCount(messages.len()));
        }
        Ok(messages.remove(0))
    }

    async fn post_reaction(
        &self,
        emoji: &str,
        channel: &str,
        ts: &str,
    ) -> Result<(), UpstreamError> {
        debug!(
            "Adding reaction emoji='{}', channel='{}', ts='{}'",
            emoji, channel, ts
        );
        let body = serde_json::json!({
            "name": emoji,
            "channel": channel,
            "timestamp": ts,
        });

        let response = self
            .client
            .post(self.url(REACTIONS_ADD_METHOD))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let ack: AckResponse = Self::read_body(response).await?;
        check_ok(ack.ok, ack.error)
    }

    async fn list_channels(
        &self,
        names: &HashSet<String>,
    ) -> Result<Vec<ChannelInfo>, UpstreamError> {
        let mut found = Vec::new();
        let mut cursor = String::new();
        let mut pages = 0usize;

        loop {
            let response = {
                let mut params = vec![("token", self.access_token.as_str())];
                if !cursor.is_empty() {
                    params.push(("cursor", cursor.as_str()));
                }
                self.client
                    .get(self.url(CHANNELS_LIST_METHOD))
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .query(&params)
                    .send()
                    .await
                    .map_err(transport)?
            };

            let page: ChannelListResponse = Self::read_body(response).await?;
            check_ok(page.ok, page.error)?;
            pages += 1;

            found.extend(page.channels.into_iter().filter_map(|c| match (c.id, c.name) {
                (Some(id), Some(name)) if names.contains(&name) => Some(ChannelInfo { id, name }),
                _ => None,
            }));

            let next = page
                .response_metadata
                .and_then(|m| m.next_cursor)
                .unwrap_or_default();
            // A repeated cursor would loop forever
            if next.is_empty() || next == cursor {
                break;
            }
            cursor = next;
        }

        debug!("Listed {} matching channels over {} page(s)", found.len(), pages);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    fn client(server: &MockServer) -> SlackClient {
        SlackClient::new("xoxp-test".to_string())
            .unwrap()
            .with_base_url(server.base_url())
    }

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_with_base_url_trims_slash() {
        let client = SlackClient::new("xoxp-test".to_string())
            .unwrap()
            .with_base_url("http://localhost:9000/api/");
        assert_eq!(client.url("reactions.add"), "http://localhost:9000/api/reactions.add");
    }

    #[tokio::test]
    async fn test_fetch_message_queries_single_message() {
        let server = MockServer::start_async().await;
        let history = server.mock(|when, then| {
            when.method(GET)
                .path("/channels.history")
                .query_param("token", "xoxp-test")
                .query_param("channel", "C1")
                .query_param("latest", "1500000000.000100")
                .query_param("inclusive", "true")
                .query_param("count", "1");
            then.status(200).json_body(json!({
                "ok": true,
                "messages": [{
                    "type": "message",
                    "username": "feed",
                    "text": "<https://y|Z>",
                    "attachments": [{"title": "T", "title_link": "https://x", "text": "D"}]
                }]
            }));
        });

        let msg = client(&server)
            .fetch_message("C1", "1500000000.000100")
            .await
            .unwrap();
        history.assert();
        assert_eq!(msg.username.as_deref(), Some("feed"));
        assert_eq!(msg.attachments[0].title_link.as_deref(), Some("https://x"));
    }

    #[tokio::test]
    async fn test_fetch_message_rejects_wrong_count() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/channels.history");
            then.status(200)
                .json_body(json!({"ok": true, "messages": [{"text": "a"}, {"text": "b"}]}));
        });

        let err = client(&server).fetch_message("C1", "1.2").await.unwrap_err();
        assert!(matches!(err, UpstreamError::UnexpectedMessageCount(2)));
    }

    #[tokio::test]
    async fn test_fetch_message_empty_history() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/channels.history");
            then.status(200).json_body(json!({"ok": true, "messages": []}));
        });

        let err = client(&server).fetch_message("C1", "1.2").await.unwrap_err();
        assert!(matches!(err, UpstreamError::UnexpectedMessageCount(0)));
    }

    #[tokio::test]
    async fn test_fetch_message_undecodable_body() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/channels.history");
            then.status(200).body(vec![0xff, 0xfe, 0x00]);
        });

        let err = client(&server).fetch_message("C1", "1.2").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_message_api_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/channels.history");
            then.status(200)
                .json_body(json!({"ok": false, "error": "channel_not_found"}));
        });

        let err = client(&server).fetch_message("C1", "1.2").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Api(ref e) if e == "channel_not_found"));
    }

    #[tokio::test]
    async fn test_fetch_message_http_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/channels.history");
            then.status(503).body("unavailable");
        });

        let err = client(&server).fetch_message("C1", "1.2").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(503)));
    }

    #[tokio::test]
    async fn test_transport_error() {
        let client = SlackClient::new("xoxp-test".to_string())
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let err = client.fetch_message("C1", "1.2").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)));
    }

    #[tokio::test]
    async fn test_post_reaction_uses_bearer_auth() {
        let server = MockServer::start_async().await;
        let add = server.mock(|when, then| {
            when.method(POST)
                .path("/reactions.add")
                .header("authorization", "Bearer xoxp-test")
                .json_body(json!({"name": "email", "channel": "C1", "timestamp": "1.2"}));
            then.status(200).json_body(json!({"ok": true}));
        });

        client(&server)
            .post_reaction("email", "C1", "1.2")
            .await
            .unwrap();
        add.assert();
    }

    #[tokio::test]
    async fn test_post_reaction_not_ok() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/reactions.add");
            then.status(200)
                .json_body(json!({"ok": false, "error": "already_reacted"}));
        });

        let err = client(&server)
            .post_reaction("email", "C1", "1.2")
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Api(ref e) if e == "already_reacted"));
    }

    #[tokio::test]
    async fn test_list_channels_follows_cursor_and_filters() {
        let server = MockServer::start_async().await;
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/channels.list")
                .query_param("token", "xoxp-test")
                .query_param("cursor", "page2");
            then.status(200).json_body(json!({
                "ok": true,
                "channels": [{"id": "C3", "name": "random"}, {"id": "C4", "name": "dev"}],
                "response_metadata": {"next_cursor": ""}
            }));
        });
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/channels.list")
                .query_param("token", "xoxp-test");
            then.status(200).json_body(json!({
                "ok": true,
                "channels": [{"id": "C1", "name": "random"}, {"id": "C2", "name": "general"}],
                "response_metadata": {"next_cursor": "page2"}
            }));
        });

        let channels = client(&server)
            .list_channels(&names(&["random", "dev"]))
            .await
            .unwrap();
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        let ids: Vec<&str> = channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C3", "C4"]);
    }

    #[tokio::test]
    async fn test_list_channels_without_metadata_is_single_page() {
        let server = MockServer::start_async().await;
        let list = server.mock(|when, then| {
            when.method(GET).path("/channels.list");
            then.status(200).json_body(json!({
                "ok": true,
                "channels": [{"id": "C1", "name": "random"}, {"name": "nameless-id"}]
            }));
        });

        let channels = client(&server)
            .list_channels(&names(&["random"]))
            .await
            .unwrap();
        assert_eq!(list.calls(), 1);
        assert_eq!(
            channels,
            vec![ChannelInfo {
                id: "C1".to_string(),
                name: "random".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_list_channels_page_error_aborts() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/channels.list");
            then.status(500);
        });

        let err = client(&server)
            .list_channels(&names(&["random"]))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Status(500)));
    }
}
