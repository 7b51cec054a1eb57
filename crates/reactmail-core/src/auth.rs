//! Webhook authentication: verification token and app id checks

use tracing::warn;

/// Check the credentials carried by a webhook against the configured ones.
///
/// Both values must be present and match exactly. An empty configured
/// token or app id rejects every request.
pub fn verify_webhook(
    expected_token: &str,
    expected_app_id: &str,
    token: Option<&str>,
    app_id: Option<&str>,
) -> bool {
    if expected_token.is_empty() || expected_app_id.is_empty() {
        warn!("bad auth: verification token or app id is not configured");
        return false;
    }
    let token_ok = token.is_some_and(|t| constant_time_eq(expected_token.as_bytes(), t.as_bytes()));
    let app_ok = app_id.is_some_and(|a| constant_time_eq(expected_app_id.as_bytes(), a.as_bytes()));
    if !(token_ok && app_ok) {
        warn!(
            "bad auth: token={:?}, app_id={:?}",
            token.map(mask),
            app_id
        );
        return false;
    }
    true
}

/// Show only enough of a token to correlate log lines
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 4 {
        let prefix: String = chars[..4].iter().collect();
        format!("{}...", prefix)
    } else {
        "***".to_string()
    }
}

/// Constant-time byte comparison (prevents timing side-channels)
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
