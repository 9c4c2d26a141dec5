//! Outbound HTTP helpers shared by every adapter.
//!
//! Each call is attempted exactly once. Non-success statuses become
//! [`SourceError::Status`]; bodies that are not valid JSON are logged with a
//! short preview before being returned as [`SourceError::Parse`].

use std::time::Duration;

use crate::SourceError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Builds the HTTP client shared by all adapters.
///
/// # Errors
///
/// Returns [`SourceError`] if the TLS backend cannot be initialized.
pub fn client() -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("response-planner/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .build()?)
}

/// Sends a GET request and parses the response body as JSON.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails, the server returns a
/// non-success status, or the body is not valid JSON.
pub async fn get_json(
    client: &reqwest::Client,
    url: &str,
    label: &str,
) -> Result<serde_json::Value, SourceError> {
    log::debug!("{label}: GET {url}");

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|json_err| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::debug!(
            "{label}: JSON parse failed\n  \
             url: {url}\n  \
             content-type: {content_type:?}\n  \
             received: {} bytes\n  \
             body preview: {preview}",
            text.len(),
        );
        SourceError::Parse {
            message: format!(
                "JSON parse failed: {json_err} (received {} bytes, content-type={content_type:?})",
                text.len()
            ),
        }
    })
}
