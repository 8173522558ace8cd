use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Placeholder replaced by the percent-encoded target URL in a relay template.
const URL_PLACEHOLDER: &str = "{url}";

/// Errors from fetching a document through the relay list.
///
/// Every variant except [`FetchError::AllRelaysFailed`] describes why a single
/// relay was rejected; `fetch_raw` surfaces the one from the last relay tried.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, body read)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Relay answered with a non-2xx status
    #[error("HTTP {0}")]
    HttpStatus(u16),
    /// Wrapped-JSON relay returned a body that is not the expected JSON object
    #[error("Invalid relay response: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// Wrapped-JSON relay returned no usable `contents` field
    #[error("No contents in response")]
    MissingContents,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// No relay produced a specific error (the relay list is empty)
    #[error("All relays failed")]
    AllRelaysFailed,
}

/// How a relay hands back the fetched document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseShape {
    /// JSON body with the document as a string under `contents`.
    WrappedJson,
    /// The body is the document itself.
    RawText,
}

/// One relay endpoint.
///
/// `endpoint_template` either contains `{url}` or ends where the encoded
/// target URL should be appended (e.g. `https://relay.example/get?url=`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub endpoint_template: String,
    pub response_shape: ResponseShape,
}

impl RelayConfig {
    pub fn wrapped_json(endpoint_template: impl Into<String>) -> Self {
        Self {
            endpoint_template: endpoint_template.into(),
            response_shape: ResponseShape::WrappedJson,
        }
    }

    pub fn raw_text(endpoint_template: impl Into<String>) -> Self {
        Self {
            endpoint_template: endpoint_template.into(),
            response_shape: ResponseShape::RawText,
        }
    }

    /// Builds the request URL for fetching `target` through this relay.
    pub fn request_url(&self, target: &str) -> String {
        let encoded = encode_component(target);
        if self.endpoint_template.contains(URL_PLACEHOLDER) {
            self.endpoint_template.replace(URL_PLACEHOLDER, &encoded)
        } else {
            format!("{}{}", self.endpoint_template, encoded)
        }
    }
}

/// The public relays used when the config file does not list any.
pub fn default_relays() -> Vec<RelayConfig> {
    vec![
        RelayConfig::wrapped_json("https://api.allorigins.win/get?url="),
        RelayConfig::raw_text("https://api.codetabs.com/v1/proxy?quest="),
        RelayConfig::raw_text("https://thingproxy.freeboard.io/fetch/"),
    ]
}

/// Percent-encodes a URL so it survives as a single query value or path segment.
fn encode_component(s: &str) -> String {
    // byte_serialize writes spaces as '+', which relays would pass through literally
    url::form_urlencoded::byte_serialize(s.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[derive(Deserialize)]
struct WrappedBody {
    contents: Option<String>,
}

/// Fetches raw documents through an ordered list of relays.
///
/// Relays are tried strictly in order, one attempt each; the first success
/// wins and no later relay is contacted. The relay list is fixed at
/// construction and never changes afterwards.
#[derive(Debug, Clone)]
pub struct RelayFetcher {
    client: reqwest::Client,
    relays: Vec<RelayConfig>,
}

impl RelayFetcher {
    pub fn new(client: reqwest::Client, relays: Vec<RelayConfig>) -> Self {
        Self { client, relays }
    }

    pub fn relays(&self) -> &[RelayConfig] {
        &self.relays
    }

    /// Returns the text of `url` from the first relay that delivers it.
    ///
    /// # Errors
    ///
    /// When every relay fails, returns the error from the last relay tried, or
    /// [`FetchError::AllRelaysFailed`] if there are no relays at all.
    pub async fn fetch_raw(&self, url: &str) -> Result<String, FetchError> {
        let mut last_error = None;

        for relay in &self.relays {
            match self.fetch_via(relay, url).await {
                Ok(text) => {
                    tracing::debug!(
                        relay = %relay.endpoint_template,
                        target = %url,
                        bytes = text.len(),
                        "Relay fetch succeeded"
                    );
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(
                        relay = %relay.endpoint_template,
                        target = %url,
                        error = %e,
                        "Relay fetch failed, trying next relay"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(FetchError::AllRelaysFailed))
    }

    async fn fetch_via(&self, relay: &RelayConfig, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(relay.request_url(url)).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let body = read_limited_text(response, MAX_FEED_SIZE).await?;

        match relay.response_shape {
            ResponseShape::RawText => Ok(body),
            ResponseShape::WrappedJson => {
                let wrapped: WrappedBody = serde_json::from_str(&body)?;
                wrapped
                    .contents
                    .filter(|c| !c.is_empty())
                    .ok_or(FetchError::MissingContents)
            }
        }
    }
}

async fn read_limited_text(response: reqwest::Response, limit: usize) -> Result<String, FetchError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // Feeds in legacy encodings still get through, with replacement characters
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
