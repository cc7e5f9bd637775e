use anyhow::anyhow;
use serde::Deserialize;
use std::error::Error as StdError;
use std::fmt;
use std::io::ErrorKind;

fn error_chain_matches(err: &(dyn StdError + 'static), kind: ErrorKind, needle: &str) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::TimedOut, "timed out")
}

pub(crate) fn api_request_error(
    err: reqwest::Error,
    api_url: &str,
    connect_timeout_secs: u64,
) -> anyhow::Error {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        return anyhow!(
            "Gemini request timed out while calling '{}' (connect timeout {}s). \
             Increase MODEL_CONNECT_TIMEOUT_SECS or check your network.",
            api_url,
            connect_timeout_secs
        );
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(&err) {
            return anyhow!(
                "Connection refused by Gemini API at '{}'. Check GEMINI_BASE_URL.",
                api_url
            );
        }

        return anyhow!(
            "Failed to connect to Gemini API at '{}'. \
             Check GEMINI_BASE_URL and network connectivity.",
            api_url
        );
    }

    anyhow!("Failed to call Gemini API at '{}': {}", api_url, err)
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub(crate) code: u16,
    #[serde(default)]
    pub(crate) message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiStatusError {
    status: u16,
    detail: String,
}

impl ApiStatusError {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn from_body(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|envelope| envelope.error.message)
            .ok()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| body.trim().to_string());
        Self::new(status, detail)
    }

    pub(crate) fn from_detail(detail: ErrorDetail) -> Self {
        Self::new(detail.code, detail.message)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// True when the stored API key or model name is the likely cause.
    pub fn invalidates_credentials(&self) -> bool {
        matches!(self.status, 400 | 403 | 404)
    }
}

impl fmt::Display for ApiStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            400 | 403 => write!(
                f,
                "Invalid API key or argument ({}): {}",
                self.status, self.detail
            ),
            404 => write!(f, "Invalid model name ({}): {}", self.status, self.detail),
            429 => write!(f, "Rate limit exceeded. Try again later. ({})", self.detail),
            status => write!(f, "API error ({}): {}", status, self.detail),
        }
    }
}

impl StdError for ApiStatusError {}
