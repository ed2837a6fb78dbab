use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

/// Client for an OpenAI-compatible chat completions endpoint.
///
/// Requests go to `<base_url>/chat/completions`; the base carries any version
/// segment the provider uses (`/v1`, `/api/v3`, `/v1beta/openai`).
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    pub base_url: String,
    pub api_key: String,
    pub(crate) inner: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            inner,
        })
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            format!("Bearer {}", self.api_key)
                .parse()
                .context("api key is not a valid header value")?,
        );
        Ok(headers)
    }
}
