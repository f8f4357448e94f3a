//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "JSON-over-HTTP transport shared by the backend clients."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ems_common::BackendConfig;
use ems_intake::{ApiError, Reply};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

/// Cookie-preserving JSON client rooted at a base URL.
#[derive(Debug, Clone)]
pub struct JsonTransport {
    client: Client,
    cookies: Arc<Jar>,
    base: Url,
}

impl JsonTransport {
    pub fn new(base: Url, timeout: Option<Duration>, user_agent: &str) -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let mut builder = Client::builder()
            .cookie_provider(cookies.clone())
            .user_agent(user_agent.to_owned());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("building HTTP client")?;
        Ok(Self {
            client,
            cookies,
            base,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(
            config.base_url()?,
            config.request_timeout,
            &config.user_agent,
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Cookies currently held for the base URL, in `Cookie` header form.
    pub fn session_cookies(&self) -> Option<String> {
        self.cookies
            .cookies(&self.base)
            .and_then(|value| value.to_str().ok().map(str::to_owned))
    }

    /// Seed the jar from a `Cookie` header value previously returned by
    /// [`JsonTransport::session_cookies`].
    pub fn restore_cookies(&self, header: &str) {
        for pair in header.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
            self.cookies.add_cookie_str(pair, &self.base);
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> std::result::Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|err| ApiError::Transport(format!("invalid endpoint '{path}': {err}")))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.execute(self.client.get(url)).await
    }

    /// POST without a body.
    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.execute(self.client.post(url)).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        self.execute(self.client.post(url).json(body)).await
    }

    /// Any body shaped like `{"error": ...}` is a backend error regardless of
    /// the HTTP status; anything else that fails to decode is a transport error.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        let status = response.status();
        let url = response.url().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        debug!(%url, %status, bytes = bytes.len(), "backend response");
        match serde_json::from_slice::<Reply<T>>(&bytes) {
            Ok(reply) => reply.into_result(),
            Err(err) => Err(ApiError::Transport(format!(
                "undecodable response from {url} (HTTP {status}): {err}"
            ))),
        }
    }
}
