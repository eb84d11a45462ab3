use std::time::Duration;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};

use crate::error::TwalletError;

const ACCEPT: &str = "application/json, text/plain, */*";

/// Raw outcome of a single HTTP exchange.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub(crate) url: String,
    pub(crate) status: u16,
    pub(crate) body: Vec<u8>,
}

/// A thin wrapper on an HTTP client for talking to the issuer service. Applies the
/// timeout, user-agent and authentication headers every endpoint expects.
///
/// Failed exchanges are never retried; the caller decides what to do with the error.
#[derive(Debug)]
pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
    user_agent: String,
}

impl Request {
    /// Initializes a new `Request` instance.
    pub(crate) fn new(timeout: Duration, user_agent: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            user_agent: user_agent.to_string(),
        }
    }

    /// Performs one authenticated exchange. A `body` is always sent as JSON.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: &str,
        access_token: &SecretString,
        body: Option<Vec<u8>>,
    ) -> Result<RawResponse, TwalletError> {
        let mut request_builder = self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .header("User-Agent", &self.user_agent)
            .header("accept", ACCEPT)
            .header("access-token", access_token.expose_secret());

        if let Some(body) = body {
            request_builder = request_builder
                .header("content-type", "application/json")
                .body(body);
        }

        let response =
            request_builder
                .send()
                .await
                .map_err(|err| TwalletError::Transport {
                    url: url.to_string(),
                    error: format!("failed to send request: {err}"),
                })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| TwalletError::Transport {
                url: url.to_string(),
                error: format!("failed to read response body: {err}"),
            })?;

        Ok(RawResponse {
            url: url.to_string(),
            status,
            body: body.to_vec(),
        })
    }
}
