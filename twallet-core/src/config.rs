//! Client configuration: service location, HTTP defaults and activation polling bounds.
use std::time::Duration;

use crate::error::TwalletError;

/// Base URL of the issuer sandbox operated by the Ministry of Digital Affairs.
pub const SANDBOX_BASE_URL: &str = "https://issuer-sandbox.wallet.gov.tw";

/// Bounds of an activation polling session.
///
/// The poller checks the instance status once per `interval` and abandons the
/// session once `ceiling` worth of ticks have been spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    interval: Duration,
    ceiling: Duration,
}

impl PollConfig {
    /// Default spacing between two status checks.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
    /// Default total time a session may spend polling.
    pub const DEFAULT_CEILING: Duration = Duration::from_secs(300);

    /// Creates a polling configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TwalletError::InvalidInput`] if `interval` is zero.
    pub fn new(interval: Duration, ceiling: Duration) -> Result<Self, TwalletError> {
        if interval.is_zero() {
            return Err(TwalletError::invalid_input(
                "poll_interval",
                "interval must be greater than zero",
            ));
        }
        Ok(Self { interval, ceiling })
    }

    /// Spacing between two status checks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Total polling budget.
    #[must_use]
    pub const fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Number of status checks a session performs before timing out.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        let interval = self.interval.as_nanos();
        let attempts = self.ceiling.as_nanos().div_ceil(interval);
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            ceiling: Self::DEFAULT_CEILING,
        }
    }
}

/// Configuration of an [`crate::CardIssuer`].
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Scheme and host of the issuer service, without a trailing slash.
    pub base_url: String,
    /// Timeout applied to every HTTP exchange.
    pub request_timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Bounds of the activation sessions started by instance creation.
    pub polling: PollConfig,
}

impl IssuerConfig {
    /// Replaces the base URL, e.g. to target a mock server or another deployment.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Replaces the activation polling bounds.
    #[must_use]
    pub const fn with_polling(mut self, polling: PollConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Replaces the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            base_url: SANDBOX_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("twallet-core/{}", env!("CARGO_PKG_VERSION")),
            polling: PollConfig::default(),
        }
    }
}
