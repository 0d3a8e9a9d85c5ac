//! Configuration for the client.

use std::time::Duration;

/// Records requested per search page.
pub const DEFAULT_PAGE_SIZE: u32 = 250;

/// How child resources get linked to a new dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachStrategy {
    /// Create the dataset, then create each resource with a reference back
    /// to it. The only strategy the current server needs.
    #[default]
    DatasetFirst,
    /// Dataset first, then one update listing every resource by nid.
    PostHoc,
    /// Dataset first, then the same update repeated once per resource,
    /// tolerating failures. Bounded by [`RetryConfig::max_attempts`].
    PostHocRepeated,
    /// Dataset first, then one update per resource.
    PostHocSingle,
}

/// Session credentials for mutating requests.
///
/// The client carries its own session so several sessions can be used side
/// by side.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Session cookie name.
    pub cookie_name: String,
    /// Session cookie value.
    pub cookie_value: String,
    /// Anti-forgery token sent as `X-CSRF-Token`.
    pub csrf_token: String,
}

impl Session {
    /// Creates a session.
    pub fn new(
        cookie_name: impl Into<String>,
        cookie_value: impl Into<String>,
        csrf_token: impl Into<String>,
    ) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            cookie_value: cookie_value.into(),
            csrf_token: csrf_token.into(),
        }
    }

    /// A session with no credentials, for read-only use.
    pub fn anonymous() -> Self {
        Self::new("", "", "")
    }

    /// Returns the cookie pair, if any.
    pub fn cookie(&self) -> Option<(String, String)> {
        (!self.cookie_name.is_empty())
            .then(|| (self.cookie_name.clone(), self.cookie_value.clone()))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("cookie_name", &self.cookie_name)
            .field("cookie_value", &"<redacted>")
            .field("csrf_token", &"<redacted>")
            .finish()
    }
}

/// Configuration for client operations.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL scheme (`https` or `http`).
    pub protocol: String,
    /// Repository host name.
    pub host: String,
    /// Records requested per search page.
    pub page_size: u32,
    /// Strip trailing diagnostic markup from responses before decoding.
    pub resilience_mode: bool,
    /// How resources are linked to new datasets.
    pub attach_strategy: AttachStrategy,
    /// Attempt bound and spacing for the legacy repeated attach update.
    pub retry: RetryConfig,
    /// Request timeout, honored by transports that support one.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a new client configuration.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            protocol: "https".to_string(),
            host: host.into(),
            page_size: DEFAULT_PAGE_SIZE,
            resilience_mode: false,
            attach_strategy: AttachStrategy::default(),
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Sets the URL scheme.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Sets the search page size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Enables or disables resilience mode.
    pub fn with_resilience_mode(mut self, enabled: bool) -> Self {
        self.resilience_mode = enabled;
        self
    }

    /// Sets the resource attach strategy.
    pub fn with_attach_strategy(mut self, strategy: AttachStrategy) -> Self {
        self.attach_strategy = strategy;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns `{protocol}://{host}`.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.host)
    }

    /// Returns the node collection endpoint.
    pub fn node_url(&self) -> String {
        format!("{}/api/dataset/node", self.base_url())
    }

    /// Returns the endpoint of a single node.
    pub fn node_item_url(&self, nid: &str) -> String {
        format!("{}/{}", self.node_url(), nid)
    }

    /// Returns the search endpoint (without query string).
    pub fn search_url(&self) -> String {
        format!("{}/search-service/search_api/datasets", self.base_url())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("datacatalog.worldbank.org")
    }
}

/// Bounds and pacing for the repeated legacy attach update.
///
/// The pause before attempt `n` is `initial_delay * 2^(n-1)`, capped at
/// `max_delay`; the first attempt goes out immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Upper bound on update attempts.
    pub max_attempts: u32,
    /// Pause before the second attempt.
    pub initial_delay: Duration,
    /// Longest pause between two attempts.
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Allows up to `max_attempts` attempts with the default pacing.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    /// A single attempt, no pauses.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Sets the pause before the second attempt.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Caps every pause.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Pause before the given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(doublings) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let factor = 1u32.checked_shl(doublings).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5)
    }
}
