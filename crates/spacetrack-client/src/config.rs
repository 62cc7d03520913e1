//! Client configuration and builder pattern.

use crate::error::{ClientError, Result};
use crate::operators::{SpaceTrackFormatter, ValueFormatter};
use crate::ratelimit::RateLimitCallback;
use crate::stream::DEFAULT_CHUNK_SIZE;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default Space-Track endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.space-track.org/";

/// Space-Track's documented per-minute query quota.
pub const DEFAULT_RATE_LIMIT_CALLS: usize = 30;

/// Window of the default quota.
pub const DEFAULT_RATE_LIMIT_PERIOD: Duration = Duration::from_secs(60);

/// Configuration for the Space-Track client.
///
/// # Security
///
/// The `Debug` implementation masks the password to prevent accidental
/// exposure in logs.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the Space-Track API, always ending in `/`
    pub base_url: String,
    /// Space-Track username
    pub identity: String,
    /// Space-Track password
    pub password: String,
    /// Maximum requests per rate-limit period (default: 30)
    pub rate_limit_calls: usize,
    /// Rate-limit period (default: 60 seconds)
    pub rate_limit_period: Duration,
    /// Called with the resume instant whenever a request has to wait
    pub rate_limit_callback: Option<RateLimitCallback>,
    /// Chunk size for chunk streaming (default: 100 KiB)
    pub chunk_size: usize,
    /// Request timeout (default: none)
    pub timeout: Option<Duration>,
    /// User-Agent header value
    pub user_agent: String,
    /// Renders predicate values into URL segments
    pub value_formatter: Arc<dyn ValueFormatter>,
    /// Span that client log events are recorded under
    pub span: Option<tracing::Span>,
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder(identity: impl Into<String>, password: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(identity, password)
    }

    /// Minimum allowed timeout value.
    pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.identity.is_empty() {
            return Err(ClientError::Config("identity cannot be empty".to_string()));
        }

        if self.base_url.is_empty() {
            return Err(ClientError::Config("base_url cannot be empty".to_string()));
        }

        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("Invalid base_url: {}", e)))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "base_url cannot be used as a base: {}",
                self.base_url
            )));
        }

        if self.rate_limit_calls == 0 {
            return Err(ClientError::Config(
                "rate_limit_calls must be > 0".to_string(),
            ));
        }

        if self.rate_limit_period.is_zero() {
            return Err(ClientError::Config(
                "rate_limit_period must be > 0".to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(ClientError::Config("chunk_size must be > 0".to_string()));
        }

        if let Some(timeout) = self.timeout {
            if timeout < Self::MIN_TIMEOUT {
                return Err(ClientError::Config(format!(
                    "timeout ({:?}) must be >= {:?}",
                    timeout,
                    Self::MIN_TIMEOUT
                )));
            }
        }

        Ok(())
    }

    /// Parsed base URL, with its path ending in `/` so joins keep every
    /// segment.
    pub(crate) fn base(&self) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("Invalid base_url: {}", e)))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("identity", &self.identity)
            .field("password", &"***REDACTED***")
            .field("rate_limit_calls", &self.rate_limit_calls)
            .field("rate_limit_period", &self.rate_limit_period)
            .field(
                "rate_limit_callback",
                &self.rate_limit_callback.as_ref().map(|_| "<callback>"),
            )
            .field("chunk_size", &self.chunk_size)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("value_formatter", &self.value_formatter)
            .finish()
    }
}

/// Builder for client configuration.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with the given credentials.
    pub fn new(identity: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                identity: identity.into(),
                password: password.into(),
                rate_limit_calls: DEFAULT_RATE_LIMIT_CALLS,
                rate_limit_period: DEFAULT_RATE_LIMIT_PERIOD,
                rate_limit_callback: None,
                chunk_size: DEFAULT_CHUNK_SIZE,
                timeout: None,
                user_agent: format!("spacetrack-client/{}", env!("CARGO_PKG_VERSION")),
                value_formatter: Arc::new(SpaceTrackFormatter),
                span: None,
            },
        }
    }

    /// Set the base URL. A trailing `/` is added if missing.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.is_empty() && !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.config.base_url = base_url;
        self
    }

    /// Allow at most `max_calls` requests per `period`.
    pub fn rate_limit(mut self, max_calls: usize, period: Duration) -> Self {
        self.config.rate_limit_calls = max_calls;
        self.config.rate_limit_period = period;
        self
    }

    /// Run `callback` with the resume instant whenever a request must wait.
    pub fn on_rate_limit<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(DateTime<Utc>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.config.rate_limit_callback = Some(Arc::new(move |until| callback(until).boxed()));
        self
    }

    /// Set the chunk size used for chunk streaming.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set a custom User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Replace the predicate value formatter.
    pub fn value_formatter(mut self, formatter: impl ValueFormatter + 'static) -> Self {
        self.config.value_formatter = Arc::new(formatter);
        self
    }

    /// Record client log events under `span` instead of the default one.
    pub fn span(mut self, span: tracing::Span) -> Self {
        self.config.span = Some(span);
        self
    }

    /// Build the configuration, validating all settings.
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
