//! Space-Track HTTP client.
//!
//! Request flow for a query:
//!
//! ```text
//! generic_request(class, query)
//!   ├─ validate class and stream flags   (no network)
//!   ├─ AuthGate::ensure_authenticated    (single-flight login)
//!   ├─ PredicateCache::get_or_fetch      (single-flight modeldef GET)
//!   ├─ build_query_url                   (field validation)
//!   ├─ RateLimitedRetry middleware       (limiter + one retry)
//!   ├─ check_status                      (error mapping)
//!   └─ decode_response                   (JSON / raw / lines / chunks)
//! ```

use crate::auth::AuthGate;
use crate::cache::PredicateCache;
use crate::classes;
use crate::config::{ClientConfig, ClientConfigBuilder};
use crate::error::Result;
use crate::middleware::RateLimitedRetry;
use crate::ratelimit::RateLimiter;
use crate::request::{build_query_url, class_endpoint, Query};
use crate::response::{check_status, decode_response, parse_json, QueryResponse};
use crate::types::{parse_predicates, ModelDefResponse, Predicate};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Response;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::sync::Arc;
use tracing::Instrument;
use url::Url;

/// Space-Track client with login gating, predicate validation and rate
/// limiting.
///
/// The underlying connection pool is released when the client is dropped or
/// [`close`](Self::close)d.
pub struct SpaceTrackClient {
    http: ClientWithMiddleware,
    config: ClientConfig,
    base: Url,
    limiter: Arc<RateLimiter>,
    auth: AuthGate,
    predicates: PredicateCache,
    span: tracing::Span,
}

impl SpaceTrackClient {
    /// Create a new configuration builder with the given credentials.
    pub fn builder(identity: impl Into<String>, password: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(identity, password)
    }

    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let base = config.base()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("spacetrack-client")),
        );

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let reqwest_client = builder.build()?;

        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_calls,
            config.rate_limit_period,
            config.rate_limit_callback.clone(),
        ));

        let http = ClientBuilder::new(reqwest_client)
            .with(RateLimitedRetry::new(limiter.clone()))
            .build();

        let span = config.span.clone().unwrap_or_else(|| {
            tracing::info_span!("spacetrack_client", base_url = %config.base_url)
        });

        Ok(Self {
            http,
            config,
            base,
            limiter,
            auth: AuthGate::new(),
            predicates: PredicateCache::new(),
            span,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get the configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the shared rate limiter.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Whether the login exchange has succeeded.
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// Log in unless already authenticated.
    ///
    /// Query operations call this themselves; calling it explicitly is only
    /// useful to surface bad credentials early.
    pub async fn authenticate(&self) -> Result<()> {
        self.ensure_authenticated()
            .instrument(self.span.clone())
            .await
    }

    /// Get the predicates of a request class, fetching them on first use.
    pub async fn get_predicates(&self, class: &str) -> Result<Arc<[Predicate]>> {
        self.predicates_for(class)
            .instrument(self.span.clone())
            .await
    }

    /// Run a query against any request class.
    ///
    /// The shape of the result depends on the query: a stream for
    /// `iter_lines` / `iter_content`, raw text when a `format` predicate is
    /// given, raw bytes for binary classes, parsed JSON otherwise.
    pub async fn generic_request(&self, class: &str, query: Query) -> Result<QueryResponse> {
        async move {
            let mode = query.validate_for_class(class)?;

            self.ensure_authenticated().await?;
            let predicates = self.predicates_for(class).await?;

            let url = build_query_url(
                &self.base,
                class,
                &query,
                predicates.iter().map(|p| p.name.as_str()),
                self.config.value_formatter.as_ref(),
            )?;

            let response = self.get(url).await?;
            decode_response(
                response,
                mode,
                classes::is_text_class(class),
                self.config.chunk_size,
            )
            .await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Release the client and its connections.
    pub fn close(self) {
        let _enter = self.span.enter();
        tracing::debug!("Closing client");
    }

    async fn ensure_authenticated(&self) -> Result<()> {
        self.auth
            .ensure_authenticated(
                &self.http,
                &self.base,
                &self.config.identity,
                &self.config.password,
            )
            .await
    }

    async fn predicates_for(&self, class: &str) -> Result<Arc<[Predicate]>> {
        classes::controller_for(class)?;
        self.predicates
            .get_or_fetch(class, || self.download_predicates(class))
            .await
    }

    async fn download_predicates(&self, class: &str) -> Result<Vec<Predicate>> {
        self.ensure_authenticated().await?;

        let url = class_endpoint(&self.base, "modeldef", class)?;
        let response = self.get(url).await?;
        let body = response.bytes().await?;

        let modeldef: ModelDefResponse = parse_json(&body)?;

        parse_predicates(modeldef.data)
    }

    /// Rate-limited GET followed by status mapping.
    async fn get(&self, url: Url) -> Result<Response> {
        let start = std::time::Instant::now();

        tracing::debug!(url = %url, "Sending request");

        let response = self.http.get(url.clone()).send().await?;

        tracing::debug!(
            url = %url,
            status = %response.status().as_u16(),
            duration_ms = %start.elapsed().as_millis(),
            "Received response"
        );

        check_status(response).await
    }
}

impl std::fmt::Debug for SpaceTrackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpaceTrackClient")
            .field("config", &self.config)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

macro_rules! request_class_methods {
    ($($class:ident),* $(,)?) => {
        impl SpaceTrackClient {
            $(
                #[doc = concat!("Query the `", stringify!($class), "` request class.")]
                pub async fn $class(&self, query: Query) -> Result<QueryResponse> {
                    self.generic_request(stringify!($class), query).await
                }
            )*
        }
    };
}

request_class_methods!(
    announcement,
    boxscore,
    cdm_public,
    decay,
    gp,
    gp_history,
    launch_site,
    omm,
    satcat,
    satcat_change,
    satcat_debut,
    tip,
    tle,
    tle_latest,
    tle_publish,
    car,
    cdm,
    maneuver,
    maneuver_history,
    organization,
    satellite,
    delete,
    download,
    file,
    folder,
    file_history,
);

/// Arc-wrapped client for shared ownership.
pub type SharedClient = Arc<SpaceTrackClient>;
