//! Rate-limited GET with a single retry on false rate-limit violations.
//!
//! Space-Track may answer HTTP 500 with a "query rate limit" error page when
//! a previous process was interrupted mid-wait and a new one started before
//! the server-side window reset. Only that exact condition is retried, once,
//! after sleeping a full rate-limit period.

use crate::ratelimit::{wall_clock_after, RateLimiter};
use http::Extensions;
use reqwest::{Method, Request, Response, ResponseBuilderExt, StatusCode};
use reqwest_middleware::{Middleware, Next, Result};
use std::sync::Arc;

/// Marker Space-Track includes in the body of a rate-limit violation.
pub const RATE_LIMIT_VIOLATION_MARKER: &str = "violated your query rate limit";

/// Middleware gating GET requests on a [`RateLimiter`].
///
/// Requests with any other method pass straight through.
#[derive(Debug, Clone)]
pub struct RateLimitedRetry {
    limiter: Arc<RateLimiter>,
}

impl RateLimitedRetry {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait::async_trait]
impl Middleware for RateLimitedRetry {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if req.method() != Method::GET {
            return next.run(req, extensions).await;
        }

        let retry_req = req.try_clone();

        self.limiter.acquire().await;
        let response = next.clone().run(req, extensions).await?;

        if response.status() != StatusCode::INTERNAL_SERVER_ERROR {
            return Ok(response);
        }

        let (response, violated) = inspect_server_error(response).await?;
        let Some(retry_req) = retry_req.filter(|_| violated) else {
            return Ok(response);
        };

        let period = self.limiter.period();
        tracing::warn!(
            url = %retry_req.url(),
            period_secs = period.as_secs_f64(),
            "Space-Track reported a query rate limit violation, retrying once"
        );

        self.limiter.spawn_notify_wait(wall_clock_after(period));
        tokio::time::sleep(period).await;

        self.limiter.acquire().await;
        next.run(retry_req, extensions).await
    }
}

/// Buffer a 500 response body and look for the rate-limit marker.
///
/// The returned response carries the same status, URL, headers and body so
/// the caller can still map it to an error.
async fn inspect_server_error(response: Response) -> Result<(Response, bool)> {
    let status = response.status();
    let version = response.version();
    let url = response.url().clone();
    let headers = response.headers().clone();
    let body = response.bytes().await?;

    let violated = String::from_utf8_lossy(&body).contains(RATE_LIMIT_VIOLATION_MARKER);

    let mut rebuilt = http::Response::builder()
        .status(status)
        .version(version)
        .url(url)
        .body(body)
        .map_err(reqwest_middleware::Error::middleware)?;
    *rebuilt.headers_mut() = headers;

    Ok((Response::from(rebuilt), violated))
}
