//! Space-Track Client SDK
//!
//! A Rust HTTP client for the [Space-Track](https://www.space-track.org/)
//! catalog query API.
//!
//! # Features
//!
//! - **Session Login**: Logs in once on first use; concurrent callers share the attempt
//! - **Predicate Validation**: Query fields are checked against each class's model definition
//! - **Rate Limiting**: Client-side quota plus one automatic retry on a server-side violation
//! - **Streaming**: Line-by-line or fixed-size chunk iteration over large responses
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use spacetrack_client::{operators, ClientConfig, Query, SpaceTrackClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SpaceTrackClient::new(
//!         ClientConfig::builder("user@example.com", "password")
//!             .on_rate_limit(|until| async move {
//!                 println!("Sleeping until {}", until);
//!             })
//!             .build()?,
//!     )?;
//!
//!     // Latest element set for the ISS
//!     let iss = client
//!         .gp(Query::new()
//!             .predicate("norad_cat_id", 25544)
//!             .predicate("orderby", "epoch desc")
//!             .predicate("limit", 1))
//!         .await?
//!         .into_json()?;
//!     println!("{}", iss);
//!
//!     // Recent decays as raw TLE text
//!     let tle = client
//!         .decay(Query::new()
//!             .predicate("decay_epoch", operators::greater_than("now-30"))
//!             .predicate("format", "tle"))
//!         .await?
//!         .into_text()?;
//!     println!("{}", tle);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Streaming
//!
//! ```rust,ignore
//! use futures::StreamExt;
//!
//! let mut lines = client
//!     .tle_latest(Query::new().predicate("ordinal", 1).predicate("format", "3le").iter_lines())
//!     .await?
//!     .into_lines()?;
//! while let Some(line) = lines.next().await {
//!     println!("{}", line?);
//! }
//! ```
//!
//! Dropping a stream releases the underlying connection.

mod auth;
mod cache;
pub mod classes;
mod client;
mod config;
mod error;
mod middleware;
pub mod operators;
mod ratelimit;
mod request;
mod response;
mod stream;
mod types;

pub use auth::AuthGate;
pub use cache::PredicateCache;
pub use client::{SharedClient, SpaceTrackClient};
pub use config::{
    ClientConfig, ClientConfigBuilder, DEFAULT_BASE_URL, DEFAULT_RATE_LIMIT_CALLS,
    DEFAULT_RATE_LIMIT_PERIOD,
};
pub use error::{ClientError, HttpError, HttpErrorKind, Result};
pub use middleware::{RateLimitedRetry, RATE_LIMIT_VIOLATION_MARKER};
pub use operators::{PredicateValue, SpaceTrackFormatter, ValueFormatter};
pub use ratelimit::{RateLimitCallback, RateLimiter};
pub use request::{build_query_url, OutputMode, Query};
pub use response::{check_status, QueryResponse};
pub use stream::{Chunk, ChunkStream, EncodingResolver, LineStream, DEFAULT_CHUNK_SIZE};
pub use types::{Predicate, PredicateType};
