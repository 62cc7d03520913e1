//! Client-side rate limiter mirroring Space-Track's request quota.
//!
//! A rolling window of acquisition instants is kept; once `max_calls`
//! acquisitions fall inside the last `period`, the next caller waits until the
//! oldest one leaves the window. Waiters are served in FIFO order.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Callback fired with the wall-clock instant the next request slot opens.
pub type RateLimitCallback = Arc<dyn Fn(DateTime<Utc>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Rolling-window rate limiter.
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
    callback: Option<RateLimitCallback>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_calls` per `period`.
    pub fn new(max_calls: usize, period: Duration, callback: Option<RateLimitCallback>) -> Self {
        Self {
            max_calls: max_calls.max(1),
            period,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
            callback,
        }
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for a free slot and claim it.
    pub async fn acquire(&self) {
        let mut calls = self.calls.lock().await;
        loop {
            let now = Instant::now();
            while calls
                .front()
                .is_some_and(|oldest| now.duration_since(*oldest) >= self.period)
            {
                calls.pop_front();
            }

            if calls.len() < self.max_calls {
                calls.push_back(now);
                return;
            }

            // Window is full; the oldest call decides when the next slot opens
            let Some(oldest) = calls.front().copied() else {
                continue;
            };
            let resume_at = oldest + self.period;
            let wait = resume_at.saturating_duration_since(now);
            self.notify_wait(wall_clock_after(wait)).await;
            tokio::time::sleep_until(resume_at).await;
        }
    }

    /// Log the wait and run the callback to completion.
    pub async fn notify_wait(&self, until: DateTime<Utc>) {
        log_wait(until);
        if let Some(callback) = &self.callback {
            callback(until).await;
        }
    }

    /// Log the wait and run the callback on a detached task.
    pub fn spawn_notify_wait(&self, until: DateTime<Utc>) {
        log_wait(until);
        if let Some(callback) = &self.callback {
            tokio::spawn(callback(until));
        }
    }

    /// Number of acquisitions currently inside the window.
    pub async fn in_window(&self) -> usize {
        let calls = self.calls.lock().await;
        let now = Instant::now();
        calls
            .iter()
            .filter(|t| now.duration_since(**t) < self.period)
            .count()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_calls", &self.max_calls)
            .field("period", &self.period)
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

/// Wall-clock instant `wait` from now.
pub(crate) fn wall_clock_after(wait: Duration) -> DateTime<Utc> {
    let wait = chrono::Duration::from_std(wait).unwrap_or(chrono::Duration::zero());
    Utc::now() + wait
}

fn log_wait(until: DateTime<Utc>) {
    let seconds = (until - Utc::now()).num_milliseconds().max(0) as f64 / 1000.0;
    tracing::info!(
        until = %until,
        "Rate limit reached. Sleeping for {:.0} seconds.",
        seconds
    );
}
