//! HTTP client module
//!
//! Provides the resilient request primitive shared by the search and
//! detail stages.
//!
//! # Features
//!
//! - **Automatic Retries**: 429, 5xx and connection failures are retried under a `RetryPolicy`
//! - **Credential Refresh**: a 401 triggers exactly one token refresh before failing
//! - **Rate Limiting**: Token bucket rate limiter using governor, shared by every attempt
//! - **Call Accounting**: every attempt is counted on a shared `CallCounter`

mod client;
mod rate_limit;
mod retry;

pub use client::{CallCounter, HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::{RetryContext, RetryPolicy};
