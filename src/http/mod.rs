//! HTTP client module
//!
//! Provides the HTTP client used by source adapters and the shared rate
//! limiter used by every retrieval operation.
//!
//! # Features
//!
//! - **Automatic Retries**: Configurable retry logic with backoff
//! - **Rate Limiting**: Minimum-interval limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestBody, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
