//! Incident portal rate limiter.
//!
//! Request handlers for the incident reporting portal consult a
//! [`RateLimiter`](ratelimit::RateLimiter) before performing rate-limited
//! actions such as logins or report submissions. The limiter uses fixed,
//! lazily rolled windows kept in process memory.

pub mod config;
pub mod error;
pub mod ratelimit;
