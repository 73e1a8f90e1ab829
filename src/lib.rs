//! Ratewarden - IP and token based rate limiting service
//!
//! This crate decides, per request, whether to admit or reject traffic based
//! on a per-identity request budget. Counters live in a shared key-value
//! store (Redis in production), identities that exceed their budget are
//! blocked for a cool-down period, and a background sweeper periodically
//! clears all stored counters.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod storage;
