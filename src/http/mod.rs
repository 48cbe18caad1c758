//! Polite HTTP fetch layer: robots registry (C1), rate-limited retrying
//! client (C2), and SSRF-safe URL validation.

pub mod client;
pub mod robots;
pub mod security;

pub use client::{FetchContext, FetchResponse, RateLimitedClient};
pub use robots::RobotsRegistry;
pub use security::UrlGuard;
