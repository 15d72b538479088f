//! Shared HTTP plumbing for quantfeed provider connectors: a sliding-window
//! rate limiter and a retrying JSON client built on top of it.
#![warn(missing_docs)]

mod rate;
mod retry;

pub use rate::RateLimiter;
pub use retry::RetryingClient;
