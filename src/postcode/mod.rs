//! Request-time postcode lookups.

mod cache;
mod client;
mod resolver;

pub use cache::PostcodeCache;
pub use client::PostcodeClient;
pub use resolver::{cache_key, normalise_postcode, order_ballots, PostcodeResolver};
