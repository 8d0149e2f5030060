//! Request/response snapshots, cache keys and the network side of the proxy.

mod cache;
mod client;
mod types;

pub use cache::RequestKey;
pub use client::{Fetcher, NetworkClient};
pub use types::{is_hop_by_hop, InterceptedRequest, Response};
