//! Outbound HTTP plumbing shared by the channel adapters

pub mod client;

pub use client::{HttpTransport, RetryPolicy, TransportOptions, endpoint};
