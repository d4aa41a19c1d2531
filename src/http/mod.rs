// Outbound HTTP transport shared by the model, search and publishing adapters

pub mod client;

pub use client::{HttpClientConfig, HttpError, HttpResponse, RateLimitedHttpClient};
