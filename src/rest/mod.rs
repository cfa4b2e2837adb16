pub mod auth;
pub mod client;
pub mod rate_limit;
pub mod response;

pub use auth::{AuthKind, Credentials};
pub use client::RestClient;
pub use rate_limit::{RateLimitBucket, RateLimitedExecutor, SharedBucket};
pub use response::RestResponse;
