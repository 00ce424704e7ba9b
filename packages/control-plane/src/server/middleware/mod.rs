pub mod cluster_auth;
pub mod ip_extractor;
pub mod rate_limit;

pub use cluster_auth::*;
pub use ip_extractor::*;
