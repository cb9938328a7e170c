pub mod error;
pub mod request_cache;
