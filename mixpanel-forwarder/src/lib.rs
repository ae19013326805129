pub mod chunk;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod mapper;
pub mod pipeline;
pub mod policy;
pub mod router;
pub mod sanitize;
pub mod test_utils;
