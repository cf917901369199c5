//! HTTP surface of the forecast proxy.
//!
//! The binary in `main.rs` adds the command-line front end on top.

pub mod http;

pub use http::{create_router, run_http_server};
