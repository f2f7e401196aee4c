//! HTTP API: server setup, request handlers and middleware

pub mod handlers;
pub mod rate_limit;
pub mod server;

pub use server::{create_router, AppContext};
