//! Thumbla - HTTP image transformation gateway
//!
//! Clients request a transformed view of a remote or local image by
//! encoding the source locator and an ordered pipeline of operations in
//! the request path, e.g.
//! `/images/photo.jpg/resize:w=200/output:f=webp,q=80`.
//!
//! The server resolves the locator through the fetcher bound to the path,
//! decodes the image, runs the pipeline and streams the encoded result
//! back with caching headers.

pub mod api;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod face;
pub mod fetchers;
pub mod manipulators;
pub mod mime;

pub use config::Config;
pub use error::{Error, Result};
