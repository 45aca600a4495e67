//! pgxd library - exposes modules for testing.

pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod server;
