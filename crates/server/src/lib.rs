//! Cuju server library: the HTTP router, kept separate from `main` so tests can drive it.

#![forbid(unsafe_code)]

pub mod http;

pub use http::create_router;
