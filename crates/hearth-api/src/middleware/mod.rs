//! # Middleware
//!
//! Request metrics. Tracing comes from `tower_http::trace::TraceLayer` and
//! authentication from [`crate::auth`].

pub mod metrics;
