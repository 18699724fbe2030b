//! # Route Modules
//!
//! One Axum router per API surface. Assembled in [`crate::app`].

pub mod bookings;
pub mod children;
pub mod handover;
pub mod incidents;
pub mod sessions;
