//! Shared primitives for the haggle identity subsystem.
//!
//! - [`types`] -- id and timestamp aliases used across every crate.
//! - [`error`] -- the domain error kinds surfaced by the identity service.

pub mod error;
pub mod types;
