//! Upstream generation protocol
//!
//! [`SunoClient`] is the unit the instance cache holds: one credential set,
//! one session, and every operation the upstream API supports.

pub mod api;

pub use api::SunoClient;
