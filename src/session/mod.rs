//! Identity-provider session management
//!
//! One [`SessionManager`] per credential set: resolves the provider session
//! id once, exchanges it for short-lived bearer tokens, and carries the
//! authenticated HTTP plumbing every upstream call goes through.

pub mod manager;

pub use manager::SessionManager;
