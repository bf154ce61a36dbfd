//! Error handling for the Suno automation client
//!
//! Defines the error taxonomy shared by every module and the
//! transient-fault classification used by the browser automation flow.

pub mod types;

pub use types::{is_benign_race_text, is_transient_text, Error, Result};
