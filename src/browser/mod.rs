//! Browser automation for one-time generation tokens
//!
//! The upstream gates job submission behind a visual challenge. This module
//! drives a real headless browser through the exact actions a human would
//! take, solves the challenge via the external coordinate service, and
//! intercepts the outgoing submission request to capture its tokens before
//! it ever leaves the browser.

pub mod challenge;
pub mod engine;

pub use engine::BrowserEngine;

use async_trait::async_trait;

use crate::credentials::CredentialStore;
use crate::error::Result;

/// Tokens captured from the intercepted submission request
#[derive(Debug, Clone)]
pub struct CapturedTokens {
    /// Bearer token the browser used; fresher than the one we hold
    pub bearer: String,
    /// Challenge-solution token, absent when the site required none
    pub challenge_token: Option<String>,
}

/// Seam between the generation protocol and the browser flow.
///
/// Production uses [`BrowserEngine`]; tests substitute scripted providers
/// so no browser is needed.
#[async_trait]
pub trait GenerationTokenProvider: Send + Sync {
    /// Run the full browser flow for the given credential set and return
    /// the captured tokens.
    async fn obtain_generation_token(&self, credentials: &CredentialStore)
        -> Result<CapturedTokens>;
}
