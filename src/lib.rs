//! Suno Automation Client - Rust Implementation
//!
//! An automation client for the Suno music-generation service. The upstream
//! service has no public API: authentication runs through an identity
//! provider's cookie/session/token lifecycle, and every generation request
//! must carry a one-time token minted inside a real browser session behind a
//! visual challenge. This crate drives that whole pipeline headlessly.
//!
//! # Architecture
//!
//! - **Session Manager**: cookie set → provider session id → short-lived
//!   bearer token, renewed around long polling loops
//! - **Browser Engine + Challenge Loop**: headless Chromium walks the site
//!   like a person would, an external coordinate-solving service handles the
//!   visual challenge, and a CDP interceptor lifts the generation token out
//!   of the page's own request before aborting it
//! - **Generation Protocol**: submit/extend/stems/persona/WAV operations
//!   with wait-polling over the feed endpoint
//! - **Account Router**: round-robin rotation over a delimiter-separated
//!   credential pool, persona-to-account routes and a client instance cache
//!
//! # Examples
//!
//! ```rust,no_run
//! use suno_client::{Settings, SunoClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> suno_client::Result<()> {
//! let settings = Arc::new(Settings::from_env()?);
//! let client = SunoClient::connect(settings, "__client=...").await?;
//! let clips = client.generate("a dreamy synthwave track", false, None, true).await?;
//! println!("{}", clips[0].id);
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod captcha;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod router;
pub mod session;
pub mod types;
pub mod utils;

pub use client::SunoClient;
pub use config::Settings;
pub use credentials::CredentialStore;
pub use error::{Error, Result};
pub use router::AppContext;
pub use session::SessionManager;
pub use types::{
    AudioInfo, ClipInfo, ClipStatus, CreatePersonaRequest, CreditsInfo, CustomGenerateRequest,
    ExtendRequest, PersonaInfo, PersonaPage, StemKind,
};
