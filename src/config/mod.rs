//! Configuration management for the automation client
//!
//! This module handles loading and managing configuration settings
//! for sessions, browser automation and polling behavior.

pub mod settings;

pub use settings::{CaptchaSettings, Settings, COOKIE_POOL_DELIMITER};
