//! Configuration settings structure
//!
//! Defines the main settings structure and environment loading logic.
//! Defaults hold the production constants; every timeout can be
//! overridden via environment variables (`SUNO_TIMEOUT_*`).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default model version used when the caller does not specify one
pub const DEFAULT_MODEL: &str = "chirp-crow";

/// Delimiter separating credential sets in a multi-account cookie string
pub const COOKIE_POOL_DELIMITER: &str = "|||";

/// Main configuration settings for the automation client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Upstream API endpoints
    pub api: ApiSettings,
    /// Browser automation configuration
    pub browser: BrowserSettings,
    /// Coordinate-solving service configuration
    pub captcha: CaptchaSettings,
    /// Timeouts, delays and polling budgets
    pub timeouts: TimeoutSettings,
}

/// Upstream endpoint configuration.
///
/// Base URLs are configurable so tests can point the client at a mock
/// server instead of production.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Studio API base URL
    pub base_url: String,
    /// Identity provider (Clerk) base URL
    pub clerk_base_url: String,
    /// Public site base URL, used by the browser flow
    pub app_base_url: String,
    /// Clerk JS version advertised on identity-provider calls
    pub clerk_version: String,
    /// Clerk API version header value
    pub clerk_api_version: String,
    /// User agent presented on HTTP calls and in the automated browser
    pub user_agent: String,
}

/// Browser automation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run the browser headless
    pub headless: bool,
    /// Disable GPU acceleration (recommended inside containers)
    pub disable_gpu: bool,
    /// Explicit Chrome/Chromium executable path, if any
    pub executable: Option<String>,
    /// Prompt typed into the create form to trigger the challenge
    pub trigger_prompt: String,
    /// Whole-flow retry attempts for transient failures
    pub max_retries: u32,
    /// Delay between whole-flow retries
    pub retry_delay: Duration,
}

/// Coordinate-solving service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaSettings {
    /// 2Captcha API key (`TWOCAPTCHA_KEY`)
    pub api_key: String,
    /// Solver API base URL
    pub base_url: String,
    /// Attempts per solve call before giving up
    pub solve_retries: u32,
    /// Instruction text sent along with drag-type challenges
    pub drag_instructions: String,
    /// Base64 instruction image sent with drag-type challenges, loaded
    /// from the `CAPTCHA_DRAG_IMAGE` file path. Drag solving refuses to
    /// run without it.
    pub drag_instruction_image: Option<String>,
}

/// Timeouts, delays and polling budgets.
///
/// Sleep-style delays are expressed in seconds (f64) because several of
/// them are sub-second or randomized over a band; hard request timeouts
/// are `Duration`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Timeout for HTTP requests to the generation endpoints
    pub api_request: Duration,
    /// Timeout for HTTP requests to the feed endpoint
    pub api_feed: Duration,
    /// Timeout for HTTP requests to persona endpoints
    pub api_persona: Duration,
    /// Wait for the identity-provider network call after loading the home page
    pub page_clerk_response: Duration,
    /// Wait for the feed API call after loading the create page
    pub page_api_response: Duration,
    /// Per-selector timeout in the popup dismissal cascade
    pub popup_close: Duration,
    /// Wait for the prompt textarea to appear
    pub textarea_wait: Duration,
    /// Wait for the create button to appear
    pub create_button_wait: Duration,
    /// Delay for challenge images to load (seconds)
    pub captcha_image_load_delay: f64,
    /// Delay for the draggable piece to unlock mid-drag (seconds)
    pub captcha_piece_unlock_delay: f64,
    /// Min randomized pause after a keep-alive renewal (seconds)
    pub keep_alive_sleep_min: f64,
    /// Max randomized pause after a keep-alive renewal (seconds)
    pub keep_alive_sleep_max: f64,
    /// Initial delay before the first generation status poll (seconds)
    pub audio_poll_initial_delay: f64,
    /// Min randomized delay between generation status polls (seconds)
    pub audio_poll_delay_min: f64,
    /// Max randomized delay between generation status polls (seconds)
    pub audio_poll_delay_max: f64,
    /// Total wall-clock budget for generation polling
    pub audio_generation_max: Duration,
    /// Total wall-clock budget for WAV conversion polling
    pub wav_wait_max: Duration,
    /// Fixed interval between WAV status polls
    pub wav_poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings {
                base_url: "https://studio-api.prod.suno.com".to_string(),
                clerk_base_url: "https://auth.suno.com".to_string(),
                app_base_url: "https://suno.com".to_string(),
                clerk_version: "5.117.0".to_string(),
                clerk_api_version: "2025-11-10".to_string(),
                user_agent: "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 \
                             (KHTML, like Gecko) Chrome/130.0.0.0 Mobile Safari/537.36"
                    .to_string(),
            },
            browser: BrowserSettings {
                headless: true,
                disable_gpu: false,
                executable: None,
                trigger_prompt: "Lorem ipsum".to_string(),
                max_retries: 3,
                retry_delay: Duration::from_secs(2),
            },
            captcha: CaptchaSettings {
                api_key: String::new(),
                base_url: "https://2captcha.com".to_string(),
                solve_retries: 3,
                drag_instructions:
                    "CLICK on the shapes at their edge or center as shown above—please be precise!"
                        .to_string(),
                drag_instruction_image: None,
            },
            timeouts: TimeoutSettings {
                api_request: Duration::from_secs(10),
                api_feed: Duration::from_secs(10),
                api_persona: Duration::from_secs(10),
                page_clerk_response: Duration::from_secs(10),
                page_api_response: Duration::from_secs(30),
                popup_close: Duration::from_secs(2),
                textarea_wait: Duration::from_secs(3),
                create_button_wait: Duration::from_secs(5),
                captcha_image_load_delay: 3.0,
                captcha_piece_unlock_delay: 1.1,
                keep_alive_sleep_min: 1.0,
                keep_alive_sleep_max: 2.0,
                audio_poll_initial_delay: 5.0,
                audio_poll_delay_min: 3.0,
                audio_poll_delay_max: 6.0,
                audio_generation_max: Duration::from_secs(100),
                wav_wait_max: Duration::from_secs(60),
                wav_poll_interval: Duration::from_secs(2),
            },
        }
    }
}

impl Settings {
    /// Create new settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from environment variables.
    ///
    /// `TWOCAPTCHA_KEY` is required for the browser flow; everything else
    /// falls back to the defaults above.
    pub fn from_env() -> crate::Result<Self> {
        let mut settings = Self::default();

        if let Ok(key) = std::env::var("TWOCAPTCHA_KEY") {
            settings.captcha.api_key = key;
        }

        if let Ok(path) = std::env::var("CAPTCHA_DRAG_IMAGE") {
            let bytes = std::fs::read(&path).map_err(|e| {
                crate::Error::config(format!("Cannot read CAPTCHA_DRAG_IMAGE {}: {}", path, e))
            })?;
            settings.captcha.drag_instruction_image = Some(BASE64.encode(bytes));
        }

        if let Ok(headless) = std::env::var("BROWSER_HEADLESS") {
            settings.browser.headless = parse_bool(&headless, "BROWSER_HEADLESS")?;
        }
        if let Ok(disable_gpu) = std::env::var("BROWSER_DISABLE_GPU") {
            settings.browser.disable_gpu = parse_bool(&disable_gpu, "BROWSER_DISABLE_GPU")?;
        }
        if let Ok(path) = std::env::var("BROWSER_EXECUTABLE") {
            settings.browser.executable = Some(path);
        }
        if let Ok(prompt) = std::env::var("CAPTCHA_TEST_PROMPT") {
            settings.browser.trigger_prompt = prompt;
        }
        if let Ok(retries) = std::env::var("BROWSER_RETRIES") {
            settings.browser.max_retries = retries
                .parse()
                .map_err(|e| crate::Error::config(format!("Invalid BROWSER_RETRIES: {}", e)))?;
        }

        if let Ok(max) = std::env::var("SUNO_TIMEOUT_AUDIO_GENERATION_MAX") {
            let secs: u64 = max.parse().map_err(|e| {
                crate::Error::config(format!("Invalid SUNO_TIMEOUT_AUDIO_GENERATION_MAX: {}", e))
            })?;
            settings.timeouts.audio_generation_max = Duration::from_secs(secs);
        }
        if let Ok(max) = std::env::var("SUNO_TIMEOUT_WAV_WAIT_MAX") {
            let secs: u64 = max.parse().map_err(|e| {
                crate::Error::config(format!("Invalid SUNO_TIMEOUT_WAV_WAIT_MAX: {}", e))
            })?;
            settings.timeouts.wav_wait_max = Duration::from_secs(secs);
        }

        Ok(settings)
    }

    /// Default cookie string from the environment (`SUNO_COOKIE`)
    pub fn env_cookie() -> Option<String> {
        std::env::var("SUNO_COOKIE")
            .ok()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    }
}

fn parse_bool(value: &str, name: &str) -> crate::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(crate::Error::config(format!(
            "Invalid boolean for {}: {}",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.api.base_url, "https://studio-api.prod.suno.com");
        assert_eq!(settings.api.clerk_base_url, "https://auth.suno.com");
        assert_eq!(settings.browser.max_retries, 3);
        assert!(settings.browser.headless);
        assert_eq!(settings.timeouts.wav_wait_max, Duration::from_secs(60));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true", "X").unwrap());
        assert!(parse_bool("1", "X").unwrap());
        assert!(!parse_bool("no", "X").unwrap());
        assert!(parse_bool("maybe", "X").is_err());
    }

    #[test]
    fn test_settings_creation() {
        let settings = Settings::new();
        assert_eq!(settings.timeouts.audio_poll_initial_delay, 5.0);
    }
}
