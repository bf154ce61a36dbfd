//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

/// Test helper functions
pub mod helpers {
    use std::sync::{Arc, Once};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use suno_client::browser::{CapturedTokens, GenerationTokenProvider};
    use suno_client::{CredentialStore, Result, Settings, SunoClient};

    /// Cookie set used by every integration test account
    pub const TEST_COOKIE: &str =
        "__client=test-client-token; ajs_anonymous_id=11111111-2222-3333-4444-555555555555";

    /// Token provider that skips the browser entirely and returns fixed
    /// tokens, so generation tests exercise only the HTTP protocol.
    pub struct StubTokenProvider;

    #[async_trait]
    impl GenerationTokenProvider for StubTokenProvider {
        async fn obtain_generation_token(
            &self,
            _credentials: &CredentialStore,
        ) -> Result<CapturedTokens> {
            Ok(CapturedTokens {
                bearer: "captured-bearer".to_string(),
                challenge_token: Some("P1_challenge".to_string()),
            })
        }
    }

    /// Settings pointed at the mock server, with polling delays shrunk so
    /// tests finish quickly
    pub fn test_settings(server: &MockServer) -> Settings {
        let mut settings = Settings::default();
        settings.api.base_url = server.uri();
        settings.api.clerk_base_url = server.uri();
        settings.api.app_base_url = server.uri();
        settings.timeouts.audio_poll_initial_delay = 0.0;
        settings.timeouts.audio_poll_delay_min = 0.01;
        settings.timeouts.audio_poll_delay_max = 0.02;
        settings.timeouts.audio_generation_max = Duration::from_secs(5);
        settings.timeouts.wav_wait_max = Duration::from_secs(2);
        settings.timeouts.wav_poll_interval = Duration::from_millis(20);
        settings.timeouts.keep_alive_sleep_min = 0.0;
        settings.timeouts.keep_alive_sleep_max = 0.0;
        settings
    }

    /// Route client-side tracing through the test harness, honoring
    /// `RUST_LOG` when set
    pub fn init_tracing() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }

    /// Mount the identity-provider endpoints every client bootstrap hits
    pub async fn mount_clerk(server: &MockServer) {
        init_tracing();

        Mock::given(method("GET"))
            .and(path("/v1/client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"last_active_session_id": "sess_test"}
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/client/sessions/sess_test/tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jwt": "fresh-jwt"})))
            .mount(server)
            .await;
    }

    /// Minimal upstream clip payload
    pub fn clip_json(id: &str, status: &str, audio_url: Option<&str>) -> Value {
        json!({
            "id": id,
            "title": "Test Clip",
            "status": status,
            "audio_url": audio_url,
            "model_name": "chirp-crow",
            "metadata": {"tags": "synthwave"}
        })
    }

    /// Bootstrap a client against the mock server with the stub provider
    pub async fn stub_client(server: &MockServer) -> SunoClient {
        stub_client_with(server, test_settings(server)).await
    }

    /// Same, with caller-tuned settings
    pub async fn stub_client_with(server: &MockServer, settings: Settings) -> SunoClient {
        SunoClient::connect_with_provider(
            Arc::new(settings),
            TEST_COOKIE,
            Arc::new(StubTokenProvider),
        )
        .await
        .expect("client bootstrap against the mock server")
    }
}
