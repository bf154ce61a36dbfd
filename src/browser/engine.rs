//! Headless-browser capture of one-time generation tokens.
//!
//! The upstream generation endpoints require a short-lived token that is
//! only minted inside a real browser session: the page script solves (or
//! is helped through) a visual challenge and attaches the result to its
//! generation request. Instead of reimplementing that ritual, this engine
//! drives a headless Chromium through the same flow a person would follow,
//! intercepts the page's own generation request at the CDP fetch layer and
//! lifts the bearer and challenge tokens out of it before aborting the
//! request so no server-side generation is consumed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    self as network, CookieParam, CookieSameSite, ErrorReason, EventResponseReceived,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use futures::{Stream, StreamExt};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::browser::challenge::ChallengeLoop;
use crate::browser::{CapturedTokens, GenerationTokenProvider};
use crate::captcha::{CaptchaSolver, TwoCaptchaClient};
use crate::config::Settings;
use crate::credentials::CredentialStore;
use crate::error::{is_benign_race_text, Error, Result};

/// How long to keep waiting for the interceptor after the challenge loop
/// has already observed the teardown race.
const CAPTURE_TAIL: Duration = Duration::from_secs(5);

fn cdp_err(err: impl std::fmt::Display) -> Error {
    Error::browser(err.to_string())
}

/// Token provider backed by a real Chromium instance.
pub struct BrowserEngine {
    settings: Arc<Settings>,
}

impl BrowserEngine {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    fn solver(&self) -> Result<Arc<dyn CaptchaSolver>> {
        let client = TwoCaptchaClient::new(
            self.settings.captcha.api_key.as_str(),
            self.settings.captcha.base_url.as_str(),
        )?;
        Ok(Arc::new(client))
    }

    async fn run_attempt(
        &self,
        credentials: &CredentialStore,
        solver: Arc<dyn CaptchaSolver>,
    ) -> Result<CapturedTokens> {
        let (mut browser, handler_task, page) = self.launch().await?;
        let result = self.capture_on_page(&page, credentials, solver).await;

        // Full teardown per attempt, successful or not.
        if let Err(err) = browser.close().await {
            debug!(error = %err, "browser close failed during teardown");
        }
        handler_task.abort();

        result
    }

    async fn launch(&self) -> Result<(Browser, tokio::task::JoinHandle<()>, Page)> {
        let browser_settings = &self.settings.browser;

        let mut builder = BrowserConfig::builder()
            .viewport(None)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if let Some(executable) = &browser_settings.executable {
            builder = builder.chrome_executable(executable);
        }
        if !browser_settings.headless {
            builder = builder.with_head();
        }
        if browser_settings.disable_gpu {
            builder = builder.arg("--disable-gpu");
        }
        let config = builder.build().map_err(Error::browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(cdp_err)?;
        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });
        let page = browser.new_page("about:blank").await.map_err(cdp_err)?;

        Ok((browser, handler_task, page))
    }

    async fn capture_on_page(
        &self,
        page: &Page,
        credentials: &CredentialStore,
        solver: Arc<dyn CaptchaSolver>,
    ) -> Result<CapturedTokens> {
        let settings = &self.settings;

        self.apply_cookies(page, credentials).await?;

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(cdp_err)?;

        // The home page must load first: the site's own client script mints a
        // session cookie during its identity-provider handshake, and the
        // create page looks unauthenticated without it.
        let clerk_host = host_of(&settings.api.clerk_base_url)?;
        self.goto(page, &settings.api.app_base_url, Some("https://www.google.com/"))
            .await?;
        wait_for_response(
            &mut responses,
            settings.timeouts.page_clerk_response,
            "identity-provider client response",
            |url, status| url.contains(clerk_host.as_str()) && url.contains("/v1/client") && status == 200,
        )
        .await?;

        let create_url = format!("{}/create", settings.api.app_base_url.trim_end_matches('/'));
        self.goto(page, &create_url, None).await?;
        wait_for_response(
            &mut responses,
            settings.timeouts.page_api_response,
            "create page feed response",
            |url, status| {
                (url.contains("/api/feed") || url.contains("/api/project"))
                    && (200..300).contains(&status)
            },
        )
        .await?;

        self.dismiss_popups(page).await;

        // The interceptor must be armed before the prompt is touched; the
        // page fires its generation request the instant the challenge is
        // passed (or skipped).
        let patterns = vec![RequestPattern {
            url_pattern: Some("*/api/generate/*".to_string()),
            resource_type: None,
            request_stage: Some(RequestStage::Request),
        }];
        page.execute(fetch::EnableParams {
            patterns: Some(patterns),
            handle_auth_requests: None,
        })
        .await
        .map_err(cdp_err)?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let (tokens_tx, mut tokens_rx) = oneshot::channel::<CapturedTokens>();
        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(cdp_err)?;
        let intercept_page = page.clone();
        let intercept_cancel = cancelled.clone();
        let interceptor = tokio::spawn(async move {
            let mut tx = Some(tokens_tx);
            while let Some(event) = paused.next().await {
                let is_generation = event.request.method.eq_ignore_ascii_case("post")
                    && event.request.url.contains("/api/generate/");
                if !is_generation {
                    let _ = intercept_page
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await;
                    continue;
                }

                let tokens = captured_from_request(&event);
                debug!(url = %event.request.url, "generation request intercepted");

                // The cancellation flag must be up before the abort lands, so
                // the challenge loop reads its own CDP failures as the race
                // being over rather than as real errors.
                intercept_cancel.store(true, Ordering::SeqCst);
                let _ = intercept_page
                    .execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::Aborted,
                    ))
                    .await;
                if let Some(tx) = tx.take() {
                    let _ = tx.send(tokens);
                }
                break;
            }
        });

        self.trigger_generation(page).await?;

        let challenge = ChallengeLoop::new(page, solver, settings, cancelled.clone());
        let challenge_fut = challenge.run();
        tokio::pin!(challenge_fut);

        let outcome = tokio::select! {
            captured = &mut tokens_rx => {
                captured.map_err(|_| Error::browser("interceptor closed without capturing tokens"))
            }
            res = &mut challenge_fut => match res {
                Ok(()) => drain_captured(&mut tokens_rx).await,
                Err(err)
                    if cancelled.load(Ordering::SeqCst)
                        || is_benign_race_text(&err.to_string()) =>
                {
                    debug!(error = %err, "challenge loop lost the race");
                    drain_captured(&mut tokens_rx).await
                }
                Err(err) => Err(err),
            },
        };
        interceptor.abort();

        let tokens = outcome?;
        if tokens.bearer.is_empty() {
            return Err(Error::browser(
                "intercepted generation request carried no Authorization header",
            ));
        }
        Ok(tokens)
    }

    async fn apply_cookies(&self, page: &Page, credentials: &CredentialStore) -> Result<()> {
        let root = root_domain(&self.settings.api.app_base_url)?;
        let auth_host = host_of(&self.settings.api.clerk_base_url)?;
        let cookies = replicate_cookies(credentials, &root, &auth_host);
        page.set_cookies(cookies).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn goto(&self, page: &Page, url: &str, referrer: Option<&str>) -> Result<()> {
        let mut builder = NavigateParams::builder().url(url);
        if let Some(referrer) = referrer {
            builder = builder.referrer(referrer);
        }
        let params = builder.build().map_err(Error::browser)?;
        page.goto(params).await.map_err(cdp_err)?;
        Ok(())
    }

    /// Best-effort first-match-wins popup dismissal. Failures are logged and
    /// ignored; a popup that refuses to close surfaces later as a selector
    /// wait timeout, which classifies as transient anyway.
    async fn dismiss_popups(&self, page: &Page) {
        const DISMISS_JS: &str = r#"(function() {
  const selectors = [
    'button[aria-label="Close"]',
    'button[data-testid="close-button"]',
    '[role="dialog"] button[aria-label="Close"]',
    '[role="dialog"] button'
  ];
  for (const sel of selectors) {
    const el = document.querySelector(sel);
    if (el) { el.click(); return sel; }
  }
  const buttons = document.querySelectorAll('button, [role="button"]');
  for (const btn of buttons) {
    const text = (btn.innerText || '').trim().toLowerCase();
    if (text === 'got it' || text === 'close' || text === 'dismiss' || text === 'accept all') {
      btn.click();
      return 'text:' + text;
    }
  }
  return null;
})()"#;

        let deadline = tokio::time::Instant::now() + self.settings.timeouts.popup_close;
        loop {
            match page.evaluate(DISMISS_JS).await {
                Ok(result) => {
                    if let Ok(Some(which)) = result.into_value::<Option<String>>() {
                        debug!(selector = %which, "dismissed popup");
                    }
                }
                Err(err) => {
                    debug!(error = %err, "popup dismissal attempt failed");
                    break;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Fill the prompt field and click the create control. The prompt text
    /// is a throwaway: the request it provokes is aborted before the server
    /// acts on it.
    async fn trigger_generation(&self, page: &Page) -> Result<()> {
        let fill_js = format!(
            r#"(function(prompt) {{
  const area = document.querySelector('textarea');
  if (!area) return false;
  const setter = Object.getOwnPropertyDescriptor(
    window.HTMLTextAreaElement.prototype, 'value').set;
  setter.call(area, prompt);
  area.dispatchEvent(new Event('input', {{ bubbles: true }}));
  return true;
}})({})"#,
            serde_json::json!(self.settings.browser.trigger_prompt)
        );

        let deadline = tokio::time::Instant::now() + self.settings.timeouts.textarea_wait;
        loop {
            let filled: bool = page
                .evaluate(fill_js.as_str())
                .await
                .map_err(cdp_err)?
                .into_value()
                .map_err(cdp_err)?;
            if filled {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::browser("timed out waiting for selector `textarea`"));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        let deadline = tokio::time::Instant::now() + self.settings.timeouts.create_button_wait;
        loop {
            if click_create(page).await? {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::browser(
                    "timed out waiting for selector `create button`",
                ));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

#[async_trait]
impl GenerationTokenProvider for BrowserEngine {
    async fn obtain_generation_token(
        &self,
        credentials: &CredentialStore,
    ) -> Result<CapturedTokens> {
        let solver = self.solver()?;
        let max_attempts = self.settings.browser.max_retries.max(1);

        let mut attempt = 1;
        loop {
            info!(attempt, max_attempts, "starting browser token capture");
            match self.run_attempt(credentials, solver.clone()).await {
                Ok(tokens) => {
                    info!(attempt, "generation token captured");
                    return Ok(tokens);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(attempt, error = %err, "token capture failed, retrying");
                    tokio::time::sleep(self.settings.browser.retry_delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Click the create/submit control of the generation form. Also used by the
/// challenge loop to respawn a challenge whose viewport was torn down.
pub(crate) async fn click_create(page: &Page) -> Result<bool> {
    const CLICK_JS: &str = r#"(function() {
  const buttons = Array.from(document.querySelectorAll('button, [role="button"]'));
  const btn = buttons.find(b => {
    const text = (b.innerText || '').trim().toLowerCase();
    return text === 'create' || text.startsWith('create');
  });
  if (!btn || btn.disabled) return false;
  btn.click();
  return true;
})()"#;

    page.evaluate(CLICK_JS)
        .await
        .map_err(cdp_err)?
        .into_value()
        .map_err(cdp_err)
}

async fn wait_for_response<S, F>(
    responses: &mut S,
    budget: Duration,
    what: &str,
    mut matches: F,
) -> Result<()>
where
    S: Stream<Item = Arc<EventResponseReceived>> + Unpin,
    F: FnMut(&str, i64) -> bool,
{
    let wait = async {
        while let Some(event) = responses.next().await {
            if matches(event.response.url.as_str(), event.response.status) {
                return true;
            }
        }
        false
    };
    match tokio::time::timeout(budget, wait).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::browser(format!(
            "network event stream ended before the {what}"
        ))),
        Err(_) => Err(Error::browser(format!("timeout waiting for the {what}"))),
    }
}

async fn drain_captured(rx: &mut oneshot::Receiver<CapturedTokens>) -> Result<CapturedTokens> {
    match tokio::time::timeout(CAPTURE_TAIL, rx).await {
        Ok(Ok(tokens)) => Ok(tokens),
        _ => Err(Error::browser(
            "target closed before the generation request was captured",
        )),
    }
}

fn captured_from_request(event: &EventRequestPaused) -> CapturedTokens {
    let bearer = serde_json::to_value(&event.request.headers)
        .ok()
        .and_then(|headers| bearer_from_headers(&headers))
        .unwrap_or_default();
    let challenge_token = decoded_post_data(&event.request)
        .as_deref()
        .and_then(challenge_token_from_body);
    CapturedTokens {
        bearer,
        challenge_token,
    }
}

/// Reassemble the request body from the CDP post-data entries, which carry
/// each chunk as base64 text.
fn decoded_post_data(request: &network::Request) -> Option<String> {
    let entries = request.post_data_entries.as_ref()?;
    let mut bytes = Vec::new();
    for entry in entries {
        let blob: &str = entry.bytes.as_ref()?.as_ref();
        bytes.extend(BASE64.decode(blob).ok()?);
    }
    String::from_utf8(bytes).ok()
}

fn bearer_from_headers(headers: &serde_json::Value) -> Option<String> {
    let map = headers.as_object()?;
    let (_, value) = map
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))?;
    let value = value.as_str()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value);
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn challenge_token_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("token")
        .and_then(|token| token.as_str())
        .map(str::to_owned)
}

/// Lay the credential set out across the identity provider's cookie
/// partitions. Ordinary cookies are copied onto the site domain. The
/// `__client` token lives only on the two auth origins with different
/// SameSite flags, and `__client_uat` carries a zero marker on the auth
/// origin while the real timestamp goes to the site domain as Lax; the
/// raw pair is never copied to the site domain verbatim.
fn replicate_cookies(
    credentials: &CredentialStore,
    root: &str,
    auth_host: &str,
) -> Vec<CookieParam> {
    let site_domain = format!(".{root}");
    let clerk_host = format!("clerk.{root}");

    let mut cookies = Vec::new();
    for (name, value) in credentials.iter() {
        if name == "__client" || name == "__client_uat" {
            continue;
        }
        cookies.push(make_cookie(name, value, &site_domain, None));
    }
    if let Some(client) = credentials.client_token() {
        cookies.push(make_cookie(
            "__client",
            client,
            auth_host,
            Some(CookieSameSite::None),
        ));
        cookies.push(make_cookie(
            "__client",
            client,
            &clerk_host,
            Some(CookieSameSite::Lax),
        ));
        cookies.push(make_cookie(
            "__client_uat",
            "0",
            auth_host,
            Some(CookieSameSite::None),
        ));
        if let Some(uat) = credentials.client_uat_timestamp() {
            cookies.push(make_cookie(
                "__client_uat",
                uat,
                &site_domain,
                Some(CookieSameSite::Lax),
            ));
        }
    }
    cookies
}

fn make_cookie(
    name: &str,
    value: &str,
    domain: &str,
    same_site: Option<CookieSameSite>,
) -> CookieParam {
    let mut cookie = CookieParam::new(name.to_string(), value.to_string());
    cookie.domain = Some(domain.to_string());
    cookie.path = Some("/".to_string());
    cookie.secure = Some(true);
    cookie.same_site = same_site;
    cookie
}

fn host_of(base: &str) -> Result<String> {
    url::Url::parse(base)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_owned))
        .ok_or_else(|| Error::config(format!("invalid base URL: {base}")))
}

fn root_domain(base: &str) -> Result<String> {
    let host = host_of(base)?;
    Ok(host.trim_start_matches("www.").to_string())
}
