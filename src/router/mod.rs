//! Account routing and client instance caching.
//!
//! Multi-account setups configure one `|||`-delimited cookie string; this
//! module decides which credential set serves a given call and hands out
//! cached [`SunoClient`] instances keyed on the serialized cookie string.
//! None of this is ambient state: callers construct one [`AppContext`] per
//! process (or per test) and pass it around explicitly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::SunoClient;
use crate::config::{Settings, COOKIE_POOL_DELIMITER};
use crate::error::{Error, Result};

/// Process-scoped routing context: credential pool, rotation counter,
/// persona routes and the client instance cache.
pub struct AppContext {
    settings: Arc<Settings>,
    pool: Vec<String>,
    rotation: AtomicUsize,
    persona_routes: RwLock<HashMap<String, usize>>,
    clients: RwLock<HashMap<String, Arc<SunoClient>>>,
}

impl AppContext {
    /// Build a context from a raw (possibly delimiter-separated) cookie
    /// string. Blank segments are dropped; segment order defines account
    /// indexes.
    pub fn new(settings: Arc<Settings>, cookie_pool: &str) -> Self {
        let pool: Vec<String> = cookie_pool
            .split(COOKIE_POOL_DELIMITER)
            .map(|cookie| cookie.trim().to_string())
            .filter(|cookie| !cookie.is_empty())
            .collect();
        debug!(accounts = pool.len(), "credential pool parsed");
        Self {
            settings,
            pool,
            rotation: AtomicUsize::new(0),
            persona_routes: RwLock::new(HashMap::new()),
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Build a context from the `SUNO_COOKIE` environment variable.
    pub fn from_env(settings: Arc<Settings>) -> Result<Self> {
        let raw = Settings::env_cookie()
            .ok_or_else(|| Error::config("SUNO_COOKIE is not set or empty"))?;
        Ok(Self::new(settings, &raw))
    }

    /// Number of configured credential sets.
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Pick the account index for a call: an explicit index wins, then a
    /// persona route, then round-robin. The rotation counter advances
    /// exactly once per unindexed, unrouted call.
    pub async fn resolve_account(
        &self,
        explicit: Option<usize>,
        persona_id: Option<&str>,
    ) -> Result<usize> {
        if self.pool.is_empty() {
            return Err(Error::config("credential pool is empty"));
        }
        if let Some(index) = explicit {
            if index >= self.pool.len() {
                return Err(Error::validation(
                    "account_index",
                    format!("out of range, the pool holds {} accounts", self.pool.len()),
                ));
            }
            return Ok(index);
        }
        if let Some(persona_id) = persona_id {
            if let Some(&index) = self.persona_routes.read().await.get(persona_id) {
                if index < self.pool.len() {
                    debug!(persona_id, index, "persona route hit");
                    return Ok(index);
                }
            }
        }
        Ok(self.rotation.fetch_add(1, Ordering::Relaxed) % self.pool.len())
    }

    /// Client for a pool index.
    pub async fn client_for_index(&self, index: usize) -> Result<Arc<SunoClient>> {
        let cookie = self
            .pool
            .get(index)
            .ok_or_else(|| {
                Error::validation(
                    "account_index",
                    format!("out of range, the pool holds {} accounts", self.pool.len()),
                )
            })?
            .clone();
        self.client_for_cookie(&cookie).await
    }

    /// Client for a raw cookie string. A cache hit skips all session
    /// bootstrapping; concurrent misses on the same cookie both connect and
    /// the last writer wins, which is harmless since every instance is
    /// equally valid.
    pub async fn client_for_cookie(&self, raw_cookie: &str) -> Result<Arc<SunoClient>> {
        if let Some(client) = self.clients.read().await.get(raw_cookie) {
            return Ok(client.clone());
        }
        let client = Arc::new(SunoClient::connect(self.settings.clone(), raw_cookie).await?);
        self.clients
            .write()
            .await
            .insert(raw_cookie.to_string(), client.clone());
        Ok(client)
    }

    /// Resolve which cookie string a request uses: an inbound value that
    /// actually carries the identity-provider `__client` cookie wins, else
    /// the environment pool.
    pub fn resolve_cookie(request_cookie: Option<&str>) -> Result<String> {
        if let Some(cookie) = request_cookie {
            if cookie.contains("__client") {
                return Ok(cookie.trim().to_string());
            }
        }
        Settings::env_cookie().ok_or_else(|| {
            Error::config("no usable cookie: the request carried none and SUNO_COOKIE is not set")
        })
    }

    /// Walk every account's persona pages and rewrite the persona route
    /// table. This is the only operation that mutates routes; stale entries
    /// survive until the next scan overwrites them. Unreachable accounts
    /// are skipped with a warning rather than failing the whole scan.
    pub async fn scan_all_accounts(&self) -> Result<usize> {
        let mut routes: HashMap<String, usize> = HashMap::new();

        for (index, cookie) in self.pool.iter().enumerate() {
            let client = match self.client_for_cookie(cookie).await {
                Ok(client) => client,
                Err(err) => {
                    warn!(account = index, error = %err, "skipping account during persona scan");
                    continue;
                }
            };

            let mut seen = 0u32;
            let mut page = 1u32;
            loop {
                let listing = match client.get_personas(page).await {
                    Ok(listing) => listing,
                    Err(err) => {
                        warn!(account = index, page, error = %err, "persona page fetch failed");
                        break;
                    }
                };
                if listing.personas.is_empty() {
                    break;
                }
                seen += listing.personas.len() as u32;
                for persona in listing.personas {
                    routes.insert(persona.id, index);
                }
                if seen >= listing.total_results {
                    break;
                }
                page += 1;
            }
        }

        let count = routes.len();
        *self.persona_routes.write().await = routes;
        info!(personas = count, "persona routes rebuilt");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pool: &str) -> AppContext {
        AppContext::new(Arc::new(Settings::default()), pool)
    }

    #[test]
    fn test_pool_parsing_drops_blank_segments() {
        let ctx = context("__client=a; other=1|||__client=b||| |||__client=c");
        assert_eq!(ctx.pool_size(), 3);
        assert_eq!(ctx.pool[1], "__client=b");
    }

    #[test]
    fn test_single_cookie_is_a_pool_of_one() {
        let ctx = context("__client=only");
        assert_eq!(ctx.pool_size(), 1);
    }

    #[tokio::test]
    async fn test_round_robin_advances_once_per_call() {
        let ctx = context("__client=a|||__client=b|||__client=c");
        let mut picks = Vec::new();
        for _ in 0..6 {
            picks.push(ctx.resolve_account(None, None).await.unwrap());
        }
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(ctx.rotation.load(Ordering::Relaxed), 6);
    }

    #[tokio::test]
    async fn test_explicit_index_wins_and_does_not_advance_rotation() {
        let ctx = context("__client=a|||__client=b");
        assert_eq!(ctx.resolve_account(Some(1), None).await.unwrap(), 1);
        assert_eq!(ctx.resolve_account(Some(1), Some("p-1")).await.unwrap(), 1);
        assert_eq!(ctx.rotation.load(Ordering::Relaxed), 0);

        let err = ctx.resolve_account(Some(5), None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(..)));
    }

    #[tokio::test]
    async fn test_persona_route_beats_rotation() {
        let ctx = context("__client=a|||__client=b|||__client=c");
        ctx.persona_routes
            .write()
            .await
            .insert("p-42".to_string(), 2);

        assert_eq!(ctx.resolve_account(None, Some("p-42")).await.unwrap(), 2);
        assert_eq!(ctx.rotation.load(Ordering::Relaxed), 0);

        // Unknown persona falls back to rotation.
        assert_eq!(ctx.resolve_account(None, Some("p-unknown")).await.unwrap(), 0);
        assert_eq!(ctx.rotation.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_empty_pool_is_a_config_error() {
        let ctx = context("   ");
        assert!(matches!(
            ctx.resolve_account(None, None).await,
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_resolve_cookie_prefers_client_carrying_header() {
        let resolved =
            AppContext::resolve_cookie(Some("__client=tok; ajs_anonymous_id=x")).unwrap();
        assert_eq!(resolved, "__client=tok; ajs_anonymous_id=x");
    }

    // Set and clear SUNO_COOKIE inside one test so parallel tests never
    // observe a half-configured environment.
    #[test]
    fn test_resolve_cookie_falls_back_to_env_pool() {
        std::env::set_var("SUNO_COOKIE", "__client=env-tok; ajs_anonymous_id=y");
        let resolved = AppContext::resolve_cookie(Some("sessionid=opaque")).unwrap();
        assert_eq!(resolved, "__client=env-tok; ajs_anonymous_id=y");
        let resolved = AppContext::resolve_cookie(None).unwrap();
        assert_eq!(resolved, "__client=env-tok; ajs_anonymous_id=y");

        std::env::remove_var("SUNO_COOKIE");
        let err = AppContext::resolve_cookie(Some("sessionid=opaque")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
