//! Credential storage for upstream accounts
//!
//! A [`CredentialStore`] holds the cookie collection authenticating one
//! upstream account. It is parsed once from a raw `Cookie:` header string
//! and refreshed from authoritative `Set-Cookie` response headers over the
//! lifetime of a client instance — caller input never merges over it.

/// Ordered cookie name→value map for one upstream account.
///
/// Insertion order is preserved: the serialized cookie string is the
/// identity used for instance caching and rotation, so a round trip through
/// the store must not reorder cookies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialStore {
    cookies: Vec<(String, String)>,
}

impl CredentialStore {
    /// Parse a raw cookie string (`name=value; name2=value2`) into a store.
    ///
    /// Malformed fragments without `=` are ignored, matching lenient
    /// browser behavior. Later duplicates of a name replace earlier ones
    /// in place.
    pub fn parse(raw: &str) -> Self {
        let mut store = Self::default();
        for pair in raw.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            if let Some((name, value)) = pair.split_once('=') {
                store.insert(name.trim(), value.trim());
            }
        }
        store
    }

    /// Value of one cookie, if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or replace one cookie, keeping its original position on
    /// replacement
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.cookies.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.cookies.push((name, value)),
        }
    }

    /// Number of cookies held
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether the store holds no cookies
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Iterate over cookie name/value pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize back into a `Cookie:` header value
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Merge `Set-Cookie` response header values into the store.
    ///
    /// Only the leading `name=value` fragment of each header is taken;
    /// attributes (`Path`, `Expires`, ...) are dropped. Existing entries
    /// are overwritten — responses are authoritative.
    pub fn merge_set_cookie<'a>(&mut self, headers: impl IntoIterator<Item = &'a str>) {
        for header in headers {
            if let Some(pair) = header.split(';').next() {
                if let Some((name, value)) = pair.split_once('=') {
                    self.insert(name.trim(), value.trim());
                }
            }
        }
    }

    /// The value of the identity-provider client cookie, if present
    pub fn client_token(&self) -> Option<&str> {
        self.get("__client")
    }

    /// Resolve the real `__client_uat` authentication timestamp.
    ///
    /// The plain `__client_uat` cookie is often "0" (unauthenticated); the
    /// actual timestamp lives in a session-variant `__client_uat_<suffix>`
    /// cookie. Returns `None` when no non-zero timestamp exists.
    pub fn client_uat_timestamp(&self) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(name, value)| name.starts_with("__client_uat_") && value != "0")
            .map(|(_, v)| v.as_str())
            .or_else(|| self.get("__client_uat").filter(|v| *v != "0"))
    }

    /// Stable device id for this account: the analytics anonymous id when
    /// present, otherwise a freshly generated UUID.
    pub fn device_id(&self) -> String {
        self.get("ajs_anonymous_id")
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_preserves_order() {
        let raw = "_ga=x; __client=abc; ajs_anonymous_id=dev-1";
        let store = CredentialStore::parse(raw);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("__client"), Some("abc"));
        assert_eq!(store.header_value(), raw);
    }

    #[test]
    fn test_parse_ignores_malformed_fragments() {
        let store = CredentialStore::parse("valid=1; ; garbage ; another=2");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("another"), Some("2"));
    }

    #[test]
    fn test_merge_set_cookie_overwrites_in_place() {
        let mut store = CredentialStore::parse("__client=old; keep=1");
        store.merge_set_cookie(vec![
            "__client=new; Path=/; HttpOnly",
            "__session=sess; Secure",
        ]);
        assert_eq!(store.get("__client"), Some("new"));
        assert_eq!(store.get("__session"), Some("sess"));
        assert_eq!(store.header_value(), "__client=new; keep=1; __session=sess");
    }

    #[test]
    fn test_client_uat_prefers_session_variant() {
        let store =
            CredentialStore::parse("__client_uat=0; __client_uat_Jnxw-muT=1735689600");
        assert_eq!(store.client_uat_timestamp(), Some("1735689600"));

        let zero = CredentialStore::parse("__client_uat=0");
        assert_eq!(zero.client_uat_timestamp(), None);

        let plain = CredentialStore::parse("__client_uat=1735000000");
        assert_eq!(plain.client_uat_timestamp(), Some("1735000000"));
    }

    #[test]
    fn test_device_id_from_analytics_cookie() {
        let store = CredentialStore::parse("ajs_anonymous_id=dev-42");
        assert_eq!(store.device_id(), "dev-42");

        let store = CredentialStore::parse("__client=abc");
        // Random UUID fallback
        assert_eq!(store.device_id().len(), 36);
    }
}
