//! Grant cookies.
//!
//! A successful verification hands the grant token to the browser as
//! `chat_unlock_<peerId>`. The host framework forwards request cookies to
//! [`ChatLockApi`](crate::api::ChatLockApi) as a name/value map and writes
//! each [`SetCookie`] back as a `Set-Cookie` header.

use std::{collections::HashMap, fmt, time::Duration};

use chatlock_core::UserId;

/// Prefix of every grant cookie name
pub const GRANT_COOKIE_PREFIX: &str = "chat_unlock_";

/// Name of the grant cookie for conversations with `peer`.
pub fn grant_cookie_name(peer: &UserId) -> String {
    format!("{GRANT_COOKIE_PREFIX}{peer}")
}

/// A `Set-Cookie` instruction for the host framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    /// Cookie name
    pub name: String,
    /// Cookie value, empty when clearing
    pub value: String,
    /// Lifetime; zero clears the cookie
    pub max_age: Duration,
}

impl SetCookie {
    /// Cookie carrying `token` for `peer`, living as long as the grant.
    pub fn grant(peer: &UserId, token: String, ttl: Duration) -> Self {
        Self { name: grant_cookie_name(peer), value: token, max_age: ttl }
    }

    /// Cookie that clears any grant for `peer`.
    pub fn clear_grant(peer: &UserId) -> Self {
        Self { name: grant_cookie_name(peer), value: String::new(), max_age: Duration::ZERO }
    }

    /// True if this instruction removes the cookie.
    pub fn is_clear(&self) -> bool {
        self.max_age.is_zero()
    }
}

impl fmt::Display for SetCookie {
    /// `Set-Cookie` header value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            self.name,
            self.value,
            self.max_age.as_secs()
        )
    }
}

/// Parse a `Cookie` request header into a name/value map.
///
/// Pairs without `=` are skipped. On duplicate names the first wins, as
/// browsers send the most specific path first.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        cookies.entry(name.to_string()).or_insert_with(|| value.trim().to_string());
    }
    cookies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> UserId {
        UserId::new("65f1c0ffee").unwrap()
    }

    #[test]
    fn grant_cookie_attributes() {
        let cookie = SetCookie::grant(&peer(), "tok".to_string(), Duration::from_secs(900));

        assert_eq!(
            cookie.to_string(),
            "chat_unlock_65f1c0ffee=tok; HttpOnly; SameSite=Lax; Path=/; Max-Age=900"
        );
        assert!(!cookie.is_clear());
    }

    #[test]
    fn clearing_cookie_has_zero_max_age() {
        let cookie = SetCookie::clear_grant(&peer());

        assert_eq!(
            cookie.to_string(),
            "chat_unlock_65f1c0ffee=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
        );
        assert!(cookie.is_clear());
    }

    #[test]
    fn parses_cookie_header() {
        let cookies = parse_cookie_header("jwt=abc; chat_unlock_p=t0k-_; junk; =x; jwt=later");

        assert_eq!(cookies.get("jwt").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("chat_unlock_p").map(String::as_str), Some("t0k-_"));
        assert_eq!(cookies.len(), 2);
    }
}
