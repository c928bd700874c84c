//! Session cookies mirroring the token pair

use super::tokens::TokenPair;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::time::Duration;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Cookie attributes shared by both session cookies
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age: Duration,
    pub refresh_max_age: Duration,
}

fn session_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age.as_secs() as i64))
        .build()
}

/// Set both cookies from a freshly issued pair
pub fn set_session(jar: CookieJar, pair: &TokenPair, policy: &CookiePolicy) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_COOKIE,
        pair.access_token.clone(),
        policy.access_max_age,
        policy.secure,
    ))
    .add(session_cookie(
        REFRESH_COOKIE,
        pair.refresh_token.clone(),
        policy.refresh_max_age,
        policy.secure,
    ))
}

fn expired_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// Expire both cookies, whether or not the request carried them
pub fn clear_session(jar: CookieJar, policy: &CookiePolicy) -> CookieJar {
    jar.add(expired_cookie(ACCESS_COOKIE, policy.secure))
        .add(expired_cookie(REFRESH_COOKIE, policy.secure))
}

/// Refresh token from the cookie, falling back to an explicit body value
pub fn refresh_token(jar: &CookieJar, body: Option<&str>) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| body.map(str::to_string))
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CookiePolicy {
        CookiePolicy {
            secure: true,
            access_max_age: Duration::from_secs(3600),
            refresh_max_age: Duration::from_secs(604800),
        }
    }

    #[test]
    fn test_set_session_cookies() {
        let pair = TokenPair {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };
        let jar = set_session(CookieJar::new(), &pair, &policy());

        let access = jar.get(ACCESS_COOKIE).unwrap();
        assert_eq!(access.value(), "a");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.max_age(), Some(time::Duration::seconds(3600)));
        assert_eq!(
            jar.get(REFRESH_COOKIE).unwrap().max_age(),
            Some(time::Duration::seconds(604800))
        );
    }

    #[test]
    fn test_clear_session_without_request_cookies() {
        let jar = clear_session(CookieJar::new(), &policy());

        let access = jar.get(ACCESS_COOKIE).unwrap();
        assert_eq!(access.value(), "");
        assert_eq!(access.max_age(), Some(time::Duration::ZERO));
        assert!(jar.get(REFRESH_COOKIE).is_some());
    }

    #[test]
    fn test_refresh_token_sources() {
        let jar = CookieJar::new();
        assert_eq!(refresh_token(&jar, None), None);
        assert_eq!(refresh_token(&jar, Some("body")), Some("body".to_string()));

        let jar = jar.add(Cookie::new(REFRESH_COOKIE, "cookie"));
        assert_eq!(refresh_token(&jar, Some("body")), Some("cookie".to_string()));
    }
}
