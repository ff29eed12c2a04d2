// ABOUTME: Secure cookie builder and Cookie header parsing
// ABOUTME: Sets and clears the session and remember-token cookies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use axum::http::{header, HeaderMap, HeaderValue};
use cpoint_core::constants::auth::{REMEMBER_COOKIE, SESSION_COOKIE};

/// `SameSite` attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// Only first-party requests
    Strict,
    /// First-party plus top-level navigations
    Lax,
}

impl SameSite {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
        }
    }
}

/// A `Set-Cookie` value under construction
#[derive(Debug, Clone)]
pub struct SecureCookieConfig {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// `Max-Age` in seconds; zero expires the cookie
    pub max_age_secs: i64,
    /// `HttpOnly` attribute
    pub http_only: bool,
    /// `Secure` attribute
    pub secure: bool,
    /// `SameSite` attribute
    pub same_site: SameSite,
}

impl SecureCookieConfig {
    /// `HttpOnly`, `Secure`, `SameSite=Lax` cookie on `/`
    #[must_use]
    pub const fn new(name: String, value: String, max_age_secs: i64) -> Self {
        Self {
            name,
            value,
            max_age_secs,
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
        }
    }

    /// Toggle the `Secure` attribute
    #[must_use]
    pub const fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Render the `Set-Cookie` header value
    #[must_use]
    pub fn build(&self) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; SameSite={}",
            self.name,
            self.value,
            self.max_age_secs,
            self.same_site.as_str()
        );
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Append the cookie to response headers
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.build()) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

/// Set the session cookie
pub fn set_auth_cookie(headers: &mut HeaderMap, token: &str, max_age_secs: i64, secure: bool) {
    SecureCookieConfig::new(SESSION_COOKIE.to_owned(), token.to_owned(), max_age_secs)
        .secure(secure)
        .apply(headers);
}

/// Set the remember-token cookie
pub fn set_remember_cookie(headers: &mut HeaderMap, token: &str, max_age_secs: i64, secure: bool) {
    SecureCookieConfig::new(REMEMBER_COOKIE.to_owned(), token.to_owned(), max_age_secs)
        .secure(secure)
        .apply(headers);
}

/// Expire both authentication cookies
pub fn clear_auth_cookies(headers: &mut HeaderMap, secure: bool) {
    for name in [SESSION_COOKIE, REMEMBER_COOKIE] {
        SecureCookieConfig::new(name.to_owned(), String::new(), 0)
            .secure(secure)
            .apply(headers);
    }
}

/// Value of a named cookie from the `Cookie` request headers
#[must_use]
pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_owned())
        .filter(|value| !value.is_empty())
}
