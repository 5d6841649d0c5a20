//! Request cookie parsing and `Set-Cookie` serialization.

use std::fmt;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use http::header::COOKIE;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Characters escaped in cookie values on serialization.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

/// The `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// `SameSite=Strict`
    Strict,
    /// `SameSite=Lax`
    Lax,
    /// `SameSite=None`
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("Strict"),
            Self::Lax => f.write_str("Lax"),
            Self::None => f.write_str("None"),
        }
    }
}

/// A single cookie with its `Set-Cookie` attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value, unencoded.
    pub value: String,
    /// `Path` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// `Domain` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// `Max-Age` attribute, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    /// `Expires` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    /// `HttpOnly` flag.
    #[serde(default)]
    pub http_only: bool,
    /// `Secure` flag.
    #[serde(default)]
    pub secure: bool,
    /// `SameSite` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
}

impl Cookie {
    /// Create a cookie with no attributes.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Set the `Path` attribute.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the `Domain` attribute.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the `Max-Age` attribute.
    #[must_use]
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Set the `Expires` attribute.
    #[must_use]
    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Set the `HttpOnly` flag.
    #[must_use]
    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    /// Set the `Secure` flag.
    #[must_use]
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Set the `SameSite` attribute.
    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Render the cookie as a `Set-Cookie` header value.
    ///
    /// ```
    /// use routestack_core::{Cookie, SameSite};
    ///
    /// let cookie = Cookie::new("sid", "abc").with_path("/").http_only().with_same_site(SameSite::Lax);
    /// assert_eq!(cookie.serialize(), "sid=abc; Path=/; HttpOnly; SameSite=Lax");
    /// ```
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = format!(
            "{}={}",
            self.name,
            utf8_percent_encode(&self.value, COOKIE_VALUE)
        );
        if let Some(path) = &self.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(expires) = self.expires {
            out.push_str(&format!(
                "; Expires={}",
                expires.format("%a, %d %b %Y %H:%M:%S GMT")
            ));
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if let Some(same_site) = self.same_site {
            out.push_str(&format!("; SameSite={same_site}"));
        }
        out
    }
}

/// An ordered set of cookies keyed by name.
///
/// Setting a cookie whose name already exists replaces it in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    /// Create an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` request header value (`a=1; b=2`).
    ///
    /// Pairs without `=` are ignored. Values are percent-decoded and
    /// surrounding double quotes are removed.
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let mut jar = Self::new();
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            let value = percent_decode_str(value).decode_utf8_lossy();
            jar.set(Cookie::new(name, value));
        }
        jar
    }

    /// Collect every `Cookie` header of a request.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::new();
        for value in headers.get_all(COOKIE) {
            if let Ok(raw) = value.to_str() {
                jar.extend(Self::parse(raw));
            }
        }
        jar
    }

    /// Look up a cookie by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// All cookies in insertion order.
    #[must_use]
    pub fn get_all(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Insert or replace a cookie.
    pub fn set(&mut self, cookie: Cookie) {
        match self.cookies.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    /// Remove a cookie by name, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Cookie> {
        let pos = self.cookies.iter().position(|c| c.name == name)?;
        Some(self.cookies.remove(pos))
    }

    /// Iterate over the cookies.
    pub fn iter(&self) -> std::slice::Iter<'_, Cookie> {
        self.cookies.iter()
    }

    /// Number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Whether the jar is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Name/value pairs as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.cookies
                .iter()
                .map(|c| (c.name.clone(), serde_json::Value::String(c.value.clone())))
                .collect(),
        )
    }
}

impl Extend<Cookie> for CookieJar {
    fn extend<T: IntoIterator<Item = Cookie>>(&mut self, iter: T) {
        for cookie in iter {
            self.set(cookie);
        }
    }
}

impl IntoIterator for CookieJar {
    type Item = Cookie;
    type IntoIter = std::vec::IntoIter<Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.cookies.into_iter()
    }
}

impl<'a> IntoIterator for &'a CookieJar {
    type Item = &'a Cookie;
    type IntoIter = std::slice::Iter<'a, Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.cookies.iter()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use http::HeaderValue;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_should_parse_cookie_header() {
        let jar = CookieJar::parse("sid=abc; theme=\"dark\"; name=Jane%20Doe; broken");
        assert_eq!(jar.len(), 3);
        assert_eq!(jar.get("sid").map(|c| c.value.as_str()), Some("abc"));
        assert_eq!(jar.get("theme").map(|c| c.value.as_str()), Some("dark"));
        assert_eq!(jar.get("name").map(|c| c.value.as_str()), Some("Jane Doe"));
        assert!(jar.get("broken").is_none());
    }

    #[test]
    fn test_should_merge_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("b=2; a=3"));

        let jar = CookieJar::from_headers(&headers);
        assert_eq!(jar.to_json(), json!({"a": "3", "b": "2"}));
    }

    #[test]
    fn test_should_replace_cookie_with_same_name() {
        let mut jar = CookieJar::new();
        jar.set(Cookie::new("a", "1"));
        jar.set(Cookie::new("b", "2"));
        jar.set(Cookie::new("a", "3"));

        let names: Vec<_> = jar.iter().map(|c| (c.name.as_str(), c.value.as_str())).collect();
        assert_eq!(names, vec![("a", "3"), ("b", "2")]);
        assert!(jar.remove("a").is_some());
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn test_should_serialize_all_attributes() {
        let expires = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let cookie = Cookie::new("sid", "a b;c")
            .with_path("/api")
            .with_domain("example.com")
            .with_max_age(3600)
            .with_expires(expires)
            .http_only()
            .secure()
            .with_same_site(SameSite::Strict);

        assert_eq!(
            cookie.serialize(),
            "sid=a%20b%3Bc; Path=/api; Domain=example.com; Max-Age=3600; \
             Expires=Wed, 02 Jan 2030 03:04:05 GMT; HttpOnly; Secure; SameSite=Strict"
        );
    }

    #[test]
    fn test_should_serialize_bare_cookie() {
        assert_eq!(Cookie::new("a", "1").serialize(), "a=1");
    }
}
