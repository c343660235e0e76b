//! Cookies: `Set-Cookie` rendering, request cookie lookup and signed values.
//!
//! # Signed cookie wire format
//!
//! ```text
//! <base64(value)>|<unix timestamp>|<hex(hmac_sha1(secret, base64 || timestamp))>
//! ```
//!
//! The signature covers the *encoded* value followed by the decimal
//! timestamp. A signed value is rejected once its timestamp is more than 31
//! days old, whatever the cookie's own `Expires` says.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use http::HeaderMap;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// How long a signed value stays valid after it was issued.
pub const SIGNED_COOKIE_MAX_AGE: Duration = Duration::from_secs(31 * 86_400);

/// Expiry used for `max_age == 0`, and the latest expiry any cookie gets:
/// the last second a signed 32-bit `time_t` can hold.
const FAR_FUTURE_SECS: u64 = 2_147_483_647;

// ── Cookie ────────────────────────────────────────────────────────────────────

/// An outgoing cookie, rendered as a `Set-Cookie` header value.
///
/// Always scoped to `Path=/`. `max_age` is in seconds from now; `0` means
/// "as long as possible" and a negative age expires the cookie immediately.
#[derive(Clone, Debug)]
pub struct Cookie {
    name: String,
    value: String,
    domain: String,
    expires: SystemTime,
}

impl Cookie {
    pub fn new(name: &str, value: &str, max_age: i64, domain: &str) -> Self {
        let expires = if max_age == 0 {
            UNIX_EPOCH + Duration::from_secs(FAR_FUTURE_SECS)
        } else {
            let at = (unix_now() as i64).saturating_add(max_age);
            UNIX_EPOCH + Duration::from_secs(at.clamp(0, FAR_FUTURE_SECS as i64) as u64)
        };
        Self {
            name: name.chars().filter(|c| is_token_char(*c)).collect(),
            value: sanitize_value(value),
            domain: domain.trim_start_matches('.').to_owned(),
            expires,
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn value(&self) -> &str { &self.value }
    pub fn expires(&self) -> SystemTime { self.expires }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path=/", self.name, self.value)?;
        if !self.domain.is_empty() {
            write!(f, "; Domain={}", self.domain)?;
        }
        write!(f, "; Expires={}", httpdate::fmt_http_date(self.expires))
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?={}".contains(c)
}

/// Drops octets a cookie value may not carry and quotes values containing a
/// space or comma.
fn sanitize_value(value: &str) -> String {
    let clean: String = value
        .chars()
        .filter(|c| (' '..='~').contains(c) && !matches!(c, '"' | ';' | '\\'))
        .collect();
    if clean.contains([' ', ',']) {
        format!("\"{clean}\"")
    } else {
        clean
    }
}

/// Returns the value of the first request cookie called `name`, across every
/// `Cookie` header.
pub(crate) fn find<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| {
            let v = v.trim();
            v.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(v)
        })
}

// ── CookieSigner ──────────────────────────────────────────────────────────────

/// Signs and verifies cookie values with a shared secret.
///
/// ```rust
/// use tsuji::CookieSigner;
///
/// let signer = CookieSigner::new(b"secret");
/// let cookie = signer.sign("hello");
/// assert_eq!(signer.verify(&cookie).as_deref(), Some("hello"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct CookieSigner<'a> {
    secret: &'a [u8],
}

impl<'a> CookieSigner<'a> {
    pub fn new(secret: &'a [u8]) -> Self {
        Self { secret }
    }

    /// Signs `value`, stamped with the current time.
    pub fn sign(&self, value: &str) -> String {
        self.sign_at(value, unix_now())
    }

    /// Signs `value`, stamped with `timestamp` (unix seconds).
    pub fn sign_at(&self, value: &str, timestamp: u64) -> String {
        let encoded = STANDARD.encode(value);
        let timestamp = timestamp.to_string();
        let signature = hex::encode(self.mac(encoded.as_bytes(), &timestamp).finalize().into_bytes());
        format!("{encoded}|{timestamp}|{signature}")
    }

    /// Returns the original value if `cookie` carries a valid signature and
    /// is no older than [`SIGNED_COOKIE_MAX_AGE`].
    pub fn verify(&self, cookie: &str) -> Option<String> {
        self.verify_at(cookie, unix_now())
    }

    /// [`verify`](Self::verify) against an explicit `now` (unix seconds).
    pub fn verify_at(&self, cookie: &str, now: u64) -> Option<String> {
        let mut parts = cookie.splitn(3, '|');
        let (encoded, timestamp, signature) = (parts.next()?, parts.next()?, parts.next()?);

        if !self.signature_matches(encoded.as_bytes(), timestamp, signature) {
            return None;
        }

        let issued: u64 = timestamp.parse().ok()?;
        if now.saturating_sub(issued) > SIGNED_COOKIE_MAX_AGE.as_secs() {
            return None;
        }

        let raw = STANDARD.decode(encoded).ok()?;
        String::from_utf8(raw).ok()
    }

    fn mac(&self, encoded: &[u8], timestamp: &str) -> HmacSha1 {
        let mut mac = HmacSha1::new_from_slice(self.secret).expect("HMAC accepts keys of any length");
        mac.update(encoded);
        mac.update(timestamp.as_bytes());
        mac
    }

    /// Constant-time comparison against a lowercase hex signature.
    fn signature_matches(&self, encoded: &[u8], timestamp: &str, signature: &str) -> bool {
        if !signature.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return false;
        }
        match hex::decode(signature) {
            Ok(expected) => self.mac(encoded, timestamp).verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 86_400;

    #[test]
    fn hmac_matches_rfc2202_vector() {
        let signer = CookieSigner::new(b"Jefe");
        let mac = signer.mac(b"what do ya want ", "for nothing?").finalize().into_bytes();
        assert_eq!(hex::encode(mac), "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79");
    }

    #[test]
    fn wire_format_is_encoded_timestamp_signature() {
        let cookie = CookieSigner::new(b"k").sign_at("hello", 1_700_000_000);
        let parts: Vec<&str> = cookie.split('|').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "aGVsbG8=");
        assert_eq!(parts[1], "1700000000");
        assert_eq!(parts[2].len(), 40);
    }

    #[test]
    fn round_trip_within_window() {
        let signer = CookieSigner::new(b"secret");
        let cookie = signer.sign_at("hello", 1_000 * DAY);
        assert_eq!(signer.verify_at(&cookie, 1_000 * DAY + 3600).as_deref(), Some("hello"));
        assert_eq!(signer.verify_at(&cookie, 1_031 * DAY).as_deref(), Some("hello"));
    }

    #[test]
    fn stale_cookie_is_rejected() {
        let signer = CookieSigner::new(b"secret");
        let cookie = signer.sign_at("hello", 1_000 * DAY);
        assert_eq!(signer.verify_at(&cookie, 1_032 * DAY), None);
        assert_eq!(signer.verify_at(&cookie, 1_031 * DAY + 1), None);
    }

    #[test]
    fn tampered_value_is_rejected() {
        let signer = CookieSigner::new(b"secret");
        let cookie = signer.sign_at("hello", 1_000 * DAY);
        let tampered = cookie.replacen("aGVsbG8=", "aGVsbG9=", 1);
        assert_ne!(tampered, cookie);
        assert_eq!(signer.verify_at(&tampered, 1_000 * DAY), None);
    }

    #[test]
    fn tampered_timestamp_is_rejected() {
        let signer = CookieSigner::new(b"secret");
        let cookie = signer.sign_at("hello", 1_000 * DAY);
        let tampered = cookie.replacen(&(1_000 * DAY).to_string(), &(1_001 * DAY).to_string(), 1);
        assert_eq!(signer.verify_at(&tampered, 1_001 * DAY), None);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let cookie = CookieSigner::new(b"one").sign_at("hello", 10);
        assert_eq!(CookieSigner::new(b"two").verify_at(&cookie, 10), None);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let signer = CookieSigner::new(b"secret");
        assert_eq!(signer.verify_at("", 0), None);
        assert_eq!(signer.verify_at("aGVsbG8=|10", 10), None);
        assert_eq!(signer.verify_at("aGVsbG8=", 10), None);

        let cookie = signer.sign_at("hello", 10);
        assert_eq!(signer.verify_at(&cookie.to_uppercase(), 10), None);
        assert_eq!(signer.verify_at(&format!("{cookie}|extra"), 10), None);
    }

    #[test]
    fn value_with_separator_survives() {
        let signer = CookieSigner::new(b"secret");
        let cookie = signer.sign_at("a|b|c", 10);
        assert_eq!(signer.verify_at(&cookie, 10).as_deref(), Some("a|b|c"));
    }

    #[test]
    fn cookie_renders_path_domain_and_expiry() {
        let c = Cookie::new("sid", "abc", 0, ".example.com");
        assert_eq!(
            c.to_string(),
            "sid=abc; Path=/; Domain=example.com; Expires=Tue, 19 Jan 2038 03:14:07 GMT"
        );
    }

    #[test]
    fn cookie_without_domain_omits_attribute() {
        let c = Cookie::new("sid", "abc", 3600, "");
        let rendered = c.to_string();
        assert!(rendered.starts_with("sid=abc; Path=/; Expires="));
        assert!(!rendered.contains("Domain"));
        let ahead = c.expires().duration_since(SystemTime::now()).unwrap();
        assert!(ahead > Duration::from_secs(3500) && ahead <= Duration::from_secs(3600));
    }

    #[test]
    fn negative_age_expires_in_the_past() {
        let c = Cookie::new("sid", "", -60, "");
        assert!(c.expires() < SystemTime::now());
    }

    #[test]
    fn extreme_ages_are_clamped() {
        let far = UNIX_EPOCH + Duration::from_secs(FAR_FUTURE_SECS);
        for age in [i64::MAX, 300_000_000_000] {
            let cookie = Cookie::new("a", "b", age, "");
            assert_eq!(cookie.expires(), far);
            assert!(cookie.to_string().ends_with("Expires=Tue, 19 Jan 2038 03:14:07 GMT"));
        }

        let cookie = Cookie::new("a", "b", i64::MIN, "");
        assert_eq!(cookie.expires(), UNIX_EPOCH);
        assert!(cookie.to_string().ends_with("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }

    #[test]
    fn values_are_sanitized() {
        assert_eq!(Cookie::new("a", "x;y\"z", 1, "").value(), "xyz");
        assert_eq!(Cookie::new("a", "hello world", 1, "").value(), "\"hello world\"");
        assert_eq!(Cookie::new("a b", "v", 1, "").name(), "ab");
    }

    #[test]
    fn find_scans_every_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.append(http::header::COOKIE, "a=1; b=2".parse().unwrap());
        headers.append(http::header::COOKIE, "c=\"quoted\"; sig=YQ==|1|ff".parse().unwrap());

        assert_eq!(find(&headers, "a"), Some("1"));
        assert_eq!(find(&headers, "b"), Some("2"));
        assert_eq!(find(&headers, "c"), Some("quoted"));
        assert_eq!(find(&headers, "sig"), Some("YQ==|1|ff"));
        assert_eq!(find(&headers, "missing"), None);
    }
}
