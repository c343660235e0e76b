//! HTTP method as a typed enum.
//!
//! The RFC 9110 methods get their own variants; anything else a client or an
//! application uses (`PURGE`, `PROPFIND`, ...) is carried verbatim in
//! [`Method::Other`]. Comparison is case-sensitive per RFC 9110 §9.1.

use std::fmt;

/// An HTTP method.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
    /// Any other token, stored as given.
    Other(Box<str>),
}

impl Method {
    /// Returns the wire representation (e.g. `"GET"`).
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connect  => "CONNECT",
            Self::Delete   => "DELETE",
            Self::Get      => "GET",
            Self::Head     => "HEAD",
            Self::Options  => "OPTIONS",
            Self::Patch    => "PATCH",
            Self::Post     => "POST",
            Self::Put      => "PUT",
            Self::Trace    => "TRACE",
            Self::Other(s) => s,
        }
    }

    /// `GET` or `HEAD`: the methods static files are served for.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }

    /// Whether a route registered for `self` handles a request made with
    /// `request`. Identical methods match, and `HEAD` is accepted wherever
    /// `GET` is registered.
    pub(crate) fn accepts(&self, request: &Method) -> bool {
        self == request || (*self == Self::Get && *request == Self::Head)
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        match s {
            "CONNECT" => Self::Connect,
            "DELETE"  => Self::Delete,
            "GET"     => Self::Get,
            "HEAD"    => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH"   => Self::Patch,
            "POST"    => Self::Post,
            "PUT"     => Self::Put,
            "TRACE"   => Self::Trace,
            other     => Self::Other(other.into()),
        }
    }
}

impl From<&http::Method> for Method {
    fn from(m: &http::Method) -> Self {
        Self::from(m.as_str())
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_is_accepted_by_get_only() {
        assert!(Method::Get.accepts(&Method::Head));
        assert!(Method::Get.accepts(&Method::Get));
        assert!(Method::Head.accepts(&Method::Head));
        assert!(!Method::Head.accepts(&Method::Get));
        for m in [Method::Post, Method::Put, Method::Delete] {
            assert!(!m.accepts(&Method::Head));
        }
    }

    #[test]
    fn unknown_tokens_round_trip() {
        let m = Method::from("PURGE");
        assert_eq!(m, Method::Other("PURGE".into()));
        assert_eq!(m.to_string(), "PURGE");
        assert!(m.accepts(&Method::from("PURGE")));
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert_eq!(Method::from("GET"), Method::Get);
        assert_eq!(Method::from("get"), Method::Other("get".into()));
    }

    #[test]
    fn converts_from_http_method() {
        assert_eq!(Method::from(&http::Method::DELETE), Method::Delete);
        assert!(Method::from(&http::Method::HEAD).is_read());
        assert!(!Method::from(&http::Method::POST).is_read());
    }
}
