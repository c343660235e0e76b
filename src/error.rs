//! Unified error type.

use thiserror::Error;

/// The error type returned by tsuji's fallible operations.
///
/// Application-level failures (404, 500, a stale cookie) are expressed as
/// HTTP responses or `None`, not as `Error`s. This type surfaces setup and
/// infrastructure failures: a route that cannot be registered, a config file
/// that cannot be read, a port that cannot be bound.
#[derive(Debug, Error)]
pub enum Error {
    /// Binding, accepting or reading from disk failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A route pattern is not a valid regular expression.
    #[error("invalid route pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The handler takes a different number of string arguments than the
    /// pattern has capture groups.
    #[error("route `{pattern}` has {groups} capture group(s) but its handler takes {params}")]
    ArityMismatch {
        pattern: String,
        groups: usize,
        params: usize,
    },

    /// The configuration file is not valid TOML for [`ServerConfig`](crate::ServerConfig).
    #[error("config: {0}")]
    Config(#[from] toml::de::Error),
}
