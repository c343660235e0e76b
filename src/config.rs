//! Server-wide settings shared read-only by every request.
//!
//! ```toml
//! static_dir    = "public"
//! cookie_domain = "example.com"
//! cookie_secret = "7C19QRmwf3mHZ9CPAaPQ0hsWeufKd"
//! recover_panic = true
//! max_body_bytes = 10485760
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Settings consumed by the [`Dispatcher`](crate::Dispatcher) and handed to
/// every [`Context`](crate::Context).
///
/// Every field is optional in the config file; missing fields take the
/// [`Default`] value.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory static files are served from. When unset, `static/` next to
    /// the executable and `static/` under the working directory are tried in
    /// that order.
    pub static_dir: Option<PathBuf>,

    /// `Domain` attribute of every cookie set through the context. Empty
    /// means no `Domain` attribute.
    pub cookie_domain: String,

    /// Key for signed cookies. Signed cookies are refused while empty.
    pub cookie_secret: String,

    /// Turn handler panics into `500` responses. When `false`, a panic
    /// unwinds into the connection task.
    pub recover_panic: bool,

    /// Largest request body read into memory, in bytes. Longer bodies are
    /// answered with `413 Payload Too Large` before any route runs.
    pub max_body_bytes: usize,
}

/// Default for [`ServerConfig::max_body_bytes`]: 10 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 << 20;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            static_dir: None,
            cookie_domain: String::new(),
            cookie_secret: String::new(),
            recover_panic: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    /// Parses a config from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Directories searched for static files, in lookup order.
    pub(crate) fn static_dirs(&self) -> Vec<PathBuf> {
        if let Some(dir) = &self.static_dir {
            return vec![dir.clone()];
        }

        let mut dirs = Vec::with_capacity(2);
        if let Some(parent) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
            dirs.push(parent.join("static"));
        }
        if let Ok(cwd) = std::env::current_dir() {
            dirs.push(cwd.join("static"));
        }
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ServerConfig::from_toml(r#"cookie_secret = "s3cret""#).unwrap();
        assert_eq!(config.cookie_secret, "s3cret");
        assert!(config.recover_panic);
        assert!(config.static_dir.is_none());
        assert!(config.cookie_domain.is_empty());
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn body_limit_is_configurable() {
        let config = ServerConfig::from_toml("max_body_bytes = 4096").unwrap();
        assert_eq!(config.max_body_bytes, 4096);
    }

    #[test]
    fn recovery_can_be_disabled() {
        let config = ServerConfig::from_toml("recover_panic = false\nstatic_dir = \"www\"").unwrap();
        assert!(!config.recover_panic);
        assert_eq!(config.static_dir, Some(PathBuf::from("www")));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = ServerConfig::from_toml("recover_panic = maybe").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn configured_static_dir_is_the_only_candidate() {
        let config = ServerConfig { static_dir: Some("assets".into()), ..ServerConfig::default() };
        assert_eq!(config.static_dirs(), vec![PathBuf::from("assets")]);
    }

    #[test]
    fn default_static_dirs_end_with_cwd() {
        let dirs = ServerConfig::default().static_dirs();
        let cwd = std::env::current_dir().unwrap().join("static");
        assert_eq!(dirs.last(), Some(&cwd));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "cookie_domain = \"example.com\"").unwrap();
        assert_eq!(ServerConfig::load(&path).unwrap().cookie_domain, "example.com");
        assert!(matches!(ServerConfig::load(dir.path().join("nope.toml")), Err(Error::Io(_))));
    }
}
