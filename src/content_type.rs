//! Content-type resolution from a MIME type or a file extension.

/// Resolves `token` to a content-type string.
///
/// A token containing `/` is already a content type and is returned as is.
/// Anything else is an extension, with or without its leading dot, looked up
/// in the extension table. Textual types get `; charset=utf-8` appended.
/// Unknown extensions resolve to the empty string.
///
/// ```rust
/// use tsuji::resolve_content_type;
///
/// assert_eq!(resolve_content_type("application/json"), "application/json");
/// assert_eq!(resolve_content_type("png"), "image/png");
/// assert_eq!(resolve_content_type(".css"), "text/css; charset=utf-8");
/// assert_eq!(resolve_content_type("no-such-ext"), "");
/// ```
pub fn resolve_content_type(token: &str) -> String {
    if token.contains('/') {
        return token.to_owned();
    }

    let ext = token.strip_prefix('.').unwrap_or(token);
    match mime_guess::from_ext(ext).first_raw() {
        Some(mime) if mime.starts_with("text/") => format!("{mime}; charset=utf-8"),
        Some(mime) => mime.to_owned(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_types_pass_through_unchanged() {
        assert_eq!(resolve_content_type("application/json"), "application/json");
        assert_eq!(resolve_content_type("text/x-custom; charset=latin1"), "text/x-custom; charset=latin1");
    }

    #[test]
    fn leading_dot_is_optional() {
        assert_eq!(resolve_content_type("json"), resolve_content_type(".json"));
        assert_eq!(resolve_content_type("json"), "application/json");
    }

    #[test]
    fn text_types_carry_charset() {
        assert_eq!(resolve_content_type("html"), "text/html; charset=utf-8");
    }

    #[test]
    fn unknown_extension_is_empty() {
        assert_eq!(resolve_content_type("definitely-not-an-extension"), "");
        assert_eq!(resolve_content_type(""), "");
    }
}
