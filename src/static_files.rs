//! Static file lookup and serving.
//!
//! A request path is resolved against each static directory in turn; the
//! first regular file found is served with a content type guessed from its
//! extension and a `Last-Modified` header. `If-Modified-Since` requests for
//! unchanged files get `304 Not Modified`. Paths containing `..` segments
//! never resolve. File contents are streamed in chunks, never held whole.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::TryStreamExt;
use http::header::{CONTENT_TYPE, IF_MODIFIED_SINCE, LAST_MODIFIED};
use http::{HeaderMap, StatusCode};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::content_type::resolve_content_type;
use crate::response::ResponseSink;

pub(crate) struct StaticFiles {
    dirs: Vec<PathBuf>,
}

impl StaticFiles {
    pub(crate) fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Finds the regular file `name` refers to, trying directories in order.
    pub(crate) async fn resolve(&self, name: &str) -> Option<(PathBuf, Metadata)> {
        let relative = relative_path(name)?;
        for dir in &self.dirs {
            let candidate = dir.join(&relative);
            match tokio::fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() => return Some((candidate, meta)),
                _ => continue,
            }
        }
        None
    }

    /// Writes the file `name` refers to into `sink`. Returns `false`, leaving
    /// `sink` untouched, when there is no such file.
    pub(crate) async fn serve(&self, name: &str, request_headers: &HeaderMap, sink: &mut ResponseSink) -> bool {
        let Some((path, meta)) = self.resolve(name).await else {
            return false;
        };
        let modified = meta.modified().ok().map(whole_seconds);

        if let (Some(modified), Some(since)) = (modified, if_modified_since(request_headers)) {
            if modified <= since {
                sink.write_status(StatusCode::NOT_MODIFIED);
                return true;
            }
        }

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "static file unreadable");
                return false;
            }
        };

        sink.set_header(CONTENT_TYPE.as_str(), &content_type_for(&path), true);
        if let Some(modified) = modified {
            sink.set_header(LAST_MODIFIED.as_str(), &httpdate::fmt_http_date(modified), true);
        }
        let body = StreamBody::new(ReaderStream::new(file).map_ok(Frame::data)).boxed_unsync();
        sink.stream(body, meta.len());
        true
    }
}

/// Turns a URL path into a relative filesystem path, or `None` if it tries to
/// leave the static directory.
fn relative_path(name: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') || s.contains('\0') => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}

fn content_type_for(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(resolve_content_type)
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_owned())
}

fn if_modified_since(headers: &HeaderMap) -> Option<SystemTime> {
    let value = headers.get(IF_MODIFIED_SINCE)?.to_str().ok()?;
    httpdate::parse_http_date(value).ok()
}

/// HTTP dates have one-second resolution.
fn whole_seconds(t: SystemTime) -> SystemTime {
    let secs = t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.css"), "body{}").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs").join("index.html"), "<h1>docs</h1>").unwrap();
        std::fs::write(dir.path().join("blob"), [0u8, 1, 2]).unwrap();
        dir
    }

    #[test]
    fn parent_segments_never_resolve() {
        assert_eq!(relative_path("/a/../b"), None);
        assert_eq!(relative_path("/.."), None);
        assert_eq!(relative_path("/a/./b//c"), Some(PathBuf::from("a/b/c")));
        assert_eq!(relative_path("/"), Some(PathBuf::new()));
    }

    #[tokio::test]
    async fn resolves_files_not_directories() {
        let dir = site();
        let files = StaticFiles::new(vec![dir.path().to_path_buf()]);
        assert!(files.resolve("/app.css").await.is_some());
        assert!(files.resolve("/docs").await.is_none());
        assert!(files.resolve("/").await.is_none());
        assert!(files.resolve("/missing.txt").await.is_none());
    }

    #[tokio::test]
    async fn later_directories_are_fallbacks() {
        let empty = tempfile::tempdir().unwrap();
        let dir = site();
        let files = StaticFiles::new(vec![empty.path().to_path_buf(), dir.path().to_path_buf()]);
        let (path, _) = files.resolve("/app.css").await.unwrap();
        assert!(path.starts_with(dir.path()));
    }

    #[tokio::test]
    async fn serve_sets_type_and_last_modified() {
        let dir = site();
        let files = StaticFiles::new(vec![dir.path().to_path_buf()]);
        let mut sink = ResponseSink::new();
        assert!(files.serve("/app.css", &HeaderMap::new(), &mut sink).await);
        assert_eq!(sink.status(), StatusCode::OK);
        assert_eq!(sink.headers()[CONTENT_TYPE], "text/css; charset=utf-8");
        assert!(sink.headers().contains_key(LAST_MODIFIED));

        let response = sink.into_response();
        assert_eq!(response.headers()["content-length"], "6");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "body{}");
    }

    #[tokio::test]
    async fn large_file_arrives_in_chunks() {
        let dir = site();
        let contents: Vec<u8> = (0..100 * 1024).map(|i| (i % 251) as u8).collect();
        std::fs::write(dir.path().join("big.bin"), &contents).unwrap();

        let files = StaticFiles::new(vec![dir.path().to_path_buf()]);
        let mut sink = ResponseSink::new();
        assert!(files.serve("/big.bin", &HeaderMap::new(), &mut sink).await);
        let response = sink.into_response();
        assert_eq!(response.headers()["content-length"], contents.len().to_string());

        let mut body = response.into_body();
        let mut received = Vec::new();
        let mut frames = 0;
        while let Some(frame) = body.frame().await {
            let data = frame.unwrap().into_data().unwrap();
            received.extend_from_slice(&data);
            frames += 1;
        }
        assert!(frames > 1, "file was sent as a single frame");
        assert_eq!(received, contents);
    }

    #[tokio::test]
    async fn unknown_extension_is_octet_stream() {
        let dir = site();
        let files = StaticFiles::new(vec![dir.path().to_path_buf()]);
        let mut sink = ResponseSink::new();
        assert!(files.serve("/blob", &HeaderMap::new(), &mut sink).await);
        assert_eq!(sink.headers()[CONTENT_TYPE], "application/octet-stream");
    }

    #[tokio::test]
    async fn unchanged_file_is_not_modified() {
        let dir = site();
        let files = StaticFiles::new(vec![dir.path().to_path_buf()]);
        let mut headers = HeaderMap::new();
        let later = SystemTime::now() + Duration::from_secs(60);
        headers.insert(IF_MODIFIED_SINCE, httpdate::fmt_http_date(later).parse().unwrap());

        let mut sink = ResponseSink::new();
        assert!(files.serve("/app.css", &headers, &mut sink).await);
        assert_eq!(sink.status(), StatusCode::NOT_MODIFIED);
        let body = sink.into_response().into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn missing_file_leaves_sink_untouched() {
        let dir = site();
        let files = StaticFiles::new(vec![dir.path().to_path_buf()]);
        let mut sink = ResponseSink::new();
        assert!(!files.serve("/nope", &HeaderMap::new(), &mut sink).await);
        assert!(!sink.is_committed());
        assert!(sink.headers().is_empty());
    }
}
