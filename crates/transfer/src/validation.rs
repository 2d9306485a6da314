use std::path::Path;

/// MIME type allow-list consulted once before a file enters the pipeline.
///
/// An empty list allows everything. A blank entry is kept as-is and only
/// matches a blank MIME type. Entries match case-insensitively and
/// ignore parameters (`text/plain; charset=utf-8` matches `text/plain`).
/// A `type/*` entry matches any subtype.
#[derive(Debug, Clone, Default)]
pub struct FileTypeValidator {
    allowed: Vec<String>,
}

impl FileTypeValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|s| normalize(s.as_ref()))
                .collect(),
        }
    }

    /// Returns `true` if `mime_type` may be uploaded.
    pub fn is_allowed(&self, mime_type: &str) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        let mime = normalize(mime_type);
        self.allowed.iter().any(|entry| match entry.strip_suffix("/*") {
            Some(top) => mime
                .split_once('/')
                .is_some_and(|(t, _)| t == top),
            None => *entry == mime,
        })
    }
}

fn normalize(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

/// Guesses a MIME type from the file extension.
pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "json" => "application/json",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
