//! Content-type inference from file extensions
//!
//! Used when a fetcher cannot report a content type (local files, upstreams
//! that omit the header).

/// Returns the mime type matching the locator's file extension, or an empty
/// string when the extension is not a recognized image format.
pub fn mime_type_by_file_ext(url: &str) -> &'static str {
    let ext = url
        .rsplit('.')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "",
    }
}
