//! Response classification.

use reliquary_core::MediaKind;
use reliquary_error::{FetchError, FetchErrorKind};
use reliquary_rate_limit::parse_retry_after;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

/// Map a non-success response to a fetch error.
///
/// Returns `None` for success statuses. Only 429 counts as a rate limit and
/// only 404/410 as gone; everything else is an upstream failure.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, source: &str) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::rate_limited(parse_retry_after(headers)),
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            FetchError::new(FetchErrorKind::NotFound(source.to_string()))
        }
        other => FetchError::new(FetchErrorKind::Upstream(format!(
            "{} returned {}",
            source, other
        ))),
    };
    Some(error)
}

/// Decide kind and extension for a downloaded body.
///
/// The `Content-Type` wins when it names media; otherwise the extension of the
/// URL path decides. Returns `None` when neither identifies a supported kind.
pub fn detect_media(content_type: Option<&str>, url: &reqwest::Url) -> Option<(MediaKind, String)> {
    let url_extension = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    if let Some(kind) = content_type.and_then(MediaKind::from_mime) {
        let extension = url_extension
            .filter(|ext| MediaKind::from_extension(ext) == Some(kind))
            .or_else(|| content_type.and_then(mime_extension).map(str::to_string))
            .unwrap_or_else(|| kind.default_extension().to_string());
        return Some((kind, extension));
    }

    let extension = url_extension?;
    let kind = MediaKind::from_extension(&extension)?;
    Some((kind, extension))
}

fn mime_extension(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match essence.as_str() {
        "image/gif" => "gif",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        _ => return None,
    };
    Some(ext)
}
