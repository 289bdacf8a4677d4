//! Media kind enumeration.

use serde::{Deserialize, Serialize};

/// Kind of media content.
///
/// A closed set: adding a kind is a compile-time-checked change everywhere
/// the kind is matched.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video content (MP4, WebM, MOV)
    #[display("video")]
    Video,
    /// Animated GIF
    #[display("gif")]
    Gif,
    /// Still image (PNG, JPEG, WebP)
    #[display("image")]
    Image,
}

impl MediaKind {
    /// Convert to string representation for storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Gif => "gif",
            MediaKind::Image => "image",
        }
    }

    /// Directory name used by content-addressed layouts.
    pub fn dir_name(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Gif => "gifs",
            MediaKind::Image => "images",
        }
    }

    /// Extension used when a source does not supply one.
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Gif => "gif",
            MediaKind::Image => "png",
        }
    }

    /// Classify a MIME type, ignoring parameters such as `; charset=`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next()?.trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/gif" => Some(MediaKind::Gif),
            m if m.starts_with("image/") => Some(MediaKind::Image),
            m if m.starts_with("video/") => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Classify a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "gif" => Some(MediaKind::Gif),
            "png" | "jpg" | "jpeg" | "webp" => Some(MediaKind::Image),
            "mp4" | "webm" | "mov" | "mkv" | "m4v" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(MediaKind::Video),
            "gif" => Ok(MediaKind::Gif),
            "image" => Ok(MediaKind::Image),
            _ => Err(format!("Unknown media kind: {}", s)),
        }
    }
}
