//! Filename-based MIME derivation.
//!
//! The Drive upload API wants an explicit content type; the attachment
//! filenames we derive always carry an extension for the synthesized
//! names, so a small table covers the common cases.

use mime::{APPLICATION_OCTET_STREAM, Mime};

/// Derive a MIME type from a filename extension.
///
/// Unknown or missing extensions fall back to `application/octet-stream`,
/// which Drive accepts for any content.
#[must_use]
pub fn mime_for_name(name: &str) -> Mime {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return APPLICATION_OCTET_STREAM;
    };

    let essence = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "txt" => "text/plain",
        _ => return APPLICATION_OCTET_STREAM,
    };

    essence.parse().unwrap_or(APPLICATION_OCTET_STREAM)
}
