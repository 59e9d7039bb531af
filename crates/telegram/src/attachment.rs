//! Attachment classification and filename derivation.
//!
//! A message carries at most one media kind; the match below encodes the
//! relay's priority order (document, photo, video, audio, voice, animation)
//! and the per-kind filename rule. Anything else is unsupported.

use teloxide::types::{MediaKind, Message, MessageKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Document,
    Photo,
    Video,
    Audio,
    Voice,
    Animation,
}

impl AttachmentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Voice => "voice",
            Self::Animation => "animation",
        }
    }
}

/// A classified attachment, ready to fetch and upload. Constructed from one
/// inbound message and consumed immediately, never stored.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// Opaque content identifier assigned by the Bot API.
    pub file_id: String,
    /// Target filename: declared by the sender where the format carries one,
    /// otherwise synthesized from the message id.
    pub file_name: String,
}

/// Classify the attachment in a message, deriving the upload filename.
///
/// Returns `None` for text-only messages and for media kinds the relay does
/// not handle (stickers, locations, video notes, ...).
#[must_use]
pub fn classify(msg: &Message) -> Option<Attachment> {
    let MessageKind::Common(common) = &msg.kind else {
        return None;
    };
    let message_id = msg.id.0;

    match &common.media_kind {
        MediaKind::Document(d) => Some(Attachment {
            kind: AttachmentKind::Document,
            file_id: d.document.file.id.clone(),
            file_name: d
                .document
                .file_name
                .clone()
                .unwrap_or_else(|| format!("document_{message_id}")),
        }),
        MediaKind::Photo(p) => {
            // The gateway offers several resolutions; take the largest.
            let best = p
                .photo
                .iter()
                .max_by_key(|ps| u64::from(ps.width) * u64::from(ps.height))?;
            Some(Attachment {
                kind: AttachmentKind::Photo,
                file_id: best.file.id.clone(),
                file_name: format!("photo_{message_id}.jpg"),
            })
        },
        MediaKind::Video(v) => Some(Attachment {
            kind: AttachmentKind::Video,
            file_id: v.video.file.id.clone(),
            file_name: v
                .video
                .file_name
                .clone()
                .unwrap_or_else(|| format!("video_{message_id}.mp4")),
        }),
        MediaKind::Audio(a) => Some(Attachment {
            kind: AttachmentKind::Audio,
            file_id: a.audio.file.id.clone(),
            file_name: a
                .audio
                .file_name
                .clone()
                .unwrap_or_else(|| format!("audio_{message_id}.mp3")),
        }),
        MediaKind::Voice(v) => Some(Attachment {
            kind: AttachmentKind::Voice,
            file_id: v.voice.file.id.clone(),
            // Voice notes are always OGG Opus and never carry a name.
            file_name: format!("voice_{message_id}.ogg"),
        }),
        MediaKind::Animation(a) => Some(Attachment {
            kind: AttachmentKind::Animation,
            file_id: a.animation.file.id.clone(),
            file_name: a
                .animation
                .file_name
                .clone()
                .unwrap_or_else(|| format!("animation_{message_id}.gif")),
        }),
        _ => None,
    }
}

/// Describe an unsupported media kind for logging and the rejection reply.
#[must_use]
pub fn describe_media_kind(msg: &Message) -> Option<&'static str> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(_) => None,
            MediaKind::Animation(_) => Some("animation"),
            MediaKind::Audio(_) => Some("audio"),
            MediaKind::Contact(_) => Some("contact"),
            MediaKind::Document(_) => Some("document"),
            MediaKind::Game(_) => Some("game"),
            MediaKind::Location(_) => Some("location"),
            MediaKind::Photo(_) => Some("photo"),
            MediaKind::Poll(_) => Some("poll"),
            MediaKind::Sticker(_) => Some("sticker"),
            MediaKind::Venue(_) => Some("venue"),
            MediaKind::Video(_) => Some("video"),
            MediaKind::VideoNote(_) => Some("video note"),
            MediaKind::Voice(_) => Some("voice"),
            _ => Some("unknown media"),
        },
        _ => None,
    }
}
