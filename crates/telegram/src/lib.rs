//! Telegram side of the driveferry relay.
//!
//! Receives inbound messages via the Telegram Bot API (teloxide), classifies
//! attachments, fetches their bytes to a transient local file and hands them
//! to the configured storage [`Uploader`](driveferry_drive::Uploader).

pub mod attachment;
pub mod bot;
pub mod config;
pub mod handlers;
pub mod state;

pub use {config::TelegramConfig, state::RelayState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error(transparent)]
    Download(#[from] teloxide::DownloadError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
