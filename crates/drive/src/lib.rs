//! Google Drive upload backend for driveferry.
//!
//! Exposes the [`Uploader`] seam the relay calls through, plus the
//! [`DriveUploader`] implementation backed by the Drive v3 API with an
//! installed-app OAuth flow and disk-persisted tokens.

pub mod error;
pub mod mime;
pub mod upload;

pub use {
    error::{Error, Result},
    upload::{DriveUploader, UploadedFile, Uploader},
};
