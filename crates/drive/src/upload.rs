//! Resumable uploads to Google Drive.

use std::path::Path;

use {async_trait::async_trait, google_drive3 as drive3, tracing::debug};

use crate::{
    error::{Error, Result},
    mime::mime_for_name,
};

/// Outcome of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Drive file ID.
    pub id: String,
    /// Browser-viewable link for sharing.
    pub web_view_link: String,
}

/// Storage backend seam: takes a local file plus a target name, returns
/// the stored file's identity and shareable link.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path, name: &str) -> Result<UploadedFile>;
}

type HttpsConnector =
    hyper_rustls::HttpsConnector<drive3::hyper_util::client::legacy::connect::HttpConnector>;

/// Drive v3 client authenticated via the installed-app OAuth flow.
///
/// Tokens are persisted to disk, so the interactive browser flow runs only
/// when the token file is absent or no longer usable.
pub struct DriveUploader {
    hub: drive3::DriveHub<HttpsConnector>,
}

impl DriveUploader {
    /// Build an authenticated Drive client.
    ///
    /// Reads the OAuth client secret from `client_secret`, loads or
    /// obtains user tokens, and persists them to `token_store`. When no
    /// usable token exists this opens a browser for consent, which
    /// requires a non-headless environment.
    pub async fn connect(client_secret: &Path, token_store: &Path) -> Result<Self> {
        let secret = yup_oauth2::read_application_secret(client_secret)
            .await
            .map_err(|e| {
                Error::external(
                    format!("read OAuth client secret from {}", client_secret.display()),
                    e,
                )
            })?;

        // Interactive consent on first run; afterwards tokens come from disk.
        // The authenticator carries its own HTTP client; the hub client below
        // needs the body type DriveHub expects, so the two stay separate.
        let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(token_store)
        .build()
        .await
        .map_err(|e| Error::external("build installed-flow authenticator", e))?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| Error::external("load native root certs", e))?
            .https_only()
            .enable_http1()
            .build();

        let client = drive3::hyper_util::client::legacy::Client::builder(
            drive3::hyper_util::rt::TokioExecutor::new(),
        )
        .build(connector);

        Ok(Self {
            hub: drive3::DriveHub::new(client, auth),
        })
    }
}

#[async_trait]
impl Uploader for DriveUploader {
    async fn upload(&self, path: &Path, name: &str) -> Result<UploadedFile> {
        let mime = mime_for_name(name);
        debug!(name, mime = %mime, "starting Drive upload");

        let meta = drive3::api::File {
            name: Some(name.to_string()),
            ..Default::default()
        };

        let content = std::fs::File::open(path)?;

        let (_resp, created) = self
            .hub
            .files()
            .create(meta)
            .param("fields", "id,webViewLink")
            .upload_resumable(content, mime)
            .await
            .map_err(|e| Error::external("upload to Google Drive", e))?;

        let id = created.id.unwrap_or_default();
        // Drive omits webViewLink for some file kinds; the canonical viewer
        // URL works for anything with an ID.
        let web_view_link = created
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{id}/view"));

        debug!(name, id, "Drive upload complete");
        Ok(UploadedFile { id, web_view_link })
    }
}
