use std::path::PathBuf;

use secrecy::Secret;

/// Configuration for the relay bot.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: Secret<String>,

    /// Directory transient attachment downloads are written to.
    pub download_dir: PathBuf,
}

impl TelegramConfig {
    /// Build the config from the `BOT_TOKEN` environment variable.
    ///
    /// A missing or empty token is an error; the binary treats it as fatal
    /// before the polling loop starts.
    pub fn from_env(download_dir: PathBuf) -> crate::Result<Self> {
        Self::from_token(std::env::var("BOT_TOKEN").unwrap_or_default(), download_dir)
    }

    pub fn from_token(token: impl Into<String>, download_dir: PathBuf) -> crate::Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(crate::Error::message(
                "BOT_TOKEN environment variable not set",
            ));
        }
        Ok(Self {
            token: Secret::new(token),
            download_dir,
        })
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("download_dir", &self.download_dir)
            .finish()
    }
}
