use std::{path::PathBuf, sync::Arc};

use driveferry_drive::Uploader;

/// Runtime state shared with the polling loop and handlers.
///
/// The relay holds no cross-message state; everything here is set once at
/// startup.
pub struct RelayState {
    pub bot: teloxide::Bot,
    pub bot_username: Option<String>,
    pub uploader: Arc<dyn Uploader>,
    pub download_dir: PathBuf,
}
