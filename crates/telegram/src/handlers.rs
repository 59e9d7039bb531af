//! Inbound message handling: the classify → fetch → upload → cleanup →
//! reply pipeline. One reply per message, no retries; every recoverable
//! failure is reported to the sender and leaves the loop ready for the
//! next message.

use std::path::Path;

use {
    teloxide::{net::Download, prelude::*},
    tokio::io::AsyncWriteExt,
    tracing::{debug, info, warn},
};

use crate::{
    attachment::{self, Attachment},
    state::RelayState,
};

const USAGE: &str = "Send me any file (document, photo, video, audio, voice message or \
                     animation, up to 2 GB) and I will upload it to Google Drive.";

const UNSUPPORTED: &str = "Unsupported file type. Please send a document, photo, video, audio, \
                           voice message, or animation.";

/// Handle a single inbound Telegram message (called from the polling loop).
pub async fn handle_message(msg: &Message, state: &RelayState) -> crate::Result<()> {
    if let Some(text) = msg.text()
        && is_start_command(text, state.bot_username.as_deref())
    {
        state.bot.send_message(msg.chat.id, USAGE).await?;
        return Ok(());
    }

    match attachment::classify(msg) {
        Some(att) => relay_attachment(msg, &att, state).await,
        None => {
            if let Some(kind) = attachment::describe_media_kind(msg) {
                info!(
                    chat_id = msg.chat.id.0,
                    kind, "rejecting unsupported attachment type"
                );
                state.bot.send_message(msg.chat.id, UNSUPPORTED).await?;
            } else {
                debug!(chat_id = msg.chat.id.0, "ignoring non-attachment message");
            }
            Ok(())
        },
    }
}

/// Run the fetch → upload → cleanup → reply sequence for one attachment.
///
/// The transient file is removed on every exit path after it has been
/// created; removal failure is logged and never changes the reply.
async fn relay_attachment(msg: &Message, att: &Attachment, state: &RelayState) -> crate::Result<()> {
    info!(
        chat_id = msg.chat.id.0,
        kind = att.kind.as_str(),
        file_id = %att.file_id,
        name = %att.file_name,
        "relaying attachment"
    );

    let path = state
        .download_dir
        .join(transient_name(&att.file_name, msg.id.0));

    if let Err(e) = fetch_to_file(&state.bot, &att.file_id, &path).await {
        warn!(chat_id = msg.chat.id.0, error = %e, "attachment download failed");
        remove_transient(&path).await;
        state
            .bot
            .send_message(
                msg.chat.id,
                format!("Error downloading file from Telegram: {e}"),
            )
            .await?;
        return Ok(());
    }

    let uploaded = state.uploader.upload(&path, &att.file_name).await;
    remove_transient(&path).await;

    match uploaded {
        Ok(file) => {
            info!(
                chat_id = msg.chat.id.0,
                drive_id = %file.id,
                "attachment uploaded"
            );
            state
                .bot
                .send_message(
                    msg.chat.id,
                    format!(
                        "File uploaded!\nDownload from Google Drive: {}",
                        file.web_view_link
                    ),
                )
                .await?;
        },
        Err(e) => {
            warn!(chat_id = msg.chat.id.0, error = %e, "Drive upload failed");
            state
                .bot
                .send_message(
                    msg.chat.id,
                    format!("Error uploading file to Google Drive: {e}"),
                )
                .await?;
        },
    }

    Ok(())
}

/// Resolve a file id and stream its bytes to `path`.
async fn fetch_to_file(bot: &Bot, file_id: &str, path: &Path) -> crate::Result<()> {
    let file = bot.get_file(file_id).await?;
    let mut dst = tokio::fs::File::create(path).await?;
    bot.download_file(&file.path, &mut dst).await?;
    dst.flush().await?;
    Ok(())
}

/// Reduce a filename to its final path component so the transient copy
/// always lands inside the download directory. Declared document names are
/// sender-controlled and may carry `../` or an absolute path; the verbatim
/// name is still used for the upload metadata.
fn transient_name(name: &str, message_id: i32) -> std::ffi::OsString {
    match Path::new(name).file_name() {
        Some(component) => component.to_os_string(),
        None => format!("attachment_{message_id}").into(),
    }
}

/// Best-effort removal of the transient download.
async fn remove_transient(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "transient file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => warn!(
            path = %path.display(),
            error = %e,
            "could not remove transient file"
        ),
    }
}

fn is_start_command(text: &str, bot_username: Option<&str>) -> bool {
    let Some(cmd) = text.trim().split_whitespace().next() else {
        return false;
    };
    match cmd.strip_prefix("/start") {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('@')
            .zip(bot_username)
            .is_some_and(|(mention, username)| mention.eq_ignore_ascii_case(username)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        path::PathBuf,
        sync::{Arc, Mutex},
    };

    use {
        async_trait::async_trait,
        axum::{
            Json, Router,
            body::Bytes,
            extract::State,
            http::Uri,
            response::{IntoResponse, Response},
        },
        serde_json::json,
    };

    use driveferry_drive::{UploadedFile, Uploader};

    use super::*;

    const FILE_BYTES: &[u8] = b"drive ferry payload";

    /// Captures every Bot API call and serves the file download route.
    #[derive(Clone)]
    struct MockTelegramApi {
        requests: Arc<Mutex<Vec<(String, String)>>>,
        fail_get_file: bool,
    }

    impl MockTelegramApi {
        fn sent_texts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|(method, _)| method == "SendMessage")
                .map(|(_, body)| {
                    let value: serde_json::Value = serde_json::from_str(body).unwrap();
                    value["text"].as_str().unwrap_or_default().to_string()
                })
                .collect()
        }

        fn calls(&self, method: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, _)| m == method)
                .count()
        }
    }

    async fn api_handler(
        State(api): State<MockTelegramApi>,
        uri: Uri,
        body: Bytes,
    ) -> Response {
        let path = uri.path().to_string();
        if path.starts_with("/file/") {
            return Bytes::from_static(FILE_BYTES).into_response();
        }

        let method = path.rsplit('/').next().unwrap_or_default().to_string();
        api.requests
            .lock()
            .unwrap()
            .push((method.clone(), String::from_utf8_lossy(&body).to_string()));

        let payload = match method.as_str() {
            "GetFile" if api.fail_get_file => json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: file is too big",
            }),
            "GetFile" => json!({
                "ok": true,
                "result": {
                    "file_id": "remote-1",
                    "file_unique_id": "u1",
                    "file_size": FILE_BYTES.len(),
                    "file_path": "documents/blob.bin",
                },
            }),
            "SendMessage" => json!({
                "ok": true,
                "result": {
                    "message_id": 99,
                    "date": 1_700_000_000,
                    "chat": {"id": 42, "type": "private", "first_name": "Ada"},
                    "text": "ok",
                },
            }),
            _ => json!({"ok": true, "result": true}),
        };
        Json(payload).into_response()
    }

    async fn spawn_api(api: MockTelegramApi) -> String {
        let app = Router::new().fallback(api_handler).with_state(api);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    /// Records upload calls together with a snapshot of the file content at
    /// call time, so tests can assert the transient file existed then.
    struct MockUploader {
        calls: Mutex<Vec<(PathBuf, String, Option<Vec<u8>>)>>,
        fail: bool,
    }

    impl MockUploader {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Uploader for MockUploader {
        async fn upload(&self, path: &Path, name: &str) -> driveferry_drive::Result<UploadedFile> {
            self.calls.lock().unwrap().push((
                path.to_path_buf(),
                name.to_string(),
                std::fs::read(path).ok(),
            ));
            if self.fail {
                return Err(driveferry_drive::Error::external(
                    "upload to Google Drive",
                    std::io::Error::other("storage quota exceeded"),
                ));
            }
            Ok(UploadedFile {
                id: "drive-1".into(),
                web_view_link: "https://drive.google.com/file/d/drive-1/view".into(),
            })
        }
    }

    struct TestRig {
        api: MockTelegramApi,
        uploader: Arc<MockUploader>,
        state: RelayState,
        // Held so the transient directory outlives the test body.
        _dir: tempfile::TempDir,
    }

    async fn rig(fail_get_file: bool, fail_upload: bool) -> TestRig {
        let api = MockTelegramApi {
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_get_file,
        };
        let base = spawn_api(api.clone()).await;
        let bot =
            Bot::new("42:TESTTOKEN").set_api_url(url::Url::parse(&base).unwrap());
        let uploader = MockUploader::new(fail_upload);
        let dir = tempfile::tempdir().unwrap();
        let state = RelayState {
            bot,
            bot_username: Some("ferrybot".into()),
            uploader: Arc::clone(&uploader) as Arc<dyn Uploader>,
            download_dir: dir.path().to_path_buf(),
        };
        TestRig {
            api,
            uploader,
            state,
            _dir: dir,
        }
    }

    fn message_with(media: serde_json::Value) -> Message {
        let mut base = json!({
            "message_id": 77,
            "date": 1_700_000_000,
            "chat": {"id": 42, "type": "private", "first_name": "Ada"},
            "from": {"id": 42, "is_bot": false, "first_name": "Ada"},
        });
        base.as_object_mut()
            .unwrap()
            .extend(media.as_object().unwrap().clone());
        serde_json::from_value(base).unwrap()
    }

    fn document_message() -> Message {
        message_with(json!({"document": {
            "file_id": "doc-1",
            "file_unique_id": "u1",
            "file_name": "report.pdf",
            "file_size": 3,
        }}))
    }

    #[tokio::test]
    async fn document_is_fetched_uploaded_and_cleaned_up() {
        let rig = rig(false, false).await;
        handle_message(&document_message(), &rig.state).await.unwrap();

        let calls = rig.uploader.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (path, name, content) = &calls[0];
        assert_eq!(name, "report.pdf");
        assert_eq!(content.as_deref(), Some(FILE_BYTES));
        assert!(!path.exists(), "transient file must be gone after the relay");

        let texts = rig.api.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("https://drive.google.com/file/d/drive-1/view"));
    }

    #[tokio::test]
    async fn voice_note_is_relayed_under_synthesized_name() {
        let rig = rig(false, false).await;
        let msg = message_with(json!({"voice": {
            "file_id": "vc-1",
            "file_unique_id": "u1",
            "duration": 3,
            "mime_type": "audio/ogg",
        }}));
        handle_message(&msg, &rig.state).await.unwrap();

        let calls = rig.uploader.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (path, name, content) = &calls[0];
        assert_eq!(name, "voice_77.ogg");
        assert_eq!(content.as_deref(), Some(FILE_BYTES));
        assert!(!path.exists());

        let texts = rig.api.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("https://drive.google.com/file/d/drive-1/view"));
    }

    #[tokio::test]
    async fn traversal_document_name_stays_in_download_dir() {
        let rig = rig(false, false).await;
        let msg = message_with(json!({"document": {
            "file_id": "doc-1",
            "file_unique_id": "u1",
            "file_name": "../escaped.bin",
            "file_size": 3,
        }}));
        handle_message(&msg, &rig.state).await.unwrap();

        let calls = rig.uploader.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (path, name, content) = &calls[0];
        // Drive metadata keeps the declared name; the transient copy does not.
        assert_eq!(name, "../escaped.bin");
        assert_eq!(*path, rig.state.download_dir.join("escaped.bin"));
        assert_eq!(content.as_deref(), Some(FILE_BYTES));
        assert!(!path.exists());

        let escaped = rig.state.download_dir.parent().unwrap().join("escaped.bin");
        assert!(!escaped.exists(), "nothing may be written outside the dir");
    }

    #[test]
    fn transient_name_keeps_only_the_final_component() {
        assert_eq!(transient_name("report.pdf", 77), "report.pdf");
        assert_eq!(transient_name("../escaped.bin", 77), "escaped.bin");
        assert_eq!(transient_name("/etc/passwd", 77), "passwd");
        assert_eq!(transient_name("..", 77), "attachment_77");
        assert_eq!(transient_name("nested/dir/name.txt", 77), "name.txt");
    }

    #[tokio::test]
    async fn upload_failure_reports_cause_and_removes_file() {
        let rig = rig(false, true).await;
        handle_message(&document_message(), &rig.state).await.unwrap();

        let calls = rig.uploader.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (path, _, content) = &calls[0];
        assert!(content.is_some(), "file must exist at upload time");
        assert!(!path.exists(), "transient file must be gone after failure");

        let texts = rig.api.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Error uploading file to Google Drive:"));
        assert!(texts[0].contains("storage quota exceeded"));
    }

    #[tokio::test]
    async fn fetch_failure_never_reaches_the_uploader() {
        let rig = rig(true, false).await;
        handle_message(&document_message(), &rig.state).await.unwrap();

        assert_eq!(rig.uploader.call_count(), 0);
        assert!(!rig.state.download_dir.join("report.pdf").exists());

        let texts = rig.api.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Error downloading file from Telegram:"));
    }

    #[tokio::test]
    async fn unsupported_media_gets_exact_reply_without_io() {
        let rig = rig(false, false).await;
        let msg = message_with(json!({"contact": {
            "phone_number": "+1555", "first_name": "Bob",
        }}));
        handle_message(&msg, &rig.state).await.unwrap();

        assert_eq!(rig.uploader.call_count(), 0);
        assert_eq!(rig.api.calls("GetFile"), 0);
        assert_eq!(
            std::fs::read_dir(&rig.state.download_dir).unwrap().count(),
            0
        );
        assert_eq!(rig.api.sent_texts(), vec![UNSUPPORTED.to_string()]);
    }

    #[tokio::test]
    async fn start_command_replies_with_usage() {
        let rig = rig(false, false).await;
        handle_message(&message_with(json!({"text": "/start"})), &rig.state)
            .await
            .unwrap();
        assert_eq!(rig.api.sent_texts(), vec![USAGE.to_string()]);
    }

    #[tokio::test]
    async fn plain_text_is_ignored_silently() {
        let rig = rig(false, false).await;
        handle_message(&message_with(json!({"text": "hello there"})), &rig.state)
            .await
            .unwrap();
        assert!(rig.api.requests.lock().unwrap().is_empty());
        assert_eq!(rig.uploader.call_count(), 0);
    }

    #[test]
    fn start_command_matching() {
        assert!(is_start_command("/start", None));
        assert!(is_start_command("/start extra args", None));
        assert!(is_start_command("/start@FerryBot", Some("ferrybot")));
        assert!(!is_start_command("/start@otherbot", Some("ferrybot")));
        assert!(!is_start_command("/started", None));
        assert!(!is_start_command("start", None));
    }
}
