//! In-memory doubles for flow tests.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use pzb_core::{
    config::Config,
    credentials::CredentialRecord,
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineKeyboard},
    },
    publish::{Publisher, RemoteConnector, RemoteSession},
    store::{CredentialStore, JsonFileStore},
    Result,
};

use crate::router::AppState;

use super::Sender;

pub const REMOTE_DIR: &str = "/public_html/v1/pullzoneurls";

pub fn record() -> CredentialRecord {
    CredentialRecord {
        host: "ftp.example.com".to_string(),
        port: 21,
        user: "alice".to_string(),
        password: "pw".to_string(),
        remote_path: REMOTE_DIR.to_string(),
    }
}

pub fn sender() -> Sender {
    Sender {
        chat_id: ChatId(100),
        user_id: UserId(42),
        username: Some("alice".to_string()),
        first_name: "Alice".to_string(),
    }
}

/// One message as the chat would show it.
#[derive(Clone, Debug)]
pub struct Output {
    pub target: MessageRef,
    pub html: String,
    pub keyboard: Option<InlineKeyboard>,
    pub edited: bool,
}

impl Output {
    pub fn callback_ids(&self) -> Vec<String> {
        self.keyboard
            .as_ref()
            .map(|k| k.callback_ids().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct Recorded {
    next_id: i32,
    outputs: Vec<Output>,
    deleted: Vec<MessageRef>,
    actions: Vec<ChatAction>,
}

#[derive(Default)]
pub struct RecordingMessenger {
    inner: Mutex<Recorded>,
}

impl RecordingMessenger {
    fn rec(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap()
    }

    pub fn outputs(&self) -> Vec<Output> {
        self.rec().outputs.clone()
    }

    pub fn last(&self) -> Output {
        self.rec().outputs.last().cloned().expect("nothing was sent")
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.rec().deleted.clone()
    }

    pub fn actions(&self) -> Vec<ChatAction> {
        self.rec().actions.clone()
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        let mut rec = self.rec();
        rec.next_id += 1;
        let target = MessageRef {
            chat_id,
            message_id: MessageId(1000 + rec.next_id),
        };
        rec.outputs.push(Output {
            target,
            html: html.to_string(),
            keyboard,
            edited: false,
        });
        Ok(target)
    }

    async fn edit_html(
        &self,
        msg: MessageRef,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()> {
        self.rec().outputs.push(Output {
            target: msg,
            html: html.to_string(),
            keyboard,
            edited: true,
        });
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.rec().deleted.push(msg);
        Ok(())
    }

    async fn send_chat_action(&self, _chat_id: ChatId, action: ChatAction) -> Result<()> {
        self.rec().actions.push(action);
        Ok(())
    }

    async fn answer_callback_query(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
        Ok(())
    }
}

/// A single remote directory at [`REMOTE_DIR`] that accepts password `pw`.
#[derive(Default)]
pub struct FakeRemote {
    pub files: BTreeMap<String, Vec<u8>>,
    pub deny_put: bool,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    remote: Arc<Mutex<FakeRemote>>,
}

struct FakeSession {
    remote: Arc<Mutex<FakeRemote>>,
}

#[async_trait]
impl RemoteConnector for FakeConnector {
    async fn connect(
        &self,
        creds: &CredentialRecord,
        _timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>> {
        if creds.password != "pw" {
            return Err(Error::Permission("530 Login incorrect.".to_string()));
        }
        Ok(Box::new(FakeSession {
            remote: self.remote.clone(),
        }))
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn cwd(&mut self, path: &str) -> Result<()> {
        if path != REMOTE_DIR {
            return Err(Error::Permission(format!(
                "550 {path}: No such file or directory"
            )));
        }
        Ok(())
    }

    async fn put(&mut self, name: &str, local: &Path) -> Result<u64> {
        let bytes = std::fs::read(local)?;
        let mut remote = self.remote.lock().unwrap();
        if remote.deny_put {
            return Err(Error::Permission(format!("553 {name}: Permission denied")));
        }
        let len = bytes.len() as u64;
        remote.files.insert(name.to_string(), bytes);
        Ok(len)
    }

    async fn list_names(&mut self) -> Result<Vec<String>> {
        Ok(self.remote.lock().unwrap().files.keys().cloned().collect())
    }

    async fn delete(&mut self, name: &str) -> Result<()> {
        self.remote
            .lock()
            .unwrap()
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::Permission(format!("550 {name}: not found")))
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let mut remote = self.remote.lock().unwrap();
        let bytes = remote
            .files
            .remove(from)
            .ok_or_else(|| Error::Permission(format!("550 {from}: not found")))?;
        remote.files.insert(to.to_string(), bytes);
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        Ok(())
    }

    fn abort(&mut self) {}
}

/// App state wired to the doubles, with every file under a temp dir.
pub struct Harness {
    pub state: AppState,
    pub messenger: Arc<RecordingMessenger>,
    pub connector: FakeConnector,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let staging = root.join("staging");
        std::fs::create_dir_all(&staging).unwrap();

        let cfg = Config::from_source(|key| match key {
            "TELEGRAM_BOT_TOKEN" => Some("123:test".to_string()),
            "CREDENTIALS_FILE" => Some(root.join("ftp_config.json").display().to_string()),
            "TEMP_DIR" => Some(staging.display().to_string()),
            "AUDIT_LOG_PATH" => Some(root.join("audit.log").display().to_string()),
            _ => None,
        })
        .unwrap();

        let store: Arc<dyn CredentialStore> = Arc::new(JsonFileStore::new(&cfg.credentials_file));
        let connector = FakeConnector::default();
        let publisher = Arc::new(Publisher::new(
            Arc::new(connector.clone()),
            Duration::from_secs(5),
        ));
        let messenger = Arc::new(RecordingMessenger::default());

        let state = AppState::new(Arc::new(cfg), store, publisher, messenger.clone());
        Self {
            state,
            messenger,
            connector,
            _dir: dir,
        }
    }

    pub fn fs_insert(&self, name: &str, bytes: &[u8]) {
        self.remote().files.insert(name.to_string(), bytes.to_vec());
    }

    pub fn remote(&self) -> std::sync::MutexGuard<'_, FakeRemote> {
        self.connector.remote.lock().unwrap()
    }

    pub fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(&self.state.cfg.temp_dir)
            .unwrap()
            .next()
            .is_none()
    }

    pub fn audit_log(&self) -> String {
        std::fs::read_to_string(&self.state.cfg.audit_log_path).unwrap_or_default()
    }
}
