//! Publishing a hostname list to the remote store.
//!
//! The sequence is fixed: connect → cwd → upload under the declared name →
//! list → delete the stale canonical file → rename → best-effort sidecar
//! cleanup → close. Any failing step aborts the rest; the session is closed on
//! every path. Nothing is retried.

use std::{
    collections::BTreeSet,
    future::Future,
    io::Write,
    path::Path,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    credentials::CredentialRecord,
    errors::Error,
    sanitize::{sanitize_bytes, SanitizedPayload},
    Result,
};

/// Name consumers of the remote directory read.
pub const TARGET_NAME: &str = "pullzone_hostnames.txt";

/// Auxiliary files removed after a publish when present.
pub const SIDECAR_FILES: [&str; 2] = [".next_index", "assignments.log"];

/// Upload name when the sender supplied none.
pub const DEFAULT_UPLOAD_NAME: &str = "upload.txt";

/// 20 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens authenticated sessions against a remote store.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Connect, authenticate and switch the data channel to protected mode.
    ///
    /// `timeout` bounds each network round trip made by the session.
    async fn connect(
        &self,
        creds: &CredentialRecord,
        timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>>;
}

/// One open session on a remote store.
#[async_trait]
pub trait RemoteSession: Send {
    async fn cwd(&mut self, path: &str) -> Result<()>;

    /// Store the local file under `name` in binary mode. Returns bytes sent.
    async fn put(&mut self, name: &str, local: &Path) -> Result<u64>;

    /// Name-only listing of the working directory.
    async fn list_names(&mut self) -> Result<Vec<String>>;

    async fn delete(&mut self, name: &str) -> Result<()>;

    async fn rename(&mut self, from: &str, to: &str) -> Result<()>;

    /// Orderly close.
    async fn quit(&mut self) -> Result<()>;

    /// Drop the connection without a goodbye.
    fn abort(&mut self);
}

/// Progress points reported while publishing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishStep {
    Connecting,
    ChangingDirectory { path: String },
    Uploading { name: String },
    Listing,
    DeletingStale,
    Renaming { from: String, to: String },
    CleaningSidecars,
}

#[async_trait]
pub trait PublishProgress: Send + Sync {
    async fn on_step(&self, step: &PublishStep, done: &[PublishStep]);
}

/// Progress sink that ignores everything.
pub struct NoProgress;

#[async_trait]
impl PublishProgress for NoProgress {
    async fn on_step(&self, _step: &PublishStep, _done: &[PublishStep]) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishResult {
    pub uploaded_bytes: u64,
    pub original_name: String,
    pub final_name: String,
    pub replaced_existing: bool,
    pub sidecar_files_removed: BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionReport {
    pub entries: usize,
    pub target_present: bool,
}

/// Outcome of cleaning then publishing an uploaded file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadReport {
    pub total_lines: usize,
    pub changed_lines: usize,
    pub published: PublishResult,
}

pub struct Publisher {
    connector: Arc<dyn RemoteConnector>,
    timeout: Duration,
}

impl Publisher {
    pub fn new(connector: Arc<dyn RemoteConnector>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Upload `local` and make it the canonical file in `creds.remote_path`.
    pub async fn publish(
        &self,
        creds: &CredentialRecord,
        local: &Path,
        declared_name: Option<&str>,
        progress: &dyn PublishProgress,
    ) -> Result<PublishResult> {
        let size = std::fs::metadata(local)?.len();
        if size > MAX_UPLOAD_BYTES {
            return Err(Error::Validation(format!(
                "file is {size} bytes; the limit is {MAX_UPLOAD_BYTES} bytes"
            )));
        }

        let names = UploadNames::from_declared(declared_name);
        let mut steps = StepLog::new(progress);

        steps.enter(PublishStep::Connecting).await;
        let mut session = self.connect(creds).await?;

        let res = self
            .run_publish(session.as_mut(), creds, local, &names, &mut steps)
            .await;
        close_session(session.as_mut(), self.timeout).await;

        match &res {
            Ok(r) => tracing::info!(
                host = %creds.host,
                path = %creds.remote_path,
                original = %r.original_name,
                bytes = r.uploaded_bytes,
                replaced = r.replaced_existing,
                "publish complete"
            ),
            Err(e) => tracing::error!(
                host = %creds.host,
                path = %creds.remote_path,
                error = %e,
                "publish failed"
            ),
        }
        res
    }

    async fn run_publish(
        &self,
        session: &mut dyn RemoteSession,
        creds: &CredentialRecord,
        local: &Path,
        names: &UploadNames,
        steps: &mut StepLog<'_>,
    ) -> Result<PublishResult> {
        let limit = self.timeout;

        steps
            .enter(PublishStep::ChangingDirectory {
                path: creds.remote_path.clone(),
            })
            .await;
        bounded(limit, "CWD", session.cwd(&creds.remote_path)).await?;

        steps
            .enter(PublishStep::Uploading {
                name: names.staging.clone(),
            })
            .await;
        let uploaded_bytes = bounded(limit, "STOR", session.put(&names.staging, local)).await?;
        tracing::info!(name = %names.staging, bytes = uploaded_bytes, "uploaded");

        steps.enter(PublishStep::Listing).await;
        let listing = bounded(limit, "NLST", session.list_names()).await?;
        tracing::debug!(?listing, "directory listing");

        let replaced_existing = is_listed(&listing, TARGET_NAME);
        if replaced_existing {
            steps.enter(PublishStep::DeletingStale).await;
            bounded(limit, "DELE", session.delete(TARGET_NAME)).await?;
            tracing::info!("deleted stale {TARGET_NAME}");
        }

        steps
            .enter(PublishStep::Renaming {
                from: names.staging.clone(),
                to: TARGET_NAME.to_string(),
            })
            .await;
        bounded(limit, "RNFR/RNTO", session.rename(&names.staging, TARGET_NAME)).await?;
        tracing::info!(from = %names.staging, "renamed to {TARGET_NAME}");

        steps.enter(PublishStep::CleaningSidecars).await;
        let mut sidecar_files_removed = BTreeSet::new();
        for sidecar in SIDECAR_FILES {
            if sidecar == names.staging || !is_listed(&listing, sidecar) {
                continue;
            }
            match bounded(limit, "DELE", session.delete(sidecar)).await {
                Ok(()) => {
                    tracing::info!("deleted {sidecar}");
                    sidecar_files_removed.insert(sidecar.to_string());
                }
                Err(e) => tracing::info!(error = %e, "could not delete {sidecar}"),
            }
        }

        Ok(PublishResult {
            uploaded_bytes,
            original_name: names.original.clone(),
            final_name: TARGET_NAME.to_string(),
            replaced_existing,
            sidecar_files_removed,
        })
    }

    /// Connect, enter the configured directory and look at what is there.
    pub async fn test_connection(&self, creds: &CredentialRecord) -> Result<ConnectionReport> {
        let mut session = self.connect(creds).await?;

        let res = async {
            bounded(self.timeout, "CWD", session.cwd(&creds.remote_path)).await?;
            let listing = bounded(self.timeout, "NLST", session.list_names()).await?;
            Ok(ConnectionReport {
                entries: listing.len(),
                target_present: is_listed(&listing, TARGET_NAME),
            })
        }
        .await;
        close_session(session.as_mut(), self.timeout).await;

        if let Err(e) = &res {
            tracing::warn!(host = %creds.host, error = %e, "connection test failed");
        }
        res
    }

    /// Clean `raw`, stage it in a temp file under `temp_dir`, and publish it.
    ///
    /// The temp file is removed on every exit path.
    pub async fn publish_payload(
        &self,
        creds: &CredentialRecord,
        raw: &[u8],
        declared_name: Option<&str>,
        temp_dir: &Path,
        progress: &dyn PublishProgress,
    ) -> Result<UploadReport> {
        let payload: SanitizedPayload = sanitize_bytes(raw);
        tracing::info!(
            total = payload.total,
            changed = payload.changed,
            "processed {} lines, cleaned {} URLs",
            payload.total,
            payload.changed
        );
        if payload.is_empty() {
            return Err(Error::Validation(
                "the file contains no hostnames after cleaning".to_string(),
            ));
        }

        let mut staged = tempfile::Builder::new()
            .prefix("pzb-upload-")
            .suffix(".txt")
            .tempfile_in(temp_dir)?;
        staged.write_all(&payload.to_bytes())?;
        staged.flush()?;

        let published = self
            .publish(creds, staged.path(), declared_name, progress)
            .await;

        if let Err(e) = staged.close() {
            tracing::error!(error = %e, "failed to remove staged upload");
        }

        Ok(UploadReport {
            total_lines: payload.total,
            changed_lines: payload.changed,
            published: published?,
        })
    }

    async fn connect(&self, creds: &CredentialRecord) -> Result<Box<dyn RemoteSession>> {
        tracing::info!(host = %creds.host, port = creds.port, user = %creds.user, "connecting");
        bounded(
            self.timeout,
            &format!("connect to {}", creds.address()),
            self.connector.connect(creds, self.timeout),
        )
        .await
    }
}

/// Declared name as given, and the name actually used for the upload.
#[derive(Clone, Debug, PartialEq, Eq)]
struct UploadNames {
    original: String,
    staging: String,
}

impl UploadNames {
    fn from_declared(declared: Option<&str>) -> Self {
        let original = declared
            .map(remote_basename)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_UPLOAD_NAME)
            .to_string();
        // Uploading straight onto the canonical name would let the stale-file
        // delete remove the fresh upload.
        let staging = if original == TARGET_NAME {
            format!("{TARGET_NAME}.part")
        } else {
            original.clone()
        };
        Self { original, staging }
    }
}

fn remote_basename(name: &str) -> &str {
    name.trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
}

fn is_listed(listing: &[String], name: &str) -> bool {
    listing.iter().any(|entry| remote_basename(entry) == name)
}

struct StepLog<'a> {
    progress: &'a dyn PublishProgress,
    done: Vec<PublishStep>,
    current: Option<PublishStep>,
}

impl<'a> StepLog<'a> {
    fn new(progress: &'a dyn PublishProgress) -> Self {
        Self {
            progress,
            done: Vec::new(),
            current: None,
        }
    }

    async fn enter(&mut self, step: PublishStep) {
        if let Some(prev) = self.current.take() {
            self.done.push(prev);
        }
        self.progress.on_step(&step, &self.done).await;
        self.current = Some(step);
    }
}

async fn bounded<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout(format!(
            "{what}: no response within {}s",
            limit.as_secs_f32()
        ))),
    }
}

async fn close_session(session: &mut dyn RemoteSession, limit: Duration) {
    if let Err(e) = bounded(limit, "QUIT", session.quit()).await {
        tracing::debug!(error = %e, "orderly close failed; aborting connection");
        session.abort();
    }
}
