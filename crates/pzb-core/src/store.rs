use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{credentials::CredentialRecord, domain::UserId, errors::Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NothingToDelete,
}

/// Persistence port for saved credentials.
///
/// Callers serialize access per user (one open wizard per user); implementations
/// do not need to guard against concurrent writers for the same id.
pub trait CredentialStore: Send + Sync {
    fn load(&self, user: UserId) -> Result<Option<CredentialRecord>>;
    fn save(&self, user: UserId, record: &CredentialRecord) -> Result<()>;
    fn delete(&self, user: UserId) -> Result<DeleteOutcome>;
}

/// All users' records in one pretty-printed JSON object keyed by user id.
///
/// Every mutation rewrites the whole file (read-modify-write) through a sibling
/// temp file and a rename so a crash never leaves a half-written file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

type RecordMap = BTreeMap<String, CredentialRecord>;

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<RecordMap> {
        let txt = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RecordMap::new()),
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };
        if txt.trim().is_empty() {
            return Ok(RecordMap::new());
        }
        serde_json::from_str(&txt).map_err(|e| {
            Error::Persistence(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    fn write_all(&self, records: &RecordMap) -> Result<()> {
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| Error::Persistence(format!("failed to encode credentials: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut f = fs::File::create(&tmp)?;
            f.write_all(json.as_bytes())?;
            f.write_all(b"\n")?;
            f.sync_all()?;
            fs::rename(&tmp, &self.path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::Persistence(format!("failed to write {}: {e}", self.path.display()))
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for JsonFileStore {
    fn load(&self, user: UserId) -> Result<Option<CredentialRecord>> {
        Ok(self.read_all()?.remove(&user.to_string()))
    }

    fn save(&self, user: UserId, record: &CredentialRecord) -> Result<()> {
        let _guard = self.lock();
        let mut all = self.read_all()?;
        all.insert(user.to_string(), record.clone());
        self.write_all(&all)?;
        tracing::info!(user = %user, path = %self.path.display(), "credentials saved");
        Ok(())
    }

    fn delete(&self, user: UserId) -> Result<DeleteOutcome> {
        let _guard = self.lock();
        let mut all = self.read_all()?;
        if all.remove(&user.to_string()).is_none() {
            return Ok(DeleteOutcome::NothingToDelete);
        }
        self.write_all(&all)?;
        tracing::info!(user = %user, "credentials deleted");
        Ok(DeleteOutcome::Deleted)
    }
}

/// In-process store, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<UserId, CredentialRecord>>,
}

impl MemoryStore {
    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, CredentialRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self, user: UserId) -> Result<Option<CredentialRecord>> {
        Ok(self.records().get(&user).cloned())
    }

    fn save(&self, user: UserId, record: &CredentialRecord) -> Result<()> {
        self.records().insert(user, record.clone());
        Ok(())
    }

    fn delete(&self, user: UserId) -> Result<DeleteOutcome> {
        Ok(match self.records().remove(&user) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NothingToDelete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(host: &str) -> CredentialRecord {
        CredentialRecord {
            host: host.to_string(),
            port: 21,
            user: "bob".to_string(),
            password: "secret".to_string(),
            remote_path: "/www".to_string(),
        }
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("ftp_config.json"));
        assert!(store.load(UserId(1)).unwrap().is_none());
    }

    #[test]
    fn save_overwrites_and_keeps_other_users() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("ftp_config.json"));

        store.save(UserId(1), &record("a.example")).unwrap();
        store.save(UserId(2), &record("b.example")).unwrap();
        store.save(UserId(1), &record("c.example")).unwrap();

        assert_eq!(store.load(UserId(1)).unwrap().unwrap().host, "c.example");
        assert_eq!(store.load(UserId(2)).unwrap().unwrap().host, "b.example");

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["1"]["pass"], "secret");
        assert!(!dir.path().join("ftp_config.json.tmp").exists());
    }

    #[test]
    fn reads_file_written_by_older_deployments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ftp_config.json");
        fs::write(
            &path,
            r#"{"42": {"host": "1.2.3.4", "port": 2121, "user": "u", "pass": "p", "path": "/x"}}"#,
        )
        .unwrap();
        let store = JsonFileStore::new(path);
        let rec = store.load(UserId(42)).unwrap().unwrap();
        assert_eq!(rec.port, 2121);
        assert_eq!(rec.password, "p");
        assert_eq!(rec.remote_path, "/x");
    }

    #[test]
    fn delete_missing_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("ftp_config.json"));
        assert_eq!(
            store.delete(UserId(7)).unwrap(),
            DeleteOutcome::NothingToDelete
        );
        assert!(!store.path().exists());

        store.save(UserId(7), &record("x")).unwrap();
        assert_eq!(store.delete(UserId(7)).unwrap(), DeleteOutcome::Deleted);
        assert!(store.load(UserId(7)).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_reported_not_clobbered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ftp_config.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::new(&path);

        assert!(matches!(store.load(UserId(1)), Err(Error::Persistence(_))));
        assert!(matches!(
            store.save(UserId(1), &record("x")),
            Err(Error::Persistence(_))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[test]
    fn unwritable_location_surfaces_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        // Parent "directory" is a regular file.
        let store = JsonFileStore::new(blocker.join("ftp_config.json"));
        assert!(matches!(
            store.save(UserId(1), &record("x")),
            Err(Error::Persistence(_))
        ));
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::default();
        assert_eq!(
            store.delete(UserId(1)).unwrap(),
            DeleteOutcome::NothingToDelete
        );
        store.save(UserId(1), &record("m")).unwrap();
        assert_eq!(store.load(UserId(1)).unwrap().unwrap().host, "m");
    }
}
