use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, OnceLock},
};

use durable_core::storage::{SettingsError, SettingsStore, SettingsValue};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

type Domain = BTreeMap<String, SettingsValue>;

/// Settings domain persisted as one JSON file.
///
/// Every lookup reads the file. `set` and `remove` queue changes that
/// lookups on this handle already see; `synchronize` merges them into a
/// fresh load of the file and writes it back with an atomic replace, so
/// keys written through other handles survive.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    /// `None` marks a pending removal.
    pending: Mutex<BTreeMap<String, Option<SettingsValue>>>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    /// Shared instance rooted at [`default_path`]. Built on first use.
    pub fn standard() -> Arc<FileSettingsStore> {
        static STANDARD: OnceLock<Arc<FileSettingsStore>> = OnceLock::new();
        STANDARD
            .get_or_init(|| Arc::new(FileSettingsStore::new(default_path())))
            .clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn pending(
        &self,
    ) -> Result<MutexGuard<'_, BTreeMap<String, Option<SettingsValue>>>, SettingsError> {
        self.pending.lock().map_err(|err| SettingsError::Unavailable {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

/// Platform preference directory, falling back to config and then temp.
pub fn default_path() -> PathBuf {
    dirs::preference_dir()
        .or_else(dirs::config_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("durable-item")
        .join("settings.json")
}

impl SettingsStore for FileSettingsStore {
    fn object(&self, key: &str) -> Result<Option<SettingsValue>, SettingsError> {
        if let Some(change) = self.pending()?.get(key) {
            return Ok(change.clone());
        }
        let mut domain = read_domain(&self.path)?;
        Ok(domain.remove(key))
    }

    fn set(&self, key: &str, value: SettingsValue) -> Result<(), SettingsError> {
        self.pending()?.insert(key.to_string(), Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SettingsError> {
        self.pending()?.insert(key.to_string(), None);
        Ok(())
    }

    #[instrument(skip_all, fields(path = ?self.path))]
    fn synchronize(&self) -> Result<(), SettingsError> {
        let mut pending = self.pending()?;
        if pending.is_empty() {
            return Ok(());
        }

        let mut domain = match read_domain(&self.path) {
            Ok(domain) => domain,
            Err(SettingsError::Format(err)) => {
                warn!("settings domain is malformed, replacing it: {err}");
                Domain::new()
            }
            Err(err) => return Err(err),
        };
        for (key, change) in pending.iter() {
            match change {
                Some(value) => domain.insert(key.clone(), value.clone()),
                None => domain.remove(key),
            };
        }
        write_domain(&self.path, &domain)?;
        pending.clear();
        debug!(entries = domain.len(), "settings domain synchronized");
        Ok(())
    }
}

fn read_domain(path: &Path) -> Result<Domain, SettingsError> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Domain::new()),
        Err(err) => return Err(err.into()),
    };
    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(Domain::new());
    }
    Ok(serde_json::from_slice(&contents)?)
}

fn write_domain(path: &Path, domain: &Domain) -> Result<(), SettingsError> {
    let parent = path.parent().ok_or_else(|| SettingsError::Unavailable {
        reason: "invalid settings path".to_string(),
    })?;
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    let json = serde_json::to_vec_pretty(domain)?;
    tmp.write_all(&json)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
