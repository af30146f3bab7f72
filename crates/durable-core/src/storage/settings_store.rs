use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings payload is malformed: {0}")]
    Format(#[from] serde_json::Error),
    #[error("value cannot be stored natively: {reason}")]
    Unrepresentable { reason: String },
    #[error("settings store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Natively supported value types of a key-value settings store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SettingsValue {
    Data(#[serde(with = "base64_data")] Vec<u8>),
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<SettingsValue>),
    Dictionary(BTreeMap<String, SettingsValue>),
}

impl SettingsValue {
    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Process-wide key-value store.
///
/// `set` and `remove` may buffer; `synchronize` makes pending changes durable.
pub trait SettingsStore: Send + Sync {
    fn object(&self, key: &str) -> Result<Option<SettingsValue>, SettingsError>;

    fn set(&self, key: &str, value: SettingsValue) -> Result<(), SettingsError>;

    fn remove(&self, key: &str) -> Result<(), SettingsError>;

    fn synchronize(&self) -> Result<(), SettingsError>;
}

/// In-memory settings store for tests. Counts `synchronize` calls and can be
/// told to fail them.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: Mutex<HashMap<String, SettingsValue>>,
    synchronized: AtomicUsize,
    fail_synchronize: AtomicBool,
}

impl InMemorySettingsStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn synchronize_count(&self) -> usize {
        self.synchronized.load(Ordering::SeqCst)
    }

    pub fn fail_synchronize(&self, fail: bool) {
        self.fail_synchronize.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SettingsValue>>, SettingsError> {
        self.values.lock().map_err(|err| SettingsError::Unavailable {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn object(&self, key: &str) -> Result<Option<SettingsValue>, SettingsError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: SettingsValue) -> Result<(), SettingsError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SettingsError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn synchronize(&self) -> Result<(), SettingsError> {
        if self.fail_synchronize.load(Ordering::SeqCst) {
            return Err(SettingsError::Unavailable {
                reason: "synchronize disabled".to_string(),
            });
        }
        self.synchronized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

mod base64_data {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
