use durable_core::storage::{CredentialQuery, CredentialStore, StoreStatus};
use keyring::Entry;
use tracing::warn;

/// Default service name for entries written through the OS keychain.
pub const DEFAULT_SERVICE: &str = "durable-item";

/// OS keychain-backed credential store. Uses the `keyring` crate; every call
/// opens a fresh entry handle.
///
/// The platform store is picked per target: Keychain on Apple targets,
/// Credential Manager on Windows, the kernel keyring on Linux (or the Secret
/// Service with the `sync-secret-service` feature).
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, query: &CredentialQuery) -> Result<Entry, StoreStatus> {
        Entry::new(&self.service, &query.account).map_err(|err| status_for(&err))
    }

    fn exists(&self, entry: &Entry) -> Result<bool, StoreStatus> {
        match entry.get_secret() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(status_for(&err)),
        }
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn copy_matching(&self, query: &CredentialQuery) -> Result<Vec<u8>, StoreStatus> {
        self.entry(query)?
            .get_secret()
            .map_err(|err| status_for(&err))
    }

    fn add(&self, query: &CredentialQuery, data: &[u8]) -> Result<(), StoreStatus> {
        let entry = self.entry(query)?;
        if self.exists(&entry)? {
            return Err(StoreStatus::DUPLICATE_ITEM);
        }
        entry.set_secret(data).map_err(|err| status_for(&err))
    }

    fn update(&self, query: &CredentialQuery, data: &[u8]) -> Result<(), StoreStatus> {
        let entry = self.entry(query)?;
        if !self.exists(&entry)? {
            return Err(StoreStatus::ITEM_NOT_FOUND);
        }
        entry.set_secret(data).map_err(|err| status_for(&err))
    }

    fn delete(&self, query: &CredentialQuery) -> Result<(), StoreStatus> {
        self.entry(query)?
            .delete_credential()
            .map_err(|err| status_for(&err))
    }
}

/// Map keyring failures onto keychain status codes.
fn status_for(err: &keyring::Error) -> StoreStatus {
    let status = match err {
        keyring::Error::NoEntry => return StoreStatus::ITEM_NOT_FOUND,
        keyring::Error::NoStorageAccess(_) => StoreStatus::INTERACTION_NOT_ALLOWED,
        keyring::Error::PlatformFailure(_) => StoreStatus::NOT_AVAILABLE,
        keyring::Error::BadEncoding(_) => StoreStatus::DECODE,
        keyring::Error::TooLong(_, _) | keyring::Error::Invalid(_, _) => StoreStatus::PARAM,
        keyring::Error::Ambiguous(_) => StoreStatus::DUPLICATE_ITEM,
        _ => StoreStatus::UNIMPLEMENTED,
    };
    warn!(%status, "keychain call failed: {err}");
    status
}
