use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};

use thiserror::Error;

/// Status code reported by a credential store.
///
/// Values follow the platform keychain numbering so codes surfaced to callers
/// can be looked up in the usual places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreStatus(pub i32);

impl StoreStatus {
    pub const SUCCESS: Self = Self(0);
    pub const UNIMPLEMENTED: Self = Self(-4);
    pub const PARAM: Self = Self(-50);
    pub const NOT_AVAILABLE: Self = Self(-25291);
    pub const DUPLICATE_ITEM: Self = Self(-25299);
    pub const ITEM_NOT_FOUND: Self = Self(-25300);
    pub const INTERACTION_NOT_ALLOWED: Self = Self(-25308);
    pub const DECODE: Self = Self(-26275);

    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors surfaced by the secure credential backend.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretStoreError {
    /// The entry disappeared between the existence check and the update.
    #[error("no password stored for account")]
    NoPassword,
    /// Stored payload is not valid UTF-8 text.
    #[error("stored payload has a bad format")]
    BadFormat,
    /// Any other store failure.
    #[error("unhandled credential store error (status {status})")]
    Unhandled { status: StoreStatus },
}

impl From<StoreStatus> for SecretStoreError {
    fn from(status: StoreStatus) -> Self {
        Self::Unhandled { status }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemClass {
    GenericPassword,
}

/// Exact-match query for a single credential entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialQuery {
    pub class: ItemClass,
    pub account: String,
}

impl CredentialQuery {
    pub fn generic_password(account: impl Into<String>) -> Self {
        Self {
            class: ItemClass::GenericPassword,
            account: account.into(),
        }
    }
}

/// Platform-secured single-entry store. Failures are reported as status codes;
/// implementations never return [`StoreStatus::SUCCESS`] as an error.
pub trait CredentialStore: Send + Sync {
    /// Fetch the payload of the single entry matching `query`.
    /// Absent entries yield [`StoreStatus::ITEM_NOT_FOUND`].
    fn copy_matching(&self, query: &CredentialQuery) -> Result<Vec<u8>, StoreStatus>;

    /// Insert a new entry. Existing entries yield [`StoreStatus::DUPLICATE_ITEM`].
    fn add(&self, query: &CredentialQuery, data: &[u8]) -> Result<(), StoreStatus>;

    /// Replace the payload of an existing entry in place.
    /// Absent entries yield [`StoreStatus::ITEM_NOT_FOUND`].
    fn update(&self, query: &CredentialQuery, data: &[u8]) -> Result<(), StoreStatus>;

    /// Remove the entry. Absent entries yield [`StoreStatus::ITEM_NOT_FOUND`].
    fn delete(&self, query: &CredentialQuery) -> Result<(), StoreStatus>;
}

impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    fn copy_matching(&self, query: &CredentialQuery) -> Result<Vec<u8>, StoreStatus> {
        (**self).copy_matching(query)
    }

    fn add(&self, query: &CredentialQuery, data: &[u8]) -> Result<(), StoreStatus> {
        (**self).add(query, data)
    }

    fn update(&self, query: &CredentialQuery, data: &[u8]) -> Result<(), StoreStatus> {
        (**self).update(query, data)
    }

    fn delete(&self, query: &CredentialQuery) -> Result<(), StoreStatus> {
        (**self).delete(query)
    }
}

/// In-memory credential store that simulates encryption for tests and smoke runs.
/// This is not cryptographically secure; production callers should use the
/// OS keychain adapter.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCredentialStore {
    inner: Arc<Mutex<HashMap<CredentialQuery, Vec<u8>>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes without going through `add`, e.g. to plant a payload
    /// that is not valid UTF-8.
    pub fn insert_raw(&self, query: CredentialQuery, data: &[u8]) -> Result<(), StoreStatus> {
        self.with_map(|map| {
            map.insert(query, mask(data));
            Ok(())
        })
    }

    fn with_map<R>(
        &self,
        f: impl FnOnce(&mut HashMap<CredentialQuery, Vec<u8>>) -> Result<R, StoreStatus>,
    ) -> Result<R, StoreStatus> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| StoreStatus::INTERACTION_NOT_ALLOWED)?;
        f(&mut map)
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn copy_matching(&self, query: &CredentialQuery) -> Result<Vec<u8>, StoreStatus> {
        self.with_map(|map| {
            map.get(query)
                .map(|masked| unmask(masked))
                .ok_or(StoreStatus::ITEM_NOT_FOUND)
        })
    }

    fn add(&self, query: &CredentialQuery, data: &[u8]) -> Result<(), StoreStatus> {
        self.with_map(|map| {
            if map.contains_key(query) {
                return Err(StoreStatus::DUPLICATE_ITEM);
            }
            // XOR is a placeholder to avoid storing plaintext in tests.
            map.insert(query.clone(), mask(data));
            Ok(())
        })
    }

    fn update(&self, query: &CredentialQuery, data: &[u8]) -> Result<(), StoreStatus> {
        self.with_map(|map| match map.get_mut(query) {
            Some(slot) => {
                *slot = mask(data);
                Ok(())
            }
            None => Err(StoreStatus::ITEM_NOT_FOUND),
        })
    }

    fn delete(&self, query: &CredentialQuery) -> Result<(), StoreStatus> {
        self.with_map(|map| {
            map.remove(query)
                .map(|_| ())
                .ok_or(StoreStatus::ITEM_NOT_FOUND)
        })
    }
}

const MASK_BYTE: u8 = 0xA5;

fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}

fn unmask(input: &[u8]) -> Vec<u8> {
    mask(input) // XOR twice restores original.
}
