//! Generic-password credentials kept in a platform-secured store.
//!
//! One UTF-8 secret per account. `save` checks for an existing entry and then
//! inserts or updates; the two steps are not atomic, so a delete landing in
//! between surfaces as [`SecretStoreError::NoPassword`].

use durable_core::{
    slot::DurableSlot,
    storage::{CredentialQuery, CredentialStore, SecretStoreError, StoreStatus},
};
use tracing::{debug, instrument};

/// Create/read/update/delete of generic-password entries keyed by account.
#[derive(Debug, Clone)]
pub struct GenericPasswordService<S: CredentialStore> {
    store: S,
}

impl<S: CredentialStore> GenericPasswordService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the stored secret, or `None` when the account has no entry.
    #[instrument(skip_all, fields(account = %account))]
    pub fn entry_for_account(&self, account: &str) -> Result<Option<String>, SecretStoreError> {
        let query = CredentialQuery::generic_password(account);
        match self.store.copy_matching(&query) {
            Ok(data) => String::from_utf8(data)
                .map(Some)
                .map_err(|_| SecretStoreError::BadFormat),
            Err(StoreStatus::ITEM_NOT_FOUND) => Ok(None),
            Err(status) => Err(status.into()),
        }
    }

    /// Insert the secret if the account is absent, otherwise update it in place.
    #[instrument(skip_all, fields(account = %account))]
    pub fn save(&self, value: &str, account: &str) -> Result<(), SecretStoreError> {
        if self.entry_for_account(account)?.is_some() {
            self.update_entry(value, account)
        } else {
            self.create_entry(value, account)
        }
    }

    /// Remove the entry. Absent accounts are not an error.
    #[instrument(skip_all, fields(account = %account))]
    pub fn delete_entry_for_account(&self, account: &str) -> Result<(), SecretStoreError> {
        let query = CredentialQuery::generic_password(account);
        match self.store.delete(&query) {
            Ok(()) => {
                debug!("deleted credential entry");
                Ok(())
            }
            Err(StoreStatus::ITEM_NOT_FOUND) => Ok(()),
            Err(status) => Err(status.into()),
        }
    }

    fn create_entry(&self, value: &str, account: &str) -> Result<(), SecretStoreError> {
        let query = CredentialQuery::generic_password(account);
        self.store.add(&query, value.as_bytes())?;
        debug!("created credential entry");
        Ok(())
    }

    fn update_entry(&self, value: &str, account: &str) -> Result<(), SecretStoreError> {
        let query = CredentialQuery::generic_password(account);
        match self.store.update(&query, value.as_bytes()) {
            Ok(()) => {
                debug!("updated credential entry");
                Ok(())
            }
            Err(StoreStatus::ITEM_NOT_FOUND) => Err(SecretStoreError::NoPassword),
            Err(status) => Err(status.into()),
        }
    }
}

/// Typed handle binding one account to a credential store.
///
/// Setting `None` deletes the entry. Errors are returned as-is; whether they
/// are fatal is up to the caller.
#[derive(Debug, Clone)]
pub struct KeychainItem<S: CredentialStore> {
    account: String,
    service: GenericPasswordService<S>,
}

impl<S: CredentialStore> KeychainItem<S> {
    pub fn new(account: impl Into<String>, store: S) -> Self {
        Self {
            account: account.into(),
            service: GenericPasswordService::new(store),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn get(&self) -> Result<Option<String>, SecretStoreError> {
        self.service.entry_for_account(&self.account)
    }

    pub fn set(&self, value: Option<&str>) -> Result<(), SecretStoreError> {
        match value {
            Some(value) => self.service.save(value, &self.account),
            None => self.service.delete_entry_for_account(&self.account),
        }
    }
}

impl<S: CredentialStore> DurableSlot for KeychainItem<S> {
    type Value = Option<String>;
    type Error = SecretStoreError;

    fn read(&self) -> Result<Self::Value, Self::Error> {
        self.get()
    }

    fn write(&self, value: Self::Value) -> Result<(), Self::Error> {
        self.set(value.as_deref())
    }
}
