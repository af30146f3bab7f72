//! Boundaries to the stores that back durable items.

pub mod credential_store;
pub mod settings_store;

pub use credential_store::{
    CredentialQuery, CredentialStore, InMemoryCredentialStore, ItemClass, SecretStoreError,
    StoreStatus,
};
pub use settings_store::{InMemorySettingsStore, SettingsError, SettingsStore, SettingsValue};
