//! Concrete durable-item backends: OS keychain credentials, scratch files
//! with a bounded lifetime, and a key-value settings domain.
//! Each backend re-queries its store on every call.

pub mod file_settings_store;
pub mod keychain;
pub mod keyring_store;
pub mod scratch_file;
pub mod settings;

pub use file_settings_store::FileSettingsStore;
pub use keychain::{GenericPasswordService, KeychainItem};
pub use keyring_store::KeyringCredentialStore;
pub use scratch_file::{sanitize_filename, ScratchDirectory, TemporaryDiskItem};
pub use settings::{SettingsBackend, SettingsEncoding, UserDefaultsItem};
