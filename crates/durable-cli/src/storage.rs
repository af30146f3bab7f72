use std::sync::Arc;

use crate::config::Config;
use durable_storage::{
    keyring_store::DEFAULT_SERVICE, FileSettingsStore, KeyringCredentialStore, ScratchDirectory,
    SettingsBackend,
};
use tracing::debug;

/// OS keychain store, filed under the configured service name.
pub fn credential_store(config: &Config) -> KeyringCredentialStore {
    let service = config
        .keychain_service
        .clone()
        .unwrap_or_else(|| DEFAULT_SERVICE.to_string());
    debug!(%service, "using keychain service");
    KeyringCredentialStore::new(service)
}

/// Scratch directory, honoring the config override.
pub fn scratch_directory(config: &Config) -> ScratchDirectory {
    match &config.scratch_dir {
        Some(root) => {
            debug!(?root, "using scratch directory (config override)");
            ScratchDirectory::new(root.clone())
        }
        None => ScratchDirectory::default(),
    }
}

/// Settings backend over the shared domain unless a path override is set.
pub fn settings_backend(config: &Config) -> SettingsBackend {
    let encoding = config.settings_encoding.unwrap_or_default();
    match &config.settings_path {
        Some(path) => {
            debug!(?path, "using settings domain (config override)");
            SettingsBackend::new(Arc::new(FileSettingsStore::new(path.clone())), encoding)
        }
        None => SettingsBackend::new(FileSettingsStore::standard(), encoding),
    }
}
