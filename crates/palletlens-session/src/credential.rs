//! Credential persistence and propagation into the shared inference client.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use palletlens_core::config::LensConfig;
use palletlens_core::error::{LensError, Result};
use palletlens_core::events::SessionEvent;
use palletlens_core::types::Credential;
use palletlens_inference::VisionClient;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Small JSON key/value file holding operator secrets.
///
/// A missing or empty file reads as an empty store. Writes create the parent
/// directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    /// Returns whether the key was present.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.read_all()?;
        let existed = entries.remove(key).is_some();
        if existed {
            self.write_all(&entries)?;
        }
        Ok(existed)
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| {
            LensError::Credential(format!("{} is not a valid store: {}", self.path.display(), e))
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// Keeps the shared inference client configured with the current credential.
///
/// There is no background refresh and no expiry: the client changes only at
/// startup and when the operator edits the credential.
pub struct CredentialLifecycle<C> {
    client: Arc<C>,
    store: Option<CredentialStore>,
    key: String,
    events: Option<broadcast::Sender<SessionEvent>>,
}

impl<C: VisionClient> CredentialLifecycle<C> {
    pub fn new(client: Arc<C>, store: Option<CredentialStore>, key: impl Into<String>) -> Self {
        Self {
            client,
            store,
            key: key.into(),
            events: None,
        }
    }

    /// Store and key taken from `[credential]` in the config.
    pub fn from_config(client: Arc<C>, config: &LensConfig) -> Self {
        Self::new(
            client,
            Some(CredentialStore::new(config.credential_store_path())),
            config.credential.key.clone(),
        )
    }

    pub fn with_events(mut self, events: broadcast::Sender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> Option<&CredentialStore> {
        self.store.as_ref()
    }

    /// Read the stored credential once and configure the client with it.
    ///
    /// Returns whether a credential was found.
    pub fn initialize(&self) -> Result<bool> {
        let stored = match &self.store {
            Some(store) => store.get(&self.key)?,
            None => None,
        };
        let credential = stored.and_then(Credential::new);
        let configured = credential.is_some();
        self.client.configure(credential);
        info!(configured, key = %self.key, "Credential loaded");
        Ok(configured)
    }

    /// Use `credential` for this process only, without touching the store.
    pub fn use_transient(&self, credential: Credential) {
        self.client.configure(Some(credential));
        debug!("Transient credential installed");
        self.notify(true);
    }

    /// Apply an operator edit. Blank input clears the credential.
    ///
    /// The client is reconfigured before the value is persisted, so a store
    /// failure never leaves the client on the old credential.
    pub fn on_credential_change(&self, value: &str) -> Result<bool> {
        let credential = Credential::new(value);
        let configured = credential.is_some();
        let persisted = credential.as_ref().map(|c| c.expose().to_string());
        self.client.configure(credential);

        if let Some(store) = &self.store {
            match persisted {
                Some(secret) => store.set(&self.key, &secret)?,
                None => {
                    store.remove(&self.key)?;
                }
            }
        }

        info!(configured, "Credential changed");
        self.notify(configured);
        Ok(configured)
    }

    fn notify(&self, configured: bool) {
        if let Some(events) = &self.events {
            let _ = events.send(SessionEvent::CredentialChanged {
                configured,
                timestamp: Utc::now(),
            });
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use palletlens_inference::MockVisionClient;

    const KEY: &str = "openai_api_key";

    fn store_in(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::new(dir.path().join("nested").join("credentials.json"))
    }

    #[test]
    fn test_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.get(KEY).unwrap(), None);
        assert!(!store.remove(KEY).unwrap());
    }

    #[test]
    fn test_store_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.set(KEY, "sk-one").unwrap();
        store.set("other", "value").unwrap();
        assert_eq!(store.get(KEY).unwrap().as_deref(), Some("sk-one"));

        assert!(store.remove(KEY).unwrap());
        assert_eq!(store.get(KEY).unwrap(), None);
        assert_eq!(store.get("other").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn test_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        let err = CredentialStore::new(&path).get(KEY).unwrap_err();
        assert!(matches!(err, LensError::Credential(_)));
    }

    #[test]
    fn test_initialize_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set(KEY, "sk-stored").unwrap();

        let client = Arc::new(MockVisionClient::new().unconfigured());
        let lifecycle = CredentialLifecycle::new(Arc::clone(&client), Some(store), KEY);
        assert!(lifecycle.initialize().unwrap());
        assert!(client.is_configured());
    }

    #[test]
    fn test_initialize_without_store_clears() {
        let client = Arc::new(MockVisionClient::new());
        let lifecycle = CredentialLifecycle::new(Arc::clone(&client), None, KEY);
        assert!(!lifecycle.initialize().unwrap());
        assert!(!client.is_configured());
    }

    #[test]
    fn test_change_configures_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockVisionClient::new().unconfigured());
        let lifecycle = CredentialLifecycle::new(Arc::clone(&client), Some(store_in(&dir)), KEY);

        assert!(lifecycle.on_credential_change("  sk-typed  ").unwrap());
        assert!(client.is_configured());
        assert_eq!(
            lifecycle.store().unwrap().get(KEY).unwrap().as_deref(),
            Some("sk-typed")
        );

        // Same value again leaves everything as it was.
        assert!(lifecycle.on_credential_change("sk-typed").unwrap());
        assert!(client.is_configured());
        assert_eq!(
            lifecycle.store().unwrap().get(KEY).unwrap().as_deref(),
            Some("sk-typed")
        );
    }

    #[test]
    fn test_transient_credential_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.set(KEY, "sk-stored").unwrap();

        let client = Arc::new(MockVisionClient::new().unconfigured());
        let lifecycle = CredentialLifecycle::new(Arc::clone(&client), Some(store), KEY);
        lifecycle.initialize().unwrap();
        lifecycle.use_transient(Credential::new("sk-from-env").unwrap());

        assert!(client.is_configured());
        assert_eq!(
            lifecycle.store().unwrap().get(KEY).unwrap().as_deref(),
            Some("sk-stored")
        );
    }

    #[test]
    fn test_blank_change_clears() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockVisionClient::new());
        let lifecycle = CredentialLifecycle::new(Arc::clone(&client), Some(store_in(&dir)), KEY);
        lifecycle.on_credential_change("sk-a").unwrap();

        assert!(!lifecycle.on_credential_change("   ").unwrap());
        assert!(!client.is_configured());
        assert_eq!(lifecycle.store().unwrap().get(KEY).unwrap(), None);
    }

    #[test]
    fn test_change_emits_event() {
        let (tx, mut rx) = broadcast::channel(4);
        let client = Arc::new(MockVisionClient::new());
        let lifecycle = CredentialLifecycle::new(client, None, KEY).with_events(tx);

        lifecycle.on_credential_change("sk-x").unwrap();
        match rx.try_recv().unwrap() {
            SessionEvent::CredentialChanged { configured, .. } => assert!(configured),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_from_config_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LensConfig::default();
        config.general.data_dir = dir.path().display().to_string();

        let client = Arc::new(MockVisionClient::new());
        let lifecycle = CredentialLifecycle::from_config(client, &config);
        assert_eq!(
            lifecycle.store().unwrap().path(),
            dir.path().join("credentials.json")
        );
    }
}
