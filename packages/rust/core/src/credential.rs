//! Model-access credential lifecycle.
//!
//! The credential is loaded once from the durable store, cached in memory,
//! and shared read-only by every pipeline slot. Writes go through
//! [`CredentialStore::set`] / [`CredentialStore::clear`] only.

use std::fmt;
use std::sync::{Arc, RwLock};

use clearmind_shared::{ClearMindError, Result};
use clearmind_storage::KeyValueStore;
use tracing::info;

/// Fixed storage key for the model API key.
pub const CREDENTIAL_KEY: &str = "model_api_key";

/// Opaque access token. `Debug` and `Display` never reveal the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a value, rejecting blank input. Surrounding whitespace is dropped.
    pub fn new(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ClearMindError::InvalidCredential);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The raw secret, for placing into a request header only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Masked form shown on re-entry: `****` plus the last four characters
    /// when the value is long enough that the tail does not give it away.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() > 8 {
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("****{tail}")
        } else {
            "****".to_string()
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.masked())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Owns the credential cache and its durable copy.
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
    cached: RwLock<Option<Credential>>,
}

impl CredentialStore {
    /// Load the stored credential (if any) into memory.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let cached = store
            .read(CREDENTIAL_KEY)
            .await?
            .and_then(|value| Credential::new(&value).ok());
        info!(configured = cached.is_some(), "credential store loaded");
        Ok(Self {
            store,
            cached: RwLock::new(cached),
        })
    }

    /// Current credential, from the in-memory cache.
    pub fn get(&self) -> Option<Credential> {
        self.cached
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether a non-empty credential is cached.
    pub fn is_configured(&self) -> bool {
        self.cached
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Validate, persist, then swap the cached value in one step.
    ///
    /// On any failure the previous value stays in place.
    pub async fn set(&self, value: &str) -> Result<()> {
        let credential = Credential::new(value)?;
        self.store
            .write(CREDENTIAL_KEY, credential.expose())
            .await?;
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = Some(credential);
        info!("credential updated");
        Ok(())
    }

    /// Remove the credential from storage and memory.
    pub async fn clear(&self) -> Result<()> {
        self.store.remove(CREDENTIAL_KEY).await?;
        *self.cached.write().unwrap_or_else(|e| e.into_inner()) = None;
        info!("credential cleared");
        Ok(())
    }
}
