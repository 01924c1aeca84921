//! The credential gate.
//!
//! A [`Credential`] is acquired at most once per process and shared by every
//! session. [`CredentialGate`] owns that lifecycle: it asks a
//! [`CredentialStore`] for an existing key, falls back to the store's
//! interactive acquisition flow, and caches the result.

use std::env;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::observability::{CREDENTIAL_ACQUISITIONS, CREDENTIAL_DECLINED};

/// Primary environment variable holding the API key.
pub const API_KEY_ENV: &str = "NEXUS_API_KEY";

/// Fallback environment variable, shared with other Gemini tooling.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// An opaque API key.
///
/// Cloning is cheap. `Debug` and `Display` never reveal the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Wrap a key. Surrounding whitespace is trimmed; a blank key is `None`.
    pub fn new(key: impl AsRef<str>) -> Option<Self> {
        let key = key.as_ref().trim();
        if key.is_empty() {
            None
        } else {
            Some(Self(Arc::from(key)))
        }
    }

    /// The raw key, for the request header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "…{tail}")
    }
}

/// Where credentials come from.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// A credential that is already available without asking anyone.
    async fn stored_credential(&self) -> Option<Credential>;

    /// Whether [`CredentialStore::stored_credential`] would return one.
    async fn has_credential(&self) -> bool {
        self.stored_credential().await.is_some()
    }

    /// Run the acquisition flow (a picker, a prompt). `None` means the user
    /// declined or abandoned it.
    async fn request_credential(&self) -> Option<Credential>;
}

/// Anything that can hand out a ready-to-use credential.
///
/// Sessions hold an `Arc<dyn Authorizer>` so tests can swap in a fake gate.
#[async_trait::async_trait]
pub trait Authorizer: Send + Sync {
    /// Return a usable credential, acquiring one first if necessary.
    async fn ensure_authorized(&self) -> Result<Credential>;

    /// Forget the cached credential, e.g. after the backend rejected it.
    async fn invalidate(&self) {}
}

/// Caches the process-wide credential in front of a [`CredentialStore`].
pub struct CredentialGate {
    store: Box<dyn CredentialStore>,
    cached: RwLock<Option<Credential>>,
    acquiring: Mutex<()>,
    rejected: Mutex<Vec<Credential>>,
}

impl CredentialGate {
    /// Create a gate over the given store. Nothing is acquired yet.
    pub fn new(store: impl CredentialStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            cached: RwLock::new(None),
            acquiring: Mutex::new(()),
            rejected: Mutex::new(Vec::new()),
        }
    }

    /// A gate that reads the key from the environment and never prompts.
    pub fn from_env() -> Self {
        Self::new(EnvCredentialStore)
    }

    /// The cached credential, if one has been acquired.
    pub async fn current(&self) -> Option<Credential> {
        self.cached.read().await.clone()
    }

    async fn is_rejected(&self, credential: &Credential) -> bool {
        self.rejected.lock().await.contains(credential)
    }
}

#[async_trait::async_trait]
impl Authorizer for CredentialGate {
    async fn ensure_authorized(&self) -> Result<Credential> {
        if let Some(credential) = self.current().await {
            return Ok(credential);
        }

        // One acquisition at a time; later callers see the winner's result.
        let _acquiring = self.acquiring.lock().await;
        if let Some(credential) = self.current().await {
            return Ok(credential);
        }

        let mut stored = self.store.stored_credential().await;
        if let Some(credential) = &stored {
            if self.is_rejected(credential).await {
                tracing::info!("stored credential was rejected before; skipping it");
                stored = None;
            }
        }
        let credential = match stored {
            Some(credential) => credential,
            None => {
                tracing::info!("no usable stored credential; starting acquisition");
                let Some(credential) = self.store.request_credential().await else {
                    CREDENTIAL_DECLINED.click();
                    return Err(Error::authorization("credential acquisition was declined"));
                };
                if self.is_rejected(&credential).await {
                    CREDENTIAL_DECLINED.click();
                    return Err(Error::authorization(
                        "acquisition returned a credential that was already rejected",
                    ));
                }
                credential
            }
        };

        CREDENTIAL_ACQUISITIONS.click();
        *self.cached.write().await = Some(credential.clone());
        Ok(credential)
    }

    async fn invalidate(&self) {
        let taken = self.cached.write().await.take();
        if let Some(credential) = taken {
            tracing::warn!(%credential, "cached credential invalidated");
            let mut rejected = self.rejected.lock().await;
            if !rejected.contains(&credential) {
                rejected.push(credential);
            }
        }
    }
}

/// Reads [`API_KEY_ENV`], then [`GEMINI_API_KEY_ENV`]. Has no interactive flow.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentialStore;

#[async_trait::async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn stored_credential(&self) -> Option<Credential> {
        [API_KEY_ENV, GEMINI_API_KEY_ENV]
            .into_iter()
            .filter_map(|name| env::var(name).ok())
            .find_map(Credential::new)
    }

    async fn request_credential(&self) -> Option<Credential> {
        None
    }
}

/// A fixed answer, for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentialStore {
    stored: Option<Credential>,
    granted: Option<Credential>,
}

impl StaticCredentialStore {
    /// A store that already holds `key`.
    pub fn stored(key: &str) -> Self {
        Self {
            stored: Credential::new(key),
            granted: None,
        }
    }

    /// A store that holds nothing but grants `key` when asked.
    pub fn granting(key: &str) -> Self {
        Self {
            stored: None,
            granted: Credential::new(key),
        }
    }

    /// A store that holds nothing and declines every request.
    pub fn declining() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn stored_credential(&self) -> Option<Credential> {
        self.stored.clone()
    }

    async fn request_credential(&self) -> Option<Credential> {
        self.granted.clone()
    }
}
