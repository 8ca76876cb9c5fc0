use crate::domain::models::OAuthToken;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait CredentialStore: Send + Sync {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError>;
}

/// Token cache kept as a JSON file next to the client-secret file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        let payload = serde_json::to_string_pretty(token)
            .map_err(|error| InfraError::Credential(error.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{payload}\n")).map_err(|error| {
            InfraError::Credential(format!("failed writing {}: {error}", self.path.display()))
        })
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let payload = match fs::read_to_string(&self.path) {
            Ok(value) => value,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(InfraError::Credential(format!(
                    "failed reading {}: {error}",
                    self.path.display()
                )));
            }
        };

        // An unreadable cache is treated like no cache so the user can re-authorize.
        match serde_json::from_str::<OAuthToken>(&payload) {
            Ok(token) => Ok(Some(token)),
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "ignoring malformed token cache");
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    token: Mutex<Option<OAuthToken>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(token.clone());
        Ok(())
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }
}
