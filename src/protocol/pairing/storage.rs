//! Persistence for pairing credentials

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::PairingCredentials;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("sealed credential field could not be recovered")]
    Unsealable,
}

/// Abstract storage for the single pairing-credentials record
///
/// Writers persist synchronously before acknowledging success to the POS;
/// the window between in-memory mutation and a failed save is the one
/// acknowledged inconsistency.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the persisted credentials (empty record if never saved)
    async fn load(&self) -> Result<PairingCredentials, StorageError>;

    /// Persist the credentials
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be durably written.
    async fn save(&self, credentials: &PairingCredentials) -> Result<(), StorageError>;
}

/// In-memory store (non-persistent, for tests and embedding)
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<PairingCredentials>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<PairingCredentials, StorageError> {
        Ok(self.record.lock().await.clone())
    }

    async fn save(&self, credentials: &PairingCredentials) -> Result<(), StorageError> {
        *self.record.lock().await = credentials.clone();
        Ok(())
    }
}

/// On-disk layout, version 1
///
/// `mac_key` and `mac_label` are individually AES-256-GCM sealed under a
/// 32-byte master key kept in a sibling `.key` file; the pairing code is
/// not secret and stays plain. The layout is internal — peers never read
/// this file.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    version: u32,
    mac_key: SealedValue,
    mac_label: SealedValue,
    pairing_code: String,
}

#[derive(Serialize, Deserialize)]
struct SealedValue {
    nonce: String,
    data: String,
}

const STORE_VERSION: u32 = 1;

/// File-backed credential store
pub struct FileStore {
    path: PathBuf,
    master_key: [u8; 32],
}

impl FileStore {
    /// Open (or initialize) a store at the given path
    ///
    /// Creates parent directories and the master key file on first use.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or key file cannot be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let master_key = Self::load_or_create_master_key(&path).await?;

        Ok(Self { path, master_key })
    }

    async fn load_or_create_master_key(path: &Path) -> Result<[u8; 32], StorageError> {
        use rand::RngCore;

        let key_path = key_path_for(path);
        if tokio::fs::try_exists(&key_path).await? {
            let bytes = tokio::fs::read(&key_path).await?;
            let key: [u8; 32] = bytes.try_into().map_err(|_| StorageError::Unsealable)?;
            return Ok(key);
        }

        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        tokio::fs::write(&key_path, key).await?;
        Ok(key)
    }

    fn seal(&self, plaintext: &[u8]) -> Result<SealedValue, StorageError> {
        use aes_gcm::aead::Aead;
        use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
        use rand::RngCore;

        let cipher =
            Aes256Gcm::new_from_slice(&self.master_key).map_err(|_| StorageError::Unsealable)?;

        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);

        let data = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| StorageError::Unsealable)?;

        Ok(SealedValue {
            nonce: BASE64.encode(nonce),
            data: BASE64.encode(data),
        })
    }

    fn unseal(&self, value: &SealedValue) -> Result<Vec<u8>, StorageError> {
        use aes_gcm::aead::Aead;
        use aes_gcm::{Aes256Gcm, KeyInit, Nonce};

        let cipher =
            Aes256Gcm::new_from_slice(&self.master_key).map_err(|_| StorageError::Unsealable)?;

        let nonce = BASE64
            .decode(&value.nonce)
            .map_err(|_| StorageError::Unsealable)?;
        let data = BASE64
            .decode(&value.data)
            .map_err(|_| StorageError::Unsealable)?;

        cipher
            .decrypt(Nonce::from_slice(&nonce), data.as_slice())
            .map_err(|_| StorageError::Unsealable)
    }
}

fn key_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".key");
    PathBuf::from(os)
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn load(&self) -> Result<PairingCredentials, StorageError> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(PairingCredentials::default());
        }

        let bytes = tokio::fs::read(&self.path).await?;
        if bytes.is_empty() {
            return Ok(PairingCredentials::default());
        }

        let record: StoredRecord =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;
        if record.version != STORE_VERSION {
            return Err(StorageError::Serialization(format!(
                "unsupported store version {}",
                record.version
            )));
        }

        let mac_key = self.unseal(&record.mac_key)?;
        let mac_label = String::from_utf8(self.unseal(&record.mac_label)?)
            .map_err(|_| StorageError::Unsealable)?;

        Ok(PairingCredentials {
            mac_key,
            mac_label,
            pairing_code: record.pairing_code,
        })
    }

    async fn save(&self, credentials: &PairingCredentials) -> Result<(), StorageError> {
        let record = StoredRecord {
            version: STORE_VERSION,
            mac_key: self.seal(&credentials.mac_key)?,
            mac_label: self.seal(credentials.mac_label.as_bytes())?,
            pairing_code: credentials.pairing_code.clone(),
        };

        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
