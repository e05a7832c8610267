//! Operator credential storage (spec §1.4), encrypted with the Ethereum
//! JSON v3 format via `alloy_signer_local::LocalSigner`.

use alloy_signer::k256::ecdsa::SigningKey;
use alloy_signer_local::LocalSigner;
use eyre::{Result, WrapErr};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

/// Operator key storage, keyed by an arbitrary name (the pool only ever
/// uses one key, named `"operator"`, but the trait stays name-addressed to
/// match the shape this is grounded on).
pub trait Keystore: Send + Sync {
    fn load(&self, name: &str, password: &str) -> Result<SigningKey>;
    fn save(&self, name: &str, key: &SigningKey, password: &str) -> Result<()>;
    fn exists(&self, name: &str) -> bool;
}

/// File-based keystore using AES-128-CTR + scrypt (Ethereum JSON v3).
pub struct FileKeystore {
    path: PathBuf,
}

impl FileKeystore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    fn key_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Keystore for FileKeystore {
    fn load(&self, name: &str, password: &str) -> Result<SigningKey> {
        let path = self.key_path(name);
        let signer = LocalSigner::decrypt_keystore(&path, password)
            .wrap_err_with(|| format!("failed to decrypt key '{name}' from {path:?}"))?;
        Ok(signer.credential().clone())
    }

    fn save(&self, name: &str, key: &SigningKey, password: &str) -> Result<()> {
        fs::create_dir_all(&self.path)
            .wrap_err_with(|| format!("failed to create keystore directory {:?}", self.path))?;

        let mut rng = rand::rng();
        let key_bytes = key.to_bytes();
        LocalSigner::encrypt_keystore(&self.path, &mut rng, key_bytes.as_slice(), password, Some(name))
            .wrap_err_with(|| format!("failed to encrypt and save key '{name}'"))?;

        let path = self.key_path(name);
        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.key_path(name).exists()
    }
}

/// In-memory keystore for `--ephemeral` runs and tests.
#[derive(Default)]
pub struct MemoryKeystore {
    keys: RwLock<HashMap<String, SigningKey>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Keystore for MemoryKeystore {
    fn load(&self, name: &str, _password: &str) -> Result<SigningKey> {
        let keys = self.keys.read().map_err(|_| eyre::eyre!("lock poisoned"))?;
        keys.get(name).cloned().ok_or_else(|| eyre::eyre!("key '{name}' not found in memory keystore"))
    }

    fn save(&self, name: &str, key: &SigningKey, _password: &str) -> Result<()> {
        let mut keys = self.keys.write().map_err(|_| eyre::eyre!("lock poisoned"))?;
        keys.insert(name.to_string(), key.clone());
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.keys.read().map(|keys| keys.contains_key(name)).unwrap_or(false)
    }
}

/// Loads the operator key, generating and persisting a new one on first run.
pub fn load_or_create_operator_key(keystore: &dyn Keystore, password: &str) -> Result<SigningKey> {
    const NAME: &str = "operator";
    if keystore.exists(NAME) {
        keystore.load(NAME, password)
    } else {
        let key = SigningKey::random(&mut rand::rng());
        keystore.save(NAME, &key, password)?;
        Ok(key)
    }
}
