//! Administrator and user keys.
//!
//! Keys live in single-line files in the data directory. When no
//! administrator key exists one is generated at startup and a first-run
//! alert is armed; the alert is disarmed for good the first time a request
//! presents the administrator key, which also drops the activation marker
//! file so the alert stays off across restarts.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{error, info};

use super::Role;
use crate::error::Result;

pub const ADMINISTRATOR_KEY_FILE: &str = "administrator.key";
pub const USER_KEY_FILE: &str = "user.key";
pub const ADMINISTRATOR_ACTIVATED_FILE: &str = "administrator.activated";

pub struct KeyRing {
    data_dir: PathBuf,
    administrator_key: RwLock<Option<String>>,
    user_key: RwLock<Option<String>>,
    show_alert: AtomicBool,
}

impl KeyRing {
    /// Builds a key ring from known keys without touching the disk.
    #[must_use]
    pub fn new(
        data_dir: impl Into<PathBuf>,
        administrator_key: Option<String>,
        user_key: Option<String>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            administrator_key: RwLock::new(administrator_key),
            user_key: RwLock::new(user_key),
            show_alert: AtomicBool::new(false),
        }
    }

    /// Loads keys from `data_dir`, generating and persisting an
    /// administrator key when none exists. Read and write failures are
    /// logged; the returned ring always holds an administrator key.
    pub fn load(data_dir: &Path) -> Self {
        let administrator_key = read_key(&data_dir.join(ADMINISTRATOR_KEY_FILE));
        let user_key = read_key(&data_dir.join(USER_KEY_FILE));
        let activated = data_dir.join(ADMINISTRATOR_ACTIVATED_FILE).exists();

        let ring = Self::new(data_dir, administrator_key, user_key);

        if ring.administrator_key().is_some() {
            ring.show_alert.store(!activated, Ordering::SeqCst);
        } else {
            let key = generate_key();
            info!("Created administrator key");
            if let Err(e) = write_administrator_key(data_dir, &key) {
                error!("Could not write administrator key: {e}");
            }
            *ring.write_administrator() = Some(key);
            ring.show_alert.store(true, Ordering::SeqCst);
        }

        ring
    }

    fn read_administrator(&self) -> RwLockReadGuard<'_, Option<String>> {
        self.administrator_key
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn write_administrator(&self) -> std::sync::RwLockWriteGuard<'_, Option<String>> {
        self.administrator_key
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn administrator_key(&self) -> Option<String> {
        self.read_administrator().clone()
    }

    #[must_use]
    pub fn user_key(&self) -> Option<String> {
        self.user_key
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// True when no administrator key is configured or `key` matches it.
    #[must_use]
    pub fn is_administrator(&self, key: Option<&str>) -> bool {
        match self.read_administrator().as_deref() {
            None => true,
            Some(expected) => key == Some(expected),
        }
    }

    /// True when no user key is configured or `key` matches it.
    #[must_use]
    pub fn is_user(&self, key: Option<&str>) -> bool {
        let user_key = self.user_key.read().unwrap_or_else(|e| e.into_inner());
        match user_key.as_deref() {
            None => true,
            Some(expected) => key == Some(expected),
        }
    }

    #[must_use]
    pub fn role(&self, key: Option<&str>) -> Role {
        if self.is_administrator(key) {
            Role::Administrator
        } else {
            Role::User
        }
    }

    /// The administrator key while the first-run alert is armed.
    #[must_use]
    pub fn pending_alert(&self) -> Option<String> {
        if self.show_alert.load(Ordering::SeqCst) {
            self.administrator_key()
        } else {
            None
        }
    }

    /// Records that the administrator key has been used. Only the first
    /// call after the alert was armed touches the disk.
    pub fn activate(&self) {
        if !self.show_alert.swap(false, Ordering::SeqCst) {
            return;
        }

        let marker = self.data_dir.join(ADMINISTRATOR_ACTIVATED_FILE);
        match fs::OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(_) => info!("Administrator key activated"),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => error!("Can't create file '{}': {e}", marker.display()),
        }
    }

    /// Replaces the administrator key with a freshly generated one and
    /// re-arms the first-run alert. On write failure the old key stays.
    pub fn rotate_administrator_key(&self) -> Result<String> {
        let key = generate_key();
        write_administrator_key(&self.data_dir, &key).inspect_err(|e| {
            error!("Could not write administrator key: {e}");
        })?;

        *self.write_administrator() = Some(key.clone());
        self.show_alert.store(true, Ordering::SeqCst);
        info!("Rotated administrator key");
        Ok(key)
    }
}

/// Digest used for generated keys. `None` makes [`generate_key`] fall back
/// to the raw timestamp, which keeps key generation working on builds that
/// drop the hash.
const KEY_DIGEST: Option<fn(&[u8]) -> String> = Some(sha256_hex);

/// Generates a key from the current time.
#[must_use]
pub fn generate_key() -> String {
    let now = Utc::now();
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros());
    derive_key(&format!("{nanos:x}"), KEY_DIGEST)
}

/// Hashes a timestamp string into key material. Without a digest the
/// timestamp itself is the key, so the result is never empty for a
/// non-empty timestamp.
#[must_use]
pub fn derive_key(timestamp: &str, digest: Option<fn(&[u8]) -> String>) -> String {
    match digest {
        Some(digest) => digest(timestamp.as_bytes()),
        None => timestamp.to_string(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn read_key(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(str::to_string),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            error!("Could not read key file '{}': {e}", path.display());
            None
        }
    }
}

/// Drops the activation marker before writing the key, so a failure never
/// leaves a new key on disk next to an old key in memory.
fn write_administrator_key(data_dir: &Path, key: &str) -> std::io::Result<()> {
    fs::create_dir_all(data_dir)?;

    match fs::remove_file(data_dir.join(ADMINISTRATOR_ACTIVATED_FILE)) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    fs::write(data_dir.join(ADMINISTRATOR_KEY_FILE), format!("{key}\n"))
}
