use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::SongStore;
use crate::error::{Error, Result};
use crate::song::is_valid_id;

pub const SONG_EXTENSION: &str = "song";

/// Stores one `<id>.song` file per song under a single directory.
pub struct FileSongStore {
    songs_dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl FileSongStore {
    pub fn new<P: AsRef<Path>>(songs_dir: P) -> Result<Self> {
        let songs_dir = songs_dir.as_ref().to_path_buf();
        fs::create_dir_all(&songs_dir)?;
        Ok(Self {
            songs_dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn songs_dir(&self) -> &Path {
        &self.songs_dir
    }

    fn song_path(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(Error::InvalidId(id.to_string()));
        }
        Ok(self.songs_dir.join(format!("{id}.{SONG_EXTENSION}")))
    }

    fn temp_path(&self) -> PathBuf {
        self.songs_dir
            .join(".tmp")
            .join(Uuid::new_v4().to_string())
    }

    fn cache_read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<str>>> {
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn cache_write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<str>>> {
        self.cache.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl SongStore for FileSongStore {
    fn exists(&self, id: &str) -> Result<bool> {
        if !is_valid_id(id) {
            return Ok(false);
        }
        if self.cache_read().contains_key(id) {
            return Ok(true);
        }
        Ok(self.song_path(id)?.is_file())
    }

    fn read(&self, id: &str) -> Result<Option<String>> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        if let Some(content) = self.cache_read().get(id) {
            return Ok(Some(content.to_string()));
        }

        let content = match fs::read_to_string(self.song_path(id)?) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        self.cache_write()
            .insert(id.to_string(), Arc::from(content.as_str()));
        Ok(Some(content))
    }

    fn write(&self, id: &str, content: &str) -> Result<()> {
        let final_path = self.song_path(id)?;

        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut temp_file = File::create(&temp_path)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.sync_all()?;

        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        self.cache_write().insert(id.to_string(), Arc::from(content));
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let path = self.song_path(id)?;
        self.cache_write().remove(id);

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.songs_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(SONG_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if is_valid_id(id) {
                ids.push(id.to_string());
            } else {
                tracing::warn!("Skipping song file with invalid id: {}", path.display());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn clear_cache(&self) {
        self.cache_write().clear();
    }
}
