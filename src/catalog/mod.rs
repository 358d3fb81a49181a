//! Keeps the song files and the search index in step.
//!
//! Every mutation writes the file first and the index second. The pair is
//! not transactional: when the index update fails after the file write
//! succeeded, the song is durable but unsearchable, the failure is logged
//! and returned, and nothing is rolled back. A full [`Catalog::reindex`]
//! rebuilds the index from the files and closes that gap.

mod locks;

use std::sync::{Arc, MutexGuard};

use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::index::{IndexDocument, SearchIndex, SongHit};
use crate::song::Song;
use crate::store::SongStore;
use locks::IdLocks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedSong {
    pub id: String,
    /// Title as it was indexed, or the id when the song was not indexed.
    pub title: String,
}

pub struct Catalog {
    store: Arc<dyn SongStore>,
    index: SearchIndex,
    locks: IdLocks,
}

impl Catalog {
    pub fn new(store: Arc<dyn SongStore>, index: SearchIndex) -> Self {
        Self {
            store,
            index,
            locks: IdLocks::default(),
        }
    }

    /// Creates a catalog over `store` with a freshly built index.
    pub fn open(store: Arc<dyn SongStore>) -> Result<Self> {
        let catalog = Self::new(store, SearchIndex::new()?);
        let count = catalog.reindex()?;
        info!("Indexed {count} songs");
        Ok(catalog)
    }

    #[must_use]
    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    #[must_use]
    pub fn store(&self) -> &dyn SongStore {
        self.store.as_ref()
    }

    /// Stores a new song and returns its id. A song with the same title and
    /// artist is overwritten.
    pub fn create(&self, content: &str) -> Result<String> {
        let song = Song::parse(content);
        song.validate()?;
        let id = song.id();

        let lock = self.locks.get(&id);
        let _guard = hold(&lock);
        self.write_and_index(&id, content, &song, "create")?;

        info!("Created song {id}");
        Ok(id)
    }

    /// Replaces the content of an existing song. The id never changes, even
    /// when the title or artist do.
    pub fn update(&self, id: &str, content: &str) -> Result<String> {
        let lock = self.locks.get(id);
        let _guard = hold(&lock);

        if !self.store.exists(id)? {
            return Err(Error::NotFound(id.to_string()));
        }

        let song = Song::parse(content);
        song.validate()?;
        self.write_and_index(id, content, &song, "update")?;

        info!("Updated song {id}");
        Ok(id.to_string())
    }

    pub fn delete(&self, id: &str) -> Result<DeletedSong> {
        let lock = self.locks.get(id);
        let _guard = hold(&lock);

        if !self.store.exists(id)? {
            return Err(Error::NotFound(id.to_string()));
        }

        let title = match self.index.title(id) {
            Ok(title) => title,
            Err(e) => {
                warn!("Failed to read indexed title of song {id}: {e}");
                None
            }
        };

        self.store.delete(id).inspect_err(|e| {
            error!("Failed to delete song file {id}: {e}");
        })?;

        self.index.remove(id).inspect_err(|e| {
            error!("Song {id} deleted from store but still indexed until reindex: {e}");
        })?;

        info!("Deleted song {id}");
        Ok(DeletedSong {
            id: id.to_string(),
            title: title.unwrap_or_else(|| id.to_string()),
        })
    }

    pub fn fetch(&self, id: &str) -> Result<String> {
        self.store
            .read(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub fn search(&self, query: Option<&str>) -> Result<Vec<SongHit>> {
        self.index.search(query)
    }

    /// Drops cached song content and rebuilds the whole index from the
    /// store. Returns the number of indexed songs.
    pub fn reindex(&self) -> Result<usize> {
        self.store.clear_cache();
        self.index.rebuild_with(|| self.load_documents())
    }

    fn load_documents(&self) -> Result<Vec<IndexDocument>> {
        let ids = self.store.list_ids()?;
        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.read(&id) {
                Ok(Some(content)) => {
                    let song = Song::parse(&content);
                    if let Err(e) = song.validate() {
                        warn!("Indexing song {id} with incomplete metadata: {e}");
                    }
                    documents.push(IndexDocument::from_song(&id, &song));
                }
                Ok(None) => {}
                Err(e) => error!("Failed to read song {id} while reindexing: {e}"),
            }
        }
        Ok(documents)
    }

    fn write_and_index(&self, id: &str, content: &str, song: &Song, op: &str) -> Result<()> {
        self.store.write(id, content).inspect_err(|e| {
            error!("Failed to write song {id} during {op}: {e}");
        })?;

        self.index
            .upsert(&IndexDocument::from_song(id, song))
            .inspect_err(|e| {
                error!("Song {id} written during {op} but not indexed until reindex: {e}");
            })
    }
}

fn hold(lock: &std::sync::Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;
    use crate::store::FileSongStore;

    const IMAGINE: &str = "{title: Imagine}\n{artist: Lennon}\n{album: Imagine}\n[C]Imagine all the [F]people\n";

    fn catalog() -> (TempDir, Catalog) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSongStore::new(temp_dir.path().join("songs")).unwrap();
        let catalog = Catalog::open(Arc::new(store)).unwrap();
        (temp_dir, catalog)
    }

    /// In-memory store whose writes can be made to fail.
    #[derive(Default)]
    struct MemoryStore {
        songs: Mutex<BTreeMap<String, String>>,
        fail_writes: bool,
    }

    impl SongStore for MemoryStore {
        fn exists(&self, id: &str) -> Result<bool> {
            Ok(self.songs.lock().unwrap().contains_key(id))
        }

        fn read(&self, id: &str) -> Result<Option<String>> {
            Ok(self.songs.lock().unwrap().get(id).cloned())
        }

        fn write(&self, id: &str, content: &str) -> Result<()> {
            if self.fail_writes {
                return Err(std::io::Error::other("disk full").into());
            }
            self.songs
                .lock()
                .unwrap()
                .insert(id.to_string(), content.to_string());
            Ok(())
        }

        fn delete(&self, id: &str) -> Result<bool> {
            Ok(self.songs.lock().unwrap().remove(id).is_some())
        }

        fn list_ids(&self) -> Result<Vec<String>> {
            Ok(self.songs.lock().unwrap().keys().cloned().collect())
        }

        fn clear_cache(&self) {}
    }

    #[test]
    fn test_create_then_fetch_and_query() {
        let (_dir, catalog) = catalog();

        let id = catalog.create(IMAGINE).unwrap();

        let song = Song::parse(&catalog.fetch(&id).unwrap());
        assert_eq!(song.title, "Imagine");
        assert_eq!(song.artist, "Lennon");

        let hits = catalog.search(Some("title:Imagine")).unwrap();
        assert!(hits.iter().any(|h| h.id == id));
        assert_eq!(hits[0].author, "Lennon");
        assert_eq!(hits[0].album, "Imagine");
    }

    #[test]
    fn test_create_same_song_twice_keeps_one_entry() {
        let (_dir, catalog) = catalog();
        let first = catalog.create(IMAGINE).unwrap();
        let second = catalog.create(IMAGINE).unwrap();

        assert_eq!(first, second);
        assert_eq!(catalog.index().len(), 1);
    }

    #[test]
    fn test_create_without_artist_writes_nothing() {
        let (_dir, catalog) = catalog();

        let result = catalog.create("{title: Lonely}\nla la\n");

        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(catalog.store().list_ids().unwrap().is_empty());
        assert!(catalog.index().is_empty());
    }

    #[test]
    fn test_create_without_title_writes_nothing() {
        let (_dir, catalog) = catalog();

        let result = catalog.create("{artist: Nobody}\n");

        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(catalog.store().list_ids().unwrap().is_empty());
        assert!(catalog.index().is_empty());
    }

    #[test]
    fn test_update_changes_metadata_but_not_id() {
        let (_dir, catalog) = catalog();
        let id = catalog.create(IMAGINE).unwrap();

        let updated = catalog
            .update(&id, "{title: Imagine (Live)}\n{artist: Lennon}\nnew words\n")
            .unwrap();

        assert_eq!(updated, id);
        assert_eq!(catalog.index().title(&id).unwrap().as_deref(), Some("Imagine (Live)"));
        assert_eq!(catalog.index().len(), 1);
        assert!(catalog.fetch(&id).unwrap().contains("new words"));
    }

    #[test]
    fn test_update_unknown_id_changes_nothing() {
        let (_dir, catalog) = catalog();
        let id = catalog.create(IMAGINE).unwrap();
        let files_before = catalog.fetch(&id).unwrap();
        let index_before = catalog.index().documents().unwrap();

        let result = catalog.update("missing-song", IMAGINE);

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(catalog.store().list_ids().unwrap(), vec![id.clone()]);
        assert_eq!(catalog.fetch(&id).unwrap(), files_before);
        assert_eq!(catalog.index().documents().unwrap(), index_before);
    }

    #[test]
    fn test_delete_removes_from_store_and_index() {
        let (_dir, catalog) = catalog();
        let id = catalog.create(IMAGINE).unwrap();

        let deleted = catalog.delete(&id).unwrap();

        assert_eq!(deleted.title, "Imagine");
        assert!(matches!(catalog.fetch(&id), Err(Error::NotFound(_))));
        assert!(catalog.search(None).unwrap().iter().all(|h| h.id != id));
        assert!(catalog.search(Some("imagine")).unwrap().is_empty());
    }

    #[test]
    fn test_delete_unknown_id() {
        let (_dir, catalog) = catalog();
        assert!(matches!(catalog.delete("missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_storage_failure_skips_index() {
        let store = Arc::new(MemoryStore {
            fail_writes: true,
            ..Default::default()
        });
        let catalog = Catalog::new(store, SearchIndex::new().unwrap());

        let result = catalog.create(IMAGINE);

        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(catalog.index().is_empty());
    }

    #[test]
    fn test_index_failure_after_write_keeps_file_until_reindex() {
        let store = Arc::new(MemoryStore::default());
        let catalog = Catalog::new(store, SearchIndex::new().unwrap());
        catalog.index().fail_upserts(true);

        let error = catalog.create(IMAGINE).unwrap_err();

        assert!(matches!(error, Error::Index(_)));
        assert_eq!(
            crate::server::response::ApiError::from(error).status,
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
        let id = Song::parse(IMAGINE).id();
        assert_eq!(catalog.fetch(&id).unwrap(), IMAGINE);
        assert!(catalog.index().is_empty());
        assert!(catalog.search(Some("people")).unwrap().is_empty());

        catalog.index().fail_upserts(false);
        assert_eq!(catalog.reindex().unwrap(), 1);
        assert_eq!(catalog.search(Some("people")).unwrap()[0].id, id);
    }

    #[test]
    fn test_index_failure_on_update_keeps_new_content() {
        let (_dir, catalog) = catalog();
        let id = catalog.create(IMAGINE).unwrap();
        catalog.index().fail_upserts(true);

        let updated = IMAGINE.replace("people", "dreamers");
        let result = catalog.update(&id, &updated);

        assert!(matches!(result, Err(Error::Index(_))));
        assert_eq!(catalog.fetch(&id).unwrap(), updated);
        assert!(catalog.search(Some("dreamers")).unwrap().is_empty());

        catalog.index().fail_upserts(false);
        catalog.reindex().unwrap();
        assert_eq!(catalog.search(Some("dreamers")).unwrap()[0].id, id);
    }

    #[test]
    fn test_reindex_heals_unindexed_song() {
        let store = Arc::new(MemoryStore::default());
        store.write("orphan", IMAGINE).unwrap();
        let catalog = Catalog::new(store, SearchIndex::new().unwrap());
        assert!(catalog.index().is_empty());

        assert_eq!(catalog.reindex().unwrap(), 1);
        assert_eq!(catalog.index().title("orphan").unwrap().as_deref(), Some("Imagine"));
    }

    #[test]
    fn test_reindex_is_idempotent_and_matches_store() {
        let (_dir, catalog) = catalog();
        catalog.create(IMAGINE).unwrap();
        catalog
            .create("{title: Yesterday}\n{artist: McCartney}\nall my troubles\n")
            .unwrap();

        catalog.reindex().unwrap();
        let first = catalog.index().documents().unwrap();
        catalog.reindex().unwrap();
        let second = catalog.index().documents().unwrap();

        assert_eq!(first, second);
        let mut indexed: Vec<String> = first.into_iter().map(|h| h.id).collect();
        indexed.sort();
        assert_eq!(indexed, catalog.store().list_ids().unwrap());
    }

    #[test]
    fn test_open_indexes_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        let songs_dir = temp_dir.path().join("songs");
        {
            let store = FileSongStore::new(&songs_dir).unwrap();
            store.write("imagine-lennon", IMAGINE).unwrap();
        }

        let store = FileSongStore::new(&songs_dir).unwrap();
        let catalog = Catalog::open(Arc::new(store)).unwrap();

        assert_eq!(catalog.search(Some("people")).unwrap()[0].id, "imagine-lennon");
    }
}
