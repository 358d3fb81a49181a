mod file;

pub use file::FileSongStore;

use crate::error::Result;

/// SongStore is the durable home of song content, keyed by song id.
pub trait SongStore: Send + Sync {
    fn exists(&self, id: &str) -> Result<bool>;
    fn read(&self, id: &str) -> Result<Option<String>>;
    fn write(&self, id: &str, content: &str) -> Result<()>;
    fn delete(&self, id: &str) -> Result<bool>;
    /// Lists the ids of every stored song, sorted.
    fn list_ids(&self) -> Result<Vec<String>>;
    /// Drops any cached content; the next read goes to disk.
    fn clear_cache(&self);
}
