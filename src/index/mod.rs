//! In-memory full-text index over the song catalog.
//!
//! Readers always work against an immutable snapshot obtained by cloning an
//! `Arc`. Mutations go through a single writer at a time; a full rebuild
//! fills a brand new snapshot and publishes it with one pointer swap, so a
//! search never sees a half-built index.

mod schema;

pub use schema::{IndexDocument, SongFields, SongHit, build_schema};

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{
    DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term,
    doc,
};

use crate::error::{Error, Result};

pub const DEFAULT_RESULT_LIMIT: usize = 50;

const WRITER_MEMORY_BYTES: usize = 20_000_000;

struct Snapshot {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: SongFields,
}

impl Snapshot {
    fn create() -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        let writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        })
    }

    fn writer(&self) -> MutexGuard<'_, IndexWriter> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn add(&self, writer: &mut IndexWriter, document: &IndexDocument) -> Result<()> {
        let f = &self.fields;
        writer.delete_term(Term::from_field_text(f.id, &document.id));
        writer.add_document(doc!(
            f.id => document.id.as_str(),
            f.lyrics => document.lyrics.as_str(),
            f.title => document.title.as_str(),
            f.author => document.author.as_str(),
            f.album => document.album.as_str(),
        ))?;
        Ok(())
    }

    fn commit(&self, writer: &mut IndexWriter) -> Result<()> {
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    fn hit(&self, searcher: &Searcher, score: f32, address: DocAddress) -> Result<SongHit> {
        let document: TantivyDocument = searcher.doc(address)?;
        let text = |field: Field| {
            document
                .get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Ok(SongHit {
            id: text(self.fields.id),
            title: text(self.fields.title),
            author: text(self.fields.author),
            album: text(self.fields.album),
            score,
        })
    }

    fn search(&self, query: &dyn Query, limit: usize) -> Result<Vec<SongHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let searcher = self.reader.searcher();
        let top = searcher.search(query, &TopDocs::with_limit(limit))?;
        top.into_iter()
            .map(|(score, address)| self.hit(&searcher, score, address))
            .collect()
    }

    /// Every document scores the same under `AllQuery`, so the whole index
    /// is collected and sorted before the cap applies.
    fn match_all(&self, limit: usize) -> Result<Vec<SongHit>> {
        let mut hits = self.search(&AllQuery, self.num_docs())?;
        hits.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    fn num_docs(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }
}

pub struct SearchIndex {
    current: RwLock<Arc<Snapshot>>,
    /// Serializes upserts, removals and rebuilds.
    write_lock: Mutex<()>,
    #[cfg(test)]
    fail_upserts: std::sync::atomic::AtomicBool,
    #[cfg(test)]
    fail_queries: std::sync::atomic::AtomicBool,
}

impl SearchIndex {
    pub fn new() -> Result<Self> {
        Ok(Self {
            current: RwLock::new(Arc::new(Snapshot::create()?)),
            write_lock: Mutex::new(()),
            #[cfg(test)]
            fail_upserts: std::sync::atomic::AtomicBool::new(false),
            #[cfg(test)]
            fail_queries: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Makes every following upsert fail, leaving the index untouched.
    #[cfg(test)]
    pub(crate) fn fail_upserts(&self, fail: bool) {
        self.fail_upserts
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Makes every following [`SearchIndex::query`] fail.
    #[cfg(test)]
    pub(crate) fn fail_queries(&self, fail: bool) {
        self.fail_queries
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds the document, replacing any previous document with the same id.
    pub fn upsert(&self, document: &IndexDocument) -> Result<()> {
        let _guard = self.lock_writes();
        #[cfg(test)]
        if self.fail_upserts.load(std::sync::atomic::Ordering::SeqCst) {
            let error = tantivy::TantivyError::SystemError("index writer unavailable".to_string());
            return Err(error.into());
        }
        let snapshot = self.snapshot();
        let mut writer = snapshot.writer();
        snapshot.add(&mut writer, document)?;
        snapshot.commit(&mut writer)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        let _guard = self.lock_writes();
        let snapshot = self.snapshot();
        let mut writer = snapshot.writer();
        writer.delete_term(Term::from_field_text(snapshot.fields.id, id));
        snapshot.commit(&mut writer)
    }

    /// Runs a query with the default result cap.
    pub fn search(&self, query: Option<&str>) -> Result<Vec<SongHit>> {
        self.query(query, DEFAULT_RESULT_LIMIT)
    }

    /// Runs a query. An empty or absent query string matches every song,
    /// ordered by title then id.
    pub fn query(&self, query: Option<&str>, limit: usize) -> Result<Vec<SongHit>> {
        #[cfg(test)]
        if self.fail_queries.load(std::sync::atomic::Ordering::SeqCst) {
            let error = tantivy::TantivyError::SystemError("index reader unavailable".to_string());
            return Err(error.into());
        }
        let snapshot = self.snapshot();
        let query = query.map(str::trim).unwrap_or_default();
        if query.is_empty() {
            return snapshot.match_all(limit);
        }

        let parser = QueryParser::for_index(&snapshot.index, vec![snapshot.fields.lyrics]);
        let parsed = parser
            .parse_query(query)
            .map_err(|e| Error::IndexQuery(e.to_string()))?;
        snapshot.search(parsed.as_ref(), limit)
    }

    /// Returns the stored title of a song, if it is indexed.
    pub fn title(&self, id: &str) -> Result<Option<String>> {
        let snapshot = self.snapshot();
        let query = TermQuery::new(
            Term::from_field_text(snapshot.fields.id, id),
            IndexRecordOption::Basic,
        );
        let hits = snapshot.search(&query, 1)?;
        Ok(hits.into_iter().next().map(|hit| hit.title))
    }

    /// Every indexed document, ordered by title then id.
    pub fn documents(&self) -> Result<Vec<SongHit>> {
        let snapshot = self.snapshot();
        snapshot.match_all(usize::MAX)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().num_docs()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a fresh index from `documents` and swaps it in. Searches keep
    /// using the previous snapshot until the swap.
    pub fn rebuild<I>(&self, documents: I) -> Result<usize>
    where
        I: IntoIterator<Item = IndexDocument>,
    {
        self.rebuild_with(|| Ok(documents))
    }

    /// Like [`SearchIndex::rebuild`], but gathers the documents while holding
    /// the writer lock so no concurrent upsert can land in the old snapshot
    /// after the documents were read.
    pub fn rebuild_with<I, F>(&self, load: F) -> Result<usize>
    where
        I: IntoIterator<Item = IndexDocument>,
        F: FnOnce() -> Result<I>,
    {
        let _guard = self.lock_writes();

        let fresh = Snapshot::create()?;
        let mut count = 0;
        {
            let mut writer = fresh.writer();
            for document in load()? {
                fresh.add(&mut writer, &document)?;
                count += 1;
            }
            fresh.commit(&mut writer)?;
        }

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(fresh);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: &str, title: &str, author: &str, lyrics: &str) -> IndexDocument {
        IndexDocument {
            id: id.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            album: String::new(),
            lyrics: lyrics.to_string(),
        }
    }

    fn ids(hits: &[SongHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn test_upsert_and_query_default_field() {
        let index = SearchIndex::new().unwrap();
        index
            .upsert(&document("imagine", "Imagine", "Lennon", "imagine all the people"))
            .unwrap();
        index
            .upsert(&document("yesterday", "Yesterday", "McCartney", "all my troubles"))
            .unwrap();

        assert_eq!(ids(&index.search(Some("people")).unwrap()), vec!["imagine"]);
        assert_eq!(index.search(Some("all")).unwrap().len(), 2);
    }

    #[test]
    fn test_field_qualified_query() {
        let index = SearchIndex::new().unwrap();
        index
            .upsert(&document("imagine", "Imagine", "Lennon", "no heaven"))
            .unwrap();

        assert_eq!(ids(&index.search(Some("title:imagine")).unwrap()), vec!["imagine"]);
        assert_eq!(ids(&index.search(Some("author:Lennon")).unwrap()), vec!["imagine"]);
        assert!(index.search(Some("title:heaven")).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_document() {
        let index = SearchIndex::new().unwrap();
        index.upsert(&document("a", "Old", "X", "one")).unwrap();
        index.upsert(&document("a", "New", "X", "two")).unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.title("a").unwrap().as_deref(), Some("New"));
        assert!(index.search(Some("one")).unwrap().is_empty());
    }

    #[test]
    fn test_remove() {
        let index = SearchIndex::new().unwrap();
        index.upsert(&document("a", "A", "X", "words")).unwrap();
        index.remove("a").unwrap();

        assert!(index.is_empty());
        assert_eq!(index.title("a").unwrap(), None);
    }

    #[test]
    fn test_empty_query_matches_all_in_stable_order() {
        let index = SearchIndex::new().unwrap();
        index.upsert(&document("b", "Beta", "X", "")).unwrap();
        index.upsert(&document("a", "Alpha", "X", "")).unwrap();

        assert_eq!(ids(&index.search(None).unwrap()), vec!["a", "b"]);
        assert_eq!(ids(&index.search(Some("  ")).unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn test_match_all_sorts_before_limit() {
        let index = SearchIndex::new().unwrap();
        let total = DEFAULT_RESULT_LIMIT + 10;
        for i in (0..total).rev() {
            index
                .upsert(&document(&format!("t{i:02}"), &format!("T{i:02}"), "X", ""))
                .unwrap();
        }
        // Re-adding moves the document to the end of the segment order.
        index.upsert(&document("t00", "T00", "X", "")).unwrap();

        let hits = index.search(None).unwrap();
        assert_eq!(hits.len(), DEFAULT_RESULT_LIMIT);
        assert_eq!(hits[0].id, "t00");
        assert_eq!(hits[DEFAULT_RESULT_LIMIT - 1].id, format!("t{:02}", DEFAULT_RESULT_LIMIT - 1));
        assert_eq!(index.documents().unwrap().len(), total);
    }

    #[test]
    fn test_result_limit() {
        let index = SearchIndex::new().unwrap();
        for i in 0..5 {
            index
                .upsert(&document(&format!("s{i}"), "Song", "X", "la la"))
                .unwrap();
        }

        assert_eq!(index.query(Some("la"), 3).unwrap().len(), 3);
        assert!(index.query(None, 0).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_query() {
        let index = SearchIndex::new().unwrap();
        assert!(matches!(
            index.search(Some("nosuchfield:value")),
            Err(Error::IndexQuery(_))
        ));
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let index = SearchIndex::new().unwrap();
        index.upsert(&document("stale", "Stale", "X", "")).unwrap();

        let count = index
            .rebuild(vec![
                document("a", "Alpha", "X", "first"),
                document("b", "Beta", "Y", "second"),
            ])
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(ids(&index.documents().unwrap()), vec!["a", "b"]);
        assert_eq!(index.title("stale").unwrap(), None);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let index = SearchIndex::new().unwrap();
        let docs = vec![
            document("a", "Alpha", "X", "first"),
            document("b", "Beta", "Y", "second"),
        ];

        index.rebuild(docs.clone()).unwrap();
        let first = index.documents().unwrap();
        index.rebuild(docs).unwrap();
        let second = index.documents().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_snapshot_survives_rebuild() {
        let index = SearchIndex::new().unwrap();
        index.upsert(&document("a", "A", "X", "")).unwrap();

        let old = index.snapshot();
        index.rebuild(Vec::new()).unwrap();

        assert_eq!(old.num_docs(), 1);
        assert!(index.is_empty());
    }
}
