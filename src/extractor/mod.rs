//! Feed extraction: fetch a feed, validate it, and merge it into the store.
//!
//! [`RssExtractor`] drives one feed at a time through
//! parse → status check → source → entries → last-fetch bump. Every step
//! awaits the previous one; nothing runs concurrently.
//!
//! # Example
//!
//! ```ignore
//! let db = Database::open(":memory:").await?;
//! let parser = HttpFeedParser::new(&Config::default())?;
//! let mut extractor = RssExtractor::new(db, parser);
//! let report = extractor.extract("https://example.com/rss").await?;
//! ```

mod error;
mod reconcile;

pub use error::ExtractionError;
pub use reconcile::ExtractionReport;

use chrono::{Local, NaiveDateTime, TimeZone};
use std::collections::HashMap;

use crate::feed::{FeedDocument, FeedParser, STATUS_OK};
use crate::storage::{Database, Source};
use reconcile::Reconciler;

/// Source of "now" for created/updated/last-fetch timestamps.
pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Extracts RSS/Atom feeds into a [`Database`].
///
/// Successfully parsed documents are cached per URL for the lifetime of the
/// extractor, so `parse` followed by `extract` fetches once.
pub struct RssExtractor<P, Tz: TimeZone = Local> {
    db: Database,
    parser: P,
    tz: Tz,
    clock: Clock,
    cache: HashMap<String, FeedDocument>,
}

impl<P: FeedParser> RssExtractor<P, Local> {
    /// Extractor converting feed times into the process-local zone.
    pub fn new(db: Database, parser: P) -> Self {
        Self {
            db,
            parser,
            tz: Local,
            clock: local_now,
            cache: HashMap::new(),
        }
    }
}

impl<P: FeedParser, Tz: TimeZone> RssExtractor<P, Tz> {
    /// Use `tz` as the local zone for time conversion.
    pub fn with_timezone<Z: TimeZone>(self, tz: Z) -> RssExtractor<P, Z> {
        RssExtractor {
            db: self.db,
            parser: self.parser,
            tz,
            clock: self.clock,
            cache: self.cache,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Fetch and validate `url`, caching the document on success.
    ///
    /// # Errors
    ///
    /// - [`ExtractionError::NotFound`] for status 404
    /// - [`ExtractionError::Unauthorized`] for status 401
    /// - [`ExtractionError::UnexpectedStatus`] for any other non-200 status
    /// - [`ExtractionError::Fetch`] when the parser produced no document
    pub async fn parse(&mut self, url: &str) -> Result<&FeedDocument, ExtractionError> {
        let document = self.fetch(url).await?;
        let slot = self.cache.entry(url.to_string()).or_default();
        *slot = document;
        Ok(slot)
    }

    /// Parse `url` afresh and make sure a source exists for it.
    ///
    /// Returns the stored source; an existing one is returned untouched.
    pub async fn create_source(&mut self, url: &str) -> Result<Source, ExtractionError> {
        self.parse(url).await?;
        let document = self.take_cached(url).await?;

        let reconciler = Reconciler::new(&self.db, &self.tz, (self.clock)());
        let result = reconciler.reconcile_source(url, &document).await;
        self.cache.insert(url.to_string(), document);

        Ok(result?.entity)
    }

    /// Extract every new entry of `url` into the store.
    ///
    /// Uses the cached document when `url` was parsed before, otherwise
    /// fetches it. On success the source's `last_fetch` is bumped, even when
    /// no entry was new.
    pub async fn extract(&mut self, url: &str) -> Result<ExtractionReport, ExtractionError> {
        let document = self.take_cached(url).await?;
        let result = self.reconcile(url, &document).await;
        self.cache.insert(url.to_string(), document);

        let report = result?;
        tracing::info!(
            url = %url,
            source_id = report.source_id,
            created = report.articles_created,
            skipped = report.articles_skipped,
            "Extraction finished"
        );
        Ok(report)
    }

    async fn reconcile(
        &self,
        url: &str,
        document: &FeedDocument,
    ) -> Result<ExtractionReport, ExtractionError> {
        let reconciler = Reconciler::new(&self.db, &self.tz, (self.clock)());

        let source = reconciler.reconcile_source(url, document).await?;
        let source_id = source.entity.id;
        let tally = reconciler
            .reconcile_entries(source_id, &document.entries)
            .await?;

        self.db
            .touch_source_fetched(source_id, (self.clock)())
            .await?;

        Ok(ExtractionReport {
            source_id,
            source_created: source.created,
            entries_seen: document.entries.len(),
            articles_created: tally.created,
            articles_skipped: tally.skipped,
        })
    }

    /// Remove the cached document for `url`, fetching it if absent.
    /// Callers put it back once they are done with it.
    async fn take_cached(&mut self, url: &str) -> Result<FeedDocument, ExtractionError> {
        match self.cache.remove(url) {
            Some(document) => Ok(document),
            None => self.fetch(url).await,
        }
    }

    async fn fetch(&self, url: &str) -> Result<FeedDocument, ExtractionError> {
        tracing::debug!(url = %url, "Parsing feed");
        let document = self
            .parser
            .parse(url)
            .await
            .map_err(|source| ExtractionError::Fetch {
                url: url.to_string(),
                source,
            })?;

        if document.status != STATUS_OK {
            tracing::warn!(url = %url, status = document.status, "Feed returned error status");
            return Err(ExtractionError::from_status(url, document.status));
        }

        tracing::debug!(url = %url, entries = document.entries.len(), "Feed parsed");
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{EntryTag, FeedEntry, FetchError, TimeTuple};
    use crate::storage::EntityCounts;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const URL: &str = "https://www.gamingonlinux.com/article_rss.php";

    /// Serves canned documents by URL and counts calls.
    #[derive(Default, Clone)]
    struct ScriptedParser {
        documents: Arc<Mutex<HashMap<String, FeedDocument>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedParser {
        fn serve(&self, url: &str, document: FeedDocument) {
            self.documents
                .lock()
                .unwrap()
                .insert(url.to_string(), document);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedParser for ScriptedParser {
        async fn parse(&self, url: &str) -> Result<FeedDocument, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.documents
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Parse(format!("no document for {}", url)))
        }
    }

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    fn entry(id: &str, author: Option<&str>, tags: &[&str]) -> FeedEntry {
        let mut e = FeedEntry::new(
            id,
            format!("Article {}", id),
            format!("https://www.gamingonlinux.com/articles/{}", id),
            TimeTuple::from((2020, 2, 15, 1, 0, 0, 5, 46, 0)),
        );
        e.author = author.map(str::to_string);
        if !tags.is_empty() {
            e.tags = Some(tags.iter().map(|t| EntryTag::term(*t)).collect());
        }
        e
    }

    fn document(entries: Vec<FeedEntry>) -> FeedDocument {
        let mut doc = FeedDocument::with_status(200);
        doc.feed.title = Some("GamingOnLinux Latest Articles".into());
        doc.feed.subtitle = Some("The latest articles from GamingOnLinux".into());
        doc.entries = entries;
        doc
    }

    async fn extractor(parser: ScriptedParser) -> RssExtractor<ScriptedParser, Utc> {
        let db = Database::open(":memory:").await.unwrap();
        RssExtractor::new(db, parser)
            .with_timezone(Utc)
            .with_clock(fixed_now)
    }

    #[tokio::test]
    async fn test_extract_creates_everything_once() {
        let parser = ScriptedParser::default();
        parser.serve(
            URL,
            document(vec![
                entry("1", Some("Liam Dawe"), &["Proton", "Steam"]),
                entry("2", Some("Liam Dawe"), &["Steam"]),
                entry("3", None, &[]),
            ]),
        );
        let mut ex = extractor(parser).await;

        let report = ex.extract(URL).await.unwrap();
        assert!(report.source_created);
        assert_eq!(report.entries_seen, 3);
        assert_eq!(report.articles_created, 3);
        assert_eq!(report.articles_skipped, 0);

        assert_eq!(
            ex.database().counts().await.unwrap(),
            EntityCounts {
                sources: 1,
                contents: 3,
                authors: 1,
                tags: 2,
                categories: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_extract_is_idempotent() {
        let parser = ScriptedParser::default();
        parser.serve(URL, document(vec![entry("1", Some("Liam Dawe"), &["Proton"])]));
        let mut ex = extractor(parser).await;

        ex.extract(URL).await.unwrap();
        let before = ex.database().counts().await.unwrap();
        let report = ex.extract(URL).await.unwrap();
        let after = ex.database().counts().await.unwrap();

        assert_eq!(before, after);
        assert!(!report.source_created);
        assert_eq!(report.articles_created, 0);
        assert_eq!(report.articles_skipped, 1);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases: [(u16, fn(&ExtractionError) -> bool); 3] = [
            (404, |e| matches!(e, ExtractionError::NotFound { .. })),
            (401, |e| matches!(e, ExtractionError::Unauthorized { .. })),
            (203, |e| {
                matches!(e, ExtractionError::UnexpectedStatus { status: 203, .. })
            }),
        ];

        for (status, is_expected) in cases {
            let parser = ScriptedParser::default();
            parser.serve(URL, FeedDocument::with_status(status));
            let mut ex = extractor(parser).await;

            let err = ex.parse(URL).await.unwrap_err();
            assert!(is_expected(&err), "status {} gave {:?}", status, err);

            let err = ex.extract(URL).await.unwrap_err();
            assert!(is_expected(&err), "status {} gave {:?}", status, err);
            // Nothing is written before the status check
            assert_eq!(
                ex.database().counts().await.unwrap(),
                EntityCounts::default()
            );
        }
    }

    #[tokio::test]
    async fn test_parse_ok_returns_document() {
        let parser = ScriptedParser::default();
        parser.serve(URL, document(vec![entry("1", None, &[])]));
        let mut ex = extractor(parser).await;

        let doc = ex.parse(URL).await.unwrap();
        assert_eq!(doc.status, 200);
        assert_eq!(doc.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_parse_replaces_cached_document() {
        let parser = ScriptedParser::default();
        parser.serve(URL, document(vec![entry("1", None, &[])]));
        let mut ex = extractor(parser.clone()).await;
        ex.parse(URL).await.unwrap();

        parser.serve(URL, document(vec![entry("1", None, &[]), entry("2", None, &[])]));
        assert_eq!(ex.parse(URL).await.unwrap().entries.len(), 2);

        // extract works from the refreshed copy without fetching again
        let report = ex.extract(URL).await.unwrap();
        assert_eq!(report.articles_created, 2);
        assert_eq!(parser.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_wrapped() {
        let mut ex = extractor(ScriptedParser::default()).await;
        let err = ex.extract(URL).await.unwrap_err();
        match err {
            ExtractionError::Fetch { url, .. } => assert_eq!(url, URL),
            other => panic!("Expected Fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_extract_reuses_parsed_document() {
        let parser = ScriptedParser::default();
        parser.serve(URL, document(vec![entry("1", None, &[])]));
        let mut ex = extractor(parser.clone()).await;

        ex.parse(URL).await.unwrap();
        ex.extract(URL).await.unwrap();
        ex.extract(URL).await.unwrap();
        assert_eq!(parser.calls(), 1);
    }

    #[tokio::test]
    async fn test_extract_parses_when_not_cached() {
        let parser = ScriptedParser::default();
        parser.serve(URL, document(vec![entry("1", None, &[])]));
        parser.serve("https://other.example.com/rss", document(vec![]));
        let mut ex = extractor(parser.clone()).await;

        ex.parse("https://other.example.com/rss").await.unwrap();
        ex.extract(URL).await.unwrap();
        assert_eq!(parser.calls(), 2);
    }

    #[tokio::test]
    async fn test_create_source_always_parses() {
        let parser = ScriptedParser::default();
        parser.serve(URL, document(vec![entry("1", None, &[])]));
        let mut ex = extractor(parser.clone()).await;

        ex.parse(URL).await.unwrap();
        let source = ex.create_source(URL).await.unwrap();
        assert_eq!(parser.calls(), 2);

        assert_eq!(source.url, URL);
        assert_eq!(source.title.as_deref(), Some("GamingOnLinux Latest Articles"));
        assert_eq!(source.created_date, fixed_now());
        // Only the source; entries wait for extract
        assert_eq!(ex.database().counts().await.unwrap().contents, 0);

        let again = ex.create_source(URL).await.unwrap();
        assert_eq!(again.id, source.id);
        assert_eq!(ex.database().counts().await.unwrap().sources, 1);
    }

    #[tokio::test]
    async fn test_last_fetch_bumped_without_new_entries() {
        let parser = ScriptedParser::default();
        parser.serve(URL, document(vec![]));
        let mut ex = extractor(parser).await;

        let report = ex.extract(URL).await.unwrap();
        assert_eq!(report.articles_created, 0);

        let source = ex.database().find_source(URL).await.unwrap().unwrap();
        assert_eq!(source.last_fetch, Some(fixed_now()));
    }

    #[tokio::test]
    async fn test_new_entry_with_known_author() {
        let parser = ScriptedParser::default();
        let mut ex = extractor(parser.clone()).await;
        let liam = ex
            .database()
            .find_or_create_author("Liam Dawe")
            .await
            .unwrap()
            .entity;

        parser.serve(URL, document(vec![entry("1", Some("Liam Dawe"), &[])]));
        ex.extract(URL).await.unwrap();

        let article = ex.database().find_content("1").await.unwrap().unwrap();
        assert_eq!(article.author_id, Some(liam.id));
        assert_eq!(ex.database().counts().await.unwrap().authors, 1);
    }

    #[tokio::test]
    async fn test_entry_without_author_or_tags() {
        let parser = ScriptedParser::default();
        parser.serve(URL, document(vec![entry("1", None, &[])]));
        let mut ex = extractor(parser).await;

        ex.extract(URL).await.unwrap();

        let article = ex.database().find_content("1").await.unwrap().unwrap();
        assert_eq!(article.author_id, None);
        assert!(ex.database().article_tags("1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_error_propagates_transparently() {
        let parser = ScriptedParser::default();
        // Same link under two ids violates url uniqueness
        let mut second = entry("2", None, &[]);
        second.link = entry("1", None, &[]).link;
        parser.serve(URL, document(vec![entry("1", None, &[]), second]));
        let mut ex = extractor(parser).await;

        let err = ex.extract(URL).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Database(_)));

        // The first entry committed before the failure
        assert!(ex.database().find_content("1").await.unwrap().is_some());
        let source = ex.database().find_source(URL).await.unwrap().unwrap();
        assert_eq!(source.last_fetch, None);
    }
}
