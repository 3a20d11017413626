//! Merging a parsed feed into the entity store.
//!
//! Reconciliation only ever inserts. Known sources and known contents are left
//! exactly as stored; authors and tags are shared by name across entries and
//! feeds.

use chrono::{NaiveDateTime, TimeZone};

use super::error::ExtractionError;
use crate::feed::{feed_time_to_datetime_in, FeedDocument, FeedEntry};
use crate::storage::{Article, Database, NewArticle, NewSource, Resolved, Source, SourceKind};

/// Summary of one extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionReport {
    pub source_id: i64,
    /// True when the source row was inserted by this run
    pub source_created: bool,
    pub entries_seen: usize,
    pub articles_created: usize,
    /// Entries whose id was already stored
    pub articles_skipped: usize,
}

/// Created/skipped counts from [`Reconciler::reconcile_entries`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntryTally {
    pub created: usize,
    pub skipped: usize,
}

/// One reconciliation pass. `now` is fixed for the whole pass.
pub(crate) struct Reconciler<'a, Tz: TimeZone> {
    db: &'a Database,
    tz: &'a Tz,
    now: NaiveDateTime,
}

impl<'a, Tz: TimeZone> Reconciler<'a, Tz> {
    pub fn new(db: &'a Database, tz: &'a Tz, now: NaiveDateTime) -> Self {
        Self { db, tz, now }
    }

    /// Return the source stored for `url`, creating it from the document's
    /// metadata if there is none. An existing source is not modified.
    pub async fn reconcile_source(
        &self,
        url: &str,
        document: &FeedDocument,
    ) -> Result<Resolved<Source>, ExtractionError> {
        if let Some(source) = self.db.find_source(url).await? {
            tracing::debug!(url = %url, source_id = source.id, "Source already known");
            return Ok(Resolved {
                entity: source,
                created: false,
            });
        }

        let updated_date = match document.updated_time() {
            Some(tuple) => match feed_time_to_datetime_in(tuple, self.tz) {
                Ok(datetime) => Some(datetime),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Ignoring feed update time");
                    None
                }
            },
            None => {
                tracing::debug!(url = %url, "Feed reports no update time");
                None
            }
        };

        let source = self
            .db
            .create_source(&NewSource {
                kind: SourceKind::Rss,
                url: url.to_string(),
                title: document.feed.title.clone(),
                description: document.feed.subtitle.clone(),
                created_date: self.now,
                updated_date,
                image_path: None,
            })
            .await?;

        tracing::info!(
            url = %url,
            source_id = source.id,
            title = source.title.as_deref().unwrap_or(""),
            "Created source"
        );
        Ok(Resolved {
            entity: source,
            created: true,
        })
    }

    /// Store every entry whose id is not yet known, in feed order.
    ///
    /// Each article commits before the next entry is looked at, so authors and
    /// tags created for one entry are visible to the following ones.
    pub async fn reconcile_entries(
        &self,
        source_id: i64,
        entries: &[FeedEntry],
    ) -> Result<EntryTally, ExtractionError> {
        let total = entries.len();
        let mut tally = EntryTally::default();

        for (index, entry) in entries.iter().enumerate() {
            tracing::debug!(entry = %entry.id, "{}/{}: processing", index + 1, total);

            if self.db.find_content(&entry.id).await?.is_some() {
                tracing::debug!(entry = %entry.id, "Already stored, skipping");
                tally.skipped += 1;
                continue;
            }

            let article = self.create_article(source_id, entry).await?;
            tracing::debug!(entry = %article.id, title = %article.title, "Stored article");
            tally.created += 1;
        }

        Ok(tally)
    }

    async fn create_article(
        &self,
        source_id: i64,
        entry: &FeedEntry,
    ) -> Result<Article, ExtractionError> {
        let published_date = feed_time_to_datetime_in(&entry.published, self.tz).map_err(|e| {
            ExtractionError::InvalidTimestamp {
                entry_id: entry.id.clone(),
                tuple: e.0,
            }
        })?;

        let image_path = entry.thumbnail_url().map(str::to_string);
        if image_path.is_none() {
            tracing::debug!(entry = %entry.id, "No usable thumbnail");
        }

        let author_id = self.resolve_author(entry).await?;
        let tag_ids = self.resolve_tags(entry).await?;

        let article = self
            .db
            .create_article(&NewArticle {
                id: entry.id.clone(),
                title: entry.title.clone(),
                url: entry.link.clone(),
                published_date,
                created_date: self.now,
                updated_date: self.now,
                summary: entry.summary.clone(),
                image_path,
                author_id,
                source_id,
                tag_ids,
            })
            .await?;
        Ok(article)
    }

    async fn resolve_author(&self, entry: &FeedEntry) -> Result<Option<i64>, ExtractionError> {
        let Some(name) = entry.author.as_deref() else {
            tracing::debug!(entry = %entry.id, "No author");
            return Ok(None);
        };

        let resolved = self.db.find_or_create_author(name).await?;
        if resolved.created {
            tracing::debug!(author = %name, author_id = resolved.entity.id, "Created author");
        }
        Ok(Some(resolved.entity.id))
    }

    async fn resolve_tags(&self, entry: &FeedEntry) -> Result<Vec<i64>, ExtractionError> {
        let Some(terms) = entry.tag_terms() else {
            tracing::debug!(entry = %entry.id, "No usable tags");
            return Ok(Vec::new());
        };

        let mut ids = Vec::with_capacity(terms.len());
        for term in terms {
            let resolved = self.db.find_or_create_tag(term).await?;
            if resolved.created {
                tracing::debug!(tag = %term, tag_id = resolved.entity.id, "Created tag");
            }
            ids.push(resolved.entity.id);
        }
        Ok(ids)
    }
}
