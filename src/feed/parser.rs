use async_trait::async_trait;
use feed_rs::parser;
use sha2::{Digest, Sha256};

use super::fetcher::FetchError;
use super::model::{EntryTag, FeedDocument, FeedEntry, FeedMeta, Thumbnail, STATUS_OK};
use super::time::TimeTuple;

/// Produces a [`FeedDocument`] for a feed URL.
///
/// Implementations report the HTTP-like status of the fetch in
/// [`FeedDocument::status`] instead of failing on non-success responses; the
/// extractor decides what a status means. `Err` is reserved for fetches that
/// produced no status at all (transport failures, unparseable bodies).
#[async_trait]
pub trait FeedParser: Send + Sync {
    async fn parse(&self, url: &str) -> Result<FeedDocument, FetchError>;
}

/// Result of converting a raw feed body.
#[derive(Debug)]
pub struct ParseResult {
    pub document: FeedDocument,
    /// Entries dropped because they had no link or no date
    pub skipped: usize,
}

/// Parse an RSS/Atom body into a [`FeedDocument`] with status 200.
pub fn parse_feed(bytes: &[u8]) -> Result<ParseResult, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let meta = FeedMeta {
        title: feed.title.map(|t| t.content),
        subtitle: feed.description.map(|t| t.content),
        updated: feed.updated.as_ref().map(TimeTuple::from_utc),
    };

    let mut skipped = 0;
    let mut entries = Vec::with_capacity(feed.entries.len());

    for entry in feed.entries {
        let link = entry.links.first().map(|l| l.href.clone());
        let published = entry.published.or(entry.updated);
        let (Some(link), Some(published)) = (link, published) else {
            tracing::debug!(entry = %entry.id, "Skipping entry without link or date");
            skipped += 1;
            continue;
        };

        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());
        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body));

        let author = entry
            .authors
            .first()
            .map(|p| p.name.trim().to_string())
            .filter(|name| !name.is_empty());

        let tags = if entry.categories.is_empty() {
            None
        } else {
            Some(
                entry
                    .categories
                    .into_iter()
                    .map(|c| EntryTag {
                        term: Some(c.term).filter(|t| !t.trim().is_empty()),
                        label: c.label,
                        scheme: c.scheme,
                    })
                    .collect(),
            )
        };

        let thumbnails: Vec<Thumbnail> = entry
            .media
            .iter()
            .flat_map(|m| m.thumbnails.iter())
            .map(|t| Thumbnail {
                url: Some(t.image.uri.clone()),
            })
            .collect();

        let existing_id = if entry.id.is_empty() {
            None
        } else {
            Some(entry.id.as_str())
        };
        let id = generate_id(existing_id, &link, &title, published.timestamp());

        entries.push(FeedEntry {
            id,
            title,
            link,
            published: TimeTuple::from_utc(&published),
            summary,
            author,
            tags,
            media_thumbnail: (!thumbnails.is_empty()).then_some(thumbnails),
        });
    }

    Ok(ParseResult {
        document: FeedDocument {
            status: STATUS_OK,
            feed: meta,
            updated: None,
            entries,
        },
        skipped,
    })
}

/// Provider id if it has content, otherwise a stable hash of link, title and date.
fn generate_id(existing: Option<&str>, link: &str, title: &str, published: i64) -> String {
    if let Some(id) = existing {
        let trimmed = id.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!("{}|{}|{}", link, title, published);
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
