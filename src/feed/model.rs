//! In-memory representation of a parsed feed.
//!
//! A [`FeedDocument`] is what a [`FeedParser`](super::FeedParser) hands to the
//! extractor. Enrichment fields on entries (author, tags, thumbnails) are
//! loosely shaped on purpose: providers omit or mangle them all the time, and
//! the ingestion pipeline treats anything unusable as absent.

use super::time::TimeTuple;

/// HTTP-like status a parser reports for a successful fetch.
pub const STATUS_OK: u16 = 200;

/// A parsed feed plus the status of the request that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDocument {
    /// HTTP-like status code of the fetch (200 on success).
    pub status: u16,
    /// Channel-level metadata.
    pub feed: FeedMeta,
    /// Document-level update time. Takes precedence over `feed.updated`.
    pub updated: Option<TimeTuple>,
    /// Entries in the order the provider lists them.
    pub entries: Vec<FeedEntry>,
}

impl FeedDocument {
    /// An entry-less document carrying only a status, as returned for failed fetches.
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// The feed's own update time, preferring the document-level value.
    pub fn updated_time(&self) -> Option<&TimeTuple> {
        self.updated.as_ref().or(self.feed.updated.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedMeta {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub updated: Option<TimeTuple>,
}

/// A single feed item.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    /// Provider-assigned identifier, used verbatim as the content identity.
    pub id: String,
    pub title: String,
    pub link: String,
    pub published: TimeTuple,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<EntryTag>>,
    pub media_thumbnail: Option<Vec<Thumbnail>>,
}

impl FeedEntry {
    /// Minimal entry with no enrichment fields.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        published: TimeTuple,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
            published,
            summary: None,
            author: None,
            tags: None,
            media_thumbnail: None,
        }
    }

    /// URL of the first thumbnail, if the entry carries a usable one.
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.media_thumbnail
            .as_deref()?
            .first()?
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
    }

    /// Tag terms of the entry, or `None` when the tag list is absent or any
    /// tag lacks a term.
    pub fn tag_terms(&self) -> Option<Vec<&str>> {
        self.tags
            .as_deref()?
            .iter()
            .map(|tag| tag.term.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryTag {
    pub term: Option<String>,
    pub label: Option<String>,
    pub scheme: Option<String>,
}

impl EntryTag {
    pub fn term(term: impl Into<String>) -> Self {
        Self {
            term: Some(term.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thumbnail {
    pub url: Option<String>,
}
