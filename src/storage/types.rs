use chrono::NaiveDateTime;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("The database is locked by another process. Wait for it to finish and try again.")]
    InstanceLocked,

    /// The directory meant to hold the database file does not exist
    #[error("Database directory does not exist: {}", .0.display())]
    MissingDirectory(std::path::PathBuf),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface as
/// one of these messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Discriminators
// ============================================================================

/// Kind of a source row. Specialized kinds carry extra nullable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Plain source with only the shared columns
    Source,
    /// RSS/Atom feed; may carry `image_path`
    Rss,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Source => "source",
            SourceKind::Rss => "rss",
        }
    }

    pub(crate) fn from_db(value: &str) -> Self {
        match value {
            "rss" => SourceKind::Rss,
            _ => SourceKind::Source,
        }
    }
}

/// Kind of a content row. Articles carry summary, body, image and source link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Content,
    Article,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Content => "content",
            ContentKind::Article => "article",
        }
    }

    pub(crate) fn from_db(value: &str) -> Self {
        match value {
            "article" => ContentKind::Article,
            _ => ContentKind::Content,
        }
    }
}

// ============================================================================
// Insert Types
// ============================================================================

/// A source about to be inserted
#[derive(Debug, Clone)]
pub struct NewSource {
    pub kind: SourceKind,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_date: NaiveDateTime,
    pub updated_date: Option<NaiveDateTime>,
    pub image_path: Option<String>,
}

/// An article about to be inserted, with the tags to link it to
#[derive(Debug, Clone)]
pub struct NewArticle {
    /// Provider-assigned entry id, stored verbatim as the primary key
    pub id: String,
    pub title: String,
    pub url: String,
    pub published_date: NaiveDateTime,
    pub created_date: NaiveDateTime,
    pub updated_date: NaiveDateTime,
    pub summary: Option<String>,
    pub image_path: Option<String>,
    pub author_id: Option<i64>,
    pub source_id: i64,
    pub tag_ids: Vec<i64>,
}

// ============================================================================
// Helper Types
// ============================================================================

/// Internal row type for source queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SourceDbRow {
    pub id: i64,
    pub kind: String,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_date: NaiveDateTime,
    pub updated_date: Option<NaiveDateTime>,
    pub last_fetch: Option<NaiveDateTime>,
    pub aggregated_score: Option<f64>,
    pub aggregated_certainty: Option<f64>,
    pub image_path: Option<String>,
}

impl SourceDbRow {
    pub(crate) fn into_source(self) -> Source {
        Source {
            id: self.id,
            kind: SourceKind::from_db(&self.kind),
            url: self.url,
            title: self.title,
            description: self.description,
            created_date: self.created_date,
            updated_date: self.updated_date,
            last_fetch: self.last_fetch,
            aggregated_score: self.aggregated_score,
            aggregated_certainty: self.aggregated_certainty,
            image_path: self.image_path,
        }
    }
}

/// Internal row type for content queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleDbRow {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub url: Option<String>,
    pub published_date: NaiveDateTime,
    pub created_date: NaiveDateTime,
    pub updated_date: Option<NaiveDateTime>,
    pub author_id: Option<i64>,
    pub score: Option<i64>,
    pub predicted_score: Option<f64>,
    pub predicted_certainty: Option<f64>,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub image_path: Option<String>,
    pub source_id: Option<i64>,
}

impl ArticleDbRow {
    pub(crate) fn into_article(self) -> Article {
        Article {
            id: self.id,
            kind: ContentKind::from_db(&self.kind),
            title: self.title,
            url: self.url,
            published_date: self.published_date,
            created_date: self.created_date,
            updated_date: self.updated_date,
            author_id: self.author_id,
            score: self.score,
            predicted_score: self.predicted_score,
            predicted_certainty: self.predicted_certainty,
            summary: self.summary,
            body: self.body,
            image_path: self.image_path,
            source_id: self.source_id,
        }
    }
}

/// Column list shared by every source query
pub(crate) const SOURCE_COLUMNS: &str = "id, kind, url, title, description, created_date, \
     updated_date, last_fetch, aggregated_score, aggregated_certainty, image_path";

/// Column list shared by every content query
pub(crate) const ARTICLE_COLUMNS: &str = "id, kind, title, url, published_date, created_date, \
     updated_date, author_id, score, predicted_score, predicted_certainty, summary, body, \
     image_path, source_id";

// ============================================================================
// Data Structures
// ============================================================================

/// A subscribed feed endpoint, identified by its URL
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub id: i64,
    pub kind: SourceKind,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// When the source was first seen
    pub created_date: NaiveDateTime,
    /// The feed's own last-update time, as reported at first sight
    pub updated_date: Option<NaiveDateTime>,
    /// When the source was last extracted
    pub last_fetch: Option<NaiveDateTime>,
    pub aggregated_score: Option<f64>,
    pub aggregated_certainty: Option<f64>,
    pub image_path: Option<String>,
}

/// One ingested feed entry, identified by the provider's entry id
///
/// Scores are reserved for downstream ranking and never written by ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: String,
    pub kind: ContentKind,
    pub title: String,
    pub url: Option<String>,
    pub published_date: NaiveDateTime,
    pub created_date: NaiveDateTime,
    pub updated_date: Option<NaiveDateTime>,
    pub author_id: Option<i64>,
    pub score: Option<i64>,
    pub predicted_score: Option<f64>,
    pub predicted_certainty: Option<f64>,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub image_path: Option<String>,
    pub source_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Author {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Outcome of a find-or-create operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub entity: T,
    /// True when the row did not exist and was inserted by this call
    pub created: bool,
}

/// Row counts per entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub sources: i64,
    pub contents: i64,
    pub authors: i64,
    pub tags: i64,
    pub categories: i64,
}
