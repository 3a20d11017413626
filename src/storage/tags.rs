use super::named::{self, NamedTable};
use super::schema::Database;
use super::types::{DatabaseError, Resolved, Tag};

impl Database {
    // ========================================================================
    // Tag Operations
    // ========================================================================

    /// Look up a tag by its term
    pub async fn find_tag(&self, term: &str) -> Result<Option<Tag>, DatabaseError> {
        named::find(&self.pool, NamedTable::Tags, term).await
    }

    /// Insert a new tag. Fails on a duplicate term.
    pub async fn create_tag(&self, term: &str) -> Result<Tag, DatabaseError> {
        named::create(&self.pool, NamedTable::Tags, term).await
    }

    /// Return the tag with this term, inserting it first if needed
    pub async fn find_or_create_tag(&self, term: &str) -> Result<Resolved<Tag>, DatabaseError> {
        named::find_or_create(&self.pool, NamedTable::Tags, term).await
    }

    /// All tags in insertion order
    pub async fn get_tags(&self) -> Result<Vec<Tag>, DatabaseError> {
        named::list(&self.pool, NamedTable::Tags).await
    }

    /// Tag a source. Re-tagging is a no-op.
    pub async fn assign_source_tag(&self, source_id: i64, tag_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("INSERT OR IGNORE INTO source_tags (source_id, tag_id) VALUES (?, ?)")
            .bind(source_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Tags attached to a source, by tag id
    pub async fn source_tags(&self, source_id: i64) -> Result<Vec<Tag>, DatabaseError> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name
            FROM tags t
            JOIN source_tags st ON st.tag_id = t.id
            WHERE st.source_id = ?
            ORDER BY t.id
        "#,
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }
}
