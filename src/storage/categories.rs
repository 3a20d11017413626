use super::named::{self, NamedTable};
use super::schema::Database;
use super::types::{Category, DatabaseError, Resolved};

impl Database {
    // ========================================================================
    // Category Operations
    // ========================================================================
    //
    // Ingestion never creates categories; they exist for downstream
    // classification of sources and contents.

    pub async fn find_category(&self, name: &str) -> Result<Option<Category>, DatabaseError> {
        named::find(&self.pool, NamedTable::Categories, name).await
    }

    pub async fn create_category(&self, name: &str) -> Result<Category, DatabaseError> {
        named::create(&self.pool, NamedTable::Categories, name).await
    }

    pub async fn find_or_create_category(
        &self,
        name: &str,
    ) -> Result<Resolved<Category>, DatabaseError> {
        named::find_or_create(&self.pool, NamedTable::Categories, name).await
    }

    pub async fn get_categories(&self) -> Result<Vec<Category>, DatabaseError> {
        named::list(&self.pool, NamedTable::Categories).await
    }

    /// Put a content row in a category. Re-assigning is a no-op.
    pub async fn assign_content_category(
        &self,
        content_id: &str,
        category_id: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT OR IGNORE INTO content_categories (content_id, category_id) VALUES (?, ?)",
        )
        .bind(content_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Put a source in a category. Re-assigning is a no-op.
    pub async fn assign_source_category(
        &self,
        source_id: i64,
        category_id: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT OR IGNORE INTO source_categories (source_id, category_id) VALUES (?, ?)",
        )
        .bind(source_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn content_categories(&self, content_id: &str) -> Result<Vec<Category>, DatabaseError> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name
            FROM categories c
            JOIN content_categories cc ON cc.category_id = c.id
            WHERE cc.content_id = ?
            ORDER BY c.id
        "#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    pub async fn source_categories(&self, source_id: i64) -> Result<Vec<Category>, DatabaseError> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name
            FROM categories c
            JOIN source_categories sc ON sc.category_id = c.id
            WHERE sc.source_id = ?
            ORDER BY c.id
        "#,
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }
}
