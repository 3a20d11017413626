use std::collections::HashSet;

use super::schema::Database;
use super::types::{
    Article, ArticleDbRow, ContentKind, DatabaseError, NewArticle, Tag, ARTICLE_COLUMNS,
};

impl Database {
    // ========================================================================
    // Content Operations
    // ========================================================================

    /// Look up a content row by its provider-assigned id
    pub async fn find_content(&self, id: &str) -> Result<Option<Article>, DatabaseError> {
        let sql = format!("SELECT {} FROM contents WHERE id = ?", ARTICLE_COLUMNS);
        let row = sqlx::query_as::<_, ArticleDbRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ArticleDbRow::into_article))
    }

    /// Insert an article together with its tag links and commit.
    ///
    /// The row and its links share one transaction: an article is never
    /// visible without its tags. Repeated tag ids collapse into one link.
    pub async fn create_article(&self, article: &NewArticle) -> Result<Article, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO contents (id, kind, title, url, published_date, created_date,
                                  updated_date, author_id, summary, image_path, source_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
        "#,
            ARTICLE_COLUMNS
        );
        let row = sqlx::query_as::<_, ArticleDbRow>(&sql)
            .bind(&article.id)
            .bind(ContentKind::Article.as_str())
            .bind(&article.title)
            .bind(&article.url)
            .bind(article.published_date)
            .bind(article.created_date)
            .bind(article.updated_date)
            .bind(article.author_id)
            .bind(&article.summary)
            .bind(&article.image_path)
            .bind(article.source_id)
            .fetch_one(&mut *tx)
            .await?;

        let mut linked = HashSet::new();
        for tag_id in article.tag_ids.iter().filter(|id| linked.insert(**id)) {
            sqlx::query("INSERT INTO content_tags (content_id, tag_id) VALUES (?, ?)")
                .bind(&article.id)
                .bind(*tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(row.into_article())
    }

    /// Tags linked to a content row, by tag id
    pub async fn article_tags(&self, content_id: &str) -> Result<Vec<Tag>, DatabaseError> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name
            FROM tags t
            JOIN content_tags ct ON ct.tag_id = t.id
            WHERE ct.content_id = ?
            ORDER BY t.id
        "#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    /// Articles of a source, newest publication first
    pub async fn get_articles_for_source(
        &self,
        source_id: i64,
    ) -> Result<Vec<Article>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM contents WHERE source_id = ? ORDER BY published_date DESC, id",
            ARTICLE_COLUMNS
        );
        let rows = sqlx::query_as::<_, ArticleDbRow>(&sql)
            .bind(source_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ArticleDbRow::into_article).collect())
    }
}
