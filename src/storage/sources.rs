use chrono::NaiveDateTime;

use super::schema::Database;
use super::types::{DatabaseError, NewSource, Source, SourceDbRow, SOURCE_COLUMNS};

impl Database {
    // ========================================================================
    // Source Operations
    // ========================================================================

    /// Look up a source by its URL
    pub async fn find_source(&self, url: &str) -> Result<Option<Source>, DatabaseError> {
        let sql = format!("SELECT {} FROM sources WHERE url = ?", SOURCE_COLUMNS);
        let row = sqlx::query_as::<_, SourceDbRow>(&sql)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(SourceDbRow::into_source))
    }

    /// Insert a new source and return it. Fails if the URL is already known.
    pub async fn create_source(&self, source: &NewSource) -> Result<Source, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO sources (kind, url, title, description, created_date, updated_date, image_path)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
        "#,
            SOURCE_COLUMNS
        );
        let row = sqlx::query_as::<_, SourceDbRow>(&sql)
            .bind(source.kind.as_str())
            .bind(&source.url)
            .bind(&source.title)
            .bind(&source.description)
            .bind(source.created_date)
            .bind(source.updated_date)
            .bind(&source.image_path)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into_source())
    }

    /// Record that a source was extracted at `at`. No other column changes.
    pub async fn touch_source_fetched(
        &self,
        source_id: i64,
        at: NaiveDateTime,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE sources SET last_fetch = ? WHERE id = ?")
            .bind(at)
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All sources ordered by id
    pub async fn get_sources(&self) -> Result<Vec<Source>, DatabaseError> {
        let sql = format!("SELECT {} FROM sources ORDER BY id", SOURCE_COLUMNS);
        let rows = sqlx::query_as::<_, SourceDbRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(SourceDbRow::into_source).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError, NewSource, SourceKind};
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 4, 15)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn test_source(url: &str) -> NewSource {
        NewSource {
            kind: SourceKind::Rss,
            url: url.to_string(),
            title: Some("xkcd.com".to_string()),
            description: Some("A webcomic".to_string()),
            created_date: at(1),
            updated_date: Some(at(0)),
            image_path: None,
        }
    }

    #[tokio::test]
    async fn test_create_source_round_trips_columns() {
        let db = test_db().await;
        let created = db.create_source(&test_source("https://xkcd.com/rss.xml")).await.unwrap();

        assert!(created.id > 0);
        assert_eq!(created.kind, SourceKind::Rss);
        assert_eq!(created.title.as_deref(), Some("xkcd.com"));
        assert_eq!(created.created_date, at(1));
        assert_eq!(created.updated_date, Some(at(0)));
        assert_eq!(created.last_fetch, None);

        let found = db.find_source("https://xkcd.com/rss.xml").await.unwrap();
        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn test_find_unknown_source() {
        let db = test_db().await;
        assert!(db.find_source("https://nowhere.example/rss").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_source_url_rejected() {
        let db = test_db().await;
        db.create_source(&test_source("https://xkcd.com/rss.xml")).await.unwrap();
        let err = db
            .create_source(&test_source("https://xkcd.com/rss.xml"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Other(_)));
        assert_eq!(db.get_sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_touch_source_fetched_only_sets_last_fetch() {
        let db = test_db().await;
        let created = db.create_source(&test_source("https://xkcd.com/rss.xml")).await.unwrap();

        db.touch_source_fetched(created.id, at(5)).await.unwrap();

        let found = db.find_source(&created.url).await.unwrap().unwrap();
        assert_eq!(found.last_fetch, Some(at(5)));
        assert_eq!(found.title, created.title);
        assert_eq!(found.created_date, created.created_date);
        assert_eq!(found.updated_date, created.updated_date);
    }
}
