use super::named::{self, NamedTable};
use super::schema::Database;
use super::types::{Author, DatabaseError, Resolved};

impl Database {
    // ========================================================================
    // Author Operations
    // ========================================================================

    /// Look up an author by exact (case-sensitive) name
    pub async fn find_author(&self, name: &str) -> Result<Option<Author>, DatabaseError> {
        named::find(&self.pool, NamedTable::Authors, name).await
    }

    /// Insert a new author. Fails on a duplicate name.
    pub async fn create_author(&self, name: &str) -> Result<Author, DatabaseError> {
        named::create(&self.pool, NamedTable::Authors, name).await
    }

    /// Return the author with this name, inserting it first if needed
    pub async fn find_or_create_author(
        &self,
        name: &str,
    ) -> Result<Resolved<Author>, DatabaseError> {
        named::find_or_create(&self.pool, NamedTable::Authors, name).await
    }

    /// All authors in insertion order
    pub async fn get_authors(&self) -> Result<Vec<Author>, DatabaseError> {
        named::list(&self.pool, NamedTable::Authors).await
    }
}
