//! Shared queries for the name-keyed lookup tables (authors, tags, categories).
//!
//! The three tables have the same `(id, name UNIQUE)` shape. Table names are
//! compile-time constants, never user input.

use sqlx::{FromRow, SqlitePool};

use super::types::{DatabaseError, Resolved};

#[derive(Debug, Clone, Copy)]
pub(crate) enum NamedTable {
    Authors,
    Tags,
    Categories,
}

impl NamedTable {
    fn name(self) -> &'static str {
        match self {
            NamedTable::Authors => "authors",
            NamedTable::Tags => "tags",
            NamedTable::Categories => "categories",
        }
    }
}

pub(crate) async fn find<T>(
    pool: &SqlitePool,
    table: NamedTable,
    name: &str,
) -> Result<Option<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
{
    let sql = format!("SELECT id, name FROM {} WHERE name = ?", table.name());
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Plain insert; a duplicate name is a constraint violation.
pub(crate) async fn create<T>(
    pool: &SqlitePool,
    table: NamedTable,
    name: &str,
) -> Result<T, DatabaseError>
where
    T: for<'r> FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
{
    let sql = format!(
        "INSERT INTO {} (name) VALUES (?) RETURNING id, name",
        table.name()
    );
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Insert the name unless it exists, then return the row, in one transaction.
///
/// `ON CONFLICT DO NOTHING ... RETURNING` yields a row only when the insert
/// happened, which tells new rows from existing ones without a prior lookup.
pub(crate) async fn find_or_create<T>(
    pool: &SqlitePool,
    table: NamedTable,
    name: &str,
) -> Result<Resolved<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
{
    let mut tx = pool.begin().await?;

    let insert = format!(
        "INSERT INTO {} (name) VALUES (?) ON CONFLICT(name) DO NOTHING RETURNING id, name",
        table.name()
    );
    let inserted = sqlx::query_as::<_, T>(&insert)
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

    let resolved = match inserted {
        Some(entity) => Resolved {
            entity,
            created: true,
        },
        None => {
            let select = format!("SELECT id, name FROM {} WHERE name = ?", table.name());
            let entity = sqlx::query_as::<_, T>(&select)
                .bind(name)
                .fetch_one(&mut *tx)
                .await?;
            Resolved {
                entity,
                created: false,
            }
        }
    };

    tx.commit().await?;
    Ok(resolved)
}

pub(crate) async fn list<T>(pool: &SqlitePool, table: NamedTable) -> Result<Vec<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
{
    let sql = format!("SELECT id, name FROM {} ORDER BY id", table.name());
    let rows = sqlx::query_as::<_, T>(&sql).fetch_all(pool).await?;
    Ok(rows)
}
