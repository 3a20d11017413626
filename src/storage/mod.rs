mod authors;
mod categories;
mod contents;
mod named;
mod schema;
mod sources;
mod tags;
mod types;

pub use schema::Database;
pub use types::{
    Article, Author, Category, ContentKind, DatabaseError, EntityCounts, NewArticle, NewSource,
    Resolved, Source, SourceKind, Tag,
};
