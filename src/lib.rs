//! Idempotent RSS/Atom ingestion into a SQLite entity store.
//!
//! A [`feed::FeedParser`] turns a URL into a [`feed::FeedDocument`];
//! [`extractor::RssExtractor`] merges that document into a
//! [`storage::Database`], creating only the sources, articles, authors and
//! tags that are not stored yet.

pub mod config;
pub mod extractor;
pub mod feed;
pub mod storage;
pub mod util;
