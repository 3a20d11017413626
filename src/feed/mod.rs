//! Feed documents and the parsers that produce them.
//!
//! - `model` - the normalized [`FeedDocument`] handed to the extractor
//! - `time` - provider time tuples and their local-time conversion
//! - `parser` - the [`FeedParser`] seam and feed-rs conversion
//! - `fetcher` - [`HttpFeedParser`], the reqwest-backed parser

mod fetcher;
mod model;
mod parser;
mod time;

pub use fetcher::{FetchError, HttpFeedParser};
pub use model::{EntryTag, FeedDocument, FeedEntry, FeedMeta, Thumbnail, STATUS_OK};
pub use parser::{parse_feed, FeedParser, ParseResult};
pub use time::{feed_time_to_datetime, feed_time_to_datetime_in, TimeConversionError, TimeTuple};
