//! Structured document store behind the ingest and query paths.
//!
//! [`IndexStore`] is the seam between the pipeline and the full-text engine. The only
//! implementation shipped is [`TantivyStore`]; writes become visible to reads at the next
//! [`IndexStore::commit`].

mod engine;

pub use engine::TantivyStore;

use crate::context::Closeable;
use crate::error::Result;
use crate::types::{IndexDocument, RecordField};

/// Boolean clause kind, mirroring the engine's MUST/SHOULD/MUST_NOT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

/// Engine-neutral structured query.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreQuery {
    All,
    /// Exact primary-key lookup.
    Id(u64),
    /// Exact equality on a non-analyzed field. Numeric fields parse `value`.
    Exact { field: RecordField, value: String },
    /// Inclusive numeric range over a coordinate field.
    Range {
        field: RecordField,
        lower: f64,
        upper: f64,
    },
    Bool(Vec<(Occur, StoreQuery)>),
}

impl StoreQuery {
    #[must_use]
    pub fn exact(field: RecordField, value: impl Into<String>) -> Self {
        Self::Exact {
            field,
            value: value.into(),
        }
    }

    /// Conjunction of every sub-query.
    #[must_use]
    pub fn all_of(queries: Vec<StoreQuery>) -> Self {
        Self::Bool(queries.into_iter().map(|q| (Occur::Must, q)).collect())
    }

    /// Disjunction: at least one sub-query must match.
    #[must_use]
    pub fn any_of(queries: Vec<StoreQuery>) -> Self {
        Self::Bool(queries.into_iter().map(|q| (Occur::Should, q)).collect())
    }
}

/// Position of a document inside the current read snapshot.
///
/// Handles order by segment then by document, which is index (insertion) order for a
/// single-writer store. They are invalidated by the next commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocHandle {
    pub segment: u32,
    pub doc: u32,
}

/// One entry of a per-document term vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermFreq {
    pub term: String,
    pub freq: u32,
}

pub trait IndexStore: Closeable {
    /// Adds a document without checking for an existing one with the same id.
    fn append(&mut self, doc: &IndexDocument) -> Result<()>;

    /// Replaces any document sharing `doc.id`, or inserts it.
    fn upsert(&mut self, doc: &IndexDocument) -> Result<()>;

    /// Removes every document with the given id. Ordered with respect to earlier and later writes.
    fn delete_id(&mut self, id: u64) -> Result<()>;

    /// Makes pending writes durable and visible to reads.
    fn commit(&mut self) -> Result<()>;

    /// Merges all segments into one.
    fn force_merge(&mut self) -> Result<()>;

    /// Exact number of documents matching `query`.
    fn count(&self, query: &StoreQuery) -> Result<usize>;

    /// Matching documents in index order, at most `limit`.
    fn search(&self, query: &StoreQuery, limit: usize) -> Result<Vec<DocHandle>>;

    fn document(&self, handle: DocHandle) -> Result<IndexDocument>;

    /// Runs `field`'s analyzer over `text`; terms come back sorted.
    fn analyze(&self, field: RecordField, text: &str) -> Result<Vec<TermFreq>>;

    fn num_docs(&self) -> Result<u64>;

    /// Terms and in-document frequencies of one stored field, sorted by term.
    ///
    /// Non-analyzed fields yield their whole value as a single term.
    fn term_vector(&self, handle: DocHandle, field: RecordField) -> Result<Vec<TermFreq>> {
        let doc = self.document(handle)?;
        match field_text(&doc, field) {
            Some(text) => self.analyze(field, &text),
            None => Ok(Vec::new()),
        }
    }
}

/// Stored textual value of `field`, if the document carries one.
#[must_use]
pub fn field_text(doc: &IndexDocument, field: RecordField) -> Option<String> {
    let text = match field {
        RecordField::Id => Some(doc.id.to_string()),
        RecordField::UserId => Some(doc.user_id.to_string()),
        RecordField::ScreenName => Some(doc.screen_name.clone()),
        RecordField::Epoch => Some(doc.epoch.to_string()),
        RecordField::Text => Some(doc.text.clone()),
        RecordField::Lang => Some(doc.lang.clone()),
        RecordField::InReplyToStatusId => doc.in_reply_to_status_id.map(|v| v.to_string()),
        RecordField::InReplyToUserId => doc.in_reply_to_user_id.map(|v| v.to_string()),
        RecordField::RetweetedStatusId => doc.retweeted_status_id.map(|v| v.to_string()),
        RecordField::RetweetedUserId => doc.retweeted_user_id.map(|v| v.to_string()),
        RecordField::RetweetCount => doc.retweet_count.map(|v| v.to_string()),
        RecordField::Longitude => doc.longitude.map(|v| v.to_string()),
        RecordField::Latitude => doc.latitude.map(|v| v.to_string()),
        RecordField::Place => doc.place.clone(),
        RecordField::UserLocation => doc.user_location.clone(),
        RecordField::UserDescription => doc.user_description.clone(),
        RecordField::UserUrl => doc.user_url.clone(),
        RecordField::OutlinkDomain => doc.outlink_domain.clone(),
        RecordField::FollowersCount => Some(doc.followers_count.to_string()),
        RecordField::FriendsCount => Some(doc.friends_count.to_string()),
        RecordField::StatusesCount => Some(doc.statuses_count.to_string()),
        RecordField::Timeline => doc.timeline.clone(),
    };
    text.filter(|value| !value.is_empty())
}
