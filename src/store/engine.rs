//! Tantivy-backed [`IndexStore`].

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;

use tantivy::collector::{Count, DocSetCollector};
use tantivy::directory::MmapDirectory;
use tantivy::query::{AllQuery, BooleanQuery, Query, RangeQuery, TermQuery};
use tantivy::schema::{
    FAST, Field, INDEXED, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing,
    TextOptions, Value,
};
use tantivy::tokenizer::{LowerCaser, RegexTokenizer, RemoveLongFilter, TextAnalyzer, TokenStream};
use tantivy::{DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use super::{DocHandle, IndexStore, Occur, StoreQuery, TermFreq};
use crate::constants::{MAX_TOKEN_LEN, MESSAGE_TOKENIZER, WRITER_MEMORY_BUDGET};
use crate::context::Closeable;
use crate::error::{CorpusError, Result};
use crate::types::{FieldKind, IndexDocument, RecordField};

/// Keeps URLs whole, keeps `@`/`#` prefixes, splits everything else on non-word characters.
const MESSAGE_TOKEN_PATTERN: &str = r"https?://\S+|[@#]?[\w']+";

fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    let analyzed = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(MESSAGE_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();
    for field in RecordField::ALL {
        let name = field.name();
        match field.kind() {
            FieldKind::Unsigned if field == RecordField::Id => {
                builder.add_u64_field(name, INDEXED | STORED | FAST);
            }
            FieldKind::Unsigned => {
                builder.add_u64_field(name, INDEXED | STORED);
            }
            FieldKind::Signed => {
                builder.add_i64_field(name, INDEXED | STORED | FAST);
            }
            FieldKind::Coordinate => {
                builder.add_f64_field(name, INDEXED | STORED | FAST);
            }
            FieldKind::Exact => {
                builder.add_text_field(name, STRING | STORED);
            }
            FieldKind::Analyzed => {
                builder.add_text_field(name, analyzed.clone());
            }
        }
    }
    builder.build()
}

fn existing_index(path: &Path) -> Result<Index> {
    if !path.is_dir() {
        return Err(CorpusError::config(format!(
            "index directory {} does not exist",
            path.display()
        )));
    }
    Index::open_in_dir(path).map_err(|err| {
        CorpusError::config(format!("no index found at {}: {err}", path.display()))
    })
}

fn message_analyzer() -> Result<TextAnalyzer> {
    Ok(
        TextAnalyzer::builder(RegexTokenizer::new(MESSAGE_TOKEN_PATTERN)?)
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .build(),
    )
}

fn engine_occur(occur: Occur) -> tantivy::query::Occur {
    match occur {
        Occur::Must => tantivy::query::Occur::Must,
        Occur::Should => tantivy::query::Occur::Should,
        Occur::MustNot => tantivy::query::Occur::MustNot,
    }
}

fn term_query(term: Term) -> Box<dyn Query> {
    Box::new(TermQuery::new(term, IndexRecordOption::Basic))
}

/// Single-writer document store over a tantivy index.
///
/// Reads go through a manually reloaded reader, so they observe the state as of the last
/// commit made through this handle.
pub struct TantivyStore {
    index: Index,
    reader: IndexReader,
    writer: Option<IndexWriter>,
    fields: Vec<Field>,
    label: String,
}

impl std::fmt::Debug for TantivyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyStore")
            .field("index", &self.index)
            .field("writable", &self.writer.is_some())
            .field("fields", &self.fields)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl TantivyStore {
    /// Opens the index in `path`, creating the directory and an empty index when absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let directory = MmapDirectory::open(path).map_err(|err| {
            CorpusError::store(format!("cannot open index directory {}: {err}", path.display()))
        })?;
        let index = Index::open_or_create(directory, build_schema())?;
        Self::from_index(index, format!("index {}", path.display()), true)
    }

    /// Opens an index that must already exist, as the read path requires.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_index(existing_index(path)?, format!("index {}", path.display()), true)
    }

    /// Opens an existing index without a writer.
    ///
    /// No lock is taken, so this works next to a running ingestion and never commits.
    /// Every write returns [`CorpusError::StoreClosed`].
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_index(
            existing_index(path)?,
            format!("read-only index {}", path.display()),
            false,
        )
    }

    /// Volatile store, used by tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        Self::from_index(
            Index::create_in_ram(build_schema()),
            "in-memory index".into(),
            true,
        )
    }

    fn from_index(index: Index, label: String, writable: bool) -> Result<Self> {
        index
            .tokenizers()
            .register(MESSAGE_TOKENIZER, message_analyzer()?);
        let schema = index.schema();
        let fields = RecordField::ALL
            .iter()
            .map(|field| schema.get_field(field.name()))
            .collect::<tantivy::Result<Vec<_>>>()?;
        let writer: Option<IndexWriter> = if writable {
            Some(index.writer_with_num_threads(1, WRITER_MEMORY_BUDGET)?)
        } else {
            None
        };
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        tracing::debug!(target = "geocorpus::store", store = %label, writable, "index store opened");
        Ok(Self {
            index,
            reader,
            writer,
            fields,
            label,
        })
    }

    fn field(&self, field: RecordField) -> Field {
        self.fields[field as usize]
    }

    fn writer_mut(&mut self) -> Result<&mut IndexWriter> {
        self.writer.as_mut().ok_or(CorpusError::StoreClosed)
    }

    fn to_engine(&self, doc: &IndexDocument) -> TantivyDocument {
        let mut out = TantivyDocument::default();
        out.add_u64(self.field(RecordField::Id), doc.id);
        out.add_text(self.field(RecordField::UserId), doc.user_id.to_string());
        out.add_text(self.field(RecordField::ScreenName), &doc.screen_name);
        out.add_i64(self.field(RecordField::Epoch), doc.epoch);
        out.add_text(self.field(RecordField::Text), &doc.text);
        out.add_text(self.field(RecordField::Lang), &doc.lang);

        let optional_u64 = [
            (RecordField::InReplyToStatusId, doc.in_reply_to_status_id),
            (RecordField::InReplyToUserId, doc.in_reply_to_user_id),
            (RecordField::RetweetedStatusId, doc.retweeted_status_id),
            (RecordField::RetweetedUserId, doc.retweeted_user_id),
            (RecordField::RetweetCount, doc.retweet_count),
        ];
        for (field, value) in optional_u64 {
            if let Some(value) = value {
                out.add_u64(self.field(field), value);
            }
        }
        if let (Some(lon), Some(lat)) = (doc.longitude, doc.latitude) {
            out.add_f64(self.field(RecordField::Longitude), lon);
            out.add_f64(self.field(RecordField::Latitude), lat);
        }
        let optional_text = [
            (RecordField::Place, &doc.place),
            (RecordField::UserLocation, &doc.user_location),
            (RecordField::UserDescription, &doc.user_description),
            (RecordField::UserUrl, &doc.user_url),
            (RecordField::OutlinkDomain, &doc.outlink_domain),
            (RecordField::Timeline, &doc.timeline),
        ];
        for (field, value) in optional_text {
            if let Some(value) = value {
                out.add_text(self.field(field), value);
            }
        }
        out.add_u64(self.field(RecordField::FollowersCount), doc.followers_count);
        out.add_u64(self.field(RecordField::FriendsCount), doc.friends_count);
        out.add_u64(self.field(RecordField::StatusesCount), doc.statuses_count);
        out
    }

    fn from_engine(&self, doc: &TantivyDocument) -> Result<IndexDocument> {
        let u64_of = |field: RecordField| doc.get_first(self.field(field)).and_then(|v| v.as_u64());
        let f64_of = |field: RecordField| doc.get_first(self.field(field)).and_then(|v| v.as_f64());
        let str_of = |field: RecordField| {
            doc.get_first(self.field(field))
                .and_then(|v| v.as_str().map(str::to_string))
        };

        let id = u64_of(RecordField::Id)
            .ok_or_else(|| CorpusError::store("stored document carries no id"))?;
        Ok(IndexDocument {
            id,
            user_id: str_of(RecordField::UserId)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            screen_name: str_of(RecordField::ScreenName).unwrap_or_default(),
            epoch: doc
                .get_first(self.field(RecordField::Epoch))
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
            text: str_of(RecordField::Text).unwrap_or_default(),
            lang: str_of(RecordField::Lang).unwrap_or_default(),
            in_reply_to_status_id: u64_of(RecordField::InReplyToStatusId),
            in_reply_to_user_id: u64_of(RecordField::InReplyToUserId),
            retweeted_status_id: u64_of(RecordField::RetweetedStatusId),
            retweeted_user_id: u64_of(RecordField::RetweetedUserId),
            retweet_count: u64_of(RecordField::RetweetCount),
            longitude: f64_of(RecordField::Longitude),
            latitude: f64_of(RecordField::Latitude),
            place: str_of(RecordField::Place),
            user_location: str_of(RecordField::UserLocation),
            user_description: str_of(RecordField::UserDescription),
            user_url: str_of(RecordField::UserUrl),
            outlink_domain: str_of(RecordField::OutlinkDomain),
            followers_count: u64_of(RecordField::FollowersCount).unwrap_or(0),
            friends_count: u64_of(RecordField::FriendsCount).unwrap_or(0),
            statuses_count: u64_of(RecordField::StatusesCount).unwrap_or(0),
            timeline: str_of(RecordField::Timeline),
        })
    }

    fn exact_term(&self, field: RecordField, value: &str) -> Result<Term> {
        let engine_field = self.field(field);
        let invalid = || CorpusError::config(format!("'{value}' is not a valid value for {field}"));
        Ok(match field.kind() {
            FieldKind::Exact => Term::from_field_text(engine_field, value),
            FieldKind::Unsigned => {
                Term::from_field_u64(engine_field, value.parse().map_err(|_| invalid())?)
            }
            FieldKind::Signed => {
                Term::from_field_i64(engine_field, value.parse().map_err(|_| invalid())?)
            }
            FieldKind::Coordinate => {
                Term::from_field_f64(engine_field, value.parse().map_err(|_| invalid())?)
            }
            FieldKind::Analyzed => {
                return Err(CorpusError::config(format!(
                    "exact match is not supported on analyzed field {field}"
                )));
            }
        })
    }

    fn to_query(&self, query: &StoreQuery) -> Result<Box<dyn Query>> {
        Ok(match query {
            StoreQuery::All => Box::new(AllQuery),
            StoreQuery::Id(id) => term_query(Term::from_field_u64(self.field(RecordField::Id), *id)),
            StoreQuery::Exact { field, value } => term_query(self.exact_term(*field, value)?),
            StoreQuery::Range {
                field,
                lower,
                upper,
            } => {
                if field.kind() != FieldKind::Coordinate {
                    return Err(CorpusError::config(format!(
                        "range queries need a coordinate field, got {field}"
                    )));
                }
                let engine_field = self.field(*field);
                Box::new(RangeQuery::new(
                    Bound::Included(Term::from_field_f64(engine_field, *lower)),
                    Bound::Included(Term::from_field_f64(engine_field, *upper)),
                ))
            }
            StoreQuery::Bool(clauses) => {
                let mut subqueries = Vec::with_capacity(clauses.len());
                for (occur, sub) in clauses {
                    subqueries.push((engine_occur(*occur), self.to_query(sub)?));
                }
                Box::new(BooleanQuery::new(subqueries))
            }
        })
    }
}

impl IndexStore for TantivyStore {
    fn append(&mut self, doc: &IndexDocument) -> Result<()> {
        let document = self.to_engine(doc);
        self.writer_mut()?
            .add_document(document)
            .map_err(|err| CorpusError::store(format!("append of id {} failed: {err}", doc.id)))?;
        Ok(())
    }

    fn upsert(&mut self, doc: &IndexDocument) -> Result<()> {
        let document = self.to_engine(doc);
        let key = Term::from_field_u64(self.field(RecordField::Id), doc.id);
        let writer = self.writer_mut()?;
        writer.delete_term(key);
        writer
            .add_document(document)
            .map_err(|err| CorpusError::store(format!("upsert of id {} failed: {err}", doc.id)))?;
        Ok(())
    }

    fn delete_id(&mut self, id: u64) -> Result<()> {
        let key = Term::from_field_u64(self.field(RecordField::Id), id);
        self.writer_mut()?.delete_term(key);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.writer_mut()?
            .commit()
            .map_err(|err| CorpusError::store(format!("commit failed: {err}")))?;
        self.reader.reload()?;
        Ok(())
    }

    fn force_merge(&mut self) -> Result<()> {
        let segments = self.index.searchable_segment_ids()?;
        if segments.len() > 1 {
            self.writer_mut()?
                .merge(&segments)
                .wait()
                .map_err(|err| CorpusError::store(format!("merge failed: {err}")))?;
            self.reader.reload()?;
        }
        tracing::info!(
            target = "geocorpus::store",
            store = %self.label,
            merged_segments = segments.len(),
            "index merged"
        );
        Ok(())
    }

    fn count(&self, query: &StoreQuery) -> Result<usize> {
        let query = self.to_query(query)?;
        Ok(self.reader.searcher().search(query.as_ref(), &Count)?)
    }

    fn search(&self, query: &StoreQuery, limit: usize) -> Result<Vec<DocHandle>> {
        let query = self.to_query(query)?;
        let addresses = self
            .reader
            .searcher()
            .search(query.as_ref(), &DocSetCollector)?;
        let mut handles: Vec<DocHandle> = addresses
            .into_iter()
            .map(|address| DocHandle {
                segment: address.segment_ord,
                doc: address.doc_id,
            })
            .collect();
        handles.sort_unstable();
        handles.truncate(limit);
        Ok(handles)
    }

    fn document(&self, handle: DocHandle) -> Result<IndexDocument> {
        let doc: TantivyDocument = self
            .reader
            .searcher()
            .doc(DocAddress::new(handle.segment, handle.doc))?;
        self.from_engine(&doc)
    }

    fn analyze(&self, field: RecordField, text: &str) -> Result<Vec<TermFreq>> {
        if !field.is_analyzed() {
            return Ok(vec![TermFreq {
                term: text.to_string(),
                freq: 1,
            }]);
        }
        let mut analyzer = self.index.tokenizer_for_field(self.field(field))?;
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        let mut stream = analyzer.token_stream(text);
        while stream.advance() {
            *counts.entry(stream.token().text.clone()).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(term, freq)| TermFreq { term, freq })
            .collect())
    }

    fn num_docs(&self) -> Result<u64> {
        Ok(self.reader.searcher().num_docs())
    }
}

impl Closeable for TantivyStore {
    fn resource_name(&self) -> &str {
        &self.label
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .commit()
            .map_err(|err| CorpusError::store(format!("final commit failed: {err}")))?;
        writer
            .wait_merging_threads()
            .map_err(|err| CorpusError::store(format!("merge threads failed: {err}")))?;
        self.reader.reload()?;
        tracing::info!(target = "geocorpus::store", store = %self.label, "index store closed");
        Ok(())
    }
}

impl Drop for TantivyStore {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(err) = Closeable::close(self) {
                tracing::warn!(
                    target = "geocorpus::store",
                    store = %self.label,
                    error = %err,
                    "failed to commit index store on drop"
                );
            }
        }
    }
}
