//! Write path: corpus stream to index store.

use crate::context::{Closeable, PipelineContext};
use crate::corpus::CorpusStream;
use crate::deletes::DeleteSet;
use crate::error::Result;
use crate::store::IndexStore;
use crate::types::{IndexDocument, IngestMode, IngestOptions, Record, StreamEvent};

/// Why records were left out of the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub null_text: u64,
    pub deleted: u64,
    pub over_max_id: u64,
    pub predicate: u64,
    /// Envelopes the stream could not decode.
    pub decode: u64,
}

impl SkipCounts {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.null_text + self.deleted + self.over_max_id + self.predicate + self.decode
    }
}

/// Counters reported at the end of an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub indexed: u64,
    pub skips: SkipCounts,
    /// Delete notices from the stream forwarded to the store.
    pub deletes_applied: u64,
    pub geotagged: u64,
    /// Indexed with a place name but no coordinates.
    pub place_only: u64,
    pub commits: u64,
    /// The run stopped early on a shutdown request.
    pub cancelled: bool,
}

impl IngestStats {
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skips.total()
    }
}

enum Verdict {
    Keep,
    NullText,
    Deleted,
    OverMaxId,
    Predicate,
}

/// Drives one ingestion run: filter, convert, write, and commit in batches.
#[derive(Debug)]
pub struct Ingestor<'a> {
    deletes: &'a DeleteSet,
    options: IngestOptions,
}

impl<'a> Ingestor<'a> {
    #[must_use]
    pub fn new(deletes: &'a DeleteSet, options: IngestOptions) -> Self {
        Self { deletes, options }
    }

    #[must_use]
    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Consumes `stream` into the context's store.
    ///
    /// However the run ends (exhaustion, error or shutdown request), the stream and the store
    /// are closed before returning, which commits every write made so far.
    pub fn run<S: IndexStore>(
        &self,
        ctx: &mut PipelineContext<S>,
        stream: &mut CorpusStream,
    ) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        let outcome = self.drive(ctx, stream, &mut stats);
        stats.skips.decode = stream.stats().decode_failures;

        let report = ctx.close(&mut [stream as &mut dyn Closeable]);
        outcome?;
        if let Some(err) = report.failures.into_iter().next() {
            return Err(err);
        }

        tracing::info!(
            target = "geocorpus::ingest",
            indexed = stats.indexed,
            skipped = stats.skipped(),
            null_text = stats.skips.null_text,
            deleted = stats.skips.deleted,
            over_max_id = stats.skips.over_max_id,
            predicate = stats.skips.predicate,
            decode = stats.skips.decode,
            deletes_applied = stats.deletes_applied,
            geotagged = stats.geotagged,
            place_only = stats.place_only,
            cancelled = stats.cancelled,
            "ingestion finished"
        );
        Ok(stats)
    }

    fn drive<S: IndexStore>(
        &self,
        ctx: &mut PipelineContext<S>,
        stream: &mut CorpusStream,
        stats: &mut IngestStats,
    ) -> Result<()> {
        let interval = self.options.commit_interval.max(1);
        loop {
            if ctx.is_cancelled() {
                tracing::warn!(
                    target = "geocorpus::ingest",
                    indexed = stats.indexed,
                    "shutdown requested; stopping ingestion"
                );
                stats.cancelled = true;
                return Ok(());
            }
            let Some(event) = stream.next()? else {
                break;
            };
            match event {
                StreamEvent::Delete(directive) => {
                    ctx.store_mut().delete_id(directive.id)?;
                    stats.deletes_applied += 1;
                    tracing::debug!(
                        target = "geocorpus::ingest",
                        id = directive.id,
                        "delete notice applied"
                    );
                }
                StreamEvent::Record(record) => {
                    if !self.ingest_record(ctx.store_mut(), &record, stats)? {
                        continue;
                    }
                    if stats.indexed % interval == 0 {
                        ctx.store_mut().commit()?;
                        stats.commits += 1;
                        tracing::info!(
                            target = "geocorpus::ingest",
                            indexed = stats.indexed,
                            last_id = record.id,
                            "commit"
                        );
                    }
                }
            }
        }

        ctx.store_mut().commit()?;
        stats.commits += 1;
        if self.options.force_merge {
            ctx.store_mut().force_merge()?;
        }
        Ok(())
    }

    fn verdict(&self, record: &Record) -> Verdict {
        if record.text.is_none() {
            Verdict::NullText
        } else if self.deletes.contains(record.id) {
            Verdict::Deleted
        } else if self.options.max_id.is_some_and(|max| record.id > max) {
            Verdict::OverMaxId
        } else if !self.options.admits(record) {
            Verdict::Predicate
        } else {
            Verdict::Keep
        }
    }

    /// Returns whether the record was written.
    fn ingest_record<S: IndexStore>(
        &self,
        store: &mut S,
        record: &Record,
        stats: &mut IngestStats,
    ) -> Result<bool> {
        match self.verdict(record) {
            Verdict::Keep => {}
            Verdict::NullText => {
                stats.skips.null_text += 1;
                return Ok(false);
            }
            Verdict::Deleted => {
                stats.skips.deleted += 1;
                return Ok(false);
            }
            Verdict::OverMaxId => {
                stats.skips.over_max_id += 1;
                return Ok(false);
            }
            Verdict::Predicate => {
                stats.skips.predicate += 1;
                return Ok(false);
            }
        }
        let Some(doc) = IndexDocument::from_record(record) else {
            stats.skips.null_text += 1;
            return Ok(false);
        };
        match self.options.mode {
            IngestMode::Append => store.append(&doc)?,
            IngestMode::Upsert => store.upsert(&doc)?,
        }
        stats.indexed += 1;
        if doc.is_geotagged() {
            stats.geotagged += 1;
        } else if doc.place.is_some() {
            stats.place_only += 1;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{StoreQuery, TantivyStore};

    fn placed(id: u64) -> Record {
        Record {
            id,
            text: Some(format!("message {id}")),
            lang: "en".into(),
            place: Some("Chicago, IL".into()),
            ..Record::default()
        }
    }

    #[test]
    fn filters_apply_in_order() {
        let deletes: DeleteSet = [2u64].into_iter().collect();
        let options = IngestOptions::builder().max_id(Some(10)).build();
        let ingestor = Ingestor::new(&deletes, options);
        let mut store = TantivyStore::in_memory().unwrap();
        let mut stats = IngestStats::default();

        let mut null_and_deleted = placed(2);
        null_and_deleted.text = None;
        let mut foreign = placed(4);
        foreign.lang = "es".into();
        let records = [placed(1), null_and_deleted, placed(2), placed(11), foreign];
        for record in &records {
            ingestor.ingest_record(&mut store, record, &mut stats).unwrap();
        }
        store.commit().unwrap();

        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.skips.null_text, 1);
        assert_eq!(stats.skips.deleted, 1);
        assert_eq!(stats.skips.over_max_id, 1);
        assert_eq!(stats.skips.predicate, 1);
        assert_eq!(stats.place_only, 1);
        assert_eq!(store.num_docs().unwrap(), 1);
    }

    #[test]
    fn upsert_mode_never_creates_twins() {
        let deletes = DeleteSet::empty();
        let ingestor = Ingestor::new(&deletes, IngestOptions::update_place());
        let mut store = TantivyStore::in_memory().unwrap();
        let mut stats = IngestStats::default();
        for _ in 0..3 {
            ingestor.ingest_record(&mut store, &placed(5), &mut stats).unwrap();
        }
        store.commit().unwrap();
        assert_eq!(stats.indexed, 3);
        assert_eq!(store.count(&StoreQuery::Id(5)).unwrap(), 1);
    }
}
