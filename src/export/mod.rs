//! Read path, part two: matched documents to feature-vector datasets.
//!
//! For every matched document the exporter writes one line to each per-document file
//! (raw text, term-frequency vector, binary vector, optional smoothed vectors, author id,
//! gold label), so line N of every file describes the same document. Term ids come from a
//! single [`TermDictionary`] shared by every feature family. The dictionary and the
//! document-frequency table are written once, at the end.

mod dictionary;
mod features;
mod sink;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

pub use dictionary::TermDictionary;
pub use features::{DocVector, sanitize_line, url_domain};
pub use sink::{ExportRow, ExportSink};

use crate::context::{Closeable, PipelineContext};
use crate::error::{CorpusError, Result};
use crate::matcher::{GeoPlaceMatcher, MatchedDoc, UserWhitelist};
use crate::store::{IndexStore, StoreQuery, field_text};
use crate::types::{ExportOptions, IndexDocument, RecordField, Region, SmoothingOptions};

/// Mutable state of one export run.
#[derive(Debug, Default)]
pub struct ExportState {
    pub dictionary: TermDictionary,
    /// Documents containing each term id.
    pub doc_freq: BTreeMap<usize, u64>,
    /// Candidate authors; consumed as their first document is exported.
    pub whitelist: Option<UserWhitelist>,
    target_tf: HashMap<usize, u64>,
    other_tf: HashMap<usize, u64>,
}

impl ExportState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_whitelist(whitelist: UserWhitelist) -> Self {
        Self {
            whitelist: Some(whitelist),
            ..Self::default()
        }
    }

    /// `(1 + tf in target region) / (1 + tf elsewhere)` over documents exported so far.
    #[must_use]
    pub fn smoothing_score(&self, id: usize) -> f64 {
        let target = self.target_tf.get(&id).copied().unwrap_or(0);
        let other = self.other_tf.get(&id).copied().unwrap_or(0);
        (1 + target) as f64 / (1 + other) as f64
    }

    fn record_tf(&mut self, id: usize, freq: u32, in_target: bool) {
        let table = if in_target {
            &mut self.target_tf
        } else {
            &mut self.other_tf
        };
        *table.entry(id).or_insert(0) += u64::from(freq);
    }
}

/// Totals of one export run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub regions: usize,
    pub documents: u64,
    pub duplicates: usize,
    pub skipped_users: usize,
    pub terms: usize,
    pub expanded_documents: u64,
}

pub struct FeatureExporter {
    matcher: GeoPlaceMatcher,
    options: ExportOptions,
}

impl FeatureExporter {
    #[must_use]
    pub fn new(matcher: GeoPlaceMatcher, options: ExportOptions) -> Self {
        Self { matcher, options }
    }

    #[must_use]
    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    fn validate(&self) -> Result<()> {
        if self.matcher.regions().is_empty() {
            return Err(CorpusError::config("no regions configured"));
        }
        if self.options.text_fields.is_empty()
            && self.options.url_fields.is_empty()
            && self.options.location_fields.is_empty()
        {
            return Err(CorpusError::config("no feature fields configured"));
        }
        if let Some(smoothing) = &self.options.smoothing {
            if smoothing.discounts.is_empty() {
                return Err(CorpusError::config("smoothing needs at least one discount"));
            }
            if !self
                .matcher
                .regions()
                .iter()
                .any(|r| is_target(r, smoothing))
            {
                return Err(CorpusError::config(format!(
                    "smoothing target '{}' is not a configured region",
                    smoothing.target_region
                )));
            }
        }
        Ok(())
    }

    /// Matches every region and exports its documents. The output files are flushed and
    /// closed whether or not the run succeeds.
    pub fn run<S: IndexStore>(
        &self,
        ctx: &PipelineContext<S>,
        state: &mut ExportState,
    ) -> Result<ExportSummary> {
        self.validate()?;
        let discounts = self
            .options
            .smoothing
            .as_ref()
            .map_or(0, |s| s.discounts.len());
        let mut sink = ExportSink::create(&self.options.output_dir, discounts)?;

        let mut summary = ExportSummary::default();
        let outcome = self.export_regions(ctx, state, &mut sink, &mut summary);
        let outcome = outcome.and_then(|()| sink.write_tables(&state.dictionary, &state.doc_freq));
        let closed = sink.close();
        outcome?;
        closed?;

        summary.terms = state.dictionary.len();
        tracing::info!(
            target = "geocorpus::export",
            output = %self.options.output_dir.display(),
            regions = summary.regions,
            documents = summary.documents,
            duplicates = summary.duplicates,
            terms = summary.terms,
            "export finished"
        );
        Ok(summary)
    }

    fn export_regions<S: IndexStore>(
        &self,
        ctx: &PipelineContext<S>,
        state: &mut ExportState,
        sink: &mut ExportSink,
        summary: &mut ExportSummary,
    ) -> Result<()> {
        let store = ctx.store();
        for region in self.matcher.regions() {
            if ctx.is_cancelled() {
                tracing::warn!(target = "geocorpus::export", "shutdown requested; stopping export");
                break;
            }
            let hits = self
                .matcher
                .match_region(store, region, state.whitelist.as_mut())?;
            summary.duplicates += hits.duplicates;
            summary.skipped_users += hits.skipped_users;
            if hits.is_empty() {
                continue;
            }
            summary.regions += 1;
            for matched in &hits.docs {
                let expanded = self.export_document(store, region, matched, state, sink)?;
                summary.documents += 1;
                if expanded {
                    summary.expanded_documents += 1;
                }
            }
        }
        Ok(())
    }

    /// Writes one row for `matched`. Returns whether smoothing added any term.
    pub fn export_document<S: IndexStore>(
        &self,
        store: &S,
        region: &Region,
        matched: &MatchedDoc,
        state: &mut ExportState,
        sink: &mut ExportSink,
    ) -> Result<bool> {
        let doc = &matched.doc;
        let smoothing = self.options.smoothing.as_ref();
        let in_target = smoothing.is_some_and(|s| is_target(region, s));
        let mut vector = DocVector::default();

        for &field in &self.options.text_fields {
            let Some(text) = field_text(doc, field) else {
                continue;
            };
            for entry in store.analyze(field, &text)? {
                let id = state.dictionary.intern(field, &entry.term);
                vector.add(id, entry.freq);
                state.record_tf(id, entry.freq, in_target);
            }
        }
        let text_terms = vector.len();

        let expansion = match smoothing {
            Some(smoothing) => self.expansion_terms(store, doc, &vector, state, smoothing)?,
            None => Vec::new(),
        };

        for &field in &self.options.url_fields {
            let Some(value) = field_text(doc, field) else {
                continue;
            };
            for url in value.split_whitespace() {
                if let Some(domain) = url_domain(url) {
                    vector.add(state.dictionary.intern(field, &domain), 1);
                }
            }
        }
        for &field in &self.options.location_fields {
            if let Some(value) = field_text(doc, field) {
                vector.add(state.dictionary.intern(field, &sanitize_line(&value)), 1);
            }
        }

        for id in vector.ids() {
            *state.doc_freq.entry(id).or_insert(0) += 1;
        }

        let smoothed = smoothing
            .map(|s| {
                s.discounts
                    .iter()
                    .map(|discount| vector.smoothed_line(text_terms, &expansion, *discount))
                    .collect()
            })
            .unwrap_or_default();
        let raw_text = sanitize_line(&doc.text);
        sink.write_row(&ExportRow {
            label: &region.name,
            raw_text: &raw_text,
            user_id: doc.user_id,
            tf: vector.tf_line(),
            binary: vector.binary_line(),
            smoothed,
        })?;
        Ok(!expansion.is_empty())
    }

    /// Terms from the author's timeline scoring above the threshold, best first.
    ///
    /// Only terms already in the dictionary qualify; terms already in the document do not.
    fn expansion_terms<S: IndexStore>(
        &self,
        store: &S,
        doc: &IndexDocument,
        vector: &DocVector,
        state: &ExportState,
        smoothing: &SmoothingOptions,
    ) -> Result<Vec<usize>> {
        let Some(timeline) = author_timeline(store, doc)? else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<(usize, f64)> = store
            .analyze(RecordField::Timeline, &timeline)?
            .into_iter()
            .filter(|entry| !(smoothing.skip_mentions && entry.term.contains('@')))
            .filter_map(|entry| state.dictionary.get(smoothing.expansion_field, &entry.term))
            .filter(|id| !vector.contains(*id))
            .map(|id| (id, state.smoothing_score(id)))
            .filter(|(_, score)| *score > smoothing.threshold)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        tracing::debug!(
            target = "geocorpus::export",
            id = doc.id,
            user_id = doc.user_id,
            expansion = scored.len(),
            "timeline expansion"
        );
        Ok(scored.into_iter().map(|(id, _)| id).collect())
    }
}

fn is_target(region: &Region, smoothing: &SmoothingOptions) -> bool {
    region.name == smoothing.target_region || region.short_name() == smoothing.target_region
}

/// The document's own timeline, or the first one attached to another document by the same author.
fn author_timeline<S: IndexStore>(store: &S, doc: &IndexDocument) -> Result<Option<String>> {
    if let Some(timeline) = doc.timeline.as_deref().filter(|t| !t.is_empty()) {
        return Ok(Some(timeline.to_string()));
    }
    let query = StoreQuery::exact(RecordField::UserId, doc.user_id.to_string());
    let total = store.count(&query)?;
    for handle in store.search(&query, total)? {
        let other = store.document(handle)?;
        if let Some(timeline) = other.timeline.filter(|t| !t.is_empty()) {
            return Ok(Some(timeline));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TantivyStore;

    #[test]
    fn smoothing_score_follows_ratio() {
        let mut state = ExportState::new();
        state.record_tf(0, 3, true);
        state.record_tf(0, 1, false);
        state.record_tf(1, 2, false);
        assert!((state.smoothing_score(0) - 2.0).abs() < f64::EPSILON);
        assert!(state.smoothing_score(1) < 1.0);
        assert!((state.smoothing_score(7) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn author_timeline_falls_back_to_sibling_document() {
        let mut store = TantivyStore::in_memory().unwrap();
        let plain = IndexDocument {
            id: 1,
            user_id: 4,
            text: "now".into(),
            ..IndexDocument::default()
        };
        let with_history = IndexDocument {
            id: 2,
            user_id: 4,
            text: "then".into(),
            timeline: Some("older words".into()),
            ..IndexDocument::default()
        };
        store.append(&plain).unwrap();
        store.append(&with_history).unwrap();
        store.commit().unwrap();
        assert_eq!(
            author_timeline(&store, &plain).unwrap().as_deref(),
            Some("older words")
        );
    }

    #[test]
    fn unknown_smoothing_target_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let options = ExportOptions::new(dir.path())
            .with_smoothing(SmoothingOptions::for_region("Atlantis"));
        let exporter = FeatureExporter::new(
            GeoPlaceMatcher::new(vec![Region::new("Pittsburgh, PA", -79.976389, 40.439722)]),
            options,
        );
        let ctx = PipelineContext::new(TantivyStore::in_memory().unwrap());
        let err = exporter.run(&ctx, &mut ExportState::new()).unwrap_err();
        assert!(matches!(err, CorpusError::Configuration { .. }));
    }
}
