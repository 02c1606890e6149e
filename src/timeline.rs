//! Per-author timelines gathered from a secondary corpus and attached to matched documents.

use std::collections::HashMap;

use crate::context::PipelineContext;
use crate::corpus::CorpusStream;
use crate::error::Result;
use crate::export::sanitize_line;
use crate::matcher::{GeoPlaceMatcher, UserWhitelist};
use crate::normalize::parse_envelope;
use crate::store::IndexStore;

/// Accumulated message text per author.
#[derive(Debug, Clone, Default)]
pub struct UserTimelines {
    by_user: HashMap<u64, String>,
    messages: u64,
}

impl UserTimelines {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every raw envelope of `stream` and appends its sanitized text to its author's
    /// timeline. Envelopes without text or author are ignored.
    pub fn collect(stream: &mut CorpusStream) -> Result<Self> {
        let mut timelines = Self::new();
        let mut undecodable = 0u64;
        while let Some(raw) = stream.next_raw()? {
            let envelope = match parse_envelope(&raw) {
                Ok(envelope) => envelope,
                Err(err) => {
                    undecodable += 1;
                    tracing::warn!(
                        target = "geocorpus::corpus",
                        error = %err,
                        "skipping undecodable timeline envelope"
                    );
                    continue;
                }
            };
            let user_id = envelope.user.as_ref().and_then(|user| user.id);
            if let (Some(text), Some(user_id)) = (envelope.text, user_id) {
                timelines.push(user_id, &text);
            }
        }
        tracing::info!(
            target = "geocorpus::corpus",
            users = timelines.len(),
            messages = timelines.messages,
            undecodable,
            "user timelines collected"
        );
        Ok(timelines)
    }

    pub fn push(&mut self, user_id: u64, text: &str) {
        let text = sanitize_line(text);
        let entry = self.by_user.entry(user_id).or_default();
        if !entry.is_empty() {
            entry.push(' ');
        }
        entry.push_str(&text);
        self.messages += 1;
    }

    #[must_use]
    pub fn get(&self, user_id: u64) -> Option<&str> {
        self.by_user.get(&user_id).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachStats {
    pub regions: usize,
    pub candidates: usize,
    pub attached: u64,
}

/// Upserts every region hit whose author has a timeline (and, with a whitelist, is a
/// candidate) with its `timeline` field set. Running it again leaves the store unchanged.
pub fn attach_timelines<S: IndexStore>(
    ctx: &mut PipelineContext<S>,
    matcher: &GeoPlaceMatcher,
    timelines: &UserTimelines,
    whitelist: Option<&UserWhitelist>,
) -> Result<AttachStats> {
    let mut stats = AttachStats::default();
    let mut updates = Vec::new();
    for region in matcher.regions() {
        let hits = matcher.match_region(ctx.store(), region, None)?;
        if hits.is_empty() {
            continue;
        }
        stats.regions += 1;
        for matched in hits.docs {
            let user_id = matched.doc.user_id;
            if whitelist.is_some_and(|w| !w.is_candidate(user_id)) {
                continue;
            }
            stats.candidates += 1;
            if let Some(timeline) = timelines.get(user_id) {
                updates.push(matched.doc.with_timeline(timeline));
            }
        }
    }

    let store = ctx.store_mut();
    for doc in &updates {
        store.upsert(doc)?;
        stats.attached += 1;
    }
    store.commit()?;
    tracing::info!(
        target = "geocorpus::ingest",
        regions = stats.regions,
        candidates = stats.candidates,
        attached = stats.attached,
        "timelines attached"
    );
    Ok(stats)
}
