//! Read path, part one: region selection over the index.
//!
//! A document belongs to a region when its coordinates fall inside the region's box or its
//! place name equals the canonical name or an alias. Each region is matched in two passes:
//! count the hits, then fetch exactly that many, so nothing is truncated.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use crate::corpus::open_decoded;
use crate::error::{CorpusError, Result};
use crate::store::{DocHandle, IndexStore, StoreQuery};
use crate::types::{IndexDocument, RecordField, Region};

/// Candidate author ids; each may be matched once per run, in whichever region comes first.
#[derive(Debug, Clone, Default)]
pub struct UserWhitelist {
    candidates: HashSet<u64>,
    consumed: Vec<u64>,
}

impl UserWhitelist {
    /// Reads one user id per line (first tab-separated column), compressed or plain.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CorpusError::config(format!(
                "user id file {} does not exist",
                path.display()
            )));
        }
        let mut reader = open_decoded(path)?;
        let mut line = String::new();
        let mut candidates = HashSet::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let first = line.split('\t').next().unwrap_or_default().trim();
            if first.is_empty() {
                continue;
            }
            let id = first.parse().map_err(|_| {
                CorpusError::config(format!(
                    "user id file {}: '{first}' is not a user id",
                    path.display()
                ))
            })?;
            candidates.insert(id);
        }
        Ok(Self {
            candidates,
            consumed: Vec::new(),
        })
    }

    /// Takes `user_id` out of the candidate set. `false` when it is not (or no longer) a candidate.
    pub fn consume(&mut self, user_id: u64) -> bool {
        if self.candidates.remove(&user_id) {
            self.consumed.push(user_id);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn is_candidate(&self, user_id: u64) -> bool {
        self.candidates.contains(&user_id)
    }

    /// Users consumed so far, in consumption order.
    #[must_use]
    pub fn consumed(&self) -> &[u64] {
        &self.consumed
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.candidates.len()
    }
}

impl FromIterator<u64> for UserWhitelist {
    fn from_iter<T: IntoIterator<Item = u64>>(iter: T) -> Self {
        Self {
            candidates: iter.into_iter().collect(),
            consumed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchedDoc {
    pub handle: DocHandle,
    pub doc: IndexDocument,
}

/// Deduplicated hits of one region, in index order.
#[derive(Debug, Clone)]
pub struct RegionHits {
    pub region: Region,
    pub docs: Vec<MatchedDoc>,
    /// Hits reported by the count pass.
    pub total_hits: usize,
    /// Hits dropped because their id was already seen in this region.
    pub duplicates: usize,
    /// Hits dropped because their author was not an available candidate.
    pub skipped_users: usize,
}

impl RegionHits {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// The bounding-box-or-place-name predicate evaluated directly on a document.
#[must_use]
pub fn region_matches(region: &Region, doc: &IndexDocument) -> bool {
    let in_box = match (doc.longitude, doc.latitude) {
        (Some(lon), Some(lat)) => region.contains(lon, lat),
        _ => false,
    };
    in_box || doc.place.as_deref().is_some_and(|p| region.matches_place(p))
}

/// Region matcher over an ordered region table.
#[derive(Debug, Clone)]
pub struct GeoPlaceMatcher {
    regions: Vec<Region>,
}

impl GeoPlaceMatcher {
    #[must_use]
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// `(lon in box AND lat in box) OR place in {name, aliases...}`.
    #[must_use]
    pub fn region_query(region: &Region) -> StoreQuery {
        let (lon_min, lon_max) = region.longitude_bounds();
        let (lat_min, lat_max) = region.latitude_bounds();
        let bbox = StoreQuery::all_of(vec![
            StoreQuery::Range {
                field: RecordField::Longitude,
                lower: lon_min,
                upper: lon_max,
            },
            StoreQuery::Range {
                field: RecordField::Latitude,
                lower: lat_min,
                upper: lat_max,
            },
        ]);
        let names = StoreQuery::any_of(
            region
                .place_names()
                .map(|name| StoreQuery::exact(RecordField::Place, name))
                .collect(),
        );
        StoreQuery::any_of(vec![bbox, names])
    }

    /// Matches one region. With a whitelist, only documents whose author is still a
    /// candidate survive, and that author is consumed.
    pub fn match_region<S: IndexStore>(
        &self,
        store: &S,
        region: &Region,
        mut whitelist: Option<&mut UserWhitelist>,
    ) -> Result<RegionHits> {
        let query = Self::region_query(region);
        let total_hits = store.count(&query)?;
        let mut hits = RegionHits {
            region: region.clone(),
            docs: Vec::new(),
            total_hits,
            duplicates: 0,
            skipped_users: 0,
        };
        if total_hits == 0 {
            tracing::info!(
                target = "geocorpus::match",
                region = %region.name,
                "no hits; region skipped"
            );
            return Ok(hits);
        }

        let mut seen = HashSet::with_capacity(total_hits);
        for handle in store.search(&query, total_hits)? {
            let doc = store.document(handle)?;
            if !seen.insert(doc.id) {
                hits.duplicates += 1;
                tracing::debug!(
                    target = "geocorpus::match",
                    region = %region.name,
                    id = doc.id,
                    "duplicate hit"
                );
                continue;
            }
            if let Some(whitelist) = whitelist.as_deref_mut() {
                if !whitelist.consume(doc.user_id) {
                    hits.skipped_users += 1;
                    continue;
                }
            }
            hits.docs.push(MatchedDoc { handle, doc });
        }

        tracing::info!(
            target = "geocorpus::match",
            region = %region.name,
            total_hits,
            kept = hits.docs.len(),
            duplicates = hits.duplicates,
            skipped_users = hits.skipped_users,
            "region matched"
        );
        Ok(hits)
    }

    /// Matches every region in table order, skipping regions without hits.
    pub fn match_all<S: IndexStore>(
        &self,
        store: &S,
        mut whitelist: Option<&mut UserWhitelist>,
    ) -> Result<Vec<RegionHits>> {
        let mut out = Vec::new();
        for region in &self.regions {
            let hits = self.match_region(store, region, whitelist.as_deref_mut())?;
            if !hits.is_empty() {
                out.push(hits);
            }
        }
        Ok(out)
    }
}
