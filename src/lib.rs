#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions - these are allowed project-wide for pragmatic reasons:
//
// Documentation lints: Many internal/self-documenting functions don't need extensive docs.
// Public APIs should still have proper documentation.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: counts and term frequencies are bounded by corpus sizes.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Style/complexity:
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::similar_names)] // user_id, tweet ids, term ids
//
// Pattern matching: These pedantic lints often suggest changes that reduce clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::if_same_then_else)]
#![allow(clippy::collapsible_match)]
//
// Performance/ergonomics trade-offs that are acceptable for this codebase:
#![allow(clippy::needless_pass_by_value)] // Many builders take owned values intentionally
#![allow(clippy::return_self_not_must_use)] // Builder patterns don't need must_use on every method
#![allow(clippy::format_push_string)] // Readability over minor perf difference
#![allow(clippy::assigning_clones)] // clone_from() often less readable
//
// Low-value pedantic lints that add noise:
#![allow(clippy::struct_excessive_bools)] // Config structs naturally have many flags
#![allow(clippy::needless_continue)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::field_reassign_with_default)]
#![allow(clippy::unreadable_literal)] // coordinates
#![allow(clippy::implicit_hasher)]
#![allow(clippy::manual_clamp)]
#![allow(clippy::ptr_arg)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::should_implement_trait)] // Some method names are clearer than trait names
//
// Return value wrapping: Many functions use Result for consistency even when they
// currently can't fail, allowing future error conditions to be added without breaking API.
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::unused_self)] // Some trait impls or future extensibility

/// The geocorpus-core crate version (matches `Cargo.toml`).
pub const GEOCORPUS_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod activity;
pub mod constants;
pub mod context;
pub mod corpus;
pub mod deletes;
pub mod error;
pub mod export;
pub mod ingest;
pub mod matcher;
pub mod normalize;
pub mod store;
pub mod timeline;
pub mod types;

pub use activity::{ActivityScan, RegionalActivity, UserActivity};
pub use constants::*;
pub use context::{CleanupReport, Closeable, PipelineContext, ShutdownSignal};
pub use corpus::{BlockCodec, CorpusStream, CorpusSummary, StreamStats};
pub use deletes::DeleteSet;
pub use error::{CorpusError, Result};
pub use export::{
    DocVector, ExportRow, ExportSink, ExportState, ExportSummary, FeatureExporter,
    TermDictionary,
};
pub use ingest::{IngestStats, Ingestor, SkipCounts};
pub use matcher::{GeoPlaceMatcher, MatchedDoc, RegionHits, UserWhitelist, region_matches};
pub use normalize::{Normalized, normalize};
pub use store::{DocHandle, IndexStore, Occur, StoreQuery, TantivyStore, TermFreq};
pub use timeline::{AttachStats, UserTimelines, attach_timelines};
pub use types::{
    CorpusFilter, DeleteDirective, ExportOptions, FieldKind, IndexDocument, IngestMode,
    IngestOptions, IngestOptionsBuilder, Record, RecordField, Region, SmoothingOptions,
    StreamEvent, default_regions, load_regions,
};
