//! Public types exposed by the `geocorpus-core` crate.

pub mod field;
pub mod options;
pub mod record;
pub mod region;

pub use field::{FieldKind, RecordField};
pub use options::{
    CorpusFilter, ExportOptions, IngestMode, IngestOptions, IngestOptionsBuilder,
    SmoothingOptions,
};
pub use record::{DeleteDirective, IndexDocument, Record, StreamEvent};
pub use region::{Region, default_regions, load_regions};
