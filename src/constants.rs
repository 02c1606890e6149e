//! Constants shared across ingestion, matching and export.

/// Marker for an absent coordinate. A record is geotagged iff neither axis carries it.
pub const COORDINATE_SENTINEL: f64 = f64::NEG_INFINITY;

/// Half-width of a region's bounding box in degrees, applied to both axes.
pub const REGION_RADIUS: f64 = 0.05;

/// Successful writes between two durability commits.
pub const DEFAULT_COMMIT_INTERVAL: u64 = 10_000;

/// Default block file extension of a corpus directory.
pub const DEFAULT_BLOCK_EXTENSION: &str = "gz";

/// Language required by the default inclusion predicate.
pub const DEFAULT_LANG: &str = "en";

/// Writer heap handed to the index engine.
pub const WRITER_MEMORY_BUDGET: usize = 50_000_000;

/// Tokens of this many bytes or more are dropped by the message analyzer.
pub const MAX_TOKEN_LEN: usize = 40;

/// Name under which the message analyzer is registered with the index.
pub const MESSAGE_TOKENIZER: &str = "message";

/// Smoothing scores must exceed this to expand a vector.
pub const DEFAULT_SMOOTHING_THRESHOLD: f64 = 1.0;

// Export artifact names. Line N of every per-document file describes the same document.
pub const GOLD_STANDARD_FILE: &str = "gold_standard";
pub const TF_VECTORS_FILE: &str = "docVectorsTF";
pub const BINARY_VECTORS_FILE: &str = "docVectorsBinary";
pub const SMOOTHED_VECTORS_PREFIX: &str = "docVectorsSmoothingBinary_";
pub const DICTIONARY_FILE: &str = "dict";
pub const DOC_FREQ_FILE: &str = "df";
pub const RAW_TEXT_FILE: &str = "rawText";
pub const USER_ID_FILE: &str = "userID";
