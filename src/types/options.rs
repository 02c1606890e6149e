//! Builder-style options for streaming, ingestion and export runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::field::RecordField;
use super::record::Record;
use crate::constants::{
    DEFAULT_BLOCK_EXTENSION, DEFAULT_COMMIT_INTERVAL, DEFAULT_LANG, DEFAULT_SMOOTHING_THRESHOLD,
};

fn default_true() -> bool {
    true
}

fn default_extension() -> String {
    DEFAULT_BLOCK_EXTENSION.to_string()
}

fn default_commit_interval() -> u64 {
    DEFAULT_COMMIT_INTERVAL
}

fn default_lang() -> Option<String> {
    Some(DEFAULT_LANG.to_string())
}

/// Selects which files of a corpus directory are blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusFilter {
    /// File extension without the leading dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Substring the file name must contain; `None` accepts every file with the extension.
    #[serde(default)]
    pub pattern: Option<String>,
}

impl Default for CorpusFilter {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            pattern: None,
        }
    }
}

impl CorpusFilter {
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: Option<String>) -> Self {
        self.pattern = pattern.filter(|p| !p.is_empty());
        self
    }

    #[must_use]
    pub fn accepts(&self, file_name: &str) -> bool {
        let suffix_ok = file_name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext == self.extension);
        suffix_ok
            && self
                .pattern
                .as_deref()
                .is_none_or(|pattern| file_name.contains(pattern))
    }
}

/// Whether surviving records are appended or written over an existing document with the same id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    #[default]
    Append,
    Upsert,
}

/// Tunables for one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOptions {
    #[serde(default)]
    pub mode: IngestMode,
    /// Successful writes between durability commits.
    #[serde(default = "default_commit_interval")]
    pub commit_interval: u64,
    /// Records with a larger id are skipped.
    #[serde(default)]
    pub max_id: Option<u64>,
    /// Required language; `None` accepts all languages.
    #[serde(default = "default_lang")]
    pub require_lang: Option<String>,
    /// Require a place name or a geotag.
    #[serde(default = "default_true")]
    pub require_location: bool,
    /// Require a place name specifically (update-place reprocessing).
    #[serde(default)]
    pub require_place: bool,
    /// Merge the index down to a single segment after the final commit.
    #[serde(default)]
    pub force_merge: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            mode: IngestMode::Append,
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            max_id: None,
            require_lang: default_lang(),
            require_location: true,
            require_place: false,
            force_merge: false,
        }
    }
}

impl IngestOptions {
    #[must_use]
    pub fn builder() -> IngestOptionsBuilder {
        IngestOptionsBuilder::default()
    }

    /// Reprocessing preset: upsert every placed record regardless of language.
    #[must_use]
    pub fn update_place() -> Self {
        Self {
            mode: IngestMode::Upsert,
            require_lang: None,
            require_location: false,
            require_place: true,
            ..Self::default()
        }
    }

    /// Inclusion predicate applied after the null-text, delete-set and max-id filters.
    #[must_use]
    pub fn admits(&self, record: &Record) -> bool {
        if let Some(lang) = self.require_lang.as_deref() {
            if record.lang != lang {
                return false;
            }
        }
        if self.require_place && !record.has_place() {
            return false;
        }
        if self.require_location && !(record.has_place() || record.is_geotagged()) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptionsBuilder {
    inner: IngestOptions,
}

impl IngestOptionsBuilder {
    #[must_use]
    pub fn mode(mut self, mode: IngestMode) -> Self {
        self.inner.mode = mode;
        self
    }

    #[must_use]
    pub fn commit_interval(mut self, interval: u64) -> Self {
        self.inner.commit_interval = interval.max(1);
        self
    }

    #[must_use]
    pub fn max_id(mut self, max_id: Option<u64>) -> Self {
        self.inner.max_id = max_id;
        self
    }

    #[must_use]
    pub fn require_lang(mut self, lang: Option<String>) -> Self {
        self.inner.require_lang = lang;
        self
    }

    #[must_use]
    pub fn require_location(mut self, required: bool) -> Self {
        self.inner.require_location = required;
        self
    }

    #[must_use]
    pub fn require_place(mut self, required: bool) -> Self {
        self.inner.require_place = required;
        self
    }

    #[must_use]
    pub fn force_merge(mut self, merge: bool) -> Self {
        self.inner.force_merge = merge;
        self
    }

    #[must_use]
    pub fn build(self) -> IngestOptions {
        self.inner
    }
}

/// Vector expansion from a per-user aggregate document.
///
/// A candidate term scores `(1 + tf_target) / (1 + tf_elsewhere)` and is added only when the
/// score exceeds `threshold`. One output file is written per discount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingOptions {
    /// Region whose term frequencies form the numerator.
    pub target_region: String,
    #[serde(default = "default_discounts")]
    pub discounts: Vec<f64>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Field namespace the aggregate terms are mapped into.
    #[serde(default = "default_expansion_field")]
    pub expansion_field: RecordField,
    /// Never expand with `@mention` terms.
    #[serde(default = "default_true")]
    pub skip_mentions: bool,
}

fn default_discounts() -> Vec<f64> {
    vec![1.0]
}

fn default_threshold() -> f64 {
    DEFAULT_SMOOTHING_THRESHOLD
}

fn default_expansion_field() -> RecordField {
    RecordField::Text
}

impl SmoothingOptions {
    #[must_use]
    pub fn for_region(target_region: impl Into<String>) -> Self {
        Self {
            target_region: target_region.into(),
            discounts: default_discounts(),
            threshold: default_threshold(),
            expansion_field: default_expansion_field(),
            skip_mentions: true,
        }
    }
}

/// Tunables for one feature export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    /// Analyzed fields whose term vectors feed the dictionary.
    #[serde(default = "default_text_fields")]
    pub text_fields: Vec<RecordField>,
    /// Fields holding URLs; each contributes its normalized domain.
    #[serde(default = "default_url_fields")]
    pub url_fields: Vec<RecordField>,
    /// Free-text location fields contributed as one sanitized term each.
    #[serde(default = "default_location_fields")]
    pub location_fields: Vec<RecordField>,
    #[serde(default)]
    pub smoothing: Option<SmoothingOptions>,
}

fn default_text_fields() -> Vec<RecordField> {
    vec![RecordField::Text, RecordField::UserDescription]
}

fn default_url_fields() -> Vec<RecordField> {
    vec![RecordField::UserUrl, RecordField::OutlinkDomain]
}

fn default_location_fields() -> Vec<RecordField> {
    vec![RecordField::UserLocation]
}

impl ExportOptions {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            text_fields: default_text_fields(),
            url_fields: default_url_fields(),
            location_fields: default_location_fields(),
            smoothing: None,
        }
    }

    #[must_use]
    pub fn with_text_fields(mut self, fields: Vec<RecordField>) -> Self {
        self.text_fields = fields;
        self
    }

    #[must_use]
    pub fn with_url_fields(mut self, fields: Vec<RecordField>) -> Self {
        self.url_fields = fields;
        self
    }

    #[must_use]
    pub fn with_location_fields(mut self, fields: Vec<RecordField>) -> Self {
        self.location_fields = fields;
        self
    }

    #[must_use]
    pub fn with_smoothing(mut self, smoothing: SmoothingOptions) -> Self {
        self.smoothing = Some(smoothing);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_checks_extension_and_pattern() {
        let filter = CorpusFilter::default().with_pattern(Some("2015-12-".into()));
        assert!(filter.accepts("statuses.log.2015-12-01-00.gz"));
        assert!(!filter.accepts("statuses.log.2015-11-30-23.gz"));
        assert!(!filter.accepts("statuses.log.2015-12-01-00.json"));
        assert!(CorpusFilter::default().accepts("anything.gz"));
        assert!(!CorpusFilter::default().accepts("gz"));
    }

    #[test]
    fn empty_pattern_means_no_pattern() {
        let filter = CorpusFilter::default()
            .with_extension(".zst")
            .with_pattern(Some(String::new()));
        assert!(filter.pattern.is_none());
        assert!(filter.accepts("block-1.zst"));
    }

    #[test]
    fn default_predicate_wants_english_with_location() {
        let options = IngestOptions::default();
        let mut record = Record {
            lang: "en".into(),
            text: Some("hi".into()),
            ..Record::default()
        };
        assert!(!options.admits(&record));

        record.place = Some("Pittsburgh, PA".into());
        assert!(options.admits(&record));

        record.place = None;
        record.longitude = -79.9;
        record.latitude = 40.4;
        assert!(options.admits(&record));

        record.lang = "fr".into();
        assert!(!options.admits(&record));
    }

    #[test]
    fn update_place_preset_ignores_language() {
        let options = IngestOptions::update_place();
        let record = Record {
            lang: "und".into(),
            place: Some("Chicago, IL".into()),
            ..Record::default()
        };
        assert_eq!(options.mode, IngestMode::Upsert);
        assert!(options.admits(&record));
        assert!(!options.admits(&Record::default()));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: IngestOptions = serde_json::from_str(r#"{"max_id": 99}"#).unwrap();
        assert_eq!(opts.commit_interval, DEFAULT_COMMIT_INTERVAL);
        assert_eq!(opts.require_lang.as_deref(), Some("en"));
        assert_eq!(opts.max_id, Some(99));

        let export: ExportOptions = serde_json::from_str(r#"{"output_dir": "out"}"#).unwrap();
        assert_eq!(
            export.text_fields,
            vec![RecordField::Text, RecordField::UserDescription]
        );
        assert!(export.smoothing.is_none());
    }
}
