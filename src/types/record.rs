//! Canonical message records and their persisted index form.

use serde::{Deserialize, Serialize};

use crate::constants::COORDINATE_SENTINEL;

/// One message after canonicalization. Created per raw envelope and dropped once indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub user_id: u64,
    pub screen_name: String,
    /// Creation time, seconds since the Unix epoch.
    pub epoch: i64,
    /// `None` excludes the record from indexing.
    pub text: Option<String>,
    pub lang: String,
    pub in_reply_to_status_id: Option<u64>,
    pub in_reply_to_user_id: Option<u64>,
    pub retweeted_status_id: Option<u64>,
    pub retweeted_user_id: Option<u64>,
    pub retweet_count: Option<u64>,
    pub longitude: f64,
    pub latitude: f64,
    pub place: Option<String>,
    pub user_location: Option<String>,
    pub user_description: Option<String>,
    pub user_url: Option<String>,
    /// Expanded outlink URLs; domains are derived from these at export time.
    pub outlink_domains: Vec<String>,
    pub followers_count: u64,
    pub friends_count: u64,
    pub statuses_count: u64,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            id: 0,
            user_id: 0,
            screen_name: String::new(),
            epoch: 0,
            text: None,
            lang: String::new(),
            in_reply_to_status_id: None,
            in_reply_to_user_id: None,
            retweeted_status_id: None,
            retweeted_user_id: None,
            retweet_count: None,
            longitude: COORDINATE_SENTINEL,
            latitude: COORDINATE_SENTINEL,
            place: None,
            user_location: None,
            user_description: None,
            user_url: None,
            outlink_domains: Vec::new(),
            followers_count: 0,
            friends_count: 0,
            statuses_count: 0,
        }
    }
}

impl Record {
    /// Both coordinates differ from the sentinel.
    #[must_use]
    pub fn is_geotagged(&self) -> bool {
        self.longitude != COORDINATE_SENTINEL && self.latitude != COORDINATE_SENTINEL
    }

    #[must_use]
    pub fn has_place(&self) -> bool {
        self.place.is_some()
    }
}

/// A delete notice carried by the stream in place of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDirective {
    pub id: u64,
    pub user_id: Option<u64>,
}

/// What the corpus stream hands downstream, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Record(Box<Record>),
    Delete(DeleteDirective),
}

/// Persisted form of a [`Record`]. At most one live document exists per `id`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: u64,
    pub user_id: u64,
    pub screen_name: String,
    pub epoch: i64,
    pub text: String,
    pub lang: String,
    pub in_reply_to_status_id: Option<u64>,
    pub in_reply_to_user_id: Option<u64>,
    pub retweeted_status_id: Option<u64>,
    pub retweeted_user_id: Option<u64>,
    pub retweet_count: Option<u64>,
    /// Present only for geotagged records.
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub place: Option<String>,
    pub user_location: Option<String>,
    pub user_description: Option<String>,
    pub user_url: Option<String>,
    /// Space-joined outlink URLs.
    pub outlink_domain: Option<String>,
    pub followers_count: u64,
    pub friends_count: u64,
    pub statuses_count: u64,
    /// Accumulated historical text of the author, attached by upsert.
    pub timeline: Option<String>,
}

impl IndexDocument {
    /// Builds the persisted form; records without text are never persisted.
    #[must_use]
    pub fn from_record(record: &Record) -> Option<Self> {
        let text = record.text.clone()?;
        let (longitude, latitude) = if record.is_geotagged() {
            (Some(record.longitude), Some(record.latitude))
        } else {
            (None, None)
        };
        let urls: Vec<&str> = record
            .outlink_domains
            .iter()
            .map(String::as_str)
            .filter(|url| !url.is_empty())
            .collect();
        Some(Self {
            id: record.id,
            user_id: record.user_id,
            screen_name: record.screen_name.clone(),
            epoch: record.epoch,
            text,
            lang: record.lang.clone(),
            in_reply_to_status_id: record.in_reply_to_status_id,
            in_reply_to_user_id: record.in_reply_to_user_id,
            retweeted_status_id: record.retweeted_status_id,
            retweeted_user_id: record.retweeted_user_id,
            retweet_count: record.retweet_count,
            longitude,
            latitude,
            place: record.place.clone(),
            user_location: record.user_location.clone(),
            user_description: record.user_description.clone(),
            user_url: record.user_url.clone(),
            outlink_domain: (!urls.is_empty()).then(|| urls.join(" ")),
            followers_count: record.followers_count,
            friends_count: record.friends_count,
            statuses_count: record.statuses_count,
            timeline: None,
        })
    }

    #[must_use]
    pub fn with_timeline(mut self, timeline: impl Into<String>) -> Self {
        self.timeline = Some(timeline.into());
        self
    }

    #[must_use]
    pub fn is_geotagged(&self) -> bool {
        self.longitude.is_some() && self.latitude.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_not_geotagged() {
        let record = Record::default();
        assert!(!record.is_geotagged());
        assert!(!record.has_place());
    }

    #[test]
    fn one_missing_axis_is_not_geotagged() {
        let record = Record {
            longitude: -79.98,
            ..Record::default()
        };
        assert!(!record.is_geotagged());
    }

    #[test]
    fn null_text_is_never_persisted() {
        let record = Record {
            id: 7,
            ..Record::default()
        };
        assert!(IndexDocument::from_record(&record).is_none());
    }

    #[test]
    fn coordinates_only_persisted_when_geotagged() {
        let record = Record {
            id: 1,
            text: Some("hello".into()),
            longitude: -79.98,
            latitude: 40.45,
            outlink_domains: vec!["https://a.com/x".into(), "http://b.org".into()],
            ..Record::default()
        };
        let doc = IndexDocument::from_record(&record).unwrap();
        assert_eq!(doc.longitude, Some(-79.98));
        assert_eq!(doc.latitude, Some(40.45));
        assert_eq!(
            doc.outlink_domain.as_deref(),
            Some("https://a.com/x http://b.org")
        );

        let plain = IndexDocument::from_record(&Record {
            text: Some("hi".into()),
            ..Record::default()
        })
        .unwrap();
        assert!(!plain.is_geotagged());
        assert!(plain.outlink_domain.is_none());
    }
}
