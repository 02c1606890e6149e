//! Canonicalization of raw message envelopes.
//!
//! Pure mapping from one JSON envelope to a [`Record`], a delete notice, or an invalid marker.
//! Upstream data is frequently partial: absent numeric fields fall back to `0` and absent
//! coordinates to the sentinel instead of failing the envelope.

use chrono::DateTime;
use serde::Deserialize;

use crate::constants::COORDINATE_SENTINEL;
use crate::error::{CorpusError, Result};
use crate::types::{DeleteDirective, Record};

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Outcome of normalizing one envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Record(Box<Record>),
    Delete(DeleteDirective),
    Invalid(String),
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawEnvelope {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub in_reply_to_status_id: Option<u64>,
    #[serde(default)]
    pub in_reply_to_user_id: Option<u64>,
    #[serde(default)]
    pub retweeted_status: Option<Box<RawRetweet>>,
    #[serde(default)]
    pub coordinates: Option<RawPoint>,
    #[serde(default)]
    pub place: Option<RawPlace>,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub entities: Option<RawEntities>,
    #[serde(default)]
    pub delete: Option<RawDelete>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawRetweet {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub retweet_count: Option<u64>,
    #[serde(default)]
    pub user: Option<RawUser>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawPoint {
    /// GeoJSON order: `[longitude, latitude]`.
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawPlace {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub bounding_box: Option<RawBoundingBox>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawBoundingBox {
    /// Polygon rings of `[longitude, latitude]` pairs.
    #[serde(default)]
    pub coordinates: Vec<Vec<Vec<f64>>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawUser {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub followers_count: Option<u64>,
    #[serde(default)]
    pub friends_count: Option<u64>,
    #[serde(default)]
    pub statuses_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawEntities {
    #[serde(default)]
    pub urls: Vec<RawUrl>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawUrl {
    #[serde(default)]
    pub expanded_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDelete {
    #[serde(default)]
    pub status: Option<RawDeletedStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDeletedStatus {
    pub id: u64,
    #[serde(default)]
    pub user_id: Option<u64>,
}

impl RawPlace {
    /// First corner of the place polygon as `(longitude, latitude)`.
    pub(crate) fn first_corner(&self) -> Option<(f64, f64)> {
        let corner = self.bounding_box.as_ref()?.coordinates.first()?.first()?;
        match corner.as_slice() {
            [lon, lat, ..] => Some((*lon, *lat)),
            _ => None,
        }
    }
}

impl RawEnvelope {
    pub(crate) fn point(&self) -> Option<(f64, f64)> {
        match self.coordinates.as_ref()?.coordinates.as_slice() {
            [lon, lat, ..] => Some((*lon, *lat)),
            _ => None,
        }
    }

    pub(crate) fn place_name(&self) -> Option<&str> {
        self.place.as_ref()?.full_name.as_deref()
    }
}

/// Decodes the JSON of one envelope without interpreting it.
pub(crate) fn parse_envelope(raw: &str) -> Result<RawEnvelope> {
    serde_json::from_str(raw).map_err(|err| CorpusError::decode(err.to_string()))
}

/// Maps one raw envelope to its canonical form.
#[must_use]
pub fn normalize(raw: &str) -> Normalized {
    let envelope = match parse_envelope(raw) {
        Ok(envelope) => envelope,
        Err(err) => return Normalized::Invalid(err.to_string()),
    };
    normalize_envelope(envelope)
}

pub(crate) fn normalize_envelope(envelope: RawEnvelope) -> Normalized {
    if let Some(delete) = envelope.delete.as_ref() {
        return match delete.status.as_ref() {
            Some(status) => Normalized::Delete(DeleteDirective {
                id: status.id,
                user_id: status.user_id,
            }),
            None => Normalized::Invalid("delete notice without status".into()),
        };
    }

    let Some(id) = envelope.id else {
        return Normalized::Invalid("envelope carries neither a message id nor a delete".into());
    };

    let (longitude, latitude) = envelope
        .point()
        .unwrap_or((COORDINATE_SENTINEL, COORDINATE_SENTINEL));
    let epoch = envelope
        .created_at
        .as_deref()
        .and_then(|value| DateTime::parse_from_str(value, CREATED_AT_FORMAT).ok())
        .map_or(0, |ts| ts.timestamp());
    let place = envelope.place_name().map(str::to_string);

    let in_reply_to_status_id = envelope.in_reply_to_status_id.filter(|v| *v > 0);
    let in_reply_to_user_id = in_reply_to_status_id.and(envelope.in_reply_to_user_id);

    let (retweeted_status_id, retweeted_user_id, retweet_count) =
        match envelope.retweeted_status.as_deref() {
            Some(retweet) if retweet.id.unwrap_or(0) > 0 => (
                retweet.id,
                retweet.user.as_ref().and_then(|u| u.id).filter(|v| *v > 0),
                retweet.retweet_count.filter(|v| *v > 0),
            ),
            _ => (None, None, None),
        };

    let outlink_domains = envelope
        .entities
        .map(|entities| {
            entities
                .urls
                .into_iter()
                .filter_map(|u| u.expanded_url.or(u.url))
                .filter(|u| !u.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let user = envelope.user.unwrap_or_default();

    Normalized::Record(Box::new(Record {
        id,
        user_id: user.id.unwrap_or(0),
        screen_name: user.screen_name.unwrap_or_default(),
        epoch,
        text: envelope.text,
        lang: envelope.lang.unwrap_or_else(|| "unknown".to_string()),
        in_reply_to_status_id,
        in_reply_to_user_id,
        retweeted_status_id,
        retweeted_user_id,
        retweet_count,
        longitude,
        latitude,
        place,
        user_location: user.location.filter(|s| !s.is_empty()),
        user_description: user.description.filter(|s| !s.is_empty()),
        user_url: user.url.filter(|s| !s.is_empty()),
        outlink_domains,
        followers_count: user.followers_count.unwrap_or(0),
        friends_count: user.friends_count.unwrap_or(0),
        statuses_count: user.statuses_count.unwrap_or(0),
    }))
}
