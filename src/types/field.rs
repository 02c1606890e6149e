//! Canonical catalog of record/index field names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CorpusError;

/// How a field is laid out in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Unsigned numeric, exact and range queryable.
    Unsigned,
    /// Signed numeric (timestamps).
    Signed,
    /// Floating point coordinate, range queryable.
    Coordinate,
    /// Stored verbatim and matched as a single exact term.
    Exact,
    /// Tokenized by the message analyzer; exposes term vectors.
    Analyzed,
}

/// Every attribute a message can carry once indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Id,
    UserId,
    ScreenName,
    Epoch,
    Text,
    Lang,
    InReplyToStatusId,
    InReplyToUserId,
    RetweetedStatusId,
    RetweetedUserId,
    RetweetCount,
    Longitude,
    Latitude,
    Place,
    UserLocation,
    UserDescription,
    UserUrl,
    OutlinkDomain,
    FollowersCount,
    FriendsCount,
    StatusesCount,
    Timeline,
}

impl RecordField {
    pub const ALL: [RecordField; 22] = [
        Self::Id,
        Self::UserId,
        Self::ScreenName,
        Self::Epoch,
        Self::Text,
        Self::Lang,
        Self::InReplyToStatusId,
        Self::InReplyToUserId,
        Self::RetweetedStatusId,
        Self::RetweetedUserId,
        Self::RetweetCount,
        Self::Longitude,
        Self::Latitude,
        Self::Place,
        Self::UserLocation,
        Self::UserDescription,
        Self::UserUrl,
        Self::OutlinkDomain,
        Self::FollowersCount,
        Self::FriendsCount,
        Self::StatusesCount,
        Self::Timeline,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::UserId => "user_id",
            Self::ScreenName => "screen_name",
            Self::Epoch => "epoch",
            Self::Text => "text",
            Self::Lang => "lang",
            Self::InReplyToStatusId => "in_reply_to_status_id",
            Self::InReplyToUserId => "in_reply_to_user_id",
            Self::RetweetedStatusId => "retweeted_status_id",
            Self::RetweetedUserId => "retweeted_user_id",
            Self::RetweetCount => "retweet_count",
            Self::Longitude => "longitude",
            Self::Latitude => "latitude",
            Self::Place => "place",
            Self::UserLocation => "user_location",
            Self::UserDescription => "user_description",
            Self::UserUrl => "user_url",
            Self::OutlinkDomain => "outlink_domain",
            Self::FollowersCount => "followers_count",
            Self::FriendsCount => "friends_count",
            Self::StatusesCount => "statuses_count",
            Self::Timeline => "timeline",
        }
    }

    #[must_use]
    pub fn kind(self) -> FieldKind {
        match self {
            Self::Id
            | Self::InReplyToStatusId
            | Self::InReplyToUserId
            | Self::RetweetedStatusId
            | Self::RetweetedUserId
            | Self::RetweetCount
            | Self::FollowersCount
            | Self::FriendsCount
            | Self::StatusesCount => FieldKind::Unsigned,
            Self::Epoch => FieldKind::Signed,
            Self::Longitude | Self::Latitude => FieldKind::Coordinate,
            Self::Text | Self::UserDescription | Self::Timeline => FieldKind::Analyzed,
            Self::UserId
            | Self::ScreenName
            | Self::Lang
            | Self::Place
            | Self::UserLocation
            | Self::UserUrl
            | Self::OutlinkDomain => FieldKind::Exact,
        }
    }

    #[must_use]
    pub fn is_analyzed(self) -> bool {
        self.kind() == FieldKind::Analyzed
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecordField {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| CorpusError::UnknownField { name: s.to_string() })
    }
}
