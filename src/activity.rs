//! Per-author posting activity related to one region.
//!
//! A message counts as related when it is geotagged near the region center, its place
//! polygon starts near the center, its place or its author's location names the region,
//! or its text mentions the city. Only authors with at least one related message are kept.

use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::constants::REGION_RADIUS;
use crate::context::ShutdownSignal;
use crate::corpus::CorpusStream;
use crate::error::Result;
use crate::normalize::{RawEnvelope, parse_envelope};
use crate::types::Region;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserActivity {
    /// Author's lifetime status count, as reported by the latest related message.
    pub statuses_count: u64,
    pub related_posts: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RegionalActivity {
    pub users: BTreeMap<u64, UserActivity>,
    pub scanned: u64,
    pub related: u64,
    pub undecodable: u64,
}

impl RegionalActivity {
    #[must_use]
    pub fn get(&self, user_id: u64) -> Option<UserActivity> {
        self.users.get(&user_id).copied()
    }

    /// `user_id=statuses_count related_posts` lines, ordered by user id.
    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        for (user_id, activity) in &self.users {
            writeln!(
                out,
                "{user_id}={} {}",
                activity.statuses_count, activity.related_posts
            )?;
        }
        out.flush()
    }
}

fn near(value: f64, center: f64) -> bool {
    (value - center).abs() < REGION_RADIUS
}

pub struct ActivityScan {
    region: Region,
}

impl ActivityScan {
    #[must_use]
    pub fn new(region: Region) -> Self {
        Self { region }
    }

    pub(crate) fn is_related(&self, envelope: &RawEnvelope) -> bool {
        let region = &self.region;
        let near_center =
            |(lon, lat): (f64, f64)| near(lon, region.longitude) && near(lat, region.latitude);

        if envelope.point().is_some_and(near_center) {
            return true;
        }
        if let Some(place) = envelope.place.as_ref() {
            if place
                .full_name
                .as_deref()
                .is_some_and(|name| name.contains(region.name.as_str()))
            {
                return true;
            }
            if place.first_corner().is_some_and(near_center) {
                return true;
            }
        }
        if envelope
            .user
            .as_ref()
            .and_then(|user| user.location.as_deref())
            .is_some_and(|location| location.contains(region.name.as_str()))
        {
            return true;
        }
        envelope
            .text
            .as_deref()
            .is_some_and(|text| text.contains(region.short_name()))
    }

    /// Scans the raw envelopes of `stream` until it is exhausted or `shutdown` is raised.
    pub fn run(
        &self,
        stream: &mut CorpusStream,
        shutdown: Option<&ShutdownSignal>,
    ) -> Result<RegionalActivity> {
        let mut activity = RegionalActivity::default();
        while let Some(raw) = stream.next_raw()? {
            if shutdown.is_some_and(ShutdownSignal::is_raised) {
                tracing::warn!(target = "geocorpus::corpus", "shutdown requested; stopping scan");
                break;
            }
            let envelope = match parse_envelope(&raw) {
                Ok(envelope) => envelope,
                Err(err) => {
                    activity.undecodable += 1;
                    tracing::warn!(target = "geocorpus::corpus", error = %err, "skipping envelope");
                    continue;
                }
            };
            if envelope.text.is_none() {
                continue;
            }
            activity.scanned += 1;
            if !self.is_related(&envelope) {
                continue;
            }
            let Some(user) = envelope.user.as_ref() else {
                continue;
            };
            let Some(user_id) = user.id else {
                continue;
            };
            activity.related += 1;
            let entry = activity.users.entry(user_id).or_default();
            entry.statuses_count = user.statuses_count.unwrap_or(0);
            entry.related_posts += 1;
        }
        tracing::info!(
            target = "geocorpus::corpus",
            region = %self.region.name,
            scanned = activity.scanned,
            related = activity.related,
            users = activity.users.len(),
            "regional activity computed"
        );
        Ok(activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan() -> ActivityScan {
        ActivityScan::new(Region::new("Pittsburgh, PA", -79.976389, 40.439722))
    }

    fn related(raw: &str) -> bool {
        scan().is_related(&parse_envelope(raw).unwrap())
    }

    #[test]
    fn every_relatedness_signal_is_recognized() {
        assert!(related(
            r#"{"text":"x","coordinates":{"coordinates":[-79.98,40.45]}}"#
        ));
        assert!(related(
            r#"{"text":"x","place":{"full_name":"Pittsburgh, PA"}}"#
        ));
        assert!(related(
            r#"{"text":"x","place":{"full_name":"Somewhere","bounding_box":{"coordinates":[[[-79.99,40.44]]]}}}"#
        ));
        assert!(related(
            r#"{"text":"x","user":{"location":"Pittsburgh, PA, USA"}}"#
        ));
        assert!(related(r#"{"text":"Back in Pittsburgh tonight"}"#));
        assert!(!related(
            r#"{"text":"x","coordinates":{"coordinates":[-74.0,40.7]},"user":{"location":"NYC"}}"#
        ));
    }

    #[test]
    fn lines_are_sorted_by_user() {
        let mut activity = RegionalActivity::default();
        activity.users.insert(
            9,
            UserActivity {
                statuses_count: 100,
                related_posts: 2,
            },
        );
        activity.users.insert(
            3,
            UserActivity {
                statuses_count: 7,
                related_posts: 1,
            },
        );
        let mut out = Vec::new();
        activity.write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "3=7 1\n9=100 2\n");
    }
}
