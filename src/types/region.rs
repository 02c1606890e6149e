//! Named regions used to label matched documents.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::REGION_RADIUS;
use crate::error::{CorpusError, Result};

/// A named place: bounding-box center, canonical place name and aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Canonical place name, also the gold-standard label.
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Region {
    #[must_use]
    pub fn new(name: impl Into<String>, longitude: f64, latitude: f64) -> Self {
        Self {
            name: name.into(),
            longitude,
            latitude,
            aliases: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Inclusive `(min, max)` longitude bounds.
    #[must_use]
    pub fn longitude_bounds(&self) -> (f64, f64) {
        (self.longitude - REGION_RADIUS, self.longitude + REGION_RADIUS)
    }

    /// Inclusive `(min, max)` latitude bounds.
    #[must_use]
    pub fn latitude_bounds(&self) -> (f64, f64) {
        (self.latitude - REGION_RADIUS, self.latitude + REGION_RADIUS)
    }

    /// Bounding-box predicate, inclusive on both axes.
    #[must_use]
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        let (lon_min, lon_max) = self.longitude_bounds();
        let (lat_min, lat_max) = self.latitude_bounds();
        (lon_min..=lon_max).contains(&longitude) && (lat_min..=lat_max).contains(&latitude)
    }

    /// Canonical name followed by every alias.
    pub fn place_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Exact place-name predicate, aliases included.
    #[must_use]
    pub fn matches_place(&self, place: &str) -> bool {
        self.place_names().any(|name| name == place)
    }

    /// The city part of the canonical name (`"Pittsburgh, PA"` -> `"Pittsburgh"`).
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name
            .split_once(',')
            .map_or(self.name.as_str(), |(city, _)| city)
            .trim()
    }
}

/// The twelve US cities the collection was gathered around, in processing order.
#[must_use]
pub fn default_regions() -> Vec<Region> {
    vec![
        Region::new("Brooklyn, NY", -74.0063889, 40.7141667).with_alias("Manhattan, NY"),
        Region::new("Chicago, IL", -87.6500000, 41.8500000),
        Region::new("Los Angeles, CA", -118.253842, 34.040667),
        Region::new("Philadelphia, PA", -75.1641667, 39.9522222),
        Region::new("Washington, DC", -77.0366667, 38.8950000),
        Region::new("Houston, TX", -95.3630556, 29.7630556),
        Region::new("Minneapolis, MN", -93.2636111, 44.9800000),
        Region::new("Cincinnati, OH", -84.4569444, 39.1619444),
        Region::new("Portland, ME", -70.2558333, 43.6613889),
        Region::new("St Louis, MO", -90.197778, 38.627222),
        Region::new("Cleveland, OH", -81.669722, 41.482222),
        Region::new("Pittsburgh, PA", -79.976389, 40.439722),
    ]
}

/// Loads an ordered region table from a JSON array.
pub fn load_regions(path: &Path) -> Result<Vec<Region>> {
    let file = File::open(path).map_err(|err| {
        CorpusError::config(format!("cannot open region file {}: {err}", path.display()))
    })?;
    let regions: Vec<Region> = serde_json::from_reader(BufReader::new(file))?;
    if regions.is_empty() {
        return Err(CorpusError::config(format!(
            "region file {} lists no regions",
            path.display()
        )));
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pittsburgh() -> Region {
        default_regions()
            .into_iter()
            .find(|r| r.name == "Pittsburgh, PA")
            .unwrap()
    }

    #[test]
    fn bounding_box_is_inclusive_on_both_axes() {
        let region = Region::new("Grid", 10.0, 20.0);
        assert!(region.contains(10.049, 19.951));
        assert!(region.contains(9.95 + 0.0001, 20.0));
        assert!(!region.contains(10.0501, 20.0));
        assert!(!region.contains(10.0, 19.9));
    }

    #[test]
    fn nearby_point_is_inside_pittsburgh() {
        assert!(pittsburgh().contains(-79.98, 40.45));
        assert!(!pittsburgh().contains(-74.0, 40.71));
    }

    #[test]
    fn aliases_match_as_place_names() {
        let brooklyn = &default_regions()[0];
        assert!(brooklyn.matches_place("Brooklyn, NY"));
        assert!(brooklyn.matches_place("Manhattan, NY"));
        assert!(!brooklyn.matches_place("Queens, NY"));
    }

    #[test]
    fn short_name_drops_state() {
        assert_eq!(pittsburgh().short_name(), "Pittsburgh");
        assert_eq!(Region::new("Gotham", 0.0, 0.0).short_name(), "Gotham");
    }

    #[test]
    fn region_file_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("regions.json");
        std::fs::write(
            &path,
            r#"[{"name":"Pittsburgh, PA","longitude":-79.976389,"latitude":40.439722}]"#,
        )
        .unwrap();
        let regions = load_regions(&path).unwrap();
        assert_eq!(regions.len(), 1);
        assert!(regions[0].aliases.is_empty());

        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(
            load_regions(&path),
            Err(CorpusError::Configuration { .. })
        ));
    }
}
