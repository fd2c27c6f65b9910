#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reverse geocoding core for the fruit map.
//!
//! [`Position`] is the coordinate value type used as the cache key and for
//! building map-service links. [`nominatim`] performs the outbound reverse
//! lookups, [`address`] turns raw responses into compact display strings,
//! and [`cache`] persists results across runs so every coordinate is looked
//! up over the network at most once.

pub mod address;
pub mod cache;
pub mod nominatim;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use cache::{CacheError, CachedLookup, ReverseCache};
pub use nominatim::{GeocodeError, NominatimClient, ReverseGeocode};

/// A geographic coordinate pair (WGS84 decimal degrees).
///
/// Positions are compared by exact bit pattern: two positions are equal iff
/// both coordinates are bit-identical `f64`s as they came from the data
/// source. There is no fuzzy or radius matching, and coordinate ranges are
/// not validated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

impl Position {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Bit patterns used for equality and ordering.
    fn bits(self) -> (u64, u64) {
        (self.lat.to_bits(), self.lon.to_bits())
    }

    /// Link to the geohack coordinate lookup service.
    ///
    /// Hemisphere letters are hardcoded to `N`/`E`; the map only covers
    /// Sweden.
    #[must_use]
    pub fn geohack_url(&self) -> String {
        format!(
            "https://geohack.toolforge.org/geohack.php?params={}_N_{}_E",
            self.lat, self.lon
        )
    }

    /// Link to the position on openstreetmap.org.
    #[must_use]
    pub fn osm_url(&self) -> String {
        format!(
            "https://www.openstreetmap.org/?mlat={}&mlon={}&zoom=15&layers=M",
            self.lat, self.lon
        )
    }

    /// Link to the position on Google Maps, satellite layer.
    #[must_use]
    pub fn gmaps_url(&self) -> String {
        format!(
            "https://www.google.com/maps?ll={lat},{lon}&q={lat},{lon}&hl=en&t=k&z=15",
            lat = self.lat,
            lon = self.lon
        )
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Position {}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bits().cmp(&other.bits())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geohack_url_uses_shortest_decimal_form() {
        let pos = Position::new(55.590_62, 13.010_96);
        assert_eq!(
            pos.geohack_url(),
            "https://geohack.toolforge.org/geohack.php?params=55.59062_N_13.01096_E"
        );
    }

    #[test]
    fn osm_and_gmaps_urls() {
        let pos = Position::new(59.0, 18.0);
        assert_eq!(
            pos.osm_url(),
            "https://www.openstreetmap.org/?mlat=59&mlon=18&zoom=15&layers=M"
        );
        assert_eq!(
            pos.gmaps_url(),
            "https://www.google.com/maps?ll=59,18&q=59,18&hl=en&t=k&z=15"
        );
    }

    #[test]
    fn equality_is_bitwise() {
        let a = Position::new(55.5, 13.0);
        let b = Position::new(55.5, 13.0);
        assert_eq!(a, b);

        let nudged = Position::new(f64::from_bits(a.lat.to_bits() + 1), a.lon);
        assert_ne!(a, nudged);
    }
}
