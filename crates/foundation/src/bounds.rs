use serde::{Deserialize, Serialize};

use crate::geo::{GeoPoint, wrap_lon_deg};

/// Visible rectangle of a map, in degrees.
///
/// Convention:
/// - Edges are inclusive.
/// - `west > east` means the rectangle crosses the antimeridian.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl GeoBounds {
    pub fn new(south_west: GeoPoint, north_east: GeoPoint) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Builds bounds from raw edges as reported by a web map.
    ///
    /// Web maps report unwrapped longitudes once the user pans past the
    /// antimeridian (e.g. `west = 170, east = 200`); those are wrapped here.
    /// A span of 360° or more covers every longitude.
    pub fn from_edges(south: f64, west: f64, north: f64, east: f64) -> Self {
        let (south, north) = if south <= north {
            (south, north)
        } else {
            (north, south)
        };
        let (west, east) = if (east - west).abs() >= 360.0 {
            (-180.0, 180.0)
        } else {
            (wrap_lon_deg(west), wrap_edge(east))
        };
        Self::new(GeoPoint::new(south, west), GeoPoint::new(north, east))
    }

    pub fn south(&self) -> f64 {
        self.south_west.lat
    }

    pub fn west(&self) -> f64 {
        self.south_west.lon
    }

    pub fn north(&self) -> f64 {
        self.north_east.lat
    }

    pub fn east(&self) -> f64 {
        self.north_east.lon
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west() > self.east()
    }

    pub fn contains(&self, p: GeoPoint) -> bool {
        if p.lat < self.south() || p.lat > self.north() {
            return false;
        }
        if self.crosses_antimeridian() {
            p.lon >= self.west() || p.lon <= self.east()
        } else {
            p.lon >= self.west() && p.lon <= self.east()
        }
    }

    pub fn center(&self) -> GeoPoint {
        let lat = 0.5 * (self.south() + self.north());
        let lon = if self.crosses_antimeridian() {
            wrap_lon_deg(0.5 * (self.west() + self.east() + 360.0))
        } else {
            0.5 * (self.west() + self.east())
        };
        GeoPoint::new(lat, lon)
    }
}

// `180` is a legal east edge; plain wrapping would turn it into `-180`.
fn wrap_edge(lon: f64) -> f64 {
    if lon == 180.0 { lon } else { wrap_lon_deg(lon) }
}
