//! GeoJSON-ordered geometry values.

use serde::{Deserialize, Serialize};

/// A single `(lon, lat)` position, serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position(pub f64, pub f64);

impl Position {
    /// Build a position from longitude and latitude.
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self(lon, lat)
    }

    /// Longitude in degrees.
    pub const fn lon(&self) -> f64 {
        self.0
    }

    /// Latitude in degrees.
    pub const fn lat(&self) -> f64 {
        self.1
    }
}

/// Closed sequence of positions; the first position repeats as the last.
pub type Ring = Vec<Position>;

/// Geometry stored in a record's `spatial.geometries` block.
///
/// Serializes as `{"type": "...", "coordinates": ...}` with longitude first in every pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// Stationary observation.
    Point(Position),
    /// Ordered track of positions.
    LineString(Vec<Position>),
    /// Single closed outer ring.
    Polygon(Vec<Ring>),
    /// Union of polygons, each holding one closed outer ring.
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// Axis-aligned rectangle between two longitudes and two latitudes.
    ///
    /// The ring runs `(right, top) -> (left, top) -> (left, bottom) -> (right, bottom)` and
    /// closes back on `(right, top)`. `lon_left` may exceed `lon_right` when the rectangle
    /// crosses the antimeridian.
    pub fn rectangle(lon_left: f64, lon_right: f64, lat_bottom: f64, lat_top: f64) -> Self {
        Self::Polygon(vec![rectangle_ring(lon_left, lon_right, lat_bottom, lat_top)])
    }

    /// Polygon from an outer ring, closing it when necessary.
    pub fn polygon(ring: Ring) -> Self {
        Self::Polygon(vec![close_ring(ring)])
    }
}

pub(crate) fn rectangle_ring(lon_left: f64, lon_right: f64, lat_bottom: f64, lat_top: f64) -> Ring {
    vec![
        Position::new(lon_right, lat_top),
        Position::new(lon_left, lat_top),
        Position::new(lon_left, lat_bottom),
        Position::new(lon_right, lat_bottom),
        Position::new(lon_right, lat_top),
    ]
}

pub(crate) fn close_ring(mut ring: Ring) -> Ring {
    let needs_closing = match (ring.first(), ring.last()) {
        (Some(first), Some(last)) => ring.len() == 1 || first != last,
        _ => false,
    };
    if needs_closing {
        ring.push(ring[0]);
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rectangle_ring_is_closed_with_five_points() {
        let Geometry::Polygon(rings) = Geometry::rectangle(-10.0, 20.0, 30.0, 40.0) else {
            panic!("rectangle should be a polygon");
        };
        assert_eq!(rings.len(), 1);
        let ring = &rings[0];
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        assert_eq!(ring[1], Position::new(-10.0, 40.0));
        assert_eq!(ring[2], Position::new(-10.0, 30.0));
    }

    #[test]
    fn polygon_closes_open_rings_once() {
        let open = vec![
            Position::new(1.0, 1.0),
            Position::new(2.0, 1.0),
            Position::new(2.0, 2.0),
        ];
        let Geometry::Polygon(rings) = Geometry::polygon(open.clone()) else {
            panic!("expected polygon");
        };
        assert_eq!(rings[0].len(), 4);

        let Geometry::Polygon(again) = Geometry::polygon(rings[0].clone()) else {
            panic!("expected polygon");
        };
        assert_eq!(again[0].len(), 4);
    }

    #[test]
    fn serializes_with_longitude_first() {
        let point = Geometry::Point(Position::new(-3.5, 51.25));
        assert_eq!(
            serde_json::to_value(&point).expect("serialize point"),
            json!({ "type": "Point", "coordinates": [-3.5, 51.25] })
        );

        let track = Geometry::LineString(vec![Position::new(1.0, 2.0), Position::new(3.0, 4.0)]);
        assert_eq!(
            serde_json::to_value(&track).expect("serialize track"),
            json!({ "type": "LineString", "coordinates": [[1.0, 2.0], [3.0, 4.0]] })
        );
    }
}
