//! Search and display geometries built from sanitized coordinates.

use serde::{Deserialize, Serialize};

use super::bounds::bounds;
use super::geometry::{Geometry, Position, rectangle_ring};
use super::polygon::condition_polygon;
use super::sanitize::{SanitizePolicy, sanitize_with};

/// Maximum number of positions kept in a display track.
pub const TRACK_SAMPLE_CAP: usize = 30;

/// Shape a reader expects its coordinates to describe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeHint {
    /// Stationary observation.
    Point,
    /// Moving platform; indexed by its envelope.
    #[default]
    Track,
    /// Moving sensor footprint; indexed as a ribbon of rectangles along the track.
    Swath,
    /// Known footprint corners, e.g. from a product manifest.
    Polygon,
}

/// Geometries attached to a record: one for `geo_shape` search, one for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialSummary {
    /// Geometry indexed for spatial queries.
    pub search: Geometry,
    /// Lightweight geometry for rendering.
    pub display: Geometry,
}

/// Summarize coordinates with the default sanitizing policy.
pub fn summarize(
    lons: &[Option<f64>],
    lats: &[Option<f64>],
    shape: ShapeHint,
) -> Option<SpatialSummary> {
    summarize_with(lons, lats, shape, SanitizePolicy::default())
}

/// Summarize coordinates into search/display geometries.
///
/// Returns `None` when no coordinate pair survives sanitizing.
pub fn summarize_with(
    lons: &[Option<f64>],
    lats: &[Option<f64>],
    shape: ShapeHint,
    policy: SanitizePolicy,
) -> Option<SpatialSummary> {
    let (lons, lats) = sanitize_with(lons, lats, policy);
    if lons.is_empty() {
        return None;
    }

    if shape == ShapeHint::Point || lons.len() == 1 {
        let point = Geometry::Point(Position::new(lons[0], lats[0]));
        return Some(SpatialSummary {
            search: point.clone(),
            display: point,
        });
    }

    match shape {
        ShapeHint::Swath => Some(SpatialSummary {
            search: swath(&lons, &lats, TRACK_SAMPLE_CAP),
            display: track(&lons, &lats, TRACK_SAMPLE_CAP),
        }),
        ShapeHint::Polygon => {
            let corners: Vec<Position> = lons
                .iter()
                .zip(&lats)
                .map(|(lon, lat)| Position::new(*lon, *lat))
                .collect();
            match condition_polygon(&corners) {
                Some(ring) => {
                    let polygon = Geometry::polygon(ring);
                    Some(SpatialSummary {
                        search: polygon.clone(),
                        display: polygon,
                    })
                }
                None => envelope_with_track(&lons, &lats),
            }
        }
        ShapeHint::Track | ShapeHint::Point => envelope_with_track(&lons, &lats),
    }
}

fn envelope_with_track(lons: &[f64], lats: &[f64]) -> Option<SpatialSummary> {
    let (lon_left, lon_right) = bounds(lons, true)?;
    let (lat_bottom, lat_top) = bounds(lats, false)?;
    Some(SpatialSummary {
        search: Geometry::rectangle(lon_left, lon_right, lat_bottom, lat_top),
        display: track(lons, lats, TRACK_SAMPLE_CAP),
    })
}

fn sample_track(lons: &[f64], lats: &[f64], cap: usize) -> Vec<Position> {
    let count = lons.len().min(lats.len());
    let step = if count <= cap { 1 } else { count.div_ceil(cap) };
    lons.iter()
        .zip(lats)
        .step_by(step)
        .map(|(lon, lat)| Position::new(*lon, *lat))
        .collect()
}

fn track(lons: &[f64], lats: &[f64], cap: usize) -> Geometry {
    Geometry::LineString(sample_track(lons, lats, cap))
}

fn swath(lons: &[f64], lats: &[f64], segments: usize) -> Geometry {
    let samples = sample_track(lons, lats, segments + 1);
    let ribbon = samples
        .windows(2)
        .map(|pair| {
            let (lo, hi) = (pair[0], pair[1]);
            vec![rectangle_ring(lo.lon(), hi.lon(), lo.lat(), hi.lat())]
        })
        .collect();
    Geometry::MultiPolygon(ribbon)
}
