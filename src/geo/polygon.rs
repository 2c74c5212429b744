//! Ring conditioning for readers that already know a footprint's corners.

use std::f64::consts::PI;

use super::geometry::{Position, Ring, close_ring};

/// Longitude magnitude beyond which a vertex counts as sitting next to the antimeridian.
const DATELINE_PROXIMITY: f64 = 175.0;

/// Condition corner coordinates into a closed, counter-clockwise ring.
///
/// Consecutive duplicates are removed, clockwise rings are reordered around their centroid,
/// and the ring is closed. Rings straddling the antimeridian are shifted by 180° while being
/// reordered so the winding test sees a contiguous shape. Returns `None` when fewer than
/// three distinct corners remain.
pub fn condition_polygon(corners: &[Position]) -> Option<Ring> {
    let mut ring: Ring = corners.to_vec();
    ring.dedup();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        return None;
    }

    let straddles = straddles_antimeridian(&ring);
    if straddles {
        ring = shift_half_turn(ring);
    }
    if !is_counter_clockwise(&ring) {
        ring = sort_counter_clockwise(ring);
    }
    if straddles {
        ring = shift_half_turn(ring);
    }

    Some(close_ring(ring))
}

fn straddles_antimeridian(ring: &[Position]) -> bool {
    let near: Vec<f64> = ring
        .iter()
        .map(Position::lon)
        .filter(|lon| lon.abs() >= DATELINE_PROXIMITY)
        .collect();
    near.iter().any(|lon| *lon > 0.0) && near.iter().any(|lon| *lon < 0.0)
}

fn shift_half_turn(ring: Ring) -> Ring {
    ring.into_iter()
        .map(|position| {
            let lon = if position.lon() < 0.0 {
                position.lon() + 180.0
            } else {
                position.lon() - 180.0
            };
            Position::new(lon, position.lat())
        })
        .collect()
}

/// Shoelace signed area; positive for counter-clockwise winding.
fn is_counter_clockwise(ring: &[Position]) -> bool {
    let signed_area: f64 = ring
        .iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(a, b)| a.lon() * b.lat() - b.lon() * a.lat())
        .sum();
    signed_area > 0.0
}

fn sort_counter_clockwise(ring: Ring) -> Ring {
    let count = ring.len() as f64;
    let center_lon = ring.iter().map(Position::lon).sum::<f64>() / count;
    let center_lat = ring.iter().map(Position::lat).sum::<f64>() / count;

    let reference = {
        let first = ring[0];
        (first.lat() - center_lat).atan2(first.lon() - center_lon)
    };

    let mut keyed: Vec<(f64, f64, Position)> = ring
        .into_iter()
        .map(|position| {
            let du = position.lon() - center_lon;
            let dv = position.lat() - center_lat;
            // Angle swept counter-clockwise from the first vertex, in [0, 2π).
            let angle = (dv.atan2(du) - reference).rem_euclid(2.0 * PI);
            (angle, du.hypot(dv), position)
        })
        .collect();

    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(b.1.total_cmp(&a.1)));
    keyed.into_iter().map(|(_, _, position)| position).collect()
}
