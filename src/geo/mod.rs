//! Geospatial summarization.
//!
//! Readers hand over raw, possibly masked or corrupt coordinate sequences. This module turns
//! them into the two geometries stored with every record: a `search` geometry indexed as a
//! `geo_shape`, and a lighter `display` geometry for rendering a footprint.
//!
//! - [`sanitize`] drops out-of-range, masked, and fill-value coordinate pairs.
//! - [`bounds`] computes scalar bounds, treating longitude as a 360° ring so that coverage
//!   straddling the antimeridian gets the tightest east-west span.
//! - [`summarize`] builds point, track, swath, or polygon geometries from a shape hint.

mod bounds;
mod geometry;
mod polygon;
mod sanitize;
mod summary;

pub use bounds::bounds;
pub use geometry::{Geometry, Position, Ring};
pub use polygon::condition_polygon;
pub use sanitize::{SanitizePolicy, sanitize, sanitize_with, unmasked};
pub use summary::{ShapeHint, SpatialSummary, TRACK_SAMPLE_CAP, summarize, summarize_with};
