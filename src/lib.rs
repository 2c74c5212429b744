#![deny(missing_docs)]

//! Core library for geoscan, a metadata crawler for scientific data archives.

/// Environment-driven configuration management.
pub mod config;
/// Input file lists from directory walks and list files.
pub mod crawl;
/// Elasticsearch integration and the extent query language.
pub mod elasticsearch;
/// Coordinate sanitizing, bounds, and search geometries.
pub mod geo;
/// Format capabilities and their registry.
pub mod handlers;
/// Bulk index writer.
pub mod indexing;
/// Structured logging and tracing setup.
pub mod logging;
/// Per-run outcome counters.
pub mod metrics;
/// Extraction pipeline.
pub mod pipeline;
/// Metadata record model and document identity.
pub mod record;
/// Handler selection.
pub mod selection;
