//! Format capabilities: the reader contract, the static registry, and built-in readers.
//!
//! A capability knows how to recognise one family of files and how to pull raw metadata out
//! of them. Selection (see [`crate::selection`]) decides which capability reads a file;
//! assembly (see [`crate::pipeline`]) turns the raw output into a
//! [`crate::record::MetadataRecord`].

mod generic;
mod grib;
mod nasa_ames;
mod netcdf;
mod pp;
mod registry;
pub(crate) mod timeref;
pub mod signature;
mod types;

pub use generic::GenericHandler;
pub use grib::GribHandler;
pub use nasa_ames::NasaAmesHandler;
pub use netcdf::NetCdfHandler;
pub use pp::PpHandler;
pub use registry::{HandlerRegistry, ids};
pub use types::{
    Capability, ExtractionError, FormatCheck, FormatHandler, RawGeospatial, RawMetadata,
};
