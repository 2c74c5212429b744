//! Static capability registry keyed by the identifiers used in handler rules.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::{Capability, FormatHandler};
use super::{GenericHandler, GribHandler, NasaAmesHandler, NetCdfHandler, PpHandler};

/// Identifiers of the built-in capabilities.
pub mod ids {
    /// Filesystem-only capability used as the last resort.
    pub const GENERIC: &str = "generic";
    /// NetCDF classic and NetCDF-4/HDF5 containers.
    pub const NETCDF: &str = "netcdf";
    /// GRIB edition 1 and 2 messages.
    pub const GRIB: &str = "grib";
    /// Met Office PP fields.
    pub const PP: &str = "pp";
    /// NASA Ames ASCII files.
    pub const NASA_AMES: &str = "nasa-ames";
}

/// Maps capability identifiers to their implementations.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    capabilities: HashMap<String, Capability>,
}

impl HandlerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in capability.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GenericHandler));
        registry.register(Arc::new(NetCdfHandler));
        registry.register(Arc::new(GribHandler));
        registry.register(Arc::new(PpHandler));
        registry.register(Arc::new(NasaAmesHandler));
        registry
    }

    /// Add or replace a capability under its own identifier.
    pub fn register(&mut self, capability: Arc<dyn FormatHandler>) -> &mut Self {
        self.capabilities
            .insert(capability.id().to_string(), capability);
        self
    }

    /// Look up a capability by identifier.
    pub fn get(&self, id: &str) -> Option<Capability> {
        self.capabilities.get(id).cloned()
    }

    /// The generic capability, falling back to a fresh instance when it was never registered.
    pub fn generic(&self) -> Capability {
        self.get(ids::GENERIC)
            .unwrap_or_else(|| Arc::new(GenericHandler))
    }

    /// Registered identifiers in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.capabilities.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("capabilities", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{ExtractionError, RawMetadata};
    use std::path::Path;

    struct Custom;

    impl FormatHandler for Custom {
        fn id(&self) -> &str {
            "custom"
        }

        fn extract(&self, _path: &Path) -> Result<RawMetadata, ExtractionError> {
            Ok(RawMetadata::with_format("Custom"))
        }
    }

    #[test]
    fn builtin_registry_lists_every_capability() {
        let registry = HandlerRegistry::builtin();
        assert_eq!(
            registry.ids(),
            vec!["generic", "grib", "nasa-ames", "netcdf", "pp"]
        );
        assert_eq!(registry.get(ids::NETCDF).map(|c| c.id().to_string()), Some("netcdf".into()));
        assert!(registry.get("hdf4").is_none());
    }

    #[test]
    fn register_extends_the_registry() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(Custom));
        assert!(registry.get("custom").is_some());
        assert_eq!(registry.generic().id(), ids::GENERIC);
    }
}
