use std::path::Path;
use tracing::{debug, info};

use super::affinity::DirectoryAffinityCache;
use super::rules::RuleSet;
use crate::handlers::signature::{self, Signature};
use crate::handlers::{Capability, FormatCheck, HandlerRegistry, ids};

/// Resolution strategies in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// A configured rule matched and its capability accepted the file.
    ConfiguredRule,
    /// The file extension maps to a built-in capability.
    Extension,
    /// The file's leading bytes identify its format.
    ContentSignature,
    /// Another file in the same directory was already resolved.
    DirectoryAffinity,
    /// Filesystem-only fallback.
    Generic,
}

impl Strategy {
    /// Label used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfiguredRule => "rule",
            Self::Extension => "extension",
            Self::ContentSignature => "signature",
            Self::DirectoryAffinity => "directory",
            Self::Generic => "generic",
        }
    }
}

/// Outcome of a successful resolution.
#[derive(Clone)]
pub struct Selection {
    /// Capability that will read the file.
    pub capability: Capability,
    /// Strategy that produced it.
    pub strategy: Strategy,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("capability", &self.capability.id())
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Extensions with an unambiguous built-in capability.
fn extension_capability(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "nc" | "nc4" | "cdf" => Some(ids::NETCDF),
        "na" => Some(ids::NASA_AMES),
        "pp" => Some(ids::PP),
        "grb" | "grib" | "grb2" | "grib2" => Some(ids::GRIB),
        _ => None,
    }
}

fn signature_capability(signature: Signature) -> Option<&'static str> {
    match signature {
        Signature::NetCdf(_) | Signature::Hdf5 => Some(ids::NETCDF),
        Signature::Grib => Some(ids::GRIB),
        Signature::PpRecord { .. } => Some(ids::PP),
        Signature::Text {
            numeric_header: true,
        } => Some(ids::NASA_AMES),
        Signature::Text { .. } | Signature::Unknown => None,
    }
}

/// Decides which capability reads each file.
///
/// Safe to share between workers; the only mutable state is the directory-affinity cache.
#[derive(Debug)]
pub struct HandlerSelector {
    registry: HandlerRegistry,
    rules: RuleSet,
    affinity: DirectoryAffinityCache,
}

impl HandlerSelector {
    /// Selector over a registry and a configured rule set.
    pub fn new(registry: HandlerRegistry, rules: RuleSet) -> Self {
        Self {
            registry,
            rules,
            affinity: DirectoryAffinityCache::new(),
        }
    }

    /// Registry backing the selector.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Directory-affinity cache, exposed for inspection.
    pub fn affinity(&self) -> &DirectoryAffinityCache {
        &self.affinity
    }

    /// Resolve the capability for `path`.
    ///
    /// Returns `None` for paths that are missing, symbolic links, or not regular files.
    pub fn select(&self, path: &Path) -> Option<Selection> {
        let metadata = std::fs::symlink_metadata(path).ok()?;
        if !metadata.file_type().is_file() {
            debug!(path = %path.display(), "Skipping non-regular file");
            return None;
        }

        let tagged = |strategy: Strategy| move |capability: Capability| (capability, strategy);
        let resolved = self
            .by_rules(path)
            .map(tagged(Strategy::ConfiguredRule))
            .or_else(|| self.by_extension(path).map(tagged(Strategy::Extension)))
            .or_else(|| self.by_signature(path).map(tagged(Strategy::ContentSignature)))
            .or_else(|| self.affinity.recall(path).map(tagged(Strategy::DirectoryAffinity)));

        let selection = match resolved {
            Some((capability, strategy)) => {
                self.affinity.remember(path, &capability);
                Selection { capability, strategy }
            }
            None => Selection {
                capability: self.registry.generic(),
                strategy: Strategy::Generic,
            },
        };
        debug!(
            path = %path.display(),
            handler = selection.capability.id(),
            strategy = selection.strategy.as_str(),
            "Resolved handler"
        );
        Some(selection)
    }

    fn by_rules(&self, path: &Path) -> Option<Capability> {
        for rule in self.rules.candidates(path) {
            let capability = rule.capability();
            match capability.check_format(path) {
                FormatCheck::Accepted | FormatCheck::Unchecked => return Some(capability.clone()),
                FormatCheck::Rejected(reason) => {
                    info!(
                        path = %path.display(),
                        handler = capability.id(),
                        reason = %reason,
                        "Handler declined file"
                    );
                }
            }
        }
        None
    }

    fn by_extension(&self, path: &Path) -> Option<Capability> {
        extension_capability(path).and_then(|id| self.registry.get(id))
    }

    fn by_signature(&self, path: &Path) -> Option<Capability> {
        let signature = signature::sniff(path).ok()?;
        signature_capability(signature).and_then(|id| self.registry.get(id))
    }
}
