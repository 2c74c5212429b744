//! Handler selection: configured rules, built-in fallbacks, and the directory-affinity cache.

mod affinity;
mod rules;
mod selector;

pub use affinity::DirectoryAffinityCache;
pub use rules::{HandlerRule, RuleError, RuleSet, RuleSpec};
pub use selector::{HandlerSelector, Selection, Strategy};
