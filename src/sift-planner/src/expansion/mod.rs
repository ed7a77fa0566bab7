//! Index expansion.
//!
//! Unfielded terms, regexes on indexed fields and bounded ranges are
//! replaced with the concrete field/value terms the global index holds for
//! them. Lookups run concurrently on a per-call pool and are memoized by the
//! lookup term sent to the index.

mod engine;
mod memo;
mod replacement;

use common_error::SiftResult;
use log::debug;
use sift_ast::Node;

pub use engine::{Expanded, ExpansionEngine, ExpansionStats};
pub use memo::{LookupMemo, LookupOutcome, SharedLookup};
pub use replacement::{build_replacement, ReplacementLimits};

use crate::passes::{RewritePass, Transformed};

/// Index expansion pass.
#[derive(Debug, Clone)]
pub struct IndexExpansion {
    engine: ExpansionEngine,
}

impl IndexExpansion {
    /// Wrap `engine` as a pass.
    pub fn new(engine: ExpansionEngine) -> Self {
        Self { engine }
    }
}

impl RewritePass for IndexExpansion {
    fn name(&self) -> &'static str {
        "IndexExpansion"
    }

    fn description(&self) -> &'static str {
        "Replace unfielded, regex and range terms with index-derived terms"
    }

    fn apply(&self, tree: Node) -> SiftResult<Transformed> {
        let expanded = self.engine.expand(tree)?;
        debug!("Expansion finished: {:?}", expanded.stats);
        let changed = expanded.stats.resolved > 0;
        Ok(Transformed::new(expanded.tree, changed))
    }
}
