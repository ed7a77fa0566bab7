//! The planner that runs rewrite passes over a query tree.
//!
//! Passes run once each, in order. The tree returned by one pass is the input
//! of the next; a fatal error from any pass aborts planning.

use std::collections::BTreeSet;
use std::sync::Arc;

use common_config::SiftConfig;
use common_error::{ensure, SiftResult};
use log::debug;
use sift_ast::marker::validate_registry;
use sift_ast::Node;
use sift_metadata::{IndexLookupService, MetadataService, TypeMetadata};

use super::flatten::Flatten;
use super::ingest::IngestTypePruning;
use super::large_lists::LargeListPushdown;
use super::negation::NegationPushdown;
use super::pass::{PassTrace, PlannedQuery, RewritePass};
use super::pullup::DelayedPullup;
use super::pushdown::PartialPushdown;
use super::subsumption::Subsumption;
use super::truth::TruthPruning;
use crate::executability::PolicySource;
use crate::expansion::{ExpansionEngine, IndexExpansion};

/// Configuration for the planner.
#[derive(Debug, Clone, Default)]
pub struct PlannerConfig {
    /// Whether to record the tree before and after every pass.
    pub enable_trace: bool,
}

impl PlannerConfig {
    /// Enable or disable tracing.
    #[must_use]
    pub fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }
}

/// The collaborators the standard pipeline works with.
#[derive(Clone)]
pub struct PlanningContext {
    /// Planning configuration.
    pub config: Arc<SiftConfig>,
    /// Field classifications.
    pub metadata: Arc<dyn MetadataService>,
    /// Cached ingest types, in front of `metadata`.
    pub types: Arc<TypeMetadata>,
    /// Global index.
    pub index: Arc<dyn IndexLookupService>,
}

impl PlanningContext {
    /// Build a context, putting a type cache sized by `config` in front of
    /// `metadata`.
    pub fn new(
        config: SiftConfig,
        metadata: Arc<dyn MetadataService>,
        index: Arc<dyn IndexLookupService>,
    ) -> Self {
        let types = Arc::new(TypeMetadata::new(Arc::clone(&metadata), &config.metadata));
        Self {
            config: Arc::new(config),
            metadata,
            types,
            index,
        }
    }

    fn datatype_filter(&self) -> BTreeSet<String> {
        self.config.datatype_filter.clone()
    }

    fn policy(&self) -> PolicySource {
        PolicySource::Metadata {
            service: Arc::clone(&self.metadata),
            filter: self.datatype_filter(),
        }
    }
}

/// Runs an ordered list of rewrite passes.
///
/// # Standard pipeline
///
/// 1. Flatten
/// 2. Index expansion
/// 3. Truth pruning, when `reduce_query` is set
/// 4. Large list pushdown
/// 5. Negation pushdown
/// 6. Subsumption
/// 7. Flatten
/// 8. Delayed pullup
/// 9. Partial pushdown
/// 10. Ingest-type pruning
pub struct Planner {
    passes: Vec<Box<dyn RewritePass>>,
    config: PlannerConfig,
}

impl Planner {
    /// Create a planner with the given passes.
    ///
    /// Fails if the marker registry is inconsistent.
    pub fn new(passes: Vec<Box<dyn RewritePass>>) -> SiftResult<Self> {
        Self::with_config(passes, PlannerConfig::default())
    }

    /// Create a planner with custom config.
    pub fn with_config(
        passes: Vec<Box<dyn RewritePass>>,
        config: PlannerConfig,
    ) -> SiftResult<Self> {
        validate_registry()?;
        Ok(Self { passes, config })
    }

    /// The standard pipeline over `ctx`.
    pub fn standard(config: PlannerConfig, ctx: &PlanningContext) -> SiftResult<Self> {
        let engine = ExpansionEngine::new(
            &ctx.config,
            Arc::clone(&ctx.metadata),
            Arc::clone(&ctx.index),
        );
        let mut passes: Vec<Box<dyn RewritePass>> = vec![
            Box::new(Flatten::default()),
            Box::new(IndexExpansion::new(engine)),
        ];
        if ctx.config.reduce_query {
            passes.push(Box::new(TruthPruning));
        }
        let rest: [Box<dyn RewritePass>; 7] = [
            Box::new(LargeListPushdown::new(
                ctx.config.expansion.max_or_expansion_threshold,
            )),
            Box::new(NegationPushdown),
            Box::new(Subsumption),
            Box::new(Flatten::default()),
            Box::new(DelayedPullup::new(ctx.policy())),
            Box::new(PartialPushdown::new(ctx.policy())),
            Box::new(IngestTypePruning::new(
                Arc::clone(&ctx.types),
                ctx.datatype_filter(),
            )),
        ];
        passes.extend(rest);
        Self::with_config(passes, config)
    }

    /// Add a pass to the end of the pipeline.
    pub fn add_pass<P: RewritePass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    /// Names of the passes, in order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Run every pass over `tree`.
    ///
    /// Must be called from a synchronous context.
    pub fn plan(&self, tree: Node) -> SiftResult<PlannedQuery> {
        let mut current = tree;
        let mut passes_applied = 0;
        let mut trace = Vec::new();

        for pass in &self.passes {
            let before = if self.config.enable_trace {
                Some(current.to_string())
            } else {
                None
            };

            let result = pass.apply(current)?;
            ensure!(
                !result.tree.contains_future(),
                format!("pass '{}' left a placeholder in the tree", pass.name())
            );

            if result.changed {
                passes_applied += 1;
                debug!("Pass '{}' changed the tree", pass.name());

                if self.config.enable_trace {
                    trace.push(PassTrace::new(
                        pass.name(),
                        before.unwrap_or_default(),
                        result.tree.to_string(),
                        true,
                    ));
                }
            }

            current = result.tree;
        }

        Ok(PlannedQuery {
            tree: current,
            passes_applied,
            trace,
        })
    }
}

impl std::fmt::Debug for Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner")
            .field("passes", &self.pass_names())
            .field("config", &self.config)
            .finish()
    }
}
