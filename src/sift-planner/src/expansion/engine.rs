//! The concurrent expansion engine.
//!
//! Expansion runs in two sweeps over the tree:
//!
//! 1. **Submission**: every eligible term is swapped for a `Future`
//!    placeholder and its lookup is submitted to a [`LookupPool`] created for
//!    this call. Terms needing the same index scan share one lookup through
//!    the [`LookupMemo`]. Range bounds on an indexed field are paired up
//!    first, so `F >= a && F < b` is looked up as one range.
//! 2. **Join**: placeholders are visited in submission order. Each one waits
//!    for its lookup (bounded by the configured timeout), builds its
//!    replacement and is spliced out of the tree.
//!
//! The pool is dropped on every exit path, which cancels whatever is still
//! outstanding. A fatal error discards the whole attempt.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use common_config::{ExpansionConfig, SiftConfig};
use common_error::{SiftError, SiftResult};
use common_runtime::LookupPool;
use log::{debug, error, trace, warn};
use sift_ast::marker::{find_instance, marked_range_bounds, range_bounds};
use sift_ast::visit::{replace_slot, walk_mut};
use sift_ast::{
    CompareOp, FutureNode, JunctionKind, Leaf, MarkerKind, MutVisitor, Node, NO_FIELD,
};
use sift_metadata::{IndexLookupService, LookupError, LookupTerm, MetadataService, RangeBound};

use super::memo::LookupMemo;
use super::replacement::{build_replacement, ReplacementLimits};

/// Counters for one expansion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionStats {
    /// Placeholders created.
    pub submitted: usize,
    /// Distinct lookups sent to the index.
    pub lookups_issued: usize,
    /// Placeholders replaced from a lookup answer.
    pub resolved: usize,
    /// Placeholders left unexpanded because their lookup was malformed.
    pub malformed: usize,
}

/// The expanded tree and what it took to build it.
#[derive(Debug, Clone)]
pub struct Expanded {
    /// Tree with every placeholder resolved.
    pub tree: Node,
    /// Counters.
    pub stats: ExpansionStats,
}

/// Replaces index-resolvable terms with what the index holds for them.
#[derive(Clone)]
pub struct ExpansionEngine {
    config: ExpansionConfig,
    datatype_filter: BTreeSet<String>,
    metadata: Arc<dyn MetadataService>,
    index: Arc<dyn IndexLookupService>,
}

impl std::fmt::Debug for ExpansionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpansionEngine")
            .field("config", &self.config)
            .field("datatype_filter", &self.datatype_filter)
            .finish_non_exhaustive()
    }
}

impl ExpansionEngine {
    /// Create an engine.
    pub fn new(
        config: &SiftConfig,
        metadata: Arc<dyn MetadataService>,
        index: Arc<dyn IndexLookupService>,
    ) -> Self {
        Self {
            config: config.expansion.clone(),
            datatype_filter: config.datatype_filter.clone(),
            metadata,
            index,
        }
    }

    /// Expand `tree`.
    ///
    /// Must be called from a synchronous context: the engine blocks on its
    /// own runtime.
    pub fn expand(&self, mut tree: Node) -> SiftResult<Expanded> {
        let indexed = self.metadata.indexed_fields(&self.datatype_filter)?;
        let pool = LookupPool::new("expansion", self.config.lookup_threads)?;
        let memo = LookupMemo::new();

        let mut submitter = Submitter {
            config: &self.config,
            indexed: &indexed,
            index: &self.index,
            pool: &pool,
            memo: &memo,
            negated: false,
            terms: Vec::new(),
        };
        submitter.visit_mut(&mut tree)?;
        let terms = submitter.terms;

        let mut stats = ExpansionStats {
            submitted: terms.len(),
            lookups_issued: memo.issued(),
            ..ExpansionStats::default()
        };
        debug!(
            "Submitted {} placeholders backed by {} lookups",
            stats.submitted, stats.lookups_issued
        );

        if stats.submitted > 0 {
            let composites = self.metadata.composite_fields(&self.datatype_filter)?;
            let mut resolver = Resolver {
                pool: &pool,
                memo: &memo,
                terms: &terms,
                composites: &composites,
                limits: ReplacementLimits::from(&self.config),
                timeout: self.config.lookup_timeout(),
                stats: &mut stats,
            };
            resolver.visit_mut(&mut tree)?;
        }
        pool.shutdown();

        if only_unresolved(&tree) {
            let subtree = tree.to_string();
            error!("No index entries for any term of {}", subtree);
            return Err(SiftError::no_expansion_match(subtree));
        }
        Ok(Expanded { tree, stats })
    }
}

/// Whether every field left in `tree` is one the index could not resolve.
fn only_unresolved(tree: &Node) -> bool {
    let fields = tree.fields();
    !fields.is_empty() && fields.iter().all(|field| *field == NO_FIELD)
}

// ============================================================================
// Submission
// ============================================================================

/// What to submit for an eligible term.
struct Submission {
    term: LookupTerm,
    ignore_composites: bool,
    keep_original: bool,
}

struct Submitter<'a> {
    config: &'a ExpansionConfig,
    indexed: &'a BTreeSet<String>,
    index: &'a Arc<dyn IndexLookupService>,
    pool: &'a LookupPool,
    memo: &'a LookupMemo,
    negated: bool,
    /// Lookup term of each placeholder, indexed by placeholder id.
    terms: Vec<LookupTerm>,
}

impl Submitter<'_> {
    fn leaf_submission(&self, leaf: &Leaf) -> Option<Submission> {
        if !matches!(
            leaf.op,
            CompareOp::Eq | CompareOp::Ne | CompareOp::Er | CompareOp::Nr
        ) {
            return None;
        }
        let value = leaf.literal.as_text()?;

        if leaf.is_unfielded() {
            let negative = leaf.op.is_negative() || self.negated;
            if !self.config.expand_fields || (negative && !self.config.expand_unfielded_negations)
            {
                return None;
            }
            return Some(Submission {
                term: LookupTerm::Unfielded {
                    value,
                    regex: leaf.op.is_regex(),
                },
                ignore_composites: true,
                keep_original: false,
            });
        }

        if leaf.op.is_regex() && self.config.expand_values && self.indexed.contains(&leaf.field) {
            return Some(Submission {
                term: LookupTerm::Regex {
                    field: leaf.field.clone(),
                    pattern: value,
                },
                ignore_composites: true,
                keep_original: self.config.keep_original_terms,
            });
        }
        None
    }

    fn expands_range_on(&self, field: &str) -> bool {
        self.config.expand_values && self.indexed.contains(field)
    }

    fn range_submission(&self, node: &Node) -> Option<Submission> {
        let bounds = marked_range_bounds(node)?;
        if !self.expands_range_on(&bounds.lower.field) {
            return None;
        }
        let bound = |leaf: &Leaf| RangeBound {
            value: leaf.literal.clone(),
            inclusive: matches!(leaf.op, CompareOp::Ge | CompareOp::Le),
        };
        Some(Submission {
            term: LookupTerm::Range {
                field: bounds.lower.field.clone(),
                lower: bound(bounds.lower),
                upper: bound(bounds.upper),
            },
            ignore_composites: false,
            keep_original: self.config.keep_original_terms,
        })
    }

    /// Pull one lower and one upper bound per expandable field out of an
    /// AND's children into their own two-child range, in place of the first
    /// bound. Fields with several bounds on one side are left alone.
    fn pair_range_bounds(&self, children: &mut Vec<Node>) {
        if children.len() <= 2 {
            return;
        }
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for (i, child) in children.iter().enumerate() {
            let Some(lower) = child.as_leaf().filter(|leaf| leaf.op.is_lower_bound()) else {
                continue;
            };
            if !self.expands_range_on(&lower.field) {
                continue;
            }
            let on_field = |bound: fn(CompareOp) -> bool| {
                children
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| {
                        c.as_leaf()
                            .is_some_and(|l| l.field == lower.field && bound(l.op))
                    })
                    .map(|(j, _)| j)
                    .collect::<Vec<_>>()
            };
            if let ([_], [upper]) = (
                on_field(CompareOp::is_lower_bound).as_slice(),
                on_field(CompareOp::is_upper_bound).as_slice(),
            ) {
                pairs.push((i, *upper));
            }
        }
        if pairs.is_empty() {
            return;
        }

        let mut slots: Vec<Option<Node>> = children.drain(..).map(Some).collect();
        for &(lower, upper) in &pairs {
            if let (Some(low), Some(high)) = (slots[lower].take(), slots[upper].take()) {
                let first = lower.min(upper);
                let (a, b) = if lower < upper { (low, high) } else { (high, low) };
                slots[first] = Some(Node::and(vec![a, b]));
            }
        }
        children.extend(slots.into_iter().flatten());
    }

    fn submit(&mut self, slot: &mut Node, submission: Submission) -> SiftResult<()> {
        let term = submission.term;
        self.memo.submit(&term, self.index, self.pool)?;

        let id = self.terms.len();
        let key = term.to_string();
        self.terms.push(term);
        let negated = self.negated;
        replace_slot(slot, |original| {
            Node::Future(FutureNode {
                id,
                key,
                original: Box::new(original),
                negated,
                ignore_composites: submission.ignore_composites,
                keep_original: submission.keep_original,
                resolved: None,
            })
        });
        Ok(())
    }
}

impl MutVisitor for Submitter<'_> {
    fn visit_mut(&mut self, node: &mut Node) -> SiftResult<()> {
        // other markers and their sources are left alone
        if let Some(bounded) = find_instance(node).map(|i| i.is(MarkerKind::BoundedRange)) {
            return match self.range_submission(node).filter(|_| bounded) {
                Some(submission) => self.submit(node, submission),
                None => Ok(()),
            };
        }

        if range_bounds(node).is_some() {
            if let Some(submission) = self.range_submission(node) {
                return self.submit(node, submission);
            }
        }

        match node {
            Node::Leaf(leaf) => match self.leaf_submission(leaf) {
                Some(submission) => self.submit(node, submission),
                None => Ok(()),
            },
            Node::Junction(junction) if junction.kind == JunctionKind::And => {
                self.pair_range_bounds(&mut junction.children);
                walk_mut(self, node)
            }
            Node::Not(child) => {
                self.negated = !self.negated;
                let result = self.visit_mut(child);
                self.negated = !self.negated;
                result
            }
            Node::Function(_) => Ok(()),
            _ => walk_mut(self, node),
        }
    }
}

// ============================================================================
// Join barrier
// ============================================================================

struct Resolver<'a> {
    pool: &'a LookupPool,
    memo: &'a LookupMemo,
    terms: &'a [LookupTerm],
    composites: &'a BTreeSet<String>,
    limits: ReplacementLimits,
    timeout: Duration,
    stats: &'a mut ExpansionStats,
}

impl Resolver<'_> {
    fn resolve(&mut self, future: &FutureNode) -> SiftResult<Node> {
        let lookup = self
            .terms
            .get(future.id)
            .and_then(|term| self.memo.get(term))
            .ok_or_else(|| SiftError::internal(format!("no lookup submitted for {}", future.key)))?;
        let subtree = future.original.to_string();

        let Some(outcome) = self.pool.block_on_timeout(lookup, self.timeout)? else {
            error!("Lookup for {} timed out after {:?}", subtree, self.timeout);
            return Err(SiftError::lookup_timeout(
                format!("index lookup exceeded {} ms", self.timeout.as_millis()),
                subtree,
            ));
        };

        match outcome {
            Ok(matches) => {
                self.stats.resolved += 1;
                let replacement =
                    build_replacement(future, &matches, self.composites, self.limits);
                trace!(
                    "Expanded {}{} into {}",
                    if future.negated { "negated " } else { "" },
                    subtree,
                    replacement
                );
                Ok(replacement)
            }
            Err(LookupError::MalformedRange(msg)) => {
                warn!("Leaving {} unexpanded: {}", subtree, msg);
                self.stats.malformed += 1;
                Ok(future.original.as_ref().clone())
            }
            Err(e) => {
                error!("Lookup for {} failed: {}", subtree, e);
                Err(e.into_error(subtree))
            }
        }
    }
}

impl MutVisitor for Resolver<'_> {
    fn visit_mut(&mut self, node: &mut Node) -> SiftResult<()> {
        if let Node::Future(future) = node {
            let replacement = self.resolve(future)?;
            future.resolved = Some(Box::new(replacement));
            replace_slot(node, |placeholder| match placeholder {
                Node::Future(future) => match future.resolved {
                    Some(resolved) => *resolved,
                    None => *future.original,
                },
                other => other,
            });
            return Ok(());
        }
        walk_mut(self, node)
    }
}
