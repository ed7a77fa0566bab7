//! Rewrite pass trait and trace records.
//!
//! Every pass takes ownership of the tree and hands back the tree the next
//! pass should use. A pass may return a completely different root.

use common_error::SiftResult;
use sift_ast::Node;

/// A single rewrite over a query tree.
///
/// # Contract
///
/// 1. **Equivalence**: the returned tree matches exactly the records the
///    input matched, except where the pass documents a deliberate loss
///    (pruning of branches no ingest type can satisfy).
/// 2. **No placeholders**: the returned tree contains no `Future` nodes.
/// 3. **Fatal errors propagate**: a pass never swallows a fatal error.
pub trait RewritePass: Send + Sync {
    /// Name of this pass.
    fn name(&self) -> &'static str;

    /// What this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Apply this pass, returning the (possibly new) root.
    fn apply(&self, tree: Node) -> SiftResult<Transformed>;
}

/// The result of applying a rewrite pass.
#[derive(Debug, Clone)]
pub struct Transformed {
    /// The (possibly rewritten) tree.
    pub tree: Node,
    /// Whether the pass changed the tree.
    pub changed: bool,
}

impl Transformed {
    /// The tree was changed.
    pub fn yes(tree: Node) -> Self {
        Self {
            tree,
            changed: true,
        }
    }

    /// The tree was left as it was.
    pub fn no(tree: Node) -> Self {
        Self {
            tree,
            changed: false,
        }
    }

    /// Build a result, taking `changed` from the caller.
    pub fn new(tree: Node, changed: bool) -> Self {
        Self { tree, changed }
    }
}

impl From<Node> for Transformed {
    fn from(tree: Node) -> Self {
        Self::no(tree)
    }
}

/// A trace entry for a single pass application.
#[derive(Debug, Clone)]
pub struct PassTrace {
    /// Pass that ran.
    pub pass_name: String,
    /// Rendered tree before the pass.
    pub before: String,
    /// Rendered tree after the pass.
    pub after: String,
    /// Whether the pass changed the tree.
    pub changed: bool,
}

impl PassTrace {
    /// Create a new trace entry.
    pub fn new(
        pass_name: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
        changed: bool,
    ) -> Self {
        Self {
            pass_name: pass_name.into(),
            before: before.into(),
            after: after.into(),
            changed,
        }
    }
}

/// The output of the planner.
#[derive(Debug, Clone)]
pub struct PlannedQuery {
    /// The final tree.
    pub tree: Node,
    /// Number of passes that changed the tree.
    pub passes_applied: usize,
    /// Per-pass trace, when tracing is enabled.
    pub trace: Vec<PassTrace>,
}

impl PlannedQuery {
    /// Wrap an unplanned tree.
    pub fn new(tree: Node) -> Self {
        Self {
            tree,
            passes_applied: 0,
            trace: Vec::new(),
        }
    }

    /// Format the trace as a human-readable string.
    pub fn format_trace(&self) -> String {
        let mut output = format!("Planning applied {} passes\n", self.passes_applied);

        if self.trace.is_empty() {
            output.push_str("  (no trace available)\n");
        } else {
            for (i, entry) in self.trace.iter().filter(|t| t.changed).enumerate() {
                output.push_str(&format!(
                    "\n--- Pass {} applied: {} ---\n",
                    i + 1,
                    entry.pass_name
                ));
                output.push_str("Before:\n");
                output.push_str(&entry.before);
                output.push_str("\nAfter:\n");
                output.push_str(&entry.after);
                output.push('\n');
            }
        }

        output
    }
}
