//! Delayed-marker pullup.
//!
//! Walks down from the root through subtrees that are not executable and
//! strips `Delayed` markers back to their source wherever that can make an
//! AND executable again. For a non-executable AND the children are tried in
//! three stages: error children, then partial children, then non-executable
//! children. The AND stops being repaired as soon as it becomes executable.
//!
//! Runs after negation pushdown: only leaves, functions, bounded ranges and
//! markers sit under a negation.

use common_error::SiftResult;
use log::{debug, trace};
use sift_ast::marker::{is_marker, is_marker_of, unwrap_fully};
use sift_ast::visit::{replace_slot, walk_mut};
use sift_ast::{Junction, JunctionKind, MarkerKind, MutVisitor, Node};

use super::pass::{RewritePass, Transformed};
use crate::executability::{effective_kind, Classifier, Executability, PolicySource};

/// Strip unnecessary `Delayed` markers from `tree` in place.
///
/// Returns the number of markers removed.
pub fn pull_up(tree: &mut Node, classifier: &Classifier<'_>) -> SiftResult<usize> {
    let mut puller = Puller {
        classifier,
        negated: false,
        removed: 0,
    };
    puller.visit_mut(tree)?;
    Ok(puller.removed)
}

struct Puller<'c, 'p> {
    classifier: &'c Classifier<'p>,
    negated: bool,
    removed: usize,
}

impl Puller<'_, '_> {
    fn state(&self, node: &Node) -> Option<Executability> {
        self.classifier.state(node, self.negated)
    }

    fn remove_delay(&mut self, slot: &mut Node) {
        let negated = self.negated;
        replace_slot(slot, |marker| {
            let source = unwrap_fully(marker, MarkerKind::Delayed);
            // a negated source needs its own boundary to stay a unit
            if source.as_junction().is_some() || negated {
                source.grouped()
            } else {
                source
            }
        });
        trace!("Pulled up delayed term: {}", slot);
        self.removed += 1;
    }

    fn junction_executable(&self, junction: &Junction) -> bool {
        self.classifier
            .junction_state(junction.kind, &junction.children, self.negated)
            == Some(Executability::Executable)
    }

    fn repair_conjunction(&mut self, junction: &mut Junction) -> SiftResult<()> {
        use Executability::{Error, NonExecutable, Partial};

        for stage in [Error, Partial, NonExecutable] {
            for i in 0..junction.children.len() {
                if stage != Error && self.junction_executable(junction) {
                    return Ok(());
                }
                if self.state(&junction.children[i]) == Some(stage) {
                    self.visit_mut(&mut junction.children[i])?;
                }
            }
        }
        Ok(())
    }

    fn repair_disjunction(&mut self, junction: &mut Junction) -> SiftResult<()> {
        for child in &mut junction.children {
            if self.state(child) != Some(Executability::Executable) {
                self.visit_mut(child)?;
            }
        }
        Ok(())
    }
}

impl MutVisitor for Puller<'_, '_> {
    fn visit_mut(&mut self, node: &mut Node) -> SiftResult<()> {
        if is_marker_of(node, MarkerKind::Delayed) {
            self.remove_delay(node);
            return Ok(());
        }
        if is_marker(node) {
            return Ok(());
        }
        match self.state(node) {
            Some(Executability::Executable) | None => return Ok(()),
            Some(_) => {}
        }

        match node {
            Node::Junction(junction) => match effective_kind(junction.kind, self.negated) {
                JunctionKind::And => self.repair_conjunction(junction),
                JunctionKind::Or => self.repair_disjunction(junction),
            },
            Node::Not(child) => {
                self.negated = !self.negated;
                let result = self.visit_mut(child);
                self.negated = !self.negated;
                result
            }
            _ => walk_mut(self, node),
        }
    }
}

/// Pullup pass.
#[derive(Debug, Clone)]
pub struct DelayedPullup {
    policy: PolicySource,
}

impl DelayedPullup {
    /// Create the pass with a policy source.
    pub fn new(policy: PolicySource) -> Self {
        Self { policy }
    }
}

impl RewritePass for DelayedPullup {
    fn name(&self) -> &'static str {
        "DelayedPullup"
    }

    fn description(&self) -> &'static str {
        "Remove delayed markers that keep an AND from being executable"
    }

    fn apply(&self, mut tree: Node) -> SiftResult<Transformed> {
        let policy = self.policy.resolve()?;
        let classifier = Classifier::new(policy.as_ref());
        let removed = pull_up(&mut tree, &classifier)?;
        if removed > 0 {
            debug!("Pulled up {} delayed terms", removed);
        }
        Ok(Transformed::new(tree, removed > 0))
    }
}
