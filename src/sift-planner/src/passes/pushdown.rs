//! Pushdown of partially executable terms.
//!
//! Descends into subtrees that are not executable. Inside an AND that has an
//! executable anchor, every partial child is wrapped in a `Delayed` marker so
//! it is evaluated against records instead of the index. Children in the
//! error state and the partial children of an OR are repaired recursively.

use common_error::SiftResult;
use log::{debug, trace};
use sift_ast::marker::{create, is_marker};
use sift_ast::visit::{replace_slot, walk_mut};
use sift_ast::{Junction, JunctionKind, MarkerKind, MutVisitor, Node};

use super::pass::{RewritePass, Transformed};
use crate::executability::{effective_kind, Classifier, Executability, PolicySource};

/// Delay the partially executable terms of `tree` in place.
///
/// Returns the number of markers added.
pub fn push_down(tree: &mut Node, classifier: &Classifier<'_>) -> SiftResult<usize> {
    let mut pusher = Pusher {
        classifier,
        negated: false,
        delayed: 0,
    };
    pusher.visit_mut(tree)?;
    Ok(pusher.delayed)
}

struct Pusher<'c, 'p> {
    classifier: &'c Classifier<'p>,
    negated: bool,
    delayed: usize,
}

impl Pusher<'_, '_> {
    fn state(&self, node: &Node) -> Option<Executability> {
        self.classifier.state(node, self.negated)
    }

    fn delay(&mut self, slot: &mut Node) {
        replace_slot(slot, |node| create(MarkerKind::Delayed, node));
        trace!("Delayed partial term: {}", slot);
        self.delayed += 1;
    }

    fn repair_conjunction(&mut self, junction: &mut Junction) -> SiftResult<()> {
        for child in &mut junction.children {
            if self.state(child) == Some(Executability::Error) {
                self.visit_mut(child)?;
            }
        }

        let anchored = junction
            .children
            .iter()
            .any(|child| self.state(child) == Some(Executability::Executable));
        for child in &mut junction.children {
            if self.state(child) != Some(Executability::Partial) {
                continue;
            }
            if anchored {
                self.delay(child);
            } else {
                self.visit_mut(child)?;
            }
        }
        Ok(())
    }

    fn repair_disjunction(&mut self, junction: &mut Junction) -> SiftResult<()> {
        for child in &mut junction.children {
            if matches!(
                self.state(child),
                Some(Executability::Partial | Executability::Error)
            ) {
                self.visit_mut(child)?;
            }
        }
        Ok(())
    }
}

impl MutVisitor for Pusher<'_, '_> {
    fn visit_mut(&mut self, node: &mut Node) -> SiftResult<()> {
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

/// Pushdown pass.
#[derive(Debug, Clone)]
pub struct PartialPushdown {
    policy: PolicySource,
}

impl PartialPushdown {
    /// Create the pass with a policy source.
    pub fn new(policy: PolicySource) -> Self {
        Self { policy }
    }
}

impl RewritePass for PartialPushdown {
    fn name(&self) -> &'static str {
        "PartialPushdown"
    }

    fn description(&self) -> &'static str {
        "Delay partially executable terms beside an executable anchor"
    }

    fn apply(&self, mut tree: Node) -> SiftResult<Transformed> {
        let policy = self.policy.resolve()?;
        let classifier = Classifier::new(policy.as_ref());
        let delayed = push_down(&mut tree, &classifier)?;
        if delayed > 0 {
            debug!("Delayed {} partial terms", delayed);
        }
        Ok(Transformed::new(tree, delayed > 0))
    }
}
