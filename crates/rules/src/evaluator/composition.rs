//! AND/OR/NOT tree walk.

use std::time::Instant;

use killwatch_core::{KillmailFact, LeafId};

use crate::criteria::{CriteriaNode, Leaf, LogicalOperator};

use super::DeadlineExceeded;

/// Recursive evaluator state for one tree and one fact.
///
/// Children are always fully visited (no short-circuit) so every leaf gets a
/// chance to contribute to confidence.
pub(super) struct Walker<'a> {
    fact: &'a KillmailFact,
    deadline: Option<Instant>,
    visited: usize,
    pub(super) satisfied: Vec<LeafId>,
    pub(super) satisfied_weight: f64,
}

impl<'a> Walker<'a> {
    pub(super) fn new(fact: &'a KillmailFact, deadline: Option<Instant>) -> Self {
        Self {
            fact,
            deadline,
            visited: 0,
            satisfied: Vec::new(),
            satisfied_weight: 0.0,
        }
    }

    /// Evaluate `node`. `negated` is true under an odd number of NOTs.
    pub(super) fn node(&mut self, node: &CriteriaNode, negated: bool) -> Result<bool, DeadlineExceeded> {
        self.tick()?;

        match node {
            CriteriaNode::Combinator { kind, children } => match kind {
                LogicalOperator::And => {
                    let mut all = true;
                    for child in children {
                        all &= self.node(child, negated)?;
                    }
                    Ok(all)
                }
                LogicalOperator::Or => {
                    let mut any = false;
                    for child in children {
                        any |= self.node(child, negated)?;
                    }
                    Ok(any)
                }
                LogicalOperator::Not => match children.first() {
                    Some(child) => Ok(!self.node(child, !negated)?),
                    None => Ok(false),
                },
            },
            CriteriaNode::Leaf(leaf) => Ok(self.leaf(leaf, negated)),
            // False in its effective polarity, so an enclosing NOT stays false.
            CriteriaNode::Invalid(_) => Ok(negated),
        }
    }

    fn leaf(&mut self, leaf: &Leaf, negated: bool) -> bool {
        let holds = leaf
            .field
            .extract(self.fact)
            .map(|value| leaf.condition.holds(value))
            .unwrap_or(false);

        if holds != negated {
            self.satisfied.push(leaf.id);
            self.satisfied_weight += leaf.weight;
        }
        holds
    }

    fn tick(&mut self) -> Result<(), DeadlineExceeded> {
        self.visited += 1;
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(DeadlineExceeded {
                visited: self.visited,
            }),
            _ => Ok(()),
        }
    }
}
