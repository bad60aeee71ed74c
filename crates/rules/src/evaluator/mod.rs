//! Criteria evaluation against a single killmail.
//!
//! Evaluation is a pure walk of a [`CompiledCriteria`] tree. It never fails on
//! bad data: missing fields and invalid nodes are simply false. The only way
//! an evaluation does not produce a result is running past its deadline.

mod composition;


use std::time::Instant;

use killwatch_core::{KillmailFact, LeafId};

use crate::criteria::CompiledCriteria;

use composition::Walker;

/// Outcome of evaluating one criteria tree against one killmail.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub matched: bool,
    /// Weighted share of leaves that support the match, in `[0, 1]`.
    /// Always 0 when `matched` is false.
    pub confidence: f64,
    /// Leaves whose outcome supports the match, in depth-first order.
    pub matched_leaves: Vec<LeafId>,
}

impl Evaluation {
    fn no_match() -> Self {
        Self {
            matched: false,
            confidence: 0.0,
            matched_leaves: Vec::new(),
        }
    }
}

/// The evaluation ran past its deadline and was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("criteria evaluation exceeded its deadline after {visited} nodes")]
pub struct DeadlineExceeded {
    pub visited: usize,
}

/// Evaluate `criteria` against `fact` with no time limit.
pub fn evaluate(criteria: &CompiledCriteria, fact: &KillmailFact) -> Evaluation {
    evaluate_with_deadline(criteria, fact, None).unwrap_or_else(|_| Evaluation::no_match())
}

/// Evaluate `criteria` against `fact`, giving up once `deadline` has passed.
///
/// The deadline is checked before every node, so a tree is abandoned at most
/// one leaf late.
pub fn evaluate_with_deadline(
    criteria: &CompiledCriteria,
    fact: &KillmailFact,
    deadline: Option<Instant>,
) -> Result<Evaluation, DeadlineExceeded> {
    if !criteria.is_matchable() {
        return Ok(Evaluation::no_match());
    }

    let mut walker = Walker::new(fact, deadline);
    let root = walker.node(&criteria.root, false)?;
    if !root {
        return Ok(Evaluation::no_match());
    }

    let confidence = if criteria.total_weight > 0.0 {
        (walker.satisfied_weight / criteria.total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(Evaluation {
        matched: true,
        confidence,
        matched_leaves: walker.satisfied,
    })
}
