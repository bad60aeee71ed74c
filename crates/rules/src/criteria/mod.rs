//! Criteria trees: the compiled, closed form of a profile's filter rules.
//!
//! Profiles carry their criteria in the loose wire form users edit
//! (`{"condition": "and", "rules": [...]}`). [`CompiledCriteria::compile`]
//! turns that into a [`CriteriaNode`] tree whose leaves are fully typed.
//! Compilation never fails: anything it cannot understand becomes an
//! [`InvalidNode`] that never holds, even under NOT, plus a [`CompileIssue`] the
//! caller can log.

mod compile;
pub mod field;
pub mod operator;

use serde::Serialize;
use tracing::warn;

use killwatch_core::{LeafId, ProfileId};

pub use field::{Field, FieldKind, FieldValue};
pub use operator::{Condition, Operand, Operator};

/// Boolean combinators for criteria groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

/// A node of a compiled criteria tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaNode {
    /// `Not` always has exactly one child; `And`/`Or` at least one.
    Combinator {
        kind: LogicalOperator,
        children: Vec<CriteriaNode>,
    },
    Leaf(Leaf),
    Invalid(InvalidNode),
}

/// A typed field condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub id: LeafId,
    pub field: Field,
    pub operator: Operator,
    pub condition: Condition,
    pub weight: f64,
}

/// A node that failed syntactic validation. False in whichever polarity it
/// sits, so negating it cannot make a tree match.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidNode {
    pub id: LeafId,
    pub reason: String,
}

/// Problem found while compiling a criteria tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileIssue {
    pub leaf: LeafId,
    pub message: String,
}

/// A compiled criteria tree plus the bookkeeping confidence scoring needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCriteria {
    pub root: CriteriaNode,
    /// Number of well-formed leaves. A tree without any never matches.
    pub leaf_count: usize,
    /// Number of nodes degraded to [`InvalidNode`].
    pub invalid_count: usize,
    /// Sum of the weights of every leaf, invalid nodes counting as 1.
    pub total_weight: f64,
    pub issues: Vec<CompileIssue>,
}

impl CompiledCriteria {
    /// Compile a wire-form criteria tree.
    pub fn compile(tree: &serde_json::Value) -> Self {
        compile::Compiler::default().finish(tree)
    }

    /// Whether this tree can ever produce a match.
    pub fn is_matchable(&self) -> bool {
        self.leaf_count > 0
    }

    /// Emit one warning per compile issue.
    pub fn log_issues(&self, profile_id: ProfileId) {
        for issue in &self.issues {
            warn!(
                profile_id,
                leaf = issue.leaf,
                issue = %issue.message,
                "criteria node degraded to non-match"
            );
        }
    }
}
