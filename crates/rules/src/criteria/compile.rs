//! Wire form → [`CriteriaNode`] compilation.

use serde_json::{Map, Value};

use killwatch_core::LeafId;

use super::field::{Field, FieldKind};
use super::operator::{Condition, Operand, Operator};
use super::{CompileIssue, CompiledCriteria, CriteriaNode, InvalidNode, Leaf, LogicalOperator};

const DEFAULT_WEIGHT: f64 = 1.0;

#[derive(Default)]
pub(super) struct Compiler {
    next_id: LeafId,
    leaf_count: usize,
    invalid_count: usize,
    total_weight: f64,
    issues: Vec<CompileIssue>,
}

impl Compiler {
    pub(super) fn finish(mut self, tree: &Value) -> CompiledCriteria {
        let root = self.node(tree);
        CompiledCriteria {
            root,
            leaf_count: self.leaf_count,
            invalid_count: self.invalid_count,
            total_weight: self.total_weight,
            issues: self.issues,
        }
    }

    fn node(&mut self, value: &Value) -> CriteriaNode {
        let obj = match value.as_object() {
            Some(o) => o,
            None => return self.invalid(format!("criteria node must be an object, got {}", kind_of(value))),
        };

        if let Some(condition) = obj.get("condition") {
            let rules = obj.get("rules").unwrap_or(&Value::Null);
            return self.group(condition, rules);
        }
        if obj.contains_key("field") || obj.contains_key("operator") {
            return self.leaf(obj);
        }
        // Shorthand: {"and": [...]}, {"or": [...]}, {"not": {...}}
        if obj.len() == 1 {
            if let Some((key, rules)) = obj.iter().next() {
                if parse_logical(key).is_some() {
                    return self.group(&Value::String(key.clone()), rules);
                }
            }
        }
        self.invalid("criteria node has neither `condition` nor `field`".to_string())
    }

    fn group(&mut self, condition: &Value, rules: &Value) -> CriteriaNode {
        let kind = match condition.as_str().and_then(parse_logical) {
            Some(k) => k,
            None => return self.invalid(format!("unknown group condition {}", condition)),
        };

        let children: Vec<&Value> = match rules {
            Value::Array(items) => items.iter().collect(),
            // `not` may wrap a single object directly
            Value::Object(_) if kind == LogicalOperator::Not => vec![rules],
            Value::Null => Vec::new(),
            other => {
                return self.invalid(format!("group `rules` must be an array, got {}", kind_of(other)))
            }
        };

        if children.is_empty() {
            return self.invalid(format!("empty `{}` group", logical_name(kind)));
        }
        if kind == LogicalOperator::Not && children.len() != 1 {
            return self.invalid(format!(
                "`not` takes exactly one rule, got {}",
                children.len()
            ));
        }

        let children = children.into_iter().map(|c| self.node(c)).collect();
        CriteriaNode::Combinator { kind, children }
    }

    fn leaf(&mut self, obj: &Map<String, Value>) -> CriteriaNode {
        let field_name = obj.get("field").and_then(Value::as_str).unwrap_or_default();
        let field: Field = match field_name.parse() {
            Ok(f) => f,
            Err(e) => return self.invalid(e),
        };

        let op_name = obj.get("operator").and_then(Value::as_str).unwrap_or_default();
        let operator: Operator = match op_name.parse() {
            Ok(o) => o,
            Err(e) => return self.invalid(format!("{} on field '{}'", e, field)),
        };

        let value = obj
            .get("value")
            .or_else(|| obj.get("values"))
            .unwrap_or(&Value::Null);
        let condition = match build_condition(field, operator, value) {
            Ok(c) => c,
            Err(e) => return self.invalid(format!("{} {}: {}", field, operator, e)),
        };

        let id = self.take_id();
        let weight = match obj.get("weight") {
            None | Some(Value::Null) => DEFAULT_WEIGHT,
            Some(w) => match w.as_f64() {
                Some(w) if w.is_finite() && w > 0.0 => w,
                _ => {
                    self.issues.push(CompileIssue {
                        leaf: id,
                        message: format!("invalid weight {}, using {}", w, DEFAULT_WEIGHT),
                    });
                    DEFAULT_WEIGHT
                }
            },
        };

        self.leaf_count += 1;
        self.total_weight += weight;
        CriteriaNode::Leaf(Leaf {
            id,
            field,
            operator,
            condition,
            weight,
        })
    }

    fn invalid(&mut self, reason: String) -> CriteriaNode {
        let id = self.take_id();
        self.invalid_count += 1;
        self.total_weight += DEFAULT_WEIGHT;
        self.issues.push(CompileIssue {
            leaf: id,
            message: reason.clone(),
        });
        CriteriaNode::Invalid(InvalidNode { id, reason })
    }

    fn take_id(&mut self) -> LeafId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn parse_logical(s: &str) -> Option<LogicalOperator> {
    match s.to_ascii_lowercase().as_str() {
        "and" | "all" => Some(LogicalOperator::And),
        "or" | "any" => Some(LogicalOperator::Or),
        "not" => Some(LogicalOperator::Not),
        _ => None,
    }
}

fn logical_name(kind: LogicalOperator) -> &'static str {
    match kind {
        LogicalOperator::And => "and",
        LogicalOperator::Or => "or",
        LogicalOperator::Not => "not",
    }
}

fn build_condition(field: Field, op: Operator, value: &Value) -> Result<Condition, String> {
    if field.kind() == FieldKind::Flag {
        return match op {
            Operator::Equals => Ok(Condition::Equals(Operand::Flag(as_flag(value)?))),
            Operator::NotEquals => Ok(Condition::NotEquals(Operand::Flag(as_flag(value)?))),
            other => Err(format!("operator not supported on a flag field ({})", other)),
        };
    }

    match op {
        Operator::Equals => Ok(Condition::Equals(Operand::Number(as_number(value)?))),
        Operator::NotEquals => Ok(Condition::NotEquals(Operand::Number(as_number(value)?))),
        Operator::GreaterThan => Ok(Condition::GreaterThan(as_number(value)?)),
        Operator::LessThan => Ok(Condition::LessThan(as_number(value)?)),
        Operator::InSet => Ok(Condition::InSet(as_number_set(value)?)),
        Operator::NotInSet => Ok(Condition::NotInSet(as_number_set(value)?)),
        Operator::Range => {
            let (min, max) = as_range(value)?;
            Ok(Condition::Range { min, max })
        }
    }
}

fn as_number(value: &Value) -> Result<f64, String> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(format!("expected a number, got {}", value)),
    }
}

fn as_flag(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(format!("expected a boolean, got {}", value)),
    }
}

fn as_number_set(value: &Value) -> Result<Vec<f64>, String> {
    match value {
        Value::Array(items) => items.iter().map(as_number).collect(),
        // A lone scalar is a one-element set.
        other => as_number(other).map(|n| vec![n]),
    }
}

fn as_range(value: &Value) -> Result<(f64, f64), String> {
    let (min, max) = match value {
        Value::Array(items) if items.len() == 2 => (as_number(&items[0])?, as_number(&items[1])?),
        Value::Object(obj) => (
            as_number(obj.get("min").unwrap_or(&Value::Null))?,
            as_number(obj.get("max").unwrap_or(&Value::Null))?,
        ),
        other => return Err(format!("expected [min, max] or {{min, max}}, got {}", other)),
    };
    if min > max {
        return Err(format!("range min {} exceeds max {}", min, max));
    }
    Ok((min, max))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
