//! Leaf operators and their compiled, typed conditions.

use std::fmt;
use std::str::FromStr;

use super::field::FieldValue;

/// Comparison operators accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    InSet,
    NotInSet,
    Range,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equals => write!(f, "equals"),
            Operator::NotEquals => write!(f, "not_equals"),
            Operator::GreaterThan => write!(f, "greater_than"),
            Operator::LessThan => write!(f, "less_than"),
            Operator::InSet => write!(f, "in_set"),
            Operator::NotInSet => write!(f, "not_in_set"),
            Operator::Range => write!(f, "range"),
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" | "equals" | "==" => Ok(Operator::Equals),
            "ne" | "neq" | "not_equals" | "!=" => Ok(Operator::NotEquals),
            "gt" | "greater_than" | ">" => Ok(Operator::GreaterThan),
            "lt" | "less_than" | "<" => Ok(Operator::LessThan),
            "in" | "in_set" => Ok(Operator::InSet),
            "not_in" | "nin" | "not_in_set" => Ok(Operator::NotInSet),
            "range" | "between" => Ok(Operator::Range),
            other => Err(format!("unknown operator '{}'", other)),
        }
    }
}

/// Right-hand side of an equality check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Number(f64),
    Flag(bool),
}

/// A fully typed leaf condition. One evaluation arm per variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Operand),
    NotEquals(Operand),
    GreaterThan(f64),
    LessThan(f64),
    InSet(Vec<f64>),
    NotInSet(Vec<f64>),
    /// Inclusive on both ends.
    Range { min: f64, max: f64 },
}

impl Condition {
    /// Apply the condition to an extracted field value.
    ///
    /// Id lists satisfy positive conditions when any element does, and the
    /// negated forms (`not_equals`, `not_in_set`) when no element satisfies
    /// the positive form.
    pub fn holds(&self, value: FieldValue<'_>) -> bool {
        match value {
            FieldValue::Number(x) => self.holds_number(x),
            FieldValue::Flag(b) => self.holds_flag(b),
            FieldValue::Ids(ids) => match self {
                Condition::NotEquals(op) => !ids
                    .iter()
                    .any(|&id| Condition::Equals(*op).holds_number(id as f64)),
                Condition::NotInSet(set) => !ids.iter().any(|&id| contains(set, id as f64)),
                _ => ids.iter().any(|&id| self.holds_number(id as f64)),
            },
        }
    }

    fn holds_number(&self, x: f64) -> bool {
        match self {
            Condition::Equals(Operand::Number(v)) => x == *v,
            Condition::NotEquals(Operand::Number(v)) => x != *v,
            Condition::GreaterThan(v) => x > *v,
            Condition::LessThan(v) => x < *v,
            Condition::InSet(set) => contains(set, x),
            Condition::NotInSet(set) => !contains(set, x),
            Condition::Range { min, max } => *min <= x && x <= *max,
            Condition::Equals(Operand::Flag(_)) | Condition::NotEquals(Operand::Flag(_)) => false,
        }
    }

    fn holds_flag(&self, b: bool) -> bool {
        match self {
            Condition::Equals(Operand::Flag(v)) => b == *v,
            Condition::NotEquals(Operand::Flag(v)) => b != *v,
            _ => false,
        }
    }
}

fn contains(set: &[f64], x: f64) -> bool {
    set.iter().any(|v| *v == x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_spellings() {
        assert_eq!("gt".parse::<Operator>().unwrap(), Operator::GreaterThan);
        assert_eq!("in".parse::<Operator>().unwrap(), Operator::InSet);
        assert_eq!("nin".parse::<Operator>().unwrap(), Operator::NotInSet);
        assert_eq!("between".parse::<Operator>().unwrap(), Operator::Range);
        assert!("contains".parse::<Operator>().is_err());
    }

    #[test]
    fn numeric_comparisons() {
        let v = FieldValue::Number(250_000_000.0);
        assert!(Condition::GreaterThan(100_000_000.0).holds(v));
        assert!(!Condition::LessThan(100_000_000.0).holds(v));
        assert!(!Condition::GreaterThan(250_000_000.0).holds(v));
        assert!(Condition::Range {
            min: 250_000_000.0,
            max: 300_000_000.0
        }
        .holds(v));
    }

    #[test]
    fn set_membership_scalar() {
        let set = vec![30000142.0, 30002187.0];
        assert!(Condition::InSet(set.clone()).holds(FieldValue::Number(30000142.0)));
        assert!(!Condition::InSet(set.clone()).holds(FieldValue::Number(30000144.0)));
        assert!(Condition::NotInSet(set).holds(FieldValue::Number(30000144.0)));
    }

    #[test]
    fn id_lists_any_and_none() {
        let ids = [99000001_i64, 99000002];
        let value = FieldValue::Ids(&ids);
        assert!(Condition::Equals(Operand::Number(99000002.0)).holds(value));
        assert!(!Condition::NotEquals(Operand::Number(99000002.0)).holds(value));
        assert!(Condition::NotEquals(Operand::Number(1.0)).holds(value));
        assert!(Condition::InSet(vec![5.0, 99000001.0]).holds(value));
        assert!(!Condition::NotInSet(vec![5.0, 99000001.0]).holds(value));
        assert!(Condition::NotInSet(vec![5.0]).holds(value));
    }

    #[test]
    fn flags_only_support_equality() {
        assert!(Condition::Equals(Operand::Flag(true)).holds(FieldValue::Flag(true)));
        assert!(Condition::NotEquals(Operand::Flag(true)).holds(FieldValue::Flag(false)));
        assert!(!Condition::GreaterThan(0.0).holds(FieldValue::Flag(true)));
        assert!(!Condition::Equals(Operand::Flag(true)).holds(FieldValue::Number(1.0)));
    }
}
