//! Selectors and attribute predicate expressions.

use serde::{Deserialize, Serialize};

use common_error::{ScellaError, ScellaResult};

use crate::entity::{Entity, EntityId};
use crate::value::Value;

/// Comparison and logical operators for attribute predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equality.
    Eq,
    /// Inequality.
    Neq,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Neq => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Attribute predicate expression over entity metadata.
///
/// Resolved by explicit pattern matching against entity attributes; the
/// same tree renders to SQL for pushdown into the query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrExpr {
    /// Attribute reference by name.
    Attr(String),
    /// Literal value.
    Literal(Value),
    /// Binary operation.
    Binary {
        /// Left operand.
        left: Box<AttrExpr>,
        /// Operator.
        op: CompareOp,
        /// Right operand.
        right: Box<AttrExpr>,
    },
}

/// Create an attribute reference expression.
pub fn attr(name: impl Into<String>) -> AttrExpr {
    AttrExpr::Attr(name.into())
}

/// Create a literal expression.
pub fn lit(value: impl Into<Value>) -> AttrExpr {
    AttrExpr::Literal(value.into())
}

impl AttrExpr {
    fn binary(left: AttrExpr, op: CompareOp, right: AttrExpr) -> Self {
        Self::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Equality comparison.
    pub fn eq(self, other: AttrExpr) -> Self {
        Self::binary(self, CompareOp::Eq, other)
    }

    /// Inequality comparison.
    pub fn neq(self, other: AttrExpr) -> Self {
        Self::binary(self, CompareOp::Neq, other)
    }

    /// Less than comparison.
    pub fn lt(self, other: AttrExpr) -> Self {
        Self::binary(self, CompareOp::Lt, other)
    }

    /// Less than or equal comparison.
    pub fn lte(self, other: AttrExpr) -> Self {
        Self::binary(self, CompareOp::Lte, other)
    }

    /// Greater than comparison.
    pub fn gt(self, other: AttrExpr) -> Self {
        Self::binary(self, CompareOp::Gt, other)
    }

    /// Greater than or equal comparison.
    pub fn gte(self, other: AttrExpr) -> Self {
        Self::binary(self, CompareOp::Gte, other)
    }

    /// Logical AND.
    pub fn and(self, other: AttrExpr) -> Self {
        Self::binary(self, CompareOp::And, other)
    }

    /// Logical OR.
    pub fn or(self, other: AttrExpr) -> Self {
        Self::binary(self, CompareOp::Or, other)
    }

    /// Collect the attribute names referenced by this expression.
    pub fn referenced_attrs(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_attrs(&mut names);
        names
    }

    fn collect_attrs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Attr(name) => out.push(name),
            Self::Literal(_) => {}
            Self::Binary { left, right, .. } => {
                left.collect_attrs(out);
                right.collect_attrs(out);
            }
        }
    }

    /// Evaluate this expression against an entity's attributes.
    ///
    /// `known_attr` reports whether an attribute name exists anywhere on
    /// the axis; referencing an unknown attribute is a
    /// `SelectorResolution` error, while an attribute that is known but
    /// absent on this entity evaluates to Null.
    pub fn evaluate(
        &self,
        entity: &Entity,
        known_attr: &dyn Fn(&str) -> bool,
    ) -> ScellaResult<Value> {
        match self {
            Self::Attr(name) => {
                if !known_attr(name) {
                    return Err(ScellaError::selector(format!(
                        "unknown attribute '{name}'"
                    )));
                }
                Ok(entity.attr(name).cloned().unwrap_or(Value::Null))
            }
            Self::Literal(v) => Ok(v.clone()),
            Self::Binary { left, op, right } => {
                let l = left.evaluate(entity, known_attr)?;
                let r = right.evaluate(entity, known_attr)?;
                Ok(Value::Bool(Self::apply_op(*op, &l, &r)))
            }
        }
    }

    fn apply_op(op: CompareOp, l: &Value, r: &Value) -> bool {
        use std::cmp::Ordering;
        match op {
            CompareOp::And => l.as_bool().unwrap_or(false) && r.as_bool().unwrap_or(false),
            CompareOp::Or => l.as_bool().unwrap_or(false) || r.as_bool().unwrap_or(false),
            CompareOp::Eq => l.compare(r) == Some(Ordering::Equal),
            CompareOp::Neq => matches!(
                l.compare(r),
                Some(Ordering::Less) | Some(Ordering::Greater)
            ),
            CompareOp::Lt => l.compare(r) == Some(Ordering::Less),
            CompareOp::Lte => matches!(l.compare(r), Some(Ordering::Less | Ordering::Equal)),
            CompareOp::Gt => l.compare(r) == Some(Ordering::Greater),
            CompareOp::Gte => matches!(l.compare(r), Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

impl std::fmt::Display for AttrExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attr(name) => write!(f, "{name}"),
            Self::Literal(Value::String(s)) => write!(f, "'{s}'"),
            Self::Literal(v) => write!(f, "{v}"),
            Self::Binary { left, op, right } => write!(f, "({left} {op} {right})"),
        }
    }
}

/// Selector over row or column entities.
///
/// Immutable value object; never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Selector {
    /// Every entity on the axis.
    #[default]
    All,
    /// An explicit, ordered set of identifiers. Order is preserved
    /// through extraction.
    ByIds(Vec<EntityId>),
    /// Entities whose metadata satisfies a predicate.
    ByAttr(AttrExpr),
}

impl Selector {
    /// Create a `ByIds` selector, deduplicating while preserving the
    /// caller's order.
    pub fn by_ids<I: IntoIterator<Item = EntityId>>(ids: I) -> Self {
        let mut seen = std::collections::HashSet::new();
        let ids = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        Self::ByIds(ids)
    }

    /// Whether this selector includes every entity.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}
