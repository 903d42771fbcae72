//! Predicate fragments and triplet queries.

use serde::{Deserialize, Serialize};

use scella_core::EntityId;

/// One planned predicate over an identifier column.
///
/// A `Range` covers a contiguous run of identifiers at O(1) predicate
/// cost; an `Enumerated` fragment lists its members explicitly and costs
/// one predicate slot per member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredicateFragment {
    /// Inclusive identifier range (`BETWEEN`-equivalent).
    Range {
        /// Lowest identifier, inclusive.
        low: EntityId,
        /// Highest identifier, inclusive.
        high: EntityId,
    },
    /// Explicit identifier list (`IN`-equivalent), capped in size by the
    /// planner.
    Enumerated(Vec<EntityId>),
}

impl PredicateFragment {
    /// Planning cost of this fragment: how many predicate slots it
    /// consumes in a query.
    pub fn cost(&self) -> usize {
        match self {
            Self::Range { .. } => 1,
            Self::Enumerated(ids) => ids.len(),
        }
    }

    /// Whether an identifier matches this fragment.
    pub fn contains(&self, id: EntityId) -> bool {
        match self {
            Self::Range { low, high } => (*low..=*high).contains(&id),
            Self::Enumerated(ids) => ids.contains(&id),
        }
    }

    /// Render this fragment as a SQL condition over `column`.
    pub fn to_sql(&self, column: &str) -> String {
        match self {
            Self::Range { low, high } => format!("{column} BETWEEN {low} AND {high}"),
            Self::Enumerated(ids) => {
                let list: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                format!("{column} IN ({})", list.join(", "))
            }
        }
    }
}

impl std::fmt::Display for PredicateFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Range { low, high } => write!(f, "Range({low}, {high})"),
            Self::Enumerated(ids) => write!(f, "Enumerated({} ids)", ids.len()),
        }
    }
}

/// Constraint over one identifier axis of a triplet query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AxisConstraint {
    /// No restriction: the full table on this axis. The predicate is
    /// omitted entirely (pushdown: never filter what is not restricted).
    #[default]
    All,
    /// Restricted to the union of the given fragments.
    Fragments(Vec<PredicateFragment>),
}

impl AxisConstraint {
    /// Total predicate cost of this constraint.
    pub fn cost(&self) -> usize {
        match self {
            Self::All => 0,
            Self::Fragments(frags) => frags.iter().map(PredicateFragment::cost).sum(),
        }
    }

    /// Whether an identifier satisfies this constraint.
    pub fn contains(&self, id: EntityId) -> bool {
        match self {
            Self::All => true,
            Self::Fragments(frags) => frags.iter().any(|f| f.contains(id)),
        }
    }

    /// Render as a SQL condition over `column`, or `None` when
    /// unrestricted.
    ///
    /// Enumerated fragments are merged into a single `IN` list; ranges
    /// stay as `BETWEEN` terms, all OR-joined.
    pub fn to_sql(&self, column: &str) -> Option<String> {
        let frags = match self {
            Self::All => return None,
            Self::Fragments(frags) if frags.is_empty() => return None,
            Self::Fragments(frags) => frags,
        };

        let mut terms = Vec::new();
        let mut enumerated: Vec<EntityId> = Vec::new();
        for frag in frags {
            match frag {
                PredicateFragment::Range { .. } => terms.push(frag.to_sql(column)),
                PredicateFragment::Enumerated(ids) => enumerated.extend_from_slice(ids),
            }
        }
        if !enumerated.is_empty() {
            terms.push(PredicateFragment::Enumerated(enumerated).to_sql(column));
        }

        Some(if terms.len() == 1 {
            terms.pop().unwrap()
        } else {
            format!("({})", terms.join(" OR "))
        })
    }
}

impl std::fmt::Display for AxisConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "*"),
            Self::Fragments(frags) => {
                let parts: Vec<String> = frags.iter().map(|fr| fr.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// One query against the triplet table: a row constraint joined with a
/// column constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EntryQuery {
    /// Constraint over row (cell) identifiers.
    pub rows: AxisConstraint,
    /// Constraint over column (gene) identifiers.
    pub cols: AxisConstraint,
}

impl EntryQuery {
    /// Create a query from two constraints.
    pub fn new(rows: AxisConstraint, cols: AxisConstraint) -> Self {
        Self { rows, cols }
    }

    /// Whether an entry's identifiers satisfy both constraints.
    pub fn matches(&self, row_id: EntityId, col_id: EntityId) -> bool {
        self.rows.contains(row_id) && self.cols.contains(col_id)
    }

    /// Short description used to attach fragment context to errors.
    pub fn describe(&self) -> String {
        format!("rows={} cols={}", self.rows, self.cols)
    }
}
