//! SQL-rendering store backend.
//!
//! The actual SQL execution engine is an external collaborator exposed
//! through [`SqlExecutor`]; this module renders predicates into SQL text
//! for it and decodes the Arrow batches it returns into triplet entries.

use async_trait::async_trait;

use arrow::array::{Array, Float32Array, Float64Array, Int64Array, UInt64Array};
use arrow::record_batch::RecordBatch;

use common_error::{ScellaError, ScellaResult};
use scella_core::{AttrExpr, Axis, EntityId, SparseEntry, Value};

use crate::predicate::EntryQuery;
use crate::store::TripletStore;

/// External query engine contract: arbitrary read-only SQL in, Arrow
/// batches out. Connection-level timeouts belong to the implementor.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a read-only SQL statement.
    async fn execute(&self, sql: &str) -> ScellaResult<Vec<RecordBatch>>;
}

/// Names of the three logical tables and their identifier columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    /// Cell (row entity) table.
    pub cells: String,
    /// Gene (column entity) table.
    pub genes: String,
    /// Sparse association table.
    pub expression: String,
    /// Row identifier column.
    pub cell_id: String,
    /// Column identifier column.
    pub gene_id: String,
    /// Value column.
    pub value: String,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            cells: "cells".to_string(),
            genes: "genes".to_string(),
            expression: "expression".to_string(),
            cell_id: "cell_id".to_string(),
            gene_id: "gene_id".to_string(),
            value: "value".to_string(),
        }
    }
}

impl TableLayout {
    fn entity_table(&self, axis: Axis) -> &str {
        match axis {
            Axis::Rows => &self.cells,
            Axis::Cols => &self.genes,
        }
    }

    fn id_column(&self, axis: Axis) -> &str {
        match axis {
            Axis::Rows => &self.cell_id,
            Axis::Cols => &self.gene_id,
        }
    }
}

/// Triplet store backed by an external SQL engine.
pub struct SqlStore<E> {
    executor: E,
    layout: TableLayout,
}

impl<E: SqlExecutor> SqlStore<E> {
    /// Create a store over an executor with the default table layout.
    pub fn new(executor: E) -> Self {
        Self::with_layout(executor, TableLayout::default())
    }

    /// Create a store with an explicit table layout.
    pub fn with_layout(executor: E, layout: TableLayout) -> Self {
        Self { executor, layout }
    }

    /// Render an entry query into SQL.
    pub fn render_entry_query(&self, query: &EntryQuery) -> String {
        let l = &self.layout;
        let mut sql = format!(
            "SELECT {}, {}, {} FROM {}",
            l.cell_id, l.gene_id, l.value, l.expression
        );
        let mut conditions = Vec::new();
        if let Some(cond) = query.rows.to_sql(&l.cell_id) {
            conditions.push(cond);
        }
        if let Some(cond) = query.cols.to_sql(&l.gene_id) {
            conditions.push(cond);
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(&format!(" ORDER BY {}, {}", l.cell_id, l.gene_id));
        sql
    }

    /// Pass-through for arbitrary read-only SQL.
    pub async fn query(&self, sql: &str) -> ScellaResult<Vec<RecordBatch>> {
        self.executor.execute(sql).await
    }
}

#[async_trait]
impl<E: SqlExecutor> TripletStore for SqlStore<E> {
    async fn all_ids(&self, axis: Axis) -> ScellaResult<Vec<EntityId>> {
        let l = &self.layout;
        let id = l.id_column(axis);
        let sql = format!("SELECT {id} FROM {} ORDER BY {id}", l.entity_table(axis));
        let batches = self.executor.execute(&sql).await?;
        decode_id_column(&batches, id)
    }

    async fn resolve_attr(&self, axis: Axis, expr: &AttrExpr) -> ScellaResult<Vec<EntityId>> {
        let l = &self.layout;
        let id = l.id_column(axis);
        let sql = format!(
            "SELECT {id} FROM {} WHERE {} ORDER BY {id}",
            l.entity_table(axis),
            attr_expr_to_sql(expr)
        );
        let batches = self.executor.execute(&sql).await?;
        decode_id_column(&batches, id)
    }

    async fn query_entries(&self, query: &EntryQuery) -> ScellaResult<Vec<SparseEntry>> {
        let sql = self.render_entry_query(query);
        let batches = self.executor.execute(&sql).await?;

        let mut entries = Vec::new();
        for batch in &batches {
            let rows = decode_ids(batch, &self.layout.cell_id)?;
            let cols = decode_ids(batch, &self.layout.gene_id)?;
            let values = decode_values(batch, &self.layout.value)?;
            for i in 0..batch.num_rows() {
                entries.push(SparseEntry::new(rows[i], cols[i], values[i]));
            }
        }
        Ok(entries)
    }
}

/// Render an attribute predicate as a SQL condition.
pub fn attr_expr_to_sql(expr: &AttrExpr) -> String {
    match expr {
        AttrExpr::Attr(name) => name.clone(),
        AttrExpr::Literal(value) => render_literal(value),
        AttrExpr::Binary { left, op, right } => {
            format!(
                "({} {} {})",
                attr_expr_to_sql(left),
                op,
                attr_expr_to_sql(right)
            )
        }
    }
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Int64(i) => i.to_string(),
        Value::Float64(f) => f.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

fn decode_id_column(batches: &[RecordBatch], column: &str) -> ScellaResult<Vec<EntityId>> {
    let mut ids = Vec::new();
    for batch in batches {
        ids.extend(decode_ids(batch, column)?);
    }
    Ok(ids)
}

fn decode_ids(batch: &RecordBatch, column: &str) -> ScellaResult<Vec<EntityId>> {
    let idx = batch.schema().index_of(column)?;
    let array = batch.column(idx);
    if let Some(u) = array.as_any().downcast_ref::<UInt64Array>() {
        Ok(u.values().to_vec())
    } else if let Some(i) = array.as_any().downcast_ref::<Int64Array>() {
        i.values()
            .iter()
            .map(|&v| {
                EntityId::try_from(v).map_err(|_| {
                    ScellaError::execution(format!(
                        "identifier column '{column}' holds negative value {v}"
                    ))
                })
            })
            .collect()
    } else {
        Err(ScellaError::execution(format!(
            "identifier column '{column}' has unsupported type {}",
            array.data_type()
        )))
    }
}

fn decode_values(batch: &RecordBatch, column: &str) -> ScellaResult<Vec<f64>> {
    let idx = batch.schema().index_of(column)?;
    let array = batch.column(idx);
    if let Some(f) = array.as_any().downcast_ref::<Float64Array>() {
        Ok(f.values().to_vec())
    } else if let Some(f) = array.as_any().downcast_ref::<Float32Array>() {
        Ok(f.values().iter().map(|v| f64::from(*v)).collect())
    } else {
        Err(ScellaError::execution(format!(
            "value column '{column}' has unsupported type {}",
            array.data_type()
        )))
    }
}
