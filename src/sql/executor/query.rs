use std::cmp::Ordering;

use crate::error::Result;
use crate::sql::executor::{
    evaluate, evaluate_predicate, resolve_column, ColumnLabel, Executor, ResultSet,
};
use crate::sql::parser::ast::{ColumnRef, Expression, OrderDirection, SelectItem};
use crate::sql::types::{Row, Value};
use crate::storage::catalog::Catalog;

/// Table scan: the leaf of every SELECT plan. Rows come out as defensive
/// copies; queries never hand out references into the catalog.
pub struct Scan {
    table: String,
    alias: Option<String>,
}

impl Scan {
    pub fn new(table: String, alias: Option<String>) -> Box<Self> {
        Box::new(Self { table, alias })
    }
}

impl Executor for Scan {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        let table = catalog.must_get_table(&self.table)?.clone();
        let qualifier = self.alias.unwrap_or_else(|| table.name.clone());
        let columns = table
            .columns
            .iter()
            .map(|c| ColumnLabel {
                table: Some(qualifier.clone()),
                name: c.name.clone(),
            })
            .collect();
        let rows = catalog.rows(&table.name)?.to_vec();
        Ok(ResultSet::Query { columns, rows })
    }
}

/// WHERE executor: retains rows whose predicate is true.
pub struct Filter {
    source: Box<dyn Executor>,
    predicate: Expression,
}

impl Filter {
    pub fn new(source: Box<dyn Executor>, predicate: Expression) -> Box<Self> {
        Box::new(Self { source, predicate })
    }
}

impl Executor for Filter {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        let (columns, rows) = super::source_rows(self.source.execute(catalog)?)?;
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if evaluate_predicate(&self.predicate, &columns, &row)? {
                kept.push(row);
            }
        }
        Ok(ResultSet::Query {
            columns,
            rows: kept,
        })
    }
}

/// ORDER BY executor. The sort is stable and multi-key; nulls go last for
/// ascending keys and first for descending ones.
pub struct Order {
    source: Box<dyn Executor>,
    order_by: Vec<(ColumnRef, OrderDirection)>,
    aliases: Vec<(String, Expression)>,
}

enum SortKey {
    Index(usize),
    Expr(Expression),
}

impl Order {
    pub fn new(
        source: Box<dyn Executor>,
        order_by: Vec<(ColumnRef, OrderDirection)>,
        aliases: Vec<(String, Expression)>,
    ) -> Box<Self> {
        Box::new(Self {
            source,
            order_by,
            aliases,
        })
    }

    /// Resolves one sort key. Falls back to select-list aliases, and for a
    /// qualified reference over an already-projected scope (no qualifiers
    /// left) to a plain name match.
    fn resolve_key_with(
        aliases: &[(String, Expression)],
        labels: &[ColumnLabel],
        column: &ColumnRef,
    ) -> Result<SortKey> {
        let err = match resolve_column(labels, column) {
            Ok(index) => return Ok(SortKey::Index(index)),
            Err(err) => err,
        };
        if column.qualifier.is_none() {
            if let Some((_, expr)) = aliases
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(&column.name))
            {
                return Ok(SortKey::Expr(expr.clone()));
            }
        } else if labels.iter().all(|l| l.table.is_none()) {
            let unqualified = ColumnRef {
                qualifier: None,
                name: column.name.clone(),
            };
            if let Ok(index) = resolve_column(labels, &unqualified) {
                return Ok(SortKey::Index(index));
            }
        }
        Err(err)
    }
}

impl Executor for Order {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        let Order {
            source,
            order_by,
            aliases,
        } = *self;
        let (columns, rows) = super::source_rows(source.execute(catalog)?)?;

        let mut keys = Vec::with_capacity(order_by.len());
        for (column, direction) in &order_by {
            keys.push((
                Order::resolve_key_with(&aliases, &columns, column)?,
                *direction,
            ));
        }

        // Decorate each row with its key tuple, sort, undecorate.
        let mut decorated = Vec::with_capacity(rows.len());
        for row in rows {
            let mut key_values = Vec::with_capacity(keys.len());
            for (key, _) in &keys {
                key_values.push(match key {
                    SortKey::Index(i) => row[*i].clone(),
                    SortKey::Expr(expr) => evaluate(expr, &columns, &row)?,
                });
            }
            decorated.push((key_values, row));
        }

        decorated.sort_by(|(a, _), (b, _)| {
            for (i, (_, direction)) in keys.iter().enumerate() {
                let ordering = nulls_last_compare(&a[i], &b[i]);
                let ordering = match direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        Ok(ResultSet::Query {
            columns,
            rows: decorated.into_iter().map(|(_, row)| row).collect(),
        })
    }
}

/// Natural ascending order with nulls last; reversing it yields the
/// descending order with nulls first. Incomparable values tie.
fn nulls_last_compare(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

/// Projection: emits the requested columns under their output labels.
pub struct Projection {
    source: Box<dyn Executor>,
    items: Vec<SelectItem>,
}

enum Output {
    Index(usize),
    Expr(Expression),
}

impl Projection {
    pub fn new(source: Box<dyn Executor>, items: Vec<SelectItem>) -> Box<Self> {
        Box::new(Self { source, items })
    }
}

impl Executor for Projection {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        let (columns, rows) = super::source_rows(self.source.execute(catalog)?)?;

        let mut labels = Vec::new();
        let mut outputs = Vec::new();
        for item in &self.items {
            match item {
                SelectItem::Wildcard => {
                    for (i, _) in columns.iter().enumerate() {
                        labels.push(output_label(&columns, i));
                        outputs.push(Output::Index(i));
                    }
                }
                SelectItem::Expr { expr, alias } => {
                    let (label, output) = match expr {
                        Expression::Column(column) => {
                            let index = resolve_column(&columns, column)?;
                            (output_label(&columns, index), Output::Index(index))
                        }
                        other => (
                            ColumnLabel {
                                table: None,
                                name: other.to_string(),
                            },
                            Output::Expr(other.clone()),
                        ),
                    };
                    labels.push(match alias {
                        Some(alias) => ColumnLabel {
                            table: None,
                            name: alias.clone(),
                        },
                        None => label,
                    });
                    outputs.push(output);
                }
            }
        }

        let mut out_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut out = Vec::with_capacity(outputs.len());
            for output in &outputs {
                out.push(match output {
                    Output::Index(i) => row[*i].clone(),
                    Output::Expr(expr) => evaluate(expr, &columns, row)?,
                });
            }
            out_rows.push(out);
        }

        Ok(ResultSet::Query {
            columns: labels,
            rows: out_rows,
        })
    }
}

/// Output label for the column at `index`: the bare name, qualified only
/// when that name occurs more than once in the scope.
fn output_label(columns: &[ColumnLabel], index: usize) -> ColumnLabel {
    let label = &columns[index];
    let ambiguous = columns
        .iter()
        .filter(|other| other.name.eq_ignore_ascii_case(&label.name))
        .count()
        > 1;
    if ambiguous {
        label.clone()
    } else {
        ColumnLabel {
            table: None,
            name: label.name.clone(),
        }
    }
}

/// DISTINCT executor: structural row dedup, first occurrence wins, output
/// order otherwise preserved.
pub struct Distinct {
    source: Box<dyn Executor>,
}

impl Distinct {
    pub fn new(source: Box<dyn Executor>) -> Box<Self> {
        Box::new(Self { source })
    }
}

impl Executor for Distinct {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        let (columns, rows) = super::source_rows(self.source.execute(catalog)?)?;
        let mut unique: Vec<Row> = Vec::with_capacity(rows.len());
        for row in rows {
            if !unique.contains(&row) {
                unique.push(row);
            }
        }
        Ok(ResultSet::Query {
            columns,
            rows: unique,
        })
    }
}
