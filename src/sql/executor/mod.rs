use std::cmp::Ordering;
use std::fmt::{self, Display};

use crate::error::{Error, Result};
use crate::sql::executor::agg::Aggregate;
use crate::sql::executor::join::NestedLoopJoin;
use crate::sql::executor::mutation::{Delete, Insert, Update};
use crate::sql::executor::query::{Distinct, Filter, Order, Projection, Scan};
use crate::sql::executor::schema::{CreateTable, DropTable};
use crate::sql::parser::ast::{ColumnRef, CompareOp, Consts, Expression};
use crate::sql::plan::Node;
use crate::sql::types::{Row, Value};
use crate::storage::catalog::Catalog;

mod agg;
mod join;
mod mutation;
mod query;
mod schema;

/// Executes one plan node against the catalog.
///
/// Executors consume themselves (`Box<Self>`) so a plan tree is walked
/// exactly once, each node handing its output rows to its parent.
pub trait Executor {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet>;
}

impl dyn Executor {
    /// Builds the executor tree for a plan node.
    pub fn build(node: Node) -> Box<dyn Executor> {
        match node {
            Node::CreateTable { schema } => CreateTable::new(schema),
            Node::DropTable { name } => DropTable::new(name),
            Node::Insert {
                table,
                columns,
                values,
            } => Insert::new(table, columns, values),
            Node::Update {
                table,
                assignments,
                filter,
            } => Update::new(table, assignments, filter),
            Node::Delete { table, filter } => Delete::new(table, filter),
            Node::Scan { table, alias } => Scan::new(table, alias),
            Node::NestedLoopJoin {
                left,
                right,
                kind,
                predicate,
            } => NestedLoopJoin::new(Self::build(*left), Self::build(*right), kind, predicate),
            Node::Filter { source, predicate } => Filter::new(Self::build(*source), predicate),
            Node::Aggregate {
                source,
                items,
                group_by,
            } => Aggregate::new(Self::build(*source), items, group_by),
            Node::Order {
                source,
                order_by,
                aliases,
            } => Order::new(Self::build(*source), order_by, aliases),
            Node::Projection { source, items } => Projection::new(Self::build(*source), items),
            Node::Distinct { source } => Distinct::new(Self::build(*source)),
        }
    }
}

/// Output column label. Intermediate rows keep the qualifier (table alias
/// or name) so references can resolve; the facade renders labels with
/// `Display`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLabel {
    pub table: Option<String>,
    pub name: String,
}

impl Display for ColumnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Execution result for a single statement.
#[derive(Debug, PartialEq)]
pub enum ResultSet {
    CreateTable { name: String },
    DropTable { name: String },
    Insert { table: String, count: usize },
    Update { count: usize },
    Delete { count: usize },
    Query { columns: Vec<ColumnLabel>, rows: Vec<Row> },
}

impl ResultSet {
    /// Human-readable mutation report.
    pub fn message(&self) -> String {
        match self {
            ResultSet::CreateTable { name } => format!("Table {} created", name),
            ResultSet::DropTable { name } => format!("Table {} dropped", name),
            ResultSet::Insert { table, count } => {
                format!("Inserted {} row(s) into {}", count, table)
            }
            ResultSet::Update { count } => format!("Updated {} row(s)", count),
            ResultSet::Delete { count } => format!("Deleted {} row(s)", count),
            ResultSet::Query { rows, .. } => format!("Selected {} row(s)", rows.len()),
        }
    }

    /// Rows touched by a mutation; `None` for queries.
    pub fn affected_rows(&self) -> Option<usize> {
        match self {
            ResultSet::CreateTable { .. } | ResultSet::DropTable { .. } => Some(0),
            ResultSet::Insert { count, .. }
            | ResultSet::Update { count }
            | ResultSet::Delete { count } => Some(*count),
            ResultSet::Query { .. } => None,
        }
    }
}

/// Unpacks the row-producing result a query operator expects from its
/// source node.
pub(crate) fn source_rows(result: ResultSet) -> Result<(Vec<ColumnLabel>, Vec<Row>)> {
    match result {
        ResultSet::Query { columns, rows } => Ok((columns, rows)),
        other => Err(Error::Semantic(format!(
            "unexpected result set {:?} from plan source",
            other
        ))),
    }
}

/// Resolves a column reference in a labeled scope.
///
/// Qualified references need qualifier and name to match; unqualified ones
/// must match exactly one label or the reference is ambiguous.
pub fn resolve_column(labels: &[ColumnLabel], column: &ColumnRef) -> Result<usize> {
    match &column.qualifier {
        Some(qualifier) => labels
            .iter()
            .position(|l| {
                l.table
                    .as_ref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(qualifier))
                    && l.name.eq_ignore_ascii_case(&column.name)
            })
            .ok_or_else(|| Error::Semantic(format!("unknown column {}", column))),
        None => {
            let mut matches = labels
                .iter()
                .enumerate()
                .filter(|(_, l)| l.name.eq_ignore_ascii_case(&column.name));
            match (matches.next(), matches.next()) {
                (Some((i, _)), None) => Ok(i),
                (Some(_), Some(_)) => {
                    Err(Error::Semantic(format!("ambiguous column {}", column)))
                }
                (None, _) => Err(Error::Semantic(format!("unknown column {}", column))),
            }
        }
    }
}

/// Evaluates an expression against one labeled row.
pub fn evaluate(expr: &Expression, labels: &[ColumnLabel], row: &Row) -> Result<Value> {
    Ok(match expr {
        Expression::Consts(c) => match c {
            Consts::Null => Value::Null,
            Consts::Boolean(b) => Value::Boolean(*b),
            Consts::Integer(i) => Value::Integer(*i),
            Consts::Float(f) => Value::Float(*f),
            Consts::String(s) => Value::String(s.clone()),
        },
        Expression::Column(column) => row[resolve_column(labels, column)?].clone(),
        Expression::Aggregate { func, .. } => {
            return Err(Error::Semantic(format!(
                "aggregate function {} is not allowed here",
                func
            )))
        }
        Expression::Compare { op, lhs, rhs } => {
            let lhs = evaluate(lhs, labels, row)?;
            let rhs = evaluate(rhs, labels, row)?;
            Value::Boolean(compare(&lhs, op, &rhs))
        }
        Expression::And(lhs, rhs) => {
            let lhs = truthy(evaluate(lhs, labels, row)?)?;
            let rhs = truthy(evaluate(rhs, labels, row)?)?;
            Value::Boolean(lhs && rhs)
        }
        Expression::Or(lhs, rhs) => {
            let lhs = truthy(evaluate(lhs, labels, row)?)?;
            let rhs = truthy(evaluate(rhs, labels, row)?)?;
            Value::Boolean(lhs || rhs)
        }
        Expression::IsNull { expr, negated } => {
            let value = evaluate(expr, labels, row)?;
            Value::Boolean(value.is_null() != *negated)
        }
    })
}

/// Evaluates a predicate to its two-valued outcome. A null result counts
/// as false; a non-boolean result is a type error.
pub fn evaluate_predicate(
    expr: &Expression,
    labels: &[ColumnLabel],
    row: &Row,
) -> Result<bool> {
    truthy(evaluate(expr, labels, row)?)
}

/// Two-valued comparison: any null operand is false, incomparable types
/// are false, everything else follows the natural / numeric order.
fn compare(lhs: &Value, op: &CompareOp, rhs: &Value) -> bool {
    if lhs.is_null() || rhs.is_null() {
        return false;
    }
    match lhs.compare(rhs) {
        Some(ordering) => match op {
            CompareOp::Equal => ordering == Ordering::Equal,
            CompareOp::NotEqual => ordering != Ordering::Equal,
            CompareOp::LessThan => ordering == Ordering::Less,
            CompareOp::LessThanOrEqual => ordering != Ordering::Greater,
            CompareOp::GreaterThan => ordering == Ordering::Greater,
            CompareOp::GreaterThanOrEqual => ordering != Ordering::Less,
        },
        None => false,
    }
}

fn truthy(value: Value) -> Result<bool> {
    match value {
        Value::Boolean(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(Error::Type(format!(
            "predicate evaluated to non-boolean value {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{evaluate_predicate, resolve_column, ColumnLabel};
    use crate::error::{Error, Result};
    use crate::sql::parser::ast::{ColumnRef, CompareOp, Consts, Expression};
    use crate::sql::types::Value;

    fn labels() -> Vec<ColumnLabel> {
        vec![
            ColumnLabel {
                table: Some("u".into()),
                name: "id".into(),
            },
            ColumnLabel {
                table: Some("o".into()),
                name: "id".into(),
            },
            ColumnLabel {
                table: Some("o".into()),
                name: "total".into(),
            },
        ]
    }

    #[test]
    fn test_resolution() -> Result<()> {
        let labels = labels();
        let qualified = ColumnRef {
            qualifier: Some("o".into()),
            name: "ID".into(),
        };
        assert_eq!(resolve_column(&labels, &qualified)?, 1);

        let unique = ColumnRef {
            qualifier: None,
            name: "total".into(),
        };
        assert_eq!(resolve_column(&labels, &unique)?, 2);

        let ambiguous = ColumnRef {
            qualifier: None,
            name: "id".into(),
        };
        match resolve_column(&labels, &ambiguous) {
            Err(Error::Semantic(msg)) => assert!(msg.contains("ambiguous")),
            other => panic!("expected ambiguity error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_null_comparisons_are_false() -> Result<()> {
        let labels = labels();
        let row = vec![Value::Null, Value::Integer(1), Value::Integer(2)];
        let eq_null = Expression::Compare {
            op: CompareOp::Equal,
            lhs: Box::new(Expression::Column(ColumnRef {
                qualifier: Some("u".into()),
                name: "id".into(),
            })),
            rhs: Box::new(Consts::Null.into()),
        };
        assert!(!evaluate_predicate(&eq_null, &labels, &row)?);

        let is_null = Expression::IsNull {
            expr: Box::new(Expression::Column(ColumnRef {
                qualifier: Some("u".into()),
                name: "id".into(),
            })),
            negated: false,
        };
        assert!(evaluate_predicate(&is_null, &labels, &row)?);
        Ok(())
    }

    #[test]
    fn test_cross_type_comparison_is_false_not_an_error() -> Result<()> {
        let labels = labels();
        let row = vec![
            Value::String("a".into()),
            Value::Integer(1),
            Value::Integer(2),
        ];
        let expr = Expression::Compare {
            op: CompareOp::NotEqual,
            lhs: Box::new(Expression::Column(ColumnRef {
                qualifier: Some("u".into()),
                name: "id".into(),
            })),
            rhs: Box::new(Consts::Integer(5).into()),
        };
        assert!(!evaluate_predicate(&expr, &labels, &row)?);
        Ok(())
    }

    #[test]
    fn test_numeric_cross_compare() -> Result<()> {
        let expr = Expression::Compare {
            op: CompareOp::LessThanOrEqual,
            lhs: Box::new(Consts::Integer(2).into()),
            rhs: Box::new(Consts::Float(2.0).into()),
        };
        assert!(evaluate_predicate(&expr, &[], &vec![])?);
        Ok(())
    }
}
