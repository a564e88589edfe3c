use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::sql::executor::{evaluate, resolve_column, ColumnLabel, Executor, ResultSet};
use crate::sql::parser::ast::{AggregateFunc, ColumnRef, Expression};
use crate::sql::types::{Row, Value};
use crate::storage::catalog::Catalog;

/// GROUP BY / aggregation executor. Also projects the select list: every
/// item is either a grouped column or an aggregate call, so the output
/// columns are fully determined here.
pub struct Aggregate {
    source: Box<dyn Executor>,
    items: Vec<(Expression, Option<String>)>,
    group_by: Vec<ColumnRef>,
}

impl Aggregate {
    pub fn new(
        source: Box<dyn Executor>,
        items: Vec<(Expression, Option<String>)>,
        group_by: Vec<ColumnRef>,
    ) -> Box<Self> {
        Box::new(Self {
            source,
            items,
            group_by,
        })
    }
}

impl Executor for Aggregate {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        let (columns, rows) = super::source_rows(self.source.execute(catalog)?)?;

        let mut group_indices = Vec::with_capacity(self.group_by.len());
        for column in &self.group_by {
            group_indices.push(resolve_column(&columns, column)?);
        }

        // Validate the select list and fix the output labels up front.
        let mut labels = Vec::with_capacity(self.items.len());
        let mut outputs = Vec::with_capacity(self.items.len());
        for (expr, alias) in &self.items {
            let (name, output) = match expr {
                Expression::Aggregate { func, arg } => {
                    (expr.to_string(), Output::Aggregate(*func, arg.clone()))
                }
                Expression::Column(column) => {
                    let index = resolve_column(&columns, column)?;
                    if !group_indices.contains(&index) {
                        return Err(Error::Semantic(format!(
                            "column {} must appear in the GROUP BY clause or be used in \
                             an aggregate function",
                            column
                        )));
                    }
                    (columns[index].name.clone(), Output::Group(index))
                }
                other if other.contains_aggregate() => {
                    return Err(Error::Semantic(
                        "aggregate functions cannot be nested in expressions".into(),
                    ))
                }
                other => {
                    return Err(Error::Semantic(format!(
                        "select item {} must be a grouped column or an aggregate function",
                        other
                    )))
                }
            };
            labels.push(ColumnLabel {
                table: None,
                name: alias.clone().unwrap_or(name),
            });
            outputs.push(output);
        }

        // Partition rows by group key, first-seen order. Without GROUP BY
        // the whole input is one group, even when it is empty.
        let mut groups: Vec<(Vec<Value>, Vec<Row>)> = Vec::new();
        if self.group_by.is_empty() {
            groups.push((Vec::new(), rows));
        } else {
            for row in rows {
                let key: Vec<Value> =
                    group_indices.iter().map(|i| row[*i].clone()).collect();
                match groups.iter().position(|(k, _)| *k == key) {
                    Some(i) => groups[i].1.push(row),
                    None => groups.push((key, vec![row])),
                }
            }
        }

        let mut out_rows = Vec::with_capacity(groups.len());
        for (_, members) in &groups {
            let mut out = Vec::with_capacity(outputs.len());
            for output in &outputs {
                out.push(match output {
                    Output::Group(index) => members
                        .first()
                        .map(|row| row[*index].clone())
                        .unwrap_or(Value::Null),
                    Output::Aggregate(func, arg) => match arg {
                        // count(*) counts rows, nulls included.
                        None => Value::Integer(members.len() as i64),
                        Some(expr) => {
                            let mut values = Vec::with_capacity(members.len());
                            for row in members {
                                values.push(evaluate(expr, &columns, row)?);
                            }
                            <dyn Calculator>::build(*func).calc(&values)?
                        }
                    },
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

enum Output {
    Group(usize),
    Aggregate(AggregateFunc, Option<Box<Expression>>),
}

/// One aggregate function over the evaluated argument values of a group.
/// Nulls are skipped by every calculator.
pub trait Calculator {
    fn calc(&self, values: &[Value]) -> Result<Value>;
}

impl dyn Calculator {
    pub fn build(func: AggregateFunc) -> Box<dyn Calculator> {
        match func {
            AggregateFunc::Count => Box::new(Count),
            AggregateFunc::Sum => Box::new(Sum),
            AggregateFunc::Avg => Box::new(Avg),
            AggregateFunc::Min => Box::new(Min { reverse: false }),
            AggregateFunc::Max => Box::new(Min { reverse: true }),
        }
    }
}

/// count(expr): non-null values.
pub struct Count;

impl Calculator for Count {
    fn calc(&self, values: &[Value]) -> Result<Value> {
        Ok(Value::Integer(
            values.iter().filter(|v| !v.is_null()).count() as i64,
        ))
    }
}

/// sum(expr): INT stays INT while every input is an integer, otherwise
/// FLOAT. An empty (or all-null) input sums to NULL.
pub struct Sum;

impl Calculator for Sum {
    fn calc(&self, values: &[Value]) -> Result<Value> {
        let mut int_sum: i64 = 0;
        let mut float_sum: f64 = 0.0;
        let mut seen = false;
        let mut float = false;
        for value in values {
            match value {
                Value::Null => continue,
                Value::Integer(i) => {
                    int_sum += i;
                    float_sum += *i as f64;
                }
                Value::Float(f) => {
                    float = true;
                    float_sum += f;
                }
                other => {
                    return Err(Error::Type(format!(
                        "cannot sum non-numeric value {}",
                        other
                    )))
                }
            }
            seen = true;
        }
        Ok(match (seen, float) {
            (false, _) => Value::Null,
            (true, false) => Value::Integer(int_sum),
            (true, true) => Value::Float(float_sum),
        })
    }
}

/// avg(expr): sum over count, always FLOAT, NULL over an empty input.
pub struct Avg;

impl Calculator for Avg {
    fn calc(&self, values: &[Value]) -> Result<Value> {
        let count = values.iter().filter(|v| !v.is_null()).count();
        if count == 0 {
            return Ok(Value::Null);
        }
        let sum = Sum.calc(values)?;
        Ok(match sum {
            Value::Integer(i) => Value::Float(i as f64 / count as f64),
            Value::Float(f) => Value::Float(f / count as f64),
            _ => Value::Null,
        })
    }
}

/// min(expr) / max(expr) over any comparable values; mixing incomparable
/// types is a type error.
pub struct Min {
    reverse: bool,
}

impl Calculator for Min {
    fn calc(&self, values: &[Value]) -> Result<Value> {
        let mut best: Option<&Value> = None;
        for value in values {
            if value.is_null() {
                continue;
            }
            match best {
                None => best = Some(value),
                Some(current) => match value.compare(current) {
                    Some(Ordering::Less) if !self.reverse => best = Some(value),
                    Some(Ordering::Greater) if self.reverse => best = Some(value),
                    Some(_) => {}
                    None => {
                        return Err(Error::Type(format!(
                            "cannot compare {} with {}",
                            value, current
                        )))
                    }
                },
            }
        }
        Ok(best.cloned().unwrap_or(Value::Null))
    }
}
