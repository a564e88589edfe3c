use crate::error::{Error, Result};
use crate::sql::executor::{
    evaluate, evaluate_predicate, ColumnLabel, Executor, ResultSet,
};
use crate::sql::parser::ast::Expression;
use crate::sql::schema::Table;
use crate::sql::types::{Row, Value};
use crate::storage::catalog::Catalog;

/// INSERT executor.
///
/// All-or-nothing per statement: every row is validated against the
/// existing rows plus the rows accepted earlier in the same statement, and
/// nothing is appended or persisted until the whole batch passed.
pub struct Insert {
    table: String,
    columns: Option<Vec<String>>,
    values: Vec<Vec<Expression>>,
}

impl Insert {
    pub fn new(
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Vec<Expression>>,
    ) -> Box<Self> {
        Box::new(Self {
            table,
            columns,
            values,
        })
    }
}

impl Executor for Insert {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        let table = catalog.must_get_table(&self.table)?.clone();
        let mut state = catalog.rows(&table.name)?.to_vec();
        let existing = state.len();

        for exprs in &self.values {
            let row = match &self.columns {
                None => positional_row(&table, exprs)?,
                Some(columns) => named_row(&table, columns, exprs)?,
            };
            state.push(row);
        }

        check_not_null(&table, &state)?;
        check_unique(&table, &state)?;
        check_outbound_fks(catalog, &table, &state)?;

        let count = state.len() - existing;
        catalog.append_rows(&table.name, state.split_off(existing))?;
        Ok(ResultSet::Insert {
            table: table.name,
            count,
        })
    }
}

/// Builds a row from positional values in schema order.
fn positional_row(table: &Table, exprs: &[Expression]) -> Result<Row> {
    if exprs.len() != table.columns.len() {
        return Err(Error::Semantic(format!(
            "table {} has {} columns but {} values were supplied",
            table.name,
            table.columns.len(),
            exprs.len()
        )));
    }
    exprs
        .iter()
        .zip(&table.columns)
        .map(|(expr, column)| {
            let value = evaluate(expr, &[], &Vec::new())?;
            coerce_for(value, table, &column.name)
        })
        .collect()
}

/// Builds a row from a named column list; unnamed columns become NULL.
fn named_row(table: &Table, columns: &[String], exprs: &[Expression]) -> Result<Row> {
    if exprs.len() != columns.len() {
        return Err(Error::Semantic(format!(
            "INSERT names {} columns but supplies {} values",
            columns.len(),
            exprs.len()
        )));
    }
    let mut row = vec![Value::Null; table.columns.len()];
    let mut seen = vec![false; table.columns.len()];
    for (name, expr) in columns.iter().zip(exprs) {
        let index = table.column_index(name).ok_or_else(|| {
            Error::Semantic(format!("unknown column {} in table {}", name, table.name))
        })?;
        if seen[index] {
            return Err(Error::Semantic(format!(
                "column {} named twice in INSERT",
                name
            )));
        }
        seen[index] = true;
        let value = evaluate(expr, &[], &Vec::new())?;
        row[index] = coerce_for(value, table, name)?;
    }
    Ok(row)
}

/// UPDATE executor.
///
/// SET expressions evaluate in the pre-update row, so `SET a = b, b = a`
/// swaps. The whole statement aborts before anything is applied if any
/// check on the hypothetical post-state fails.
pub struct Update {
    table: String,
    assignments: Vec<(String, Expression)>,
    filter: Option<Expression>,
}

impl Update {
    pub fn new(
        table: String,
        assignments: Vec<(String, Expression)>,
        filter: Option<Expression>,
    ) -> Box<Self> {
        Box::new(Self {
            table,
            assignments,
            filter,
        })
    }
}

impl Executor for Update {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        let table = catalog.must_get_table(&self.table)?.clone();
        let labels = table_labels(&table);
        let rows = catalog.rows(&table.name)?.to_vec();

        let mut targets = Vec::with_capacity(self.assignments.len());
        for (name, expr) in &self.assignments {
            let index = table.column_index(name).ok_or_else(|| {
                Error::Semantic(format!("unknown column {} in table {}", name, table.name))
            })?;
            targets.push((index, expr));
        }

        let mut new_rows = rows.clone();
        let mut count = 0;
        for (i, row) in rows.iter().enumerate() {
            let selected = match &self.filter {
                Some(predicate) => evaluate_predicate(predicate, &labels, row)?,
                None => true,
            };
            if !selected {
                continue;
            }
            let mut updated = row.clone();
            for (index, expr) in &targets {
                let value = evaluate(expr, &labels, row)?;
                updated[*index] = coerce_for(value, &table, &table.columns[*index].name)?;
            }
            new_rows[i] = updated;
            count += 1;
        }

        check_not_null(&table, &new_rows)?;
        check_unique(&table, &new_rows)?;
        check_outbound_fks(catalog, &table, &new_rows)?;
        check_inbound_fks(catalog, &table, &new_rows)?;

        catalog.replace_rows(&table.name, new_rows)?;
        Ok(ResultSet::Update { count })
    }
}

/// DELETE executor. Rejects the statement when a surviving row anywhere
/// still references a deleted key value.
pub struct Delete {
    table: String,
    filter: Option<Expression>,
}

impl Delete {
    pub fn new(table: String, filter: Option<Expression>) -> Box<Self> {
        Box::new(Self { table, filter })
    }
}

impl Executor for Delete {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        let table = catalog.must_get_table(&self.table)?.clone();
        let labels = table_labels(&table);
        let rows = catalog.rows(&table.name)?.to_vec();

        let mut retained = Vec::with_capacity(rows.len());
        let mut count = 0;
        for row in rows {
            let selected = match &self.filter {
                Some(predicate) => evaluate_predicate(predicate, &labels, &row)?,
                None => true,
            };
            if selected {
                count += 1;
            } else {
                retained.push(row);
            }
        }

        check_inbound_fks(catalog, &table, &retained)?;

        catalog.replace_rows(&table.name, retained)?;
        Ok(ResultSet::Delete { count })
    }
}

/// Labels a bare table scope (UPDATE/DELETE predicates).
fn table_labels(table: &Table) -> Vec<ColumnLabel> {
    table
        .columns
        .iter()
        .map(|c| ColumnLabel {
            table: Some(table.name.clone()),
            name: c.name.clone(),
        })
        .collect()
}

/// Fits a value to its column type; integer literals widen to FLOAT.
fn coerce_for(value: Value, table: &Table, column: &str) -> Result<Value> {
    let col = table
        .find_column(column)
        .expect("column resolved before coercion");
    value.clone().coerce(col.datatype).ok_or_else(|| {
        Error::Type(format!(
            "cannot assign {} value {} to column {} of type {}",
            value.datatype().map(|d| d.to_string()).unwrap_or_default(),
            value,
            col.name,
            col.datatype
        ))
    })
}

fn check_not_null(table: &Table, rows: &[Row]) -> Result<()> {
    for row in rows {
        for (column, value) in table.columns.iter().zip(row) {
            if column.not_null && value.is_null() {
                return Err(Error::Constraint(format!(
                    "column {}.{} cannot be null",
                    table.name, column.name
                )));
            }
        }
    }
    Ok(())
}

/// Linear-scan PRIMARY KEY / UNIQUE enforcement. Null never collides.
fn check_unique(table: &Table, rows: &[Row]) -> Result<()> {
    for (i, column) in table.columns.iter().enumerate() {
        if !column.primary_key && !column.unique {
            continue;
        }
        for (a, row) in rows.iter().enumerate() {
            if row[i].is_null() {
                continue;
            }
            if rows[..a].iter().any(|other| other[i] == row[i]) {
                return Err(if column.primary_key {
                    Error::Constraint(format!(
                        "duplicate primary key {} in table {}",
                        row[i], table.name
                    ))
                } else {
                    Error::Constraint(format!(
                        "duplicate value {} for unique column {}.{}",
                        row[i], table.name, column.name
                    ))
                });
            }
        }
    }
    Ok(())
}

/// Every non-null foreign key value in `state` must have a referent. For
/// self-referential keys the referent may itself be part of `state`.
fn check_outbound_fks(catalog: &mut Catalog, table: &Table, state: &[Row]) -> Result<()> {
    for (i, column, fk) in table.foreign_keys() {
        let (target_rows, target_index) = if fk.table.eq_ignore_ascii_case(&table.name) {
            (state.to_vec(), target_column_index(table, &fk.column)?)
        } else {
            let target = catalog.must_get_table(&fk.table)?.clone();
            let index = target_column_index(&target, &fk.column)?;
            (catalog.rows(&target.name)?.to_vec(), index)
        };
        for row in state {
            if row[i].is_null() {
                continue;
            }
            if !target_rows.iter().any(|r| r[target_index] == row[i]) {
                return Err(Error::Constraint(format!(
                    "foreign key violation: value {} for column {} has no match in {}.{}",
                    row[i], column.name, fk.table, fk.column
                )));
            }
        }
    }
    Ok(())
}

/// Every referrer of this table must still resolve against the
/// hypothetical new state; `new_rows` stands in for the table itself when
/// it is its own referrer.
fn check_inbound_fks(catalog: &mut Catalog, table: &Table, new_rows: &[Row]) -> Result<()> {
    for (referrer, fk_index, target_column) in catalog.referencing(&table.name) {
        let target_index = target_column_index(table, &target_column)?;
        let (referrer_rows, fk_name) = if referrer.eq_ignore_ascii_case(&table.name) {
            (new_rows.to_vec(), table.columns[fk_index].name.clone())
        } else {
            let schema = catalog.must_get_table(&referrer)?.clone();
            (
                catalog.rows(&referrer)?.to_vec(),
                schema.columns[fk_index].name.clone(),
            )
        };
        for row in &referrer_rows {
            let value = &row[fk_index];
            if value.is_null() {
                continue;
            }
            if !new_rows.iter().any(|r| r[target_index] == *value) {
                return Err(Error::Constraint(format!(
                    "foreign key violation: {}.{} still references value {}",
                    referrer, fk_name, value
                )));
            }
        }
    }
    Ok(())
}

fn target_column_index(table: &Table, column: &str) -> Result<usize> {
    table.column_index(column).ok_or_else(|| {
        Error::Semantic(format!(
            "referenced column {}.{} does not exist",
            table.name, column
        ))
    })
}
