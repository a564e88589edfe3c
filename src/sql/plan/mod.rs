use crate::error::Result;
use crate::sql::executor::{Executor, ResultSet};
use crate::sql::parser::ast::{
    ColumnRef, Expression, JoinKind, OrderDirection, SelectItem, Statement,
};
use crate::sql::schema::Table;
use crate::storage::catalog::Catalog;

mod planner;

pub use planner::Planner;

/// Logical plan node. DDL and DML statements lower one-to-one; SELECT
/// lowers to a source chain that the executor walks bottom-up.
#[derive(Debug, PartialEq)]
pub enum Node {
    CreateTable {
        schema: Table,
    },
    DropTable {
        name: String,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Vec<Expression>>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Expression)>,
        filter: Option<Expression>,
    },
    Delete {
        table: String,
        filter: Option<Expression>,
    },
    Scan {
        table: String,
        alias: Option<String>,
    },
    NestedLoopJoin {
        left: Box<Node>,
        right: Box<Node>,
        kind: JoinKind,
        predicate: Expression,
    },
    Filter {
        source: Box<Node>,
        predicate: Expression,
    },
    /// Grouping and aggregation; also projects the select list.
    Aggregate {
        source: Box<Node>,
        items: Vec<(Expression, Option<String>)>,
        group_by: Vec<ColumnRef>,
    },
    Order {
        source: Box<Node>,
        order_by: Vec<(ColumnRef, OrderDirection)>,
        /// Select-list aliases, resolvable as sort keys before projection.
        aliases: Vec<(String, Expression)>,
    },
    Projection {
        source: Box<Node>,
        items: Vec<SelectItem>,
    },
    Distinct {
        source: Box<Node>,
    },
}

/// An executable plan for a single statement.
#[derive(Debug, PartialEq)]
pub struct Plan(pub Node);

impl Plan {
    pub fn build(statement: Statement) -> Result<Self> {
        Planner::new().build(statement)
    }

    pub fn execute(self, catalog: &mut Catalog) -> Result<ResultSet> {
        <dyn Executor>::build(self.0).execute(catalog)
    }
}
