use std::fmt::{self, Display};

use crate::sql::types::DataType;

/// Statement AST nodes, one variant per supported statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable {
        name: String,
        columns: Vec<ColumnSpec>,
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
    Select {
        distinct: bool,
        items: Vec<SelectItem>,
        from: TableRef,
        joins: Vec<Join>,
        filter: Option<Expression>,
        group_by: Vec<ColumnRef>,
        order_by: Vec<(ColumnRef, OrderDirection)>,
    },
}

/// Column definition inside CREATE TABLE.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub datatype: DataType,
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    /// `REFERENCES table(column)`
    pub references: Option<(String, String)>,
}

/// One item of a select list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`: every column in scope, in join order
    Wildcard,
    Expr {
        expr: Expression,
        alias: Option<String>,
    },
}

/// A table in FROM or JOIN position, with its optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    FullOuter,
}

/// A join clause: kind, right-hand table, ON predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Expression,
}

/// A possibly qualified column reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Sort direction for ORDER BY, ascending by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "!=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEqual => "<=",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEqual => ">=",
        };
        write!(f, "{}", op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
        };
        write!(f, "{}", name)
    }
}

/// Expressions: literals, column references, aggregate calls, and the
/// boolean predicate forms. `BETWEEN` never reaches the AST; the parser
/// desugars it into the two comparisons.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Consts(Consts),
    Column(ColumnRef),
    Aggregate {
        func: AggregateFunc,
        /// `None` is `COUNT(*)`
        arg: Option<Box<Expression>>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    IsNull {
        expr: Box<Expression>,
        negated: bool,
    },
}

impl Expression {
    /// Whether any aggregate call occurs in this expression.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expression::Aggregate { .. } => true,
            Expression::Consts(_) | Expression::Column(_) => false,
            Expression::Compare { lhs, rhs, .. } => {
                lhs.contains_aggregate() || rhs.contains_aggregate()
            }
            Expression::And(lhs, rhs) | Expression::Or(lhs, rhs) => {
                lhs.contains_aggregate() || rhs.contains_aggregate()
            }
            Expression::IsNull { expr, .. } => expr.contains_aggregate(),
        }
    }
}

/// Rendering used for generated output labels such as `count(o.id)`.
impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Consts(c) => write!(f, "{}", c),
            Expression::Column(c) => write!(f, "{}", c),
            Expression::Aggregate { func, arg: None } => write!(f, "{}(*)", func),
            Expression::Aggregate {
                func,
                arg: Some(arg),
            } => write!(f, "{}({})", func, arg),
            Expression::Compare { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Expression::And(lhs, rhs) => write!(f, "{} AND {}", lhs, rhs),
            Expression::Or(lhs, rhs) => write!(f, "{} OR {}", lhs, rhs),
            Expression::IsNull {
                expr,
                negated: false,
            } => write!(f, "{} IS NULL", expr),
            Expression::IsNull {
                expr,
                negated: true,
            } => write!(f, "{} IS NOT NULL", expr),
        }
    }
}

/// Constant values appearing in SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Consts {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<Consts> for Expression {
    fn from(value: Consts) -> Self {
        Self::Consts(value)
    }
}

impl Display for Consts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consts::Null => write!(f, "NULL"),
            Consts::Boolean(true) => write!(f, "TRUE"),
            Consts::Boolean(false) => write!(f, "FALSE"),
            Consts::Integer(i) => write!(f, "{}", i),
            Consts::Float(v) => write!(f, "{}", v),
            Consts::String(s) => write!(f, "'{}'", s),
        }
    }
}
