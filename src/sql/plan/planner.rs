use crate::error::{Error, Result};
use crate::sql::parser::ast::{self, SelectItem, Statement};
use crate::sql::plan::{Node, Plan};
use crate::sql::schema::{self, ForeignKey, Table};

/// Lowers statement ASTs into plan nodes.
pub struct Planner;

impl Planner {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, statement: Statement) -> Result<Plan> {
        Ok(Plan(self.build_statement(statement)?))
    }

    fn build_statement(&self, statement: Statement) -> Result<Node> {
        Ok(match statement {
            Statement::CreateTable { name, columns } => Node::CreateTable {
                schema: Table {
                    name,
                    columns: columns.into_iter().map(build_column).collect(),
                },
            },
            Statement::DropTable { name } => Node::DropTable { name },
            Statement::Insert {
                table,
                columns,
                values,
            } => Node::Insert {
                table,
                columns,
                values,
            },
            Statement::Update {
                table,
                assignments,
                filter,
            } => Node::Update {
                table,
                assignments,
                filter,
            },
            Statement::Delete { table, filter } => Node::Delete { table, filter },
            Statement::Select {
                distinct,
                items,
                from,
                joins,
                filter,
                group_by,
                order_by,
            } => {
                // FROM and JOINs form the scan chain.
                let mut node = Node::Scan {
                    table: from.name.clone(),
                    alias: from.alias.clone(),
                };
                for join in joins {
                    node = Node::NestedLoopJoin {
                        left: Box::new(node),
                        right: Box::new(Node::Scan {
                            table: join.table.name.clone(),
                            alias: join.table.alias.clone(),
                        }),
                        kind: join.kind,
                        predicate: join.on,
                    };
                }

                if let Some(predicate) = filter {
                    node = Node::Filter {
                        source: Box::new(node),
                        predicate,
                    };
                }

                let aggregated = !group_by.is_empty()
                    || items.iter().any(|item| match item {
                        SelectItem::Expr { expr, .. } => expr.contains_aggregate(),
                        SelectItem::Wildcard => false,
                    });

                if aggregated {
                    // The aggregate projects the select list itself; a
                    // wildcard cannot satisfy the grouped-columns rule.
                    let mut exprs = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            SelectItem::Wildcard => {
                                return Err(Error::Semantic(
                                    "* is not allowed with GROUP BY or aggregate functions"
                                        .into(),
                                ))
                            }
                            SelectItem::Expr { expr, alias } => exprs.push((expr, alias)),
                        }
                    }
                    node = Node::Aggregate {
                        source: Box::new(node),
                        items: exprs,
                        group_by,
                    };
                    if !order_by.is_empty() {
                        node = Node::Order {
                            source: Box::new(node),
                            order_by,
                            aliases: Vec::new(),
                        };
                    }
                } else {
                    // Sort in the full scope, then project; aliases remain
                    // usable as sort keys.
                    if !order_by.is_empty() {
                        let aliases = items
                            .iter()
                            .filter_map(|item| match item {
                                SelectItem::Expr {
                                    expr,
                                    alias: Some(alias),
                                } => Some((alias.clone(), expr.clone())),
                                _ => None,
                            })
                            .collect();
                        node = Node::Order {
                            source: Box::new(node),
                            order_by,
                            aliases,
                        };
                    }
                    node = Node::Projection {
                        source: Box::new(node),
                        items,
                    };
                }

                if distinct {
                    node = Node::Distinct {
                        source: Box::new(node),
                    };
                }
                node
            }
        })
    }
}

/// A PRIMARY KEY column is implicitly NOT NULL and UNIQUE.
fn build_column(spec: ast::ColumnSpec) -> schema::Column {
    schema::Column {
        name: spec.name,
        datatype: spec.datatype,
        primary_key: spec.primary_key,
        not_null: spec.not_null || spec.primary_key,
        unique: spec.unique || spec.primary_key,
        references: spec
            .references
            .map(|(table, column)| ForeignKey { table, column }),
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Result;
    use crate::sql::parser::Parser;
    use crate::sql::plan::{Node, Plan};

    fn plan(sql: &str) -> Result<Plan> {
        let mut statements = Parser::new(sql).parse()?;
        Plan::build(statements.pop().unwrap())
    }

    #[test]
    fn test_primary_key_implies_not_null_unique() -> Result<()> {
        let plan = plan("CREATE TABLE t (id INT PRIMARY KEY, v TEXT);")?;
        match plan.0 {
            Node::CreateTable { schema } => {
                assert!(schema.columns[0].not_null);
                assert!(schema.columns[0].unique);
                assert!(!schema.columns[1].not_null);
            }
            other => panic!("unexpected node {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_select_plan_shape() -> Result<()> {
        let plan = plan(
            "SELECT DISTINCT a FROM t JOIN u ON t.id = u.tid WHERE a > 1 ORDER BY a;",
        )?;
        // Distinct over Projection over Order over Filter over Join.
        match plan.0 {
            Node::Distinct { source } => match *source {
                Node::Projection { source, .. } => match *source {
                    Node::Order { source, .. } => match *source {
                        Node::Filter { source, .. } => {
                            assert!(matches!(*source, Node::NestedLoopJoin { .. }))
                        }
                        other => panic!("unexpected node {:?}", other),
                    },
                    other => panic!("unexpected node {:?}", other),
                },
                other => panic!("unexpected node {:?}", other),
            },
            other => panic!("unexpected node {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_aggregate_plan_orders_after_grouping() -> Result<()> {
        let plan = plan("SELECT a, COUNT(*) FROM t GROUP BY a ORDER BY a;")?;
        match plan.0 {
            Node::Order { source, .. } => {
                assert!(matches!(*source, Node::Aggregate { .. }))
            }
            other => panic!("unexpected node {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_wildcard_with_grouping_is_rejected() {
        assert!(plan("SELECT * FROM t GROUP BY a;").is_err());
        assert!(plan("SELECT *, COUNT(*) FROM t;").is_err());
    }
}
