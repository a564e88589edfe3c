use crate::error::Result;
use crate::sql::executor::{evaluate_predicate, Executor, ResultSet};
use crate::sql::parser::ast::{Expression, JoinKind};
use crate::sql::types::Value;
use crate::storage::catalog::Catalog;

/// Nested-loop join over two sources.
///
/// Matched pairs come out in `(outer x inner)` scan order. LEFT emits each
/// unmatched left row once, right side null-extended, in place; RIGHT and
/// FULL OUTER append their unmatched right rows afterwards, left side
/// null-extended, without duplicating matched pairs.
pub struct NestedLoopJoin {
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    kind: JoinKind,
    predicate: Expression,
}

impl NestedLoopJoin {
    pub fn new(
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
        kind: JoinKind,
        predicate: Expression,
    ) -> Box<Self> {
        Box::new(Self {
            left,
            right,
            kind,
            predicate,
        })
    }
}

impl Executor for NestedLoopJoin {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        let (lcols, lrows) = super::source_rows(self.left.execute(catalog)?)?;
        let (rcols, rrows) = super::source_rows(self.right.execute(catalog)?)?;

        let mut columns = lcols;
        columns.extend(rcols.iter().cloned());

        let mut rows = Vec::new();
        let mut right_matched = vec![false; rrows.len()];
        for lrow in &lrows {
            let mut matched = false;
            for (j, rrow) in rrows.iter().enumerate() {
                let mut combined = lrow.clone();
                combined.extend(rrow.iter().cloned());
                if evaluate_predicate(&self.predicate, &columns, &combined)? {
                    matched = true;
                    right_matched[j] = true;
                    rows.push(combined);
                }
            }
            if !matched && matches!(self.kind, JoinKind::Left | JoinKind::FullOuter) {
                let mut padded = lrow.clone();
                padded.extend(std::iter::repeat(Value::Null).take(rcols.len()));
                rows.push(padded);
            }
        }

        if matches!(self.kind, JoinKind::Right | JoinKind::FullOuter) {
            let left_width = columns.len() - rcols.len();
            for (j, rrow) in rrows.iter().enumerate() {
                if right_matched[j] {
                    continue;
                }
                let mut padded: Vec<Value> =
                    std::iter::repeat(Value::Null).take(left_width).collect();
                padded.extend(rrow.iter().cloned());
                rows.push(padded);
            }
        }

        Ok(ResultSet::Query { columns, rows })
    }
}
