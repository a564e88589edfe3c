use crate::error::{Error, Result};
use crate::sql::executor::{Executor, ResultSet};
use crate::sql::schema::Table;
use crate::storage::catalog::Catalog;

/// CREATE TABLE executor.
pub struct CreateTable {
    schema: Table,
}

impl CreateTable {
    pub fn new(schema: Table) -> Box<Self> {
        Box::new(Self { schema })
    }
}

impl Executor for CreateTable {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        self.schema.validate()?;

        // Foreign keys must target an existing primary-key or unique
        // column; a table may reference itself.
        for (_, column, fk) in self.schema.foreign_keys() {
            let target = if fk.table.eq_ignore_ascii_case(&self.schema.name) {
                &self.schema
            } else {
                catalog.must_get_table(&fk.table)?
            };
            let target_column = target.find_column(&fk.column).ok_or_else(|| {
                Error::Semantic(format!(
                    "referenced column {}.{} does not exist",
                    fk.table, fk.column
                ))
            })?;
            if !target_column.primary_key && !target_column.unique {
                return Err(Error::Semantic(format!(
                    "foreign key target {}.{} must be a primary key or unique column",
                    fk.table, fk.column
                )));
            }
            if target_column.datatype != column.datatype {
                return Err(Error::Semantic(format!(
                    "foreign key column {} and target {}.{} have different types",
                    column.name, fk.table, fk.column
                )));
            }
        }

        let name = self.schema.name.clone();
        catalog.create_table(self.schema)?;
        Ok(ResultSet::CreateTable { name })
    }
}

/// DROP TABLE executor.
pub struct DropTable {
    name: String,
}

impl DropTable {
    pub fn new(name: String) -> Box<Self> {
        Box::new(Self { name })
    }
}

impl Executor for DropTable {
    fn execute(self: Box<Self>, catalog: &mut Catalog) -> Result<ResultSet> {
        let name = catalog.must_get_table(&self.name)?.name.clone();

        // Tables holding foreign keys into the victim block the drop;
        // the victim's own self-references do not.
        if let Some((referrer, i, _)) = catalog
            .referencing(&name)
            .into_iter()
            .find(|(referrer, _, _)| !referrer.eq_ignore_ascii_case(&name))
        {
            let column = catalog.must_get_table(&referrer)?.columns[i].name.clone();
            return Err(Error::Constraint(format!(
                "cannot drop table {}: referenced by {}.{}",
                name, referrer, column
            )));
        }

        catalog.drop_table(&name)?;
        Ok(ResultSet::DropTable { name })
    }
}
