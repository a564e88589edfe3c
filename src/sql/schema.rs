use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sql::types::DataType;

/// A foreign key target: `REFERENCES table(column)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

/// Column schema. The serialized form is the `columns` entry of
/// `schema.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub datatype: DataType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub references: Option<ForeignKey>,
}

/// Table schema: an ordered list of columns. The name is the key in
/// `schema.json`, not part of the serialized value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(skip)]
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    /// Checks structural validity: at least one column, unique column
    /// names, at most a single primary key.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::Semantic(format!(
                "table {} has no columns",
                self.name
            )));
        }
        for (i, col) in self.columns.iter().enumerate() {
            if self.columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&col.name))
            {
                return Err(Error::Semantic(format!(
                    "duplicate column {} in table {}",
                    col.name, self.name
                )));
            }
        }
        if self.columns.iter().filter(|c| c.primary_key).count() > 1 {
            return Err(Error::Semantic(format!(
                "multiple primary keys for table {}",
                self.name
            )));
        }
        Ok(())
    }

    /// Case-insensitive column lookup.
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Position of a column, matched case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The primary key column, if one was declared.
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Columns carrying a foreign key, with their positions.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (usize, &Column, &ForeignKey)> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.references.as_ref().map(|fk| (i, c, fk)))
    }
}

#[cfg(test)]
mod tests {
    use super::{Column, Table};
    use crate::sql::types::DataType;

    fn column(name: &str, datatype: DataType) -> Column {
        Column {
            name: name.into(),
            datatype,
            primary_key: false,
            not_null: false,
            unique: false,
            references: None,
        }
    }

    #[test]
    fn test_validate_rejects_duplicate_columns() {
        let table = Table {
            name: "t".into(),
            columns: vec![column("id", DataType::Int), column("ID", DataType::Text)],
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_multiple_primary_keys() {
        let mut a = column("a", DataType::Int);
        let mut b = column("b", DataType::Int);
        a.primary_key = true;
        b.primary_key = true;
        let table = Table {
            name: "t".into(),
            columns: vec![a, b],
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = Table {
            name: "t".into(),
            columns: vec![column("Id", DataType::Int), column("name", DataType::Text)],
        };
        assert_eq!(table.column_index("ID"), Some(0));
        assert!(table.find_column("NAME").is_some());
        assert!(table.find_column("missing").is_none());
    }
}
