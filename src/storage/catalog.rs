use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::sql::schema::Table;
use crate::sql::types::{Row, Value};

const SCHEMA_FILE: &str = "schema.json";

/// The persistent catalog: every table schema plus its rows, backed by a
/// root directory holding `schema.json` and one `<table>.json` per table.
///
/// Table lookup is case-insensitive; the as-created spelling is canonical.
/// Rows load lazily on first access and stay cached. Every mutation writes
/// the affected file via atomic replace, so a partially written file is
/// never observable.
pub struct Catalog {
    root: PathBuf,
    tables: BTreeMap<String, TableState>,
}

struct TableState {
    schema: Table,
    /// `None` until the data file has been read.
    rows: Option<Vec<Row>>,
}

impl Catalog {
    /// Opens (or initializes) the catalog under the given directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let mut tables = BTreeMap::new();
        let schema_path = root.join(SCHEMA_FILE);
        if schema_path.exists() {
            let bytes = fs::read(&schema_path)?;
            let entries: BTreeMap<String, Table> = serde_json::from_slice(&bytes)?;
            for (name, mut schema) in entries {
                // The table name is the map key, not part of the value.
                schema.name = name.clone();
                tables.insert(name, TableState { schema, rows: None });
            }
        }
        debug!(tables = tables.len(), root = %root.display(), "catalog opened");
        Ok(Self { root, tables })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical spelling of a table name, matched case-insensitively.
    fn canonical(&self, name: &str) -> Option<String> {
        self.tables
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables
            .values()
            .map(|state| &state.schema)
            .find(|schema| schema.name.eq_ignore_ascii_case(name))
    }

    /// Returns the schema or a semantic error naming the missing table.
    pub fn must_get_table(&self, name: &str) -> Result<&Table> {
        self.get_table(name)
            .ok_or_else(|| Error::Semantic(format!("table {} does not exist", name)))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Every foreign key across the catalog that targets the given table,
    /// as `(referring table, fk column index, target column)`.
    pub fn referencing(&self, target: &str) -> Vec<(String, usize, String)> {
        let mut refs = Vec::new();
        for state in self.tables.values() {
            for (i, _, fk) in state.schema.foreign_keys() {
                if fk.table.eq_ignore_ascii_case(target) {
                    refs.push((state.schema.name.clone(), i, fk.column.clone()));
                }
            }
        }
        refs
    }

    /// Registers a new table and persists schema plus an empty data file.
    pub fn create_table(&mut self, table: Table) -> Result<()> {
        if self.get_table(&table.name).is_some() {
            return Err(Error::Semantic(format!(
                "table {} already exists",
                table.name
            )));
        }
        let name = table.name.clone();
        self.tables.insert(
            name.clone(),
            TableState {
                schema: table,
                rows: Some(Vec::new()),
            },
        );
        self.save_schema()?;
        self.persist_table(&name)?;
        info!(table = %name, "table created");
        Ok(())
    }

    /// Removes a table's schema entry and data file.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let canonical = self
            .canonical(name)
            .ok_or_else(|| Error::Semantic(format!("table {} does not exist", name)))?;
        self.tables.remove(&canonical);
        self.save_schema()?;
        let path = self.table_path(&canonical);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        info!(table = %canonical, "table dropped");
        Ok(())
    }

    /// Rows of a table, loading them from disk on first access. A missing
    /// data file means an empty table.
    pub fn rows(&mut self, name: &str) -> Result<&[Row]> {
        let canonical = self
            .canonical(name)
            .ok_or_else(|| Error::Semantic(format!("table {} does not exist", name)))?;
        let path = self.table_path(&canonical);
        let state = self.tables.get_mut(&canonical).expect("canonical name");
        if state.rows.is_none() {
            state.rows = Some(load_rows(&path, &state.schema)?);
            debug!(table = %canonical, "table rows loaded");
        }
        Ok(state.rows.as_ref().expect("rows just loaded").as_slice())
    }

    /// Appends validated rows and persists the table file.
    pub fn append_rows(&mut self, name: &str, rows: Vec<Row>) -> Result<()> {
        self.rows(name)?; // make sure existing rows are cached
        let canonical = self.canonical(name).expect("table exists");
        let state = self.tables.get_mut(&canonical).expect("canonical name");
        state.rows.as_mut().expect("rows cached").extend(rows);
        self.persist_table(&canonical)
    }

    /// Replaces a table's rows wholesale and persists the table file.
    pub fn replace_rows(&mut self, name: &str, rows: Vec<Row>) -> Result<()> {
        let canonical = self
            .canonical(name)
            .ok_or_else(|| Error::Semantic(format!("table {} does not exist", name)))?;
        let state = self.tables.get_mut(&canonical).expect("canonical name");
        state.rows = Some(rows);
        self.persist_table(&canonical)
    }

    fn table_path(&self, canonical: &str) -> PathBuf {
        self.root.join(format!("{}.json", canonical))
    }

    fn save_schema(&self) -> Result<()> {
        let entries: BTreeMap<&String, &Table> = self
            .tables
            .iter()
            .map(|(name, state)| (name, &state.schema))
            .collect();
        let bytes = serde_json::to_vec_pretty(&entries)?;
        write_atomic(&self.root.join(SCHEMA_FILE), &bytes)
    }

    fn persist_table(&mut self, canonical: &str) -> Result<()> {
        let state = self.tables.get(canonical).expect("canonical name");
        let rows = state.rows.as_ref().expect("rows cached before persist");
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut object = serde_json::Map::new();
            for (column, value) in state.schema.columns.iter().zip(row) {
                object.insert(column.name.clone(), value.to_json());
            }
            out.push(serde_json::Value::Object(object));
        }
        let bytes = serde_json::to_vec_pretty(&serde_json::Value::Array(out))?;
        write_atomic(&self.table_path(canonical), &bytes)
    }
}

/// Writes a sibling temp file and renames it into place, so readers see
/// either the old or the new contents, never a prefix.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn load_rows(path: &Path, schema: &Table) -> Result<Vec<Row>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path)?;
    let data: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_slice(&bytes)?;
    let mut rows = Vec::with_capacity(data.len());
    for object in &data {
        let mut row = Vec::with_capacity(schema.columns.len());
        for column in &schema.columns {
            let value = match object.get(&column.name) {
                Some(json) => Value::from_json(json, column.datatype)?,
                None => Value::Null,
            };
            row.push(value);
        }
        rows.push(row);
    }
    Ok(rows)
}
