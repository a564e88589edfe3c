use std::collections::HashMap;
use std::collections::VecDeque;
use std::fs;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::sql::executor::ResultSet;
use crate::sql::parser::Parser;
use crate::sql::plan::Plan;
use crate::storage::catalog::Catalog;

/// The database facade: one handle owning the catalog and the per-session
/// query history, with every engine call serialized behind a single mutex.
///
/// This is the complete contract an HTTP transport needs: `execute`,
/// `history`, `reset` and `tables`, all returning `Serialize` payloads.
pub struct Database {
    config: Config,
    state: Mutex<State>,
}

struct State {
    catalog: Catalog,
    history: HashMap<String, VecDeque<HistoryEntry>>,
}

/// Result envelope for one `execute` call.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub success: bool,
    pub result: Option<Vec<serde_json::Map<String, serde_json::Value>>>,
    pub columns: Option<Vec<String>>,
    pub time_ms: f64,
    pub message: Option<String>,
    pub error: Option<String>,
    pub affected_rows: Option<usize>,
}

/// One recorded query of a session.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub query: String,
    pub timestamp: f64,
    pub success: bool,
    pub time_ms: f64,
    pub affected_rows: Option<usize>,
}

/// History listing for a session.
#[derive(Debug, Clone, Serialize)]
pub struct History {
    pub session_id: String,
    pub queries: Vec<HistoryEntry>,
    pub total: usize,
}

/// Table metadata as exposed by `tables`.
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<crate::sql::schema::Column>,
    pub row_count: usize,
}

impl Database {
    /// Opens the database under the configured data directory.
    pub fn open(config: Config) -> Result<Self> {
        let catalog = Catalog::open(&config.data_dir)?;
        Ok(Self {
            config,
            state: Mutex::new(State {
                catalog,
                history: HashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Executes a SQL script and returns the result envelope.
    ///
    /// The script is parsed completely first, then statements run in
    /// order, stopping at the first failure; mutations already applied by
    /// earlier statements stay applied. The envelope reflects the last
    /// executed statement.
    pub fn execute(&self, sql: &str, session: Option<&str>) -> QueryOutcome {
        let start = Instant::now();
        let mut state = self.state.lock();
        let outcome = match self.run_script(&mut state.catalog, sql) {
            Ok(result) => self.success_outcome(result, start),
            Err(err) => {
                warn!(error = %err, "statement failed");
                QueryOutcome {
                    success: false,
                    result: None,
                    columns: None,
                    time_ms: elapsed_ms(start),
                    message: None,
                    error: Some(format!("{}: {}", err.kind(), err)),
                    affected_rows: None,
                }
            }
        };

        if let Some(session) = session {
            let entry = HistoryEntry {
                query: sql.to_string(),
                timestamp: unix_timestamp(),
                success: outcome.success,
                time_ms: outcome.time_ms,
                affected_rows: outcome.affected_rows,
            };
            let queries = state.history.entry(session.to_string()).or_default();
            queries.push_back(entry);
            while queries.len() > self.config.max_query_history {
                queries.pop_front();
            }
        }
        outcome
    }

    fn run_script(&self, catalog: &mut Catalog, sql: &str) -> Result<Option<ResultSet>> {
        if sql.len() > self.config.max_query_length {
            return Err(Error::Semantic(format!(
                "query exceeds the maximum length of {} bytes",
                self.config.max_query_length
            )));
        }
        let statements = Parser::new(sql).parse()?;
        let mut last = None;
        for statement in statements {
            last = Some(Plan::build(statement)?.execute(catalog)?);
        }
        Ok(last)
    }

    fn success_outcome(&self, result: Option<ResultSet>, start: Instant) -> QueryOutcome {
        let mut outcome = QueryOutcome {
            success: true,
            result: None,
            columns: None,
            time_ms: 0.0,
            message: None,
            error: None,
            affected_rows: None,
        };
        match result {
            None => outcome.message = Some("Empty query".into()),
            Some(ResultSet::Query { columns, rows }) => {
                let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
                let total = rows.len();
                let mut objects = Vec::with_capacity(total.min(self.config.max_result_rows));
                for row in rows.into_iter().take(self.config.max_result_rows) {
                    let mut object = serde_json::Map::new();
                    for (name, value) in names.iter().zip(&row) {
                        object.insert(name.clone(), value.to_json());
                    }
                    objects.push(object);
                }
                outcome.message = Some(if objects.len() < total {
                    format!(
                        "Selected {} row(s), showing the first {}",
                        total,
                        objects.len()
                    )
                } else {
                    format!("Selected {} row(s)", total)
                });
                outcome.columns = Some(names);
                outcome.result = Some(objects);
            }
            Some(report) => {
                outcome.message = Some(report.message());
                outcome.affected_rows = report.affected_rows();
            }
        }
        outcome.time_ms = elapsed_ms(start);
        outcome
    }

    /// Most recent `limit` queries of a session, oldest first.
    pub fn history(&self, session: &str, limit: usize) -> History {
        let state = self.state.lock();
        let (queries, total) = match state.history.get(session) {
            Some(entries) => {
                let skip = entries.len().saturating_sub(limit);
                (entries.iter().skip(skip).cloned().collect(), entries.len())
            }
            None => (Vec::new(), 0),
        };
        History {
            session_id: session.to_string(),
            queries,
            total,
        }
    }

    /// Deletes the data directory, recreates it empty and clears all
    /// session history.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.state.lock();
        if self.config.data_dir.exists() {
            fs::remove_dir_all(&self.config.data_dir)?;
        }
        state.catalog = Catalog::open(&self.config.data_dir)?;
        state.history.clear();
        info!("database reset");
        Ok(())
    }

    /// Lists every table with its column metadata and row count.
    pub fn tables(&self) -> Result<Vec<TableInfo>> {
        let mut state = self.state.lock();
        let mut tables = Vec::new();
        for name in state.catalog.table_names() {
            let columns = state
                .catalog
                .must_get_table(&name)?
                .columns
                .clone();
            let row_count = state.catalog.rows(&name)?.len();
            tables.push(TableInfo {
                name,
                columns,
                row_count,
            });
        }
        Ok(tables)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1_000.0
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::Database;
    use crate::config::Config;
    use crate::error::Result;

    fn open(dir: &TempDir) -> Result<Database> {
        Database::open(Config::default().with_data_dir(dir.path()))
    }

    #[test]
    fn test_execute_envelope() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let db = open(&dir)?;

        let outcome = db.execute("CREATE TABLE t (id INT PRIMARY KEY);", None);
        assert!(outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("Table t created"));
        assert_eq!(outcome.affected_rows, Some(0));

        let outcome = db.execute("INSERT INTO t VALUES (1), (2);", None);
        assert_eq!(outcome.affected_rows, Some(2));

        let outcome = db.execute("SELECT * FROM t;", None);
        assert!(outcome.success);
        assert_eq!(outcome.columns, Some(vec!["id".to_string()]));
        assert_eq!(outcome.result.as_ref().map(|r| r.len()), Some(2));
        assert_eq!(outcome.affected_rows, None);

        let outcome = db.execute("SELECT * FROM missing;", None);
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().starts_with("SemanticError:"));
        Ok(())
    }

    #[test]
    fn test_script_stops_at_first_failure() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let db = open(&dir)?;
        let outcome = db.execute(
            "CREATE TABLE t (id INT PRIMARY KEY); \
             INSERT INTO t VALUES (1); \
             INSERT INTO t VALUES (1); \
             INSERT INTO t VALUES (2);",
            None,
        );
        assert!(!outcome.success);
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .starts_with("ConstraintError:"));

        // The first insert stays applied; the statement after the failure
        // never ran.
        let outcome = db.execute("SELECT * FROM t;", None);
        assert_eq!(outcome.result.as_ref().map(|r| r.len()), Some(1));
        Ok(())
    }

    #[test]
    fn test_history_is_bounded_per_session() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default().with_data_dir(dir.path());
        config.max_query_history = 2;
        let db = Database::open(config)?;

        db.execute("CREATE TABLE t (id INT);", Some("a"));
        db.execute("INSERT INTO t VALUES (1);", Some("a"));
        db.execute("SELECT * FROM t;", Some("a"));
        db.execute("SELECT * FROM t;", Some("b"));

        let history = db.history("a", 10);
        assert_eq!(history.total, 2);
        assert_eq!(history.queries.len(), 2);
        assert_eq!(history.queries[1].query, "SELECT * FROM t;");
        assert_eq!(db.history("b", 10).total, 1);
        assert_eq!(db.history("missing", 10).total, 0);
        Ok(())
    }

    #[test]
    fn test_reset_clears_everything() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let db = open(&dir)?;
        db.execute("CREATE TABLE t (id INT);", Some("s"));
        db.reset()?;
        assert!(db.tables()?.is_empty());
        assert_eq!(db.history("s", 10).total, 0);
        assert!(db.config().data_dir.exists());
        Ok(())
    }

    #[test]
    fn test_query_length_cap() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default().with_data_dir(dir.path());
        config.max_query_length = 10;
        let db = Database::open(config)?;
        let outcome = db.execute("SELECT * FROM really_long_named_table;", None);
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("maximum length"));
        Ok(())
    }
}
