//! SQLite-backed [`TableStore`].
//!
//! Wraps a single `rusqlite::Connection` behind a mutex so one store can be
//! shared by the aligner, decomposer and writer. Identifiers are quoted and
//! every value is bound as a parameter; no value is ever spliced into SQL.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection};

use super::{StoreError, TableStore};
use crate::naming::quote;
use crate::types::{Cell, ColumnSet, ColumnSpec, ColumnType, Row};

/// Column added to tables created without any inferable column
pub const PLACEHOLDER_COLUMN: &str = "_rowid";

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Cell::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Cell::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Cell::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn cell_from_ref(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(i) => Cell::Integer(i),
        ValueRef::Real(r) => Cell::Real(r),
        ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// A [`TableStore`] over one SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Mutex::new(conn),
        }
    }

    /// Consumes the store and returns the underlying connection
    pub fn into_connection(self) -> Result<Connection, StoreError> {
        self.conn
            .into_inner()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }
}

/// Build `CREATE TABLE` for the given columns
fn create_table_sql(table: &str, columns: &ColumnSet) -> String {
    let defs: Vec<String> = if columns.is_empty() {
        vec![format!("{} INTEGER PRIMARY KEY", quote(PLACEHOLDER_COLUMN))]
    } else {
        columns
            .iter()
            .map(|c| format!("{} {}", quote(&c.name), c.column_type.as_sql()))
            .collect()
    };
    format!("CREATE TABLE {} ({})", quote(table), defs.join(", "))
}

fn add_column_sql(table: &str, column: &ColumnSpec) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote(table),
        quote(&column.name),
        column.column_type.as_sql()
    )
}

fn insert_sql(table: &str, row: &Row) -> String {
    if row.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote(table));
    }
    let columns: Vec<String> = row.columns().map(quote).collect();
    let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn insert_with(conn: &Connection, table: &str, row: &Row) -> Result<i64, StoreError> {
    let sql = insert_sql(table, row);
    let mut stmt = conn.prepare_cached(&sql)?;
    stmt.execute(params_from_iter(row.iter().map(|(_, cell)| cell)))?;
    Ok(conn.last_insert_rowid())
}

impl TableStore for SqliteStore {
    fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1")?;
        let count: i64 = stmt.query_row([table], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn columns(&self, table: &str) -> Result<ColumnSet, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT name, type FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([table], |row| {
                let name: String = row.get(0)?;
                let declared: String = row.get(1)?;
                Ok(ColumnSpec::new(name, ColumnType::from_declared(&declared)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut set = ColumnSet::new();
        for column in columns {
            set.insert(column);
        }
        Ok(set)
    }

    fn create_table(&self, table: &str, columns: &ColumnSet) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(&create_table_sql(table, columns), [])?;
        Ok(())
    }

    fn add_column(&self, table: &str, column: &ColumnSpec) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(&add_column_sql(table, column), [])?;
        Ok(())
    }

    fn insert_row(&self, table: &str, row: &Row) -> Result<Option<i64>, StoreError> {
        let conn = self.conn()?;
        insert_with(&conn, table, row).map(Some)
    }

    fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        for row in rows {
            insert_with(&conn, table, row)?;
        }
        Ok(rows.len())
    }

    fn rows(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote(table)))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map([], |r| {
                let mut row = Row::new();
                for (i, name) in names.iter().enumerate() {
                    row.set(name.clone(), cell_from_ref(r.get_ref(i)?));
                }
                Ok(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn tables(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn begin(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch("ROLLBACK")?;
        Ok(())
    }
}
