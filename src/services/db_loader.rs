use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{types::ValueRef, Connection, ToSql};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::AppError;
use crate::services::analysis::missing::infer_type;
use crate::services::table::utils::suffix_duplicates;
use crate::services::table::{Cell, Table};

const FORBIDDEN_KEYWORDS: [&str; 11] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE", "EXEC", "EXECUTE",
];

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("word regex"));

#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub row_count: usize,
    pub execution_time: String,
}

#[derive(Debug, Serialize)]
pub struct SchemaColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    pub nullable: bool,
}

#[derive(Debug, Serialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<SchemaColumn>,
}

/// A loaded table copied into an in-memory SQLite database for read-only
/// querying.
pub struct SqlWorkspace {
    conn: Connection,
    table_name: String,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn cell_param(cell: &Cell) -> Box<dyn ToSql> {
    match cell {
        Cell::Missing => Box::new(rusqlite::types::Null),
        Cell::Bool(b) => Box::new(*b),
        Cell::Int(i) => Box::new(*i),
        Cell::Float(f) => Box::new(*f),
        Cell::DateTime(_) | Cell::Text(_) => Box::new(cell.to_string()),
    }
}

fn sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

fn words_upper(sql: &str) -> impl Iterator<Item = String> + '_ {
    WORD.find_iter(sql).map(|m| m.as_str().to_uppercase())
}

/// Read-only check: a single `SELECT` with no data- or schema-changing keyword.
pub fn is_safe_query(sql: &str) -> bool {
    let trimmed = sql.trim();
    if !trimmed.to_uppercase().starts_with("SELECT") {
        return false;
    }
    !words_upper(trimmed).any(|word| FORBIDDEN_KEYWORDS.contains(&word.as_str()))
}

/// Appends `LIMIT n` unless the statement already has one.
pub fn apply_limit(sql: &str, limit: usize) -> String {
    let base = sql.trim().trim_end_matches(';').trim_end();
    if limit == 0 || words_upper(base).any(|word| word == "LIMIT") {
        base.to_string()
    } else {
        format!("{} LIMIT {}", base, limit)
    }
}

impl SqlWorkspace {
    pub fn from_table(table: &Table, table_name: &str) -> Result<Self, AppError> {
        if table.column_count() == 0 {
            return Err(AppError::InvalidArgument(format!(
                "Table {} has no columns to query",
                table_name
            )));
        }
        let mut conn = Connection::open_in_memory()?;

        // SQLite identifiers are case-insensitive; `Name` and `name` cannot share a table.
        let names = suffix_duplicates(
            table.columns().iter().map(|col| col.name.clone()),
            str::to_lowercase,
        );
        let column_defs: Vec<String> = table
            .columns()
            .iter()
            .zip(&names)
            .map(|(col, name)| {
                let sql_type = infer_type(col.non_missing()).sql_type();
                format!("{} {}", quote_ident(name), sql_type)
            })
            .collect();
        let create_sql = format!("CREATE TABLE {} ({})", quote_ident(table_name), column_defs.join(", "));
        debug!("Create table SQL: {}", create_sql);
        conn.execute(&create_sql, [])?;

        let insert_sql = format!(
            "INSERT INTO {} VALUES ({})",
            quote_ident(table_name),
            vec!["?"; table.column_count()].join(", ")
        );

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert_sql)?;
            for row_idx in 0..table.row_count() {
                let params: Vec<Box<dyn ToSql>> =
                    table.columns().iter().map(|col| cell_param(&col.cells[row_idx])).collect();
                let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
                stmt.execute(refs.as_slice())?;
            }
        }
        tx.commit()?;

        info!("Loaded {} rows into table {}", table.row_count(), table_name);
        Ok(Self {
            conn,
            table_name: table_name.to_string(),
        })
    }

    pub fn query(&self, sql: &str, limit: usize) -> Result<QueryResult, AppError> {
        if !is_safe_query(sql) {
            return Err(AppError::InvalidArgument(format!(
                "Only SELECT queries are allowed: {}",
                sql.trim()
            )));
        }
        let query = apply_limit(sql, limit);
        debug!("Executing query: {}", query);

        let mut stmt = self.conn.prepare(&query)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = Vec::new();
        let mut result_rows = stmt.query([])?;
        while let Some(row) = result_rows.next()? {
            let mut record = Map::new();
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), sql_value(row.get_ref(idx)?));
            }
            rows.push(record);
        }

        info!("Query returned {} rows", rows.len());
        Ok(QueryResult {
            query,
            columns,
            row_count: rows.len(),
            rows,
            execution_time: Utc::now().to_rfc3339(),
        })
    }

    pub fn schema(&self) -> Result<TableSchema, AppError> {
        let pragma_sql = format!("PRAGMA table_info({})", quote_ident(&self.table_name));
        let mut stmt = self.conn.prepare(&pragma_sql)?;
        let columns = stmt
            .query_map([], |row| {
                Ok(SchemaColumn {
                    name: row.get::<_, String>(1)?,
                    sql_type: row.get::<_, String>(2)?,
                    nullable: row.get::<_, i64>(3)? == 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TableSchema {
            table_name: self.table_name.clone(),
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::table::Column;

    fn workspace() -> SqlWorkspace {
        let table = Table::new(vec![
            Column::new(
                "company name",
                vec![Cell::Text("Acme".into()), Cell::Text("Globex".into()), Cell::Text("Initech".into())],
            ),
            Column::new("employees", vec![Cell::Int(120), Cell::Missing, Cell::Int(40)]),
            Column::new("revenue", vec![Cell::Float(1.5), Cell::Int(2), Cell::Missing]),
        ])
        .unwrap();
        SqlWorkspace::from_table(&table, "companies").unwrap()
    }

    #[test]
    fn test_schema_types() {
        let schema = workspace().schema().unwrap();
        assert_eq!(schema.table_name, "companies");
        let types: Vec<(&str, &str)> = schema
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.sql_type.as_str()))
            .collect();
        assert_eq!(
            types,
            vec![("company name", "TEXT"), ("employees", "INTEGER"), ("revenue", "REAL")]
        );
        assert!(schema.columns.iter().all(|c| c.nullable));
    }

    #[test]
    fn test_query_with_nulls() {
        let result = workspace()
            .query(r#"SELECT "company name", employees FROM companies WHERE employees IS NULL"#, 100)
            .unwrap();
        assert_eq!(result.columns, vec!["company name", "employees"]);
        assert_eq!(result.row_count, 1);
        assert_eq!(result.rows[0]["company name"], "Globex");
        assert_eq!(result.rows[0]["employees"], Value::Null);
        assert!(result.query.ends_with("LIMIT 100"));
    }

    #[test]
    fn test_limit_applied() {
        let result = workspace().query("SELECT * FROM companies;", 2).unwrap();
        assert_eq!(result.row_count, 2);
        assert_eq!(result.query, "SELECT * FROM companies LIMIT 2");

        let result = workspace().query("select * from companies limit 1", 2).unwrap();
        assert_eq!(result.row_count, 1);
    }

    #[test]
    fn test_unsafe_queries_rejected() {
        let ws = workspace();
        for sql in [
            "DELETE FROM companies",
            "SELECT * FROM companies; DROP TABLE companies",
            "  update companies set employees = 1",
            "PRAGMA table_info(companies)",
        ] {
            assert!(matches!(ws.query(sql, 10), Err(AppError::InvalidArgument(_))), "{}", sql);
        }
    }

    #[test]
    fn test_keyword_substrings_are_allowed() {
        assert!(is_safe_query("SELECT created_at, updated_by FROM t"));
        assert!(!is_safe_query("SELECT 1; CREATE TABLE x (a)"));
    }

    #[test]
    fn test_sql_errors_map_to_database() {
        let err = workspace().query("SELECT missing_column FROM companies", 10).unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn test_case_insensitive_duplicate_columns() {
        let table = Table::new(vec![
            Column::new("Name", vec![Cell::Text("Acme".into())]),
            Column::new("name", vec![Cell::Text("acme corp".into())]),
        ])
        .unwrap();
        let ws = SqlWorkspace::from_table(&table, "companies").unwrap();

        let names: Vec<String> = ws.schema().unwrap().columns.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Name", "name.1"]);

        let result = ws.query(r#"SELECT "name.1" FROM companies"#, 10).unwrap();
        assert_eq!(result.rows[0]["name.1"], "acme corp");
    }

    #[test]
    fn test_apply_limit() {
        assert_eq!(apply_limit("SELECT 1", 0), "SELECT 1");
        assert_eq!(apply_limit("SELECT 1 ;", 5), "SELECT 1 LIMIT 5");
    }
}
