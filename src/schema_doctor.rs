//! Detects drift between a live SQLite database and the expected POS schema.
//!
//! Only additive fixes are ever applied: missing tables, missing columns (added
//! as nullable, since SQLite cannot add a NOT NULL column without a default) and
//! missing unique indexes. Type and nullability differences are reported only.

use rusqlite::{Connection, params};
use std::collections::HashMap;
use std::fmt;

use crate::migrations::{IndexSpec, TABLES, TableSpec, UNIQUE_INDEXES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaAction {
    CreateTable {
        table: &'static str,
    },
    AddColumn {
        table: &'static str,
        column: &'static str,
        sql_type: &'static str,
    },
    CreateIndex {
        index: &'static str,
        sql: String,
    },
    TypeMismatch {
        table: &'static str,
        column: &'static str,
        found: String,
        expected: &'static str,
    },
    NullabilityMismatch {
        table: &'static str,
        column: &'static str,
    },
}

impl SchemaAction {
    /// Whether `apply` would execute something for this action.
    pub fn is_fix(&self) -> bool {
        !matches!(
            self,
            SchemaAction::TypeMismatch { .. } | SchemaAction::NullabilityMismatch { .. }
        )
    }
}

impl fmt::Display for SchemaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaAction::CreateTable { table } => write!(f, "CREATE TABLE {table}"),
            SchemaAction::AddColumn {
                table,
                column,
                sql_type,
            } => write!(f, "ALTER TABLE {table} ADD COLUMN {column} {sql_type}"),
            SchemaAction::CreateIndex { sql, .. } => f.write_str(sql),
            SchemaAction::TypeMismatch {
                table,
                column,
                found,
                expected,
            } => write!(
                f,
                "WARN type mismatch {table}.{column}: db={found}, expected={expected}"
            ),
            SchemaAction::NullabilityMismatch { table, column } => write!(
                f,
                "WARN nullability mismatch {table}.{column}: db NOT NULL, expected NULLable"
            ),
        }
    }
}

/// Type affinity per SQLite's column-type rules, so `VARCHAR(64)` and `TEXT` compare equal.
pub fn affinity(declared: &str) -> &'static str {
    let t = declared.to_ascii_uppercase();
    if t.contains("INT") {
        "INTEGER"
    } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
        "TEXT"
    } else if t.is_empty() || t.contains("BLOB") {
        "BLOB"
    } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
        "REAL"
    } else {
        "NUMERIC"
    }
}

struct ExistingColumn {
    declared_type: String,
    not_null: bool,
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
}

fn existing_columns(
    conn: &Connection,
    table: &str,
) -> rusqlite::Result<HashMap<String, ExistingColumn>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info('{table}')"))?;
    let rows = stmt.query_map([], |row| {
        // cid, name, type, notnull, dflt_value, pk
        let name: String = row.get(1)?;
        let declared_type: String = row.get(2)?;
        let not_null: i64 = row.get(3)?;
        Ok((
            name.to_ascii_uppercase(),
            ExistingColumn {
                declared_type,
                not_null: not_null != 0,
            },
        ))
    })?
    .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

fn has_unique_index(conn: &Connection, spec: &IndexSpec) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list('{}')", spec.table))?;
    let indexes = stmt
        .query_map([], |row| {
            // seq, name, unique, origin, partial
            Ok((row.get::<_, String>(1)?, row.get::<_, i64>(2)? == 1))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (name, unique) in indexes {
        if !unique {
            continue;
        }
        let mut info = conn.prepare(&format!("PRAGMA index_info('{name}')"))?;
        let columns = info
            .query_map([], |row| row.get::<_, String>(2))?
            .map(|c| c.map(|c| c.to_ascii_uppercase()))
            .collect::<Result<Vec<_>, _>>()?;
        if columns.iter().map(String::as_str).eq(spec.columns.iter().copied()) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn check_columns(
    table: &TableSpec,
    existing: &HashMap<String, ExistingColumn>,
    actions: &mut Vec<SchemaAction>,
) {
    for spec in table.columns {
        match existing.get(spec.name) {
            None => actions.push(SchemaAction::AddColumn {
                table: table.name,
                column: spec.name,
                sql_type: spec.sql_type,
            }),
            Some(col) => {
                if !col.declared_type.is_empty()
                    && affinity(&col.declared_type) != affinity(spec.sql_type)
                {
                    actions.push(SchemaAction::TypeMismatch {
                        table: table.name,
                        column: spec.name,
                        found: col.declared_type.to_ascii_uppercase(),
                        expected: spec.sql_type,
                    });
                }
                if col.not_null && spec.nullable {
                    actions.push(SchemaAction::NullabilityMismatch {
                        table: table.name,
                        column: spec.name,
                    });
                }
            }
        }
    }
}

/// Compare the database against the expected schema. Executes nothing.
pub fn plan(conn: &Connection) -> rusqlite::Result<Vec<SchemaAction>> {
    let mut actions = Vec::new();
    for table in &TABLES {
        if table_exists(conn, table.name)? {
            let existing = existing_columns(conn, table.name)?;
            check_columns(table, &existing, &mut actions);
        } else {
            actions.push(SchemaAction::CreateTable { table: table.name });
        }
    }
    for index in &UNIQUE_INDEXES {
        if !has_unique_index(conn, index)? {
            actions.push(SchemaAction::CreateIndex {
                index: index.name,
                sql: index.create_sql(),
            });
        }
    }
    Ok(actions)
}

/// Execute the fixable actions from `plan`, returning what was applied.
pub fn apply(conn: &Connection, actions: &[SchemaAction]) -> rusqlite::Result<Vec<String>> {
    let mut applied = Vec::new();
    for action in actions {
        match action {
            SchemaAction::CreateTable { table } => {
                if let Some(spec) = TABLES.iter().find(|t| t.name == *table) {
                    conn.execute_batch(spec.create_sql)?;
                    applied.push(format!("(applied) table {table}"));
                }
            }
            SchemaAction::AddColumn { table, column, .. } => {
                conn.execute_batch(&action.to_string())?;
                applied.push(format!("(applied) {table}.{column}"));
            }
            SchemaAction::CreateIndex { index, sql } => {
                conn.execute_batch(sql)?;
                applied.push(format!("(applied) index {index}"));
            }
            SchemaAction::TypeMismatch { .. } | SchemaAction::NullabilityMismatch { .. } => {}
        }
    }
    Ok(applied)
}
