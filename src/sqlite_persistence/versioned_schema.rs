use anyhow::{bail, Result};
use rusqlite::{params, Connection};
use tracing::info;

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

/// Offset added to schema versions before they are stored in `user_version`,
/// so a fresh SQLite file (`user_version = 0`) is never mistaken for ours.
pub const BASE_DB_VERSION: usize = 99999;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = $crate::sqlite_persistence::Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }

}

#[allow(unused)]
pub enum ForeignKeyOnChange {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ForeignKeyOnChange {
    fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyOnChange::NoAction => "NO ACTION",
            ForeignKeyOnChange::Restrict => "RESTRICT",
            ForeignKeyOnChange::SetNull => "SET NULL",
            ForeignKeyOnChange::SetDefault => "SET DEFAULT",
            ForeignKeyOnChange::Cascade => "CASCADE",
        }
    }
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: ForeignKeyOnChange,
}

pub struct Column<'a, S: AsRef<str>> {
    pub name: S,
    pub sql_type: &'a SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<S>,
    pub foreign_key: Option<&'a ForeignKey>,
}

impl Column<'_, &'static str> {
    /// The column clause as it appears inside `CREATE TABLE`.
    fn definition(&self) -> String {
        let mut parts = vec![self.name.to_string(), self.sql_type.as_sql().to_string()];
        if self.is_primary_key {
            parts.push("PRIMARY KEY".to_string());
        }
        if self.non_null {
            parts.push("NOT NULL".to_string());
        }
        if self.is_unique {
            parts.push("UNIQUE".to_string());
        }
        if let Some(default_value) = self.default_value {
            parts.push(format!("DEFAULT {}", default_value));
        }
        if let Some(fk) = self.foreign_key {
            parts.push(fk.clause());
        }
        parts.join(" ")
    }

    /// Attributes that `PRAGMA table_info` can report back.
    fn signature(&self) -> ColumnSignature {
        ColumnSignature {
            name: self.name.to_string(),
            sql_type: self.sql_type.as_sql().to_string(),
            non_null: self.non_null,
            default_value: self.default_value.map(unwrap_default),
            is_primary_key: self.is_primary_key,
        }
    }
}

impl ForeignKey {
    fn clause(&self) -> String {
        format!(
            "REFERENCES {}({}) ON DELETE {}",
            self.foreign_table,
            self.foreign_column,
            self.on_delete.as_sql()
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ColumnSignature {
    name: String,
    sql_type: String,
    non_null: bool,
    default_value: Option<String>,
    is_primary_key: bool,
}

impl ColumnSignature {
    fn from_table_info(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        // table_info: cid, name, type, notnull, dflt_value, pk
        Ok(Self {
            name: row.get(1)?,
            sql_type: row.get::<_, String>(2)?.to_uppercase(),
            non_null: row.get::<_, i32>(3)? != 0,
            default_value: row.get::<_, Option<String>>(4)?.as_deref().map(unwrap_default),
            is_primary_key: row.get::<_, i32>(5)? != 0,
        })
    }
}

/// SQLite echoes expression defaults back wrapped in one pair of parentheses.
fn unwrap_default(value: &str) -> String {
    value
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(value)
        .to_string()
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column<'static, &'static str>],
    /// `(index name, column)` pairs.
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    fn create_sql(&self) -> String {
        let clauses: Vec<String> = self
            .columns
            .iter()
            .map(|column| column.definition())
            .chain(
                self.unique_constraints
                    .iter()
                    .map(|columns| format!("UNIQUE ({})", columns.join(", "))),
            )
            .collect();
        format!("CREATE TABLE {} ({});", self.name, clauses.join(", "))
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), [])?;
        for (index, column) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index, self.name, column),
                [],
            )?;
        }
        Ok(())
    }

    /// Every difference between the live table and its declaration.
    fn drift(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut problems = Vec::new();

        let live: Vec<ColumnSignature> = conn
            .prepare(&format!("PRAGMA table_info({})", self.name))?
            .query_map([], ColumnSignature::from_table_info)?
            .collect::<Result<_, _>>()?;
        let declared: Vec<ColumnSignature> =
            self.columns.iter().map(|column| column.signature()).collect();

        if live.len() != declared.len() {
            let names = |cols: &[ColumnSignature]| {
                cols.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
            };
            problems.push(format!(
                "has columns [{}], expected [{}]",
                names(&live[..]),
                names(&declared[..])
            ));
        } else {
            for (found, wanted) in live.iter().zip(&declared) {
                if found != wanted {
                    problems.push(format!(
                        "column {} is {:?}, expected {:?}",
                        wanted.name, found, wanted
                    ));
                }
            }
        }

        for (index, _) in self.indices {
            let present: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master \
                 WHERE type = 'index' AND name = ?1 AND tbl_name = ?2)",
                params![index, self.name],
                |row| row.get(0),
            )?;
            if !present {
                problems.push(format!("missing index '{}'", index));
            }
        }

        // foreign_key_list: id, seq, table, from, to, on_update, on_delete, match
        let live_fks: Vec<String> = conn
            .prepare(&format!("PRAGMA foreign_key_list({})", self.name))?
            .query_map([], |row| {
                Ok(format!(
                    "{} REFERENCES {}({}) ON DELETE {}",
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(6)?
                ))
            })?
            .collect::<Result<_, _>>()?;
        for column in self.columns {
            if let Some(fk) = column.foreign_key {
                let wanted = format!("{} {}", column.name, fk.clause());
                if !live_fks.contains(&wanted) {
                    problems.push(format!("missing foreign key {}", wanted));
                }
            }
        }

        Ok(problems)
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "foreign_keys", true)?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.pragma_update(None, "user_version", BASE_DB_VERSION + self.version)?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let mut problems = Vec::new();
        for table in self.tables {
            problems.extend(
                table
                    .drift(conn)?
                    .into_iter()
                    .map(|problem| format!("table {} {}", table.name, problem)),
            );
        }
        if !problems.is_empty() {
            bail!(
                "Schema version {} does not match the database: {}",
                self.version,
                problems.join("; ")
            );
        }
        Ok(())
    }
}

/// Brings `conn` to the latest of `schemas`: creates it on an empty database,
/// runs the pending migrations on an older one, then validates the result.
pub fn migrate_if_needed(conn: &mut Connection, schemas: &[VersionedSchema]) -> Result<()> {
    let latest = schemas
        .last()
        .ok_or_else(|| anyhow::anyhow!("No schema versions declared"))?;

    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;

    if table_count == 0 {
        info!("Creating db schema at version {}", latest.version);
        latest.create(conn)?;
        return Ok(());
    }

    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if db_version < BASE_DB_VERSION as i64 {
        bail!(
            "Database has user_version {}, which was not written by this schema",
            db_version
        );
    }
    let mut current_version = (db_version - BASE_DB_VERSION as i64) as usize;
    if current_version > latest.version {
        bail!(
            "Database schema version {} is newer than supported version {}",
            current_version,
            latest.version
        );
    }

    if current_version < latest.version {
        let tx = conn.transaction()?;
        let start_version = current_version;
        for schema in schemas.iter().filter(|s| s.version > start_version) {
            if let Some(migration_fn) = schema.migration {
                info!(
                    "Migrating db from version {} to {}",
                    current_version, schema.version
                );
                migration_fn(&tx)?;
            }
            current_version = schema.version;
        }
        tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
        tx.commit()?;
    }

    conn.pragma_update(None, "foreign_keys", true)?;
    #[cfg(not(feature = "no_checks"))]
    latest.validate(conn)?;
    Ok(())
}
