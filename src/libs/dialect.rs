//! SQL rendering for the supported backends.
//!
//! Every statement the engine sends is built here so the editors and the
//! runtime models stay backend-agnostic. Identifiers are always quoted.

use crate::libs::error::{Error, Result};
use crate::libs::inspector::ColumnInfo;
use crate::libs::schema::{DataType, PRIMARY_KEY};

/// Suffix of the scratch table used while rebuilding a SQLite table.
const REBUILD_SUFFIX: &str = "__dynaschema_rebuild";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Dialect::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(Dialect::Sqlite)
        } else {
            Err(Error::config(format!("unsupported database url: {url}")))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    pub fn quote(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Bind placeholder for the `n`th parameter (1-based).
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Placeholder for a value written into a column of `data_type`.
    /// Timestamps travel as RFC 3339 text.
    pub fn value_placeholder(&self, n: usize, data_type: &DataType) -> String {
        match (self, data_type) {
            (Dialect::Postgres, DataType::DateTime) => format!("CAST(${n} AS TIMESTAMPTZ)"),
            _ => self.placeholder(n),
        }
    }

    /// Expression selecting `column` in a form the `Any` driver can decode.
    pub fn select_expr(&self, column: &str, data_type: &DataType) -> String {
        let quoted = self.quote(column);
        match (self, data_type) {
            (Dialect::Postgres, DataType::DateTime) => format!("CAST({quoted} AS TEXT) AS {quoted}"),
            _ => quoted,
        }
    }

    pub fn column_type(&self, data_type: &DataType) -> String {
        match (self, data_type) {
            (Dialect::Postgres, DataType::Integer) => "BIGINT".to_string(),
            (Dialect::Sqlite, DataType::Integer) => "INTEGER".to_string(),
            (Dialect::Postgres, DataType::Float) => "DOUBLE PRECISION".to_string(),
            (Dialect::Sqlite, DataType::Float) => "REAL".to_string(),
            (Dialect::Postgres, DataType::Boolean) => "BOOLEAN".to_string(),
            // the Any driver cannot decode SQLite's BOOLEAN affinity
            (Dialect::Sqlite, DataType::Boolean) => "INTEGER".to_string(),
            (_, DataType::Character { max_length }) => format!("VARCHAR({max_length})"),
            (_, DataType::Text) => "TEXT".to_string(),
            (Dialect::Postgres, DataType::DateTime) => "TIMESTAMPTZ".to_string(),
            (Dialect::Sqlite, DataType::DateTime) => "TEXT".to_string(),
        }
    }

    /// Literal used to back-fill existing rows when a NOT NULL column is added.
    pub fn zero_default(&self, data_type: &DataType) -> &'static str {
        match (self, data_type) {
            (_, DataType::Integer) | (_, DataType::Float) => "0",
            (Dialect::Postgres, DataType::Boolean) => "FALSE",
            (Dialect::Sqlite, DataType::Boolean) => "0",
            (_, DataType::Character { .. }) | (_, DataType::Text) => "''",
            (Dialect::Postgres, DataType::DateTime) => "'1970-01-01 00:00:00+00'",
            (Dialect::Sqlite, DataType::DateTime) => "'1970-01-01T00:00:00Z'",
        }
    }

    fn primary_key_definition(&self) -> String {
        let pk = self.quote(PRIMARY_KEY);
        match self {
            Dialect::Postgres => format!("{pk} BIGSERIAL PRIMARY KEY"),
            Dialect::Sqlite => format!("{pk} INTEGER PRIMARY KEY AUTOINCREMENT"),
        }
    }

    pub fn column_definition(&self, column: &str, data_type: &DataType, null: bool) -> String {
        let mut def = format!("{} {}", self.quote(column), self.column_type(data_type));
        if !null {
            def.push_str(" NOT NULL");
        }
        def
    }

    // -------- Tables --------

    /// `columns` are full definitions from `column_definition`; the primary
    /// key is prepended.
    pub fn create_table(&self, table: &str, columns: &[String]) -> String {
        let mut defs = vec![self.primary_key_definition()];
        defs.extend(columns.iter().cloned());
        format!("CREATE TABLE {} ({})", self.quote(table), defs.join(", "))
    }

    pub fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote(table))
    }

    pub fn rename_table(&self, from: &str, to: &str) -> String {
        format!("ALTER TABLE {} RENAME TO {}", self.quote(from), self.quote(to))
    }

    // -------- Columns --------

    /// Statements adding one column. NOT NULL columns get the type's zero
    /// default so existing rows stay valid; PostgreSQL drops it again.
    pub fn add_column(&self, table: &str, column: &str, data_type: &DataType, null: bool) -> Vec<String> {
        let table_q = self.quote(table);
        let def = self.column_definition(column, data_type, null);
        if null {
            return vec![format!("ALTER TABLE {table_q} ADD COLUMN {def}")];
        }

        let default = self.zero_default(data_type);
        let add = format!("ALTER TABLE {table_q} ADD COLUMN {def} DEFAULT {default}");
        match self {
            Dialect::Postgres => vec![
                add,
                format!(
                    "ALTER TABLE {table_q} ALTER COLUMN {} DROP DEFAULT",
                    self.quote(column)
                ),
            ],
            Dialect::Sqlite => vec![add],
        }
    }

    pub fn drop_column(&self, table: &str, column: &str) -> String {
        format!("ALTER TABLE {} DROP COLUMN {}", self.quote(table), self.quote(column))
    }

    pub fn rename_column(&self, table: &str, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote(table),
            self.quote(from),
            self.quote(to)
        )
    }

    /// In-place nullability change, when the backend has one.
    pub fn set_nullable(&self, table: &str, column: &str, null: bool) -> Option<String> {
        match self {
            Dialect::Postgres => {
                let action = if null { "DROP NOT NULL" } else { "SET NOT NULL" };
                Some(format!(
                    "ALTER TABLE {} ALTER COLUMN {} {action}",
                    self.quote(table),
                    self.quote(column)
                ))
            }
            Dialect::Sqlite => None,
        }
    }

    /// Single-quoted SQL string literal.
    pub fn literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Statements recreating a SQLite table with `column`'s nullability
    /// flipped to `null`, copying every row across. The AUTOINCREMENT
    /// counter is carried over so deleted ids are never handed out again.
    pub fn rebuild_table(&self, table: &str, columns: &[ColumnInfo], column: &str, null: bool) -> Vec<String> {
        let scratch = format!("{table}{REBUILD_SUFFIX}");

        let defs: Vec<String> = columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", self.quote(&c.name), c.sql_type);
                let nullable = if c.name == column { null } else { c.nullable };
                if c.primary_key {
                    def.push_str(" PRIMARY KEY");
                    if c.sql_type.eq_ignore_ascii_case("INTEGER") {
                        def.push_str(" AUTOINCREMENT");
                    }
                } else if !nullable {
                    def.push_str(" NOT NULL");
                }
                if let Some(default) = &c.default_value {
                    def.push_str(&format!(" DEFAULT {default}"));
                }
                def
            })
            .collect();
        let names: Vec<String> = columns.iter().map(|c| self.quote(&c.name)).collect();
        let names = names.join(", ");

        let mut statements = vec![
            format!("CREATE TABLE {} ({})", self.quote(&scratch), defs.join(", ")),
            format!(
                "INSERT INTO {} ({names}) SELECT {names} FROM {}",
                self.quote(&scratch),
                self.quote(table)
            ),
        ];
        if columns.iter().any(|c| c.primary_key && c.sql_type.eq_ignore_ascii_case("INTEGER")) {
            let scratch_lit = self.literal(&scratch);
            statements.push(format!("DELETE FROM sqlite_sequence WHERE name = {scratch_lit}"));
            statements.push(format!(
                "INSERT INTO sqlite_sequence (name, seq) \
                 SELECT {scratch_lit}, seq FROM sqlite_sequence WHERE name = {}",
                self.literal(table)
            ));
        }
        statements.push(self.drop_table(table));
        statements.push(self.rename_table(&scratch, table));
        statements
    }

    // -------- Catalog --------

    pub fn table_exists_query(&self) -> String {
        match self {
            Dialect::Postgres => "SELECT COUNT(*) AS n FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
                .to_string(),
            Dialect::Sqlite => {
                "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?".to_string()
            }
        }
    }

    pub fn table_columns_query(&self) -> String {
        match self {
            Dialect::Postgres => "SELECT CAST(c.column_name AS TEXT) AS name, \
                 CAST(c.data_type AS TEXT) AS sql_type, \
                 CAST(c.is_nullable AS TEXT) AS is_nullable, \
                 CAST(c.column_default AS TEXT) AS default_value, \
                 EXISTS (SELECT 1 FROM information_schema.table_constraints tc \
                   JOIN information_schema.key_column_usage k \
                     ON tc.constraint_name = k.constraint_name AND tc.table_schema = k.table_schema \
                   WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = c.table_schema \
                     AND tc.table_name = c.table_name AND k.column_name = c.column_name) AS primary_key \
                 FROM information_schema.columns c \
                 WHERE c.table_schema = current_schema() AND c.table_name = $1 \
                 ORDER BY c.ordinal_position"
                .to_string(),
            Dialect::Sqlite => "SELECT name, type AS sql_type, \"notnull\" AS not_null, \
                 dflt_value AS default_value, pk AS primary_key \
                 FROM pragma_table_info(?) ORDER BY cid"
                .to_string(),
        }
    }
}
