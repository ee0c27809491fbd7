// Record Mapper: raw rows <-> typed records <-> wire payloads
//
// Every record type declares a static `EntitySchema`. Rows coming back from the store
// are resolved against that schema once per row (column positions), then read through
// typed getters that enforce presence, nullability and type compatibility.

pub mod wire;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use wire::{format_timestamp, parse_timestamp, record_to_wire, wire_to_record};

/// SQL column / parameter types understood by the mapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
    /// Stored as RFC 3339 text, surfaced as `DateTime<Utc>`
    Timestamp,
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::Real => write!(f, "REAL"),
            SqlType::Text => write!(f, "TEXT"),
            SqlType::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

/// A single relational value, either read from a row or bound as a parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Type of a non-null value (`None` for NULL)
    pub fn sql_type(&self) -> Option<SqlType> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(_) => Some(SqlType::Integer),
            SqlValue::Real(_) => Some(SqlType::Real),
            SqlValue::Text(_) => Some(SqlType::Text),
            SqlValue::Timestamp(_) => Some(SqlType::Timestamp),
        }
    }

    fn describe(&self) -> String {
        match self.sql_type() {
            Some(ty) => ty.to_string(),
            None => "NULL".to_string(),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Mapping failures between rows, records and wire payloads
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("column '{column}' missing from {table} row")]
    MissingColumn { table: &'static str, column: String },

    #[error("column '{table}.{column}' is NULL but the field is not optional")]
    UnexpectedNull { table: &'static str, column: String },

    #[error("column '{table}.{column}' expected {expected}, found {found}")]
    TypeMismatch {
        table: &'static str,
        column: String,
        expected: SqlType,
        found: String,
    },

    #[error("schema mismatch for table '{table}': {detail}")]
    SchemaMismatch { table: &'static str, detail: String },

    #[error("invalid wire payload: {0}")]
    Wire(String),
}

/// One result row: column names and their values, in select-list order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column (builder style)
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.push(column.into());
        self.values.push(value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn value(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Static description of one column of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: SqlType,
    pub nullable: bool,
    /// `false` for columns computed by the query (aggregates), which the
    /// startup check does not look for in the table definition
    pub stored: bool,
}

impl ColumnDef {
    pub const fn stored(name: &'static str, ty: SqlType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            stored: true,
        }
    }

    pub const fn derived(name: &'static str, ty: SqlType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            stored: false,
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }
}

/// A column as reported by the live table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Column-to-field description of one entity table
#[derive(Debug)]
pub struct EntitySchema {
    pub table: &'static str,
    pub columns: &'static [ColumnDef],
}

impl EntitySchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn stored_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.stored)
    }

    /// Compare the declared stored columns with the live table definition.
    ///
    /// Checked once at startup rather than per row.
    pub fn verify_table(&self, actual: &[TableColumn]) -> Result<(), MappingError> {
        if actual.is_empty() {
            return Err(MappingError::SchemaMismatch {
                table: self.table,
                detail: "table does not exist".to_string(),
            });
        }

        for column in self.stored_columns() {
            let found = actual
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(column.name));

            let Some(found) = found else {
                return Err(MappingError::SchemaMismatch {
                    table: self.table,
                    detail: format!("missing column '{}'", column.name),
                });
            };

            if !affinity_matches(column.ty, &found.declared_type) {
                return Err(MappingError::SchemaMismatch {
                    table: self.table,
                    detail: format!(
                        "column '{}' declared {} but table has {}",
                        column.name, column.ty, found.declared_type
                    ),
                });
            }

            // SQLite reports INTEGER PRIMARY KEY as nullable; it is the rowid
            if !column.nullable && !found.not_null && !found.primary_key {
                return Err(MappingError::SchemaMismatch {
                    table: self.table,
                    detail: format!("column '{}' must be NOT NULL", column.name),
                });
            }
        }

        Ok(())
    }
}

fn affinity_matches(ty: SqlType, declared: &str) -> bool {
    let declared = declared.to_ascii_uppercase();
    match ty {
        SqlType::Integer => declared.contains("INT"),
        SqlType::Real => {
            declared.contains("REAL") || declared.contains("FLOA") || declared.contains("DOUB")
        }
        SqlType::Text | SqlType::Timestamp => {
            declared.contains("TEXT") || declared.contains("CHAR") || declared.contains("CLOB")
        }
    }
}

/// A typed record that can be built from a row
pub trait Record: Sized {
    fn schema() -> &'static EntitySchema;

    fn from_fields(fields: &Fields<'_>) -> Result<Self, MappingError>;
}

/// Map a row into a typed record using the record's static schema
pub fn row_to_record<R: Record>(row: &Row) -> Result<R, MappingError> {
    let fields = Fields::bind(row, R::schema())?;
    R::from_fields(&fields)
}

/// Map every row, failing on the first bad one
pub fn rows_to_records<R: Record>(rows: &[Row]) -> Result<Vec<R>, MappingError> {
    rows.iter().map(row_to_record).collect()
}

/// A row resolved against a schema: typed, checked access by column name
pub struct Fields<'r> {
    schema: &'static EntitySchema,
    row: &'r Row,
    positions: Vec<usize>,
}

impl<'r> Fields<'r> {
    /// Resolve every schema column to its position in the row
    pub fn bind(row: &'r Row, schema: &'static EntitySchema) -> Result<Self, MappingError> {
        let positions = schema
            .columns
            .iter()
            .map(|column| {
                row.position(column.name)
                    .ok_or_else(|| MappingError::MissingColumn {
                        table: schema.table,
                        column: column.name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            schema,
            row,
            positions,
        })
    }

    fn lookup(&self, name: &str) -> Result<(&ColumnDef, &'r SqlValue), MappingError> {
        let missing = || MappingError::MissingColumn {
            table: self.schema.table,
            column: name.to_string(),
        };
        let index = self
            .schema
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(missing)?;
        let value = self.row.value(self.positions[index]).ok_or_else(missing)?;
        Ok((&self.schema.columns[index], value))
    }

    fn mismatch(&self, column: &ColumnDef, value: &SqlValue) -> MappingError {
        MappingError::TypeMismatch {
            table: self.schema.table,
            column: column.name.to_string(),
            expected: column.ty,
            found: value.describe(),
        }
    }

    /// Value of a column, `None` if NULL in an optional column
    fn non_null(&self, name: &str) -> Result<Option<(&ColumnDef, &'r SqlValue)>, MappingError> {
        let (column, value) = self.lookup(name)?;
        if matches!(value, SqlValue::Null) {
            if column.nullable {
                return Ok(None);
            }
            return Err(MappingError::UnexpectedNull {
                table: self.schema.table,
                column: name.to_string(),
            });
        }
        Ok(Some((column, value)))
    }

    pub fn opt_i64(&self, name: &str) -> Result<Option<i64>, MappingError> {
        let Some((column, value)) = self.non_null(name)? else {
            return Ok(None);
        };
        match (column.ty, value) {
            (SqlType::Integer, SqlValue::Integer(v)) => Ok(Some(*v)),
            _ => Err(self.mismatch(column, value)),
        }
    }

    pub fn i64(&self, name: &str) -> Result<i64, MappingError> {
        self.required(name, self.opt_i64(name)?)
    }

    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>, MappingError> {
        let Some((column, value)) = self.non_null(name)? else {
            return Ok(None);
        };
        match (column.ty, value) {
            (SqlType::Real, SqlValue::Real(v)) => Ok(Some(*v)),
            (SqlType::Real, SqlValue::Integer(v)) => Ok(Some(*v as f64)),
            _ => Err(self.mismatch(column, value)),
        }
    }

    pub fn opt_text(&self, name: &str) -> Result<Option<String>, MappingError> {
        let Some((column, value)) = self.non_null(name)? else {
            return Ok(None);
        };
        match (column.ty, value) {
            (SqlType::Text, SqlValue::Text(v)) => Ok(Some(v.clone())),
            _ => Err(self.mismatch(column, value)),
        }
    }

    pub fn text(&self, name: &str) -> Result<String, MappingError> {
        self.required(name, self.opt_text(name)?)
    }

    pub fn opt_timestamp(&self, name: &str) -> Result<Option<DateTime<Utc>>, MappingError> {
        let Some((column, value)) = self.non_null(name)? else {
            return Ok(None);
        };
        match (column.ty, value) {
            (SqlType::Timestamp, SqlValue::Timestamp(v)) => Ok(Some(*v)),
            (SqlType::Timestamp, SqlValue::Text(raw)) => parse_timestamp(raw)
                .map(Some)
                .map_err(|_| self.mismatch(column, value)),
            _ => Err(self.mismatch(column, value)),
        }
    }

    pub fn timestamp(&self, name: &str) -> Result<DateTime<Utc>, MappingError> {
        self.required(name, self.opt_timestamp(name)?)
    }

    // Non-optional getters on a column declared nullable still reject NULL
    fn required<T>(&self, name: &str, value: Option<T>) -> Result<T, MappingError> {
        value.ok_or_else(|| MappingError::UnexpectedNull {
            table: self.schema.table,
            column: name.to_string(),
        })
    }
}
