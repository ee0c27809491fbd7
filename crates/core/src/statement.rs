// Parameterized statements with declared placeholder types
//
// SQL text never carries caller data: values are bound positionally, and the
// number and types of bound values are checked before the statement reaches the store.

use std::borrow::Cow;

use crate::error::{AppError, Result};
use crate::mapper::{SqlType, SqlValue};

/// Declared type of one `?` placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamType {
    pub ty: SqlType,
    pub nullable: bool,
}

impl ParamType {
    pub const INTEGER: ParamType = ParamType::of(SqlType::Integer);
    pub const REAL: ParamType = ParamType::of(SqlType::Real);
    pub const TEXT: ParamType = ParamType::of(SqlType::Text);
    pub const TIMESTAMP: ParamType = ParamType::of(SqlType::Timestamp);

    pub const fn of(ty: SqlType) -> Self {
        Self {
            ty,
            nullable: false,
        }
    }

    pub const fn or_null(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    fn accepts(&self, value: &SqlValue) -> bool {
        match value.sql_type() {
            None => self.nullable,
            Some(ty) => ty == self.ty,
        }
    }
}

/// SQL text plus the declared type of every placeholder
#[derive(Debug, Clone)]
pub struct Statement {
    sql: Cow<'static, str>,
    params: Vec<ParamType>,
}

impl Statement {
    /// Declare a statement; fails if the placeholder count disagrees with `params`
    pub fn new(sql: impl Into<Cow<'static, str>>, params: &[ParamType]) -> Result<Self> {
        let sql = sql.into();
        let placeholders = count_placeholders(&sql);
        if placeholders != params.len() {
            return Err(AppError::InvalidParameters(format!(
                "statement has {} placeholders but declares {} parameters: {}",
                placeholders,
                params.len(),
                sql.trim()
            )));
        }
        Ok(Self {
            sql,
            params: params.to_vec(),
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_types(&self) -> &[ParamType] {
        &self.params
    }

    /// Verify bound values against the declared placeholders
    pub fn check(&self, params: &Params) -> Result<()> {
        if params.len() != self.params.len() {
            return Err(AppError::InvalidParameters(format!(
                "expected {} parameters, got {}",
                self.params.len(),
                params.len()
            )));
        }

        for (position, (declared, value)) in self.params.iter().zip(params.iter()).enumerate() {
            if !declared.accepts(value) {
                return Err(AppError::InvalidParameters(format!(
                    "parameter {} expects {}{}, got {:?}",
                    position + 1,
                    declared.ty,
                    if declared.nullable { " or NULL" } else { "" },
                    value.sql_type()
                )));
            }
        }

        Ok(())
    }
}

/// Ordered values bound positionally into a statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<SqlValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, value: impl Into<SqlValue>) -> Self {
        self.0.push(value.into());
        self
    }

    pub fn push(&mut self, value: impl Into<SqlValue>) {
        self.0.push(value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SqlValue> {
        self.0.iter()
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.0
    }
}

impl FromIterator<SqlValue> for Params {
    fn from_iter<I: IntoIterator<Item = SqlValue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `?` placeholders outside of quoted literals and identifiers
fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;

    for ch in sql.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '?' => count += 1,
                _ => {}
            },
        }
    }

    count
}

/// `?, ?, ?` for IN-lists built from a runtime-sized value set
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
