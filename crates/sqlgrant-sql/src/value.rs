use sqlgrant_domain::{
    DatabaseId, DatabasePrincipalId, DatabaseRoleId, SchemaId, ServerPrincipalId, ServerRoleId,
    UserId,
};

use crate::error::SqlError;

/// Scalar bound to a positional `@pN` placeholder, or read back from a result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v.into())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

macro_rules! id_values {
    ($($id:ty),* $(,)?) => {
        $(
            impl From<$id> for SqlValue {
                fn from(id: $id) -> Self {
                    SqlValue::Int(id.0.into())
                }
            }
        )*
    };
}

id_values!(
    DatabaseId,
    SchemaId,
    DatabaseRoleId,
    UserId,
    DatabasePrincipalId,
    ServerRoleId,
    ServerPrincipalId,
);

/// Build a `Vec<SqlValue>` from heterogeneous scalars.
#[macro_export]
macro_rules! values {
    ($($v:expr),* $(,)?) => {
        vec![$($crate::SqlValue::from($v)),*]
    };
}

/// One result row, cells addressed by ordinal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.values.get(idx)
    }

    fn cell(&self, idx: usize) -> Result<&SqlValue, SqlError> {
        self.values
            .get(idx)
            .ok_or_else(|| SqlError::Decode(format!("missing column {idx}")))
    }

    pub fn opt_i32(&self, idx: usize) -> Result<Option<i32>, SqlError> {
        match self.cell(idx)? {
            SqlValue::Null => Ok(None),
            SqlValue::Int(v) => i32::try_from(*v)
                .map(Some)
                .map_err(|_| SqlError::Decode(format!("column {idx} out of range: {v}"))),
            other => Err(SqlError::Decode(format!("column {idx}: expected integer, got {other:?}"))),
        }
    }

    pub fn i32(&self, idx: usize) -> Result<i32, SqlError> {
        self.opt_i32(idx)?
            .ok_or_else(|| SqlError::Decode(format!("column {idx} is NULL")))
    }

    pub fn opt_string(&self, idx: usize) -> Result<Option<String>, SqlError> {
        match self.cell(idx)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            other => Err(SqlError::Decode(format!("column {idx}: expected text, got {other:?}"))),
        }
    }

    pub fn string(&self, idx: usize) -> Result<String, SqlError> {
        self.opt_string(idx)?
            .ok_or_else(|| SqlError::Decode(format!("column {idx} is NULL")))
    }

    pub fn bool(&self, idx: usize) -> Result<bool, SqlError> {
        match self.cell(idx)? {
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Int(v) => Ok(*v != 0),
            other => Err(SqlError::Decode(format!("column {idx}: expected bit, got {other:?}"))),
        }
    }
}
