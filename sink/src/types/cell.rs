use std::fmt;

use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, SinkError};

/// A single scalar field value.
///
/// Change events carry JSON scalars, so a cell is one of the JSON scalar kinds with numbers
/// split by representation. Nested arrays and objects have no column mapping and are rejected
/// when converting.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::I64(value) => write!(f, "{value}"),
            Cell::U64(value) => write!(f, "{value}"),
            Cell::F64(value) => write!(f, "{value}"),
            Cell::String(value) => f.write_str(value),
        }
    }
}

impl TryFrom<Value> for Cell {
    type Error = SinkError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let cell = match value {
            Value::Null => Cell::Null,
            Value::Bool(value) => Cell::Bool(value),
            Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Cell::I64(value)
                } else if let Some(value) = number.as_u64() {
                    Cell::U64(value)
                } else if let Some(value) = number.as_f64() {
                    Cell::F64(value)
                } else {
                    bail!(
                        ErrorKind::ConversionError,
                        "Number cannot be represented",
                        number
                    );
                }
            }
            Value::String(value) => Cell::String(value),
            Value::Array(_) => bail!(
                ErrorKind::InvalidData,
                "Unsupported field value",
                "arrays cannot be stored in a column"
            ),
            Value::Object(_) => bail!(
                ErrorKind::InvalidData,
                "Unsupported field value",
                "objects cannot be stored in a column"
            ),
        };

        Ok(cell)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I64(value.into())
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::U64(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl<T> From<Option<T>> for Cell
where
    T: Into<Cell>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}
