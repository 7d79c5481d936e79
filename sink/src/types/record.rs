use std::collections::BTreeMap;
use std::collections::btree_map;

use serde_json::{Map, Value};

use crate::error::SinkError;
use crate::types::Cell;

/// Field values of a single change event, keyed by field name.
///
/// Field names are matched against column names verbatim. Fields are kept sorted so that
/// iteration is deterministic; statements take their column order from the table schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Cell>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, returning the previous value if the field was already present.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Cell>) -> Option<Cell> {
        self.fields.insert(field.into(), value.into())
    }

    /// Builder style variant of [`Record::insert`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Cell>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Cell> {
        self.fields.get(field)
    }

    /// Returns `true` if the field is present, even when its value is [`Cell::Null`].
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Cell> {
        self.fields.remove(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Cell> {
        self.fields.iter()
    }
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = SinkError;

    fn try_from(data: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut fields = BTreeMap::new();
        for (field, value) in data {
            let cell = Cell::try_from(value).map_err(|err| {
                let reason = err.reason().to_string();
                crate::sink_error!(
                    err.kind(),
                    "Unsupported field value",
                    detail = format!("field `{field}`: {reason}"),
                    source: err
                )
            })?;
            fields.insert(field, cell);
        }

        Ok(Self { fields })
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Cell>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Cell);
    type IntoIter = btree_map::Iter<'a, String, Cell>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
