use std::fmt;

/// Fragments of a default expression that the server evaluates at write time.
const LIVE_DEFAULT_MARKERS: &[&str] = &[
    "current_timestamp",
    "now(",
    "localtime",
    "curdate(",
    "curtime(",
    "uuid(",
];

/// Fragments of the `EXTRA` column attribute marking server generated values.
///
/// `DEFAULT_GENERATED` is not listed: the server reports it for literal expression defaults
/// too, so the default expression itself decides.
const AUTO_GENERATED_MARKERS: &[&str] = &[
    "auto_increment",
    "on update",
    "virtual generated",
    "stored generated",
];

/// Quotes a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// A MySQL table name, optionally qualified by its schema (database).
///
/// An unqualified name refers to a table in the connection's current database.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TableName {
    /// The schema (database) containing the table, if qualified.
    pub schema: Option<String>,
    /// The name of the table within the schema.
    pub name: String,
}

impl TableName {
    pub fn new(schema: String, name: String) -> TableName {
        Self {
            schema: Some(schema),
            name,
        }
    }

    pub fn unqualified(name: impl Into<String>) -> TableName {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Parses `table` or `schema.table`.
    pub fn parse(value: &str) -> TableName {
        match value.split_once('.') {
            Some((schema, name)) => TableName::new(schema.to_string(), name.to_string()),
            None => TableName::unqualified(value),
        }
    }

    /// Returns the table name as a backtick quoted MySQL identifier.
    pub fn as_quoted_identifier(&self) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                quote_identifier(schema),
                quote_identifier(&self.name)
            ),
            None => quote_identifier(&self.name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Metadata of a single column as reported by the server.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnMetadata {
    pub name: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// The column default, verbatim as reported by the server.
    pub default_expr: Option<String>,
    /// Whether the server produces the value itself (auto increment, generated columns and
    /// server computed defaults).
    pub auto_generated: bool,
}

impl ColumnMetadata {
    pub fn new(
        name: String,
        nullable: bool,
        default_expr: Option<String>,
        auto_generated: bool,
    ) -> ColumnMetadata {
        Self {
            name,
            nullable,
            default_expr,
            auto_generated,
        }
    }

    /// Builds the metadata from the raw `information_schema.columns` attributes.
    pub fn from_information_schema(
        name: String,
        is_nullable: &str,
        default_expr: Option<String>,
        extra: &str,
    ) -> ColumnMetadata {
        let extra = extra.to_lowercase();
        let auto_generated = AUTO_GENERATED_MARKERS
            .iter()
            .any(|marker| extra.contains(marker))
            || default_expr.as_deref().is_some_and(is_live_default);

        Self {
            name,
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
            default_expr,
            auto_generated,
        }
    }

    /// Returns `true` if the default is evaluated by the server at write time.
    pub fn has_live_default(&self) -> bool {
        self.default_expr.as_deref().is_some_and(is_live_default)
    }

    /// Returns `true` if statements may assign this column explicitly.
    pub fn is_writable(&self) -> bool {
        !self.auto_generated && !self.has_live_default()
    }

    /// Returns `true` if a new row must supply a value for this column.
    pub fn is_required(&self) -> bool {
        !self.nullable && self.is_writable()
    }
}

fn is_live_default(default_expr: &str) -> bool {
    let default_expr = default_expr.to_lowercase();
    LIVE_DEFAULT_MARKERS
        .iter()
        .any(|marker| default_expr.contains(marker))
}

/// Columns and primary key of a table, inspected at call time.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableSchema {
    pub name: TableName,
    /// Columns in declaration order.
    pub columns: Vec<ColumnMetadata>,
    /// Primary key columns in key order, without duplicates.
    pub primary_keys: Vec<String>,
}

impl TableSchema {
    pub fn new(name: TableName, columns: Vec<ColumnMetadata>, primary_keys: Vec<String>) -> Self {
        let mut unique_keys: Vec<String> = Vec::with_capacity(primary_keys.len());
        for key in primary_keys {
            if !unique_keys.contains(&key) {
                unique_keys.push(key);
            }
        }

        Self {
            name,
            columns,
            primary_keys: unique_keys,
        }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_keys.iter().any(|key| key == name)
    }
}
