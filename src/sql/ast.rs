//! The parsed statement tree.

/// One directly executable statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(TableDefinition),
    Insert(InsertStatement),
    Select(SelectStatement),
}

/// A `CREATE TABLE` statement. `raw_sql` preserves the statement text
/// exactly as written (terminator excluded); the catalog stores it and
/// re-parses it on lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub raw_sql: String,
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
}

impl TableDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key.iter().any(|pk| pk == name)
    }

    /// Declared columns that are not part of the primary key, in order.
    pub fn non_key_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| !self.is_primary_key(&c.name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Text,
    Integer,
}

/// An `INSERT INTO … VALUES …` statement. `columns` is `None` when the
/// statement did not name its columns, in which case each row is taken in
/// the table's declared column order.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub target: String,
    pub columns: Option<Vec<String>>,
    pub rows: Vec<Vec<Literal>>,
}

/// A `SELECT * FROM …` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub from: String,
}

/// A scalar literal from the VALUES list.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Text(String),
}
