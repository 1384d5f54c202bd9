//! The executor: runs parsed statements against the catalog and the tree.

use std::collections::VecDeque;

use tracing::debug;

use crate::catalog;
use crate::errors::Error;
use crate::sql::ast::{
    DataType, InsertStatement, Literal, SelectStatement, Statement, TableDefinition,
};
use crate::store::btree::BTree;
use crate::store::pager::Pager;
use crate::store::values::{Tuple, Value};

/// A finished result: column names plus the rows, pulled one at a time.
#[derive(Debug)]
pub struct Rows {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    affected: usize,
}

impl Rows {
    fn result_set(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Rows {
        let affected = rows.len();
        Rows {
            columns,
            rows: rows.into(),
            affected,
        }
    }

    fn written(count: usize) -> Rows {
        Rows {
            columns: Vec::new(),
            rows: VecDeque::new(),
            affected: count,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Copies the next row into `dest`, which must hold one slot per
    /// column. Returns `None` once the rows run out.
    pub fn next(&mut self, dest: &mut [Value]) -> Option<()> {
        let row = self.rows.pop_front()?;
        debug_assert_eq!(dest.len(), row.len());
        for (slot, value) in dest.iter_mut().zip(row) {
            *slot = value;
        }
        Some(())
    }

    /// How many rows the statement produced or wrote.
    pub fn affected(&self) -> usize {
        self.affected
    }
}

pub fn execute(pager: &mut Pager, statement: Statement) -> Result<Rows, Error> {
    match statement {
        Statement::CreateTable(definition) => execute_create_table(pager, definition),
        Statement::Insert(insert) => execute_insert(pager, insert),
        Statement::Select(select) => execute_select(pager, select),
    }
}

fn execute_create_table(pager: &mut Pager, definition: TableDefinition) -> Result<Rows, Error> {
    validate_definition(&definition)?;
    let root = catalog::define_table(pager, &definition)?;

    Ok(Rows::result_set(
        vec![
            "type".to_string(),
            "name".to_string(),
            "root".to_string(),
            "sql".to_string(),
        ],
        vec![vec![
            Value::Text("table".to_string()),
            Value::Text(definition.name),
            Value::Int(root as i64),
            Value::Text(definition.raw_sql),
        ]],
    ))
}

fn validate_definition(definition: &TableDefinition) -> Result<(), Error> {
    for (i, column) in definition.columns.iter().enumerate() {
        if definition.columns[..i].iter().any(|c| c.name == column.name) {
            return Err(err!(Schema, "Duplicate column '{}'.", column.name));
        }
    }
    for (i, name) in definition.primary_key.iter().enumerate() {
        if definition.column(name).is_none() {
            return Err(err!(
                Schema,
                "PRIMARY KEY names an undeclared column '{}'.",
                name
            ));
        }
        if definition.primary_key[..i].contains(name) {
            return Err(err!(Schema, "PRIMARY KEY names '{}' twice.", name));
        }
    }
    Ok(())
}

fn execute_insert(pager: &mut Pager, insert: InsertStatement) -> Result<Rows, Error> {
    let entry = catalog::lookup_table(pager, &insert.target)?;
    let definition = &entry.definition;

    // The source column order: explicit list if given, declared order
    // otherwise. Each source column must exist; each declared column must
    // be supplied, since a row has no way to hold an absent value.
    let source_columns: Vec<&str> = match &insert.columns {
        Some(names) => names.iter().map(String::as_str).collect(),
        None => definition.columns.iter().map(|c| c.name.as_str()).collect(),
    };
    for name in &source_columns {
        if definition.column(name).is_none() {
            return Err(err!(
                Schema,
                "Table '{}' has no column '{}'.",
                insert.target,
                name
            ));
        }
    }
    for column in &definition.columns {
        if !source_columns.contains(&column.name.as_str()) {
            return Err(err!(
                Schema,
                "Column '{}' is missing from the INSERT.",
                column.name
            ));
        }
    }

    let mut root = entry.root;
    let mut count = 0;
    for row in &insert.rows {
        if row.len() != source_columns.len() {
            return Err(err!(
                Schema,
                "Row has {} values for {} columns.",
                row.len(),
                source_columns.len()
            ));
        }

        // Project the row into declared order, checking types as we go.
        let mut projected = Vec::with_capacity(definition.columns.len());
        for column in &definition.columns {
            let at = source_columns
                .iter()
                .position(|name| *name == column.name)
                .expect("column presence checked above");
            projected.push(typed_value(&row[at], column.data_type, &column.name)?);
        }

        let (key, value) = partition_row(definition, projected)?;
        let new_root = BTree::new(pager).insert(root, key, value)?;
        if new_root != root {
            debug!(
                table = %insert.target,
                old_root = root,
                new_root,
                "Table root moved; repointing the catalog."
            );
            root = new_root;
            catalog::repoint_table(pager, &insert.target, root, &entry.raw_sql)?;
        }
        count += 1;
    }

    Ok(Rows::written(count))
}

fn typed_value(literal: &Literal, data_type: DataType, column: &str) -> Result<Value, Error> {
    match (literal, data_type) {
        (Literal::Int(n), DataType::Integer) => Ok(Value::Int(*n)),
        (Literal::Text(s), DataType::Text) => Ok(Value::Text(s.clone())),
        (Literal::Int(_), DataType::Text) => {
            Err(err!(Schema, "Column '{}' is text, got an integer.", column))
        }
        (Literal::Text(_), DataType::Integer) => {
            Err(err!(Schema, "Column '{}' is an integer, got text.", column))
        }
    }
}

/// Splits a declared-order row into the primary-key tuple (PK declaration
/// order) and the value tuple (remaining columns, declared order).
///
/// Definitions are validated at CREATE TABLE time, but the catalog text can
/// in principle be damaged on disk, so a bad key list stays an error here
/// too.
fn partition_row(definition: &TableDefinition, mut row: Vec<Value>) -> Result<(Tuple, Tuple), Error> {
    let mut taken: Vec<Option<Value>> = row.drain(..).map(Some).collect();

    let mut key = Vec::with_capacity(definition.primary_key.len());
    for pk in &definition.primary_key {
        let at = definition
            .columns
            .iter()
            .position(|c| &c.name == pk)
            .ok_or_else(|| err!(Schema, "PRIMARY KEY names an undeclared column '{}'.", pk))?;
        key.push(
            taken[at]
                .take()
                .ok_or_else(|| err!(Schema, "PRIMARY KEY names '{}' twice.", pk))?,
        );
    }
    let value = taken.into_iter().flatten().collect();
    Ok((key, value))
}

fn execute_select(pager: &mut Pager, select: SelectStatement) -> Result<Rows, Error> {
    let entry = catalog::lookup_table(pager, &select.from)?;
    let definition = &entry.definition;

    // Rows come off the tree as (pk columns, then the rest); map them back
    // into declared order for the caller.
    let stored_order: Vec<&str> = definition
        .primary_key
        .iter()
        .map(String::as_str)
        .chain(definition.non_key_columns().map(|c| c.name.as_str()))
        .collect();
    let projection: Vec<usize> = definition
        .columns
        .iter()
        .map(|column| {
            stored_order
                .iter()
                .position(|name| *name == column.name)
                .expect("stored order covers every declared column")
        })
        .collect();

    let mut tree = BTree::new(pager);
    let mut iter = tree.iterator(entry.root, &Tuple::new());
    let mut rows = Vec::new();
    while iter.next() {
        let mut stored = iter.key().clone();
        stored.extend_from_slice(iter.value());
        if stored.len() != definition.columns.len() {
            return Err(err!(
                Schema,
                "Row in '{}' has {} values for {} declared columns.",
                select.from,
                stored.len(),
                definition.columns.len()
            ));
        }
        rows.push(projection.iter().map(|&at| stored[at].clone()).collect());
    }
    if let Some(err) = iter.take_err() {
        return Err(err);
    }

    let columns = definition.columns.iter().map(|c| c.name.clone()).collect();
    Ok(Rows::result_set(columns, rows))
}
