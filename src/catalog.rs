//! The system catalog: a distinguished B+tree mapping table names to their
//! root pages and schemas.
//!
//! Each entry keys `("table", <name>)` to `(<root page>, <CREATE TABLE
//! text>)`. The schema is stored as the statement text and re-parsed on
//! lookup; DDL is rare enough that parsing beats inventing a second schema
//! encoding. The catalog root lives in the file header, created lazily by
//! the first definition.

use tracing::{debug, info};

use crate::errors::Error;
use crate::sql::ast::TableDefinition;
use crate::sql::parser;
use crate::store::btree::BTree;
use crate::store::pager::Pager;
use crate::store::values::{Tuple, Value};
use crate::store::PageNo;

/// The catalog entry class for tables. Nothing else is cataloged yet, but
/// the key shape leaves room.
const CLASS_TABLE: &str = "table";

/// A resolved catalog entry.
#[derive(Debug)]
pub struct TableEntry {
    pub root: PageNo,
    pub raw_sql: String,
    pub definition: TableDefinition,
}

fn table_key(name: &str) -> Tuple {
    vec![
        Value::Text(CLASS_TABLE.to_string()),
        Value::Text(name.to_string()),
    ]
}

fn entry_value(root: PageNo, raw_sql: &str) -> Tuple {
    vec![Value::Int(root as i64), Value::Text(raw_sql.to_string())]
}

fn page_no_from(value: &Value) -> Result<PageNo, Error> {
    let n = match value {
        Value::Int(n) => u32::try_from(*n).ok(),
        Value::UInt(n) => u32::try_from(*n).ok(),
        Value::Text(_) => None,
    };
    n.ok_or_else(|| err!(Schema, "Catalog entry holds an invalid root page."))
}

/// Resolves a table by name, re-parsing its stored definition.
pub fn lookup_table(pager: &mut Pager, name: &str) -> Result<TableEntry, Error> {
    let catalog_root = pager.header.root;
    if catalog_root == 0 {
        return Err(err!(Schema, "Unknown table '{}'.", name));
    }

    let entry = match BTree::new(pager).search(catalog_root, &table_key(name)) {
        Ok(values) => values,
        Err(Error::NotFound) => return Err(err!(Schema, "Unknown table '{}'.", name)),
        Err(e) => return Err(e),
    };

    let (root, raw_sql) = match entry.as_slice() {
        [root, Value::Text(raw_sql)] => (page_no_from(root)?, raw_sql.clone()),
        _ => return Err(err!(Schema, "Catalog entry for '{}' is malformed.", name)),
    };

    let definition = parser::parse_table_definition(&raw_sql)?;
    debug!(name, root, "Resolved table from the catalog.");
    Ok(TableEntry {
        root,
        raw_sql,
        definition,
    })
}

/// Registers a new table: allocates its root leaf, inserts the catalog
/// entry, and keeps the header pointing at the catalog root through any
/// split. Returns the new table's root page.
pub fn define_table(pager: &mut Pager, definition: &TableDefinition) -> Result<PageNo, Error> {
    if pager.header.root == 0 {
        let catalog_root = BTree::new(pager).create_root()?;
        pager.header.root = catalog_root;
        pager.update_header()?;
        info!(catalog_root, "Initialized the catalog.");
    }

    let table_root = BTree::new(pager).create_root()?;
    let old_root = pager.header.root;
    let new_root = match BTree::new(pager).insert(
        old_root,
        table_key(&definition.name),
        entry_value(table_root, &definition.raw_sql),
    ) {
        Ok(root) => root,
        Err(Error::DuplicateKey) => {
            return Err(err!(Schema, "Table '{}' already exists.", definition.name));
        }
        Err(e) => return Err(e),
    };

    if new_root != old_root {
        pager.header.root = new_root;
        pager.update_header()?;
    }

    info!(name = %definition.name, root = table_root, "Created table.");
    Ok(table_root)
}

/// Repoints a table's catalog entry after its root moved under a split.
pub fn repoint_table(
    pager: &mut Pager,
    name: &str,
    root: PageNo,
    raw_sql: &str,
) -> Result<(), Error> {
    let catalog_root = pager.header.root;
    BTree::new(pager).update(catalog_root, &table_key(name), entry_value(root, raw_sql))?;
    debug!(name, root, "Repointed table root.");
    Ok(())
}
