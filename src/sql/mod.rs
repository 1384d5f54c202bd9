//! The SQL front end: a pull-style lexer and a recursive-descent parser
//! producing the statement tree the executor consumes.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{
    ColumnDefinition, DataType, InsertStatement, Literal, SelectStatement, Statement,
    TableDefinition,
};
pub use parser::{parse, parse_table_definition};
