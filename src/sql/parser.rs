//! A recursive-descent parser over the pull lexer.
//!
//! Every accept step distinguishes "wrong token" from "ran out of input":
//! the latter surfaces as [`Error::Incomplete`] so the shell can extend its
//! prompt instead of reporting a syntax error on an unfinished statement.

use crate::errors::Error;
use crate::sql::ast::{
    ColumnDefinition, DataType, InsertStatement, Literal, SelectStatement, Statement,
    TableDefinition,
};
use crate::sql::lexer::{Keyword, Lexer, Token, TokenKind};

/// Parses one directly executable statement terminated by a semicolon.
pub fn parse(input: &str) -> Result<Statement, Error> {
    let mut parser = Parser::new(input)?;
    let statement = parser.statement()?;
    parser.expect(&TokenKind::Semicolon)?;
    if parser.token.kind != TokenKind::Eos {
        return Err(err!(
            Syntax,
            "Unexpected input after the statement: {}.",
            parser.token.kind
        ));
    }
    Ok(statement)
}

/// Re-parses stored `CREATE TABLE` text from the catalog. The terminator is
/// optional here because the catalog stores the statement without it.
pub fn parse_table_definition(input: &str) -> Result<TableDefinition, Error> {
    let mut parser = Parser::new(input)?;
    let definition = parser.table_definition()?;
    if parser.token.kind == TokenKind::Semicolon {
        parser.advance()?;
    }
    if parser.token.kind != TokenKind::Eos {
        return Err(err!(
            Syntax,
            "Unexpected input after the table definition: {}.",
            parser.token.kind
        ));
    }
    Ok(definition)
}

struct Parser<'a> {
    input: &'a str,
    lexer: Lexer<'a>,
    token: Token,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Parser<'a>, Error> {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token()?;
        Ok(Parser {
            input,
            lexer,
            token,
        })
    }

    fn advance(&mut self) -> Result<(), Error> {
        self.token = self.lexer.next_token()?;
        Ok(())
    }

    /// Consumes the expected token, or reports `Incomplete` at end of input.
    fn expect(&mut self, kind: &TokenKind) -> Result<(), Error> {
        if self.token.kind == TokenKind::Eos {
            return Err(Error::Incomplete);
        }
        if &self.token.kind != kind {
            return Err(err!(Syntax, "Expected {}, got {}.", kind, self.token.kind));
        }
        self.advance()
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), Error> {
        self.expect(&TokenKind::Keyword(keyword))
    }

    fn expect_identifier(&mut self) -> Result<String, Error> {
        match &self.token.kind {
            TokenKind::Eos => Err(Error::Incomplete),
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            other => Err(err!(Syntax, "Expected an identifier, got {}.", other)),
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> Result<bool, Error> {
        if &self.token.kind == kind {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn statement(&mut self) -> Result<Statement, Error> {
        match self.token.kind {
            TokenKind::Eos => Err(Error::Incomplete),
            TokenKind::Keyword(Keyword::Create) => {
                Ok(Statement::CreateTable(self.table_definition()?))
            }
            TokenKind::Keyword(Keyword::Insert) => {
                Ok(Statement::Insert(self.insert_statement()?))
            }
            TokenKind::Keyword(Keyword::Select) => {
                Ok(Statement::Select(self.select_statement()?))
            }
            TokenKind::Keyword(Keyword::Update) => {
                Err(Error::NotImplemented("UPDATE".to_string()))
            }
            TokenKind::Keyword(Keyword::Delete) => {
                Err(Error::NotImplemented("DELETE".to_string()))
            }
            TokenKind::Keyword(Keyword::Drop) => Err(Error::NotImplemented("DROP".to_string())),
            ref other => Err(err!(Syntax, "Expected a statement, got {}.", other)),
        }
    }

    fn table_definition(&mut self) -> Result<TableDefinition, Error> {
        let start = self.token.start;
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Table)?;
        let name = self.expect_identifier()?;

        self.expect(&TokenKind::LParen)?;
        let mut columns = Vec::new();
        let mut primary_key = Vec::new();
        loop {
            self.table_element(&mut columns, &mut primary_key)?;
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;

        let raw_sql = self.input[start..self.token.start].trim_end().to_string();
        Ok(TableDefinition {
            raw_sql,
            name,
            columns,
            primary_key,
        })
    }

    /// One element of the table body: a column definition or the PRIMARY KEY
    /// constraint.
    fn table_element(
        &mut self,
        columns: &mut Vec<ColumnDefinition>,
        primary_key: &mut Vec<String>,
    ) -> Result<(), Error> {
        if self.token.kind == TokenKind::Keyword(Keyword::Primary) {
            self.advance()?;
            self.expect_keyword(Keyword::Key)?;
            self.expect(&TokenKind::LParen)?;
            if !primary_key.is_empty() {
                return Err(err!(Syntax, "More than one PRIMARY KEY clause."));
            }
            *primary_key = self.column_name_list()?;
            self.expect(&TokenKind::RParen)?;
            return Ok(());
        }

        let name = self.expect_identifier()?;
        let data_type = self.data_type()?;
        columns.push(ColumnDefinition { name, data_type });
        Ok(())
    }

    fn data_type(&mut self) -> Result<DataType, Error> {
        match self.token.kind {
            TokenKind::Eos => Err(Error::Incomplete),
            TokenKind::Keyword(Keyword::Text) => {
                self.advance()?;
                Ok(DataType::Text)
            }
            TokenKind::Keyword(Keyword::Integer) => {
                self.advance()?;
                Ok(DataType::Integer)
            }
            ref other => Err(err!(Syntax, "Expected a data type, got {}.", other)),
        }
    }

    fn column_name_list(&mut self) -> Result<Vec<String>, Error> {
        let mut names = vec![self.expect_identifier()?];
        while self.eat(&TokenKind::Comma)? {
            names.push(self.expect_identifier()?);
        }
        Ok(names)
    }

    fn insert_statement(&mut self) -> Result<InsertStatement, Error> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let target = self.expect_identifier()?;

        let columns = if self.eat(&TokenKind::LParen)? {
            let names = self.column_name_list()?;
            self.expect(&TokenKind::RParen)?;
            Some(names)
        } else {
            None
        };

        self.expect_keyword(Keyword::Values)?;
        let mut rows = vec![self.row_value()?];
        while self.eat(&TokenKind::Comma)? {
            rows.push(self.row_value()?);
        }

        Ok(InsertStatement {
            target,
            columns,
            rows,
        })
    }

    fn row_value(&mut self) -> Result<Vec<Literal>, Error> {
        self.expect(&TokenKind::LParen)?;
        let mut values = vec![self.literal()?];
        while self.eat(&TokenKind::Comma)? {
            values.push(self.literal()?);
        }
        self.expect(&TokenKind::RParen)?;
        Ok(values)
    }

    fn literal(&mut self) -> Result<Literal, Error> {
        let negative = if self.eat(&TokenKind::Minus)? {
            true
        } else {
            self.eat(&TokenKind::Plus)?;
            false
        };

        match self.token.kind.clone() {
            TokenKind::Eos => Err(Error::Incomplete),
            TokenKind::Number(n) => {
                self.advance()?;
                Ok(Literal::Int(if negative { -n } else { n }))
            }
            TokenKind::Str(s) if !negative => {
                self.advance()?;
                Ok(Literal::Text(s))
            }
            other => Err(err!(Syntax, "Expected a literal value, got {}.", other)),
        }
    }

    fn select_statement(&mut self) -> Result<SelectStatement, Error> {
        self.expect_keyword(Keyword::Select)?;
        if matches!(self.token.kind, TokenKind::Identifier(_)) {
            return Err(Error::NotImplemented("column projections".to_string()));
        }
        self.expect(&TokenKind::Asterisk)?;
        self.expect_keyword(Keyword::From)?;
        let from = self.expect_identifier()?;
        Ok(SelectStatement { from })
    }
}
