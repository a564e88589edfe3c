use std::iter::Peekable;

use crate::error::{Error, Result};
use crate::sql::parser::ast::{
    AggregateFunc, ColumnRef, ColumnSpec, CompareOp, Consts, Expression, Join, JoinKind,
    OrderDirection, SelectItem, Statement, TableRef,
};
use crate::sql::parser::lexer::{Keyword, Lexer, Token, TokenKind};
use crate::sql::types::DataType;

pub mod ast;
pub mod lexer;

/// Recursive-descent SQL parser with one token of lookahead.
///
/// `parse` consumes the whole input and returns one AST node per statement.
/// Statements are separated by `;` (a trailing one is optional); the parser
/// reports the first deviation and never attempts recovery.
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
    /// Position of the last consumed token, for end-of-input errors.
    last_pos: (usize, usize),
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input).peekable(),
            last_pos: (1, 1),
        }
    }

    /// Parses a script into its list of statements. Empty input yields an
    /// empty list.
    pub fn parse(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            while self.next_if_kind(&TokenKind::Semicolon)?.is_some() {}
            if self.peek()?.is_none() {
                break;
            }
            statements.push(self.parse_statement()?);
            match self.peek()? {
                None => break,
                Some(token) if token.kind == TokenKind::Semicolon => {
                    self.next()?;
                }
                Some(token) => return Err(self.unexpected(&token, "';'")),
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.peek()? {
            Some(Token {
                kind: TokenKind::Keyword(keyword),
                ..
            }) => match keyword {
                Keyword::Create => self.parse_create_table(),
                Keyword::Drop => self.parse_drop_table(),
                Keyword::Insert => self.parse_insert(),
                Keyword::Update => self.parse_update(),
                Keyword::Delete => self.parse_delete(),
                Keyword::Select => self.parse_select(),
                _ => {
                    let token = self.next()?;
                    Err(self.unexpected(&token, "a SQL statement"))
                }
            },
            Some(token) => Err(self.unexpected(&token, "a SQL statement")),
            None => Err(self.eof("a SQL statement")),
        }
    }

    fn parse_create_table(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Table)?;
        let name = self.next_ident("a table name")?;
        self.expect_kind(TokenKind::OpenParen, "'('")?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_spec()?);
            if self.next_if_kind(&TokenKind::Comma)?.is_none() {
                break;
            }
        }
        self.expect_kind(TokenKind::CloseParen, "')'")?;
        Ok(Statement::CreateTable { name, columns })
    }

    fn parse_column_spec(&mut self) -> Result<ColumnSpec> {
        let name = self.next_ident("a column name")?;
        let token = self.next_expecting("a column type")?;
        let datatype = match token.kind {
            TokenKind::Keyword(Keyword::Int) => DataType::Int,
            TokenKind::Keyword(Keyword::Text) => DataType::Text,
            TokenKind::Keyword(Keyword::Float) => DataType::Float,
            TokenKind::Keyword(Keyword::Boolean) => DataType::Boolean,
            _ => return Err(self.unexpected(&token, "a column type")),
        };

        let mut spec = ColumnSpec {
            name,
            datatype,
            primary_key: false,
            not_null: false,
            unique: false,
            references: None,
        };
        loop {
            if self.next_if_keyword(Keyword::Primary)?.is_some() {
                self.expect_keyword(Keyword::Key)?;
                spec.primary_key = true;
            } else if self.next_if_keyword(Keyword::Not)?.is_some() {
                self.expect_keyword(Keyword::Null)?;
                spec.not_null = true;
            } else if self.next_if_keyword(Keyword::Unique)?.is_some() {
                spec.unique = true;
            } else if self.next_if_keyword(Keyword::References)?.is_some() {
                let table = self.next_ident("a referenced table name")?;
                self.expect_kind(TokenKind::OpenParen, "'('")?;
                let column = self.next_ident("a referenced column name")?;
                self.expect_kind(TokenKind::CloseParen, "')'")?;
                spec.references = Some((table, column));
            } else {
                break;
            }
        }
        Ok(spec)
    }

    fn parse_drop_table(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Drop)?;
        self.expect_keyword(Keyword::Table)?;
        let name = self.next_ident("a table name")?;
        Ok(Statement::DropTable { name })
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let table = self.next_ident("a table name")?;

        let columns = if self.next_if_kind(&TokenKind::OpenParen)?.is_some() {
            let mut cols = Vec::new();
            loop {
                cols.push(self.next_ident("a column name")?);
                if self.next_if_kind(&TokenKind::Comma)?.is_none() {
                    break;
                }
            }
            self.expect_kind(TokenKind::CloseParen, "')'")?;
            Some(cols)
        } else {
            None
        };

        self.expect_keyword(Keyword::Values)?;
        let mut values = Vec::new();
        loop {
            self.expect_kind(TokenKind::OpenParen, "'('")?;
            let mut row = Vec::new();
            loop {
                // Only literals are allowed inside VALUES.
                row.push(self.parse_literal()?.into());
                if self.next_if_kind(&TokenKind::Comma)?.is_none() {
                    break;
                }
            }
            self.expect_kind(TokenKind::CloseParen, "')'")?;
            values.push(row);
            if self.next_if_kind(&TokenKind::Comma)?.is_none() {
                break;
            }
        }
        Ok(Statement::Insert {
            table,
            columns,
            values,
        })
    }

    fn parse_update(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Update)?;
        let table = self.next_ident("a table name")?;
        self.expect_keyword(Keyword::Set)?;

        let mut assignments: Vec<(String, Expression)> = Vec::new();
        loop {
            let column = self.next_ident("a column name")?;
            self.expect_kind(TokenKind::Equal, "'='")?;
            let expr = self.parse_operand(false)?;
            if assignments
                .iter()
                .any(|(c, _)| c.eq_ignore_ascii_case(&column))
            {
                return Err(Error::Semantic(format!(
                    "duplicate assignment to column {} in UPDATE",
                    column
                )));
            }
            assignments.push((column, expr));
            if self.next_if_kind(&TokenKind::Comma)?.is_none() {
                break;
            }
        }

        let filter = self.parse_where_clause()?;
        Ok(Statement::Update {
            table,
            assignments,
            filter,
        })
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;
        let table = self.next_ident("a table name")?;
        let filter = self.parse_where_clause()?;
        Ok(Statement::Delete { table, filter })
    }

    fn parse_select(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Select)?;
        let distinct = self.next_if_keyword(Keyword::Distinct)?.is_some();

        let mut items = Vec::new();
        loop {
            if self.next_if_kind(&TokenKind::Asterisk)?.is_some() {
                items.push(SelectItem::Wildcard);
            } else {
                let expr = self.parse_operand(true)?;
                let alias = self.parse_alias()?;
                items.push(SelectItem::Expr { expr, alias });
            }
            if self.next_if_kind(&TokenKind::Comma)?.is_none() {
                break;
            }
        }

        self.expect_keyword(Keyword::From)?;
        let from = self.parse_table_ref()?;

        let mut joins = Vec::new();
        while let Some(kind) = self.parse_join_kind()? {
            let table = self.parse_table_ref()?;
            self.expect_keyword(Keyword::On)?;
            let on = self.parse_expression()?;
            joins.push(Join { kind, table, on });
        }

        let filter = self.parse_where_clause()?;

        let mut group_by = Vec::new();
        if self.next_if_keyword(Keyword::Group)?.is_some() {
            self.expect_keyword(Keyword::By)?;
            loop {
                group_by.push(self.parse_column_ref()?);
                if self.next_if_kind(&TokenKind::Comma)?.is_none() {
                    break;
                }
            }
        }

        let mut order_by = Vec::new();
        if self.next_if_keyword(Keyword::Order)?.is_some() {
            self.expect_keyword(Keyword::By)?;
            loop {
                let column = self.parse_column_ref()?;
                let direction = if self.next_if_keyword(Keyword::Asc)?.is_some() {
                    OrderDirection::Asc
                } else if self.next_if_keyword(Keyword::Desc)?.is_some() {
                    OrderDirection::Desc
                } else {
                    OrderDirection::Asc
                };
                order_by.push((column, direction));
                if self.next_if_kind(&TokenKind::Comma)?.is_none() {
                    break;
                }
            }
        }

        Ok(Statement::Select {
            distinct,
            items,
            from,
            joins,
            filter,
            group_by,
            order_by,
        })
    }

    /// Join introducer, if the next tokens start one. A bare `JOIN` is
    /// INNER; `OUTER` is accepted after LEFT/RIGHT and required by FULL.
    fn parse_join_kind(&mut self) -> Result<Option<JoinKind>> {
        let kind = if self.next_if_keyword(Keyword::Join)?.is_some() {
            return Ok(Some(JoinKind::Inner));
        } else if self.next_if_keyword(Keyword::Inner)?.is_some() {
            JoinKind::Inner
        } else if self.next_if_keyword(Keyword::Left)?.is_some() {
            self.next_if_keyword(Keyword::Outer)?;
            JoinKind::Left
        } else if self.next_if_keyword(Keyword::Right)?.is_some() {
            self.next_if_keyword(Keyword::Outer)?;
            JoinKind::Right
        } else if self.next_if_keyword(Keyword::Full)?.is_some() {
            self.next_if_keyword(Keyword::Outer)?;
            JoinKind::FullOuter
        } else {
            return Ok(None);
        };
        self.expect_keyword(Keyword::Join)?;
        Ok(Some(kind))
    }

    fn parse_table_ref(&mut self) -> Result<TableRef> {
        let name = self.next_ident("a table name")?;
        let alias = self.parse_alias()?;
        Ok(TableRef { name, alias })
    }

    /// `AS alias` or a bare trailing identifier.
    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.next_if_keyword(Keyword::As)?.is_some() {
            return Ok(Some(self.next_ident("an alias")?));
        }
        match self.peek()? {
            Some(Token {
                kind: TokenKind::Ident(_),
                ..
            }) => Ok(Some(self.next_ident("an alias")?)),
            _ => Ok(None),
        }
    }

    fn parse_where_clause(&mut self) -> Result<Option<Expression>> {
        if self.next_if_keyword(Keyword::Where)?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.parse_expression()?))
    }

    /// Predicate entry point. `AND` binds tighter than `OR`; both are
    /// left-associative.
    fn parse_expression(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_and_expression()?;
        while self.next_if_keyword(Keyword::Or)?.is_some() {
            let rhs = self.parse_and_expression()?;
            lhs = Expression::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and_expression(&mut self) -> Result<Expression> {
        let mut lhs = self.parse_comparison()?;
        while self.next_if_keyword(Keyword::And)?.is_some() {
            let rhs = self.parse_comparison()?;
            lhs = Expression::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// An atomic predicate: comparison, `IS [NOT] NULL`, `BETWEEN` (which
    /// desugars to two comparisons), or a bare operand.
    fn parse_comparison(&mut self) -> Result<Expression> {
        let lhs = self.parse_operand(false)?;

        if self.next_if_keyword(Keyword::Is)?.is_some() {
            let negated = self.next_if_keyword(Keyword::Not)?.is_some();
            self.expect_keyword(Keyword::Null)?;
            return Ok(Expression::IsNull {
                expr: Box::new(lhs),
                negated,
            });
        }

        if self.next_if_keyword(Keyword::Between)?.is_some() {
            let low = self.parse_operand(false)?;
            self.expect_keyword(Keyword::And)?;
            let high = self.parse_operand(false)?;
            let lower = Expression::Compare {
                op: CompareOp::GreaterThanOrEqual,
                lhs: Box::new(lhs.clone()),
                rhs: Box::new(low),
            };
            let upper = Expression::Compare {
                op: CompareOp::LessThanOrEqual,
                lhs: Box::new(lhs),
                rhs: Box::new(high),
            };
            return Ok(Expression::And(Box::new(lower), Box::new(upper)));
        }

        if let Some(op) = self.parse_compare_op()? {
            let rhs = self.parse_operand(false)?;
            return Ok(Expression::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }

        Ok(lhs)
    }

    fn parse_compare_op(&mut self) -> Result<Option<CompareOp>> {
        let op = match self.peek()? {
            Some(token) => match token.kind {
                TokenKind::Equal => CompareOp::Equal,
                TokenKind::NotEqual => CompareOp::NotEqual,
                TokenKind::LessThan => CompareOp::LessThan,
                TokenKind::LessThanOrEqual => CompareOp::LessThanOrEqual,
                TokenKind::GreaterThan => CompareOp::GreaterThan,
                TokenKind::GreaterThanOrEqual => CompareOp::GreaterThanOrEqual,
                _ => return Ok(None),
            },
            None => return Ok(None),
        };
        self.next()?;
        Ok(Some(op))
    }

    /// A comparison operand: literal, possibly qualified column reference,
    /// or (in select position) an aggregate call.
    fn parse_operand(&mut self, allow_aggregate: bool) -> Result<Expression> {
        match self.peek()? {
            Some(Token {
                kind: TokenKind::Ident(_),
                ..
            }) => Ok(Expression::Column(self.parse_column_ref()?)),
            Some(Token {
                kind: TokenKind::Keyword(keyword),
                ..
            }) if aggregate_func(keyword).is_some() && allow_aggregate => {
                self.parse_aggregate(aggregate_func(keyword).unwrap())
            }
            _ => Ok(self.parse_literal()?.into()),
        }
    }

    fn parse_aggregate(&mut self, func: AggregateFunc) -> Result<Expression> {
        self.next()?; // function keyword
        self.expect_kind(TokenKind::OpenParen, "'('")?;
        let arg = if self.next_if_kind(&TokenKind::Asterisk)?.is_some() {
            if func != AggregateFunc::Count {
                return Err(Error::Semantic(format!(
                    "{}(*) is not supported; only count(*) takes *",
                    func
                )));
            }
            None
        } else {
            Some(Box::new(self.parse_operand(false)?))
        };
        self.expect_kind(TokenKind::CloseParen, "')'")?;
        Ok(Expression::Aggregate { func, arg })
    }

    fn parse_column_ref(&mut self) -> Result<ColumnRef> {
        let first = self.next_ident("a column name")?;
        if self.next_if_kind(&TokenKind::Dot)?.is_some() {
            let name = self.next_ident("a column name")?;
            Ok(ColumnRef {
                qualifier: Some(first),
                name,
            })
        } else {
            Ok(ColumnRef {
                qualifier: None,
                name: first,
            })
        }
    }

    /// A literal constant. Numeric literals accept a unary minus; the
    /// lexer always emits the minus as a separate operator token.
    fn parse_literal(&mut self) -> Result<Consts> {
        let token = self.next_expecting("a literal value")?;
        let value = match token.kind {
            TokenKind::Integer(ref n) => Consts::Integer(
                n.parse()
                    .map_err(|_| self.unexpected(&token, "an integer literal"))?,
            ),
            TokenKind::Float(ref n) => Consts::Float(
                n.parse()
                    .map_err(|_| self.unexpected(&token, "a float literal"))?,
            ),
            TokenKind::String(ref s) => Consts::String(s.clone()),
            TokenKind::Keyword(Keyword::True) => Consts::Boolean(true),
            TokenKind::Keyword(Keyword::False) => Consts::Boolean(false),
            TokenKind::Keyword(Keyword::Null) => Consts::Null,
            TokenKind::Minus => match self.parse_literal()? {
                Consts::Integer(i) => Consts::Integer(-i),
                Consts::Float(f) => Consts::Float(-f),
                _ => return Err(self.unexpected(&token, "a numeric literal")),
            },
            _ => return Err(self.unexpected(&token, "a literal value")),
        };
        Ok(value)
    }

    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    fn next(&mut self) -> Result<Token> {
        self.next_expecting("a token")
    }

    fn next_expecting(&mut self, expected: &str) -> Result<Token> {
        match self.lexer.next() {
            Some(Ok(token)) => {
                self.last_pos = (token.line, token.column);
                Ok(token)
            }
            Some(Err(err)) => Err(err),
            None => Err(self.eof(expected)),
        }
    }

    fn next_ident(&mut self, expected: &str) -> Result<String> {
        let token = self.next_expecting(expected)?;
        match token.kind {
            TokenKind::Ident(ident) => Ok(ident),
            _ => Err(self.unexpected(&token, expected)),
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &str) -> Result<()> {
        let token = self.next_expecting(expected)?;
        if token.kind != kind {
            return Err(self.unexpected(&token, expected));
        }
        Ok(())
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        self.expect_kind(TokenKind::Keyword(keyword), &format!("{}", keyword))
    }

    fn next_if_kind(&mut self, kind: &TokenKind) -> Result<Option<Token>> {
        match self.peek()? {
            Some(token) if token.kind == *kind => Ok(Some(self.next()?)),
            _ => Ok(None),
        }
    }

    fn next_if_keyword(&mut self, keyword: Keyword) -> Result<Option<Token>> {
        self.next_if_kind(&TokenKind::Keyword(keyword))
    }

    fn unexpected(&self, token: &Token, expected: impl Into<String>) -> Error {
        Error::Parse {
            line: token.line,
            column: token.column,
            expected: expected.into(),
            found: token.kind.to_string(),
        }
    }

    fn eof(&self, expected: impl Into<String>) -> Error {
        Error::Parse {
            line: self.last_pos.0,
            column: self.last_pos.1,
            expected: expected.into(),
            found: "end of input".into(),
        }
    }
}

fn aggregate_func(keyword: Keyword) -> Option<AggregateFunc> {
    match keyword {
        Keyword::Count => Some(AggregateFunc::Count),
        Keyword::Sum => Some(AggregateFunc::Sum),
        Keyword::Avg => Some(AggregateFunc::Avg),
        Keyword::Min => Some(AggregateFunc::Min),
        Keyword::Max => Some(AggregateFunc::Max),
        _ => None,
    }
}
