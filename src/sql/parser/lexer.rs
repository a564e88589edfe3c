use std::fmt::{self, Display};
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Error, Result};

/// A single lexical token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Token payloads produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// SQL reserved keyword (e.g. SELECT, FROM, WHERE)
    Keyword(Keyword),
    /// Table or column name; original casing is preserved
    Ident(String),
    /// Integer literal, digits only
    Integer(String),
    /// Float literal with a fractional part
    Float(String),
    /// String literal without the enclosing single quotes
    String(String),
    /// `=`
    Equal,
    /// `!=` or `<>`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`, both multiplication and the wildcard
    Asterisk,
    /// `/`
    Slash,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `.`
    Dot,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(k) => write!(f, "{}", k),
            TokenKind::Ident(s) => write!(f, "{}", s),
            TokenKind::Integer(s) | TokenKind::Float(s) => write!(f, "{}", s),
            TokenKind::String(s) => write!(f, "'{}'", s),
            TokenKind::Equal => write!(f, "="),
            TokenKind::NotEqual => write!(f, "!="),
            TokenKind::LessThan => write!(f, "<"),
            TokenKind::LessThanOrEqual => write!(f, "<="),
            TokenKind::GreaterThan => write!(f, ">"),
            TokenKind::GreaterThanOrEqual => write!(f, ">="),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::OpenParen => write!(f, "("),
            TokenKind::CloseParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Dot => write!(f, "."),
        }
    }
}

/// SQL reserved keywords, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Create,
    Table,
    Drop,
    Primary,
    Key,
    Not,
    Null,
    Unique,
    References,
    Int,
    Text,
    Float,
    Boolean,
    And,
    Or,
    As,
    Join,
    Inner,
    Left,
    Right,
    Full,
    Outer,
    On,
    Group,
    By,
    Order,
    Asc,
    Desc,
    Distinct,
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Between,
    Is,
    True,
    False,
}

impl Keyword {
    /// Matches an identifier against the keyword set.
    pub fn from_str(ident: &str) -> Option<Keyword> {
        Some(match ident.to_uppercase().as_ref() {
            "SELECT" => Keyword::Select,
            "FROM" => Keyword::From,
            "WHERE" => Keyword::Where,
            "INSERT" => Keyword::Insert,
            "INTO" => Keyword::Into,
            "VALUES" => Keyword::Values,
            "UPDATE" => Keyword::Update,
            "SET" => Keyword::Set,
            "DELETE" => Keyword::Delete,
            "CREATE" => Keyword::Create,
            "TABLE" => Keyword::Table,
            "DROP" => Keyword::Drop,
            "PRIMARY" => Keyword::Primary,
            "KEY" => Keyword::Key,
            "NOT" => Keyword::Not,
            "NULL" => Keyword::Null,
            "UNIQUE" => Keyword::Unique,
            "REFERENCES" => Keyword::References,
            "INT" => Keyword::Int,
            "TEXT" => Keyword::Text,
            "FLOAT" => Keyword::Float,
            "BOOLEAN" => Keyword::Boolean,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "AS" => Keyword::As,
            "JOIN" => Keyword::Join,
            "INNER" => Keyword::Inner,
            "LEFT" => Keyword::Left,
            "RIGHT" => Keyword::Right,
            "FULL" => Keyword::Full,
            "OUTER" => Keyword::Outer,
            "ON" => Keyword::On,
            "GROUP" => Keyword::Group,
            "BY" => Keyword::By,
            "ORDER" => Keyword::Order,
            "ASC" => Keyword::Asc,
            "DESC" => Keyword::Desc,
            "DISTINCT" => Keyword::Distinct,
            "COUNT" => Keyword::Count,
            "SUM" => Keyword::Sum,
            "AVG" => Keyword::Avg,
            "MIN" => Keyword::Min,
            "MAX" => Keyword::Max,
            "BETWEEN" => Keyword::Between,
            "IS" => Keyword::Is,
            "TRUE" => Keyword::True,
            "FALSE" => Keyword::False,
            _ => return None,
        })
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_uppercase())
    }
}

/// SQL lexical analyzer.
///
/// Streams tokens out of the input via `Iterator`, tracking line/column so
/// every token and error carries its source position.
pub struct Lexer<'a> {
    iter: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan().transpose()
    }
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            iter: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Position of the character about to be consumed.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    fn err(&self, line: usize, column: usize, reason: impl Into<String>) -> Error {
        Error::Lex {
            line,
            column,
            reason: reason.into(),
        }
    }

    /// Consumes one character, updating the position.
    fn advance(&mut self) -> Option<char> {
        let c = self.iter.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consumes the next character only if it satisfies the predicate.
    fn next_if<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<char> {
        self.iter.peek().filter(|&&c| predicate(c))?;
        self.advance()
    }

    /// Collects consecutive characters satisfying the predicate.
    fn next_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> String {
        let mut value = String::new();
        while let Some(c) = self.next_if(&predicate) {
            value.push(c);
        }
        value
    }

    /// Peeks one character past the current one.
    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.iter.clone();
        ahead.next();
        ahead.next()
    }

    /// Skips whitespace, `--` line comments and `/* */` block comments.
    /// Block comments do not nest; the first `*/` closes.
    fn skip_ignored(&mut self) -> Result<()> {
        loop {
            match self.iter.peek().copied() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('-') if self.peek_second() == Some('-') => {
                    while let Some(&c) = self.iter.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    let (line, column) = Lexer::position(self);
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.iter.peek() == Some(&'/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(self.err(line, column, "unterminated block comment"))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Scans the next token, or `None` at end of input.
    fn scan(&mut self) -> Result<Option<Token>> {
        self.skip_ignored()?;
        let (line, column) = Lexer::position(self);
        let kind = match self.iter.peek() {
            None => return Ok(None),
            Some('\'') => self.scan_string(line, column)?,
            Some(c) if c.is_ascii_digit() => self.scan_number(),
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => self.scan_ident(),
            Some(_) => self.scan_symbol(line, column)?,
        };
        Ok(Some(Token { kind, line, column }))
    }

    /// Scans a single-quoted string literal. There is no escape
    /// convention; the literal ends at the next quote.
    fn scan_string(&mut self, line: usize, column: usize) -> Result<TokenKind> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('\'') => break,
                Some(c) => value.push(c),
                None => return Err(self.err(line, column, "unterminated string literal")),
            }
        }
        Ok(TokenKind::String(value))
    }

    /// Scans a numeric literal. The fractional dot is only consumed when a
    /// digit follows, so `1.` stays an integer followed by a dot.
    fn scan_number(&mut self) -> TokenKind {
        let mut value = self.next_while(|c| c.is_ascii_digit());
        if self.iter.peek() == Some(&'.')
            && self.peek_second().is_some_and(|c| c.is_ascii_digit())
        {
            value.push(self.advance().unwrap());
            value.push_str(&self.next_while(|c| c.is_ascii_digit()));
            TokenKind::Float(value)
        } else {
            TokenKind::Integer(value)
        }
    }

    /// Scans an identifier or keyword, keeping the original casing for
    /// identifiers.
    fn scan_ident(&mut self) -> TokenKind {
        let value = self.next_while(|c| c.is_ascii_alphanumeric() || c == '_');
        match Keyword::from_str(&value) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Ident(value),
        }
    }

    /// Scans operators and punctuation, including the two-character
    /// comparison forms.
    fn scan_symbol(&mut self, line: usize, column: usize) -> Result<TokenKind> {
        let c = self.advance().unwrap();
        let kind = match c {
            '=' => TokenKind::Equal,
            '!' => match self.next_if(|c| c == '=') {
                Some(_) => TokenKind::NotEqual,
                None => return Err(self.err(line, column, "unexpected character '!'")),
            },
            '<' => match self.iter.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::LessThanOrEqual
                }
                Some('>') => {
                    self.advance();
                    TokenKind::NotEqual
                }
                _ => TokenKind::LessThan,
            },
            '>' => match self.next_if(|c| c == '=') {
                Some(_) => TokenKind::GreaterThanOrEqual,
                None => TokenKind::GreaterThan,
            },
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Asterisk,
            '/' => TokenKind::Slash,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            other => {
                return Err(self.err(line, column, format!("unexpected character '{}'", other)))
            }
        };
        Ok(kind)
    }
}
