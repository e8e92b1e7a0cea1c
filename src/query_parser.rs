use std::borrow::Cow;
use std::fmt;

use winnow::combinator::alt;
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use crate::error::SyntaxError;
use crate::query_ast::*;

pub fn parse_query(text: &str) -> Result<Query, SyntaxError> {
    let tokens = lex(text)?;
    let mut cursor = Cursor {
        tokens: &tokens,
        pos: 0,
        end: text.len(),
        depth: 0,
    };
    let query = cursor.query()?;
    match cursor.peek() {
        None => Ok(query),
        Some(_) => Err(cursor.error("end of query")),
    }
}

/// Appends `RETURN <var>.name` when `text` is a query without a `RETURN`
/// clause. Anything that does not start like a query is left untouched.
pub fn with_default_return(text: &str) -> Cow<'_, str> {
    let Ok(tokens) = lex(text) else {
        return Cow::Borrowed(text);
    };
    if tokens.iter().any(|t| t.kind == TokenKind::Keyword(Keyword::Return)) {
        return Cow::Borrowed(text);
    }
    match tokens.as_slice() {
        [
            Token {
                kind: TokenKind::Keyword(Keyword::Match),
                ..
            },
            Token {
                kind: TokenKind::LParen,
                ..
            },
            Token {
                kind: TokenKind::Ident(variable),
                ..
            },
            ..,
        ] => Cow::Owned(format!("{} RETURN {variable}.name", text.trim_end())),
        _ => Cow::Borrowed(text),
    }
}

// --- lexer ---

#[derive(Debug, Clone, Copy, PartialEq)]
enum Keyword {
    Match,
    Where,
    Return,
    And,
    Or,
    Not,
    Contains,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "MATCH" => Keyword::Match,
            "WHERE" => Keyword::Where,
            "RETURN" => Keyword::Return,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "NOT" => Keyword::Not,
            "CONTAINS" => Keyword::Contains,
            _ => return None,
        })
    }

    fn as_str(&self) -> &'static str {
        match self {
            Keyword::Match => "MATCH",
            Keyword::Where => "WHERE",
            Keyword::Return => "RETURN",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Not => "NOT",
            Keyword::Contains => "CONTAINS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Keyword(Keyword),
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Colon,
    Dot,
    Comma,
    EqEq,
    NotEq,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(k) => write!(f, "keyword `{}`", k.as_str()),
            TokenKind::Ident(name) => write!(f, "`{name}`"),
            TokenKind::Str(value) => write!(f, "string '{value}'"),
            TokenKind::LParen => f.write_str("`(`"),
            TokenKind::RParen => f.write_str("`)`"),
            TokenKind::Colon => f.write_str("`:`"),
            TokenKind::Dot => f.write_str("`.`"),
            TokenKind::Comma => f.write_str("`,`"),
            TokenKind::EqEq => f.write_str("`==`"),
            TokenKind::NotEq => f.write_str("`!=`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn lex(text: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut input = text;
    let mut tokens = Vec::new();
    loop {
        input = input.trim_start();
        if input.is_empty() {
            return Ok(tokens);
        }
        let offset = text.len() - input.len();
        match token(&mut input) {
            Ok(kind) => tokens.push(Token { kind, offset }),
            Err(_) => {
                let rest = &text[offset..];
                let found = if rest.starts_with(['\'', '"']) {
                    "unterminated string literal".to_string()
                } else {
                    let ch = rest.chars().next().unwrap_or(' ');
                    format!("`{ch}`")
                };
                return Err(SyntaxError::new(offset, "a token", found));
            }
        }
    }
}

fn token(input: &mut &str) -> winnow::Result<TokenKind> {
    alt((
        string_literal.map(TokenKind::Str),
        "==".value(TokenKind::EqEq),
        "!=".value(TokenKind::NotEq),
        "(".value(TokenKind::LParen),
        ")".value(TokenKind::RParen),
        ":".value(TokenKind::Colon),
        ".".value(TokenKind::Dot),
        ",".value(TokenKind::Comma),
        word.map(|w: &str| match Keyword::from_word(w) {
            Some(k) => TokenKind::Keyword(k),
            None => TokenKind::Ident(w.to_string()),
        }),
    ))
    .parse_next(input)
}

fn word<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-').parse_next(input)
}

/// Single or double quoted; a backslash escapes the next character.
fn string_literal(input: &mut &str) -> winnow::Result<String> {
    let quote = one_of(['\'', '"']).parse_next(input)?;
    let mut value = String::new();
    loop {
        match any.parse_next(input)? {
            c if c == quote => return Ok(value),
            '\\' => value.push(any.parse_next(input)?),
            c => value.push(c),
        }
    }
}

// --- parser ---

/// Deepest run of `NOT` and `(` a predicate may use.
const MAX_NESTING: usize = 128;

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
    end: usize,
    depth: usize,
}

fn flatten(mut operands: Vec<Predicate>, join: fn(Vec<Predicate>) -> Predicate) -> Predicate {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        join(operands)
    }
}

impl Cursor<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |t| t.offset)
    }

    fn error(&self, expected: &str) -> SyntaxError {
        let found = match self.peek() {
            Some(token) => token.kind.to_string(),
            None => "end of input".to_string(),
        };
        SyntaxError::new(self.offset(), expected, found)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| t.kind == *kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        self.eat(&TokenKind::Keyword(keyword))
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), SyntaxError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(&kind.to_string()))
        }
    }

    fn ident(&mut self, what: &str) -> Result<(String, usize), SyntaxError> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Ident(name),
                offset,
            }) => {
                let found = (name.clone(), *offset);
                self.pos += 1;
                Ok(found)
            }
            _ => Err(self.error(what)),
        }
    }

    fn query(&mut self) -> Result<Query, SyntaxError> {
        self.expect(TokenKind::Keyword(Keyword::Match))?;
        let pattern = self.pattern()?;

        let predicate = if self.eat_keyword(Keyword::Where) {
            Some(self.disjunction(&pattern.variable)?)
        } else {
            None
        };

        if !self.eat_keyword(Keyword::Return) {
            let expected = if predicate.is_some() {
                "`AND`, `OR` or keyword `RETURN`"
            } else {
                "keyword `WHERE` or `RETURN`"
            };
            return Err(self.error(expected));
        }

        let mut projection = vec![self.projection(&pattern.variable)?];
        while self.eat(&TokenKind::Comma) {
            projection.push(self.projection(&pattern.variable)?);
        }

        Ok(Query {
            pattern,
            predicate,
            projection,
        })
    }

    fn pattern(&mut self) -> Result<Pattern, SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let (variable, _) = self.ident("a variable name")?;
        let label = if self.eat(&TokenKind::Colon) {
            Some(self.ident("a label")?.0)
        } else {
            None
        };
        self.expect(TokenKind::RParen)?;
        Ok(Pattern { variable, label })
    }

    fn disjunction(&mut self, bound: &str) -> Result<Predicate, SyntaxError> {
        let mut operands = vec![self.conjunction(bound)?];
        while self.eat_keyword(Keyword::Or) {
            operands.push(self.conjunction(bound)?);
        }
        Ok(flatten(operands, Predicate::Or))
    }

    fn conjunction(&mut self, bound: &str) -> Result<Predicate, SyntaxError> {
        let mut operands = vec![self.unary(bound)?];
        while self.eat_keyword(Keyword::And) {
            operands.push(self.unary(bound)?);
        }
        Ok(flatten(operands, Predicate::And))
    }

    fn unary(&mut self, bound: &str) -> Result<Predicate, SyntaxError> {
        if self.eat_keyword(Keyword::Not) {
            let inner = self.nested(|c| c.unary(bound))?;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        if self.eat(&TokenKind::LParen) {
            let inner = self.nested(|c| c.disjunction(bound))?;
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }
        self.comparison(bound)
    }

    /// Runs `parse` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Predicate, SyntaxError>,
    ) -> Result<Predicate, SyntaxError> {
        if self.depth == MAX_NESTING {
            return Err(self.error("a shallower expression"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn comparison(&mut self, bound: &str) -> Result<Predicate, SyntaxError> {
        let access = self.access(bound)?;
        let op = if self.eat(&TokenKind::EqEq) {
            CompareOp::Eq
        } else if self.eat(&TokenKind::NotEq) {
            CompareOp::Ne
        } else if self.eat_keyword(Keyword::Contains) {
            CompareOp::Contains
        } else {
            return Err(self.error("`==`, `!=` or keyword `CONTAINS`"));
        };
        let literal = match self.peek() {
            Some(Token {
                kind: TokenKind::Str(value),
                ..
            }) => value.clone(),
            _ => return Err(self.error("a quoted string")),
        };
        self.pos += 1;
        Ok(Predicate::Compare {
            access,
            op,
            literal,
        })
    }

    fn access(&mut self, bound: &str) -> Result<PropertyAccess, SyntaxError> {
        let variable = self.bound_variable(bound, "a property access")?;
        self.expect(TokenKind::Dot)?;
        let (property, _) = self.ident("a property name")?;
        Ok(PropertyAccess { variable, property })
    }

    fn projection(&mut self, bound: &str) -> Result<Projection, SyntaxError> {
        let variable = self.bound_variable(bound, "a property or variable to return")?;
        if self.eat(&TokenKind::Dot) {
            let (property, _) = self.ident("a property name")?;
            Ok(Projection::Property(PropertyAccess { variable, property }))
        } else {
            Ok(Projection::Variable(variable))
        }
    }

    /// Only the pattern variable is in scope.
    fn bound_variable(&mut self, bound: &str, what: &str) -> Result<String, SyntaxError> {
        let (variable, offset) = self.ident(what)?;
        if variable != bound {
            return Err(SyntaxError::new(
                offset,
                format!("variable `{bound}`"),
                format!("unbound variable `{variable}`"),
            ));
        }
        Ok(variable)
    }
}
