use std::fmt::Display;
use std::fmt::Formatter;

/// Token kinds of the textual IR.
///
/// Punctuation that consists of a single character maps one-to-one to a
/// variant via [TokenKind::punctuation].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    /// `arith.addi`, `index`, `memref`
    BareIdentifier,
    /// `@io`
    AtIdentifier,
    /// `%arg0`
    PercentIdentifier,
    /// `^bb1`
    CaretIdentifier,
    FloatLiteral,
    Integer,
    /// A double-quoted string, quotes included in the lexeme.
    String,
    /// `i1`, `i32`
    IntType,
    /// `->`
    Arrow,
    Colon,
    Comma,
    Equal,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LSquare,
    RSquare,
    Minus,
    Exclamation,
    Question,
    Greater,
    Less,
    KwF16,
    KwF32,
    KwF64,
    KwTrue,
    KwFalse,
}

impl TokenKind {
    pub fn punctuation(c: char) -> Option<TokenKind> {
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LSquare,
            ']' => TokenKind::RSquare,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '=' => TokenKind::Equal,
            '!' => TokenKind::Exclamation,
            '?' => TokenKind::Question,
            '>' => TokenKind::Greater,
            '<' => TokenKind::Less,
            _ => return None,
        };
        Some(kind)
    }
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "f16" => TokenKind::KwF16,
            "f32" => TokenKind::KwF32,
            "f64" => TokenKind::KwF64,
            "true" => TokenKind::KwTrue,
            "false" => TokenKind::KwFalse,
            _ => return None,
        };
        Some(kind)
    }
    /// Human readable form for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Eof => "end of input",
            TokenKind::BareIdentifier => "identifier",
            TokenKind::AtIdentifier => "symbol",
            TokenKind::PercentIdentifier => "value name",
            TokenKind::CaretIdentifier => "block label",
            TokenKind::FloatLiteral => "float",
            TokenKind::Integer => "integer",
            TokenKind::String => "string",
            TokenKind::IntType => "integer type",
            TokenKind::Arrow => "'->'",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::Equal => "'='",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LSquare => "'['",
            TokenKind::RSquare => "']'",
            TokenKind::Minus => "'-'",
            TokenKind::Exclamation => "'!'",
            TokenKind::Question => "'?'",
            TokenKind::Greater => "'>'",
            TokenKind::Less => "'<'",
            TokenKind::KwF16 => "f16",
            TokenKind::KwF32 => "f32",
            TokenKind::KwF64 => "f64",
            TokenKind::KwTrue => "true",
            TokenKind::KwFalse => "false",
        }
    }
}

/// Zero-based position of a token in the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    line: usize,
    column: usize,
    /// Character offset from the start of the source.
    offset: usize,
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl Location {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
    pub fn line(&self) -> usize {
        self.line
    }
    pub fn column(&self) -> usize {
        self.column
    }
    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token (empty for [TokenKind::Eof]).
    pub lexeme: String,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, location: Location) -> Self {
        Self {
            kind,
            lexeme,
            location,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} `{}` at {}", self.kind.describe(), self.lexeme, self.location)
    }
}
