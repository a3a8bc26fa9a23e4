use crate::parser::token::Location;
use crate::parser::token::Token;
use crate::parser::token::TokenKind;
use anyhow::Result;

pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    column: usize,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Scanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 0,
            column: 0,
        }
    }
    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.column += 1;
        c
    }
    fn peek_n(&self, n: usize) -> char {
        self.source.get(self.current + n).copied().unwrap_or('\0')
    }
    fn peek(&self) -> char {
        self.peek_n(0)
    }
    fn peek_next(&self) -> char {
        self.peek_n(1)
    }
    /// The alphanumeric word that starts at the current position, prefixed
    /// with `already_matched`.
    fn peek_word(&self, already_matched: char) -> String {
        let mut word = String::from(already_matched);
        let mut i = 0;
        while self.peek_n(i).is_ascii_alphanumeric() || self.peek_n(i) == '_' {
            word.push(self.peek_n(i));
            i += 1;
        }
        word
    }
    fn lexeme(&self) -> String {
        self.source[self.start..self.current].iter().collect()
    }
    fn add_token(&mut self, kind: TokenKind) {
        let lexeme = if kind == TokenKind::Eof {
            "".to_string()
        } else {
            self.lexeme()
        };
        let column = self.column.saturating_sub(self.current - self.start);
        let location = Location::new(self.line, column, self.start);
        self.tokens.push(Token::new(kind, lexeme, location));
    }
    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            self.add_token(TokenKind::FloatLiteral);
        } else {
            self.add_token(TokenKind::Integer);
        }
    }
    // Whether the character is a valid identifier start character.
    fn is_identifier_start(c: char) -> bool {
        c.is_alphabetic() || c == '_' || c == '@' || c == '%' || c == '^'
    }
    // Whether the character is a valid identifier character.
    fn is_identifier(c: char) -> bool {
        c.is_alphanumeric() || c == '_' || c == '.' || c == '$'
    }
    // Scan identifiers and keywords.
    fn identifier(&mut self) {
        while Scanner::is_identifier(self.peek()) {
            self.advance();
        }
        let lexeme = self.lexeme();
        let kind = TokenKind::keyword(&lexeme).unwrap_or(match lexeme.chars().next() {
            Some('@') => TokenKind::AtIdentifier,
            Some('%') => TokenKind::PercentIdentifier,
            Some('^') => TokenKind::CaretIdentifier,
            _ => TokenKind::BareIdentifier,
        });
        self.add_token(kind);
    }
    fn arrow_or_minus(&mut self) {
        if self.peek() == '>' {
            self.advance();
            self.add_token(TokenKind::Arrow);
        } else {
            self.add_token(TokenKind::Minus);
        }
    }
    /// Whether the word is an integer type such as `i1` or `i32`.
    fn is_int_type(word: &str) -> bool {
        match word.strip_prefix('i') {
            Some(bits) => !bits.is_empty() && bits.chars().all(|c| c.is_ascii_digit()),
            None => false,
        }
    }
    fn int_type(&mut self, c: char) {
        let word = self.peek_word(c);
        for _ in 0..(word.len() - 1) {
            self.advance();
        }
        self.add_token(TokenKind::IntType);
    }
    fn string(&mut self) -> Result<()> {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
                self.column = 0;
            }
            self.advance();
        }
        if self.is_at_end() {
            return Err(self.fail(self.column, "Unterminated string"));
        }
        self.advance();
        self.add_token(TokenKind::String);
        Ok(())
    }
    fn fail(&self, column: usize, msg: &str) -> anyhow::Error {
        let location = Location::new(self.line, column, self.start);
        let src: String = self.source.iter().collect();
        anyhow::anyhow!(Self::error(&src, &location, msg))
    }
    fn comment(&mut self) {
        while self.peek() != '\n' && !self.is_at_end() {
            self.advance();
        }
    }
    fn scan_token(&mut self) -> Result<()> {
        let c = self.advance();
        if let Some(kind) = TokenKind::punctuation(c) {
            self.add_token(kind);
            return Ok(());
        }
        match c {
            ' ' | '\r' | '\t' => (),
            '\n' => {
                self.line += 1;
                self.column = 0;
            }
            '/' if self.peek() == '/' => self.comment(),
            '-' => self.arrow_or_minus(),
            '"' => self.string()?,
            'i' if Scanner::is_int_type(&self.peek_word(c)) => self.int_type(c),
            s if s.is_ascii_digit() => self.number(),
            s if Scanner::is_identifier_start(s) => self.identifier(),
            _ => {
                let column = self.column.saturating_sub(1);
                return Err(self.fail(column, &format!("Unexpected character '{c}'")));
            }
        }
        Ok(())
    }
    fn scan_tokens(&mut self) -> Result<()> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }
        self.start = self.current;
        self.add_token(TokenKind::Eof);
        Ok(())
    }
    pub fn scan(src: &str) -> Result<Vec<Token>> {
        let mut scanner = Scanner::new(src);
        scanner.scan_tokens()?;
        Ok(scanner.tokens)
    }
    /// Render `msg` below the line that `loc` points to.
    ///
    /// The frame shows the offending line and the one before it, each
    /// prefixed with its zero-based line number.
    pub fn error(src: &str, loc: &Location, msg: &str) -> String {
        let lines = src.split('\n').collect::<Vec<&str>>();
        let n = loc.line();
        let frame_line = |i: usize| format!("{i}  | {}", lines.get(i).copied().unwrap_or(""));
        let mut frame = vec!["```".to_string()];
        if let Some(prev) = n.checked_sub(1) {
            frame.push(frame_line(prev));
        }
        frame.push(frame_line(n));
        let gutter = format!("{n}  | ").len();
        frame.push(format!("{}^ {msg}", " ".repeat(gutter + loc.column())));
        frame.push("```".to_string());
        frame.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Scanner::scan(src)
            .unwrap()
            .iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn scan_vm_op() {
        let tokens = Scanner::scan("%0 = vm.add.i32 %arg0, %c1 : i32\n").unwrap();
        let lexemes = tokens.iter().map(|t| t.lexeme.as_str()).collect::<Vec<_>>();
        assert_eq!(
            lexemes,
            vec!["%0", "=", "vm.add.i32", "%arg0", ",", "%c1", ":", "i32", ""]
        );
        assert_eq!(tokens[2].kind, TokenKind::BareIdentifier);
        assert_eq!(tokens[7].kind, TokenKind::IntType);
        assert_eq!(tokens[8].kind, TokenKind::Eof);
    }

    #[test]
    fn scan_literals() {
        assert_eq!(
            kinds(r#"-7 0.5 true false f32 "I1!i""#),
            vec![
                TokenKind::Minus,
                TokenKind::Integer,
                TokenKind::FloatLiteral,
                TokenKind::KwTrue,
                TokenKind::KwFalse,
                TokenKind::KwF32,
                TokenKind::String,
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("->"), vec![TokenKind::Arrow, TokenKind::Eof]);
    }

    #[test]
    fn scan_branches_and_symbols() {
        assert_eq!(
            kinds("cf.cond_br %0, ^bb1, ^bb2"),
            vec![
                TokenKind::BareIdentifier,
                TokenKind::PercentIdentifier,
                TokenKind::Comma,
                TokenKind::CaretIdentifier,
                TokenKind::Comma,
                TokenKind::CaretIdentifier,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("@io::@arg0[%c0]"),
            vec![
                TokenKind::AtIdentifier,
                TokenKind::Colon,
                TokenKind::Colon,
                TokenKind::AtIdentifier,
                TokenKind::LSquare,
                TokenKind::PercentIdentifier,
                TokenKind::RSquare,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scan_types() {
        let tokens = Scanner::scan("memref<?x4xf32> index i1 iree.module.export").unwrap();
        assert_eq!(tokens[0].lexeme, "memref");
        assert_eq!(tokens[2].kind, TokenKind::Question);
        assert_eq!(tokens[3].lexeme, "x4xf32");
        assert_eq!(tokens[5].kind, TokenKind::BareIdentifier);
        assert_eq!(tokens[5].lexeme, "index");
        assert_eq!(tokens[6].kind, TokenKind::IntType);
        assert_eq!(tokens[7].kind, TokenKind::BareIdentifier);
        assert_eq!(tokens[7].lexeme, "iree.module.export");
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = Scanner::scan("// a comment\nreturn").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].lexeme, "return");
        assert_eq!(tokens[0].location.line(), 1);
    }

    #[test]
    fn error_shows_code_frame() {
        let src = "func.func @f() {\n  return %x : i32\n}";
        let tokens = Scanner::scan(src).unwrap();
        let value = &tokens[6];
        assert_eq!(value.lexeme, "%x");
        assert_eq!(value.location.line(), 1);
        assert_eq!(value.location.column(), 9);

        let text = Scanner::error(src, &value.location, "unknown value");
        let expected = [
            "```",
            "0  | func.func @f() {",
            "1  |   return %x : i32",
            "              ^ unknown value",
            "```",
        ];
        assert_eq!(text, expected.join("\n"));

        let err = Scanner::scan("module { # }").unwrap_err();
        assert!(err.to_string().contains("Unexpected character '#'"));
    }
}
