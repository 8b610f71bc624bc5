//! Tokenizer for the FasterBASIC dialect.
//!
//! Case-insensitive keywords, type-suffixed identifiers, `"..."`
//! strings with doubled-quote escapes, decimal and `&H`/`&O` numeric
//! literals, and `'`/REM comments. Newlines are tokens; the parser
//! works in line units.

use thiserror::Error;

use crate::ast::SourceLoc;
use crate::token::{Keyword, Token, TokenKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated string literal at line {0}")]
    UnterminatedString(u32),
    #[error("invalid character '{ch}' at line {line}, column {col}")]
    InvalidChar { ch: char, line: u32, col: u32 },
    #[error("malformed numeric literal at line {line}, column {col}")]
    BadNumber { line: u32, col: u32 },
}

const TYPE_SUFFIXES: &[char] = &['$', '%', '&', '!', '#'];

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Lexer<'a> {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            col: 1,
            tokens: Vec::new(),
        }
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc::new(self.line, self.col)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn push(&mut self, kind: TokenKind, loc: SourceLoc) {
        self.tokens.push(Token::new(kind, loc));
    }

    fn skip_to_eol(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(ch) = self.peek() {
            let loc = self.loc();
            match ch {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    self.push(TokenKind::Newline, loc);
                }
                '\'' => {
                    self.skip_to_eol();
                }
                '"' => self.string(loc)?,
                '0'..='9' => self.number(loc)?,
                '.' => {
                    // A dot starting a digit run is a fractional literal.
                    self.bump();
                    if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.number_fraction(loc)?;
                    } else {
                        self.push(TokenKind::Dot, loc);
                    }
                }
                '&' => self.radix_number(loc)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.word(loc),
                _ => self.operator(loc)?,
            }
        }
        let loc = self.loc();
        self.push(TokenKind::Eof, loc);
        Ok(self.tokens)
    }

    fn string(&mut self, loc: SourceLoc) -> Result<(), LexError> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => {
                    // A doubled quote is an escaped quote.
                    if self.peek() == Some('"') {
                        self.bump();
                        text.push('"');
                    } else {
                        break;
                    }
                }
                Some('\n') | None => return Err(LexError::UnterminatedString(loc.line)),
                Some(ch) => text.push(ch),
            }
        }
        self.push(TokenKind::StringLit(text), loc);
        Ok(())
    }

    fn number(&mut self, loc: SourceLoc) -> Result<(), LexError> {
        let mut text = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }
        if self.peek() == Some('.') {
            text.push(self.bump().unwrap());
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            text.push(self.bump().unwrap());
            if matches!(self.peek(), Some('+' | '-')) {
                text.push(self.bump().unwrap());
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
            }
        }
        let value = text.parse::<f64>().map_err(|_| LexError::BadNumber {
            line: loc.line,
            col: loc.col,
        })?;
        self.push(TokenKind::Number(value), loc);
        Ok(())
    }

    fn number_fraction(&mut self, loc: SourceLoc) -> Result<(), LexError> {
        let mut text = String::from("0.");
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }
        let value = text.parse::<f64>().map_err(|_| LexError::BadNumber {
            line: loc.line,
            col: loc.col,
        })?;
        self.push(TokenKind::Number(value), loc);
        Ok(())
    }

    fn radix_number(&mut self, loc: SourceLoc) -> Result<(), LexError> {
        self.bump();
        let radix = match self.peek() {
            Some('h' | 'H') => 16,
            Some('o' | 'O') => 8,
            _ => {
                return Err(LexError::InvalidChar {
                    ch: '&',
                    line: loc.line,
                    col: loc.col,
                })
            }
        };
        self.bump();
        let mut text = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            text.push(self.bump().unwrap());
        }
        let value = u64::from_str_radix(&text, radix).map_err(|_| LexError::BadNumber {
            line: loc.line,
            col: loc.col,
        })?;
        self.push(TokenKind::Number(value as f64), loc);
        Ok(())
    }

    fn word(&mut self, loc: SourceLoc) {
        let mut text = String::new();
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            text.push(self.bump().unwrap());
        }
        // A type suffix glues onto the identifier and blocks keyword
        // recognition: PRINT$ is a variable, PRINT is not.
        if self.peek().is_some_and(|c| TYPE_SUFFIXES.contains(&c)) {
            text.push(self.bump().unwrap());
            self.push(TokenKind::Ident(text), loc);
            return;
        }
        match Keyword::lookup(&text) {
            Some(Keyword::Rem) => {
                // REM comments out the rest of the line.
                self.skip_to_eol();
            }
            Some(keyword) => self.push(TokenKind::Keyword(keyword), loc),
            None => self.push(TokenKind::Ident(text), loc),
        }
    }

    fn operator(&mut self, loc: SourceLoc) -> Result<(), LexError> {
        let ch = self.bump().unwrap();
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '\\' => TokenKind::Backslash,
            '^' => TokenKind::Caret,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::ColonEq
                } else {
                    TokenKind::Colon
                }
            }
            '=' => TokenKind::Eq,
            '<' => match self.peek() {
                Some('>') => {
                    self.bump();
                    TokenKind::Ne
                }
                Some('=') => {
                    self.bump();
                    TokenKind::Le
                }
                _ => TokenKind::Lt,
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            _ => {
                return Err(LexError::InvalidChar {
                    ch,
                    line: loc.line,
                    col: loc.col,
                })
            }
        };
        self.push(kind, loc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_print_expression() {
        assert_eq!(
            kinds("PRINT 2 + 3 * 4"),
            vec![
                TokenKind::Keyword(Keyword::Print),
                TokenKind::Number(2.0),
                TokenKind::Plus,
                TokenKind::Number(3.0),
                TokenKind::Star,
                TokenKind::Number(4.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(
            kinds("for i = 1 to 10"),
            vec![
                TokenKind::Keyword(Keyword::For),
                TokenKind::Ident("i".to_string()),
                TokenKind::Eq,
                TokenKind::Number(1.0),
                TokenKind::Keyword(Keyword::To),
                TokenKind::Number(10.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_type_suffix_blocks_keyword() {
        assert_eq!(
            kinds("PRINT$ = NAME$"),
            vec![
                TokenKind::Ident("PRINT$".to_string()),
                TokenKind::Eq,
                TokenKind::Ident("NAME$".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_with_escaped_quote() {
        assert_eq!(
            kinds(r#"PRINT "say ""hi""""#),
            vec![
                TokenKind::Keyword(Keyword::Print),
                TokenKind::StringLit("say \"hi\"".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            tokenize("PRINT \"oops"),
            Err(LexError::UnterminatedString(1))
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("PRINT 1 ' trailing\nREM whole line\nPRINT 2"),
            vec![
                TokenKind::Keyword(Keyword::Print),
                TokenKind::Number(1.0),
                TokenKind::Newline,
                TokenKind::Newline,
                TokenKind::Keyword(Keyword::Print),
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_hex_literal() {
        assert_eq!(kinds("&HFF"), vec![TokenKind::Number(255.0), TokenKind::Eof]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a <> b <= c >= d := e \\ f ^ g"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Ne,
                TokenKind::Ident("b".to_string()),
                TokenKind::Le,
                TokenKind::Ident("c".to_string()),
                TokenKind::Ge,
                TokenKind::Ident("d".to_string()),
                TokenKind::ColonEq,
                TokenKind::Ident("e".to_string()),
                TokenKind::Backslash,
                TokenKind::Ident("f".to_string()),
                TokenKind::Caret,
                TokenKind::Ident("g".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_line_and_column_tracking() {
        let tokens = tokenize("PRINT 1\nPRINT 2").unwrap();
        assert_eq!(tokens[0].loc, SourceLoc::new(1, 1));
        assert_eq!(tokens[3].loc, SourceLoc::new(2, 1));
        assert_eq!(tokens[4].loc, SourceLoc::new(2, 7));
    }

    #[test]
    fn test_fractional_literal() {
        assert_eq!(kinds(".5"), vec![TokenKind::Number(0.5), TokenKind::Eof]);
        assert_eq!(kinds("1.25"), vec![TokenKind::Number(1.25), TokenKind::Eof]);
    }
}
