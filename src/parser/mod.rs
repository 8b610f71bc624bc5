//! Recursive-descent parser for the FasterBASIC dialect.
//!
//! The parser consumes a token slice and produces a [`Program`] plus a
//! list of errors. It never gives up on the first mistake: an error at
//! statement granularity is recorded and the parser resynchronizes at
//! the next end of line, so one bad statement does not hide later
//! diagnostics.
//!
//! Before the main parse, a linear prescan collects every FUNCTION and
//! SUB name; expression parsing uses those sets (plus the built-in
//! table) to tell calls apart from array accesses.

mod expr;
mod stmt;

use std::collections::HashSet;

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::ast::{Program, ProgramLine, SourceLoc};
use crate::lexer::{self, LexError};
use crate::token::{Keyword, Token, TokenKind};

/// A recorded (non-fatal) parse diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {}, col {}: {message}", .loc.line, .loc.col)]
pub struct ParseError {
    pub message: String,
    pub loc: SourceLoc,
}

impl ParseError {
    fn new(message: impl Into<String>, loc: SourceLoc) -> ParseError {
        ParseError {
            message: message.into(),
            loc,
        }
    }
}

/// Parse result: the (possibly partial) AST and every recorded error.
#[derive(Debug)]
pub struct ParseOutcome {
    pub program: Program,
    pub errors: Vec<ParseError>,
}

impl ParseOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Built-in function names, upper-case, suffix-free.
static BUILTINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ABS", "ASC", "ATN", "CHR", "CINT", "COS", "EXP", "FIX", "HEX", "INSTR", "INT", "LBOUND",
        "LCASE", "LEFT", "LEN", "LOG", "LTRIM", "MID", "OCT", "RIGHT", "RND", "RTRIM", "SGN",
        "SIN", "SIZE", "SPACE", "SQR", "STR", "STRING", "TAN", "TIMER", "TRIM", "UBOUND", "UCASE",
        "VAL",
    ]
    .into_iter()
    .collect()
});

/// Strip a type suffix and upper-case, the form used for name lookups.
/// Built-in detection is case-insensitive and suffix-blind.
pub(crate) fn normalize_name(name: &str) -> String {
    let stripped = name
        .strip_suffix(|c| matches!(c, '$' | '%' | '&' | '!' | '#'))
        .unwrap_or(name);
    stripped.to_ascii_uppercase()
}

pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(normalize_name(name).as_str())
}

/// Tokenize and parse a source string.
pub fn parse_source(source: &str) -> Result<ParseOutcome, LexError> {
    let tokens = lexer::tokenize(source)?;
    Ok(parse(&tokens))
}

/// Parse a token slice.
pub fn parse(tokens: &[Token]) -> ParseOutcome {
    if tokens.is_empty() {
        return ParseOutcome {
            program: Program::default(),
            errors: Vec::new(),
        };
    }
    let mut parser = Parser::new(tokens);
    parser.prescan();
    let program = parser.parse_program();
    ParseOutcome {
        program,
        errors: parser.errors,
    }
}

pub(crate) struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    pub(crate) errors: Vec<ParseError>,
    pub(crate) user_functions: HashSet<String>,
    pub(crate) user_subs: HashSet<String>,
    /// Nesting depth of METHOD/CONSTRUCTOR/DESTRUCTOR bodies; SUPER is
    /// only admitted when this is nonzero.
    pub(crate) method_depth: u32,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(tokens: &'a [Token]) -> Parser<'a> {
        Parser {
            tokens,
            pos: 0,
            errors: Vec::new(),
            user_functions: HashSet::new(),
            user_subs: HashSet::new(),
            method_depth: 0,
        }
    }

    /// Record every `FUNCTION name` and `SUB name` before parsing, so
    /// forward references disambiguate correctly.
    pub(crate) fn prescan(&mut self) {
        for window in self.tokens.windows(2) {
            let name = match &window[1].kind {
                TokenKind::Ident(name) => normalize_name(name),
                _ => continue,
            };
            match window[0].kind {
                TokenKind::Keyword(Keyword::Function) => {
                    self.user_functions.insert(name);
                }
                TokenKind::Keyword(Keyword::Sub) => {
                    self.user_subs.insert(name);
                }
                _ => {}
            }
        }
    }

    // -----------------------------------------------------------------
    // Token cursor
    // -----------------------------------------------------------------

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_at(&self, ahead: usize) -> &Token {
        &self.tokens[(self.pos + ahead).min(self.tokens.len() - 1)]
    }

    pub(crate) fn loc(&self) -> SourceLoc {
        self.peek().loc
    }

    pub(crate) fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    pub(crate) fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_keyword(keyword)
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(ParseError::new(
                format!("expected {}, found {}", what, describe(&self.peek().kind)),
                self.loc(),
            ))
        }
    }

    pub(crate) fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(ParseError::new(
                format!(
                    "expected {}, found {}",
                    keyword.text(),
                    describe(&self.peek().kind)
                ),
                self.loc(),
            ))
        }
    }

    pub(crate) fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::new(
                format!("expected {}, found {}", what, describe(other)),
                self.loc(),
            )),
        }
    }

    /// Member position admits any keyword spelling as a name.
    pub(crate) fn expect_member_name(&mut self) -> Result<String, ParseError> {
        match self.peek().ident_text() {
            Some(text) => {
                let text = text.to_string();
                self.advance();
                Ok(text)
            }
            None => Err(ParseError::new(
                format!("expected member name, found {}", describe(&self.peek().kind)),
                self.loc(),
            )),
        }
    }

    // -----------------------------------------------------------------
    // Recovery
    // -----------------------------------------------------------------

    pub(crate) fn record(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Skip to (not past) the next end of line.
    pub(crate) fn sync_to_eol(&mut self) {
        while !matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) {
            self.advance();
        }
    }

    // -----------------------------------------------------------------
    // Program structure
    // -----------------------------------------------------------------

    fn parse_program(&mut self) -> Program {
        let mut program = Program::default();
        while !self.at_eof() {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            let loc = self.loc();
            let number = self.eat_line_number();
            let stmts = self.parse_line_statements();
            if !stmts.is_empty() || number.is_some() {
                program.lines.push(ProgramLine {
                    number,
                    stmts,
                    loc,
                });
            }
        }
        program
    }

    /// A leading integer literal on a fresh line is a BASIC line
    /// number.
    pub(crate) fn eat_line_number(&mut self) -> Option<u32> {
        if let TokenKind::Number(value) = self.peek().kind {
            if value >= 0.0 && value.fract() == 0.0 {
                self.advance();
                return Some(value as u32);
            }
        }
        None
    }

    /// Parse the statements of one physical line, colon-separated,
    /// recovering to end of line on error.
    pub(crate) fn parse_line_statements(&mut self) -> Vec<crate::ast::Stmt> {
        let mut stmts = Vec::new();
        loop {
            if matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) {
                self.eat(&TokenKind::Newline);
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(error) => {
                    self.record(error);
                    self.sync_to_eol();
                    self.eat(&TokenKind::Newline);
                    break;
                }
            }
            if self.eat(&TokenKind::Colon) {
                continue;
            }
            if matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) {
                self.eat(&TokenKind::Newline);
                break;
            }
            self.record(ParseError::new(
                format!(
                    "expected end of statement, found {}",
                    describe(&self.peek().kind)
                ),
                self.loc(),
            ));
            self.sync_to_eol();
            self.eat(&TokenKind::Newline);
            break;
        }
        stmts
    }

    /// True when the cursor sits on the terminator of a block opened by
    /// `keyword`: either the compound token (ENDIF, ENDSUB, ...) or a
    /// bare END immediately followed by that keyword. A lone END is a
    /// program-termination statement, never a scope closer.
    pub(crate) fn at_block_end(&self, compound: Keyword, keyword: Keyword) -> bool {
        if self.check_keyword(compound) {
            return true;
        }
        self.check_keyword(Keyword::End) && self.peek_at(1).is_keyword(keyword)
    }

    /// Consume the terminator checked by [`Parser::at_block_end`].
    pub(crate) fn eat_block_end(&mut self, compound: Keyword, keyword: Keyword) {
        if self.eat_keyword(compound) {
            return;
        }
        let ate_end = self.eat_keyword(Keyword::End);
        debug_assert!(ate_end);
        let ate_kw = self.eat_keyword(keyword);
        debug_assert!(ate_kw);
    }
}

pub(crate) fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(value) => format!("number {}", value),
        TokenKind::StringLit(_) => "string literal".to_string(),
        TokenKind::Ident(name) => format!("identifier '{}'", name),
        TokenKind::Keyword(keyword) => keyword.text().to_string(),
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::Plus => "'+'".to_string(),
        TokenKind::Minus => "'-'".to_string(),
        TokenKind::Star => "'*'".to_string(),
        TokenKind::Slash => "'/'".to_string(),
        TokenKind::Backslash => "'\\'".to_string(),
        TokenKind::Caret => "'^'".to_string(),
        TokenKind::Eq => "'='".to_string(),
        TokenKind::Ne => "'<>'".to_string(),
        TokenKind::Lt => "'<'".to_string(),
        TokenKind::Le => "'<='".to_string(),
        TokenKind::Gt => "'>'".to_string(),
        TokenKind::Ge => "'>='".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Semicolon => "';'".to_string(),
        TokenKind::Colon => "':'".to_string(),
        TokenKind::Dot => "'.'".to_string(),
        TokenKind::ColonEq => "':='".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, ExprKind, StmtKind};

    fn parse_ok(source: &str) -> Program {
        let outcome = parse_source(source).unwrap();
        assert!(outcome.is_clean(), "errors: {:?}", outcome.errors);
        outcome.program
    }

    #[test]
    fn test_print_precedence() {
        // 2 + 3 * 4 must parse as 2 + (3 * 4).
        let program = parse_ok("PRINT 2 + 3 * 4");
        let stmt = &program.lines[0].stmts[0];
        let items = match &stmt.kind {
            StmtKind::Print { items } => items,
            other => panic!("expected PRINT, got {:?}", other),
        };
        assert_eq!(items.len(), 1);
        match &items[0].expr.kind {
            ExprKind::Binary { op, lhs, rhs } => {
                assert_eq!(*op, BinOp::Add);
                assert!(matches!(lhs.kind, ExprKind::Number(n) if n == 2.0));
                assert!(matches!(
                    rhs.kind,
                    ExprKind::Binary { op: BinOp::Mul, .. }
                ));
            }
            other => panic!("expected binary +, got {:?}", other),
        }
    }

    #[test]
    fn test_prescan_finds_forward_references() {
        let source = "\
PRINT Area(2)
FUNCTION Area(r)
  Area = r * r
END FUNCTION
SUB Greet
  PRINT \"hi\"
END SUB
";
        let tokens = lexer::tokenize(source).unwrap();
        let mut parser = Parser::new(&tokens);
        parser.prescan();
        assert!(parser.user_functions.contains("AREA"));
        assert!(parser.user_subs.contains("GREET"));
    }

    #[test]
    fn test_error_recovery_continues() {
        let outcome = parse_source("PRINT )\nPRINT 1\nPRINT +\nPRINT 2\n").unwrap();
        // Two bad lines, two good lines; both errors surface.
        assert_eq!(outcome.errors.len(), 2);
        let prints = outcome
            .program
            .lines
            .iter()
            .flat_map(|line| &line.stmts)
            .filter(|stmt| matches!(stmt.kind, StmtKind::Print { .. }))
            .count();
        assert_eq!(prints, 2);
    }

    #[test]
    fn test_line_numbers() {
        let program = parse_ok("10 PRINT 1\n20 GOTO 10\n");
        assert_eq!(program.lines[0].number, Some(10));
        assert_eq!(program.lines[1].number, Some(20));
        assert!(matches!(
            program.lines[1].stmts[0].kind,
            StmtKind::Goto(crate::ast::JumpTarget::Line(10))
        ));
    }

    #[test]
    fn test_colon_separated_statements() {
        let program = parse_ok("x = 1 : y = 2 : PRINT x + y\n");
        assert_eq!(program.lines[0].stmts.len(), 3);
    }

    #[test]
    fn test_builtin_lookup() {
        assert!(is_builtin("mid"));
        assert!(is_builtin("MID$"));
        assert!(is_builtin("Left"));
        assert!(!is_builtin("frobnicate"));
    }
}
