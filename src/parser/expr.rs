//! Expression parsing by precedence climbing.
//!
//! From loosest to tightest: IMP, EQV, OR, XOR, AND, NOT, comparisons
//! (including IS type tests), additive, multiplicative (`\` and MOD
//! included), unary sign, `^` (left-associative), then the postfix
//! member/method chain and primaries.

use crate::ast::{BinOp, Expr, ExprKind, SourceLoc, UnOp};
use crate::token::{Keyword, TokenKind};

use super::{describe, is_builtin, normalize_name, ParseError, Parser};

impl Parser<'_> {
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_imp()
    }

    fn parse_imp(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_eqv()?;
        while self.check_keyword(Keyword::Imp) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_eqv()?;
            lhs = binary(BinOp::Imp, lhs, rhs, loc);
        }
        Ok(lhs)
    }

    fn parse_eqv(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_or()?;
        while self.check_keyword(Keyword::Eqv) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_or()?;
            lhs = binary(BinOp::Eqv, lhs, rhs, loc);
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_xor()?;
        while self.check_keyword(Keyword::Or) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_xor()?;
            lhs = binary(BinOp::Or, lhs, rhs, loc);
        }
        Ok(lhs)
    }

    fn parse_xor(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.check_keyword(Keyword::Xor) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_and()?;
            lhs = binary(BinOp::Xor, lhs, rhs, loc);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_not()?;
        while self.check_keyword(Keyword::And) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_not()?;
            lhs = binary(BinOp::And, lhs, rhs, loc);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.check_keyword(Keyword::Not) {
            let loc = self.loc();
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnOp::Not,
                    operand: Box::new(operand),
                },
                loc,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let loc = self.loc();
            let op = match self.peek().kind {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::Ne => BinOp::Ne,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                TokenKind::Keyword(Keyword::Is) => {
                    self.advance();
                    lhs = self.parse_is_test(lhs, loc)?;
                    continue;
                }
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs, loc);
        }
    }

    /// `expr IS NOTHING` or `expr IS ClassName`.
    fn parse_is_test(&mut self, value: Expr, loc: SourceLoc) -> Result<Expr, ParseError> {
        if self.eat_keyword(Keyword::Nothing) {
            return Ok(Expr::new(
                ExprKind::IsNothing {
                    value: Box::new(value),
                },
                loc,
            ));
        }
        let class_name = self.expect_ident("class name after IS")?;
        Ok(Expr::new(
            ExprKind::IsType {
                value: Box::new(value),
                class_name,
            },
            loc,
        ))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let loc = self.loc();
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs, loc);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let loc = self.loc();
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Backslash => BinOp::IntDiv,
                TokenKind::Keyword(Keyword::Mod) => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs, loc);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let loc = self.loc();
        let op = match self.peek().kind {
            TokenKind::Minus => UnOp::Neg,
            TokenKind::Plus => UnOp::Plus,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            loc,
        ))
    }

    // `^` parses left-associative.
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_postfix()?;
        while self.check(&TokenKind::Caret) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_postfix()?;
            lhs = binary(BinOp::Pow, lhs, rhs, loc);
        }
        Ok(lhs)
    }

    /// Postfix `.member` and `.method(args)` chains. After a dot, any
    /// keyword spelling is admitted as a member name.
    pub(crate) fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.check(&TokenKind::Dot) {
            let loc = self.loc();
            self.advance();
            let member = self.expect_member_name()?;
            if self.check(&TokenKind::LParen) {
                let args = self.parse_paren_args()?;
                expr = Expr::new(
                    ExprKind::MethodCall {
                        object: Box::new(expr),
                        method: member,
                        args,
                    },
                    loc,
                );
            } else {
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        member,
                    },
                    loc,
                );
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let loc = self.loc();
        match self.peek().kind.clone() {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::Number(value), loc))
            }
            TokenKind::StringLit(text) => {
                self.advance();
                Ok(Expr::new(ExprKind::StringLit(text), loc))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                self.advance();
                self.parse_identifier_expr(name, loc)
            }
            TokenKind::Keyword(Keyword::Iif) => {
                self.advance();
                self.parse_iif(loc)
            }
            TokenKind::Keyword(Keyword::New) => {
                self.advance();
                let class_name = self.expect_ident("class name after NEW")?;
                let args = if self.check(&TokenKind::LParen) {
                    self.parse_paren_args()?
                } else {
                    Vec::new()
                };
                Ok(Expr::new(ExprKind::New { class_name, args }, loc))
            }
            TokenKind::Keyword(Keyword::Create) => {
                self.advance();
                self.parse_create(loc)
            }
            TokenKind::Keyword(Keyword::Me) => {
                self.advance();
                Ok(Expr::new(ExprKind::Me, loc))
            }
            TokenKind::Keyword(Keyword::Nothing) => {
                self.advance();
                Ok(Expr::new(ExprKind::Nothing, loc))
            }
            TokenKind::Keyword(Keyword::Super) => {
                self.advance();
                if self.method_depth == 0 {
                    return Err(ParseError::new("SUPER is only valid inside a method", loc));
                }
                Ok(Expr::new(ExprKind::Super, loc))
            }
            TokenKind::Keyword(Keyword::List) => {
                self.advance();
                let elements = if self.check(&TokenKind::LParen) {
                    self.parse_paren_args()?
                } else {
                    Vec::new()
                };
                Ok(Expr::new(ExprKind::List(elements), loc))
            }
            ref other => Err(ParseError::new(
                format!("expected expression, found {}", describe(other)),
                loc,
            )),
        }
    }

    /// An identifier: bare variable, call, array access, or the string
    /// slice form `name$(start TO end)`.
    fn parse_identifier_expr(&mut self, name: String, loc: SourceLoc) -> Result<Expr, ParseError> {
        if !self.check(&TokenKind::LParen) {
            return Ok(Expr::new(ExprKind::Variable(name), loc));
        }
        self.advance();

        if self.check(&TokenKind::RParen) {
            self.advance();
            return Ok(self.call_or_array(name, Vec::new(), loc));
        }
        // Slice detection: `(TO e)`, `(e TO e)`, `(e TO)` desugar to
        // MID over the named string.
        if self.check_keyword(Keyword::To) {
            return self.parse_slice(name, None, loc);
        }
        let first = self.parse_expr()?;
        if self.check_keyword(Keyword::To) {
            return self.parse_slice(name, Some(first), loc);
        }

        let mut args = vec![first];
        while self.eat(&TokenKind::Comma) {
            args.push(self.parse_expr()?);
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(self.call_or_array(name, args, loc))
    }

    /// A built-in, a prescanned user function, or a known subroutine
    /// makes the parenthesized form a call; anything else is an array
    /// access.
    fn call_or_array(&self, name: String, args: Vec<Expr>, loc: SourceLoc) -> Expr {
        let known_call = is_builtin(&name)
            || self.user_functions.contains(&normalize_name(&name))
            || self.user_subs.contains(&normalize_name(&name));
        if known_call {
            Expr::new(ExprKind::Call { name, args }, loc)
        } else {
            Expr::new(ExprKind::ArrayAccess { name, indices: args }, loc)
        }
    }

    /// Desugar `name$(a TO b)` to MID(name$, a, b - a + 1); a missing
    /// start defaults to 1, a missing end means "to end of string"
    /// (two-argument MID).
    fn parse_slice(
        &mut self,
        name: String,
        start: Option<Expr>,
        loc: SourceLoc,
    ) -> Result<Expr, ParseError> {
        self.expect_keyword(Keyword::To)?;
        let end = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::RParen, "')'")?;

        let variable = Expr::new(ExprKind::Variable(name), loc);
        let args = match (start, end) {
            // length = end - start + 1; with a defaulted start of 1
            // that simplifies to `end`.
            (Some(start), Some(end)) => {
                let diff = binary(BinOp::Sub, end, start.clone(), loc);
                let length = binary(
                    BinOp::Add,
                    diff,
                    Expr::new(ExprKind::Number(1.0), loc),
                    loc,
                );
                vec![variable, start, length]
            }
            (None, Some(end)) => {
                vec![variable, Expr::new(ExprKind::Number(1.0), loc), end]
            }
            (Some(start), None) => vec![variable, start],
            (None, None) => vec![variable, Expr::new(ExprKind::Number(1.0), loc)],
        };
        Ok(Expr::new(
            ExprKind::Call {
                name: "MID".to_string(),
                args,
            },
            loc,
        ))
    }

    fn parse_iif(&mut self, loc: SourceLoc) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LParen, "'(' after IIF")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::Comma, "','")?;
        let then_expr = self.parse_expr()?;
        self.expect(&TokenKind::Comma, "','")?;
        let else_expr = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Expr::new(
            ExprKind::Iif {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            loc,
        ))
    }

    /// CREATE TypeName(args) or CREATE TypeName(Field := value, ...).
    fn parse_create(&mut self, loc: SourceLoc) -> Result<Expr, ParseError> {
        let type_name = self.expect_ident("type name after CREATE")?;
        self.expect(&TokenKind::LParen, "'(' after CREATE type name")?;

        if self.check(&TokenKind::RParen) {
            self.advance();
            return Ok(Expr::new(
                ExprKind::Create {
                    type_name,
                    args: Vec::new(),
                },
                loc,
            ));
        }

        // Named-field form: every item is `Name := expr`.
        let named = self.peek().ident_text().is_some()
            && self.peek_at(1).kind == TokenKind::ColonEq;
        if named {
            let mut fields = Vec::new();
            loop {
                let field = self.expect_member_name()?;
                self.expect(&TokenKind::ColonEq, "':='")?;
                let value = self.parse_expr()?;
                fields.push((field, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(Expr::new(ExprKind::CreateNamed { type_name, fields }, loc));
        }

        let mut args = vec![self.parse_expr()?];
        while self.eat(&TokenKind::Comma) {
            args.push(self.parse_expr()?);
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Expr::new(ExprKind::Create { type_name, args }, loc))
    }

    /// `(arg, ...)` with the opening paren still pending.
    pub(crate) fn parse_paren_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(args)
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr, loc: SourceLoc) -> Expr {
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        loc,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn expr_of(source: &str) -> Expr {
        let outcome = parse_source(&format!("x = {}\n", source)).unwrap();
        assert!(outcome.is_clean(), "errors: {:?}", outcome.errors);
        let mut program = outcome.program;
        let stmt = program.lines.remove(0).stmts.remove(0);
        match stmt.kind {
            crate::ast::StmtKind::Let { value, .. } => value,
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_logical_precedence_ladder() {
        // NOT binds tighter than AND, AND tighter than OR.
        let expr = expr_of("a OR NOT b AND c");
        match expr.kind {
            ExprKind::Binary { op: BinOp::Or, rhs, .. } => match rhs.kind {
                ExprKind::Binary { op: BinOp::And, lhs, .. } => {
                    assert!(matches!(lhs.kind, ExprKind::Unary { op: UnOp::Not, .. }));
                }
                other => panic!("expected AND, got {:?}", other),
            },
            other => panic!("expected OR, got {:?}", other),
        }
    }

    #[test]
    fn test_power_left_associative() {
        // 2 ^ 3 ^ 2 parses as (2 ^ 3) ^ 2.
        let expr = expr_of("2 ^ 3 ^ 2");
        match expr.kind {
            ExprKind::Binary { op: BinOp::Pow, lhs, rhs } => {
                assert!(matches!(
                    lhs.kind,
                    ExprKind::Binary { op: BinOp::Pow, .. }
                ));
                assert!(matches!(rhs.kind, ExprKind::Number(n) if n == 2.0));
            }
            other => panic!("expected ^, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_minus_binds_below_power() {
        // -2 ^ 2 is -(2 ^ 2).
        let expr = expr_of("-2 ^ 2");
        assert!(matches!(
            expr.kind,
            ExprKind::Unary { op: UnOp::Neg, .. }
        ));
    }

    #[test]
    fn test_integer_divide_and_mod() {
        let expr = expr_of("a \\ b MOD c");
        assert!(matches!(
            expr.kind,
            ExprKind::Binary { op: BinOp::Mod, .. }
        ));
    }

    #[test]
    fn test_call_vs_array_access() {
        // LEN is a built-in; an unknown parenthesized name is an array.
        assert!(matches!(
            expr_of("LEN(a$)").kind,
            ExprKind::Call { .. }
        ));
        assert!(matches!(
            expr_of("scores(3)").kind,
            ExprKind::ArrayAccess { .. }
        ));
    }

    #[test]
    fn test_string_slice_desugars_to_mid() {
        let expr = expr_of("name$(2 TO 5)");
        match expr.kind {
            ExprKind::Call { name, args } => {
                assert_eq!(name, "MID");
                assert_eq!(args.len(), 3);
            }
            other => panic!("expected MID call, got {:?}", other),
        }
        // Defaulted start: MID(name$, 1, end).
        let expr = expr_of("name$(TO 5)");
        match expr.kind {
            ExprKind::Call { name, args } => {
                assert_eq!(name, "MID");
                assert_eq!(args.len(), 3);
                assert!(matches!(args[1].kind, ExprKind::Number(n) if n == 1.0));
                assert!(matches!(args[2].kind, ExprKind::Number(n) if n == 5.0));
            }
            other => panic!("expected MID call, got {:?}", other),
        }
        // Open end: two-argument MID.
        let expr = expr_of("name$(2 TO)");
        match expr.kind {
            ExprKind::Call { name, args } => {
                assert_eq!(name, "MID");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected MID call, got {:?}", other),
        }
    }

    #[test]
    fn test_iif() {
        let expr = expr_of("IIF(a > 0, 1, -1)");
        assert!(matches!(expr.kind, ExprKind::Iif { .. }));
    }

    #[test]
    fn test_new_and_create() {
        assert!(matches!(
            expr_of("NEW Point(1, 2)").kind,
            ExprKind::New { .. }
        ));
        assert!(matches!(
            expr_of("CREATE Vec(1, 2)").kind,
            ExprKind::Create { .. }
        ));
        let expr = expr_of("CREATE Vec(X := 1, Y := 2)");
        match expr.kind {
            ExprKind::CreateNamed { type_name, fields } => {
                assert_eq!(type_name, "Vec");
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].0, "X");
            }
            other => panic!("expected named CREATE, got {:?}", other),
        }
    }

    #[test]
    fn test_member_chain_admits_keywords() {
        // LEFT and DATA are keywords/builtins, but valid member names.
        let expr = expr_of("node.LEFT.DATA");
        match expr.kind {
            ExprKind::Member { object, member } => {
                assert_eq!(member, "DATA");
                assert!(matches!(object.kind, ExprKind::Member { .. }));
            }
            other => panic!("expected member chain, got {:?}", other),
        }
    }

    #[test]
    fn test_method_call_chain() {
        let expr = expr_of("list.Append(1).Length()");
        assert!(matches!(
            expr.kind,
            ExprKind::MethodCall { ref method, .. } if method == "Length"
        ));
    }

    #[test]
    fn test_is_tests() {
        assert!(matches!(
            expr_of("obj IS NOTHING").kind,
            ExprKind::IsNothing { .. }
        ));
        assert!(matches!(
            expr_of("obj IS Shape").kind,
            ExprKind::IsType { .. }
        ));
    }

    #[test]
    fn test_super_outside_method_rejected() {
        let outcome = parse_source("x = SUPER.Size()\n").unwrap();
        assert!(!outcome.is_clean());
    }

    #[test]
    fn test_comparison_chain() {
        let expr = expr_of("1 + 2 < 3 * 4");
        match expr.kind {
            ExprKind::Binary { op: BinOp::Lt, lhs, rhs } => {
                assert!(matches!(lhs.kind, ExprKind::Binary { op: BinOp::Add, .. }));
                assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected <, got {:?}", other),
        }
    }
}
