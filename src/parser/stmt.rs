//! Statement parsing: dispatch on the leading token, implicit LET,
//! and the multi-line block constructs.
//!
//! Block terminators follow one rule everywhere: a compound token
//! (ENDIF, ENDSUB, ...) or a bare END immediately followed by the
//! block's own keyword closes the block, and is consumed only by the
//! construct that opened it. A lone END is a program-termination
//! statement.

use crate::ast::{
    CaseArm, CaseLabel, CatchArm, ClassMember, DoCond, Expr, ExprKind, ExitKind, FieldDecl,
    JumpTarget, Param, PrintItem, PrintSep, SourceLoc, Stmt, StmtKind, VarDecl,
};
use crate::token::{Keyword, TokenKind};

use super::{describe, normalize_name, ParseError, Parser};

impl Parser<'_> {
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.loc();

        if let TokenKind::Keyword(keyword) = self.peek().kind {
            // A keyword at statement start followed by `=` or `.` is an
            // identifier in this dialect (LET DATA = 1, LEFT.Size()...).
            // ME and SUPER keep their expression meaning.
            let admits_as_name = !matches!(keyword, Keyword::Me | Keyword::Super);
            if admits_as_name
                && matches!(self.peek_at(1).kind, TokenKind::Eq | TokenKind::Dot)
            {
                let name = keyword.text().to_string();
                self.advance();
                return self.finish_reference_statement(
                    Expr::new(ExprKind::Variable(name), loc),
                    loc,
                );
            }

            return match keyword {
                Keyword::Print => self.parse_print(loc),
                Keyword::Input => self.parse_input(loc),
                Keyword::Let => {
                    self.advance();
                    let target = self.parse_postfix()?;
                    self.expect(&TokenKind::Eq, "'='")?;
                    let value = self.parse_expr()?;
                    self.check_assign_target(&target)?;
                    Ok(Stmt::new(StmtKind::Let { target, value }, loc))
                }
                Keyword::Goto => {
                    self.advance();
                    let target = self.parse_jump_target()?;
                    Ok(Stmt::new(StmtKind::Goto(target), loc))
                }
                Keyword::Gosub => {
                    self.advance();
                    let target = self.parse_jump_target()?;
                    Ok(Stmt::new(StmtKind::Gosub(target), loc))
                }
                Keyword::Return => {
                    self.advance();
                    Ok(Stmt::new(StmtKind::Return, loc))
                }
                Keyword::If => self.parse_if(loc),
                Keyword::For => self.parse_for(loc),
                Keyword::While => self.parse_while(loc),
                Keyword::Do => self.parse_do(loc),
                Keyword::Repeat => self.parse_repeat(loc),
                Keyword::Select => self.parse_select(loc),
                Keyword::Dim => self.parse_dim(loc),
                Keyword::Redim => self.parse_redim(loc),
                Keyword::Type => self.parse_type_decl(loc),
                Keyword::Class => self.parse_class(loc),
                Keyword::Function => self.parse_function(loc),
                Keyword::Sub => self.parse_sub(loc),
                Keyword::Def => self.parse_def(loc),
                Keyword::Try => self.parse_try(loc),
                Keyword::Throw => {
                    self.advance();
                    let value = self.parse_expr()?;
                    Ok(Stmt::new(StmtKind::Throw(value), loc))
                }
                Keyword::On => self.parse_on(loc),
                Keyword::Option => self.parse_option(loc),
                Keyword::Exit => self.parse_exit(loc),
                Keyword::Continue => {
                    self.advance();
                    Ok(Stmt::new(StmtKind::Continue, loc))
                }
                Keyword::Stop => {
                    self.advance();
                    Ok(Stmt::new(StmtKind::Stop, loc))
                }
                Keyword::End => self.parse_end(loc),
                Keyword::Me | Keyword::Super => {
                    let receiver = self.parse_postfix()?;
                    self.finish_reference_statement(receiver, loc)
                }
                other => Err(ParseError::new(
                    format!("{} cannot start a statement", other.text()),
                    loc,
                )),
            };
        }

        if matches!(self.peek().kind, TokenKind::Ident(_)) {
            let reference = self.parse_postfix()?;
            return self.finish_reference_statement(reference, loc);
        }

        Err(ParseError::new(
            format!("expected statement, found {}", describe(&self.peek().kind)),
            loc,
        ))
    }

    /// A statement that began with a reference expression: assignment,
    /// method-call statement, or bare subroutine call.
    fn finish_reference_statement(
        &mut self,
        reference: Expr,
        loc: SourceLoc,
    ) -> Result<Stmt, ParseError> {
        if self.eat(&TokenKind::Eq) {
            let value = self.parse_expr()?;
            self.check_assign_target(&reference)?;
            return Ok(Stmt::new(
                StmtKind::Let {
                    target: reference,
                    value,
                },
                loc,
            ));
        }

        match reference.kind {
            ExprKind::MethodCall { .. } => Ok(Stmt::new(StmtKind::ExprStmt(reference), loc)),
            ExprKind::Call { name, args } if self.user_subs.contains(&normalize_name(&name)) => {
                Ok(Stmt::new(StmtKind::SubCall { name, args }, loc))
            }
            ExprKind::Variable(name) if self.user_subs.contains(&normalize_name(&name)) => {
                // Bare call, arguments without parentheses.
                let mut args = Vec::new();
                if !self.at_stmt_end() {
                    args.push(self.parse_expr()?);
                    while self.eat(&TokenKind::Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                Ok(Stmt::new(StmtKind::SubCall { name, args }, loc))
            }
            _ => Err(ParseError::new(
                "expected '=' or a callable statement".to_string(),
                loc,
            )),
        }
    }

    fn check_assign_target(&self, target: &Expr) -> Result<(), ParseError> {
        match target.kind {
            ExprKind::Variable(_) | ExprKind::ArrayAccess { .. } | ExprKind::Member { .. } => {
                Ok(())
            }
            _ => Err(ParseError::new(
                "invalid assignment target".to_string(),
                target.loc,
            )),
        }
    }

    /// End of a simple statement: line end, `:`, or the ELSE of a
    /// single-line IF.
    fn at_stmt_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Eof | TokenKind::Colon
        ) || self.check_keyword(Keyword::Else)
    }

    fn parse_jump_target(&mut self) -> Result<JumpTarget, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Number(value) if value >= 0.0 && value.fract() == 0.0 => {
                self.advance();
                Ok(JumpTarget::Line(value as u32))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(JumpTarget::Label(name))
            }
            ref other => Err(ParseError::new(
                format!("expected line number or label, found {}", describe(other)),
                self.loc(),
            )),
        }
    }

    // -----------------------------------------------------------------
    // Simple statements
    // -----------------------------------------------------------------

    fn parse_print(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let mut items = Vec::new();
        while !self.at_stmt_end() {
            let expr = self.parse_expr()?;
            let sep = match self.peek().kind {
                TokenKind::Semicolon => {
                    self.advance();
                    PrintSep::Semicolon
                }
                TokenKind::Comma => {
                    self.advance();
                    PrintSep::Comma
                }
                _ => PrintSep::None,
            };
            let done = sep == PrintSep::None;
            items.push(PrintItem { expr, sep });
            if done {
                break;
            }
        }
        Ok(Stmt::new(StmtKind::Print { items }, loc))
    }

    fn parse_input(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let prompt = match self.peek().kind.clone() {
            TokenKind::StringLit(text) => {
                self.advance();
                // Prompt separator: `;` appends "? ", `,` does not.
                if !self.eat(&TokenKind::Semicolon) {
                    self.eat(&TokenKind::Comma);
                }
                Some(text)
            }
            _ => None,
        };
        let mut targets = vec![self.parse_postfix()?];
        while self.eat(&TokenKind::Comma) {
            targets.push(self.parse_postfix()?);
        }
        for target in &targets {
            self.check_assign_target(target)?;
        }
        Ok(Stmt::new(StmtKind::Input { prompt, targets }, loc))
    }

    fn parse_end(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        // A bare END terminates the program. END <block-kw> here means
        // the terminator had no matching opener.
        let follower = match self.peek_at(1).kind {
            TokenKind::Keyword(keyword) => Some(keyword),
            _ => None,
        };
        if let Some(keyword) = follower {
            if matches!(
                keyword,
                Keyword::If
                    | Keyword::Select
                    | Keyword::Function
                    | Keyword::Sub
                    | Keyword::Try
                    | Keyword::Type
                    | Keyword::Class
                    | Keyword::Method
                    | Keyword::Constructor
                    | Keyword::Destructor
            ) {
                return Err(ParseError::new(
                    format!("END {} without matching {}", keyword.text(), keyword.text()),
                    loc,
                ));
            }
        }
        self.advance();
        Ok(Stmt::new(StmtKind::End, loc))
    }

    fn parse_exit(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let kind = if self.eat_keyword(Keyword::For) {
            ExitKind::For
        } else if self.eat_keyword(Keyword::Do) {
            ExitKind::Do
        } else if self.eat_keyword(Keyword::While) {
            ExitKind::While
        } else if self.eat_keyword(Keyword::Function) {
            ExitKind::Function
        } else if self.eat_keyword(Keyword::Sub) {
            ExitKind::Sub
        } else {
            return Err(ParseError::new(
                "EXIT must name FOR, DO, WHILE, FUNCTION, or SUB".to_string(),
                loc,
            ));
        };
        Ok(Stmt::new(StmtKind::Exit(kind), loc))
    }

    fn parse_on(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        if self.eat_keyword(Keyword::Error) {
            self.expect_keyword(Keyword::Goto)?;
            let target = self.parse_jump_target()?;
            // ON ERROR GOTO 0 disables the handler.
            let target = match target {
                JumpTarget::Line(0) => None,
                other => Some(other),
            };
            return Ok(Stmt::new(StmtKind::OnErrorGoto(target), loc));
        }
        let selector = self.parse_expr()?;
        let gosub = if self.eat_keyword(Keyword::Goto) {
            false
        } else if self.eat_keyword(Keyword::Gosub) {
            true
        } else {
            return Err(ParseError::new(
                "expected GOTO or GOSUB in ON statement".to_string(),
                self.loc(),
            ));
        };
        let mut targets = vec![self.parse_jump_target()?];
        while self.eat(&TokenKind::Comma) {
            targets.push(self.parse_jump_target()?);
        }
        Ok(Stmt::new(
            StmtKind::OnJump {
                selector,
                targets,
                gosub,
            },
            loc,
        ))
    }

    fn parse_option(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let name = self
            .peek()
            .ident_text()
            .map(str::to_string)
            .ok_or_else(|| ParseError::new("expected option name".to_string(), self.loc()))?;
        self.advance();
        let value = match self.peek().kind.clone() {
            TokenKind::Ident(text) => {
                self.advance();
                Some(text)
            }
            TokenKind::Number(value) => {
                self.advance();
                Some(format!("{}", value))
            }
            _ => None,
        };
        Ok(Stmt::new(StmtKind::Option { name, value }, loc))
    }

    // -----------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------

    fn parse_var_decl(&mut self) -> Result<VarDecl, ParseError> {
        let name = self.expect_ident("variable name")?;
        let mut dims = Vec::new();
        if self.eat(&TokenKind::LParen) {
            if !self.check(&TokenKind::RParen) {
                dims.push(self.parse_expr()?);
                while self.eat(&TokenKind::Comma) {
                    dims.push(self.parse_expr()?);
                }
            }
            self.expect(&TokenKind::RParen, "')'")?;
        }
        let type_name = if self.eat_keyword(Keyword::As) {
            Some(self.expect_ident("type name")?)
        } else {
            None
        };
        Ok(VarDecl {
            name,
            dims,
            type_name,
        })
    }

    fn parse_dim(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let mut decls = vec![self.parse_var_decl()?];
        while self.eat(&TokenKind::Comma) {
            decls.push(self.parse_var_decl()?);
        }
        Ok(Stmt::new(StmtKind::Dim { decls }, loc))
    }

    fn parse_redim(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let preserve = self.eat_keyword(Keyword::Preserve);
        let mut decls = vec![self.parse_var_decl()?];
        while self.eat(&TokenKind::Comma) {
            decls.push(self.parse_var_decl()?);
        }
        Ok(Stmt::new(StmtKind::Redim { preserve, decls }, loc))
    }

    fn parse_type_decl(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let name = self.expect_ident("type name")?;
        let mut fields = Vec::new();
        loop {
            while self.eat(&TokenKind::Newline) {}
            self.eat_line_number();
            if self.at_block_end(Keyword::EndType, Keyword::Type) {
                break;
            }
            if self.at_eof() {
                return Err(ParseError::new("TYPE without END TYPE".to_string(), loc));
            }
            let field_loc = self.loc();
            let field_name = self.expect_ident("field name")?;
            let type_name = if self.eat_keyword(Keyword::As) {
                Some(self.expect_ident("type name")?)
            } else {
                None
            };
            fields.push(FieldDecl {
                name: field_name,
                type_name,
                loc: field_loc,
            });
        }
        self.eat_block_end(Keyword::EndType, Keyword::Type);
        Ok(Stmt::new(StmtKind::TypeDecl { name, fields }, loc))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        if !self.eat(&TokenKind::LParen) {
            return Ok(params);
        }
        if self.check(&TokenKind::RParen) {
            self.advance();
            return Ok(params);
        }
        loop {
            let name = self.expect_ident("parameter name")?;
            let type_name = if self.eat_keyword(Keyword::As) {
                Some(self.expect_ident("type name")?)
            } else {
                None
            };
            params.push(Param { name, type_name });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(params)
    }

    fn parse_function(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let name = self.expect_ident("function name")?;
        let params = self.parse_params()?;
        let body =
            self.parse_block(loc, "FUNCTION", |p| {
                p.at_block_end(Keyword::EndFunction, Keyword::Function)
            })?;
        self.eat_block_end(Keyword::EndFunction, Keyword::Function);
        Ok(Stmt::new(
            StmtKind::FunctionDecl { name, params, body },
            loc,
        ))
    }

    fn parse_sub(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let name = self.expect_ident("sub name")?;
        let params = self.parse_params()?;
        let body = self.parse_block(loc, "SUB", |p| {
            p.at_block_end(Keyword::EndSub, Keyword::Sub)
        })?;
        self.eat_block_end(Keyword::EndSub, Keyword::Sub);
        Ok(Stmt::new(StmtKind::SubDecl { name, params, body }, loc))
    }

    fn parse_def(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let name = self.expect_ident("DEF FN name")?;
        let params = self.parse_params()?;
        self.expect(&TokenKind::Eq, "'='")?;
        let body = self.parse_expr()?;
        Ok(Stmt::new(StmtKind::DefFn { name, params, body }, loc))
    }

    fn parse_class(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let name = self.expect_ident("class name")?;
        let superclass = if self.eat_keyword(Keyword::Extends) {
            Some(self.expect_ident("superclass name")?)
        } else {
            None
        };

        let mut members = Vec::new();
        loop {
            while self.eat(&TokenKind::Newline) {}
            self.eat_line_number();
            if self.at_block_end(Keyword::EndClass, Keyword::Class) {
                break;
            }
            if self.at_eof() {
                return Err(ParseError::new("CLASS without END CLASS".to_string(), loc));
            }
            match self.parse_class_member() {
                Ok(member) => members.push(member),
                Err(error) => {
                    self.record(error);
                    self.sync_to_eol();
                }
            }
        }
        self.eat_block_end(Keyword::EndClass, Keyword::Class);
        Ok(Stmt::new(
            StmtKind::ClassDecl {
                name,
                superclass,
                members,
            },
            loc,
        ))
    }

    fn parse_class_member(&mut self) -> Result<ClassMember, ParseError> {
        let loc = self.loc();
        if self.eat_keyword(Keyword::Dim) {
            let decl = self.parse_var_decl()?;
            return Ok(ClassMember::Field(FieldDecl {
                name: decl.name,
                type_name: decl.type_name,
                loc,
            }));
        }
        if self.check_keyword(Keyword::Method) {
            self.advance();
            let name = self.expect_member_name()?;
            let params = self.parse_params()?;
            self.method_depth += 1;
            let body = self.parse_block(loc, "METHOD", |p| {
                p.at_block_end(Keyword::EndMethod, Keyword::Method)
            });
            self.method_depth -= 1;
            let body = body?;
            self.eat_block_end(Keyword::EndMethod, Keyword::Method);
            return Ok(ClassMember::Method { name, params, body });
        }
        if self.check_keyword(Keyword::Constructor) {
            self.advance();
            let params = self.parse_params()?;
            self.method_depth += 1;
            let body = self.parse_block(loc, "CONSTRUCTOR", |p| {
                p.at_block_end(Keyword::EndConstructor, Keyword::Constructor)
            });
            self.method_depth -= 1;
            let body = body?;
            self.eat_block_end(Keyword::EndConstructor, Keyword::Constructor);
            return Ok(ClassMember::Constructor { params, body });
        }
        if self.check_keyword(Keyword::Destructor) {
            self.advance();
            self.method_depth += 1;
            let body = self.parse_block(loc, "DESTRUCTOR", |p| {
                p.at_block_end(Keyword::EndDestructor, Keyword::Destructor)
            });
            self.method_depth -= 1;
            let body = body?;
            self.eat_block_end(Keyword::EndDestructor, Keyword::Destructor);
            return Ok(ClassMember::Destructor { body });
        }
        // Bare `name AS type` field form.
        let name = self.expect_ident("class member")?;
        let type_name = if self.eat_keyword(Keyword::As) {
            Some(self.expect_ident("type name")?)
        } else {
            None
        };
        Ok(ClassMember::Field(FieldDecl {
            name,
            type_name,
            loc,
        }))
    }

    // -----------------------------------------------------------------
    // Control flow
    // -----------------------------------------------------------------

    fn parse_if(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let cond = self.parse_expr()?;
        self.expect_keyword(Keyword::Then)?;

        if !matches!(self.peek().kind, TokenKind::Newline) {
            return self.parse_single_line_if(cond, loc);
        }

        let at_if_terminator = |p: &Parser| {
            p.check_keyword(Keyword::ElseIf)
                || p.check_keyword(Keyword::Else)
                || p.at_block_end(Keyword::EndIf, Keyword::If)
        };

        let then_stmts = self.parse_block(loc, "IF", at_if_terminator)?;
        let mut elseifs = Vec::new();
        let mut else_stmts = None;

        loop {
            if self.eat_keyword(Keyword::ElseIf) {
                let elseif_cond = self.parse_expr()?;
                self.expect_keyword(Keyword::Then)?;
                let body = self.parse_block(loc, "ELSEIF", at_if_terminator)?;
                elseifs.push((elseif_cond, body));
                continue;
            }
            if self.eat_keyword(Keyword::Else) {
                let body = self.parse_block(loc, "ELSE", |p| {
                    p.at_block_end(Keyword::EndIf, Keyword::If)
                })?;
                else_stmts = Some(body);
            }
            break;
        }
        self.eat_block_end(Keyword::EndIf, Keyword::If);
        Ok(Stmt::new(
            StmtKind::If {
                cond,
                then_stmts,
                elseifs,
                else_stmts,
            },
            loc,
        ))
    }

    fn parse_single_line_if(&mut self, cond: Expr, loc: SourceLoc) -> Result<Stmt, ParseError> {
        // Statements up to ELSE or end of line.
        let mut then_stmts = vec![self.parse_statement()?];
        while self.eat(&TokenKind::Colon) {
            if self.at_stmt_end() {
                break;
            }
            then_stmts.push(self.parse_statement()?);
        }
        let else_stmts = if self.eat_keyword(Keyword::Else) {
            let mut body = vec![self.parse_statement()?];
            while self.eat(&TokenKind::Colon) {
                if self.at_stmt_end() {
                    break;
                }
                body.push(self.parse_statement()?);
            }
            Some(body)
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                cond,
                then_stmts,
                elseifs: Vec::new(),
                else_stmts,
            },
            loc,
        ))
    }

    fn parse_for(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let var = self.expect_ident("loop variable")?;
        self.expect(&TokenKind::Eq, "'='")?;
        let start = self.parse_expr()?;
        self.expect_keyword(Keyword::To)?;
        let end = self.parse_expr()?;
        let step = if self.eat_keyword(Keyword::Step) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let body = self.parse_block(loc, "FOR", |p| p.check_keyword(Keyword::Next))?;
        self.expect_keyword(Keyword::Next)?;
        // NEXT may repeat the loop variable.
        if let TokenKind::Ident(_) = self.peek().kind {
            self.advance();
        }
        Ok(Stmt::new(
            StmtKind::For {
                var,
                start,
                end,
                step,
                body,
            },
            loc,
        ))
    }

    fn parse_while(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let cond = self.parse_expr()?;
        let body = self.parse_block(loc, "WHILE", |p| p.check_keyword(Keyword::Wend))?;
        self.expect_keyword(Keyword::Wend)?;
        Ok(Stmt::new(StmtKind::While { cond, body }, loc))
    }

    fn parse_do(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let pre = if self.eat_keyword(Keyword::While) {
            Some((false, self.parse_expr()?))
        } else if self.eat_keyword(Keyword::Until) {
            Some((true, self.parse_expr()?))
        } else {
            None
        };
        let body = self.parse_block(loc, "DO", |p| p.check_keyword(Keyword::Loop))?;
        self.expect_keyword(Keyword::Loop)?;
        let post = if self.eat_keyword(Keyword::While) {
            Some((false, self.parse_expr()?))
        } else if self.eat_keyword(Keyword::Until) {
            Some((true, self.parse_expr()?))
        } else {
            None
        };
        let cond = match (pre, post) {
            (Some(_), Some(_)) => {
                return Err(ParseError::new(
                    "DO loop cannot test both DO and LOOP conditions".to_string(),
                    loc,
                ))
            }
            (Some((negated, cond)), None) => DoCond::Pre { negated, cond },
            (None, Some((negated, cond))) => DoCond::Post { negated, cond },
            (None, None) => DoCond::None,
        };
        Ok(Stmt::new(StmtKind::DoLoop { cond, body }, loc))
    }

    fn parse_repeat(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let body = self.parse_block(loc, "REPEAT", |p| p.check_keyword(Keyword::Until))?;
        self.expect_keyword(Keyword::Until)?;
        let until = self.parse_expr()?;
        Ok(Stmt::new(StmtKind::Repeat { body, until }, loc))
    }

    fn parse_select(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect_keyword(Keyword::Case)?;
        let subject = self.parse_expr()?;

        let mut arms = Vec::new();
        loop {
            while self.eat(&TokenKind::Newline) {}
            self.eat_line_number();
            if self.at_block_end(Keyword::EndSelect, Keyword::Select) {
                break;
            }
            if self.at_eof() {
                return Err(ParseError::new(
                    "SELECT CASE without END SELECT".to_string(),
                    loc,
                ));
            }
            self.expect_keyword(Keyword::Case)?;
            let labels = if self.eat_keyword(Keyword::Else) {
                vec![CaseLabel::Else]
            } else {
                let mut labels = vec![self.parse_case_label()?];
                while self.eat(&TokenKind::Comma) {
                    labels.push(self.parse_case_label()?);
                }
                labels
            };
            let stmts = self.parse_block(loc, "CASE", |p| {
                p.check_keyword(Keyword::Case)
                    || p.at_block_end(Keyword::EndSelect, Keyword::Select)
            })?;
            arms.push(CaseArm { labels, stmts });
        }
        self.eat_block_end(Keyword::EndSelect, Keyword::Select);
        Ok(Stmt::new(StmtKind::Select { subject, arms }, loc))
    }

    fn parse_case_label(&mut self) -> Result<CaseLabel, ParseError> {
        if self.eat_keyword(Keyword::Is) {
            let op = match self.peek().kind {
                TokenKind::Eq => crate::ast::BinOp::Eq,
                TokenKind::Ne => crate::ast::BinOp::Ne,
                TokenKind::Lt => crate::ast::BinOp::Lt,
                TokenKind::Le => crate::ast::BinOp::Le,
                TokenKind::Gt => crate::ast::BinOp::Gt,
                TokenKind::Ge => crate::ast::BinOp::Ge,
                ref other => {
                    return Err(ParseError::new(
                        format!("expected comparison after CASE IS, found {}", describe(other)),
                        self.loc(),
                    ))
                }
            };
            self.advance();
            let value = self.parse_expr()?;
            return Ok(CaseLabel::Is(op, value));
        }
        let value = self.parse_expr()?;
        if self.eat_keyword(Keyword::To) {
            let hi = self.parse_expr()?;
            return Ok(CaseLabel::Range(value, hi));
        }
        Ok(CaseLabel::Value(value))
    }

    fn parse_try(&mut self, loc: SourceLoc) -> Result<Stmt, ParseError> {
        self.advance();
        let at_try_terminator = |p: &Parser| {
            p.check_keyword(Keyword::Catch)
                || p.check_keyword(Keyword::Finally)
                || p.at_block_end(Keyword::EndTry, Keyword::Try)
        };
        let body = self.parse_block(loc, "TRY", at_try_terminator)?;

        let mut catches = Vec::new();
        while self.eat_keyword(Keyword::Catch) {
            let var = match self.peek().kind.clone() {
                TokenKind::Ident(name) => {
                    self.advance();
                    Some(name)
                }
                _ => None,
            };
            let stmts = self.parse_block(loc, "CATCH", at_try_terminator)?;
            catches.push(CatchArm { var, stmts });
        }

        let finally = if self.eat_keyword(Keyword::Finally) {
            Some(self.parse_block(loc, "FINALLY", |p| {
                p.at_block_end(Keyword::EndTry, Keyword::Try)
            })?)
        } else {
            None
        };
        self.eat_block_end(Keyword::EndTry, Keyword::Try);
        Ok(Stmt::new(
            StmtKind::Try {
                body,
                catches,
                finally,
            },
            loc,
        ))
    }

    /// Shared multi-line block body loop: skip blank lines and leading
    /// line numbers, stop (without consuming) at the terminator, parse
    /// colon-separated statements per line, and recover to end of line
    /// on statement errors.
    fn parse_block(
        &mut self,
        open_loc: SourceLoc,
        construct: &str,
        at_end: impl Fn(&Parser) -> bool,
    ) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            while self.eat(&TokenKind::Newline) {}
            self.eat_line_number();
            if at_end(self) {
                return Ok(stmts);
            }
            if self.at_eof() {
                return Err(ParseError::new(
                    format!("{} block is never closed", construct),
                    open_loc,
                ));
            }
            loop {
                if matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) || at_end(self) {
                    break;
                }
                match self.parse_statement() {
                    Ok(stmt) => stmts.push(stmt),
                    Err(error) => {
                        self.record(error);
                        self.sync_to_eol();
                        break;
                    }
                }
                if !self.eat(&TokenKind::Colon) {
                    break;
                }
            }
            if at_end(self) {
                return Ok(stmts);
            }
            if !matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) {
                let error = ParseError::new(
                    format!(
                        "expected end of statement, found {}",
                        describe(&self.peek().kind)
                    ),
                    self.loc(),
                );
                self.record(error);
                self.sync_to_eol();
            }
        }
    }
}
