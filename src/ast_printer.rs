//! AST pretty-printer.
//!
//! Renders a [`Program`] back to source text that re-parses to an
//! equivalent tree. Operator precedence drives parenthesization, so
//! the printed form carries exactly the structure of the AST rather
//! than whatever the original text looked like.

use std::fmt::Write as _;

use crate::ast::*;

/// Render a whole program.
pub fn print_program(program: &Program) -> String {
    let mut printer = Printer::default();
    for line in &program.lines {
        printer.line_number = line.number;
        printer.stmt_seq(&line.stmts);
        printer.line_number = None;
    }
    printer.out
}

/// Render a single expression (diagnostics, tests).
pub fn print_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, 0);
    out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
    line_number: Option<u32>,
}

impl Printer {
    fn begin_line(&mut self) {
        if let Some(number) = self.line_number.take() {
            let _ = write!(self.out, "{} ", number);
        }
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn end_line(&mut self) {
        self.out.push('\n');
    }

    /// Emit a run of statements; simple ones belonging to the same
    /// source line could be colon-joined, but one per line re-parses
    /// identically and keeps block constructs readable.
    fn stmt_seq(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn block(&mut self, stmts: &[Stmt]) {
        self.indent += 1;
        self.stmt_seq(stmts);
        self.indent -= 1;
    }

    fn simple(&mut self, text: &str) {
        self.begin_line();
        self.out.push_str(text);
        self.end_line();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Print { items } => {
                self.begin_line();
                self.out.push_str("PRINT");
                for (index, item) in items.iter().enumerate() {
                    self.out.push(' ');
                    write_expr(&mut self.out, &item.expr, 0);
                    match item.sep {
                        PrintSep::Semicolon => self.out.push(';'),
                        PrintSep::Comma => self.out.push(','),
                        PrintSep::None => debug_assert_eq!(index, items.len() - 1),
                    }
                }
                self.end_line();
            }
            StmtKind::Input { prompt, targets } => {
                self.begin_line();
                self.out.push_str("INPUT ");
                if let Some(prompt) = prompt {
                    let _ = write!(self.out, "{}; ", quote(prompt));
                }
                for (index, target) in targets.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    write_expr(&mut self.out, target, 0);
                }
                self.end_line();
            }
            StmtKind::Let { target, value } => {
                self.begin_line();
                write_expr(&mut self.out, target, 0);
                self.out.push_str(" = ");
                write_expr(&mut self.out, value, 0);
                self.end_line();
            }
            StmtKind::Goto(target) => self.simple(&format!("GOTO {}", jump(target))),
            StmtKind::Gosub(target) => self.simple(&format!("GOSUB {}", jump(target))),
            StmtKind::Return => self.simple("RETURN"),
            StmtKind::If {
                cond,
                then_stmts,
                elseifs,
                else_stmts,
            } => self.if_stmt(cond, then_stmts, elseifs, else_stmts.as_deref()),
            StmtKind::For {
                var,
                start,
                end,
                step,
                body,
            } => {
                self.begin_line();
                let _ = write!(self.out, "FOR {} = ", var);
                write_expr(&mut self.out, start, 0);
                self.out.push_str(" TO ");
                write_expr(&mut self.out, end, 0);
                if let Some(step) = step {
                    self.out.push_str(" STEP ");
                    write_expr(&mut self.out, step, 0);
                }
                self.end_line();
                self.block(body);
                self.simple(&format!("NEXT {}", var));
            }
            StmtKind::While { cond, body } => {
                self.begin_line();
                self.out.push_str("WHILE ");
                write_expr(&mut self.out, cond, 0);
                self.end_line();
                self.block(body);
                self.simple("WEND");
            }
            StmtKind::DoLoop { cond, body } => {
                self.begin_line();
                self.out.push_str("DO");
                if let DoCond::Pre { negated, cond } = cond {
                    self.out
                        .push_str(if *negated { " UNTIL " } else { " WHILE " });
                    write_expr(&mut self.out, cond, 0);
                }
                self.end_line();
                self.block(body);
                self.begin_line();
                self.out.push_str("LOOP");
                if let DoCond::Post { negated, cond } = cond {
                    self.out
                        .push_str(if *negated { " UNTIL " } else { " WHILE " });
                    write_expr(&mut self.out, cond, 0);
                }
                self.end_line();
            }
            StmtKind::Repeat { body, until } => {
                self.simple("REPEAT");
                self.block(body);
                self.begin_line();
                self.out.push_str("UNTIL ");
                write_expr(&mut self.out, until, 0);
                self.end_line();
            }
            StmtKind::Select { subject, arms } => {
                self.begin_line();
                self.out.push_str("SELECT CASE ");
                write_expr(&mut self.out, subject, 0);
                self.end_line();
                for arm in arms {
                    self.begin_line();
                    self.out.push_str("CASE ");
                    for (index, label) in arm.labels.iter().enumerate() {
                        if index > 0 {
                            self.out.push_str(", ");
                        }
                        match label {
                            CaseLabel::Value(value) => write_expr(&mut self.out, value, 0),
                            CaseLabel::Range(lo, hi) => {
                                write_expr(&mut self.out, lo, 0);
                                self.out.push_str(" TO ");
                                write_expr(&mut self.out, hi, 0);
                            }
                            CaseLabel::Is(op, value) => {
                                let _ = write!(self.out, "IS {} ", binop_text(*op));
                                write_expr(&mut self.out, value, 0);
                            }
                            CaseLabel::Else => self.out.push_str("ELSE"),
                        }
                    }
                    self.end_line();
                    self.block(&arm.stmts);
                }
                self.simple("END SELECT");
            }
            StmtKind::Dim { decls } => {
                self.begin_line();
                self.out.push_str("DIM ");
                self.var_decls(decls);
                self.end_line();
            }
            StmtKind::Redim { preserve, decls } => {
                self.begin_line();
                self.out.push_str("REDIM ");
                if *preserve {
                    self.out.push_str("PRESERVE ");
                }
                self.var_decls(decls);
                self.end_line();
            }
            StmtKind::TypeDecl { name, fields } => {
                self.simple(&format!("TYPE {}", name));
                self.indent += 1;
                for field in fields {
                    match &field.type_name {
                        Some(type_name) => {
                            self.simple(&format!("{} AS {}", field.name, type_name))
                        }
                        None => self.simple(&field.name.clone()),
                    }
                }
                self.indent -= 1;
                self.simple("END TYPE");
            }
            StmtKind::ClassDecl {
                name,
                superclass,
                members,
            } => {
                match superclass {
                    Some(superclass) => {
                        self.simple(&format!("CLASS {} EXTENDS {}", name, superclass))
                    }
                    None => self.simple(&format!("CLASS {}", name)),
                }
                self.indent += 1;
                for member in members {
                    self.class_member(member);
                }
                self.indent -= 1;
                self.simple("END CLASS");
            }
            StmtKind::FunctionDecl { name, params, body } => {
                self.simple(&format!("FUNCTION {}{}", name, params_text(params)));
                self.block(body);
                self.simple("END FUNCTION");
            }
            StmtKind::SubDecl { name, params, body } => {
                self.simple(&format!("SUB {}{}", name, params_text(params)));
                self.block(body);
                self.simple("END SUB");
            }
            StmtKind::DefFn { name, params, body } => {
                self.begin_line();
                let _ = write!(self.out, "DEF {}{} = ", name, params_text(params));
                write_expr(&mut self.out, body, 0);
                self.end_line();
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                self.simple("TRY");
                self.block(body);
                for catch in catches {
                    match &catch.var {
                        Some(var) => self.simple(&format!("CATCH {}", var)),
                        None => self.simple("CATCH"),
                    }
                    self.block(&catch.stmts);
                }
                if let Some(finally) = finally {
                    self.simple("FINALLY");
                    self.block(finally);
                }
                self.simple("END TRY");
            }
            StmtKind::Throw(value) => {
                self.begin_line();
                self.out.push_str("THROW ");
                write_expr(&mut self.out, value, 0);
                self.end_line();
            }
            StmtKind::OnJump {
                selector,
                targets,
                gosub,
            } => {
                self.begin_line();
                self.out.push_str("ON ");
                write_expr(&mut self.out, selector, 0);
                self.out
                    .push_str(if *gosub { " GOSUB " } else { " GOTO " });
                for (index, target) in targets.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&jump(target));
                }
                self.end_line();
            }
            StmtKind::OnErrorGoto(target) => match target {
                Some(target) => self.simple(&format!("ON ERROR GOTO {}", jump(target))),
                None => self.simple("ON ERROR GOTO 0"),
            },
            StmtKind::Option { name, value } => match value {
                Some(value) => self.simple(&format!("OPTION {} {}", name, value)),
                None => self.simple(&format!("OPTION {}", name)),
            },
            StmtKind::SubCall { name, args } => {
                self.begin_line();
                self.out.push_str(name);
                if !args.is_empty() {
                    self.out.push('(');
                    for (index, arg) in args.iter().enumerate() {
                        if index > 0 {
                            self.out.push_str(", ");
                        }
                        write_expr(&mut self.out, arg, 0);
                    }
                    self.out.push(')');
                }
                self.end_line();
            }
            StmtKind::ExprStmt(expr) => {
                self.begin_line();
                write_expr(&mut self.out, expr, 0);
                self.end_line();
            }
            StmtKind::Exit(kind) => {
                let what = match kind {
                    ExitKind::For => "FOR",
                    ExitKind::Do => "DO",
                    ExitKind::While => "WHILE",
                    ExitKind::Function => "FUNCTION",
                    ExitKind::Sub => "SUB",
                };
                self.simple(&format!("EXIT {}", what));
            }
            StmtKind::Continue => self.simple("CONTINUE"),
            StmtKind::End => self.simple("END"),
            StmtKind::Stop => self.simple("STOP"),
        }
    }

    fn if_stmt(
        &mut self,
        cond: &Expr,
        then_stmts: &[Stmt],
        elseifs: &[(Expr, Vec<Stmt>)],
        else_stmts: Option<&[Stmt]>,
    ) {
        self.begin_line();
        self.out.push_str("IF ");
        write_expr(&mut self.out, cond, 0);
        self.out.push_str(" THEN");
        self.end_line();
        self.block(then_stmts);
        for (elseif_cond, body) in elseifs {
            self.begin_line();
            self.out.push_str("ELSEIF ");
            write_expr(&mut self.out, elseif_cond, 0);
            self.out.push_str(" THEN");
            self.end_line();
            self.block(body);
        }
        if let Some(body) = else_stmts {
            self.simple("ELSE");
            self.block(body);
        }
        self.simple("ENDIF");
    }

    fn var_decls(&mut self, decls: &[VarDecl]) {
        for (index, decl) in decls.iter().enumerate() {
            if index > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&decl.name);
            if !decl.dims.is_empty() {
                self.out.push('(');
                for (dim_index, dim) in decl.dims.iter().enumerate() {
                    if dim_index > 0 {
                        self.out.push_str(", ");
                    }
                    write_expr(&mut self.out, dim, 0);
                }
                self.out.push(')');
            }
            if let Some(type_name) = &decl.type_name {
                let _ = write!(self.out, " AS {}", type_name);
            }
        }
    }

    fn class_member(&mut self, member: &ClassMember) {
        match member {
            ClassMember::Field(field) => match &field.type_name {
                Some(type_name) => self.simple(&format!("DIM {} AS {}", field.name, type_name)),
                None => self.simple(&format!("DIM {}", field.name)),
            },
            ClassMember::Method { name, params, body } => {
                self.simple(&format!("METHOD {}{}", name, params_text(params)));
                self.block(body);
                self.simple("END METHOD");
            }
            ClassMember::Constructor { params, body } => {
                self.simple(&format!("CONSTRUCTOR{}", params_text(params)));
                self.block(body);
                self.simple("END CONSTRUCTOR");
            }
            ClassMember::Destructor { body } => {
                self.simple("DESTRUCTOR");
                self.block(body);
                self.simple("END DESTRUCTOR");
            }
        }
    }
}

fn jump(target: &JumpTarget) -> String {
    match target {
        JumpTarget::Line(number) => format!("{}", number),
        JumpTarget::Label(label) => label.clone(),
    }
}

fn params_text(params: &[Param]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let mut out = String::from("(");
    for (index, param) in params.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        out.push_str(&param.name);
        if let Some(type_name) = &param.type_name {
            let _ = write!(out, " AS {}", type_name);
        }
    }
    out.push(')');
    out
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn number_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

// Binding strength, matching the parser's climbing order.
fn binop_prec(op: BinOp) -> u8 {
    match op {
        BinOp::Imp => 1,
        BinOp::Eqv => 2,
        BinOp::Or => 3,
        BinOp::Xor => 4,
        BinOp::And => 5,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 7,
        BinOp::Add | BinOp::Sub => 8,
        BinOp::Mul | BinOp::Div | BinOp::IntDiv | BinOp::Mod => 9,
        BinOp::Pow => 11,
    }
}

fn binop_text(op: BinOp) -> &'static str {
    match op {
        BinOp::Imp => "IMP",
        BinOp::Eqv => "EQV",
        BinOp::Or => "OR",
        BinOp::Xor => "XOR",
        BinOp::And => "AND",
        BinOp::Eq => "=",
        BinOp::Ne => "<>",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::IntDiv => "\\",
        BinOp::Mod => "MOD",
        BinOp::Pow => "^",
    }
}

fn write_expr(out: &mut String, expr: &Expr, min_prec: u8) {
    match &expr.kind {
        ExprKind::Number(value) => out.push_str(&number_text(*value)),
        ExprKind::StringLit(text) => out.push_str(&quote(text)),
        ExprKind::Variable(name) => out.push_str(name),
        ExprKind::Binary { op, lhs, rhs } => {
            let prec = binop_prec(*op);
            let parens = prec < min_prec;
            if parens {
                out.push('(');
            }
            write_expr(out, lhs, prec);
            let _ = write!(out, " {} ", binop_text(*op));
            // Left associativity: the right operand needs one level
            // more binding.
            write_expr(out, rhs, prec + 1);
            if parens {
                out.push(')');
            }
        }
        ExprKind::Unary { op, operand } => {
            let (text, prec) = match op {
                UnOp::Not => ("NOT ", 6),
                UnOp::Neg => ("-", 10),
                UnOp::Plus => ("+", 10),
            };
            let parens = prec < min_prec;
            if parens {
                out.push('(');
            }
            out.push_str(text);
            write_expr(out, operand, prec);
            if parens {
                out.push(')');
            }
        }
        ExprKind::Call { name, args } => write_call(out, name, args),
        ExprKind::ArrayAccess { name, indices } => write_call(out, name, indices),
        ExprKind::Member { object, member } => {
            write_expr(out, object, 12);
            let _ = write!(out, ".{}", member);
        }
        ExprKind::MethodCall {
            object,
            method,
            args,
        } => {
            write_expr(out, object, 12);
            let _ = write!(out, ".{}", method);
            write_args(out, args);
        }
        ExprKind::Iif {
            cond,
            then_expr,
            else_expr,
        } => {
            out.push_str("IIF(");
            write_expr(out, cond, 0);
            out.push_str(", ");
            write_expr(out, then_expr, 0);
            out.push_str(", ");
            write_expr(out, else_expr, 0);
            out.push(')');
        }
        ExprKind::New { class_name, args } => {
            let _ = write!(out, "NEW {}", class_name);
            write_args(out, args);
        }
        ExprKind::Create { type_name, args } => {
            let _ = write!(out, "CREATE {}", type_name);
            write_args(out, args);
        }
        ExprKind::CreateNamed { type_name, fields } => {
            let _ = write!(out, "CREATE {}(", type_name);
            for (index, (name, value)) in fields.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{} := ", name);
                write_expr(out, value, 0);
            }
            out.push(')');
        }
        ExprKind::Me => out.push_str("ME"),
        ExprKind::Nothing => out.push_str("NOTHING"),
        ExprKind::Super => out.push_str("SUPER"),
        ExprKind::List(elements) => {
            out.push_str("LIST");
            write_args(out, elements);
        }
        ExprKind::IsType { value, class_name } => {
            write_expr(out, value, 8);
            let _ = write!(out, " IS {}", class_name);
        }
        ExprKind::IsNothing { value } => {
            write_expr(out, value, 8);
            out.push_str(" IS NOTHING");
        }
    }
}

fn write_call(out: &mut String, name: &str, args: &[Expr]) {
    out.push_str(name);
    write_args(out, args);
}

fn write_args(out: &mut String, args: &[Expr]) {
    out.push('(');
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write_expr(out, arg, 0);
    }
    out.push(')');
}
