//! Abstract syntax tree for the FasterBASIC dialect.
//!
//! Expressions and statements are closed tagged variants; matching on
//! the kind replaces virtual dispatch. Every node carries its source
//! location in the outer record, and each node exclusively owns its
//! children, so dropping a [`Program`] frees the whole tree.

/// Line/column position in the source text. Both are 1-based; column 0
/// marks synthesized nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLoc {
    pub line: u32,
    pub col: u32,
}

impl SourceLoc {
    pub fn new(line: u32, col: u32) -> SourceLoc {
        SourceLoc { line, col }
    }
}

/// A whole program: a sequence of source lines.
#[derive(Debug, Default, PartialEq)]
pub struct Program {
    pub lines: Vec<ProgramLine>,
}

/// One source line: an optional BASIC line number and its statements.
#[derive(Debug, PartialEq)]
pub struct ProgramLine {
    pub number: Option<u32>,
    pub stmts: Vec<Stmt>,
    pub loc: SourceLoc,
}

/// Binary operators, lowest-binding first in the precedence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Imp,
    Eqv,
    Or,
    Xor,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Plus,
    Not,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: SourceLoc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    StringLit(String),
    /// A bare variable reference; the name keeps its type suffix.
    Variable(String),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    /// Call of a built-in or user function.
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// Subscripted access to an array variable.
    ArrayAccess {
        name: String,
        indices: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        member: String,
    },
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    /// IIF(cond, a, b).
    Iif {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// NEW ClassName(args): heap class instantiation.
    New {
        class_name: String,
        args: Vec<Expr>,
    },
    /// CREATE TypeName(args): value-type construction, positional.
    Create {
        type_name: String,
        args: Vec<Expr>,
    },
    /// CREATE TypeName(Field := value, ...): named-field construction.
    CreateNamed {
        type_name: String,
        fields: Vec<(String, Expr)>,
    },
    /// The receiver inside a method body.
    Me,
    /// The null object reference.
    Nothing,
    /// The superclass receiver; valid only inside a method body.
    Super,
    /// LIST(e1, ...) list constructor.
    List(Vec<Expr>),
    /// `expr IS ClassName` type test.
    IsType {
        value: Box<Expr>,
        class_name: String,
    },
    /// `expr IS NOTHING` null test.
    IsNothing {
        value: Box<Expr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, loc: SourceLoc) -> Expr {
        Expr { kind, loc }
    }
}

/// Target of GOTO/GOSUB/ON ... GOTO.
#[derive(Debug, Clone, PartialEq)]
pub enum JumpTarget {
    Line(u32),
    Label(String),
}

/// Separator following a PRINT item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintSep {
    /// Newline after the item (end of list).
    None,
    /// `;`: no separation.
    Semicolon,
    /// `,`: advance to the next print zone.
    Comma,
}

#[derive(Debug, PartialEq)]
pub struct PrintItem {
    pub expr: Expr,
    pub sep: PrintSep,
}

/// One declared variable in DIM/REDIM.
#[derive(Debug, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub dims: Vec<Expr>,
    pub type_name: Option<String>,
}

/// A field inside TYPE ... END TYPE.
#[derive(Debug, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub type_name: Option<String>,
    pub loc: SourceLoc,
}

/// A formal parameter.
#[derive(Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_name: Option<String>,
}

/// CASE arm label.
#[derive(Debug, PartialEq)]
pub enum CaseLabel {
    /// CASE expr
    Value(Expr),
    /// CASE lo TO hi
    Range(Expr, Expr),
    /// CASE IS < expr (and the other comparison operators)
    Is(BinOp, Expr),
    /// CASE ELSE
    Else,
}

#[derive(Debug, PartialEq)]
pub struct CaseArm {
    pub labels: Vec<CaseLabel>,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, PartialEq)]
pub struct CatchArm {
    /// Variable binding the thrown value, if present.
    pub var: Option<String>,
    pub stmts: Vec<Stmt>,
}

/// Member of a CLASS body.
#[derive(Debug, PartialEq)]
pub enum ClassMember {
    Field(FieldDecl),
    Method {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
    Constructor {
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
    Destructor {
        body: Vec<Stmt>,
    },
}

/// Which loop an EXIT statement leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    For,
    Do,
    While,
    Function,
    Sub,
}

/// Condition position and sense on DO ... LOOP.
#[derive(Debug, PartialEq)]
pub enum DoCond {
    /// DO ... LOOP
    None,
    /// DO WHILE c / DO UNTIL c
    Pre { negated: bool, cond: Expr },
    /// LOOP WHILE c / LOOP UNTIL c
    Post { negated: bool, cond: Expr },
}

/// A statement node.
#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub loc: SourceLoc,
}

impl Stmt {
    pub fn new(kind: StmtKind, loc: SourceLoc) -> Stmt {
        Stmt { kind, loc }
    }
}

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    Print {
        items: Vec<PrintItem>,
    },
    Input {
        prompt: Option<String>,
        targets: Vec<Expr>,
    },
    /// Assignment; explicit LET and implicit assignments parse alike.
    Let {
        target: Expr,
        value: Expr,
    },
    Goto(JumpTarget),
    Gosub(JumpTarget),
    Return,
    If {
        cond: Expr,
        then_stmts: Vec<Stmt>,
        elseifs: Vec<(Expr, Vec<Stmt>)>,
        else_stmts: Option<Vec<Stmt>>,
    },
    For {
        var: String,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    DoLoop {
        cond: DoCond,
        body: Vec<Stmt>,
    },
    Repeat {
        body: Vec<Stmt>,
        until: Expr,
    },
    Select {
        subject: Expr,
        arms: Vec<CaseArm>,
    },
    Dim {
        decls: Vec<VarDecl>,
    },
    Redim {
        preserve: bool,
        decls: Vec<VarDecl>,
    },
    TypeDecl {
        name: String,
        fields: Vec<FieldDecl>,
    },
    ClassDecl {
        name: String,
        superclass: Option<String>,
        members: Vec<ClassMember>,
    },
    FunctionDecl {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
    SubDecl {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
    /// DEF FNname(params) = expr.
    DefFn {
        name: String,
        params: Vec<Param>,
        body: Expr,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchArm>,
        finally: Option<Vec<Stmt>>,
    },
    Throw(Expr),
    /// ON expr GOTO/GOSUB t1, t2, ...
    OnJump {
        selector: Expr,
        targets: Vec<JumpTarget>,
        gosub: bool,
    },
    /// ON ERROR GOTO target (None disables the handler).
    OnErrorGoto(Option<JumpTarget>),
    Option {
        name: String,
        value: Option<String>,
    },
    /// Bare call of a known subroutine: `MySub a, b`.
    SubCall {
        name: String,
        args: Vec<Expr>,
    },
    /// Method-call used as a statement: `obj.Method(args)`.
    ExprStmt(Expr),
    Exit(ExitKind),
    Continue,
    /// Program termination.
    End,
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(value: f64) -> Expr {
        Expr::new(ExprKind::Number(value), SourceLoc::default())
    }

    #[test]
    fn test_tree_ownership() {
        // A nested expression drops cleanly with its root.
        let sum = Expr::new(
            ExprKind::Binary {
                op: BinOp::Add,
                lhs: Box::new(num(2.0)),
                rhs: Box::new(Expr::new(
                    ExprKind::Binary {
                        op: BinOp::Mul,
                        lhs: Box::new(num(3.0)),
                        rhs: Box::new(num(4.0)),
                    },
                    SourceLoc::default(),
                )),
            },
            SourceLoc::new(1, 7),
        );
        match &sum.kind {
            ExprKind::Binary { op, rhs, .. } => {
                assert_eq!(*op, BinOp::Add);
                assert!(matches!(
                    rhs.kind,
                    ExprKind::Binary { op: BinOp::Mul, .. }
                ));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_locations_carried() {
        let stmt = Stmt::new(StmtKind::End, SourceLoc::new(42, 1));
        assert_eq!(stmt.loc.line, 42);
    }
}
