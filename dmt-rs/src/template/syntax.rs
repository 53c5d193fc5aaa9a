//! Template syntax tree.
//!
//! One node type per grammar rule.  Every node carries the [`Pos`] of its
//! first token so the compiler can stamp positions onto the errors raised by
//! the components it builds.  Literals keep their raw token text: unwrapping
//! quotes and parsing numbers is the compiler's job.

/// Line (1-based) and column (0-based) of a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

// ── Template ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// `const NAME = expr;`, evaluated at compile time.
    Const { name: String, value: Expr, pos: Pos },
    Stmt(Stmt),
}

// ── Expressions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Raw string token including its quotes.
    Str(String),
    /// Raw numeric token.
    Number(String),
    Bool(bool),
    /// Raw hex token (`#..` or `0x..`).
    Hex(String),
    Var(String),
    List(Vec<Expr>),
    Call { name: String, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    NumericNegate,
    LogicalNegate,
    BitwiseNegate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulus,
    Pow,
    BitwiseAnd,
    BitwiseOr,
    LogicalAnd,
    LogicalOr,
    LessThan,
    GreaterThan,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Pos) -> Self {
        Self { kind, pos }
    }
}

// ── Statements ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `;`
    Empty,
    /// `{ stmt* }`
    Block(Vec<Stmt>),
    /// `name = expr;`
    Assign { name: String, value: Expr },
    /// `expr;`
    Expr(Expr),
    /// `function name(params) { … }`
    FunctionDecl { name: String, name_pos: Pos, params: Vec<String>, body: Box<Stmt> },
    /// `return expr;`
    Return(Expr),
    If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    For {
        init: Option<Box<Stmt>>,
        check: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Box<Stmt>,
    },
    Foreach { var: String, iterable: Expr, body: Box<Stmt> },
    While { cond: Expr, body: Box<Stmt> },
    DoWhile { body: Box<Stmt>, cond: Expr },
    /// `text expr;`
    Text(Expr),
    /// `attachment expr;`
    Attachment(Expr),
    /// `embed { part* }` or `embed.part`
    Embed(Vec<EmbedPart>),
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: Pos) -> Self {
        Self { kind, pos }
    }
}

// ── Embed parts ───────────────────────────────────────────────────────────────

/// `=` replaces the target sub-object, `+=` mutates what is there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutate {
    Replace,
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedPart {
    pub kind: EmbedPartKind,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbedPartKind {
    Title(Expr),
    Description(Expr),
    Url(Expr),
    Timestamp(Expr),
    Color(Expr),
    Image(Expr),
    Author { mutate: Mutate, body: AuthorBody },
    Footer { mutate: Mutate, body: FooterBody },
    Fields { mutate: Mutate, body: FieldsBody },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorProp {
    Name,
    Url,
    Icon,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthorBody {
    /// `"name", "url", "icon"`
    Flow { name: Expr, url: Option<Expr>, icon: Option<Expr> },
    /// `{ name: …, url: … }`
    Object(Vec<(AuthorProp, Expr)>),
    /// `author.url = …`
    Property(AuthorProp, Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterProp {
    Text,
    Icon,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FooterBody {
    Flow { text: Expr, icon: Option<Expr> },
    Object(Vec<(FooterProp, Expr)>),
    Property(FooterProp, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldProp {
    Title(Expr),
    Text(Expr),
    Inline(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldPart {
    /// `"title", "text" [, inline]`
    Flow { title: Expr, text: Expr, inline: bool, pos: Pos },
    /// `{ title: …, text: …, inline: true }`
    Object { props: Vec<FieldProp>, pos: Pos },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldsBody {
    Part(FieldPart),
    /// `[part, part, …]`
    List(Vec<FieldPart>),
    /// `field.title = …`
    Property(FieldProp),
}
