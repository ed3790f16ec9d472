//! Syntax tree
//! -----------
//!
//! The parser hands every file of a package over as a [`SourceFile`]. The
//! shapes below mirror the surface grammar:
//!
//! ```ignore
//! File          := "package" Id TopLevel*
//! TopLevel      := VarStmt | FuncStmt | StructStmt | TypeStmt
//! FuncStmt      := "func" Id "(" Params ")" Results? ":" Block
//! StructStmt    := "struct" Id ":" (Field | FuncStmt)*
//! TypeStmt      := "type" Id TypeSpec
//! VarStmt       := "var" VarDecl ("," VarDecl)*
//! Statement     := (Id ":")? (VarStmt | Assign | If | For | Branch | Return | "pass" | Expression)
//! If            := "if" (VarStmt ";")? Expression ":" Block ("elif" ...)* ("else" ":" Block)?
//! For           := "for" (VarStmt ";")? Expression? (";" Statement)? ":" Block
//! Branch        := ("break" | "continue" | "goto") Id?
//! ```
//!
//! Nodes are plain owned trees. Back references (labels, branch targets,
//! bound objects) are stored as handles, never as references.
use crate::semantic::{ObjectId, Type};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(
    Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Copy, Clone, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// Line position in a document (zero-based).
    pub line: u32,
    /// Character offset on a line in a document (zero-based).
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.character + 1)
    }
}

/// Stable handle of a statement, unique within a package.
#[derive(
    Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Copy, Clone, Default, Serialize, Deserialize,
)]
pub struct StmtId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Empty when the parser didn't record one.
    #[serde(default)]
    pub name: String,
    pub package: String,
    pub body: Vec<Stmt>,
}

impl SourceFile {
    pub fn new<S: Into<String>, P: Into<String>>(name: S, package: P, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            body,
        }
    }

    /// Numbers every statement in this file, nested ones included, starting
    /// from `next`.
    pub fn assign_ids(&mut self, next: &mut u32) {
        for stmt in &mut self.body {
            stmt.assign_ids(next);
        }
    }
}

// --- Types as written by the programmer

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeSpec {
    Named {
        name: String,
        #[serde(default)]
        position: Position,
    },
    Array {
        size: usize,
        of: Box<TypeSpec>,
    },
    Slice(Box<TypeSpec>),
    Map {
        key: Box<TypeSpec>,
        value: Box<TypeSpec>,
    },
    Pointer(Box<TypeSpec>),
    Tuple(Vec<TypeSpec>),
    Func {
        args: Vec<TypeSpec>,
        results: Vec<TypeSpec>,
    },
    /// `_`, left for inference.
    Blank,
}

impl TypeSpec {
    pub fn named<S: Into<String>>(name: S) -> Self {
        TypeSpec::Named {
            name: name.into(),
            position: Position::default(),
        }
    }

    pub fn slice(of: TypeSpec) -> Self {
        TypeSpec::Slice(Box::new(of))
    }

    pub fn array(size: usize, of: TypeSpec) -> Self {
        TypeSpec::Array {
            size,
            of: Box::new(of),
        }
    }

    pub fn map(key: TypeSpec, value: TypeSpec) -> Self {
        TypeSpec::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn pointer(to: TypeSpec) -> Self {
        TypeSpec::Pointer(Box::new(to))
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Named { name, .. } => write!(f, "{}", name),
            TypeSpec::Array { size, of } => write!(f, "[{}]{}", size, of),
            TypeSpec::Slice(of) => write!(f, "[]{}", of),
            TypeSpec::Map { key, value } => write!(f, "map[{}]{}", key, value),
            TypeSpec::Pointer(to) => write!(f, "*{}", to),
            TypeSpec::Tuple(members) => {
                write!(f, "(")?;
                write_list(f, members)?;
                write!(f, ")")
            }
            TypeSpec::Func { args, results } => {
                write!(f, "func(")?;
                write_list(f, args)?;
                write!(f, ")")?;
                match results.len() {
                    0 => Ok(()),
                    1 => write!(f, " {}", results[0]),
                    _ => {
                        write!(f, " (")?;
                        write_list(f, results)?;
                        write!(f, ")")
                    }
                }
            }
            TypeSpec::Blank => write!(f, "_"),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    let mut it = items.iter().peekable();

    while let Some(item) = it.next() {
        write!(f, "{}", item)?;
        if it.peek().is_some() {
            write!(f, ", ")?;
        }
    }
    Ok(())
}

// --- Expressions

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(default)]
    pub position: Position,
    pub kind: ExprKind,
    /// Filled in by the checker. `Unknown` until then.
    #[serde(default)]
    pub r#type: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    /// Represents no expression.
    Blank,
    Compound(CompoundLit),
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Index {
        left: Box<Expr>,
        index: Box<Expr>,
    },
    Selector {
        left: Box<Expr>,
        field: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Func(Box<FuncDecl>),
    Ident(Ident),
    Type(TypeSpec),
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            position: Position::default(),
            kind,
            r#type: Type::Unknown,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    // -- initializers
    pub fn ident<S: Into<String>>(name: S) -> Self {
        Self::new(ExprKind::Ident(Ident::new(name)))
    }

    pub fn int(value: i64) -> Self {
        Self::literal(LiteralKind::Int, value.to_string())
    }

    pub fn string<S: Into<String>>(value: S) -> Self {
        Self::literal(LiteralKind::String, value)
    }

    pub fn bool(value: bool) -> Self {
        Self::literal(LiteralKind::Bool, value.to_string())
    }

    pub fn literal<S: Into<String>>(kind: LiteralKind, value: S) -> Self {
        Self::new(ExprKind::Literal(Literal {
            kind,
            value: value.into(),
        }))
    }

    pub fn blank() -> Self {
        Self::new(ExprKind::Blank)
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(op: UnaryOperator, operand: Expr) -> Self {
        Self::new(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn index(left: Expr, index: Expr) -> Self {
        Self::new(ExprKind::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }

    pub fn selector<S: Into<String>>(left: Expr, field: S) -> Self {
        Self::new(ExprKind::Selector {
            left: Box::new(left),
            field: field.into(),
        })
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn func(decl: FuncDecl) -> Self {
        Self::new(ExprKind::Func(Box::new(decl)))
    }

    pub fn compound(type_spec: Option<TypeSpec>, elements: Vec<Element>) -> Self {
        Self::new(ExprKind::Compound(CompoundLit {
            type_spec,
            kind: CompoundKind::Unknown,
            elements,
        }))
    }

    pub fn type_expr(spec: TypeSpec) -> Self {
        Self::new(ExprKind::Type(spec))
    }

    pub fn ident_node(&self) -> Option<&Ident> {
        if let ExprKind::Ident(ident) = &self.kind {
            Some(ident)
        } else {
            None
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.kind, ExprKind::Blank)
    }

    fn assign_ids(&mut self, next: &mut u32) {
        match &mut self.kind {
            ExprKind::Literal(_) | ExprKind::Blank | ExprKind::Ident(_) | ExprKind::Type(_) => {}
            ExprKind::Compound(lit) => {
                for element in &mut lit.elements {
                    if let Some(key) = &mut element.key {
                        key.assign_ids(next);
                    }
                    element.value.assign_ids(next);
                }
            }
            ExprKind::Binary { left, right, .. } => {
                left.assign_ids(next);
                right.assign_ids(next);
            }
            ExprKind::Unary { operand, .. } => operand.assign_ids(next),
            ExprKind::Index { left, index } => {
                left.assign_ids(next);
                index.assign_ids(next);
            }
            ExprKind::Selector { left, .. } => left.assign_ids(next),
            ExprKind::Call { callee, args } => {
                callee.assign_ids(next);
                for arg in args {
                    arg.assign_ids(next);
                }
            }
            ExprKind::Func(decl) => decl.body.assign_ids(next),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub kind: LiteralKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiteralKind {
    Int,
    Float,
    String,
    Char,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundLit {
    #[serde(default)]
    pub type_spec: Option<TypeSpec>,
    /// Decided by the checker from the literal's type.
    #[serde(default)]
    pub kind: CompoundKind,
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompoundKind {
    Unknown,
    Empty,
    ListLike,
    MapLike,
}

impl Default for CompoundKind {
    fn default() -> Self {
        CompoundKind::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub key: Option<Expr>,
    pub value: Expr,
}

impl Element {
    pub fn positional(value: Expr) -> Self {
        Self { key: None, value }
    }

    pub fn keyed(key: Expr, value: Expr) -> Self {
        Self {
            key: Some(key),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Lt
                | BinaryOperator::Gt
                | BinaryOperator::Le
                | BinaryOperator::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        };
        write!(f, "{}", op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
    AddressOf,
    Deref,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::AddressOf => "&",
            UnaryOperator::Deref => "*",
        };
        write!(f, "{}", op)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub binding: Binding,
}

/// An identifier starts out `Unbound` and is bound in place once the checker
/// finds the object it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Binding {
    Unbound { name: String },
    Bound { name: String, object: ObjectId },
}

impl Ident {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            binding: Binding::Unbound { name: name.into() },
        }
    }

    pub fn name(&self) -> &str {
        match &self.binding {
            Binding::Unbound { name } | Binding::Bound { name, .. } => name,
        }
    }

    pub fn object(&self) -> Option<ObjectId> {
        match self.binding {
            Binding::Unbound { .. } => None,
            Binding::Bound { object, .. } => Some(object),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.object().is_some()
    }

    pub fn bind(&mut self, object: ObjectId) {
        let name = self.name().to_string();
        self.binding = Binding::Bound { name, object };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    #[serde(default)]
    pub name: Option<String>,
    /// `None` for non-method functions.
    #[serde(default)]
    pub receiver: Option<Param>,
    pub params: Vec<Param>,
    #[serde(default)]
    pub results: Vec<Param>,
    pub body: CodeBlock,
}

impl FuncDecl {
    pub fn new<S: Into<String>>(
        name: Option<S>,
        params: Vec<Param>,
        results: Vec<Param>,
        body: Vec<Stmt>,
    ) -> Self {
        Self {
            name: name.map(Into::into),
            receiver: None,
            params,
            results,
            body: CodeBlock::new(body),
        }
    }

    pub fn with_receiver(mut self, receiver: Param) -> Self {
        self.receiver = Some(receiver);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Position,
    pub type_spec: TypeSpec,
    #[serde(default)]
    pub object: Option<ObjectId>,
}

impl Param {
    pub fn new<S: Into<String>>(name: S, type_spec: TypeSpec) -> Self {
        Self {
            name: Some(name.into()),
            position: Position::default(),
            type_spec,
            object: None,
        }
    }

    pub fn unnamed(type_spec: TypeSpec) -> Self {
        Self {
            name: None,
            position: Position::default(),
            type_spec,
            object: None,
        }
    }
}

// --- Statements

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(default)]
    pub id: StmtId,
    #[serde(default)]
    pub position: Position,
    /// `None` if unlabeled.
    #[serde(default)]
    pub label: Option<StmtLabel>,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StmtLabel {
    pub name: String,
    #[serde(default)]
    pub object: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Assign(AssignStmt),
    Struct(StructDecl),
    Type(TypeDeclStmt),
    Var(VarStmt),
    Pass,
    If(IfStmt),
    For(ForStmt),
    Expr(Expr),
    Branch(BranchStmt),
    Return(Vec<Expr>),
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            id: StmtId::default(),
            position: Position::default(),
            label: None,
            kind,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn labeled<S: Into<String>>(mut self, name: S) -> Self {
        self.label = Some(StmtLabel {
            name: name.into(),
            object: None,
        });
        self
    }

    // -- initializers
    pub fn var<S: Into<String>>(name: S, type_spec: Option<TypeSpec>, init: Option<Expr>) -> Self {
        Self::new(StmtKind::Var(VarStmt {
            vars: vec![VarDecl::new(name, type_spec, init)],
            is_func: false,
        }))
    }

    /// `func name(params) results: body`
    pub fn func<S: Into<String>>(
        name: S,
        params: Vec<Param>,
        results: Vec<Param>,
        body: Vec<Stmt>,
    ) -> Self {
        let name = name.into();
        let decl = FuncDecl::new(Some(name.clone()), params, results, body);

        Self::new(StmtKind::Var(VarStmt {
            vars: vec![VarDecl::new(name, None, Some(Expr::func(decl)))],
            is_func: true,
        }))
    }

    pub fn type_decl<S: Into<String>>(name: S, aliased: TypeSpec) -> Self {
        Self::new(StmtKind::Type(TypeDeclStmt {
            name: name.into(),
            aliased,
            object: None,
        }))
    }

    pub fn struct_decl<S: Into<String>>(name: S, fields: Vec<Field>, methods: Vec<FuncDecl>) -> Self {
        Self::new(StmtKind::Struct(StructDecl {
            name: name.into(),
            fields,
            methods,
            object: None,
        }))
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }

    pub fn assign(lhs: Vec<Expr>, rhs: Vec<Expr>) -> Self {
        Self::new(StmtKind::Assign(AssignStmt {
            lhs,
            rhs,
            op: AssignOperator::Assign,
        }))
    }

    pub fn pass() -> Self {
        Self::new(StmtKind::Pass)
    }

    pub fn ret(values: Vec<Expr>) -> Self {
        Self::new(StmtKind::Return(values))
    }

    pub fn branch(kind: BranchKind, label: Option<&str>) -> Self {
        Self::new(StmtKind::Branch(BranchStmt {
            kind,
            label: label.map(str::to_string),
            goto_label: None,
            target: None,
        }))
    }

    pub fn for_loop(
        scoped_var: Option<VarStmt>,
        condition: Option<Expr>,
        repeat: Option<Stmt>,
        body: Vec<Stmt>,
    ) -> Self {
        Self::new(StmtKind::For(ForStmt {
            scoped_var,
            condition,
            repeat: repeat.map(Box::new),
            body: CodeBlock::new(body),
        }))
    }

    pub fn if_else(branches: Vec<IfBranch>) -> Self {
        Self::new(StmtKind::If(IfStmt { branches }))
    }

    /// Names this statement introduces into the enclosing scope.
    pub fn decls(&self) -> Vec<String> {
        match &self.kind {
            StmtKind::Var(var) => var.vars.iter().map(|v| v.name.clone()).collect(),
            StmtKind::Struct(decl) => vec![decl.name.clone()],
            StmtKind::Type(decl) => vec![decl.name.clone()],
            StmtKind::Assign(_)
            | StmtKind::Pass
            | StmtKind::If(_)
            | StmtKind::For(_)
            | StmtKind::Expr(_)
            | StmtKind::Branch(_)
            | StmtKind::Return(_) => vec![],
        }
    }

    /// Loops are the only statements `break`/`continue` can target.
    pub fn is_branchable(&self) -> bool {
        matches!(self.kind, StmtKind::For(_))
    }

    fn assign_ids(&mut self, next: &mut u32) {
        self.id = StmtId(*next);
        *next += 1;

        match &mut self.kind {
            StmtKind::Assign(assign) => {
                for expr in assign.lhs.iter_mut().chain(assign.rhs.iter_mut()) {
                    expr.assign_ids(next);
                }
            }
            StmtKind::Struct(decl) => {
                for method in &mut decl.methods {
                    method.body.assign_ids(next);
                }
            }
            StmtKind::Type(_) | StmtKind::Pass | StmtKind::Branch(_) => {}
            StmtKind::Var(var) => var.assign_ids(next),
            StmtKind::If(stmt) => {
                for branch in &mut stmt.branches {
                    if let Some(var) = &mut branch.scoped_var {
                        var.assign_ids(next);
                    }
                    if let Some(condition) = &mut branch.condition {
                        condition.assign_ids(next);
                    }
                    branch.body.assign_ids(next);
                }
            }
            StmtKind::For(stmt) => {
                if let Some(var) = &mut stmt.scoped_var {
                    var.assign_ids(next);
                }
                if let Some(condition) = &mut stmt.condition {
                    condition.assign_ids(next);
                }
                if let Some(repeat) = &mut stmt.repeat {
                    repeat.assign_ids(next);
                }
                stmt.body.assign_ids(next);
            }
            StmtKind::Expr(expr) => expr.assign_ids(next),
            StmtKind::Return(values) => {
                for value in values {
                    value.assign_ids(next);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignStmt {
    pub lhs: Vec<Expr>,
    pub rhs: Vec<Expr>,
    pub op: AssignOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOperator {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOperator {
    /// The binary operation a compound assignment applies, `None` for `=`.
    pub fn binary(self) -> Option<BinaryOperator> {
        match self {
            AssignOperator::Assign => None,
            AssignOperator::Add => Some(BinaryOperator::Add),
            AssignOperator::Sub => Some(BinaryOperator::Sub),
            AssignOperator::Mul => Some(BinaryOperator::Mul),
            AssignOperator::Div => Some(BinaryOperator::Div),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub methods: Vec<FuncDecl>,
    #[serde(default)]
    pub object: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub position: Position,
    pub type_spec: TypeSpec,
}

impl Field {
    pub fn new<S: Into<String>>(name: S, type_spec: TypeSpec) -> Self {
        Self {
            name: name.into(),
            position: Position::default(),
            type_spec,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDeclStmt {
    pub name: String,
    pub aliased: TypeSpec,
    #[serde(default)]
    pub object: Option<ObjectId>,
}

/// One `var` form. A single form may declare several names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarStmt {
    pub vars: Vec<VarDecl>,
    /// `func name(...)` is a variable declaration whose initializer is the
    /// function itself.
    #[serde(default)]
    pub is_func: bool,
}

impl VarStmt {
    pub fn single<S: Into<String>>(name: S, type_spec: Option<TypeSpec>, init: Option<Expr>) -> Self {
        Self {
            vars: vec![VarDecl::new(name, type_spec, init)],
            is_func: false,
        }
    }

    fn assign_ids(&mut self, next: &mut u32) {
        for var in &mut self.vars {
            if let Some(init) = &mut var.init {
                init.assign_ids(next);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub type_spec: Option<TypeSpec>,
    #[serde(default)]
    pub init: Option<Expr>,
    #[serde(default)]
    pub object: Option<ObjectId>,
}

impl VarDecl {
    pub fn new<S: Into<String>>(name: S, type_spec: Option<TypeSpec>, init: Option<Expr>) -> Self {
        Self {
            name: name.into(),
            position: Position::default(),
            type_spec,
            init,
            object: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub branches: Vec<IfBranch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfBranch {
    #[serde(default)]
    pub scoped_var: Option<VarStmt>,
    /// `None` for the trailing `else` branch.
    #[serde(default)]
    pub condition: Option<Expr>,
    pub body: CodeBlock,
}

impl IfBranch {
    pub fn new(scoped_var: Option<VarStmt>, condition: Option<Expr>, body: Vec<Stmt>) -> Self {
        Self {
            scoped_var,
            condition,
            body: CodeBlock::new(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    #[serde(default)]
    pub scoped_var: Option<VarStmt>,
    #[serde(default)]
    pub condition: Option<Expr>,
    #[serde(default)]
    pub repeat: Option<Box<Stmt>>,
    pub body: CodeBlock,
}

/// Break, continue, goto
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchStmt {
    pub kind: BranchKind,
    #[serde(default)]
    pub label: Option<String>,
    /// Is `None` for breaks/continues in unnamed loops.
    #[serde(default)]
    pub goto_label: Option<ObjectId>,
    /// Is `None` for goto statements. Otherwise it is the loop the
    /// break/continue refers to.
    #[serde(default)]
    pub target: Option<StmtId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchKind::Break => write!(f, "break"),
            BranchKind::Continue => write!(f, "continue"),
            BranchKind::Goto => write!(f, "goto"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("label `{name}` declared more than once")]
pub struct DuplicateLabel {
    pub name: String,
    pub previous: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CodeBlock {
    pub statements: Vec<Stmt>,
    #[serde(default)]
    pub labels: BTreeMap<String, ObjectId>,
}

impl CodeBlock {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self {
            statements,
            labels: BTreeMap::new(),
        }
    }

    pub fn add_label<S: Into<String>>(
        &mut self,
        name: S,
        object: ObjectId,
    ) -> Result<(), DuplicateLabel> {
        let name = name.into();

        if let Some(previous) = self.labels.get(&name) {
            return Err(DuplicateLabel {
                name,
                previous: *previous,
            });
        }
        self.labels.insert(name, object);
        Ok(())
    }

    pub fn get_label(&self, name: &str) -> Option<ObjectId> {
        self.labels.get(name).copied()
    }

    fn assign_ids(&mut self, next: &mut u32) {
        for stmt in &mut self.statements {
            stmt.assign_ids(next);
        }
    }
}
