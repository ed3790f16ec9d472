//! Read-only walk over statements and expressions.
//!
//! The walk reports scopes and declarations in the order a checker would
//! see them, so a visitor can tell a locally declared name from a free one
//! without knowing the statement shapes.
use crate::syntax::{
    CodeBlock, Element, Expr, ExprKind, FuncDecl, Ident, Position, Stmt, StmtKind, TypeSpec,
    VarStmt,
};

#[allow(unused_variables)]
pub trait Visitor {
    fn enter_stmt(&mut self, stmt: &Stmt) {}
    fn exit_stmt(&mut self, stmt: &Stmt) {}

    fn enter_expr(&mut self, expr: &Expr) {}
    fn exit_expr(&mut self, expr: &Expr) {}

    fn enter_scope(&mut self) {}
    fn exit_scope(&mut self) {}

    /// A name introduced into the innermost scope.
    fn declare(&mut self, name: &str) {}

    fn visit_ident(&mut self, expr: &Expr, ident: &Ident) {}
    fn visit_type_name(&mut self, name: &str, position: Position) {}
}

pub fn traverse_stmt(visitor: &mut dyn Visitor, stmt: &Stmt) {
    visitor.enter_stmt(stmt);

    match &stmt.kind {
        StmtKind::Assign(assign) => {
            for expr in assign.rhs.iter().chain(assign.lhs.iter()) {
                traverse_expr(visitor, expr);
            }
        }
        StmtKind::Struct(decl) => {
            visitor.declare(&decl.name);
            for field in &decl.fields {
                traverse_type_spec(visitor, &field.type_spec);
            }
            for method in &decl.methods {
                traverse_func(visitor, method);
            }
        }
        StmtKind::Type(decl) => {
            visitor.declare(&decl.name);
            traverse_type_spec(visitor, &decl.aliased);
        }
        StmtKind::Var(var) => traverse_var(visitor, var),
        StmtKind::Pass | StmtKind::Branch(_) => {}
        StmtKind::If(stmt) => {
            for branch in &stmt.branches {
                visitor.enter_scope();
                if let Some(var) = &branch.scoped_var {
                    traverse_var(visitor, var);
                }
                if let Some(condition) = &branch.condition {
                    traverse_expr(visitor, condition);
                }
                traverse_block(visitor, &branch.body);
                visitor.exit_scope();
            }
        }
        StmtKind::For(stmt) => {
            visitor.enter_scope();
            if let Some(var) = &stmt.scoped_var {
                traverse_var(visitor, var);
            }
            if let Some(condition) = &stmt.condition {
                traverse_expr(visitor, condition);
            }
            if let Some(repeat) = &stmt.repeat {
                traverse_stmt(visitor, repeat);
            }
            traverse_block(visitor, &stmt.body);
            visitor.exit_scope();
        }
        StmtKind::Expr(expr) => traverse_expr(visitor, expr),
        StmtKind::Return(values) => {
            for value in values {
                traverse_expr(visitor, value);
            }
        }
    }

    visitor.exit_stmt(stmt);
}

pub fn traverse_block(visitor: &mut dyn Visitor, block: &CodeBlock) {
    visitor.enter_scope();
    for stmt in &block.statements {
        traverse_stmt(visitor, stmt);
    }
    visitor.exit_scope();
}

fn traverse_var(visitor: &mut dyn Visitor, var: &VarStmt) {
    // A function can call itself, a plain variable can't see itself in its
    // initializer.
    if var.is_func {
        for decl in &var.vars {
            visitor.declare(&decl.name);
        }
    }
    for decl in &var.vars {
        if let Some(spec) = &decl.type_spec {
            traverse_type_spec(visitor, spec);
        }
        if let Some(init) = &decl.init {
            traverse_expr(visitor, init);
        }
    }
    if !var.is_func {
        for decl in &var.vars {
            visitor.declare(&decl.name);
        }
    }
}

fn traverse_func(visitor: &mut dyn Visitor, decl: &FuncDecl) {
    let params = decl
        .receiver
        .iter()
        .chain(decl.params.iter())
        .chain(decl.results.iter());

    for param in params.clone() {
        traverse_type_spec(visitor, &param.type_spec);
    }

    // Parameters share the scope of the function body.
    visitor.enter_scope();
    for param in params {
        if let Some(name) = &param.name {
            visitor.declare(name);
        }
    }
    for stmt in &decl.body.statements {
        traverse_stmt(visitor, stmt);
    }
    visitor.exit_scope();
}

pub fn traverse_expr(visitor: &mut dyn Visitor, expr: &Expr) {
    visitor.enter_expr(expr);

    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Blank => {}
        ExprKind::Compound(lit) => {
            if let Some(spec) = &lit.type_spec {
                traverse_type_spec(visitor, spec);
            }
            let keys_are_values = matches!(
                lit.type_spec,
                Some(TypeSpec::Map { .. }) | Some(TypeSpec::Array { .. }) | Some(TypeSpec::Slice(_))
            );
            for element in &lit.elements {
                traverse_element(visitor, element, keys_are_values);
            }
        }
        ExprKind::Binary { left, right, .. } => {
            traverse_expr(visitor, left);
            traverse_expr(visitor, right);
        }
        ExprKind::Unary { operand, .. } => traverse_expr(visitor, operand),
        ExprKind::Index { left, index } => {
            traverse_expr(visitor, left);
            traverse_expr(visitor, index);
        }
        // The field name is resolved against the left operand's type.
        ExprKind::Selector { left, .. } => traverse_expr(visitor, left),
        ExprKind::Call { callee, args } => {
            traverse_expr(visitor, callee);
            for arg in args {
                traverse_expr(visitor, arg);
            }
        }
        ExprKind::Func(decl) => traverse_func(visitor, decl),
        ExprKind::Ident(ident) => visitor.visit_ident(expr, ident),
        ExprKind::Type(spec) => traverse_type_spec(visitor, spec),
    }

    visitor.exit_expr(expr);
}

/// A bare name as a key is a struct field name unless the literal is
/// spelled as a map, array or slice.
fn traverse_element(visitor: &mut dyn Visitor, element: &Element, keys_are_values: bool) {
    if let Some(key) = &element.key {
        if keys_are_values || key.ident_node().is_none() {
            traverse_expr(visitor, key);
        }
    }
    traverse_expr(visitor, &element.value);
}

pub fn traverse_type_spec(visitor: &mut dyn Visitor, spec: &TypeSpec) {
    match spec {
        TypeSpec::Named { name, position } => visitor.visit_type_name(name, *position),
        TypeSpec::Array { of, .. } | TypeSpec::Slice(of) | TypeSpec::Pointer(of) => {
            traverse_type_spec(visitor, of)
        }
        TypeSpec::Map { key, value } => {
            traverse_type_spec(visitor, key);
            traverse_type_spec(visitor, value);
        }
        TypeSpec::Tuple(members) => {
            for member in members {
                traverse_type_spec(visitor, member);
            }
        }
        TypeSpec::Func { args, results } => {
            for spec in args.iter().chain(results.iter()) {
                traverse_type_spec(visitor, spec);
            }
        }
        TypeSpec::Blank => {}
    }
}
