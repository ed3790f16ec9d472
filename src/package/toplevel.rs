use crate::package::DependencyNode;
use crate::syntax::traverse::{traverse_stmt, Visitor};
use crate::syntax::{Expr, Ident, Position, Stmt};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Location of a top-level statement: index of the file in the package and
/// of the statement in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StmtRef {
    pub file: usize,
    pub index: usize,
}

/// A top-level statement together with the names it declares and the names
/// it uses without declaring them.
#[derive(Debug, Clone)]
pub struct TopLevelStmt {
    stmt: StmtRef,
    decls: Vec<String>,
    unbound_idents: BTreeMap<String, Position>,
}

impl TopLevelStmt {
    pub fn new(stmt_ref: StmtRef, stmt: &Stmt) -> Self {
        Self {
            stmt: stmt_ref,
            decls: stmt.decls(),
            unbound_idents: BTreeMap::new(),
        }
    }

    pub fn stmt(&self) -> StmtRef {
        self.stmt
    }

    pub fn decls(&self) -> &[String] {
        &self.decls
    }

    /// Free names mapped to the position they are first used at.
    pub fn unbound_idents(&self) -> &BTreeMap<String, Position> {
        &self.unbound_idents
    }

    pub fn load_deps(&mut self, stmt: &Stmt) {
        let mut collector = FreeNameCollector::new(&self.decls);

        traverse_stmt(&mut collector, stmt);
        self.unbound_idents = collector.free;
    }
}

impl DependencyNode for TopLevelStmt {
    fn decls(&self) -> &[String] {
        &self.decls
    }

    fn references(&self, name: &str) -> bool {
        self.unbound_idents.contains_key(name)
    }
}

struct FreeNameCollector<'a> {
    own: &'a [String],
    scopes: Vec<HashSet<String>>,
    free: BTreeMap<String, Position>,
}

impl<'a> FreeNameCollector<'a> {
    fn new(own: &'a [String]) -> Self {
        Self {
            own,
            scopes: vec![HashSet::new()],
            free: BTreeMap::new(),
        }
    }

    fn use_name(&mut self, name: &str, position: Position) {
        if self.own.iter().any(|own| own == name)
            || self.scopes.iter().any(|scope| scope.contains(name))
        {
            return;
        }
        self.free.entry(name.to_string()).or_insert(position);
    }
}

impl Visitor for FreeNameCollector<'_> {
    fn enter_scope(&mut self) {
        self.scopes.push(HashSet::new());
    }

    fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn visit_ident(&mut self, expr: &Expr, ident: &Ident) {
        self.use_name(ident.name(), expr.position);
    }

    fn visit_type_name(&mut self, name: &str, position: Position) {
        self.use_name(name, position);
    }
}
