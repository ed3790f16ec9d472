use crate::semantic::{Builtins, Object, ObjectId, ObjectTable};
use log::debug;
use std::collections::HashMap;

/// Stack of lexical scopes. The bottom scope holds the builtin functions and
/// is never popped.
#[derive(Debug)]
pub struct ScopeStack<'b> {
    builtins: &'b Builtins,
    scopes: Vec<HashMap<String, ObjectId>>,
}

impl<'b> ScopeStack<'b> {
    pub fn new(builtins: &'b Builtins) -> Self {
        let mut stack = Self {
            builtins,
            scopes: vec![],
        };

        stack.erase_all_except_builtins();
        stack
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        } else {
            debug!("[scope] attempt to pop the builtin scope");
        }
    }

    /// Number of scopes above the builtin one.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Inserts into the innermost scope, replacing a previous entry.
    pub fn add_object<S: Into<String>>(&mut self, name: S, id: ObjectId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), id);
        }
    }

    pub fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .or_else(|| self.builtins.type_decl(name))
    }

    pub fn find_type_decl(&self, name: &str, objects: &ObjectTable<'_>) -> Option<ObjectId> {
        self.scopes
            .iter()
            .rev()
            .filter_map(|scope| scope.get(name).copied())
            .find(|id| matches!(objects.get(*id), Some(Object::TypeDecl(_))))
            .or_else(|| self.builtins.type_decl(name))
    }

    pub fn find_local(&self, name: &str) -> Option<ObjectId> {
        self.scopes
            .last()
            .and_then(|scope| scope.get(name).copied())
    }

    pub fn erase_all_except_builtins(&mut self) {
        let root = self
            .builtins
            .functions()
            .map(|(name, id)| (name.to_string(), id))
            .collect();

        self.scopes = vec![root];
    }
}
