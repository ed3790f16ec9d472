use crate::semantic::{
    CustomType, FuncType, Label, Object, ObjectId, ObjectTable, ScopeStack, SemanticError,
    SimpleType, Site, StructField, StructMethod, StructType, Type, TypeDecl, Variable,
};
use crate::syntax::{
    AssignStmt, BinaryOperator, BranchKind, BranchStmt, CodeBlock, CompoundKind, CompoundLit,
    Expr, ExprKind, ForStmt, FuncDecl, Ident, IfStmt, LiteralKind, Param, Position, Stmt, StmtId,
    StmtKind, StructDecl, TypeDeclStmt, TypeSpec, UnaryOperator, VarDecl, VarStmt,
};
use log::debug;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug)]
struct ResultFrame {
    types: Vec<Type>,
    /// A bare `return` is allowed when every result has a name.
    named: bool,
}

/// Binds identifiers and infers types of one statement at a time, in
/// place. Declarations go to the innermost scope of `scopes`.
#[derive(Debug)]
pub struct Checker<'c, 'b> {
    file: String,
    scopes: &'c mut ScopeStack<'b>,
    objects: &'c mut ObjectTable<'b>,
    diagnostics: &'c mut Vec<SemanticError>,
    results: Vec<ResultFrame>,
    /// Enclosing loops of the current function and their label names.
    loops: Vec<(StmtId, Option<String>)>,
    label_blocks: Vec<BTreeMap<String, ObjectId>>,
    /// Label blocks below this index belong to enclosing functions.
    label_base: usize,
    /// Set when the current statement used a declaration that already
    /// failed. Its own errors are dropped.
    tainted: Cell<bool>,
}

impl<'c, 'b> Checker<'c, 'b> {
    pub fn new<S: Into<String>>(
        file: S,
        scopes: &'c mut ScopeStack<'b>,
        objects: &'c mut ObjectTable<'b>,
        diagnostics: &'c mut Vec<SemanticError>,
    ) -> Self {
        Self {
            file: file.into(),
            scopes,
            objects,
            diagnostics,
            results: vec![],
            loops: vec![],
            label_blocks: vec![],
            label_base: 0,
            tainted: Cell::new(false),
        }
    }

    /// Checks a statement of the package scope. Failures are recorded.
    pub fn check_top_level(&mut self, stmt: &mut Stmt) {
        let result = self.check_stmt(stmt);
        self.record(result);
    }

    fn record<T>(&mut self, result: Result<T, SemanticError>) -> Option<T> {
        let tainted = self.tainted.replace(false);

        match result {
            Ok(value) => Some(value),
            Err(err) if tainted => {
                debug!("[checker] follow-up error dropped: {}", err);
                None
            }
            Err(err) => {
                debug!("[checker] {}", err);
                self.diagnostics.push(err);
                None
            }
        }
    }

    /// Notes a use of `id`.
    fn touch(&self, id: ObjectId) {
        if self.objects.is_failed(id) {
            self.tainted.set(true);
        }
    }

    fn site(&self, position: Position) -> Site {
        Site::new(self.file.clone(), position)
    }

    fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.push_scope();
        let result = f(self);
        self.scopes.pop_scope();
        result
    }

    fn declare(
        &mut self,
        name: &str,
        object: Object,
        position: Position,
    ) -> Result<ObjectId, SemanticError> {
        let blank = name == "_";

        if !blank {
            if let Some(previous) = self.scopes.find_local(name) {
                return Err(SemanticError::Redeclaration {
                    name: name.to_string(),
                    site: self.site(position),
                    previous: self.objects.get(previous).and_then(Object::site).cloned(),
                });
            }
        }

        let id = self.objects.insert(object);
        if !blank {
            self.scopes.add_object(name, id);
        }
        Ok(id)
    }

    fn variable(&self, name: &str, r#type: Type, init: Option<StmtId>, position: Position) -> Object {
        Object::Variable(Variable {
            name: name.to_string(),
            r#type,
            init,
            site: Some(self.site(position)),
        })
    }

    // --- Blocks

    fn check_block(&mut self, block: &mut CodeBlock) {
        self.with_scope(|this| this.check_statements(block));
    }

    /// Checks the statements of `block` in the current scope.
    fn check_statements(&mut self, block: &mut CodeBlock) {
        self.register_labels(block);
        self.label_blocks.push(block.labels.clone());

        for stmt in &mut block.statements {
            let result = self.check_stmt(stmt);
            self.record(result);
        }

        self.label_blocks.pop();
    }

    /// Labels are visible in the whole block, `goto` can jump forward.
    fn register_labels(&mut self, block: &mut CodeBlock) {
        block.labels.clear();

        let labelled: Vec<_> = block
            .statements
            .iter()
            .enumerate()
            .filter_map(|(index, stmt)| {
                let branchable = if stmt.is_branchable() {
                    Some(stmt.id)
                } else {
                    None
                };
                stmt.label
                    .as_ref()
                    .map(|label| (index, label.name.clone(), stmt.position, branchable))
            })
            .collect();

        for (index, name, position, branchable) in labelled {
            let site = self.site(position);
            let id = self.objects.insert(Object::Label(Label {
                name: name.clone(),
                branchable,
                site: Some(site.clone()),
            }));

            match block.add_label(name, id) {
                Ok(()) => {
                    if let Some(label) = &mut block.statements[index].label {
                        label.object = Some(id);
                    }
                }
                Err(err) => {
                    let previous = self.objects.get(err.previous).and_then(Object::site).cloned();

                    self.diagnostics.push(SemanticError::Redeclaration {
                        name: err.name,
                        site,
                        previous,
                    });
                }
            }
        }
    }

    fn find_label(&self, name: &str) -> Option<ObjectId> {
        self.label_blocks
            .iter()
            .skip(self.label_base)
            .rev()
            .find_map(|labels| labels.get(name).copied())
    }

    // --- Statements

    fn check_stmt(&mut self, stmt: &mut Stmt) -> Result<(), SemanticError> {
        debug!("[checker] statement #{} at {}", stmt.id.0, self.site(stmt.position));

        let id = stmt.id;
        let position = stmt.position;
        let label = stmt.label.as_ref().map(|label| label.name.clone());

        match &mut stmt.kind {
            StmtKind::Assign(assign) => self.check_assign(assign, position),
            StmtKind::Struct(decl) => self.check_struct(decl, position),
            StmtKind::Type(decl) => self.check_type_decl(decl, position),
            StmtKind::Var(var) => self.check_var(var, id),
            StmtKind::Pass => Ok(()),
            StmtKind::If(if_stmt) => {
                self.check_if(if_stmt, id);
                Ok(())
            }
            StmtKind::For(for_stmt) => {
                self.check_for(for_stmt, id, label);
                Ok(())
            }
            StmtKind::Expr(expr) => self.infer_expr(expr, &Type::Unknown).map(|_| ()),
            StmtKind::Branch(branch) => self.check_branch(branch, position),
            StmtKind::Return(values) => self.check_return(values, position),
        }
    }

    fn check_var(&mut self, var: &mut VarStmt, stmt: StmtId) -> Result<(), SemanticError> {
        let mut first = Ok(());

        for decl in &mut var.vars {
            let result = if var.is_func {
                self.check_func_var(decl, stmt)
            } else {
                self.check_plain_var(decl, stmt)
            };
            if first.is_ok() {
                first = result;
            }
        }
        first
    }

    /// A variable whose type can't be settled is still declared, so later
    /// uses of it are not undefined.
    fn check_plain_var(&mut self, decl: &mut VarDecl, stmt: StmtId) -> Result<(), SemanticError> {
        decl.object = None;

        let name = decl.name.clone();
        let position = decl.position;
        let declared = match &decl.type_spec {
            Some(spec) => self.resolve_type(spec),
            None => Ok(Type::Unknown),
        };
        let (ty, result) = match declared {
            Ok(declared) => match self.var_type(decl, &declared) {
                Ok(ty) => (ty, Ok(())),
                Err(err) => (declared, Err(err)),
            },
            Err(err) => (Type::Unknown, Err(err)),
        };

        let init = if decl.init.is_some() { Some(stmt) } else { None };
        let object = self.variable(&name, ty, init, position);
        let id = self.declare(&name, object, position)?;

        if result.is_err() {
            self.objects.mark_failed(id);
        }
        decl.object = Some(id);
        result
    }

    fn var_type(&mut self, decl: &mut VarDecl, declared: &Type) -> Result<Type, SemanticError> {
        let name = decl.name.clone();
        let site = self.site(decl.position);

        match &mut decl.init {
            Some(init) => {
                let found = self.infer_expr(init, declared)?;
                let ty = declared
                    .negotiate(&found)
                    .map_err(|err| SemanticError::from_type_error(err, &name, site))?;

                if !init.is_blank() {
                    init.r#type = ty.clone();
                }
                Ok(ty)
            }
            None if declared.known() => Ok(declared.clone()),
            None => Err(SemanticError::UnresolvedInference { what: name, site }),
        }
    }

    /// The function is declared before its body is checked, so it can call
    /// itself.
    fn check_func_var(&mut self, decl: &mut VarDecl, stmt: StmtId) -> Result<(), SemanticError> {
        let name = decl.name.clone();
        let position = decl.position;
        let missing_body = || SemanticError::InvalidOperation {
            message: format!("missing function body for {}", name),
            site: Site::new(self.file.clone(), position),
        };

        let init = match &mut decl.init {
            Some(init) => init,
            None => return Err(missing_body()),
        };
        let fun = match &mut init.kind {
            ExprKind::Func(fun) => fun,
            _ => return Err(missing_body()),
        };

        let resolved = match self.receiver_type(fun) {
            Ok(receiver) => self.func_signature(fun).map(|signature| (receiver, signature)),
            Err(err) => Err(err),
        };
        let (receiver, signature) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                let object = self.variable(&name, Type::Unknown, Some(stmt), position);
                let id = self.declare(&name, object, position)?;

                self.objects.mark_failed(id);
                decl.object = Some(id);
                return Err(err);
            }
        };
        let object = self.variable(&name, Type::Func(signature.clone()), Some(stmt), position);

        decl.object = Some(self.declare(&name, object, position)?);
        self.check_func_body(fun, &signature, receiver);
        init.r#type = Type::Func(signature);
        Ok(())
    }

    fn check_struct(&mut self, decl: &mut StructDecl, position: Position) -> Result<(), SemanticError> {
        let name = decl.name.clone();
        let site = self.site(position);
        let id = self.declare(
            &name,
            Object::TypeDecl(TypeDecl {
                name: name.clone(),
                aliased: Some(Type::Unknown),
                site: Some(site),
            }),
            position,
        )?;
        decl.object = Some(id);

        let result = self.struct_members(decl, id, name, position);
        if result.is_err() {
            self.objects.mark_failed(id);
        }
        result
    }

    fn struct_members(
        &mut self,
        decl: &mut StructDecl,
        id: ObjectId,
        name: String,
        position: Position,
    ) -> Result<(), SemanticError> {
        let mut fields: Vec<StructField> = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            if fields.iter().any(|other| other.name == field.name) {
                return Err(SemanticError::Redeclaration {
                    name: field.name.clone(),
                    site: self.site(field.position),
                    previous: None,
                });
            }
            fields.push(StructField::new(
                field.name.clone(),
                self.resolve_type(&field.type_spec)?,
            ));
        }

        let mut methods: Vec<StructMethod> = Vec::with_capacity(decl.methods.len());
        for method in &decl.methods {
            let method_name = method.name.clone().unwrap_or_default();

            if fields.iter().any(|field| field.name == method_name)
                || methods.iter().any(|other| other.name == method_name)
            {
                return Err(SemanticError::Redeclaration {
                    name: method_name,
                    site: self.site(position),
                    previous: None,
                });
            }
            methods.push(StructMethod {
                name: method_name,
                signature: self.func_signature(method)?,
            });
        }

        let signatures: Vec<FuncType> = methods.iter().map(|m| m.signature.clone()).collect();
        if let Some(Object::TypeDecl(type_decl)) = self.objects.get_mut(id) {
            type_decl.aliased = Some(Type::Struct(StructType {
                name: name.clone(),
                fields,
                methods,
            }));
        }

        let this = Type::Custom(CustomType { name, decl: id });
        for (method, signature) in decl.methods.iter_mut().zip(signatures.iter()) {
            let receiver = match self.receiver_type(method)? {
                Some(Type::Unknown) => Some(Type::pointer(this.clone())),
                receiver => receiver,
            };
            self.check_func_body(method, signature, receiver);
        }
        Ok(())
    }

    fn check_type_decl(
        &mut self,
        decl: &mut TypeDeclStmt,
        position: Position,
    ) -> Result<(), SemanticError> {
        let name = decl.name.clone();
        let site = self.site(position);
        let id = self.declare(
            &name,
            Object::TypeDecl(TypeDecl {
                name: name.clone(),
                aliased: Some(Type::Unknown),
                site: Some(site.clone()),
            }),
            position,
        )?;
        decl.object = Some(id);

        let result = self.alias_target(decl, id, name, site);
        if result.is_err() {
            self.objects.mark_failed(id);
        }
        result
    }

    fn alias_target(
        &mut self,
        decl: &TypeDeclStmt,
        id: ObjectId,
        name: String,
        site: Site,
    ) -> Result<(), SemanticError> {
        let aliased = self.resolve_type(&decl.aliased)?;
        if aliased.is_unknown() {
            return Err(SemanticError::UnresolvedInference { what: name, site });
        }
        if let Some(Object::TypeDecl(type_decl)) = self.objects.get_mut(id) {
            type_decl.aliased = Some(aliased);
        }
        CustomType {
            name: name.clone(),
            decl: id,
        }
        .root_type(self.objects)
        .map_err(|err| SemanticError::from_type_error(err, &name, site))?;
        Ok(())
    }

    fn check_if(&mut self, if_stmt: &mut IfStmt, stmt: StmtId) {
        for branch in &mut if_stmt.branches {
            self.with_scope(|this| {
                if let Some(var) = &mut branch.scoped_var {
                    let result = this.check_var(var, stmt);
                    this.record(result);
                }
                if let Some(condition) = &mut branch.condition {
                    let result = this.expect(condition, &Type::bool());
                    this.record(result);
                }
                this.check_block(&mut branch.body);
            });
        }
    }

    fn check_for(&mut self, for_stmt: &mut ForStmt, stmt: StmtId, label: Option<String>) {
        self.with_scope(|this| {
            if let Some(var) = &mut for_stmt.scoped_var {
                let result = this.check_var(var, stmt);
                this.record(result);
            }
            if let Some(condition) = &mut for_stmt.condition {
                let result = this.expect(condition, &Type::bool());
                this.record(result);
            }
            if let Some(repeat) = &mut for_stmt.repeat {
                let result = this.check_stmt(repeat);
                this.record(result);
            }

            this.loops.push((stmt, label));
            this.check_block(&mut for_stmt.body);
            this.loops.pop();
        });
    }

    fn check_branch(&mut self, branch: &mut BranchStmt, position: Position) -> Result<(), SemanticError> {
        match branch.kind {
            BranchKind::Break | BranchKind::Continue => {
                let target = match &branch.label {
                    None => self.loops.last().map(|(id, _)| *id),
                    Some(name) => self
                        .loops
                        .iter()
                        .rev()
                        .find(|(_, label)| label.as_deref() == Some(name.as_str()))
                        .map(|(id, _)| *id),
                };

                match target {
                    Some(target) => {
                        branch.target = Some(target);
                        branch.goto_label = branch.label.as_ref().and_then(|name| self.find_label(name));
                        Ok(())
                    }
                    None => Err(invalid_branch(branch, self.site(position))),
                }
            }
            BranchKind::Goto => {
                let label = branch.label.as_ref().and_then(|name| self.find_label(name));

                match label {
                    Some(label) => {
                        branch.goto_label = Some(label);
                        branch.target = None;
                        Ok(())
                    }
                    None => Err(invalid_branch(branch, self.site(position))),
                }
            }
        }
    }

    fn check_return(&mut self, values: &mut Vec<Expr>, position: Position) -> Result<(), SemanticError> {
        let site = self.site(position);
        let (results, named) = match self.results.last() {
            Some(frame) => (frame.types.clone(), frame.named),
            None => {
                return Err(SemanticError::InvalidOperation {
                    message: "return outside of a function".to_string(),
                    site,
                })
            }
        };

        if values.is_empty() && (results.is_empty() || named) {
            return Ok(());
        }
        // return f() where f returns several values
        if values.len() == 1 && results.len() > 1 {
            self.expect(&mut values[0], &Type::Tuple(results))?;
            return Ok(());
        }
        if values.len() != results.len() {
            return Err(SemanticError::InvalidOperation {
                message: format!(
                    "wrong number of return values (expected {}, found {})",
                    results.len(),
                    values.len()
                ),
                site,
            });
        }

        for (value, ty) in values.iter_mut().zip(results.iter()) {
            self.expect(value, ty)?;
        }
        Ok(())
    }

    fn check_assign(&mut self, assign: &mut AssignStmt, position: Position) -> Result<(), SemanticError> {
        let site = self.site(position);

        if let Some(lhs) = assign.lhs.iter().find(|lhs| !is_assignable(lhs)) {
            return Err(SemanticError::InvalidOperation {
                message: "cannot assign to expression".to_string(),
                site: self.site(lhs.position),
            });
        }

        if let Some(op) = assign.op.binary() {
            if assign.lhs.len() != 1 || assign.rhs.len() != 1 {
                return Err(SemanticError::InvalidOperation {
                    message: format!("assignment operation {}= requires single values", op),
                    site,
                });
            }

            let target = self.infer_expr(&mut assign.lhs[0], &Type::Unknown)?;
            let ty = self.expect(&mut assign.rhs[0], &target)?;
            return self.check_operand(&op, &ty, op == BinaryOperator::Add, position);
        }

        if assign.lhs.len() != assign.rhs.len() {
            // a, b = f()
            if assign.rhs.len() == 1 {
                let found = self.infer_expr(&mut assign.rhs[0], &Type::Unknown)?;

                if let Type::Tuple(members) = found {
                    if members.len() == assign.lhs.len() {
                        for (lhs, member) in assign.lhs.iter_mut().zip(members.iter()) {
                            self.expect(lhs, member)?;
                        }
                        return Ok(());
                    }
                }
            }

            return Err(SemanticError::InvalidOperation {
                message: format!(
                    "assignment mismatch: {} variables but {} values",
                    assign.lhs.len(),
                    assign.rhs.len()
                ),
                site,
            });
        }

        for (lhs, rhs) in assign.lhs.iter_mut().zip(assign.rhs.iter_mut()) {
            let target = self.infer_expr(lhs, &Type::Unknown)?;
            self.expect(rhs, &target)?;
        }
        Ok(())
    }

    // --- Functions

    fn receiver_type(&self, fun: &FuncDecl) -> Result<Option<Type>, SemanticError> {
        fun.receiver
            .as_ref()
            .map(|receiver| self.resolve_type(&receiver.type_spec))
            .transpose()
    }

    fn func_signature(&self, fun: &FuncDecl) -> Result<FuncType, SemanticError> {
        let args = fun
            .params
            .iter()
            .map(|param| self.resolve_type(&param.type_spec))
            .collect::<Result<Vec<_>, _>>()?;
        let results = fun
            .results
            .iter()
            .map(|param| self.resolve_type(&param.type_spec))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FuncType { args, results })
    }

    /// The receiver, parameters and named results share the body's scope.
    fn check_func_body(&mut self, fun: &mut FuncDecl, signature: &FuncType, receiver: Option<Type>) {
        let loops = std::mem::take(&mut self.loops);
        let label_base = std::mem::replace(&mut self.label_base, self.label_blocks.len());

        self.results.push(ResultFrame {
            types: signature.results.clone(),
            named: !fun.results.is_empty() && fun.results.iter().all(|param| param.name.is_some()),
        });

        self.with_scope(|this| {
            if let (Some(param), Some(ty)) = (&mut fun.receiver, receiver) {
                let result = this.declare_param(param, ty);
                this.record(result);
            }

            let params = fun
                .params
                .iter_mut()
                .zip(signature.args.iter())
                .chain(fun.results.iter_mut().zip(signature.results.iter()));
            for (param, ty) in params {
                let result = this.declare_param(param, ty.clone());
                this.record(result);
            }

            this.check_statements(&mut fun.body);
        });

        self.results.pop();
        self.label_base = label_base;
        self.loops = loops;
    }

    fn declare_param(&mut self, param: &mut Param, ty: Type) -> Result<(), SemanticError> {
        if let Some(name) = param.name.clone() {
            let object = self.variable(&name, ty, None, param.position);
            param.object = Some(self.declare(&name, object, param.position)?);
        }
        Ok(())
    }

    // --- Types

    fn resolve_type(&self, spec: &TypeSpec) -> Result<Type, SemanticError> {
        match spec {
            TypeSpec::Named { name, position } => {
                let site = self.site(*position);

                match self.scopes.find_type_decl(name, self.objects) {
                    Some(id) => {
                        self.touch(id);
                        self.objects
                            .declared_type(id)
                            .ok_or_else(|| SemanticError::NotAType {
                                name: name.clone(),
                                site,
                            })
                    }
                    None if self.scopes.find_object(name).is_some() => {
                        Err(SemanticError::NotAType {
                            name: name.clone(),
                            site,
                        })
                    }
                    None => Err(SemanticError::UndefinedSymbol {
                        name: name.clone(),
                        site,
                    }),
                }
            }
            TypeSpec::Array { size, of } => Ok(Type::array(*size, self.resolve_type(of)?)),
            TypeSpec::Slice(of) => Ok(Type::slice(self.resolve_type(of)?)),
            TypeSpec::Map { key, value } => Ok(Type::map(
                self.resolve_type(key)?,
                self.resolve_type(value)?,
            )),
            TypeSpec::Pointer(to) => Ok(Type::pointer(self.resolve_type(to)?)),
            TypeSpec::Tuple(members) => Ok(Type::Tuple(self.resolve_types(members)?)),
            TypeSpec::Func { args, results } => Ok(Type::func(
                self.resolve_types(args)?,
                self.resolve_types(results)?,
            )),
            TypeSpec::Blank => Ok(Type::Unknown),
        }
    }

    fn resolve_types(&self, specs: &[TypeSpec]) -> Result<Vec<Type>, SemanticError> {
        specs.iter().map(|spec| self.resolve_type(spec)).collect()
    }

    fn underlying(&self, ty: &Type, position: Position) -> Result<Type, SemanticError> {
        ty.underlying(self.objects)
            .map_err(|err| SemanticError::from_type_error(err, "type", self.site(position)))
    }

    fn check_operand(
        &self,
        op: &dyn fmt::Display,
        ty: &Type,
        allow_string: bool,
        position: Position,
    ) -> Result<(), SemanticError> {
        let valid = match self.underlying(ty, position)? {
            Type::Simple(SimpleType::Bool) | Type::Simple(SimpleType::Error) => false,
            Type::Simple(SimpleType::String) => allow_string,
            Type::Simple(_) => true,
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(SemanticError::InvalidOperation {
                message: format!("operator {} not defined on {}", op, ty),
                site: self.site(position),
            })
        }
    }

    // --- Expressions

    /// Infers the type of `expr` and negotiates it with `expected`.
    fn expect(&mut self, expr: &mut Expr, expected: &Type) -> Result<Type, SemanticError> {
        let found = self.infer_expr(expr, expected)?;
        let site = self.site(expr.position);
        let ty = expected
            .negotiate(&found)
            .map_err(|err| SemanticError::from_type_error(err, "expression", site))?;

        if !expr.is_blank() {
            expr.r#type = ty.clone();
        }
        Ok(ty)
    }

    /// `hint` is the type the context wants, used by literals that can't
    /// tell their type themselves.
    fn infer_expr(&mut self, expr: &mut Expr, hint: &Type) -> Result<Type, SemanticError> {
        let ty = self.infer_kind(&mut expr.kind, expr.position, hint)?;

        expr.r#type = ty.clone();
        Ok(ty)
    }

    fn infer_kind(
        &mut self,
        kind: &mut ExprKind,
        position: Position,
        hint: &Type,
    ) -> Result<Type, SemanticError> {
        match kind {
            ExprKind::Literal(literal) => Ok(literal_type(literal.kind)),
            ExprKind::Blank => Ok(Type::Unknown),
            ExprKind::Compound(lit) => self.infer_compound(lit, position, hint),
            ExprKind::Binary { op, left, right } => self.infer_binary(*op, left, right, position),
            ExprKind::Unary { op, operand } => self.infer_unary(*op, operand, position, hint),
            ExprKind::Index { left, index } => self.infer_index(left, index, position),
            ExprKind::Selector { left, field } => self.infer_selector(left, field, position),
            ExprKind::Call { callee, args } => self.infer_call(callee, args, position),
            ExprKind::Func(fun) => {
                let receiver = self.receiver_type(fun)?;
                let signature = self.func_signature(fun)?;

                self.check_func_body(fun, &signature, receiver);
                Ok(Type::Func(signature))
            }
            ExprKind::Ident(ident) => self.infer_ident(ident, position),
            ExprKind::Type(spec) => Err(SemanticError::InvalidOperation {
                message: format!("type {} is not an expression", spec),
                site: self.site(position),
            }),
        }
    }

    fn infer_ident(&mut self, ident: &mut Ident, position: Position) -> Result<Type, SemanticError> {
        let site = self.site(position);
        let id = match self.scopes.find_object(ident.name()) {
            Some(id) => id,
            None => {
                return Err(SemanticError::UndefinedSymbol {
                    name: ident.name().to_string(),
                    site,
                })
            }
        };

        ident.bind(id);
        self.touch(id);

        match self.objects.get(id) {
            Some(Object::Variable(var)) => Ok(var.r#type.clone()),
            Some(Object::TypeDecl(decl)) => Err(SemanticError::InvalidOperation {
                message: format!("type {} is not an expression", decl.name),
                site,
            }),
            _ => Err(SemanticError::InvalidOperation {
                message: format!("{} is not a value", ident.name()),
                site,
            }),
        }
    }

    fn infer_binary(
        &mut self,
        op: BinaryOperator,
        left: &mut Expr,
        right: &mut Expr,
        position: Position,
    ) -> Result<Type, SemanticError> {
        if op.is_logical() {
            self.expect(left, &Type::bool())?;
            self.expect(right, &Type::bool())?;
            return Ok(Type::bool());
        }

        let left_type = self.infer_expr(left, &Type::Unknown)?;
        let ty = self.expect(right, &left_type)?;

        if op.is_comparison() {
            Ok(Type::bool())
        } else {
            self.check_operand(&op, &ty, op == BinaryOperator::Add, position)?;
            Ok(ty)
        }
    }

    fn infer_unary(
        &mut self,
        op: UnaryOperator,
        operand: &mut Expr,
        position: Position,
        hint: &Type,
    ) -> Result<Type, SemanticError> {
        match op {
            UnaryOperator::Plus | UnaryOperator::Minus => {
                let ty = self.infer_expr(operand, hint)?;

                self.check_operand(&op, &ty, false, position)?;
                Ok(ty)
            }
            UnaryOperator::Not => self.expect(operand, &Type::bool()),
            UnaryOperator::AddressOf => {
                let pointee = match hint {
                    Type::Pointer(to) => (**to).clone(),
                    _ => Type::Unknown,
                };

                Ok(Type::pointer(self.infer_expr(operand, &pointee)?))
            }
            UnaryOperator::Deref => {
                let ty = self.infer_expr(operand, &Type::Unknown)?;

                match self.underlying(&ty, position)? {
                    Type::Pointer(to) => Ok(*to),
                    _ => Err(SemanticError::InvalidOperation {
                        message: format!("cannot dereference {}", ty),
                        site: self.site(position),
                    }),
                }
            }
        }
    }

    fn infer_index(
        &mut self,
        left: &mut Expr,
        index: &mut Expr,
        position: Position,
    ) -> Result<Type, SemanticError> {
        let left_type = self.infer_expr(left, &Type::Unknown)?;

        match self.underlying(&left_type, position)? {
            Type::Array { of, .. } | Type::Slice(of) => {
                self.expect(index, &Type::int())?;
                Ok(*of)
            }
            Type::Map { key, value } => {
                self.expect(index, &key)?;
                Ok(*value)
            }
            Type::Simple(SimpleType::String) => {
                self.expect(index, &Type::int())?;
                Ok(Type::Simple(SimpleType::Byte))
            }
            _ => Err(SemanticError::InvalidOperation {
                message: format!("cannot index {}", left_type),
                site: self.site(position),
            }),
        }
    }

    /// Fields and methods are found through named types and one level of
    /// pointer.
    fn infer_selector(
        &mut self,
        left: &mut Expr,
        field: &str,
        position: Position,
    ) -> Result<Type, SemanticError> {
        let left_type = self.infer_expr(left, &Type::Unknown)?;
        let mut base = self.underlying(&left_type, position)?;

        let pointee = match &base {
            Type::Pointer(to) => Some((**to).clone()),
            _ => None,
        };
        if let Some(to) = pointee {
            base = self.underlying(&to, position)?;
        }

        if let Type::Struct(st) = &base {
            if let Some(ty) = st.get_field(field) {
                return Ok(ty.clone());
            }
            if let Some(method) = st.get_method(field) {
                return Ok(Type::Func(method.clone()));
            }
        }

        Err(SemanticError::InvalidOperation {
            message: format!("{} has no field or method {}", left_type, field),
            site: self.site(position),
        })
    }

    fn infer_call(
        &mut self,
        callee: &mut Expr,
        args: &mut Vec<Expr>,
        position: Position,
    ) -> Result<Type, SemanticError> {
        let site = self.site(position);

        if let Some(target) = self.conversion_target(callee)? {
            if args.len() != 1 {
                return Err(SemanticError::ArgumentCountMismatch {
                    expected: 1,
                    found: args.len(),
                    site,
                });
            }
            self.infer_expr(&mut args[0], &target)?;
            return Ok(target);
        }

        let callee_type = self.infer_expr(callee, &Type::Unknown)?;
        let fun = match self.underlying(&callee_type, position)? {
            Type::Func(fun) => fun,
            ty => {
                return Err(SemanticError::InvalidOperation {
                    message: format!("cannot call non-function of type {}", ty),
                    site,
                })
            }
        };

        if fun.args.len() != args.len() {
            return Err(SemanticError::ArgumentCountMismatch {
                expected: fun.args.len(),
                found: args.len(),
                site,
            });
        }
        for (arg, param) in args.iter_mut().zip(fun.args.iter()) {
            self.expect(arg, param)?;
        }

        Ok(fun.result_type())
    }

    /// `Some` when the callee names a type, which makes the call a
    /// conversion.
    fn conversion_target(&mut self, callee: &mut Expr) -> Result<Option<Type>, SemanticError> {
        let target = match &mut callee.kind {
            ExprKind::Type(spec) => self.resolve_type(spec)?,
            ExprKind::Ident(ident) => {
                let declared = self
                    .scopes
                    .find_object(ident.name())
                    .and_then(|id| self.objects.declared_type(id).map(|ty| (id, ty)));

                match declared {
                    Some((id, ty)) => {
                        ident.bind(id);
                        self.touch(id);
                        ty
                    }
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        };

        callee.r#type = target.clone();
        Ok(Some(target))
    }

    /// The literal's own type wins over the one the context wants.
    fn infer_compound(
        &mut self,
        lit: &mut CompoundLit,
        position: Position,
        hint: &Type,
    ) -> Result<Type, SemanticError> {
        let site = self.site(position);
        let ty = match &lit.type_spec {
            Some(spec) => self.resolve_type(spec)?,
            None => hint.clone(),
        };

        if !ty.known() {
            return Err(SemanticError::UnresolvedInference {
                what: "composite literal".to_string(),
                site,
            });
        }
        if lit.elements.is_empty() {
            lit.kind = CompoundKind::Empty;
            return Ok(ty);
        }

        match self.underlying(&ty, position)? {
            Type::Array { size, of } => {
                lit.kind = CompoundKind::ListLike;

                let mut index = 0;
                for element in &mut lit.elements {
                    if let Some(key) = &mut element.key {
                        self.expect(key, &Type::int())?;
                        if let Some(constant) = constant_index(key) {
                            index = constant;
                        }
                    }
                    if index >= size {
                        return Err(SemanticError::InvalidOperation {
                            message: format!("array index {} out of bounds [0:{}]", index, size),
                            site: self.site(element.value.position),
                        });
                    }
                    self.expect(&mut element.value, &of)?;
                    index += 1;
                }
            }
            Type::Slice(of) => {
                lit.kind = CompoundKind::ListLike;

                for element in &mut lit.elements {
                    if let Some(key) = &mut element.key {
                        self.expect(key, &Type::int())?;
                    }
                    self.expect(&mut element.value, &of)?;
                }
            }
            Type::Map { key, value } => {
                lit.kind = CompoundKind::MapLike;

                for element in &mut lit.elements {
                    match &mut element.key {
                        Some(element_key) => {
                            self.expect(element_key, &key)?;
                        }
                        None => {
                            return Err(SemanticError::InvalidOperation {
                                message: "missing key in map literal".to_string(),
                                site: self.site(element.value.position),
                            })
                        }
                    }
                    self.expect(&mut element.value, &value)?;
                }
            }
            Type::Struct(st) => self.infer_struct_literal(lit, &st, site)?,
            _ => {
                return Err(SemanticError::InvalidOperation {
                    message: format!("invalid composite literal type {}", ty),
                    site,
                })
            }
        }

        Ok(ty)
    }

    fn infer_struct_literal(
        &mut self,
        lit: &mut CompoundLit,
        st: &StructType,
        site: Site,
    ) -> Result<(), SemanticError> {
        let keyed = lit.elements.iter().filter(|e| e.key.is_some()).count();

        if keyed == 0 {
            if lit.elements.len() != st.fields.len() {
                return Err(SemanticError::InvalidOperation {
                    message: format!(
                        "wrong number of values in struct literal (expected {}, found {})",
                        st.fields.len(),
                        lit.elements.len()
                    ),
                    site,
                });
            }

            lit.kind = CompoundKind::ListLike;
            for (element, field) in lit.elements.iter_mut().zip(st.fields.iter()) {
                self.expect(&mut element.value, &field.r#type)?;
            }
            return Ok(());
        }

        if keyed != lit.elements.len() {
            return Err(SemanticError::InvalidOperation {
                message: "mixture of field:value and value elements in struct literal".to_string(),
                site,
            });
        }

        lit.kind = CompoundKind::MapLike;
        for element in &mut lit.elements {
            let key = match &mut element.key {
                Some(key) => key,
                None => continue,
            };
            let name = match key.ident_node() {
                Some(ident) => ident.name().to_string(),
                None => {
                    return Err(SemanticError::InvalidOperation {
                        message: "invalid field name in struct literal".to_string(),
                        site: self.site(key.position),
                    })
                }
            };
            let field_type = match st.get_field(&name) {
                Some(ty) => ty.clone(),
                None => {
                    return Err(SemanticError::InvalidOperation {
                        message: format!("unknown field {} in struct literal", name),
                        site: self.site(key.position),
                    })
                }
            };

            key.r#type = field_type.clone();
            self.expect(&mut element.value, &field_type)?;
        }
        Ok(())
    }
}

fn literal_type(kind: LiteralKind) -> Type {
    match kind {
        LiteralKind::Int => Type::int(),
        LiteralKind::Float => Type::Simple(SimpleType::Float64),
        LiteralKind::String => Type::string(),
        LiteralKind::Char => Type::Simple(SimpleType::Rune),
        LiteralKind::Bool => Type::bool(),
    }
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Ident(_)
            | ExprKind::Index { .. }
            | ExprKind::Selector { .. }
            | ExprKind::Blank
            | ExprKind::Unary {
                op: UnaryOperator::Deref,
                ..
            }
    )
}

/// The value of an integer literal key.
fn constant_index(key: &Expr) -> Option<usize> {
    match &key.kind {
        ExprKind::Literal(literal) if literal.kind == LiteralKind::Int => literal.value.parse().ok(),
        _ => None,
    }
}

fn invalid_branch(branch: &BranchStmt, site: Site) -> SemanticError {
    SemanticError::InvalidBranchTarget {
        kind: branch.kind,
        label: branch.label.clone(),
        site,
    }
}

#[cfg(test)]
mod tests {
    use crate::package::check_package;
    use crate::semantic::{Builtins, Object, SemanticError, Type};
    use crate::syntax::{
        AssignOperator, AssignStmt, BinaryOperator, BranchKind, Element, Expr, Field, FuncDecl,
        IfBranch, LiteralKind, Param, SourceFile, Stmt, StmtKind, TypeSpec, UnaryOperator,
        VarStmt,
    };
    use assert_matches::assert_matches;

    /// Checks `stmts` as a one-file package and renders the type of every
    /// package-level declaration.
    fn check(stmts: Vec<Stmt>) -> Result<Vec<(String, String)>, Vec<SemanticError>> {
        let builtins = Builtins::new();
        let package = check_package(
            &builtins,
            "main",
            vec![SourceFile::new("main.hv", "main", stmts)],
        )?;

        let mut decls = vec![];
        for (_, stmt) in package.ordered_statements() {
            for name in stmt.decls() {
                let rendered = match package.lookup(&name) {
                    Some(Object::Variable(var)) => var.r#type.to_string(),
                    Some(object) => object.to_string(),
                    None => continue,
                };
                decls.push((name, rendered));
            }
        }
        Ok(decls)
    }

    fn type_of(decls: &[(String, String)], name: &str) -> String {
        decls
            .iter()
            .find(|(decl, _)| decl == name)
            .map(|(_, ty)| ty.clone())
            .unwrap_or_default()
    }

    fn main_with(body: Vec<Stmt>) -> Stmt {
        Stmt::func("main", vec![], vec![], body)
    }

    fn var(name: &str, init: Expr) -> Stmt {
        Stmt::var(name, None, Some(init))
    }

    fn int_type() -> Option<TypeSpec> {
        Some(TypeSpec::named("int"))
    }

    #[test]
    fn operators_and_literals() {
        let decls = check(vec![
            var("a", Expr::binary(BinaryOperator::Add, Expr::int(1), Expr::int(2))),
            var(
                "b",
                Expr::binary(BinaryOperator::Add, Expr::string("x"), Expr::string("y")),
            ),
            var("c", Expr::binary(BinaryOperator::Lt, Expr::ident("a"), Expr::int(3))),
            var(
                "d",
                Expr::binary(
                    BinaryOperator::And,
                    Expr::unary(UnaryOperator::Not, Expr::ident("c")),
                    Expr::bool(true),
                ),
            ),
            var("e", Expr::unary(UnaryOperator::Minus, Expr::ident("a"))),
            var("f", Expr::literal(LiteralKind::Float, "1.5")),
            var("g", Expr::literal(LiteralKind::Char, "'x'")),
            var("h", Expr::unary(UnaryOperator::AddressOf, Expr::ident("a"))),
            var("i", Expr::unary(UnaryOperator::Deref, Expr::ident("h"))),
        ])
        .unwrap();

        assert_eq!(type_of(&decls, "a"), "int");
        assert_eq!(type_of(&decls, "b"), "string");
        assert_eq!(type_of(&decls, "c"), "bool");
        assert_eq!(type_of(&decls, "d"), "bool");
        assert_eq!(type_of(&decls, "e"), "int");
        assert_eq!(type_of(&decls, "f"), "float64");
        assert_eq!(type_of(&decls, "g"), "rune");
        assert_eq!(type_of(&decls, "h"), "*int");
        assert_eq!(type_of(&decls, "i"), "int");
    }

    #[test]
    fn declared_type_mismatch() {
        let errors = check(vec![Stmt::var("x", int_type(), Some(Expr::string("s")))]).unwrap_err();

        assert_matches!(&errors[..], [SemanticError::TypeMismatch { expected, found, .. }] => {
            assert_eq!(expected, &Type::int());
            assert_eq!(found, &Type::string());
        });
    }

    #[test]
    fn blank_initializer_cannot_be_inferred() {
        let errors = check(vec![var("x", Expr::blank())]).unwrap_err();

        assert_matches!(&errors[..], [SemanticError::UnresolvedInference { what, .. }] => {
            assert_eq!(what, "x");
        });

        let decls = check(vec![Stmt::var("x", int_type(), Some(Expr::blank()))]).unwrap();
        assert_eq!(type_of(&decls, "x"), "int");
    }

    #[test]
    fn invalid_operators() {
        let errors = check(vec![var(
            "b",
            Expr::binary(BinaryOperator::Add, Expr::bool(true), Expr::bool(false)),
        )])
        .unwrap_err();
        assert_matches!(&errors[..], [SemanticError::InvalidOperation { message, .. }] => {
            assert_eq!(message, "operator + not defined on bool");
        });

        let errors = check(vec![var(
            "s",
            Expr::binary(BinaryOperator::Sub, Expr::string("a"), Expr::string("b")),
        )])
        .unwrap_err();
        assert_matches!(&errors[..], [SemanticError::InvalidOperation { .. }]);

        let errors = check(vec![var(
            "m",
            Expr::binary(BinaryOperator::Add, Expr::int(1), Expr::string("b")),
        )])
        .unwrap_err();
        assert_matches!(&errors[..], [SemanticError::TypeMismatch { .. }]);
    }

    #[test]
    fn builtin_calls() {
        let decls = check(vec![
            var("ok", Expr::call(Expr::ident("print"), vec![Expr::string("hi")])),
            var("line", Expr::call(Expr::ident("read"), vec![])),
        ])
        .unwrap();
        assert_eq!(type_of(&decls, "ok"), "bool");
        assert_eq!(type_of(&decls, "line"), "string");

        let errors = check(vec![main_with(vec![
            Stmt::expr(Expr::call(Expr::ident("print"), vec![])),
            Stmt::expr(Expr::call(Expr::ident("print"), vec![Expr::int(1)])),
            Stmt::expr(Expr::call(Expr::ident("printf"), vec![])),
        ])])
        .unwrap_err();

        assert_matches!(
            &errors[..],
            [
                SemanticError::ArgumentCountMismatch { expected: 1, found: 0, .. },
                SemanticError::TypeMismatch { .. },
                SemanticError::UndefinedSymbol { .. },
            ]
        );
    }

    #[test]
    fn conversions() {
        let decls = check(vec![
            var("f", Expr::call(Expr::ident("float64"), vec![Expr::int(1)])),
            var(
                "s",
                Expr::call(
                    Expr::type_expr(TypeSpec::slice(TypeSpec::named("byte"))),
                    vec![Expr::string("abc")],
                ),
            ),
        ])
        .unwrap();
        assert_eq!(type_of(&decls, "f"), "float64");
        assert_eq!(type_of(&decls, "s"), "[]byte");

        let errors = check(vec![var(
            "g",
            Expr::call(Expr::ident("int"), vec![Expr::int(1), Expr::int(2)]),
        )])
        .unwrap_err();
        assert_matches!(
            &errors[..],
            [SemanticError::ArgumentCountMismatch { expected: 1, found: 2, .. }]
        );

        let errors = check(vec![var("t", Expr::ident("int"))]).unwrap_err();
        assert_matches!(&errors[..], [SemanticError::InvalidOperation { .. }]);
    }

    fn point() -> Stmt {
        // struct Point:
        //     x int
        //     y int
        //     func (p) Sum() int: return p.x + p.y
        let sum = FuncDecl::new(
            Some("Sum"),
            vec![],
            vec![Param::unnamed(TypeSpec::named("int"))],
            vec![Stmt::ret(vec![Expr::binary(
                BinaryOperator::Add,
                Expr::selector(Expr::ident("p"), "x"),
                Expr::selector(Expr::ident("p"), "y"),
            )])],
        )
        .with_receiver(Param::new("p", TypeSpec::Blank));

        Stmt::struct_decl(
            "Point",
            vec![
                Field::new("x", TypeSpec::named("int")),
                Field::new("y", TypeSpec::named("int")),
            ],
            vec![sum],
        )
    }

    #[test]
    fn structs_fields_and_methods() {
        let decls = check(vec![
            var(
                "p",
                Expr::compound(
                    Some(TypeSpec::named("Point")),
                    vec![Element::positional(Expr::int(1)), Element::positional(Expr::int(2))],
                ),
            ),
            var(
                "q",
                Expr::compound(
                    Some(TypeSpec::named("Point")),
                    vec![Element::keyed(Expr::ident("y"), Expr::int(2))],
                ),
            ),
            var("n", Expr::selector(Expr::ident("p"), "x")),
            var(
                "m",
                Expr::call(Expr::selector(Expr::ident("p"), "Sum"), vec![]),
            ),
            var("r", Expr::unary(UnaryOperator::AddressOf, Expr::ident("q"))),
            var("ry", Expr::selector(Expr::ident("r"), "y")),
            point(),
        ])
        .unwrap();

        assert_eq!(type_of(&decls, "Point"), "type Point {x: int, y: int}");
        assert_eq!(type_of(&decls, "p"), "Point");
        assert_eq!(type_of(&decls, "q"), "Point");
        assert_eq!(type_of(&decls, "n"), "int");
        assert_eq!(type_of(&decls, "m"), "int");
        assert_eq!(type_of(&decls, "r"), "*Point");
        assert_eq!(type_of(&decls, "ry"), "int");
    }

    #[test]
    fn struct_literal_errors() {
        let errors = check(vec![
            point(),
            var(
                "few",
                Expr::compound(
                    Some(TypeSpec::named("Point")),
                    vec![Element::positional(Expr::int(1))],
                ),
            ),
            var(
                "unknown",
                Expr::compound(
                    Some(TypeSpec::named("Point")),
                    vec![Element::keyed(Expr::ident("z"), Expr::int(1))],
                ),
            ),
            var("missing", Expr::selector(Expr::ident("unknown"), "z")),
        ])
        .unwrap_err();

        assert_matches!(
            &errors[..],
            [
                SemanticError::InvalidOperation { .. },
                SemanticError::InvalidOperation { .. },
            ]
        );
    }

    #[test]
    fn array_literal_bounds() {
        let array = |elements: Vec<Element>| {
            Expr::compound(Some(TypeSpec::array(2, TypeSpec::named("int"))), elements)
        };

        let decls = check(vec![
            var("a", array(vec![Element::positional(Expr::int(1))])),
            var(
                "b",
                array(vec![
                    Element::keyed(Expr::int(1), Expr::int(1)),
                    Element::keyed(Expr::int(0), Expr::int(2)),
                ]),
            ),
        ])
        .unwrap();
        assert_eq!(type_of(&decls, "a"), "[2]int");
        assert_eq!(type_of(&decls, "b"), "[2]int");

        let errors = check(vec![
            var(
                "c",
                array(vec![
                    Element::positional(Expr::int(1)),
                    Element::positional(Expr::int(2)),
                    Element::positional(Expr::int(3)),
                ]),
            ),
            var("d", array(vec![Element::keyed(Expr::int(2), Expr::int(1))])),
            var(
                "e",
                array(vec![
                    Element::keyed(Expr::int(1), Expr::int(1)),
                    Element::positional(Expr::int(2)),
                ]),
            ),
        ])
        .unwrap_err();

        assert_matches!(
            &errors[..],
            [
                SemanticError::InvalidOperation { message: c, .. },
                SemanticError::InvalidOperation { message: d, .. },
                SemanticError::InvalidOperation { message: e, .. },
            ] => {
                assert_eq!(c, "array index 2 out of bounds [0:2]");
                assert_eq!(d, "array index 2 out of bounds [0:2]");
                assert_eq!(e, "array index 2 out of bounds [0:2]");
            }
        );
    }

    #[test]
    fn failed_variable_is_still_declared() {
        let errors = check(vec![
            Stmt::var("x", int_type(), Some(Expr::string("s"))),
            var("y", Expr::ident("x")),
            var("z", Expr::binary(BinaryOperator::Add, Expr::ident("y"), Expr::int(1))),
        ])
        .unwrap_err();

        assert_matches!(&errors[..], [SemanticError::TypeMismatch { expected, .. }] => {
            assert_eq!(expected, &Type::int());
        });
    }

    #[test]
    fn failed_signature_is_reported_once() {
        let errors = check(vec![
            Stmt::func(
                "f",
                vec![],
                vec![Param::unnamed(TypeSpec::named("Missing"))],
                vec![],
            ),
            var("y", Expr::call(Expr::ident("f"), vec![])),
            var("z", Expr::ident("y")),
        ])
        .unwrap_err();

        assert_matches!(&errors[..], [SemanticError::UndefinedSymbol { name, .. }] => {
            assert_eq!(name, "Missing");
        });
    }

    #[test]
    fn failed_struct_is_reported_once() {
        let errors = check(vec![
            Stmt::struct_decl(
                "Bad",
                vec![Field::new("f", TypeSpec::named("Missing"))],
                vec![],
            ),
            var(
                "b",
                Expr::compound(
                    Some(TypeSpec::named("Bad")),
                    vec![Element::keyed(Expr::ident("f"), Expr::int(1))],
                ),
            ),
            var("c", Expr::selector(Expr::ident("b"), "f")),
        ])
        .unwrap_err();

        assert_matches!(&errors[..], [SemanticError::UndefinedSymbol { name, .. }] => {
            assert_eq!(name, "Missing");
        });
    }

    #[test]
    fn self_referencing_struct() {
        let decls = check(vec![Stmt::struct_decl(
            "Node",
            vec![
                Field::new("value", TypeSpec::named("int")),
                Field::new("next", TypeSpec::pointer(TypeSpec::named("Node"))),
            ],
            vec![],
        )])
        .unwrap();

        assert_eq!(type_of(&decls, "Node"), "type Node {value: int, next: *Node}");
    }

    #[test]
    fn indexing() {
        let decls = check(vec![
            var(
                "m",
                Expr::compound(
                    Some(TypeSpec::map(TypeSpec::named("string"), TypeSpec::named("int"))),
                    vec![Element::keyed(Expr::string("a"), Expr::int(1))],
                ),
            ),
            var("v", Expr::index(Expr::ident("m"), Expr::string("a"))),
            var(
                "s",
                Expr::compound(
                    Some(TypeSpec::slice(TypeSpec::named("int"))),
                    vec![Element::positional(Expr::int(1))],
                ),
            ),
            var("e", Expr::index(Expr::ident("s"), Expr::int(0))),
            var("b", Expr::index(Expr::string("abc"), Expr::int(1))),
            Stmt::var(
                "empty",
                Some(TypeSpec::array(3, TypeSpec::named("int"))),
                Some(Expr::compound(None, vec![])),
            ),
        ])
        .unwrap();

        assert_eq!(type_of(&decls, "m"), "map[string]int");
        assert_eq!(type_of(&decls, "v"), "int");
        assert_eq!(type_of(&decls, "s"), "[]int");
        assert_eq!(type_of(&decls, "e"), "int");
        assert_eq!(type_of(&decls, "b"), "byte");
        assert_eq!(type_of(&decls, "empty"), "[3]int");

        let errors = check(vec![
            var(
                "s",
                Expr::compound(Some(TypeSpec::slice(TypeSpec::named("int"))), vec![]),
            ),
            var("bad", Expr::index(Expr::ident("s"), Expr::string("x"))),
        ])
        .unwrap_err();
        assert_matches!(&errors[..], [SemanticError::TypeMismatch { expected, .. }] => {
            assert_eq!(expected, &Type::int());
        });
    }

    #[test]
    fn named_types() {
        let decls = check(vec![
            Stmt::type_decl("MyInt", TypeSpec::named("int")),
            Stmt::var(
                "x",
                Some(TypeSpec::named("MyInt")),
                Some(Expr::call(Expr::ident("MyInt"), vec![Expr::int(1)])),
            ),
            var("y", Expr::binary(BinaryOperator::Add, Expr::ident("x"), Expr::ident("x"))),
        ])
        .unwrap();
        assert_eq!(type_of(&decls, "x"), "MyInt");
        assert_eq!(type_of(&decls, "y"), "MyInt");

        let errors = check(vec![
            Stmt::type_decl("MyInt", TypeSpec::named("int")),
            Stmt::var("x", Some(TypeSpec::named("MyInt")), Some(Expr::int(1))),
        ])
        .unwrap_err();
        assert_matches!(&errors[..], [SemanticError::TypeMismatch { .. }]);
    }

    #[test]
    fn recursive_alias() {
        let errors = check(vec![Stmt::type_decl("A", TypeSpec::named("A"))]).unwrap_err();

        assert_matches!(&errors[..], [SemanticError::RecursiveType { name, .. }] => {
            assert_eq!(name, "A");
        });

        // Recursion through a composite is fine.
        let decls = check(vec![Stmt::type_decl(
            "List",
            TypeSpec::slice(TypeSpec::named("List")),
        )])
        .unwrap();
        assert_eq!(type_of(&decls, "List"), "type List []List");
    }

    #[test]
    fn variable_is_not_a_type() {
        let errors = check(vec![
            var("y", Expr::int(1)),
            Stmt::var("x", Some(TypeSpec::named("y")), Some(Expr::int(1))),
        ])
        .unwrap_err();

        assert_matches!(&errors[..], [SemanticError::NotAType { name, .. }] => {
            assert_eq!(name, "y");
        });
    }

    #[test]
    fn returns() {
        let decls = check(vec![
            Stmt::func(
                "two",
                vec![],
                vec![
                    Param::unnamed(TypeSpec::named("int")),
                    Param::unnamed(TypeSpec::named("string")),
                ],
                vec![Stmt::ret(vec![Expr::int(1), Expr::string("a")])],
            ),
            Stmt::func(
                "named",
                vec![Param::new("n", TypeSpec::named("int"))],
                vec![Param::new("r", TypeSpec::named("int"))],
                vec![Stmt::assign(vec![Expr::ident("r")], vec![Expr::ident("n")]), Stmt::ret(vec![])],
            ),
            main_with(vec![
                Stmt::var("a", int_type(), None),
                Stmt::var("b", Some(TypeSpec::named("string")), None),
                Stmt::assign(
                    vec![Expr::ident("a"), Expr::ident("b")],
                    vec![Expr::call(Expr::ident("two"), vec![])],
                ),
            ]),
        ])
        .unwrap();
        assert_eq!(type_of(&decls, "two"), "func() (int, string)");
        assert_eq!(type_of(&decls, "named"), "func(int) int");

        let errors = check(vec![
            Stmt::func(
                "f",
                vec![],
                vec![Param::unnamed(TypeSpec::named("int"))],
                vec![Stmt::ret(vec![Expr::string("s")])],
            ),
            Stmt::func(
                "g",
                vec![],
                vec![Param::unnamed(TypeSpec::named("int"))],
                vec![Stmt::ret(vec![])],
            ),
            var("h", Expr::int(1)),
        ])
        .unwrap_err();
        assert_matches!(
            &errors[..],
            [SemanticError::TypeMismatch { .. }, SemanticError::InvalidOperation { .. }]
        );
    }

    #[test]
    fn control_flow() {
        // outer: for:
        //     for var i = 0; i < 10; i += 1:
        //         if i == 5: break outer
        //         continue
        //     goto done
        // done: pass
        let increment = Stmt::new(StmtKind::Assign(AssignStmt {
            lhs: vec![Expr::ident("i")],
            rhs: vec![Expr::int(1)],
            op: AssignOperator::Add,
        }));
        let inner = Stmt::for_loop(
            Some(VarStmt::single("i", None, Some(Expr::int(0)))),
            Some(Expr::binary(BinaryOperator::Lt, Expr::ident("i"), Expr::int(10))),
            Some(increment),
            vec![
                Stmt::if_else(vec![IfBranch::new(
                    None,
                    Some(Expr::binary(BinaryOperator::Eq, Expr::ident("i"), Expr::int(5))),
                    vec![Stmt::branch(BranchKind::Break, Some("outer"))],
                )]),
                Stmt::branch(BranchKind::Continue, None),
            ],
        );
        let outer = Stmt::for_loop(
            None,
            None,
            None,
            vec![inner, Stmt::branch(BranchKind::Goto, Some("done"))],
        )
        .labeled("outer");

        assert!(check(vec![main_with(vec![outer, Stmt::pass().labeled("done")])]).is_ok());
    }

    #[test]
    fn invalid_branch_targets() {
        let errors = check(vec![main_with(vec![
            Stmt::branch(BranchKind::Break, None),
            Stmt::for_loop(
                None,
                None,
                None,
                vec![Stmt::branch(BranchKind::Continue, Some("missing"))],
            ),
            Stmt::pass().labeled("plain"),
            Stmt::for_loop(None, None, None, vec![Stmt::branch(BranchKind::Break, Some("plain"))]),
            Stmt::branch(BranchKind::Goto, Some("nowhere")),
        ])])
        .unwrap_err();

        assert_matches!(
            &errors[..],
            [
                SemanticError::InvalidBranchTarget { kind: BranchKind::Break, label: None, .. },
                SemanticError::InvalidBranchTarget { kind: BranchKind::Continue, .. },
                SemanticError::InvalidBranchTarget { kind: BranchKind::Break, .. },
                SemanticError::InvalidBranchTarget { kind: BranchKind::Goto, .. },
            ]
        );
    }

    #[test]
    fn labels_stay_inside_their_function() {
        let nested = Expr::func(FuncDecl::new(
            None::<String>,
            vec![],
            vec![],
            vec![Stmt::branch(BranchKind::Goto, Some("top"))],
        ));
        let errors = check(vec![main_with(vec![
            Stmt::pass().labeled("top"),
            Stmt::var("f", None, Some(nested)),
        ])])
        .unwrap_err();

        assert_matches!(&errors[..], [SemanticError::InvalidBranchTarget { .. }]);
    }

    #[test]
    fn duplicate_labels() {
        let errors = check(vec![main_with(vec![
            Stmt::pass().labeled("a"),
            Stmt::pass().labeled("a"),
        ])])
        .unwrap_err();

        assert_matches!(&errors[..], [SemanticError::Redeclaration { name, previous, .. }] => {
            assert_eq!(name, "a");
            assert!(previous.is_some());
        });
    }

    #[test]
    fn scopes_and_redeclaration() {
        // func main():
        //     var x = 1
        //     if var y = x; y < 2:
        //         var x = "shadow"
        //     var x = 2
        //     y
        let errors = check(vec![main_with(vec![
            var("x", Expr::int(1)),
            Stmt::if_else(vec![IfBranch::new(
                Some(VarStmt::single("y", None, Some(Expr::ident("x")))),
                Some(Expr::binary(BinaryOperator::Lt, Expr::ident("y"), Expr::int(2))),
                vec![var("x", Expr::string("shadow"))],
            )]),
            var("x", Expr::int(2)),
            Stmt::expr(Expr::ident("y")),
        ])])
        .unwrap_err();

        assert_matches!(
            &errors[..],
            [
                SemanticError::Redeclaration { name, .. },
                SemanticError::UndefinedSymbol { name: undefined, .. },
            ] => {
                assert_eq!(name, "x");
                assert_eq!(undefined, "y");
            }
        );
    }

    #[test]
    fn conditions_must_be_bool() {
        let errors = check(vec![main_with(vec![Stmt::if_else(vec![
            IfBranch::new(None, Some(Expr::int(1)), vec![Stmt::pass()]),
            IfBranch::new(None, None, vec![Stmt::pass()]),
        ])])])
        .unwrap_err();

        assert_matches!(&errors[..], [SemanticError::TypeMismatch { expected, .. }] => {
            assert_eq!(expected, &Type::bool());
        });
    }

    #[test]
    fn assignments() {
        let errors = check(vec![main_with(vec![
            var("x", Expr::int(1)),
            Stmt::assign(vec![Expr::int(1)], vec![Expr::int(2)]),
            Stmt::assign(vec![Expr::ident("x")], vec![Expr::string("s")]),
            Stmt::assign(vec![Expr::ident("x"), Expr::blank()], vec![Expr::int(1)]),
            Stmt::assign(vec![Expr::blank()], vec![Expr::ident("x")]),
        ])])
        .unwrap_err();

        assert_matches!(
            &errors[..],
            [
                SemanticError::InvalidOperation { .. },
                SemanticError::TypeMismatch { .. },
                SemanticError::InvalidOperation { .. },
            ]
        );
    }
}
