//! A package: source files checked together, top-level statements in
//! dependency order.
mod sort;
mod toplevel;

pub use sort::{topo_sort, DependencyNode};
pub use toplevel::{StmtRef, TopLevelStmt};

use crate::semantic::{validate, Builtins, Checker, Object, ObjectTable, ScopeStack, SemanticError};
use crate::syntax::{SourceFile, Stmt};
use log::info;

#[derive(Debug)]
pub struct Package<'b> {
    name: String,
    files: Vec<SourceFile>,
    scopes: ScopeStack<'b>,
    objects: ObjectTable<'b>,
    order: Vec<StmtRef>,
}

impl<'b> Package<'b> {
    pub fn new<S: Into<String>>(builtins: &'b Builtins, name: S, files: Vec<SourceFile>) -> Self {
        Self {
            name: name.into(),
            files,
            scopes: ScopeStack::new(builtins),
            objects: ObjectTable::new(builtins),
            order: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Edits take effect at the next `check`.
    pub fn files_mut(&mut self) -> &mut Vec<SourceFile> {
        &mut self.files
    }

    /// Top-level statements in the order they were checked.
    pub fn order(&self) -> &[StmtRef] {
        &self.order
    }

    pub fn ordered_statements(&self) -> Vec<(&SourceFile, &Stmt)> {
        self.order
            .iter()
            .filter_map(|stmt_ref| {
                let file = self.files.get(stmt_ref.file)?;
                file.body.get(stmt_ref.index).map(|stmt| (file, stmt))
            })
            .collect()
    }

    pub fn objects(&self) -> &ObjectTable<'b> {
        &self.objects
    }

    /// Looks `name` up in the package scope.
    pub fn lookup(&self, name: &str) -> Option<&Object> {
        self.scopes
            .find_object(name)
            .and_then(|id| self.objects.get(id))
    }

    /// Checks every file from scratch. Any failure yields the full,
    /// non-empty list of diagnostics.
    pub fn check(&mut self) -> Result<(), Vec<SemanticError>> {
        info!(
            "[package] checking `{}` ({} files)",
            self.name,
            self.files.len()
        );

        self.scopes.erase_all_except_builtins();
        self.objects.clear_locals();
        self.order.clear();

        let mut diagnostics = vec![];
        let mut next_id = 0;
        for file in &mut self.files {
            file.assign_ids(&mut next_id);
        }

        let mut stmts = vec![];
        for (file_index, file) in self.files.iter().enumerate() {
            if file.package != self.name {
                diagnostics.push(SemanticError::PackageMismatch {
                    file: file.name.clone(),
                    expected: self.name.clone(),
                    found: file.package.clone(),
                });
                continue;
            }

            for (index, stmt) in file.body.iter().enumerate() {
                let mut top = TopLevelStmt::new(
                    StmtRef {
                        file: file_index,
                        index,
                    },
                    stmt,
                );
                top.load_deps(stmt);
                stmts.push(top);
            }
        }

        let sorted = match topo_sort(stmts) {
            Ok(sorted) => sorted,
            Err(err) => {
                diagnostics.push(err);
                return Err(diagnostics);
            }
        };
        self.order = sorted.iter().map(TopLevelStmt::stmt).collect();

        self.scopes.push_scope();
        for stmt_ref in &self.order {
            let file = &mut self.files[stmt_ref.file];
            let mut checker = Checker::new(
                file.name.clone(),
                &mut self.scopes,
                &mut self.objects,
                &mut diagnostics,
            );

            checker.check_top_level(&mut file.body[stmt_ref.index]);
        }

        if diagnostics.is_empty() {
            let statements = self
                .order
                .iter()
                .map(|stmt_ref| {
                    let file = &self.files[stmt_ref.file];
                    (file.name.as_str(), &file.body[stmt_ref.index])
                });
            diagnostics = validate(statements, &self.objects);
        }

        info!(
            "[package] `{}`: {} statements, {} diagnostics",
            self.name,
            self.order.len(),
            diagnostics.len()
        );

        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(diagnostics)
        }
    }
}

/// Builds and checks a package in one go.
pub fn check_package<'b, S: Into<String>>(
    builtins: &'b Builtins,
    name: S,
    files: Vec<SourceFile>,
) -> Result<Package<'b>, Vec<SemanticError>> {
    let mut package = Package::new(builtins, name, files);

    package.check()?;
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{ObjectId, Type};
    use crate::syntax::{Expr, ExprKind, Position, StmtKind, TypeSpec};
    use assert_matches::assert_matches;

    fn main_with(body: Vec<Stmt>) -> Stmt {
        Stmt::func("main", vec![], vec![], body)
    }

    /// Object declared by the first variable of a `var` statement.
    fn var_object(stmt: &Stmt) -> Option<ObjectId> {
        match &stmt.kind {
            StmtKind::Var(var) => var.vars[0].object,
            _ => None,
        }
    }

    fn func_body(stmt: &Stmt) -> &[Stmt] {
        match &stmt.kind {
            StmtKind::Var(var) => match var.vars[0].init.as_ref().map(|init| &init.kind) {
                Some(ExprKind::Func(fun)) => fun.body.statements.as_slice(),
                _ => &[],
            },
            _ => &[],
        }
    }

    #[test]
    fn cross_file_ordering() {
        let builtins = Builtins::new();
        let files = vec![
            SourceFile::new(
                "hello.hv",
                "main",
                vec![main_with(vec![Stmt::var("x", None, Some(Expr::ident("y")))])],
            ),
            SourceFile::new("world.hv", "main", vec![Stmt::var("y", None, Some(Expr::int(10)))]),
        ];

        let package = check_package(&builtins, "main", files).unwrap();

        assert_eq!(
            package.order(),
            [StmtRef { file: 1, index: 0 }, StmtRef { file: 0, index: 0 }]
        );

        let names: Vec<_> = package
            .ordered_statements()
            .into_iter()
            .flat_map(|(_, stmt)| stmt.decls())
            .collect();
        assert_eq!(names, vec!["y", "main"]);

        let main = &package.files()[0].body[0];
        let x = var_object(&func_body(main)[0]).unwrap();
        assert_matches!(&package.objects()[x], Object::Variable(var) => {
            assert_eq!(var.name, "x");
            assert_eq!(var.r#type, Type::int());
        });

        assert_matches!(package.lookup("y"), Some(Object::Variable(var)) => {
            assert_eq!(var.r#type, Type::int());
        });
        assert_matches!(package.lookup("main"), Some(Object::Variable(var)) => {
            assert_eq!(var.r#type.to_string(), "func()");
        });
    }

    #[test]
    fn undefined_symbol_is_not_a_cycle() {
        let builtins = Builtins::new();
        let files = vec![SourceFile::new(
            "main.hv",
            "main",
            vec![main_with(vec![Stmt::var(
                "x",
                None,
                Some(Expr::ident("z").at(Position::new(1, 9))),
            )])],
        )];

        let errors = check_package(&builtins, "main", files).unwrap_err();

        assert_matches!(&errors[..], [SemanticError::UndefinedSymbol { name, site }] => {
            assert_eq!(name, "z");
            assert_eq!(site.to_string(), "main.hv:2:10");
        });
    }

    #[test]
    fn self_recursive_function() {
        let builtins = Builtins::new();
        let files = vec![SourceFile::new(
            "main.hv",
            "main",
            vec![main_with(vec![Stmt::expr(Expr::call(
                Expr::ident("main"),
                vec![],
            ))])],
        )];

        assert!(check_package(&builtins, "main", files).is_ok());
    }

    #[test]
    fn initialization_cycle() {
        let builtins = Builtins::new();
        let files = vec![SourceFile::new(
            "main.hv",
            "main",
            vec![
                Stmt::var("a", None, Some(Expr::ident("b"))),
                Stmt::var("b", None, Some(Expr::ident("a"))),
                Stmt::var("c", None, Some(Expr::int(1))),
            ],
        )];

        let errors = check_package(&builtins, "main", files).unwrap_err();

        assert_matches!(&errors[..], [SemanticError::DependencyCycle { names }] => {
            assert_eq!(names, &vec!["a".to_string(), "b".to_string()]);
        });
    }

    #[test]
    fn package_clause_mismatch() {
        let builtins = Builtins::new();
        let files = vec![
            SourceFile::new("main.hv", "main", vec![Stmt::var("a", None, Some(Expr::int(1)))]),
            SourceFile::new("other.hv", "other", vec![]),
        ];

        let errors = check_package(&builtins, "main", files).unwrap_err();

        assert_matches!(&errors[..], [SemanticError::PackageMismatch { file, found, .. }] => {
            assert_eq!(file, "other.hv");
            assert_eq!(found, "other");
        });
    }

    #[test]
    fn redeclaration_across_files() {
        let builtins = Builtins::new();
        let files = vec![
            SourceFile::new("a.hv", "main", vec![Stmt::var("v", None, Some(Expr::int(1)))]),
            SourceFile::new(
                "b.hv",
                "main",
                vec![Stmt::var("v", None, Some(Expr::int(2))).at(Position::new(3, 0))],
            ),
        ];

        let errors = check_package(&builtins, "main", files).unwrap_err();

        assert_matches!(&errors[..], [SemanticError::Redeclaration { name, previous, .. }] => {
            assert_eq!(name, "v");
            assert_eq!(previous.as_ref().map(|site| site.file.as_str()), Some("a.hv"));
        });
    }

    #[test]
    fn recheck_after_edit() {
        let builtins = Builtins::new();
        let files = vec![SourceFile::new(
            "main.hv",
            "main",
            vec![
                Stmt::var("old", None, Some(Expr::int(1))),
                main_with(vec![Stmt::var("x", None, Some(Expr::ident("old")))]),
            ],
        )];
        let mut package = Package::new(&builtins, "main", files);

        assert!(package.check().is_ok());
        let locals = package.objects().locals().count();

        // rename `old` to `new` without updating its use
        package.files_mut()[0].body[0] = Stmt::var("new", None, Some(Expr::int(1)));

        let errors = package.check().unwrap_err();
        assert_matches!(&errors[..], [SemanticError::UndefinedSymbol { name, .. }] => {
            assert_eq!(name, "old");
        });
        assert!(package.lookup("old").is_none());
        assert!(package.objects().locals().count() <= locals);
    }

    #[test]
    fn struct_types_across_statements() {
        let builtins = Builtins::new();
        // func origin() Point: return Point{x: 0, y: 0}
        // struct Point: x int; y int
        let files = vec![SourceFile::new(
            "main.hv",
            "main",
            vec![
                Stmt::func(
                    "origin",
                    vec![],
                    vec![crate::syntax::Param::unnamed(TypeSpec::named("Point"))],
                    vec![Stmt::ret(vec![Expr::compound(
                        Some(TypeSpec::named("Point")),
                        vec![
                            crate::syntax::Element::keyed(Expr::ident("x"), Expr::int(0)),
                            crate::syntax::Element::keyed(Expr::ident("y"), Expr::int(0)),
                        ],
                    )])],
                ),
                Stmt::struct_decl(
                    "Point",
                    vec![
                        crate::syntax::Field::new("x", TypeSpec::named("int")),
                        crate::syntax::Field::new("y", TypeSpec::named("int")),
                    ],
                    vec![],
                ),
            ],
        )];

        let package = check_package(&builtins, "main", files).unwrap();

        assert_eq!(
            package.order(),
            [StmtRef { file: 0, index: 1 }, StmtRef { file: 0, index: 0 }]
        );
        assert_matches!(package.lookup("origin"), Some(Object::Variable(var)) => {
            assert_eq!(var.r#type.to_string(), "func() Point");
        });
    }

    #[test]
    fn map_key_declared_later() {
        let builtins = Builtins::new();
        // var m = map[string]int{k: 1}
        // var k = "a"
        let files = vec![SourceFile::new(
            "main.hv",
            "main",
            vec![
                Stmt::var(
                    "m",
                    None,
                    Some(Expr::compound(
                        Some(TypeSpec::map(TypeSpec::named("string"), TypeSpec::named("int"))),
                        vec![crate::syntax::Element::keyed(Expr::ident("k"), Expr::int(1))],
                    )),
                ),
                Stmt::var("k", None, Some(Expr::string("a"))),
            ],
        )];

        let package = check_package(&builtins, "main", files).unwrap();

        assert_eq!(
            package.order(),
            [StmtRef { file: 0, index: 1 }, StmtRef { file: 0, index: 0 }]
        );
        assert_matches!(package.lookup("m"), Some(Object::Variable(var)) => {
            assert_eq!(var.r#type.to_string(), "map[string]int");
        });
    }
}
