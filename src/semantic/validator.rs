use crate::semantic::{ObjectTable, SemanticError, Site};
use crate::syntax::traverse::{traverse_stmt, Visitor};
use crate::syntax::{Expr, Ident, Position, Stmt};

/// Confirms a checked package has nothing left to infer: every expression
/// and variable has a known type and every identifier is bound.
pub fn validate<'s>(
    statements: impl IntoIterator<Item = (&'s str, &'s Stmt)>,
    objects: &ObjectTable<'_>,
) -> Vec<SemanticError> {
    let mut errors = vec![];

    for (file, stmt) in statements {
        let mut validator = TypeValidator {
            file,
            errors: &mut errors,
        };
        traverse_stmt(&mut validator, stmt);
    }

    for (id, object) in objects.locals() {
        if objects.is_failed(id) {
            continue;
        }
        if let Some(var) = object.variable() {
            if !var.r#type.known() {
                errors.push(SemanticError::UnresolvedInference {
                    what: var.name.clone(),
                    site: var
                        .site
                        .clone()
                        .unwrap_or_else(|| Site::new("", Position::default())),
                });
            }
        }
    }

    errors
}

struct TypeValidator<'a> {
    file: &'a str,
    errors: &'a mut Vec<SemanticError>,
}

impl Visitor for TypeValidator<'_> {
    fn enter_expr(&mut self, expr: &Expr) {
        if !expr.is_blank() && !expr.r#type.known() {
            self.errors.push(SemanticError::UnresolvedInference {
                what: "expression".to_string(),
                site: Site::new(self.file, expr.position),
            });
        }
    }

    fn visit_ident(&mut self, expr: &Expr, ident: &Ident) {
        if !ident.is_bound() {
            self.errors.push(SemanticError::UndefinedSymbol {
                name: ident.name().to_string(),
                site: Site::new(self.file, expr.position),
            });
        }
    }
}
