use crate::semantic::{Type, TypeError};
use crate::syntax::{BranchKind, Position};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Where something was written: a file and a position in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Site {
    pub file: String,
    pub position: Position,
}

impl Site {
    pub fn new<S: Into<String>>(file: S, position: Position) -> Self {
        Self {
            file: file.into(),
            position,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.position)
    }
}

fn previous_note(previous: &Option<Site>) -> String {
    previous
        .as_ref()
        .map(|site| format!(" (previously declared at {})", site))
        .unwrap_or_default()
}

fn branch_label(label: &Option<String>) -> String {
    label
        .as_ref()
        .map(|name| format!(" {}", name))
        .unwrap_or_default()
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("{site}: `{name}` redeclared in this block{}", previous_note(.previous))]
    Redeclaration {
        name: String,
        site: Site,
        previous: Option<Site>,
    },
    #[error("{site}: undefined: {name}")]
    UndefinedSymbol { name: String, site: Site },
    #[error("{site}: mismatched types: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        expected: Type,
        found: Type,
        site: Site,
    },
    #[error("{site}: cannot infer the type of {what}")]
    UnresolvedInference { what: String, site: Site },
    #[error("initialization cycle among: {}", .names.join(", "))]
    DependencyCycle { names: Vec<String> },
    #[error("{site}: invalid {kind}{} target", branch_label(.label))]
    InvalidBranchTarget {
        kind: BranchKind,
        label: Option<String>,
        site: Site,
    },
    #[error("{site}: expected {expected} arguments, found {found}")]
    ArgumentCountMismatch {
        expected: usize,
        found: usize,
        site: Site,
    },
    #[error("{site}: `{name}` is not a type")]
    NotAType { name: String, site: Site },
    #[error("{site}: {message}")]
    InvalidOperation { message: String, site: Site },
    #[error("{site}: invalid recursive type `{name}`")]
    RecursiveType { name: String, site: Site },
    #[error("{file}: found package `{found}`, expected `{expected}`")]
    PackageMismatch {
        file: String,
        expected: String,
        found: String,
    },
}

impl SemanticError {
    /// Attaches a site to a failed negotiation. `what` names the thing whose
    /// type could not be inferred.
    pub fn from_type_error(err: TypeError, what: &str, site: Site) -> Self {
        match err {
            TypeError::Mismatch { expected, found } => SemanticError::TypeMismatch {
                expected,
                found,
                site,
            },
            TypeError::Unresolved => SemanticError::UnresolvedInference {
                what: what.to_string(),
                site,
            },
            TypeError::RecursiveAlias(name) => SemanticError::RecursiveType { name, site },
        }
    }

    pub fn site(&self) -> Option<&Site> {
        match self {
            SemanticError::Redeclaration { site, .. }
            | SemanticError::UndefinedSymbol { site, .. }
            | SemanticError::TypeMismatch { site, .. }
            | SemanticError::UnresolvedInference { site, .. }
            | SemanticError::InvalidBranchTarget { site, .. }
            | SemanticError::ArgumentCountMismatch { site, .. }
            | SemanticError::NotAType { site, .. }
            | SemanticError::InvalidOperation { site, .. }
            | SemanticError::RecursiveType { site, .. } => Some(site),
            SemanticError::DependencyCycle { .. } | SemanticError::PackageMismatch { .. } => None,
        }
    }
}
