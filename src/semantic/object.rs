use crate::semantic::{Builtins, CustomType, Site, SimpleType, Type};
use crate::syntax::StmtId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::Index;

/// Handle of an object: either an entry of the shared builtin registry or
/// one created while checking a package.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ObjectId {
    Builtin(usize),
    Local(usize),
}

/// A named entity a scope can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    Variable(Variable),
    TypeDecl(TypeDecl),
    Label(Label),
    Package(PackageObject),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub r#type: Type,
    /// The statement holding the initializer, if any.
    pub init: Option<StmtId>,
    pub site: Option<Site>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    /// `None` means the name denotes a simple type.
    pub aliased: Option<Type>,
    pub site: Option<Site>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    /// The loop this label names, `None` for any other statement.
    pub branchable: Option<StmtId>,
    pub site: Option<Site>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageObject {
    pub name: String,
}

impl Variable {
    pub fn new<S: Into<String>>(name: S, r#type: Type) -> Self {
        Self {
            name: name.into(),
            r#type,
            init: None,
            site: None,
        }
    }
}

impl TypeDecl {
    pub fn new<S: Into<String>>(name: S, aliased: Option<Type>) -> Self {
        Self {
            name: name.into(),
            aliased,
            site: None,
        }
    }

    pub fn is_simple(&self) -> bool {
        self.aliased.is_none()
    }
}

impl Object {
    pub fn name(&self) -> &str {
        match self {
            Object::Variable(var) => &var.name,
            Object::TypeDecl(decl) => &decl.name,
            Object::Label(label) => &label.name,
            Object::Package(package) => &package.name,
        }
    }

    pub fn site(&self) -> Option<&Site> {
        match self {
            Object::Variable(var) => var.site.as_ref(),
            Object::TypeDecl(decl) => decl.site.as_ref(),
            Object::Label(label) => label.site.as_ref(),
            Object::Package(_) => None,
        }
    }

    pub fn variable(&self) -> Option<&Variable> {
        if let Object::Variable(var) = self {
            Some(var)
        } else {
            None
        }
    }

    pub fn type_decl(&self) -> Option<&TypeDecl> {
        if let Object::TypeDecl(decl) = self {
            Some(decl)
        } else {
            None
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Variable(var) => write!(f, "var {}: {}", var.name, var.r#type),
            Object::TypeDecl(decl) => match &decl.aliased {
                Some(aliased) => write!(f, "type {} {}", decl.name, aliased),
                None => write!(f, "type {}", decl.name),
            },
            Object::Label(label) => write!(f, "label {}", label.name),
            Object::Package(package) => write!(f, "package {}", package.name),
        }
    }
}

/// Every object reachable from a package: the shared builtins plus the
/// objects created by the current check.
#[derive(Debug)]
pub struct ObjectTable<'b> {
    builtins: &'b Builtins,
    locals: Vec<Object>,
    /// Locals whose declaration did not check.
    failed: HashSet<ObjectId>,
}

impl<'b> ObjectTable<'b> {
    pub fn new(builtins: &'b Builtins) -> Self {
        Self {
            builtins,
            locals: vec![],
            failed: HashSet::new(),
        }
    }

    pub fn insert(&mut self, object: Object) -> ObjectId {
        self.locals.push(object);
        ObjectId::Local(self.locals.len() - 1)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        match id {
            ObjectId::Builtin(index) => self.builtins.get(index),
            ObjectId::Local(index) => self.locals.get(index),
        }
    }

    /// Builtins are read-only.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        match id {
            ObjectId::Builtin(_) => None,
            ObjectId::Local(index) => self.locals.get_mut(index),
        }
    }

    /// The type a type declaration introduces: simple types for builtin
    /// names, a custom type referring to the declaration otherwise.
    pub fn declared_type(&self, id: ObjectId) -> Option<Type> {
        let decl = self.get(id)?.type_decl()?;

        if decl.is_simple() {
            SimpleType::from_name(&decl.name).map(Type::Simple)
        } else {
            Some(Type::Custom(CustomType {
                name: decl.name.clone(),
                decl: id,
            }))
        }
    }

    pub fn locals(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.locals.iter().enumerate().map(local_entry)
    }

    pub fn mark_failed(&mut self, id: ObjectId) {
        self.failed.insert(id);
    }

    pub fn is_failed(&self, id: ObjectId) -> bool {
        self.failed.contains(&id)
    }

    pub fn clear_locals(&mut self) {
        self.locals.clear();
        self.failed.clear();
    }
}

fn local_entry((index, object): (usize, &Object)) -> (ObjectId, &Object) {
    (ObjectId::Local(index), object)
}

impl Index<ObjectId> for ObjectTable<'_> {
    type Output = Object;

    fn index(&self, id: ObjectId) -> &Self::Output {
        match self.get(id) {
            Some(object) => object,
            None => panic!("no object for {:?}", id),
        }
    }
}
