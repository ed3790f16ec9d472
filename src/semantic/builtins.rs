use crate::semantic::{Object, ObjectId, SimpleType, Type, TypeDecl, Variable};
use std::collections::HashMap;

/// Objects every package can see: the simple type names and the stub
/// functions. Built once, then shared read-only.
#[derive(Debug)]
pub struct Builtins {
    objects: Vec<Object>,
    types: HashMap<String, ObjectId>,
    functions: Vec<(String, ObjectId)>,
}

impl Builtins {
    pub fn new() -> Self {
        let mut builtins = Self {
            objects: vec![],
            types: HashMap::new(),
            functions: vec![],
        };

        for ty in SimpleType::ALL.iter() {
            let id = builtins.push(Object::TypeDecl(TypeDecl::new(ty.as_str(), None)));
            builtins.types.insert(ty.as_str().to_string(), id);
        }

        // print(s string) bool
        builtins.function("print", vec![Type::string()], vec![Type::bool()]);
        // read() string
        builtins.function("read", vec![], vec![Type::string()]);

        builtins
    }

    fn push(&mut self, object: Object) -> ObjectId {
        self.objects.push(object);
        ObjectId::Builtin(self.objects.len() - 1)
    }

    fn function(&mut self, name: &str, args: Vec<Type>, results: Vec<Type>) {
        let id = self.push(Object::Variable(Variable::new(
            name,
            Type::func(args, results),
        )));
        self.functions.push((name.to_string(), id));
    }

    pub fn get(&self, index: usize) -> Option<&Object> {
        self.objects.get(index)
    }

    pub fn type_decl(&self, name: &str) -> Option<ObjectId> {
        self.types.get(name).copied()
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, ObjectId)> {
        self.functions.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}
