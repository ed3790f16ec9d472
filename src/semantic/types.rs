use crate::semantic::{Object, ObjectId, ObjectTable};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("mismatched types: expected `{expected}`, found `{found}`")]
    Mismatch { expected: Type, found: Type },
    #[error("type cannot be inferred")]
    Unresolved,
    #[error("invalid recursive type `{0}`")]
    RecursiveAlias(String),
}

/// Discriminant of [`Type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Simple,
    Array,
    Slice,
    Map,
    Pointer,
    Custom,
    Struct,
    Tuple,
    Func,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimpleType {
    Bool,
    Byte,
    Complex128,
    Complex64,
    Error,
    Float32,
    Float64,
    Int,
    Int16,
    Int32,
    Int64,
    Int8,
    Rune,
    String,
    Uint,
    Uint16,
    Uint32,
    Uint64,
    Uint8,
    Uintptr,
}

impl SimpleType {
    pub const ALL: [SimpleType; 20] = [
        SimpleType::Bool,
        SimpleType::Byte,
        SimpleType::Complex128,
        SimpleType::Complex64,
        SimpleType::Error,
        SimpleType::Float32,
        SimpleType::Float64,
        SimpleType::Int,
        SimpleType::Int16,
        SimpleType::Int32,
        SimpleType::Int64,
        SimpleType::Int8,
        SimpleType::Rune,
        SimpleType::String,
        SimpleType::Uint,
        SimpleType::Uint16,
        SimpleType::Uint32,
        SimpleType::Uint64,
        SimpleType::Uint8,
        SimpleType::Uintptr,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SimpleType::Bool => "bool",
            SimpleType::Byte => "byte",
            SimpleType::Complex128 => "complex128",
            SimpleType::Complex64 => "complex64",
            SimpleType::Error => "error",
            SimpleType::Float32 => "float32",
            SimpleType::Float64 => "float64",
            SimpleType::Int => "int",
            SimpleType::Int16 => "int16",
            SimpleType::Int32 => "int32",
            SimpleType::Int64 => "int64",
            SimpleType::Int8 => "int8",
            SimpleType::Rune => "rune",
            SimpleType::String => "string",
            SimpleType::Uint => "uint",
            SimpleType::Uint16 => "uint16",
            SimpleType::Uint32 => "uint32",
            SimpleType::Uint64 => "uint64",
            SimpleType::Uint8 => "uint8",
            SimpleType::Uintptr => "uintptr",
        }
    }

    pub fn from_name(name: &str) -> Option<SimpleType> {
        Self::ALL.iter().copied().find(|ty| ty.as_str() == name)
    }
}

impl fmt::Display for SimpleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Simple(SimpleType),
    Array { size: usize, of: Box<Type> },
    Slice(Box<Type>),
    Map { key: Box<Type>, value: Box<Type> },
    Pointer(Box<Type>),
    Tuple(Vec<Type>),
    Struct(StructType),
    Func(FuncType),
    Custom(CustomType),
    /// Not inferred yet.
    Unknown,
}

impl Default for Type {
    fn default() -> Self {
        Type::Unknown
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructType {
    /// For diagnostics only. Does not take part in equality.
    pub name: String,
    /// In the order of declaration.
    pub fields: Vec<StructField>,
    pub methods: Vec<StructMethod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub r#type: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructMethod {
    pub name: String,
    pub signature: FuncType,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FuncType {
    pub args: Vec<Type>,
    pub results: Vec<Type>,
}

/// A named type. Its structure is found by following the declaration's
/// aliased type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomType {
    pub name: String,
    pub decl: ObjectId,
}

impl Type {
    // -- initializers
    pub fn int() -> Self {
        Type::Simple(SimpleType::Int)
    }

    pub fn string() -> Self {
        Type::Simple(SimpleType::String)
    }

    pub fn bool() -> Self {
        Type::Simple(SimpleType::Bool)
    }

    pub fn slice(of: Type) -> Self {
        Type::Slice(Box::new(of))
    }

    pub fn array(size: usize, of: Type) -> Self {
        Type::Array {
            size,
            of: Box::new(of),
        }
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn pointer(to: Type) -> Self {
        Type::Pointer(Box::new(to))
    }

    pub fn func(args: Vec<Type>, results: Vec<Type>) -> Self {
        Type::Func(FuncType { args, results })
    }

    /// `true` means no `Unknown` anywhere beneath, no inference needed.
    pub fn known(&self) -> bool {
        match self {
            Type::Simple(_) | Type::Custom(_) => true,
            Type::Array { of, .. } => of.known(),
            Type::Slice(of) | Type::Pointer(of) => of.known(),
            Type::Map { key, value } => key.known() && value.known(),
            Type::Tuple(members) => members.iter().all(Type::known),
            Type::Struct(st) => st.fields.iter().all(|field| field.r#type.known()),
            Type::Func(fun) => fun.known(),
            Type::Unknown => false,
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Type::Simple(_) => Kind::Simple,
            Type::Array { .. } => Kind::Array,
            Type::Slice(_) => Kind::Slice,
            Type::Map { .. } => Kind::Map,
            Type::Pointer(_) => Kind::Pointer,
            Type::Tuple(_) => Kind::Tuple,
            Type::Struct(_) => Kind::Struct,
            Type::Func(_) => Kind::Func,
            Type::Custom(_) => Kind::Custom,
            Type::Unknown => Kind::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// Named types resolve to their root type, everything else is returned
    /// as is.
    pub fn underlying(&self, objects: &ObjectTable<'_>) -> Result<Type, TypeError> {
        match self {
            Type::Custom(custom) => custom.root_type(objects),
            ty => Ok(ty.clone()),
        }
    }

    /// Reconciles two types found at the same program point into the one
    /// type both must carry.
    pub fn negotiate(&self, other: &Type) -> Result<Type, TypeError> {
        debug!("[negotiate] {} - {}", self, other);

        self.negotiate_members(other).map_err(|err| match err {
            // Report the whole types, not the members that differ.
            TypeError::Mismatch { .. } => TypeError::Mismatch {
                expected: self.clone(),
                found: other.clone(),
            },
            err => err,
        })
    }

    fn negotiate_members(&self, other: &Type) -> Result<Type, TypeError> {
        let mismatch = || TypeError::Mismatch {
            expected: self.clone(),
            found: other.clone(),
        };

        match (self, other) {
            (Type::Unknown, Type::Unknown) => Err(TypeError::Unresolved),
            (Type::Unknown, ty) | (ty, Type::Unknown) => Ok(ty.clone()),
            (Type::Simple(id1), Type::Simple(id2)) if id1 == id2 => Ok(self.clone()),
            (Type::Custom(ty1), Type::Custom(ty2)) if ty1.decl == ty2.decl => Ok(self.clone()),
            (Type::Array { size: size1, of: of1 }, Type::Array { size: size2, of: of2 })
                if size1 == size2 =>
            {
                Ok(Type::array(*size1, of1.negotiate_members(of2)?))
            }
            (Type::Slice(of1), Type::Slice(of2)) => Ok(Type::slice(of1.negotiate_members(of2)?)),
            (Type::Pointer(to1), Type::Pointer(to2)) => {
                Ok(Type::pointer(to1.negotiate_members(to2)?))
            }
            (
                Type::Map {
                    key: key1,
                    value: value1,
                },
                Type::Map {
                    key: key2,
                    value: value2,
                },
            ) => Ok(Type::map(
                key1.negotiate_members(key2)?,
                value1.negotiate_members(value2)?,
            )),
            (Type::Tuple(members1), Type::Tuple(members2)) if members1.len() == members2.len() => {
                Ok(Type::Tuple(negotiate_all(members1, members2)?))
            }
            (Type::Func(fun1), Type::Func(fun2))
                if fun1.args.len() == fun2.args.len()
                    && fun1.results.len() == fun2.results.len() =>
            {
                Ok(Type::func(
                    negotiate_all(&fun1.args, &fun2.args)?,
                    negotiate_all(&fun1.results, &fun2.results)?,
                ))
            }
            (Type::Struct(st1), Type::Struct(st2)) if st1.same_layout(st2) => {
                let mut fields = Vec::with_capacity(st1.fields.len());

                for (field1, field2) in st1.fields.iter().zip(st2.fields.iter()) {
                    fields.push(StructField {
                        name: field1.name.clone(),
                        r#type: field1.r#type.negotiate_members(&field2.r#type)?,
                    });
                }

                Ok(Type::Struct(StructType {
                    name: st1.name.clone(),
                    fields,
                    methods: st1.methods.clone(),
                }))
            }
            _ => Err(mismatch()),
        }
    }
}

fn negotiate_all(types1: &[Type], types2: &[Type]) -> Result<Vec<Type>, TypeError> {
    types1
        .iter()
        .zip(types2.iter())
        .map(|(ty1, ty2)| ty1.negotiate_members(ty2))
        .collect()
}

impl StructType {
    pub fn new<S: Into<String>>(name: S, fields: Vec<StructField>) -> Self {
        Self {
            name: name.into(),
            fields,
            methods: vec![],
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&Type> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.r#type)
    }

    pub fn get_method(&self, name: &str) -> Option<&FuncType> {
        self.methods
            .iter()
            .find(|method| method.name == name)
            .map(|method| &method.signature)
    }

    fn same_layout(&self, other: &StructType) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(field1, field2)| field1.name == field2.name)
    }
}

impl PartialEq for StructType {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl StructField {
    pub fn new<S: Into<String>>(name: S, r#type: Type) -> Self {
        Self {
            name: name.into(),
            r#type,
        }
    }
}

impl FuncType {
    pub fn known(&self) -> bool {
        self.args.iter().all(Type::known) && self.results.iter().all(Type::known)
    }

    /// The type of a call expression: nothing, the single result, or a tuple.
    pub fn result_type(&self) -> Type {
        match self.results.len() {
            1 => self.results[0].clone(),
            _ => Type::Tuple(self.results.clone()),
        }
    }
}

impl CustomType {
    /// Follows the alias chain to the first type that is not a custom type.
    pub fn root_type(&self, objects: &ObjectTable<'_>) -> Result<Type, TypeError> {
        let mut visited = HashSet::new();
        let mut current = self.decl;

        loop {
            if !visited.insert(current) {
                return Err(TypeError::RecursiveAlias(self.name.clone()));
            }

            let decl = match objects.get(current) {
                Some(Object::TypeDecl(decl)) => decl,
                _ => return Err(TypeError::Unresolved),
            };

            match &decl.aliased {
                Some(Type::Custom(next)) => current = next.decl,
                Some(ty) => return Ok(ty.clone()),
                None => {
                    return SimpleType::from_name(&decl.name)
                        .map(Type::Simple)
                        .ok_or(TypeError::Unresolved)
                }
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, types: &[Type]) -> fmt::Result {
    let mut it = types.iter().peekable();

    while let Some(ty) = it.next() {
        write!(f, "{}", ty)?;
        if it.peek().is_some() {
            write!(f, ", ")?;
        }
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Simple(id) => id.fmt(f),
            Type::Array { size, of } => write!(f, "[{}]{}", size, of),
            Type::Slice(of) => write!(f, "[]{}", of),
            Type::Map { key, value } => write!(f, "map[{}]{}", key, value),
            Type::Pointer(to) => write!(f, "*{}", to),
            Type::Tuple(members) => {
                write!(f, "(")?;
                write_list(f, members)?;
                write!(f, ")")
            }
            Type::Struct(st) => st.fmt(f),
            Type::Func(fun) => fun.fmt(f),
            Type::Custom(custom) => write!(f, "{}", custom.name),
            Type::Unknown => write!(f, "_"),
        }
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut it = self.fields.iter().peekable();

        write!(f, "{{")?;
        while let Some(field) = it.next() {
            write!(f, "{}: {}", field.name, field.r#type)?;
            if it.peek().is_some() {
                write!(f, ", ")?;
            }
        }
        write!(f, "}}")
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func(")?;
        write_list(f, &self.args)?;
        write!(f, ")")?;

        match self.results.len() {
            0 => Ok(()),
            1 => write!(f, " {}", self.results[0]),
            _ => {
                write!(f, " (")?;
                write_list(f, &self.results)?;
                write!(f, ")")
            }
        }
    }
}
