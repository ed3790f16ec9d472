mod builtins;
mod checker;
mod errors;
mod object;
mod scope;
mod types;
mod validator;

pub use builtins::Builtins;
pub use checker::Checker;
pub use errors::{SemanticError, Site};
pub use object::*;
pub use scope::ScopeStack;
pub use types::*;
pub use validator::validate;
