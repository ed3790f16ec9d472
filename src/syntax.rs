pub mod traverse;
mod tree;

pub use tree::*;
